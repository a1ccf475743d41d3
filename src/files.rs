//! Replace-by-rename file writes.
//!
//! Every stored file (uploads, display copies, originals, thumbnails,
//! enriched tracks) is written to a hidden sibling first and renamed over
//! the destination. A concurrent reader sees either the old content or the
//! new, never a truncated file.

use std::io;
use std::path::{Path, PathBuf};

/// Hidden temporary path next to `path`, unique per call.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", xid::new()))
}

fn finish(tmp: &Path, path: &Path, written: io::Result<()>) -> io::Result<()> {
    let result = written.and_then(|()| std::fs::rename(tmp, path));
    if result.is_err() {
        let _ = std::fs::remove_file(tmp);
    }
    result
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_sibling(path);
    let written = std::fs::write(&tmp, bytes);
    finish(&tmp, path, written)
}

pub fn copy_atomic(from: &Path, to: &Path) -> io::Result<()> {
    let tmp = temp_sibling(to);
    let written = std::fs::copy(from, &tmp).map(|_| ());
    finish(&tmp, to, written)
}

pub async fn write_atomic_async(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_sibling(path);
    let result = match tokio::fs::write(&tmp, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn temp_sibling_is_hidden_and_unique() {
        let a = temp_sibling(Path::new("/m/photos/x.jpg"));
        let b = temp_sibling(Path::new("/m/photos/x.jpg"));
        assert_eq!(a.parent(), Some(Path::new("/m/photos")));
        assert!(a.file_name().unwrap().to_string_lossy().starts_with(".x.jpg."));
        assert_ne!(a, b);
    }

    #[test]
    fn replaces_content_without_leftovers() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.gpx");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert_eq!(entries(tmp.path()), vec!["t.gpx"]);
    }

    #[test]
    fn failed_copy_leaves_destination_alone() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("_original_a.jpg");
        write_atomic(&dest, b"kept").unwrap();
        assert!(copy_atomic(&tmp.path().join("missing.jpg"), &dest).is_err());
        assert_eq!(std::fs::read(&dest).unwrap(), b"kept");
        assert_eq!(entries(tmp.path()), vec!["_original_a.jpg"]);
    }

    #[tokio::test]
    async fn async_write_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("u.jpg");
        write_atomic_async(&path, b"one").await.unwrap();
        write_atomic_async(&path, b"two").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert_eq!(entries(tmp.path()), vec!["u.jpg"]);
    }
}
