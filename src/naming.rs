//! Centralized naming for stored uploads.
//!
//! Uploaded files never keep the name the client sent. The stored name is a
//! fresh unique id, a short content fingerprint and a whitelisted extension:
//!
//! - `IMG 0042.JPG` → `cq1a5h0nt3e1d8bbq5ng-3f9a61d2c07e44c1.jpg`
//! - `flight.GPX` → `cq1a5h8nt3e1d8bbq5o0-8b02aa19f3c4be77.gpx`
//! - `evil.php` → rejected
//!
//! Every upload gets its own file, even when two uploads carry the same
//! bytes, so editing or replacing one record never touches another.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Hex characters of the content hash kept in the stored name.
const HASH_CHARS: usize = 16;

/// What an upload is for; decides the allowed extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Photo,
    Track,
}

impl UploadKind {
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            UploadKind::Photo => &["jpg", "jpeg", "png", "webp"],
            UploadKind::Track => &["gpx"],
        }
    }
}

/// Lowercased extension of `client_name` if it is allowed for `kind`.
pub fn whitelisted_extension(client_name: &str, kind: UploadKind) -> Option<String> {
    let ext = Path::new(client_name)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();
    kind.allowed_extensions()
        .contains(&ext.as_str())
        .then_some(ext)
}

/// Leading hex characters of the SHA-256 of `bytes`.
pub fn content_fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..HASH_CHARS].to_string()
}

/// Opaque stored name for an upload: unique id, content fingerprint and
/// extension. Two calls never return the same name.
///
/// Returns `None` when the client name carries no allowed extension.
pub fn upload_file_name(bytes: &[u8], client_name: &str, kind: UploadKind) -> Option<String> {
    let ext = whitelisted_extension(client_name, kind)?;
    Some(format!("{}-{}.{ext}", xid::new(), content_fingerprint(bytes)))
}

/// Where uploads are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPaths {
    pub photos: PathBuf,
    pub tracks: PathBuf,
}

impl MediaPaths {
    pub fn new(photos: impl Into<PathBuf>, tracks: impl Into<PathBuf>) -> Self {
        Self {
            photos: photos.into(),
            tracks: tracks.into(),
        }
    }

    pub fn dir_for(&self, kind: UploadKind) -> &Path {
        match kind {
            UploadKind::Photo => &self.photos,
            UploadKind::Track => &self.tracks,
        }
    }

    pub fn track(&self, filename: &str) -> PathBuf {
        self.tracks.join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(
            whitelisted_extension("IMG 0042.JPG", UploadKind::Photo),
            Some("jpg".to_string())
        );
        assert_eq!(
            whitelisted_extension("flight.GPX", UploadKind::Track),
            Some("gpx".to_string())
        );
    }

    #[test]
    fn unknown_extensions_rejected() {
        assert_eq!(whitelisted_extension("evil.php", UploadKind::Photo), None);
        assert_eq!(whitelisted_extension("photo.jpg", UploadKind::Track), None);
        assert_eq!(whitelisted_extension("no_extension", UploadKind::Photo), None);
        assert_eq!(whitelisted_extension("", UploadKind::Track), None);
    }

    #[test]
    fn name_ignores_client_stem() {
        let name = upload_file_name(b"bytes", "../../etc/passwd.jpg", UploadKind::Photo).unwrap();
        assert!(!name.contains('/'));
        assert!(!name.contains("passwd"));
        assert!(name.ends_with(".jpg"));
    }

    #[test]
    fn same_content_gets_distinct_names() {
        let a = upload_file_name(b"same bytes", "a.jpg", UploadKind::Photo).unwrap();
        let b = upload_file_name(b"same bytes", "a.jpg", UploadKind::Photo).unwrap();
        assert_ne!(a, b);
        // the fingerprint part still matches
        assert_eq!(a.split_once('-').unwrap().1, b.split_once('-').unwrap().1);
    }

    #[test]
    fn rejected_extension_has_no_name() {
        assert_eq!(upload_file_name(b"x", "track.kml", UploadKind::Track), None);
    }

    #[test]
    fn fingerprint_is_sha256_prefix() {
        // sha256("") = e3b0c442 98fc1c14 …
        assert_eq!(content_fingerprint(b""), "e3b0c44298fc1c14");
    }

    #[test]
    fn media_paths_by_kind() {
        let paths = MediaPaths::new("/m/photos", "/m/tracks");
        assert_eq!(paths.dir_for(UploadKind::Photo), Path::new("/m/photos"));
        assert_eq!(paths.track("t.gpx"), Path::new("/m/tracks/t.gpx"));
    }
}
