// SPDX-License-Identifier: MPL-2.0

//! Filesystem blob storage for uploaded photos.
//!
//! Blobs live under `{root}/posts/{owner}/` and are addressed by `file://`
//! URLs, which become the `payload_ref` of the post that uses them.

use crate::config::DATA_DIR_NAME;
use crate::store::StoreError;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use url::Url;

pub struct BlobStore {
    root: PathBuf,
    /// Disambiguates uploads within the same millisecond
    counter: AtomicU64,
}

impl BlobStore {
    /// Open or create a blob store rooted at `root`
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        let root = std::path::absolute(root)?;
        std::fs::create_dir_all(&root)
            .map_err(|e| StoreError::Path(format!("failed to create blob dir: {}", e)))?;

        Ok(Self {
            root,
            counter: AtomicU64::new(0),
        })
    }

    /// Open the blob store at ~/.local/share/photofeed/blobs
    pub fn open_default() -> Result<Self, StoreError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| StoreError::Path("could not find data directory".to_string()))?;

        Self::open(&data_dir.join(DATA_DIR_NAME).join("blobs"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `data` for `owner_id` and return its URL
    pub fn upload(
        &self,
        owner_id: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<String, StoreError> {
        let dir = self.root.join("posts").join(sanitize(owner_id));
        std::fs::create_dir_all(&dir)?;

        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            n,
            extension_for(content_type)
        );
        let path = dir.join(name);
        std::fs::write(&path, data)?;

        let url = Url::from_file_path(&path)
            .map_err(|_| StoreError::Path(format!("not an absolute path: {}", path.display())))?;

        debug!(owner_id, bytes = data.len(), %url, "uploaded blob");
        Ok(url.to_string())
    }

    /// Read a blob back by URL
    pub fn read(&self, payload_ref: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(payload_ref)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound,
            _ => StoreError::Io(e),
        })
    }

    /// Delete a blob by URL. Returns false if it was already gone.
    pub fn delete(&self, payload_ref: &str) -> Result<bool, StoreError> {
        let path = self.resolve(payload_ref)?;

        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(%payload_ref, "deleted blob");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Map a blob URL back to a path inside this store
    fn resolve(&self, payload_ref: &str) -> Result<PathBuf, StoreError> {
        let url = Url::parse(payload_ref)
            .map_err(|e| StoreError::Path(format!("invalid blob url {}: {}", payload_ref, e)))?;
        let path = url
            .to_file_path()
            .map_err(|_| StoreError::Path(format!("not a file url: {}", payload_ref)))?;

        if !path.starts_with(&self.root) || path.components().any(|c| c.as_os_str() == "..") {
            return Err(StoreError::Path(format!(
                "blob outside store root: {}",
                payload_ref
            )));
        }
        Ok(path)
    }
}

/// File extension for an upload's MIME type
fn extension_for(content_type: Option<&str>) -> &'static str {
    match content_type {
        Some("image/jpeg") | Some("image/jpg") => "jpg",
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        Some("image/heic") => "heic",
        _ => "bin",
    }
}

/// Keep owner ids filesystem-safe
fn sanitize(owner_id: &str) -> String {
    owner_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).unwrap();

        let url = blobs.upload("alice", b"jpegbytes", Some("image/jpeg")).unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".jpg"));
        assert_eq!(blobs.read(&url).unwrap(), b"jpegbytes");

        assert!(blobs.delete(&url).unwrap());
        assert!(!blobs.delete(&url).unwrap());
        assert!(matches!(blobs.read(&url), Err(StoreError::NotFound)));
    }

    #[test]
    fn uploads_in_same_millisecond_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).unwrap();

        let a = blobs.upload("alice", b"a", None).unwrap();
        let b = blobs.upload("alice", b"b", None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn refuses_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(&dir.path().join("blobs")).unwrap();
        let outside = Url::from_file_path(dir.path().join("other.jpg")).unwrap();

        assert!(matches!(
            blobs.delete(outside.as_str()),
            Err(StoreError::Path(_))
        ));
        assert!(matches!(
            blobs.delete("https://example.com/a.jpg"),
            Err(StoreError::Path(_))
        ));
    }

    #[test]
    fn owner_ids_are_sanitized() {
        assert_eq!(sanitize("did:plc/../x"), "did_plc____x");
    }
}
