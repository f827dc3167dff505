use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Object storage for user-uploaded images, as consumed: a single put
/// primitive returning a public URL.
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String>;
}

/// Filesystem-backed media storage. Files land under `root` and are
/// served from `base_url` by whatever fronts this service.
pub struct LocalMediaStore {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, base_url: String) -> Self {
        Self { root, base_url }
    }
}

#[async_trait::async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String> {
        // Keys are generated internally, but refuse traversal outright.
        if path.split('/').any(|segment| segment == "..") {
            bail!("invalid media path: {path}");
        }

        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating media directory for {path}"))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("writing media object {path}"))?;

        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_writes_file_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path().to_path_buf(), "/media".to_string());

        let url = store.put("avatars/abc", b"bytes").await.unwrap();
        assert_eq!(url, "/media/avatars/abc");

        let written = tokio::fs::read(dir.path().join("avatars/abc")).await.unwrap();
        assert_eq!(written, b"bytes");
    }

    #[tokio::test]
    async fn put_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path().to_path_buf(), "/media".to_string());
        assert!(store.put("../escape", b"x").await.is_err());
    }
}
