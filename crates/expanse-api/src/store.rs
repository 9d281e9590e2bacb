use std::path::PathBuf;

use anyhow::Result;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// On-disk store for uploaded course content.
///
/// Each blob is one flat file at `{dir}/{content_id}`; all metadata (name,
/// mime type, owner) lives in the contents table.
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Content store directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn blob_path(&self, content_id: &str) -> PathBuf {
        self.dir.join(content_id)
    }

    /// Write a blob and return (size, hex SHA-256) for the metadata row.
    pub async fn write(&self, content_id: &str, data: &[u8]) -> Result<(u64, String)> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let sha256 = hex::encode(hasher.finalize());

        let path = self.blob_path(content_id);
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok((data.len() as u64, sha256))
    }

    pub async fn open(&self, content_id: &str) -> std::io::Result<fs::File> {
        fs::File::open(self.blob_path(content_id)).await
    }

    /// Delete a blob; a blob that is already gone is not an error.
    pub async fn delete(&self, content_id: &str) -> Result<()> {
        let path = self.blob_path(content_id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted blob {}", content_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already gone", content_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
