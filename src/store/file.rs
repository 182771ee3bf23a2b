//! Key/value persistence as one gzip-compressed file per key.

use super::KvStore;
use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Stores each key as `<directory>/<key>.json.gz`.
///
/// Writes go to a temporary file which is fsynced and then renamed over the
/// target, so readers see either the old value or the new one.
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    /// Opens the store, creating `directory` if needed.
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).with_context(|| {
            format!("Failed to create storage directory {}", directory.display())
        })?;
        Ok(Self { directory })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            bail!("Invalid storage key '{}' (must be [A-Za-z0-9_-])", key);
        }
        Ok(self.directory.join(format!("{}.json.gz", key)))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to open {}", path.display()))
            }
        };

        let mut decoder = GzDecoder::new(file);
        let mut value = Vec::new();
        decoder
            .read_to_end(&mut value)
            .with_context(|| format!("Failed to decompress {}", path.display()))?;

        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp_path = path.with_extension("tmp");

        {
            let tmp_file =
                File::create(&tmp_path).context("Failed to create temporary storage file")?;

            let mut encoder = GzEncoder::new(tmp_file, Compression::default());
            encoder
                .write_all(value)
                .context("Failed to write compressed storage data")?;

            let file = encoder.finish().context("Failed to finish compression")?;

            file.sync_all()
                .context("Failed to sync storage file to disk")?;
        }

        fs::rename(&tmp_path, &path).context("Failed to rename temporary storage file")?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }
}
