use std::io;
use std::path::{Path, PathBuf};

use crate::cache::CacheKey;

use super::FileSource;

/// Reads textures from a directory on disk.
///
/// Relative keys resolve against `root`; absolute keys are used as-is.
#[derive(Debug, Clone)]
pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, key: &CacheKey) -> PathBuf {
        let path = Path::new(key.as_str());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl FileSource for DiskSource {
    fn exists(&self, key: &CacheKey) -> bool {
        self.resolve(key).is_file()
    }

    fn read_all(&self, key: &CacheKey) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(key))
    }
}
