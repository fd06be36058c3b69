use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ichnaea_types::DatasetPath;
use tempfile::NamedTempFile;

/// Current content of every tracked path, as plain files.
///
/// Files are replaced atomically (temp file, fsync, rename) so a reader sees
/// either the previous or the new content.
#[derive(Debug, Clone)]
pub struct Worktree {
    root: PathBuf,
}

impl Worktree {
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_path(&self, path: &DatasetPath) -> PathBuf {
        self.root.join(path.to_relative_path())
    }

    /// Replace the working copy of `path` with `data`.
    pub fn write(&self, path: &DatasetPath, data: &[u8]) -> io::Result<()> {
        let mut temp = self.temp_for(path)?;
        temp.write_all(data)?;
        self.publish(temp, path)
    }

    /// Replace the working copy of `path` with the contents of `source`.
    pub fn copy_from(&self, path: &DatasetPath, source: &Path) -> io::Result<()> {
        let mut temp = self.temp_for(path)?;
        io::copy(&mut std::fs::File::open(source)?, &mut temp)?;
        self.publish(temp, path)
    }

    /// Read the working copy, if present.
    pub fn read(&self, path: &DatasetPath) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.file_path(path)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn temp_for(&self, path: &DatasetPath) -> io::Result<NamedTempFile> {
        let target = self.file_path(path);
        let dir = target.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(dir)?;
        NamedTempFile::new_in(dir)
    }

    fn publish(&self, temp: NamedTempFile, path: &DatasetPath) -> io::Result<()> {
        temp.as_file().sync_all()?;
        temp.persist(self.file_path(path)).map_err(|e| e.error)?;
        Ok(())
    }
}
