//! Per-session artifact spool. Each session writes its STL to a uniquely
//! named file and removes it when the session ends, success or not.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

#[derive(Debug)]
pub struct SpoolFile {
    path: PathBuf,
}

impl SpoolFile {
    pub fn create(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("part-{}.stl", Uuid::new_v4())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        fs::write(&self.path, bytes)
    }

    pub fn read_back(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        // Missing file is fine; the guard runs on failure paths too.
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::SpoolFile;

    #[test]
    fn write_read_back_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let spool = SpoolFile::create(dir.path());
        spool.write(b"solid bytes").expect("write should succeed");
        assert_eq!(spool.read_back().expect("read should succeed"), b"solid bytes");
    }

    #[test]
    fn file_is_removed_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = {
            let spool = SpoolFile::create(dir.path());
            spool.write(b"x").expect("write should succeed");
            assert!(spool.path().exists());
            spool.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn drop_without_write_is_harmless() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let spool = SpoolFile::create(dir.path());
        drop(spool);
        assert_eq!(
            std::fs::read_dir(dir.path())
                .expect("dir should list")
                .count(),
            0
        );
    }

    #[test]
    fn concurrent_sessions_get_distinct_names() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let a = SpoolFile::create(dir.path());
        let b = SpoolFile::create(dir.path());
        assert_ne!(a.path(), b.path());
    }
}
