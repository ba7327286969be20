use std::path::{Path, PathBuf};
use std::{fs, io};

use log::debug;

/// A storage destination for extracted payloads. Implemented for plain
/// directories; a different backend only has to accept `(filename, bytes)`
/// pairs.
pub trait Sink {
    fn persist(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Writes payloads as files under a single directory, created on
/// construction if absent. Identical filenames overwrite earlier writes.
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(DirSink { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Sink for DirSink {
    fn persist(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.join(filename);
        fs::write(&path, bytes)?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn creates_directory_and_writes_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let sink = DirSink::new(tmp.path().join("request")).expect("create sink");

        assert!(sink.dir().is_dir());

        let path = sink.persist("a.bin", b"payload").expect("persist");
        assert_eq!(b"payload".to_vec(), fs::read(path).expect("read back"));
    }

    #[test]
    fn identical_filenames_overwrite() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let sink = DirSink::new(tmp.path()).expect("create sink");

        sink.persist("x.png", b"first").expect("persist first");
        let path = sink.persist("x.png", b"second").expect("persist second");

        assert_eq!(b"second".to_vec(), fs::read(path).expect("read back"));
    }
}
