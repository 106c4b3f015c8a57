//! Scratch profile files for CLI tests.

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

pub(super) struct ScratchProfiles {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl ScratchProfiles {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        Self {
            path: root.join(".pgis").join("databases.toml"),
            _dir: dir,
        }
    }

    pub(super) fn path(&self) -> &Utf8Path {
        &self.path
    }
}
