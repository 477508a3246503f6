//! Database file layout
//!
//! A database lives in one directory:
//!
//! ```text
//! <dir>/
//! ├── <name>.dump       committed snapshot
//! ├── <name>.dump-tmp   transient, only during a save
//! └── <name>.aol        append-only command log
//! ```

use pantry_durability::dump;
use std::path::{Path, PathBuf};

/// Derives every file path of a database from its directory and name.
#[derive(Debug, Clone)]
pub struct DbPaths {
    dir: PathBuf,
    name: String,
}

impl DbPaths {
    /// Paths for database `name` under `dir`.
    pub fn new(dir: impl AsRef<Path>, name: &str) -> DbPaths {
        DbPaths {
            dir: dir.as_ref().to_path_buf(),
            name: name.to_string(),
        }
    }

    /// The database directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The committed snapshot path.
    pub fn dump_file(&self) -> PathBuf {
        self.dir.join(format!("{}.dump", self.name))
    }

    /// The transient snapshot path used during a save.
    pub fn dump_tmp_file(&self) -> PathBuf {
        dump::tmp_path(&self.dump_file())
    }

    /// The append-only log path.
    pub fn aol_file(&self) -> PathBuf {
        self.dir.join(format!("{}.aol", self.name))
    }
}
