//! The database handle
//!
//! A `Database` owns the in-memory index, the feature mask, the file
//! layout, and (when enabled) the append-only log writer. Opening a handle
//! runs recovery; everything after open mutates memory first and disk
//! second.
//!
//! State machine: the handle is in `Startup` from construction until open
//! returns, and `Serving` afterwards. Mutations applied while in `Startup`
//! (log replay, in practice) are never themselves logged, which is what
//! keeps replay from recursing into the log.

use crate::features::Features;
use crate::paths::DbPaths;
use chrono::{DateTime, Utc};
use pantry_core::config::{self, DEFAULT_CONTENT_TYPE, KEY_SIZE};
use pantry_core::{Error, KeyBuf, Result};
use pantry_durability::aol::{AolReader, AolRecord, AolWriter};
use pantry_durability::dump::{self, DumpReader};
use pantry_storage::{Bucket, HashTable};
use std::fs;
use std::path::Path;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbState {
    /// Open has not returned yet; replayed mutations are not logged.
    Startup,
    /// Open returned; every mutation is logged when the log is enabled.
    Serving,
}

/// An open database.
///
/// Not safe for concurrent mutation; callers serialize access externally.
/// The handle owns every bucket, the slot array, and the log writer; close
/// (or drop) releases them.
pub struct Database {
    name: String,
    paths: DbPaths,
    created: DateTime<Utc>,
    table: HashTable,
    features: Features,
    state: DbState,
    aol: Option<AolWriter>,
}

impl Database {
    /// Open (or create) the database `name` under `dir`.
    ///
    /// The directory is created if missing. With
    /// [`Features::APPEND_ONLY`] set, the existing log is replayed into
    /// the index before the handle is returned; a replay failure fails the
    /// open and yields no handle.
    pub fn open(dir: impl AsRef<Path>, name: &str, features: Features) -> Result<Database> {
        let dir = dir.as_ref();
        config::validate_name(name)?;
        config::validate_path(dir)?;
        debug!(name, dir = %dir.display(), "opening database");

        if !dir.is_dir() {
            fs::create_dir_all(dir)?;
        }

        let mut db = Database {
            name: name.to_string(),
            paths: DbPaths::new(dir, name),
            created: Utc::now(),
            table: HashTable::new(),
            features,
            state: DbState::Startup,
            aol: None,
        };

        if features.contains(Features::APPEND_ONLY) {
            db.aol = Some(AolWriter::open(&db.paths.aol_file())?);
            db.replay_aol()?;
        }
        db.state = DbState::Serving;

        info!(
            name,
            dir = %dir.display(),
            records = db.table.record_count(),
            "database open"
        );
        Ok(db)
    }

    fn replay_aol(&mut self) -> Result<()> {
        let path = self.paths.aol_file();
        if !path.exists() {
            return Ok(());
        }
        let mut applied = 0u64;
        for record in AolReader::open(&path)? {
            match record? {
                AolRecord::Jar { key, data } => self.put(&key, &data)?,
                AolRecord::Scoop { key } => self.delete(&key)?,
            }
            applied += 1;
        }
        info!(records = applied, "append-only log replayed");
        Ok(())
    }

    /// Insert or update `key` with the default content type.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put_with_content_type(key, value, DEFAULT_CONTENT_TYPE)
    }

    /// Insert or update `key`, storing `content_type` verbatim.
    ///
    /// The key is normalized (truncated to `KEY_SIZE`, cut at the first
    /// zero byte) before anything else; two keys that normalize the same
    /// are the same record.
    pub fn put_with_content_type(
        &mut self,
        key: &[u8],
        value: &[u8],
        content_type: &[u8],
    ) -> Result<()> {
        let kb = KeyBuf::truncate(key);
        let hash = kb.fingerprint();

        if let Some(bucket) = self.table.find_mut(hash, &kb) {
            bucket.replace(value.to_vec(), content_type.to_vec());
            self.log_jar(&kb, value)?;
            return Ok(());
        }

        let bucket = Bucket::new(kb.clone(), hash, value.to_vec(), content_type.to_vec());
        self.table.insert(bucket);
        self.log_jar(&kb, value)?;
        Ok(())
    }

    /// Append a `JAR` record when the log is enabled and the handle is
    /// serving. Insert and update are logged identically; replay applies
    /// them as upserts.
    fn log_jar(&mut self, key: &KeyBuf, value: &[u8]) -> Result<()> {
        if self.aol_active() {
            if let Some(writer) = self.aol.as_mut() {
                writer.log_jar(key.as_bytes(), value)?;
            }
        }
        Ok(())
    }

    /// Look up `key` and borrow its value.
    ///
    /// The slice stays valid until the next mutation of that key or until
    /// the handle goes away; its length is the stored data size.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let kb = KeyBuf::truncate(key);
        self.table.find(kb.fingerprint(), &kb).map(|b| b.data())
    }

    /// Delete `key`.
    ///
    /// Returns [`Error::KeyNotFound`] when the key is absent. With the log
    /// enabled and the handle serving, the `SCOOP` record is appended after
    /// the bucket is unlinked and before it is dropped.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        let kb = KeyBuf::truncate(key);
        let bucket = self
            .table
            .remove(kb.fingerprint(), &kb)
            .ok_or(Error::KeyNotFound)?;

        if self.aol_active() {
            if let Some(writer) = self.aol.as_mut() {
                writer.log_scoop(bucket.key().as_bytes())?;
            }
        }
        Ok(())
    }

    /// Look up `key` and borrow its stored content type.
    pub fn content_type(&self, key: &[u8]) -> Option<&[u8]> {
        let kb = KeyBuf::truncate(key);
        self.table
            .find(kb.fingerprint(), &kb)
            .map(|b| b.content_type())
    }

    /// Seconds since the handle was opened.
    pub fn uptime(&self) -> i64 {
        (Utc::now() - self.created).num_seconds()
    }

    /// Set an expiry on `key`.
    ///
    /// Placeholder pending a TTL design: accepted and ignored.
    pub fn set_expire(&mut self, _key: &[u8], _expires_at: DateTime<Utc>) -> Result<()> {
        Ok(())
    }

    /// Write a snapshot of every record to the committed dump path,
    /// publishing it with an atomic rename.
    pub fn save(&self) -> Result<()> {
        dump::save_atomic(
            &self.paths.dump_file(),
            self.table.record_count() as u64,
            self.table.iter().map(|b| (b.key().padded(), b.data())),
        )
    }

    /// Snapshot on a worker thread.
    ///
    /// The records are copied out on the calling thread, so the worker
    /// writes a point-in-time image: mutations made after this returns do
    /// not appear in it. The worker publishes through the same atomic
    /// rename as [`save`](Self::save) and reports through the returned
    /// handle.
    pub fn background_save(&self) -> Result<JoinHandle<Result<()>>> {
        let records: Vec<([u8; KEY_SIZE], Vec<u8>)> = self
            .table
            .iter()
            .map(|b| (*b.key().padded(), b.data().to_vec()))
            .collect();
        let count = records.len() as u64;
        let path = self.paths.dump_file();

        let handle = thread::Builder::new()
            .name("pantry-dump".to_string())
            .spawn(move || {
                dump::save_atomic(&path, count, records.iter().map(|(k, d)| (k, d.as_slice())))
            })
            .map_err(Error::Io)?;

        info!(
            worker = ?handle.thread().id(),
            records = count,
            "background snapshot started"
        );
        Ok(handle)
    }

    /// Load a dump into this handle, record by record, through put.
    ///
    /// The header is validated before anything is applied; a bad magic or
    /// version leaves the index untouched. Content types reset to the
    /// default (the dump format does not carry them). The argument need
    /// not be this database's own dump file; any dump loads.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let reader = DumpReader::open(path.as_ref())?;
        let mut loaded = 0u64;
        for record in reader {
            let record = record?;
            self.put(&record.key[..], &record.data)?;
            loaded += 1;
        }
        info!(records = loaded, path = %path.as_ref().display(), "snapshot loaded");
        Ok(())
    }

    /// Snapshot, then close.
    pub fn close_and_save(self) -> Result<()> {
        self.save()?;
        self.close()
    }

    /// Close the handle: drop every bucket, then flush and sync the log.
    ///
    /// The freed-bucket count is checked against the record count; a
    /// mismatch is logged (it means the index was corrupted in memory).
    pub fn close(mut self) -> Result<()> {
        let expected = self.table.record_count();
        let freed = self.table.clear();
        if freed != expected {
            warn!(freed, expected, "freed bucket count disagrees with record count");
        }
        if let Some(writer) = self.aol.take() {
            writer.close()?;
        }
        debug!(name = %self.name, freed, "database closed");
        Ok(())
    }

    /// The database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file layout of this database.
    pub fn paths(&self) -> &DbPaths {
        &self.paths
    }

    /// Number of live records.
    pub fn record_count(&self) -> usize {
        self.table.record_count()
    }

    /// Cumulative count of insertions that landed in a non-empty slot.
    pub fn key_collisions(&self) -> u64 {
        self.table.key_collisions()
    }

    /// Current slot count of the index (a power of two).
    pub fn slot_count(&self) -> usize {
        self.table.slot_count()
    }

    /// Current size of the slot array in bytes.
    pub fn table_bytes(&self) -> usize {
        self.table.table_bytes()
    }

    /// Check a feature flag.
    pub fn is_enabled(&self, feature: Features) -> bool {
        self.features.contains(feature)
    }

    /// Set a feature flag.
    ///
    /// Enabling [`Features::APPEND_ONLY`] on a handle that was opened
    /// without it only resumes logging if a writer exists, i.e. it is a
    /// re-enable after [`disable`](Self::disable); the log is only ever
    /// opened during open.
    pub fn enable(&mut self, feature: Features) {
        self.features.insert(feature);
    }

    /// Clear a feature flag.
    pub fn disable(&mut self, feature: Features) {
        self.features.remove(feature);
    }

    fn aol_active(&self) -> bool {
        self.features.contains(Features::APPEND_ONLY) && self.state == DbState::Serving
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_directory() {
        let dir = tempdir().unwrap();
        let db_dir = dir.path().join("fresh");
        assert!(!db_dir.exists());
        let db = Database::open(&db_dir, "db", Features::NONE).unwrap();
        assert!(db_dir.is_dir());
        db.close().unwrap();
    }

    #[test]
    fn test_open_rejects_bad_name() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Database::open(dir.path(), "", Features::NONE),
            Err(Error::InvalidName { .. })
        ));
        assert!(matches!(
            Database::open(dir.path(), "a/b", Features::NONE),
            Err(Error::InvalidName { .. })
        ));
    }

    #[test]
    fn test_put_get_delete() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path(), "db", Features::NONE).unwrap();

        db.put(b"alpha", b"one").unwrap();
        assert_eq!(db.get(b"alpha"), Some(&b"one"[..]));
        assert_eq!(db.record_count(), 1);

        db.delete(b"alpha").unwrap();
        assert_eq!(db.get(b"alpha"), None);
        assert_eq!(db.record_count(), 0);
        assert!(matches!(db.delete(b"alpha"), Err(Error::KeyNotFound)));
        db.close().unwrap();
    }

    #[test]
    fn test_content_type_defaults_and_overrides() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path(), "db", Features::NONE).unwrap();

        db.put(b"plain", b"v").unwrap();
        assert_eq!(db.content_type(b"plain"), Some(DEFAULT_CONTENT_TYPE));

        db.put_with_content_type(b"typed", b"{}", b"application/json")
            .unwrap();
        assert_eq!(db.content_type(b"typed"), Some(&b"application/json"[..]));

        // Upsert with the shorthand resets the type to the default.
        db.put(b"typed", b"{}").unwrap();
        assert_eq!(db.content_type(b"typed"), Some(DEFAULT_CONTENT_TYPE));
        assert_eq!(db.content_type(b"absent"), None);
        db.close().unwrap();
    }

    #[test]
    fn test_save_then_load_into_fresh_db() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path(), "db", Features::NONE).unwrap();
        db.put_with_content_type(b"x", b"x's value", b"text/plain")
            .unwrap();
        db.put(b"y", b"why").unwrap();
        db.save().unwrap();
        let dump = db.paths().dump_file();
        db.close().unwrap();

        let other_dir = tempdir().unwrap();
        let mut fresh = Database::open(other_dir.path(), "other", Features::NONE).unwrap();
        fresh.load(&dump).unwrap();
        assert_eq!(fresh.record_count(), 2);
        assert_eq!(fresh.get(b"x"), Some(&b"x's value"[..]));
        assert_eq!(fresh.get(b"y"), Some(&b"why"[..]));
        // The dump format does not carry content types.
        assert_eq!(fresh.content_type(b"x"), Some(DEFAULT_CONTENT_TYPE));
        fresh.close().unwrap();
    }

    #[test]
    fn test_load_bad_magic_leaves_index_untouched() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path(), "db", Features::NONE).unwrap();
        db.put(b"keep", b"me").unwrap();

        let bogus = dir.path().join("bogus.dump");
        fs::write(&bogus, b"JUNKjunkjunkjunk").unwrap();
        assert!(matches!(db.load(&bogus), Err(Error::BadMagic { .. })));
        assert_eq!(db.record_count(), 1);
        assert_eq!(db.get(b"keep"), Some(&b"me"[..]));
        db.close().unwrap();
    }

    #[test]
    fn test_background_save_is_point_in_time() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path(), "db", Features::NONE).unwrap();
        db.put(b"before", b"1").unwrap();

        let worker = db.background_save().unwrap();
        // Foreground keeps mutating; the snapshot must not see this.
        db.put(b"after", b"2").unwrap();
        worker.join().expect("worker panicked").unwrap();

        let mut fresh = Database::open(dir.path(), "fresh", Features::NONE).unwrap();
        fresh.load(&db.paths().dump_file()).unwrap();
        assert_eq!(fresh.get(b"before"), Some(&b"1"[..]));
        assert_eq!(fresh.get(b"after"), None);
        fresh.close().unwrap();
        db.close().unwrap();
    }

    #[test]
    fn test_aol_replay_reconstructs_state() {
        let dir = tempdir().unwrap();
        {
            let mut db = Database::open(dir.path(), "db", Features::APPEND_ONLY).unwrap();
            db.put(b"a", b"1").unwrap();
            db.put(b"b", b"2").unwrap();
            db.delete(b"a").unwrap();
            db.close().unwrap();
        }
        let db = Database::open(dir.path(), "db", Features::APPEND_ONLY).unwrap();
        assert_eq!(db.get(b"a"), None);
        assert_eq!(db.get(b"b"), Some(&b"2"[..]));
        assert_eq!(db.record_count(), 1);
        db.close().unwrap();
    }

    #[test]
    fn test_replay_does_not_append_to_the_log() {
        let dir = tempdir().unwrap();
        {
            let mut db = Database::open(dir.path(), "db", Features::APPEND_ONLY).unwrap();
            db.put(b"a", b"1").unwrap();
            db.put(b"b", b"2").unwrap();
            db.close().unwrap();
        }
        let aol = DbPaths::new(dir.path(), "db").aol_file();
        let len_before = fs::metadata(&aol).unwrap().len();

        let db = Database::open(dir.path(), "db", Features::APPEND_ONLY).unwrap();
        let len_after = fs::metadata(&aol).unwrap().len();
        assert_eq!(len_before, len_after, "replay must not grow the log");
        db.close().unwrap();
    }

    #[test]
    fn test_corrupt_aol_fails_open() {
        let dir = tempdir().unwrap();
        let aol = DbPaths::new(dir.path(), "db").aol_file();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(&aol, b"JAR 5:hel").unwrap();
        assert!(matches!(
            Database::open(dir.path(), "db", Features::APPEND_ONLY),
            Err(Error::Corrupt { .. })
        ));
    }

    #[test]
    fn test_mutations_without_feature_do_not_touch_log() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path(), "db", Features::NONE).unwrap();
        db.put(b"a", b"1").unwrap();
        db.delete(b"a").unwrap();
        let db_paths = db.paths().clone();
        db.close().unwrap();
        assert!(!db_paths.aol_file().exists());
    }

    #[test]
    fn test_disable_pauses_logging() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path(), "db", Features::APPEND_ONLY).unwrap();
        db.put(b"logged", b"1").unwrap();
        db.disable(Features::APPEND_ONLY);
        db.put(b"unlogged", b"2").unwrap();
        db.enable(Features::APPEND_ONLY);
        db.close().unwrap();

        let db = Database::open(dir.path(), "db", Features::APPEND_ONLY).unwrap();
        assert_eq!(db.get(b"logged"), Some(&b"1"[..]));
        assert_eq!(db.get(b"unlogged"), None);
        db.close().unwrap();
    }

    #[test]
    fn test_uptime_and_set_expire() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path(), "db", Features::NONE).unwrap();
        assert!(db.uptime() >= 0);
        db.put(b"k", b"v").unwrap();
        db.set_expire(b"k", Utc::now()).unwrap();
        // Expiry is a placeholder; the record stays.
        assert_eq!(db.get(b"k"), Some(&b"v"[..]));
        db.close().unwrap();
    }

    #[test]
    fn test_close_and_save_writes_dump() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path(), "db", Features::NONE).unwrap();
        db.put(b"k", b"v").unwrap();
        let paths = db.paths().clone();
        db.close_and_save().unwrap();
        assert!(paths.dump_file().exists());
        assert!(!paths.dump_tmp_file().exists());
    }
}
