//! Snapshot ("dump") serialization
//!
//! File layout, little-endian, unpadded:
//!
//! ```text
//! sig[4]            magic bytes, exactly DUMP_SIG
//! version[4]        ASCII digits, zero-padded decimal of DUMP_VERSION
//! rcrd_cnt          u64
//! then rcrd_cnt records:
//!   key[KEY_SIZE]   raw bytes, zero-padded past the live length
//!   data_size       u64
//!   data[data_size] raw bytes
//! ```
//!
//! The format carries no key length, fingerprint, content type, or chain
//! framing: on load each record goes back through put, which re-derives the
//! length (trailing zeros terminate the key) and the fingerprint, and
//! resets the content type to the default. Slot placement is likewise
//! re-derived, so dumps survive table-size changes between save and load.
//!
//! Saves write `<dump_file>-tmp`, sync, then rename over the committed
//! path, so a reader of that path never observes a partial snapshot.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use pantry_core::config::KEY_SIZE;
use pantry_core::{Error, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Magic bytes opening every dump file.
pub const DUMP_SIG: [u8; 4] = *b"PNTR";

/// Format version, serialized as four zero-padded ASCII digits.
pub const DUMP_VERSION: u32 = 1;

/// One deserialized dump record: the padded key block and the value.
pub struct DumpRecord {
    /// Zero-padded key block; the live length is up to the first zero byte.
    pub key: [u8; KEY_SIZE],
    /// The stored value.
    pub data: Vec<u8>,
}

/// Serialize `record_count` records to `path` atomically.
///
/// Writes to `<path>-tmp`, flushes and syncs, then renames onto `path`.
/// Any failure unlinks the temp file and propagates. A mismatch between
/// `record_count` and the records actually yielded is a corruption error
/// (the header count must equal the records that follow it).
pub fn save_atomic<'a, I>(path: &Path, record_count: u64, records: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a [u8; KEY_SIZE], &'a [u8])>,
{
    let tmp = tmp_path(path);
    debug!(path = %path.display(), tmp = %tmp.display(), "writing snapshot");

    // A stale temp file means a previous save died; replace it.
    if tmp.exists() {
        warn!(path = %tmp.display(), "removing stale snapshot temp file");
        let _ = fs::remove_file(&tmp);
    }

    let result = write_records(&tmp, record_count, records);
    match result {
        Ok(bytes) => match fs::rename(&tmp, path) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    records = record_count,
                    bytes,
                    "snapshot written"
                );
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                Err(e.into())
            }
        },
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// The transient sibling of a dump path: `<path>-tmp`.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push("-tmp");
    PathBuf::from(os)
}

fn write_records<'a, I>(tmp: &Path, record_count: u64, records: I) -> Result<u64>
where
    I: IntoIterator<Item = (&'a [u8; KEY_SIZE], &'a [u8])>,
{
    let file = File::create(tmp)?;
    let mut w = BufWriter::new(file);

    w.write_all(&DUMP_SIG)?;
    w.write_all(format!("{DUMP_VERSION:04}").as_bytes())?;
    w.write_u64::<LittleEndian>(record_count)?;

    let mut written = 0u64;
    for (key, data) in records {
        w.write_all(key)?;
        w.write_u64::<LittleEndian>(data.len() as u64)?;
        w.write_all(data)?;
        written += 1;
    }
    if written != record_count {
        return Err(Error::corrupt(format!(
            "snapshot produced {written} records but the header promised {record_count}"
        )));
    }

    w.flush()?;
    let file = w.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;
    let bytes = file.metadata()?.len();
    Ok(bytes)
}

/// Validating reader over a dump file.
///
/// `open` consumes and checks the header; the reader then iterates records,
/// surfacing truncation as a corruption error.
pub struct DumpReader {
    reader: BufReader<File>,
    record_count: u64,
    yielded: u64,
}

impl DumpReader {
    /// Open `path` and validate its header. A wrong magic or version fails
    /// here, before any record is produced.
    pub fn open(path: &Path) -> Result<DumpReader> {
        debug!(path = %path.display(), "opening snapshot");
        let mut reader = BufReader::new(File::open(path)?);

        let mut sig = [0u8; 4];
        reader
            .read_exact(&mut sig)
            .map_err(|e| truncated(e, "magic"))?;
        if sig != DUMP_SIG {
            return Err(Error::BadMagic { found: sig });
        }

        let mut version_digits = [0u8; 4];
        reader
            .read_exact(&mut version_digits)
            .map_err(|e| truncated(e, "version"))?;
        let version: u32 = std::str::from_utf8(&version_digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::corrupt("version field is not four decimal digits"))?;
        if version != DUMP_VERSION {
            return Err(Error::UnsupportedVersion {
                expected: DUMP_VERSION,
                found: version,
            });
        }

        let record_count = reader
            .read_u64::<LittleEndian>()
            .map_err(|e| truncated(e, "record count"))?;

        Ok(DumpReader {
            reader,
            record_count,
            yielded: 0,
        })
    }

    /// Number of records the header promises.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    fn read_record(&mut self) -> Result<DumpRecord> {
        let context = self.yielded;
        let mut key = [0u8; KEY_SIZE];
        self.reader
            .read_exact(&mut key)
            .map_err(|e| truncated_record(e, context, "key"))?;
        let data_size = self
            .reader
            .read_u64::<LittleEndian>()
            .map_err(|e| truncated_record(e, context, "data size"))?;
        let mut data = vec![0u8; data_size as usize];
        self.reader
            .read_exact(&mut data)
            .map_err(|e| truncated_record(e, context, "data"))?;
        Ok(DumpRecord { key, data })
    }
}

impl Iterator for DumpReader {
    type Item = Result<DumpRecord>;

    fn next(&mut self) -> Option<Result<DumpRecord>> {
        if self.yielded == self.record_count {
            return None;
        }
        let record = self.read_record();
        if record.is_ok() {
            self.yielded += 1;
        }
        Some(record)
    }
}

fn truncated(e: io::Error, what: &str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::corrupt(format!("dump ends inside the {what}"))
    } else {
        Error::Io(e)
    }
}

fn truncated_record(e: io::Error, index: u64, what: &str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::corrupt(format!("dump ends inside the {what} of record {index}"))
    } else {
        Error::Io(e)
    }
}
