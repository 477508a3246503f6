//! Append-only command log
//!
//! One text command per mutation, framed by a trailing newline:
//!
//! ```text
//! JAR <key> <data>      insert or update
//! SCOOP <key>           delete
//! ```
//!
//! Operands are length-prefixed as `<decimal len>:<raw bytes>` and
//! separated by a single space, so arbitrary binary keys and values are
//! safe to log; the reader consumes exactly `len` bytes per operand and
//! never scans the payload for delimiters. Example record:
//! `JAR 5:hello 3:one\n`.
//!
//! `JAR` covers insert and update alike; replay applies it as an upsert,
//! so the distinction never needs to be recorded.
//!
//! The engine appends a record *after* the in-memory mutation has been
//! applied and flushes it before the mutation returns. On open the log is
//! replayed front to back; a malformed record aborts the replay, which is
//! fatal to open.

use pantry_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const CMD_JAR: &[u8] = b"JAR";
const CMD_SCOOP: &[u8] = b"SCOOP";

/// One replayed log record.
pub enum AolRecord {
    /// Insert or update `key` with `data`.
    Jar {
        /// The record's key bytes.
        key: Vec<u8>,
        /// The record's value bytes.
        data: Vec<u8>,
    },
    /// Delete `key`.
    Scoop {
        /// The record's key bytes.
        key: Vec<u8>,
    },
}

/// Appending writer over the command log.
pub struct AolWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl AolWriter {
    /// Open the log for appending, creating it if absent.
    pub fn open(path: &Path) -> Result<AolWriter> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(path = %path.display(), "append-only log open");
        Ok(AolWriter {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a `JAR` record. Used for inserts and updates alike.
    pub fn log_jar(&mut self, key: &[u8], data: &[u8]) -> Result<()> {
        self.writer.write_all(CMD_JAR)?;
        write_operand(&mut self.writer, key)?;
        write_operand(&mut self.writer, data)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Append a `SCOOP` record.
    pub fn log_scoop(&mut self, key: &[u8]) -> Result<()> {
        self.writer.write_all(CMD_SCOOP)?;
        write_operand(&mut self.writer, key)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flush buffered records and sync the file to disk.
    pub fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

fn write_operand(w: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
    write!(w, " {}:", bytes.len())?;
    w.write_all(bytes)
}

/// Sequential reader over the command log, for replay on open.
pub struct AolReader {
    reader: BufReader<File>,
    records_read: u64,
}

impl AolReader {
    /// Open an existing log for replay.
    pub fn open(path: &Path) -> Result<AolReader> {
        debug!(path = %path.display(), "replaying append-only log");
        Ok(AolReader {
            reader: BufReader::new(File::open(path)?),
            records_read: 0,
        })
    }

    fn read_record(&mut self) -> Result<Option<AolRecord>> {
        let mut cmd = Vec::new();
        let n = self.reader.read_until(b' ', &mut cmd)?;
        if n == 0 {
            return Ok(None);
        }
        if cmd.last() != Some(&b' ') {
            return Err(self.malformed("log ends inside a command name"));
        }
        cmd.pop();

        let record = match cmd.as_slice() {
            CMD_JAR => {
                let key = self.read_operand()?;
                self.expect_byte(b' ')?;
                let data = self.read_operand()?;
                self.expect_byte(b'\n')?;
                AolRecord::Jar { key, data }
            }
            CMD_SCOOP => {
                let key = self.read_operand()?;
                self.expect_byte(b'\n')?;
                AolRecord::Scoop { key }
            }
            other => {
                return Err(self.malformed(format!(
                    "unknown command {:?}",
                    String::from_utf8_lossy(other)
                )));
            }
        };
        self.records_read += 1;
        Ok(Some(record))
    }

    fn read_operand(&mut self) -> Result<Vec<u8>> {
        let mut len_digits = Vec::new();
        self.reader.read_until(b':', &mut len_digits)?;
        if len_digits.last() != Some(&b':') {
            return Err(self.malformed("unterminated operand length"));
        }
        len_digits.pop();
        let len: usize = std::str::from_utf8(&len_digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.malformed("operand length is not decimal"))?;

        let mut bytes = vec![0u8; len];
        self.reader
            .read_exact(&mut bytes)
            .map_err(|e| self.eof_as_malformed(e, "log ends inside an operand"))?;
        Ok(bytes)
    }

    fn expect_byte(&mut self, want: u8) -> Result<()> {
        let mut got = [0u8; 1];
        self.reader
            .read_exact(&mut got)
            .map_err(|e| self.eof_as_malformed(e, "log ends inside a record"))?;
        if got[0] != want {
            return Err(self.malformed(format!(
                "expected separator {:?}, found {:?}",
                want as char, got[0] as char
            )));
        }
        Ok(())
    }

    fn malformed(&self, detail: impl std::fmt::Display) -> Error {
        Error::corrupt(format!("log record {}: {detail}", self.records_read))
    }

    fn eof_as_malformed(&self, e: io::Error, detail: &str) -> Error {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            self.malformed(detail)
        } else {
            Error::Io(e)
        }
    }
}

impl Iterator for AolReader {
    type Item = Result<AolRecord>;

    fn next(&mut self) -> Option<Result<AolRecord>> {
        self.read_record().transpose()
    }
}
