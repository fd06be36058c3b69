use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ichnaea_types::CommitId;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{HistoryError, HistoryResult};
use crate::record::VersionRecord;

/// One durable history event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntry {
    /// A new record was appended to its path's chain.
    Committed(VersionRecord),
    /// A record was accepted by the replica.
    Synced(CommitId),
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct JournalWriter {
    file: File,
    offset: u64,
}

/// Crash-recoverable history journal.
///
/// On-disk format, repeated per entry:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized JournalEntry)]
/// ```
/// Each append writes its whole frame straight to the file and fsyncs it
/// before returning; a failed append truncates the file back to where the
/// frame started. On recovery the file is read front-to-back. A damaged
/// final frame is a torn write and is cut off; damage before the final
/// frame is reported as [`HistoryError::Corrupt`].
pub struct Journal {
    path: PathBuf,
    writer: Mutex<JournalWriter>,
}

impl Journal {
    /// Open (or create) the journal file at `path`.
    pub fn open(path: &Path) -> HistoryResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(JournalWriter { file, offset }),
        })
    }

    /// Append one entry durably. Returns the byte offset of the entry.
    ///
    /// On error nothing of the entry remains in the journal.
    pub fn append(&self, entry: &JournalEntry) -> HistoryResult<u64> {
        let payload =
            bincode::serialize(entry).map_err(|e| HistoryError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| HistoryError::Serialization(format!("entry of {} bytes is too large", payload.len())))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut w = self.writer.lock().map_err(|_| HistoryError::LockPoisoned)?;
        let entry_offset = w.offset;

        let written = (&w.file)
            .write_all(&frame)
            .and_then(|()| w.file.sync_data());
        if let Err(e) = written {
            if let Err(rollback) = w.file.set_len(entry_offset) {
                warn!(offset = entry_offset, error = %rollback, "could not roll back failed journal append");
            }
            return Err(e.into());
        }

        w.offset += frame.len() as u64;
        debug!(offset = entry_offset, len = payload.len(), "journal append");
        Ok(entry_offset)
    }

    /// Recover every entry, oldest first.
    pub fn recover(&self) -> HistoryResult<Vec<JournalEntry>> {
        let mut file = BufReader::new(File::open(&self.path)?);
        let file_len = file.get_ref().metadata()?.len();
        let mut entries = Vec::new();
        let mut offset: u64 = 0;
        let mut torn_at = None;

        while offset + HEADER_SIZE as u64 <= file_len {
            file.seek(SeekFrom::Start(offset))?;

            let mut header = [0u8; HEADER_SIZE];
            match file.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            let frame_end = offset + HEADER_SIZE as u64 + length as u64;

            if frame_end > file_len {
                warn!(offset, length, file_len, "torn journal entry; truncating");
                torn_at = Some(offset);
                break;
            }
            let is_last = frame_end == file_len;

            let mut payload = vec![0u8; length as usize];
            file.read_exact(&mut payload)?;

            let actual_crc = crc32fast::hash(&payload);
            let decoded = if length == 0 || actual_crc != expected_crc {
                None
            } else {
                bincode::deserialize::<JournalEntry>(&payload).ok()
            };

            match decoded {
                Some(entry) => entries.push(entry),
                None if is_last => {
                    warn!(offset, expected = expected_crc, actual = actual_crc, "damaged final journal entry; truncating");
                    torn_at = Some(offset);
                    break;
                }
                None => {
                    error!(offset, expected = expected_crc, actual = actual_crc, "damaged journal entry");
                    return Err(HistoryError::Corrupt {
                        journal: self.path.clone(),
                        offset,
                    });
                }
            }

            offset = frame_end;
        }

        if torn_at.is_none() && offset < file_len {
            // Fewer than HEADER_SIZE trailing bytes.
            torn_at = Some(offset);
        }
        if let Some(end) = torn_at {
            self.truncate_to(end)?;
        }

        debug!(recovered = entries.len(), "journal recovery complete");
        Ok(entries)
    }

    /// Drop everything after `end` so later appends start on a frame boundary.
    fn truncate_to(&self, end: u64) -> HistoryResult<()> {
        let mut w = self.writer.lock().map_err(|_| HistoryError::LockPoisoned)?;
        w.file.set_len(end)?;
        w.file.sync_all()?;
        w.offset = end;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal").field("path", &self.path).finish()
    }
}
