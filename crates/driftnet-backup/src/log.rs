use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use driftnet_types::{Fingerprint, Item};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BackupError, BackupResult};
use crate::traits::{BackupEntry, BackupStore};

/// One record in the backup log.
///
/// On-disk format per record:
/// ```text
/// [4 bytes: record length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized Record)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum Record {
    /// An item recorded ahead of its first submission.
    Put { key: Fingerprint, item: Item },
    /// Tombstone: the item under `key` was confirmed and retired.
    Delete { key: Fingerprint },
}

/// Flush/sync strategy for the backup log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every write. The default: the store exists to survive
    /// a crash between submission and confirmation.
    EveryWrite,
    /// Rely on OS page-cache buffering. Weakens the crash guarantee.
    OsDefault,
}

impl Default for SyncMode {
    fn default() -> Self {
        Self::EveryWrite
    }
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct LogWriter {
    writer: BufWriter<File>,
    /// Current write offset in the log file.
    offset: u64,
}

/// Crash-recoverable backup store backed by an append-only log.
///
/// Puts and deletes are appended as framed records. Replay reads the file
/// front-to-back and resolves tombstones; records that fail the CRC check
/// or are cut short by a torn write are skipped with a warning. The live
/// set is also mirrored in memory so `delete` and `len` need no file reads.
pub struct FileBackupStore {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    /// Live keys, mirrored from the log for cheap membership checks.
    live: Mutex<HashMap<Fingerprint, ()>>,
    sync_mode: SyncMode,
}

impl FileBackupStore {
    /// Open (or create) a backup log at the given path and recover the
    /// live-key index from it.
    ///
    /// A torn tail left by a crash mid-write is truncated away, so the next
    /// append lands at a well-framed offset.
    pub fn open(path: &Path, sync_mode: SyncMode) -> BackupResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        let file_len = file.metadata()?.len();
        let (_, valid_len) = scan_records(path)?;
        if valid_len < file_len {
            warn!(
                path = %path.display(),
                discarded = file_len - valid_len,
                "truncating torn tail of backup log"
            );
            file.set_len(valid_len)?;
        }
        file.seek(SeekFrom::End(0))?;

        let store = Self {
            path: path.to_path_buf(),
            writer: Mutex::new(LogWriter {
                writer: BufWriter::new(file),
                offset: valid_len,
            }),
            live: Mutex::new(HashMap::new()),
            sync_mode,
        };

        let entries = store.replay()?;
        let mut live = store.live.lock().expect("live index lock poisoned");
        for entry in &entries {
            live.insert(entry.key, ());
        }
        drop(live);

        debug!(path = %path.display(), live = entries.len(), "backup log opened");
        Ok(store)
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the log so it contains only live entries.
    ///
    /// Shrinks a log that has accumulated many tombstones. The writer lock
    /// is held across both the read and the rewrite, so an append can
    /// never land between them and be destroyed by the truncation.
    pub fn compact(&self) -> BackupResult<()> {
        let mut w = self.writer.lock().expect("backup log lock poisoned");
        w.writer.flush()?;
        let (records, _) = scan_records(&self.path)?;
        let entries = resolve_records(records);

        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        let mut offset = 0u64;
        for entry in entries {
            let record = Record::Put {
                key: entry.key,
                item: entry.item,
            };
            offset += write_record(&mut writer, &record)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;

        w.writer = writer;
        w.offset = offset;
        debug!(bytes = offset, "backup log compacted");
        Ok(())
    }

    fn append(&self, record: &Record) -> BackupResult<()> {
        let mut w = self.writer.lock().expect("backup log lock poisoned");
        let written = write_record(&mut w.writer, record)?;
        w.writer.flush()?;
        if self.sync_mode == SyncMode::EveryWrite {
            w.writer.get_ref().sync_all()?;
        }
        w.offset += written;
        Ok(())
    }

}

/// Read all decodable records front-to-back.
///
/// Returns the records and the length of the well-framed prefix: a record
/// that fails its CRC or refuses to deserialize is skipped but still
/// well-framed, while an invalid length or a tail cut short by a torn
/// write ends the scan there.
fn scan_records(path: &Path) -> BackupResult<(Vec<Record>, u64)> {
    let mut file = BufReader::new(File::open(path)?);
    let file_len = file.get_ref().metadata()?.len();
    let mut records = Vec::new();
    let mut offset: u64 = 0;

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

        if length == 0 || (offset + HEADER_SIZE as u64 + length as u64) > file_len {
            warn!(offset, length, file_len, "invalid backup record length; stopping recovery");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match file.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, "truncated backup record; stopping recovery");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(offset, expected = expected_crc, actual = actual_crc, "CRC mismatch; skipping record");
            offset += HEADER_SIZE as u64 + length as u64;
            continue;
        }

        match bincode::deserialize::<Record>(&payload) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(offset, error = %e, "failed to deserialize backup record; skipping");
            }
        }

        offset += HEADER_SIZE as u64 + length as u64;
    }

    Ok((records, offset))
}

/// Resolve tombstones: live entries in first-insertion order, latest
/// value wins.
fn resolve_records(records: Vec<Record>) -> Vec<BackupEntry> {
    let mut items: HashMap<Fingerprint, Item> = HashMap::new();
    let mut order: Vec<Fingerprint> = Vec::new();
    for record in records {
        match record {
            Record::Put { key, item } => {
                if items.insert(key, item).is_none() {
                    order.push(key);
                }
            }
            Record::Delete { key } => {
                items.remove(&key);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| items.remove(&key).map(|item| BackupEntry { key, item }))
        .collect()
}

fn write_record(writer: &mut BufWriter<File>, record: &Record) -> BackupResult<u64> {
    let payload =
        bincode::serialize(record).map_err(|e| BackupError::Serialization(e.to_string()))?;
    let length = payload.len() as u32;
    let crc = crc32fast::hash(&payload);

    writer.write_all(&length.to_le_bytes())?;
    writer.write_all(&crc.to_le_bytes())?;
    writer.write_all(&payload)?;
    Ok(HEADER_SIZE as u64 + payload.len() as u64)
}

impl BackupStore for FileBackupStore {
    fn put(&self, key: Fingerprint, item: &Item) -> BackupResult<()> {
        self.append(&Record::Put {
            key,
            item: item.clone(),
        })?;
        self.live.lock().expect("live index lock poisoned").insert(key, ());
        Ok(())
    }

    fn delete(&self, key: Fingerprint) -> BackupResult<bool> {
        let existed = self
            .live
            .lock()
            .expect("live index lock poisoned")
            .remove(&key)
            .is_some();
        if existed {
            self.append(&Record::Delete { key })?;
        }
        Ok(existed)
    }

    fn replay(&self) -> BackupResult<Vec<BackupEntry>> {
        let (records, _) = scan_records(&self.path)?;
        Ok(resolve_records(records))
    }

    fn len(&self) -> BackupResult<usize> {
        Ok(self.live.lock().expect("live index lock poisoned").len())
    }
}
