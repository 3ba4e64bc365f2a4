//! Event log collaborators
//!
//! The log is global across databases: ids are assigned in commit order by a
//! single sequence, and range reads filter by database.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use super::event::{EventId, EventPayload, ReplicationEvent};
use crate::catalog::normalize_name;
use crate::errors::{ReplError, ReplResult};

/// Ordered, append-only log of replication events
pub trait EventStore: Send + Sync {
    /// Append an event and return its id.
    fn append(&self, database: &str, payload: EventPayload) -> ReplResult<EventId>;

    /// Highest id assigned so far, `EventId::ZERO` when the log is empty.
    fn latest(&self) -> ReplResult<EventId>;

    /// Events of `database` with `after < id <= upto`, in id order.
    ///
    /// `after = None` starts at the first event, `upto = None` runs to the
    /// end of the log.
    fn read_range(
        &self,
        database: &str,
        after: Option<EventId>,
        upto: Option<EventId>,
    ) -> ReplResult<Vec<ReplicationEvent>>;
}

fn in_range(
    event: &ReplicationEvent,
    database: &str,
    after: Option<EventId>,
    upto: Option<EventId>,
) -> bool {
    event.database == database
        && after.map_or(true, |a| event.id > a)
        && upto.map_or(true, |u| event.id <= u)
}

/// In-memory event log
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: RwLock<Vec<ReplicationEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl EventStore for MemoryEventLog {
    fn append(&self, database: &str, payload: EventPayload) -> ReplResult<EventId> {
        let mut events = self.events.write();
        let id = events.last().map_or(EventId(1), |e| e.id.next());
        events.push(ReplicationEvent::new(id, database, payload));
        Ok(id)
    }

    fn latest(&self) -> ReplResult<EventId> {
        Ok(self.events.read().last().map_or(EventId::ZERO, |e| e.id))
    }

    fn read_range(
        &self,
        database: &str,
        after: Option<EventId>,
        upto: Option<EventId>,
    ) -> ReplResult<Vec<ReplicationEvent>> {
        let database = normalize_name(database);
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| in_range(e, &database, after, upto))
            .cloned()
            .collect())
    }
}

/// Append target of a `FileEventLog`
trait LogFile: Write + Send {
    fn size(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl LogFile for File {
    fn size(&self) -> io::Result<u64> {
        self.metadata().map(|m| m.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.sync_all()
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

struct LogWriter {
    file: Box<dyn LogFile>,
    last: EventId,
    /// Set when a failed append could not be rolled back
    poisoned: bool,
}

/// Result of reading the log file
#[derive(Default)]
struct LogScan {
    events: Vec<ReplicationEvent>,
    /// Bytes up to the end of the last newline-terminated record
    valid_len: u64,
    /// An unterminated record follows `valid_len`
    torn_tail: bool,
}

/// Event log persisted as JSON lines, fsynced after every append.
///
/// A record counts once its terminating newline is on disk. An append that
/// fails is cut back off the file, and an unterminated last line left by a
/// crash is dropped when the log is opened.
///
/// Location: `<dir>/events.jsonl`
pub struct FileEventLog {
    path: PathBuf,
    writer: Mutex<LogWriter>,
}

impl FileEventLog {
    /// Opens or creates the log under `dir`.
    ///
    /// # Errors
    ///
    /// Returns `ReplError::StorageRead` if an existing log cannot be scanned,
    /// `ReplError::StorageWrite` if the file cannot be created or a torn
    /// last line cannot be cut off.
    pub fn open(dir: &Path) -> ReplResult<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            ReplError::StorageWrite(format!("create event log dir {}: {}", dir.display(), e))
        })?;
        let path = dir.join("events.jsonl");

        let scan = Self::scan(&path)?;
        let last = scan.events.last().map_or(EventId::ZERO, |e| e.id);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                ReplError::StorageWrite(format!("open event log {}: {}", path.display(), e))
            })?;

        if scan.torn_tail {
            warn!(
                path = %path.display(),
                valid_len = scan.valid_len,
                "dropping unterminated record at end of event log"
            );
            LogFile::truncate(&mut file, scan.valid_len).map_err(|e| {
                ReplError::StorageWrite(format!("truncate event log {}: {}", path.display(), e))
            })?;
        }

        debug!(path = %path.display(), last_event = %last, "opened event log");
        Ok(Self::with_file(path, Box::new(file), last))
    }

    fn with_file(path: PathBuf, file: Box<dyn LogFile>, last: EventId) -> Self {
        Self {
            path,
            writer: Mutex::new(LogWriter {
                file,
                last,
                poisoned: false,
            }),
        }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scan(path: &Path) -> ReplResult<LogScan> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LogScan::default()),
            Err(e) => {
                return Err(ReplError::StorageRead(format!(
                    "read event log {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut scan = LogScan::default();
        let mut offset = 0u64;
        for (idx, line) in bytes.split_inclusive(|b| *b == b'\n').enumerate() {
            // no newline: an append that never completed
            if !line.ends_with(b"\n") {
                scan.torn_tail = true;
                break;
            }
            offset += line.len() as u64;
            let body = &line[..line.len() - 1];
            if body.iter().all(u8::is_ascii_whitespace) {
                scan.valid_len = offset;
                continue;
            }
            let event: ReplicationEvent = serde_json::from_slice(body).map_err(|e| {
                ReplError::StorageRead(format!(
                    "corrupt event log {} at line {}: {}",
                    path.display(),
                    idx + 1,
                    e
                ))
            })?;
            scan.events.push(event);
            scan.valid_len = offset;
        }
        Ok(scan)
    }
}

impl EventStore for FileEventLog {
    fn append(&self, database: &str, payload: EventPayload) -> ReplResult<EventId> {
        let mut guard = self.writer.lock();
        let LogWriter {
            file,
            last,
            poisoned,
        } = &mut *guard;
        if *poisoned {
            return Err(ReplError::StorageWrite(format!(
                "event log {} has an unfinished append and must be reopened",
                self.path.display()
            )));
        }
        let id = last.next();
        let event = ReplicationEvent::new(id, database, payload);

        let mut line = serde_json::to_string(&event)
            .map_err(|e| ReplError::StorageWrite(format!("serialize event {}: {}", id, e)))?;
        line.push('\n');

        let start = file.size().map_err(|e| {
            ReplError::StorageWrite(format!("stat {}: {}", self.path.display(), e))
        })?;
        // fsync is mandatory before the id is handed out
        let written = file.write_all(line.as_bytes()).and_then(|()| file.sync());
        if let Err(e) = written {
            match file.truncate(start) {
                Ok(()) => warn!(
                    path = %self.path.display(),
                    event_id = %id,
                    error = %e,
                    "event append failed, log cut back"
                ),
                Err(te) => {
                    *poisoned = true;
                    error!(
                        path = %self.path.display(),
                        event_id = %id,
                        error = %e,
                        truncate_error = %te,
                        "event append failed and the log could not be cut back"
                    );
                }
            }
            return Err(ReplError::StorageWrite(format!(
                "append event {} to {}: {}",
                id,
                self.path.display(),
                e
            )));
        }

        *last = id;
        Ok(id)
    }

    fn latest(&self) -> ReplResult<EventId> {
        Ok(self.writer.lock().last)
    }

    fn read_range(
        &self,
        database: &str,
        after: Option<EventId>,
        upto: Option<EventId>,
    ) -> ReplResult<Vec<ReplicationEvent>> {
        let database = normalize_name(database);
        Ok(Self::scan(&self.path)?
            .events
            .into_iter()
            .filter(|e| in_range(e, &database, after, upto))
            .collect())
    }
}
