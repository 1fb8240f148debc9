//! Append-only per-run audit trail.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use super::template::TaskKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// A probe output matched neither expected literal.
    Unmatched {
        key: TaskKey,
        sql: String,
        output: String,
    },
    GrantInserted {
        actor_id: i64,
        template_id: i64,
        database_id: i64,
        object_id: i64,
    },
    GroupAssigned {
        actor_id: i64,
        group_id: i64,
    },
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmatched { key, sql, output } => {
                write!(f, "UNMATCHED key={key} output='{output}' sql={sql}")
            }
            Self::GrantInserted {
                actor_id,
                template_id,
                database_id,
                object_id,
            } => write!(
                f,
                "GRANT actor={actor_id} template={template_id} database={database_id} object={object_id}"
            ),
            Self::GroupAssigned { actor_id, group_id } => {
                write!(f, "GROUP actor={actor_id} group={group_id}")
            }
        }
    }
}

/// Destination of one run's audit events.
pub trait AuditSink: Send + Sync {
    /// # Errors
    ///
    /// Returns the underlying I/O error if the event could not be recorded.
    fn emit(&self, event: &AuditEvent) -> io::Result<()>;
}

/// Emit an event; failures are logged and never abort the caller.
pub fn record(sink: &dyn AuditSink, event: &AuditEvent) {
    if let Err(e) = sink.emit(event) {
        warn!(error = %e, event = %event, "Failed to write audit event");
    }
}

/// Opens the sink a run writes to.
pub trait AuditLog: Send + Sync {
    fn open_run(&self, job_id: &str) -> Arc<dyn AuditSink>;
}

/// `<dir>/<job id>.audit.log`, one timestamped line per event.
pub struct FileAuditLog {
    dir: PathBuf,
}

impl FileAuditLog {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.audit.log", sanitize(job_id)))
    }
}

impl AuditLog for FileAuditLog {
    fn open_run(&self, job_id: &str) -> Arc<dyn AuditSink> {
        let path = self.path_for(job_id);
        let file = open_append(&self.dir, &path)
            .inspect_err(|e| {
                warn!(path = %path.display(), error = %e, "Audit log unavailable for this run");
            })
            .ok();
        Arc::new(FileAuditSink {
            path,
            file: Mutex::new(file),
        })
    }
}

fn open_append(dir: &Path, path: &Path) -> io::Result<File> {
    std::fs::create_dir_all(dir)?;
    OpenOptions::new().create(true).append(true).open(path)
}

/// Keep job ids usable as file names.
fn sanitize(job_id: &str) -> String {
    let cleaned: String = job_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "run".to_owned()
    } else {
        trimmed.to_owned()
    }
}

pub struct FileAuditSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl AuditSink for FileAuditSink {
    fn emit(&self, event: &AuditEvent) -> io::Result<()> {
        let mut guard = self.file.lock();
        let Some(file) = guard.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("audit log {} is not open", self.path.display()),
            ));
        };
        let now = OffsetDateTime::now_utc();
        let ts = now
            .format(&Rfc3339)
            .unwrap_or_else(|_| now.unix_timestamp().to_string());
        writeln!(file, "{ts} {event}")
    }
}

/// Collects events in memory; handy for tests and dry runs.
#[derive(Default)]
pub struct MemoryAuditLog {
    sink: Arc<MemoryAuditSink>,
}

impl MemoryAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.sink.events()
    }
}

impl AuditLog for MemoryAuditLog {
    fn open_run(&self, _job_id: &str) -> Arc<dyn AuditSink> {
        self.sink.clone()
    }
}

#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, event: &AuditEvent) -> io::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
