//! Audit logging port
//!
//! [`OperationLogger`] is the sink the caller hands to every pipeline step.
//! It is separate from `tracing`: entries written here are meant for the end
//! user (a backup job's log view), while tracing carries operator diagnostics.
//!
//! Commands are logged in two phases so in-progress commands can be tailed:
//! [`OperationLogger::start_command`] records the (already redacted) command
//! text, [`OperationLogger::update_command`] later fills in output, exit code
//! and duration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Opaque reference to a started command entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandHandle(Uuid);

impl CommandHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CommandHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Second phase of a command entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandUpdate {
    pub output: String,
    /// `None` when the process was killed or never started
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Sink for user-facing operation logs.
///
/// Implementations must be cheap and must not fail; a broken sink should drop
/// entries rather than abort a backup.
pub trait OperationLogger: Send + Sync {
    /// Record a command that is about to run. `command` is already redacted.
    fn start_command(&self, command: &str) -> CommandHandle;

    /// Complete a previously started command entry
    fn update_command(&self, handle: CommandHandle, update: CommandUpdate);

    /// Free-form message with optional structured context
    fn log(&self, message: &str, level: LogLevel, context: Option<serde_json::Value>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Running,
    Succeeded,
    Failed,
}

/// One command, as accumulated by [`MemoryLogger`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandLogEntry {
    pub handle: CommandHandle,
    pub command: String,
    pub status: CommandStatus,
    pub output: Option<String>,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CommandLogEntry {
    fn started(handle: CommandHandle, command: &str) -> Self {
        Self {
            handle,
            command: command.to_string(),
            status: CommandStatus::Running,
            output: None,
            exit_code: None,
            duration_ms: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn apply(&mut self, update: CommandUpdate) {
        self.status = if update.exit_code == Some(0) {
            CommandStatus::Succeeded
        } else {
            CommandStatus::Failed
        };
        self.output = Some(update.output);
        self.exit_code = update.exit_code;
        self.duration_ms = Some(update.duration_ms);
        self.finished_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEntry {
    pub message: String,
    pub level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

/// Entries in the order they were first recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogRecord {
    Command(CommandLogEntry),
    Message(MessageEntry),
}

/// Buffers every entry in memory.
///
/// Used by tests and by the CLI's `--log-json` mode.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        // A panicking writer leaves the buffer consistent; keep using it
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    pub fn commands(&self) -> Vec<CommandLogEntry> {
        self.lock()
            .iter()
            .filter_map(|record| match record {
                LogRecord::Command(entry) => Some(entry.clone()),
                LogRecord::Message(_) => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<MessageEntry> {
        self.lock()
            .iter()
            .filter_map(|record| match record {
                LogRecord::Message(entry) => Some(entry.clone()),
                LogRecord::Command(_) => None,
            })
            .collect()
    }

    /// Everything recorded, concatenated for substring assertions
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for record in self.lock().iter() {
            match record {
                LogRecord::Command(entry) => {
                    out.push_str(&entry.command);
                    out.push('\n');
                    if let Some(output) = &entry.output {
                        out.push_str(output);
                        out.push('\n');
                    }
                }
                LogRecord::Message(entry) => {
                    out.push_str(&entry.message);
                    out.push('\n');
                    if let Some(context) = &entry.context {
                        out.push_str(&context.to_string());
                        out.push('\n');
                    }
                }
            }
        }
        out
    }
}

impl OperationLogger for MemoryLogger {
    fn start_command(&self, command: &str) -> CommandHandle {
        let handle = CommandHandle::new();
        self.lock()
            .push(LogRecord::Command(CommandLogEntry::started(handle, command)));
        handle
    }

    fn update_command(&self, handle: CommandHandle, update: CommandUpdate) {
        let mut records = self.lock();
        let entry = records.iter_mut().find_map(|record| match record {
            LogRecord::Command(entry) if entry.handle == handle => Some(entry),
            _ => None,
        });
        match entry {
            Some(entry) => entry.apply(update),
            None => tracing::debug!(%handle, "Update for unknown command handle dropped"),
        }
    }

    fn log(&self, message: &str, level: LogLevel, context: Option<serde_json::Value>) {
        self.lock().push(LogRecord::Message(MessageEntry {
            message: message.to_string(),
            level,
            context,
            at: Utc::now(),
        }));
    }
}

/// Forwards operation logs to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl OperationLogger for TracingLogger {
    fn start_command(&self, command: &str) -> CommandHandle {
        let handle = CommandHandle::new();
        tracing::info!(%handle, command, "Command started");
        handle
    }

    fn update_command(&self, handle: CommandHandle, update: CommandUpdate) {
        if update.exit_code == Some(0) {
            tracing::info!(
                %handle,
                exit_code = ?update.exit_code,
                duration_ms = update.duration_ms,
                output = %update.output,
                "Command finished"
            );
        } else {
            tracing::warn!(
                %handle,
                exit_code = ?update.exit_code,
                duration_ms = update.duration_ms,
                output = %update.output,
                "Command failed"
            );
        }
    }

    fn log(&self, message: &str, level: LogLevel, context: Option<serde_json::Value>) {
        let context = context.map(|c| c.to_string()).unwrap_or_default();
        match level {
            LogLevel::Debug => tracing::debug!(context, "{}", message),
            LogLevel::Info => tracing::info!(context, "{}", message),
            LogLevel::Warn => tracing::warn!(context, "{}", message),
            LogLevel::Error => tracing::error!(context, "{}", message),
        }
    }
}
