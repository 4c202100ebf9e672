//! # Sinks
//!
//! The uniform sink contract and its three implementations: the standard
//! stream pair, asynchronous file sinks and syslog sinks.
//!
//! Every sink runs the same Fire protocol: the entry is rendered against the
//! sink's own field-filter flags and serialization format, then handed to
//! the sink-specific write path. Async sinks own a dedicated background
//! worker and move through `Created → Running → Draining → Closed`.

pub mod file;
pub mod stdstream;
pub mod syslog;

use serde_json::Value;

use crate::config::{FileOpt, SinkFormat, SyslogOpt};
use crate::entry::Entry;
use crate::format;
use crate::level::Level;
use crate::utils::error::Result;

/// Lifecycle of an asynchronous sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SinkState {
    /// Constructed, worker not yet running.
    Created = 0,
    /// Worker running, writes accepted.
    Running = 1,
    /// Close requested; writes accepted until the queue fills.
    Draining = 2,
    /// Queue drained and resources released; writes rejected.
    Closed = 3,
}

impl SinkState {
    pub(crate) fn from_u8(raw: u8) -> SinkState {
        match raw {
            0 => SinkState::Created,
            1 => SinkState::Running,
            2 => SinkState::Draining,
            _ => SinkState::Closed,
        }
    }
}

/// Per-sink field-filter flags applied before formatting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkFlags {
    /// Remove the task identifier.
    pub strip_stack: bool,
    /// Remove the timestamp.
    pub strip_timestamp: bool,
    /// Keep caller/file/line information.
    pub keep_trace: bool,
    /// Message-only access-log mode.
    pub access_log: bool,
}

impl From<&FileOpt> for SinkFlags {
    fn from(opt: &FileOpt) -> Self {
        SinkFlags {
            strip_stack: opt.strip_stack,
            strip_timestamp: opt.strip_timestamp,
            keep_trace: opt.keep_trace,
            access_log: opt.access_log,
        }
    }
}

impl From<&SyslogOpt> for SinkFlags {
    fn from(opt: &SyslogOpt) -> Self {
        SinkFlags {
            strip_stack: opt.strip_stack,
            strip_timestamp: opt.strip_timestamp,
            keep_trace: opt.keep_trace,
            access_log: opt.access_log,
        }
    }
}

/// Uniform sink contract.
///
/// A sink is registered with at most one logger at a time and closed exactly
/// once on logger teardown or reconfiguration.
pub trait Hook: Send + Sync {
    /// The accepted-level set.
    fn levels(&self) -> &[Level];

    /// Whether the sink accepts entries at the given level.
    fn accepts(&self, level: Level) -> bool {
        self.levels().contains(&level)
    }

    /// Render and write one entry.
    fn fire(&self, entry: &Entry) -> Result<()>;

    /// Write a pre-rendered payload.
    fn write(&self, payload: &[u8]) -> Result<()>;

    /// Drain pending output and release resources.
    fn close(&self) -> Result<()>;
}

/// Shared Fire-protocol rendering.
///
/// Access-log sinks emit the bare message line for any entry carrying a
/// message; message-only entries produce nothing on other sinks. Otherwise
/// the entry is composed against the sink's filter flags and serialized; an
/// empty post-filter field set drops the record.
///
/// # Returns
///
/// The payload to write, or `None` when the sink drops the record.
pub(crate) fn render(
    entry: &Entry,
    flags: &SinkFlags,
    format: SinkFormat,
    color: Option<Level>,
) -> Result<Option<Vec<u8>>> {
    if flags.access_log && !entry.message.is_empty() {
        let mut payload = entry.message.clone().into_bytes();
        if payload.last() != Some(&b'\n') {
            payload.push(b'\n');
        }
        return Ok(Some(payload));
    }
    if entry.is_message_only() {
        return Ok(None);
    }

    let tag: Vec<(String, Value)> =
        entry.compose(flags.strip_stack, flags.strip_timestamp, flags.keep_trace);
    if tag.is_empty() {
        return Ok(None);
    }
    match format {
        SinkFormat::Text => Ok(Some(format::format_text(&tag, color))),
        SinkFormat::Json => format::format_json(&tag).map(Some),
    }
}
