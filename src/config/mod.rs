//! # Runtime Options
//!
//! Validated configuration snapshot consumed by the logger. The file
//! parser/loader that produces these values lives outside the crate; this
//! module owns the shape, the serde defaults and the validation that fills
//! zero values with their documented defaults.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::level::Level;
use crate::sink::syslog::{Facility, Severity};
use crate::utils::error::{Error, Result};

/// Default permission bits for created log files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Default permission bits for created parent directories.
pub const DEFAULT_PATH_MODE: u32 = 0o755;
/// Default file-sink buffer capacity in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Networks accepted for a syslog sink; empty means local syslog.
const SYSLOG_NETWORKS: &[&str] = &["tcp", "udp", "unix", "unixgram", ""];

/// Per-sink serialization format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    /// Human-readable key=value line.
    #[default]
    Text,
    /// One JSON object per record.
    Json,
}

/// Configuration for a single file sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileOpt {
    /// Accepted levels; empty means every level from debug up.
    pub levels: Vec<Level>,
    /// Target path, append-only. Required.
    pub filepath: String,
    /// Create the file when missing.
    pub create: bool,
    /// Create missing parent directories.
    pub create_path: bool,
    /// Permission bits for a created file; 0 means 0644.
    pub file_mode: u32,
    /// Permission bits for created directories; 0 means 0755.
    pub path_mode: u32,
    /// Drop the task identifier from records written here.
    pub strip_stack: bool,
    /// Drop the timestamp from records written here.
    pub strip_timestamp: bool,
    /// Keep caller/file/line information in records written here.
    pub keep_trace: bool,
    /// Receive message-only access-log lines.
    pub access_log: bool,
    /// Pending-byte capacity of the async writer; 0 means 64 KiB.
    pub buffer_size: usize,
    /// Record serialization format.
    pub format: SinkFormat,
}

/// Configuration for a single syslog sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyslogOpt {
    /// Accepted levels; empty means every level from debug up.
    pub levels: Vec<Level>,
    /// Transport: tcp, udp, unix, unixgram, or empty for local syslog.
    pub network: String,
    /// Remote address or socket path; empty together with `network` for
    /// local syslog.
    pub host: String,
    /// Syslog facility name (e.g. "daemon", "local0").
    pub facility: String,
    /// Tag (ident) included in every frame.
    pub tag: String,
    /// Fixed severity overriding the per-level mapping; empty to disable.
    pub severity_override: String,
    /// Drop the task identifier from records sent here.
    pub strip_stack: bool,
    /// Drop the timestamp from records sent here.
    pub strip_timestamp: bool,
    /// Keep caller/file/line information in records sent here.
    pub keep_trace: bool,
    /// Receive message-only access-log lines.
    pub access_log: bool,
    /// Record serialization format for the frame body.
    pub format: SinkFormat,
}

/// The validated configuration snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Do not install the standard-stream sink pair.
    pub disable_standard: bool,
    /// Do not capture the task identifier on new entries.
    pub disable_stack: bool,
    /// Do not capture the wall-clock timestamp on new entries.
    pub disable_timestamp: bool,
    /// Capture caller file/line on new entries.
    pub enable_trace: bool,
    /// Regex stripped from captured caller paths.
    pub trace_filter: String,
    /// Never colorize standard-stream output.
    pub disable_color: bool,
    /// File sinks to install.
    pub files: Vec<FileOpt>,
    /// Syslog sinks to install.
    pub syslogs: Vec<SyslogOpt>,
    /// Merge with a base options value before applying (see `inherit`).
    pub inherit_default: bool,
    /// With `inherit_default`, append file sinks to the base's instead of
    /// replacing them.
    pub file_extend: bool,
    /// With `inherit_default`, append syslog sinks to the base's instead of
    /// replacing them.
    pub syslog_extend: bool,
}

impl Options {
    /// Validate and normalize, filling zero values with their defaults.
    ///
    /// # Returns
    ///
    /// A normalized copy, or `OptionsInvalid` naming the offending field.
    pub fn validate(&self) -> Result<Options> {
        let mut normalized = self.clone();

        if !normalized.trace_filter.is_empty() {
            Regex::new(&normalized.trace_filter).map_err(|e| {
                Error::OptionsInvalid(format!("traceFilter is not a valid regex: {}", e))
            })?;
        }

        for file in &mut normalized.files {
            if file.filepath.is_empty() {
                return Err(Error::OptionsInvalid(
                    "file sink requires a non-empty filepath".to_string(),
                ));
            }
            if file.file_mode == 0 {
                file.file_mode = DEFAULT_FILE_MODE;
            }
            if file.path_mode == 0 {
                file.path_mode = DEFAULT_PATH_MODE;
            }
            if file.buffer_size == 0 {
                file.buffer_size = DEFAULT_BUFFER_SIZE;
            }
        }

        for syslog in &mut normalized.syslogs {
            if !SYSLOG_NETWORKS.contains(&syslog.network.as_str()) {
                return Err(Error::OptionsInvalid(format!(
                    "syslog network must be tcp, udp, unix, unixgram or empty, got {:?}",
                    syslog.network
                )));
            }
            if syslog.network.is_empty() && !syslog.host.is_empty() {
                return Err(Error::OptionsInvalid(
                    "syslog host requires a network".to_string(),
                ));
            }
            if !syslog.network.is_empty() && syslog.host.is_empty() {
                return Err(Error::OptionsInvalid(format!(
                    "syslog network {:?} requires a host",
                    syslog.network
                )));
            }
            if !syslog.facility.is_empty() && Facility::from_name(&syslog.facility).is_none() {
                return Err(Error::OptionsInvalid(format!(
                    "unknown syslog facility {:?}",
                    syslog.facility
                )));
            }
            if !syslog.severity_override.is_empty()
                && Severity::from_name(&syslog.severity_override).is_none()
            {
                return Err(Error::OptionsInvalid(format!(
                    "unknown syslog severity {:?}",
                    syslog.severity_override
                )));
            }
        }

        Ok(normalized)
    }

    /// Merge this value over a base configuration.
    ///
    /// Returns `self` unchanged unless `inherit_default` is set. With it,
    /// scalar flags come from `self`, an empty `trace_filter` falls back to
    /// the base's, and the sink lists replace the base's unless the matching
    /// extend flag appends to them instead. Empty sink lists always inherit.
    pub fn inherit(&self, base: &Options) -> Options {
        if !self.inherit_default {
            return self.clone();
        }
        let mut merged = self.clone();
        if merged.trace_filter.is_empty() {
            merged.trace_filter = base.trace_filter.clone();
        }
        if self.file_extend {
            let mut files = base.files.clone();
            files.extend(self.files.iter().cloned());
            merged.files = files;
        } else if merged.files.is_empty() {
            merged.files = base.files.clone();
        }
        if self.syslog_extend {
            let mut syslogs = base.syslogs.clone();
            syslogs.extend(self.syslogs.iter().cloned());
            merged.syslogs = syslogs;
        } else if merged.syslogs.is_empty() {
            merged.syslogs = base.syslogs.clone();
        }
        merged
    }

    /// Expand an accepted-level list: empty means every level from debug up.
    pub fn expand_levels(levels: &[Level]) -> Vec<Level> {
        if levels.is_empty() {
            Level::all().to_vec()
        } else {
            levels.to_vec()
        }
    }
}
