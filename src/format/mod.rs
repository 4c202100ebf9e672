//! # Record Formatting
//!
//! Serializers turning a composed field list into sink payload bytes:
//! a key=value text line, a JSON object, or the message-only access-log
//! line. Per-sink field stripping happens before these run; colorization is
//! applied only by the standard-stream sink.

pub mod access;
pub mod json;
pub mod text;

pub use access::{access_line, RFC1123Z};
pub use json::format_json;
pub use text::format_text;
