//! # Foreign Logger Adapters
//!
//! Thin protocol translators presenting foreign logging APIs over the
//! logger façade. Adapters never duplicate emission logic and never hold
//! their own sink sets; each one resolves its logger through a provider
//! function and silently no-ops when the provider yields none.

pub mod querytrace;
pub mod stdlog;
pub mod structured;

pub use querytrace::{QueryTrace, TraceLevel, NOT_FOUND};
pub use stdlog::{StdLog, FLAG_DATE, FLAG_TIME};
pub use structured::{AdapterLevel, Structured, ARGS_KEY, BAD_KEY, NAME_KEY};
