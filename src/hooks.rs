//! # Process-Wide Hooks
//!
//! Global registration points shared by every logger in the process: the
//! error hook receiving emission failures, the lifecycle hooks invoked after
//! reconfiguration and level changes, and the provider installed as the
//! process default for the leveled structured adapter.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::logger::Logger;
use crate::utils::error::Error;

type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;
type LoggerHook = Arc<dyn Fn(&Logger) + Send + Sync>;

/// Provider function yielding the logger behind a foreign adapter.
pub type Provider = Arc<dyn Fn() -> Option<Logger> + Send + Sync>;

static ERROR_HOOK: Lazy<RwLock<Option<ErrorHook>>> = Lazy::new(|| RwLock::new(None));
static INIT_HOOK: Lazy<RwLock<Option<LoggerHook>>> = Lazy::new(|| RwLock::new(None));
static LEVEL_HOOK: Lazy<RwLock<Option<LoggerHook>>> = Lazy::new(|| RwLock::new(None));
static DEFAULT_PROVIDER: Lazy<RwLock<Option<Provider>>> = Lazy::new(|| RwLock::new(None));

/// Install the process-wide error hook.
///
/// Emission failures (sink fire, formatting, transport) are reported here
/// and never surface to log callers. Replaces any previous hook.
pub fn set_error_hook(hook: impl Fn(&Error) + Send + Sync + 'static) {
    *ERROR_HOOK.write() = Some(Arc::new(hook));
}

/// Remove the process-wide error hook.
pub fn clear_error_hook() {
    *ERROR_HOOK.write() = None;
}

/// Report one emission failure to the error hook, when one is installed.
pub(crate) fn report_error(err: &Error) {
    let hook = ERROR_HOOK.read().clone();
    if let Some(hook) = hook {
        hook(err);
    }
}

/// Install the hook invoked after every successful `set_options`.
pub fn on_init(hook: impl Fn(&Logger) + Send + Sync + 'static) {
    *INIT_HOOK.write() = Some(Arc::new(hook));
}

/// Install the hook invoked after every level change.
pub fn on_level_change(hook: impl Fn(&Logger) + Send + Sync + 'static) {
    *LEVEL_HOOK.write() = Some(Arc::new(hook));
}

pub(crate) fn fire_init(logger: &Logger) {
    let hook = INIT_HOOK.read().clone();
    if let Some(hook) = hook {
        hook(logger);
    }
}

pub(crate) fn fire_level_change(logger: &Logger) {
    let hook = LEVEL_HOOK.read().clone();
    if let Some(hook) = hook {
        hook(logger);
    }
}

/// Install the provider behind the process-default structured adapter.
///
/// No other process-wide state is established by the core.
pub fn set_default(provider: impl Fn() -> Option<Logger> + Send + Sync + 'static) {
    *DEFAULT_PROVIDER.write() = Some(Arc::new(provider));
}

/// The currently installed default provider, if any.
pub fn default_provider() -> Option<Provider> {
    DEFAULT_PROVIDER.read().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_error_hook_receives_reports() {
        static SEEN: AtomicUsize = AtomicUsize::new(0);
        set_error_hook(|_| {
            SEEN.fetch_add(1, Ordering::SeqCst);
        });
        report_error(&Error::SinkClosed);
        assert!(SEEN.load(Ordering::SeqCst) >= 1);
        clear_error_hook();
        let before = SEEN.load(Ordering::SeqCst);
        report_error(&Error::SinkClosed);
        assert_eq!(SEEN.load(Ordering::SeqCst), before);
    }
}
