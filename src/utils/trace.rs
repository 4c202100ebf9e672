//! Caller and task identification helpers.
//!
//! Task identifiers are sequential per-thread ids handed out from a global
//! counter; caller locations come from `#[track_caller]` propagation on the
//! public log methods and are normalized against the configured trace filter
//! before they reach a sink.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static TASK_ID: Cell<u64> = const { Cell::new(0) };
}

/// Returns a stable non-zero identifier for the calling thread.
///
/// Identifiers are assigned sequentially on first use and reused for the
/// thread's lifetime, mirroring how runtime task ids appear in log output.
pub fn task_id() -> u64 {
    TASK_ID.with(|cell| {
        let mut id = cell.get();
        if id == 0 {
            id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
            cell.set(id);
        }
        id
    })
}

/// Path markers stripped from captured caller files so that only the
/// repository-relative suffix remains.
const PATH_MARKERS: &[&str] = &["/pkg/mod/", "/vendor/", "/.cargo/registry/src/"];

/// Normalizes a captured source path.
///
/// The configured trace filter (a compiled regex) is removed first, then any
/// dependency-cache marker: the part of the path up to and including the last
/// marker occurrence is cut away.
///
/// # Arguments
///
/// * `file` - The source path as captured at the call site
/// * `filter` - Optional trace filter from the active options
///
/// # Returns
///
/// The normalized path, or the input unchanged when nothing matches
pub fn normalize_file(file: &str, filter: Option<&Regex>) -> String {
    let mut out = match filter {
        Some(re) => re.replace(file, "").into_owned(),
        None => file.to_string(),
    };
    for marker in PATH_MARKERS {
        if let Some(pos) = out.rfind(marker) {
            out = out[pos + marker.len()..].to_string();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_stable_per_thread() {
        let a = task_id();
        let b = task_id();
        assert_ne!(a, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_task_id_distinct_across_threads() {
        let here = task_id();
        let there = std::thread::spawn(task_id).join().expect("thread join");
        assert_ne!(here, there);
    }

    #[test]
    fn test_normalize_file_strips_markers() {
        assert_eq!(
            normalize_file("/home/ci/go/pkg/mod/some.dep@v1/file.go", None),
            "some.dep@v1/file.go"
        );
        assert_eq!(
            normalize_file("/repo/vendor/dep/lib.rs", None),
            "dep/lib.rs"
        );
        assert_eq!(normalize_file("src/logger/mod.rs", None), "src/logger/mod.rs");
    }

    #[test]
    fn test_normalize_file_applies_filter() {
        let re = Regex::new(r"^/build/workspace/").expect("valid pattern");
        assert_eq!(
            normalize_file("/build/workspace/src/main.rs", Some(&re)),
            "src/main.rs"
        );
    }
}
