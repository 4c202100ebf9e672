//! Access-log line composition.
//!
//! Access entries bypass structured formatting: the line is composed once
//! here and carried as a message-only entry to the sinks that opted into
//! access-log mode.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// RFC1123 layout with a numeric zone, as used in the access-log pattern.
pub const RFC1123Z: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Compose one access-log line (without trailing newline).
///
/// Pattern:
/// `remoteAddr " - " remoteUser " [" time "] [" latency "] \"" method " "
/// request " " proto "\" " status " " size`
#[allow(clippy::too_many_arguments)]
pub fn access_line(
    remote_addr: &str,
    remote_user: &str,
    time: DateTime<Utc>,
    latency: Duration,
    method: &str,
    request: &str,
    proto: &str,
    status: u16,
    size: u64,
) -> String {
    format!(
        "{} - {} [{}] [{:?}] \"{} {} {}\" {} {}",
        remote_addr,
        remote_user,
        time.format(RFC1123Z),
        latency,
        method,
        request,
        proto,
        status,
        size
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_access_line_pattern() {
        let time = Utc.with_ymd_and_hms(2026, 2, 3, 12, 30, 45).single().expect("valid time");
        let line = access_line(
            "10.0.0.9",
            "alice",
            time,
            Duration::from_millis(12),
            "GET",
            "/healthz",
            "HTTP/1.1",
            200,
            512,
        );
        assert_eq!(
            line,
            "10.0.0.9 - alice [Tue, 03 Feb 2026 12:30:45 +0000] [12ms] \"GET /healthz HTTP/1.1\" 200 512"
        );
    }
}
