use std::io::Write;

use super::{file_logger, read_lines};
use crate::config::SinkFormat;
use crate::level::Level;

#[test]
fn test_round_trip_line_count() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (logger, path) = file_logger(dir.path(), Vec::new(), SinkFormat::Text);

    let mut writer = logger.writer();
    let payload = b"one\ntwo\nthree\n";
    let n = writer.write(payload).expect("write");
    assert_eq!(n, payload.len());
    logger.close().expect("close");

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "level=info message=one");
    assert_eq!(lines[1], "level=info message=two");
    assert_eq!(lines[2], "level=info message=three");
}

#[test]
fn test_drop_filters_discard_matching_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (logger, path) = file_logger(dir.path(), Vec::new(), SinkFormat::Text);
    logger.set_iowriter_filter(&["health check", "TLS handshake"]);

    let mut writer = logger.writer();
    let payload = b"GET /healthz health check\nreal work done\nTLS handshake error\n";
    let n = writer.write(payload).expect("write");
    assert_eq!(n, payload.len(), "count covers dropped lines too");
    logger.close().expect("close");

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"real work done\""));
    assert_eq!(logger.metrics().dropped(), 2);
}

#[test]
fn test_iowriter_level_applies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (logger, path) = file_logger(dir.path(), Vec::new(), SinkFormat::Text);
    logger.set_iowriter_level(Level::Error);

    let mut writer = logger.writer();
    writer.write(b"failed badly\n").expect("write");
    logger.close().expect("close");

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("level=error"));
}

#[test]
fn test_close_flushes_partial_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (logger, path) = file_logger(dir.path(), Vec::new(), SinkFormat::Text);

    let mut writer = logger.writer();
    writer.write(b"no trailing newline").expect("write");
    logger.close().expect("close");

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"no trailing newline\""));
}

#[test]
fn test_empty_lines_are_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (logger, path) = file_logger(dir.path(), Vec::new(), SinkFormat::Text);

    let mut writer = logger.writer();
    writer.write(b"\n\nkept\n\n").expect("write");
    logger.close().expect("close");

    assert_eq!(read_lines(&path).len(), 1);
}
