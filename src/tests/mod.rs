//! Cross-module integration tests exercising the full pipeline: façade →
//! entry → sink fan-out → bytes on disk or on the wire.

mod iowriter_tests;

use std::path::{Path, PathBuf};

use crate::config::{FileOpt, Options, SinkFormat};
use crate::level::Level;
use crate::logger::Logger;

/// A logger writing only to one file sink in the given format.
pub(crate) fn file_logger(
    dir: &Path,
    levels: Vec<Level>,
    format: SinkFormat,
) -> (Logger, PathBuf) {
    let path = dir.join("app.log");
    let logger = Logger::new();
    logger
        .set_options(&Options {
            disable_standard: true,
            disable_timestamp: true,
            disable_stack: true,
            files: vec![FileOpt {
                levels,
                filepath: path.to_string_lossy().into_owned(),
                create: true,
                create_path: true,
                format,
                ..FileOpt::default()
            }],
            ..Options::default()
        })
        .expect("file sink options");
    (logger, path)
}

/// The file's records, one per line.
pub(crate) fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("log file readable")
        .lines()
        .map(|l| l.to_string())
        .collect()
}
