// src/emit.rs

//! Event emitter: one line per event.
//!
//! - comma variant: `<path>,<KIND>\n`, the path CSV-quoted when it contains
//!   a comma, a double quote or a newline (inner quotes doubled)
//! - space variant: `<path> <KIND>\n`, never quoted
//!
//! Paths are written as raw bytes; nothing is lossily converted to UTF-8.

use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;

use tracing::trace;

use crate::types::{NormalizedEvent, OutputFormat};

/// Serialize `event` into a complete line (trailing newline included).
pub fn format_line(event: &NormalizedEvent, format: OutputFormat) -> Vec<u8> {
    let path = event.path.as_os_str().as_bytes();
    let kind = event.kind.as_str().as_bytes();
    let mut line = Vec::with_capacity(path.len() + kind.len() + 4);

    match format {
        OutputFormat::Comma => {
            if needs_quoting(path) {
                line.push(b'"');
                for &b in path {
                    if b == b'"' {
                        line.push(b'"');
                    }
                    line.push(b);
                }
                line.push(b'"');
            } else {
                line.extend_from_slice(path);
            }
            line.push(b',');
        }
        OutputFormat::Space => {
            line.extend_from_slice(path);
            line.push(b' ');
        }
    }

    line.extend_from_slice(kind);
    line.push(b'\n');
    line
}

fn needs_quoting(path: &[u8]) -> bool {
    path.iter().any(|b| matches!(b, b',' | b'"' | b'\n'))
}

/// Writes formatted lines to a sink, flushing after each one so consumers
/// reading a pipe see events as they happen.
#[derive(Debug)]
pub struct LineEmitter<W> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> LineEmitter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    pub fn emit(&mut self, event: &NormalizedEvent) -> io::Result<()> {
        trace!(path = ?event.path, kind = %event.kind, "emit");
        self.out.write_all(&format_line(event, self.format))?;
        self.out.flush()
    }
}
