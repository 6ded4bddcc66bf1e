//! Rewrite pass: copy the input to the output with markers dropped and
//! targets obfuscated.

use std::io::{Read, Write};

use crate::error::ObfsError;
use crate::keystream;
use crate::{ObfsConfig, OffsetTable, Result};

const COPY_CHUNK: usize = 8 * 1024;

/// Rewrite `reader` into `writer` guided by `table`.
///
/// `reader` must be positioned at the start of the same stream the table
/// was built from, and the table must be in ascending offset order. Each
/// span comes out `marker_length` bytes shorter than it went in: the
/// marker is consumed without being written, and the remaining span bytes
/// (terminator included, when one was present) are XOR-transformed.
/// Returns the total number of bytes written.
pub fn rewrite<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    key: u8,
    table: &OffsetTable,
    config: &ObfsConfig,
) -> Result<u64> {
    if config.marker.is_empty() {
        return Err(ObfsError::EmptyMarker);
    }

    let marker_length = config.marker.len() as u64;
    let mut position = 0u64;
    let mut written = 0u64;

    for record in table.records() {
        if record.offset < position {
            return Err(ObfsError::UnorderedTable {
                offset: record.offset,
                position,
            });
        }
        if record.span_length < marker_length {
            return Err(ObfsError::InvalidSpan {
                offset: record.offset,
                span_length: record.span_length,
                marker_length,
            });
        }

        // Untouched bytes since the previous span (or the stream start).
        written += copy_exact(reader, writer, record.offset - position)?;

        let mut marker_buf = vec![0u8; config.marker.len()];
        read_exact(reader, &mut marker_buf)?;
        if marker_buf != config.marker {
            return Err(ObfsError::MarkerMismatch {
                offset: record.offset,
            });
        }

        let target_length = usize::try_from(record.span_length - marker_length)?;
        let mut target = vec![0u8; target_length];
        read_exact(reader, &mut target)?;
        keystream::encode_in_place(key, &mut target);
        writer.write_all(&target).map_err(ObfsError::WriteStream)?;
        written += target.len() as u64;

        position = record.offset + record.span_length;
        log::debug!(
            "rewrote span at 0x{:08x}: {} bytes",
            record.offset,
            target.len()
        );
    }

    written += copy_to_end(reader, writer)?;
    writer.flush().map_err(ObfsError::WriteStream)?;
    Ok(written)
}

fn copy_exact<R: Read, W: Write>(reader: &mut R, writer: &mut W, length: u64) -> Result<u64> {
    let mut chunk = [0u8; COPY_CHUNK];
    let mut remaining = length;
    while remaining > 0 {
        let want = remaining.min(COPY_CHUNK as u64) as usize;
        read_exact(reader, &mut chunk[..want])?;
        writer
            .write_all(&chunk[..want])
            .map_err(ObfsError::WriteStream)?;
        remaining -= want as u64;
    }
    Ok(length)
}

fn copy_to_end<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<u64> {
    let mut chunk = [0u8; COPY_CHUNK];
    let mut copied = 0u64;
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(count) => count,
            Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(ObfsError::ReadStream(error)),
        };
        writer
            .write_all(&chunk[..read])
            .map_err(ObfsError::WriteStream)?;
        copied += read as u64;
    }
    Ok(copied)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(ObfsError::ReadStream)
}
