//! Scan pass: locate marker-delimited spans and build the offset table.

use std::io::Read;

use crate::error::ObfsError;
use crate::{ObfsConfig, OffsetRecord, OffsetTable, Result};

/// Forward-only byte cursor that tracks its absolute stream position.
struct ScanCursor<'a, R> {
    reader: &'a mut R,
    position: u64,
}

impl<'a, R: Read> ScanCursor<'a, R> {
    fn new(reader: &'a mut R) -> Self {
        Self {
            reader,
            position: 0,
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.position += 1;
                    return Ok(Some(byte[0]));
                }
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(ObfsError::ReadStream(error)),
            }
        }
    }
}

/// Find the next occurrence of `marker`, returning the absolute offset of
/// its first byte, or `None` when the stream ends first.
///
/// Keeps a window of exactly `marker.len()` bytes: on a mismatch the
/// window shifts left one byte and one new byte is appended.
fn find_next_marker<R: Read>(
    cursor: &mut ScanCursor<'_, R>,
    marker: &[u8],
) -> Result<Option<u64>> {
    let mut window = vec![0u8; marker.len()];
    for slot in window.iter_mut() {
        match cursor.read_byte()? {
            Some(byte) => *slot = byte,
            None => return Ok(None),
        }
    }

    loop {
        if window == marker {
            return Ok(Some(cursor.position - marker.len() as u64));
        }
        match cursor.read_byte()? {
            Some(byte) => {
                window.copy_within(1.., 0);
                let last = window.len() - 1;
                window[last] = byte;
            }
            None => return Ok(None),
        }
    }
}

/// Count the target bytes following a marker: everything up to and
/// including the NUL terminator, or up to end of stream when no
/// terminator exists.
fn read_target_length<R: Read>(cursor: &mut ScanCursor<'_, R>) -> Result<u64> {
    let mut length = 0u64;
    loop {
        match cursor.read_byte()? {
            Some(0) => return Ok(length + 1),
            Some(_) => length += 1,
            None => return Ok(length),
        }
    }
}

/// Scan `reader` from its current position (expected: stream start) and
/// record up to `config.max_targets` marker spans.
///
/// Running out of markers is normal termination, not an error. Markers
/// past the capacity are not recorded and are later copied through the
/// rewrite pass untouched.
pub fn build_table<R: Read>(reader: &mut R, config: &ObfsConfig) -> Result<OffsetTable> {
    if config.marker.is_empty() {
        return Err(ObfsError::EmptyMarker);
    }

    let mut cursor = ScanCursor::new(reader);
    let mut table = OffsetTable::default();

    while table.len() < config.max_targets {
        let Some(offset) = find_next_marker(&mut cursor, &config.marker)? else {
            break;
        };
        let target_length = read_target_length(&mut cursor)?;
        let record = OffsetRecord {
            offset,
            span_length: config.marker.len() as u64 + target_length,
        };
        log::debug!(
            "marker at 0x{:08x}, span {} bytes",
            record.offset,
            record.span_length
        );
        table.push(record);
    }

    log::debug!("{} targets identified", table.len());
    Ok(table)
}
