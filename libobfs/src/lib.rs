//! Locates marker-delimited strings in a byte stream and rewrites the
//! stream with the markers stripped and the targets XOR-obfuscated, so
//! plaintext sensitive strings do not survive a `strings`-style dump of
//! the artifact. The encoding is deliberately weak; this is not a
//! cryptographic scheme.

pub mod error;
pub mod keystream;
pub mod rewrite;
pub mod scanner;

use std::fs::{self, File, OpenOptions as FsOpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub use crate::error::ObfsError;

pub type Result<T> = core::result::Result<T, ObfsError>;

/// Prefix marking a string for obfuscation
pub const DEFAULT_MARKER: &[u8] = b"[OBFS_ENC]";
/// Maximum number of marked strings to look for in one run
pub const DEFAULT_MAX_TARGETS: usize = 10;

/// Run-scoped configuration consumed by the scan and rewrite passes.
#[derive(Clone, Debug)]
pub struct ObfsConfig {
    /// Marker prefix identifying strings to obfuscate
    pub marker: Vec<u8>,
    /// Maximum number of marked strings to process
    pub max_targets: usize,
}

impl Default for ObfsConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_vec(),
            max_targets: DEFAULT_MAX_TARGETS,
        }
    }
}

/// Location of one marker + target span in the original stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OffsetRecord {
    /// Absolute position of the marker's first byte
    pub offset: u64,
    /// Marker length plus target length, terminator included when present
    pub span_length: u64,
}

/// Ordered, bounded list of spans discovered by the scan pass. Offsets
/// are strictly increasing because the scan never revisits earlier bytes.
#[derive(Clone, Debug, Default)]
pub struct OffsetTable {
    records: Vec<OffsetRecord>,
}

impl OffsetTable {
    pub fn records(&self) -> &[OffsetRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn push(&mut self, record: OffsetRecord) {
        self.records.push(record);
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub enum Outcome {
    /// No markers were found; no output was produced.
    NoTargets,
    /// Markers were found and the stream was rewritten.
    Obfuscated(Report),
}

/// Summary of a rewrite pass.
#[derive(Debug)]
pub struct Report {
    /// Spans that were obfuscated, in stream order
    pub table: OffsetTable,
    /// Total bytes written to the output
    pub bytes_written: u64,
}

/// Obfuscate `reader` into `writer` using `key`.
///
/// The scan pass consumes `reader` once; when at least one marker is
/// found the stream is rewound and rewritten into `writer`. When no
/// markers are found `writer` is never touched.
pub fn obfuscate_stream<R, W>(
    reader: &mut R,
    writer: &mut W,
    key: u8,
    config: &ObfsConfig,
) -> Result<Outcome>
where
    R: std::io::Read + Seek,
    W: Write,
{
    let table = scanner::build_table(reader, config)?;
    if table.is_empty() {
        return Ok(Outcome::NoTargets);
    }

    reader
        .seek(SeekFrom::Start(0))
        .map_err(ObfsError::Rewind)?;
    let bytes_written = rewrite::rewrite(reader, writer, key, &table, config)?;

    Ok(Outcome::Obfuscated(Report {
        table,
        bytes_written,
    }))
}

/// Obfuscate the file at `input` and save the result as `output`.
///
/// The output file is only created when at least one marker was found,
/// and it is committed atomically so a failed run leaves nothing behind.
pub fn obfuscate_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    key: u8,
    config: &ObfsConfig,
) -> Result<Outcome> {
    let file = File::open(input.as_ref()).map_err(ObfsError::InputUnreadable)?;
    let mut reader = BufReader::new(file);

    let table = scanner::build_table(&mut reader, config)?;
    if table.is_empty() {
        log::debug!("no markers in {}, output not created", input.as_ref().display());
        return Ok(Outcome::NoTargets);
    }

    reader
        .seek(SeekFrom::Start(0))
        .map_err(ObfsError::Rewind)?;
    let mut buffer = Vec::new();
    let bytes_written = rewrite::rewrite(&mut reader, &mut buffer, key, &table, config)?;

    write_atomic(output.as_ref(), &buffer)?;
    log::debug!(
        "{} spans rewritten into {}",
        table.len(),
        output.as_ref().display()
    );

    Ok(Outcome::Obfuscated(Report {
        table,
        bytes_written,
    }))
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("obfuscated");
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp.{}.{}",
        file_name,
        std::process::id(),
        unix_time_nanos()
    ));

    let mut file = FsOpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&tmp_path)
        .map_err(ObfsError::OutputUnwritable)?;
    if let Err(error) = file.write_all(content).and_then(|()| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(&tmp_path);
        return Err(ObfsError::OutputUnwritable(error));
    }
    drop(file);

    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(_) if path.exists() => {
            // Rename over an existing file can fail on some platforms;
            // retry after removing the destination.
            let replaced = fs::remove_file(path).and_then(|()| fs::rename(&tmp_path, path));
            replaced.map_err(|error| {
                let _ = fs::remove_file(&tmp_path);
                ObfsError::OutputUnwritable(error)
            })
        }
        Err(error) => {
            let _ = fs::remove_file(&tmp_path);
            Err(ObfsError::OutputUnwritable(error))
        }
    }
}

fn unix_time_nanos() -> u128 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_nanos(),
        Err(_) => 0,
    }
}
