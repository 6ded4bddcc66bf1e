extern crate miette;
extern crate thiserror;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ObfsError {
    #[error("error opening input file for reading")]
    #[diagnostic(code(libobfs::input_error))]
    InputUnreadable(#[source] std::io::Error),

    #[error("error creating output file for writing")]
    #[diagnostic(code(libobfs::output_error))]
    OutputUnwritable(#[source] std::io::Error),

    #[error("input stream reading error")]
    #[diagnostic(code(libobfs::read_error))]
    ReadStream(#[source] std::io::Error),

    #[error("output stream writing error")]
    #[diagnostic(code(libobfs::write_error))]
    WriteStream(#[source] std::io::Error),

    #[error("input stream could not be rewound between passes")]
    #[diagnostic(code(libobfs::rewind_error))]
    Rewind(#[source] std::io::Error),

    #[error("configured marker is empty")]
    #[diagnostic(code(libobfs::config_error))]
    EmptyMarker,

    #[error(
        "offset table is not strictly increasing (offset {offset:?} reached at stream position {position:?})"
    )]
    #[diagnostic(code(libobfs::table_error))]
    UnorderedTable { offset: u64, position: u64 },

    #[error(
        "span at offset {offset:?} is shorter than the marker ({span_length:?} < {marker_length:?} bytes)"
    )]
    #[diagnostic(code(libobfs::table_error))]
    InvalidSpan {
        offset: u64,
        span_length: u64,
        marker_length: u64,
    },

    #[error("bytes at offset {offset:?} no longer match the marker")]
    #[diagnostic(code(libobfs::table_error))]
    MarkerMismatch { offset: u64 },

    #[error("error converting an offset value")]
    #[diagnostic(code(libobfs::overflow_error))]
    IntegerOverflow(#[from] std::num::TryFromIntError),
}
