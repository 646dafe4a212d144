//! # gitsnap-loc
//!
//! Language-aware line-of-code counting for stats mode.
//!
//! The counter reproduces the behavior of the complexity tool that consumes
//! the stats document: encoding sniffing on raw bytes, CRLF normalization,
//! blank and comment stripping with a small block-comment state machine.
//! The block-comment detection is knowingly approximate (an unquoted `/*`
//! inside a string literal starts a "comment"); downstream numbers must stay
//! comparable, so the approximations are preserved rather than fixed.

#![forbid(unsafe_code)]

use thiserror::Error;

mod counter;
mod language;

pub use counter::count_lines_of_code;
pub use language::Language;

/// Errors from the line counter. The caller logs these and records zero
/// lines for the file.
#[derive(Debug, Error)]
pub enum CountError {
    #[error("failed to decode file contents as {encoding}")]
    Decode { encoding: &'static str },
}
