//! File formats and the processors that read or write them.
//!
//! The set of formats is closed, so dispatch is a match over `FileFormat`
//! rather than an open plugin list: each reader and writer declares the one
//! format it accepts, and `resolve_reader` / `resolve_writer` scan the
//! statically registered processors for a match.
//!
//! Submodules:
//! - `swmm`: reads SWMM "Table - <node>" text exports.
//! - `hdg` : writes HDG time-varying data files for GEMSS.

pub mod hdg;
pub mod swmm;

use std::fmt;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::model::{Flow, ParseError, ValidationError};

pub use hdg::HdgWriter;
pub use swmm::SwmmReader;

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Swmm,
    Hdg,
}

const ALL_FORMATS: &[FileFormat] = &[FileFormat::Swmm, FileFormat::Hdg];

impl FileFormat {
    /// Resolves a format name, ignoring case. Fails with
    /// `ValidationError::UnknownFormat` for anything outside {SWMM, HDG}.
    pub fn match_name(name: &str) -> Result<FileFormat, ValidationError> {
        let wanted = name.trim();
        ALL_FORMATS
            .iter()
            .copied()
            .find(|format| format.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownFormat(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        match self {
            FileFormat::Swmm => "SWMM",
            FileFormat::Hdg => "HDG",
        }
    }

    /// File extension conventionally used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Swmm => "txt",
            FileFormat::Hdg => "hdg",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// No processor is registered for a format that is otherwise valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Reading {0} files is not yet supported")]
    ReadingNotSupported(FileFormat),

    #[error("Writing {0} files is not yet supported")]
    WritingNotSupported(FileFormat),
}

// ---------------------------------------------------------------------------
// Processors
// ---------------------------------------------------------------------------

/// Parses raw text into a `Flow`.
#[derive(Debug)]
pub enum Reader {
    Swmm(SwmmReader),
}

impl Reader {
    pub fn format(&self) -> FileFormat {
        match self {
            Reader::Swmm(_) => FileFormat::Swmm,
        }
    }

    pub fn accepts(&self, format: FileFormat) -> bool {
        self.format() == format
    }

    pub fn read(&self, text: &str) -> Result<Flow, ParseError> {
        match self {
            Reader::Swmm(reader) => reader.read(text),
        }
    }
}

/// Renders a `Flow` as text.
#[derive(Debug)]
pub enum Writer {
    Hdg(HdgWriter),
}

impl Writer {
    pub fn format(&self) -> FileFormat {
        match self {
            Writer::Hdg(_) => FileFormat::Hdg,
        }
    }

    pub fn accepts(&self, format: FileFormat) -> bool {
        self.format() == format
    }

    /// Renders `flow`, stamping it with the current local time.
    pub fn write(&self, flow: &Flow) -> Result<String, ValidationError> {
        self.write_at(flow, chrono::Local::now().naive_local())
    }

    /// Renders `flow` with an explicit creation time.
    pub fn write_at(
        &self,
        flow: &Flow,
        created: NaiveDateTime,
    ) -> Result<String, ValidationError> {
        match self {
            Writer::Hdg(writer) => writer.write_at(flow, created),
        }
    }
}

/// Registered readers, scanned in order.
pub static READERS: &[Reader] = &[Reader::Swmm(SwmmReader)];

/// Registered writers, scanned in order.
pub static WRITERS: &[Writer] = &[Writer::Hdg(HdgWriter)];

pub fn resolve_reader(format: FileFormat) -> Result<&'static Reader, DispatchError> {
    READERS
        .iter()
        .find(|reader| reader.accepts(format))
        .ok_or(DispatchError::ReadingNotSupported(format))
}

pub fn resolve_writer(format: FileFormat) -> Result<&'static Writer, DispatchError> {
    WRITERS
        .iter()
        .find(|writer| writer.accepts(format))
        .ok_or(DispatchError::WritingNotSupported(format))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_name_is_case_insensitive() {
        assert_eq!(FileFormat::match_name("swmm").unwrap(), FileFormat::Swmm);
        assert_eq!(FileFormat::match_name("SWMM").unwrap(), FileFormat::Swmm);
        assert_eq!(FileFormat::match_name("Hdg").unwrap(), FileFormat::Hdg);
    }

    #[test]
    fn test_match_name_rejects_unknown_format() {
        let err = FileFormat::match_name("csv").unwrap_err();
        assert_eq!(err, ValidationError::UnknownFormat("csv".to_string()));
        assert_eq!(err.to_string(), "Unknown file format 'csv'");
    }

    #[test]
    fn test_swmm_has_a_reader() {
        let reader = resolve_reader(FileFormat::Swmm).expect("SWMM reader registered");
        assert_eq!(reader.format(), FileFormat::Swmm);
    }

    #[test]
    fn test_hdg_has_a_writer() {
        let writer = resolve_writer(FileFormat::Hdg).expect("HDG writer registered");
        assert_eq!(writer.format(), FileFormat::Hdg);
    }

    #[test]
    fn test_reading_hdg_is_not_supported() {
        assert_eq!(
            resolve_reader(FileFormat::Hdg).unwrap_err(),
            DispatchError::ReadingNotSupported(FileFormat::Hdg)
        );
    }

    #[test]
    fn test_writing_swmm_is_not_supported() {
        let err = resolve_writer(FileFormat::Swmm).unwrap_err();
        assert_eq!(err, DispatchError::WritingNotSupported(FileFormat::Swmm));
        assert_eq!(err.to_string(), "Writing SWMM files is not yet supported");
    }

    #[test]
    fn test_write_stamps_current_time() {
        let writer = resolve_writer(FileFormat::Hdg).unwrap();
        let text = writer.write(&Flow::empty()).unwrap();
        assert!(text.starts_with("$GLLVHTTVDFile, V5.0\n$Creation Date: "));
    }

    #[test]
    fn test_extensions() {
        assert_eq!(FileFormat::Swmm.extension(), "txt");
        assert_eq!(FileFormat::Hdg.extension(), "hdg");
    }
}
