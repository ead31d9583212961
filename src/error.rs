//! Error types for manuscript parsing.
//!
//! Every error renders a terse message through `Display` and carries a
//! separate, longer remediation text through [`ParseError::help`]. Editors are
//! expected to show both.

use thiserror::Error;

/// Convenience alias used throughout the parser.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors that can occur while parsing a manuscript.
///
/// Line numbers are 1-based and count every physical line of the input,
/// including blank ones.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ParseError {
    #[error("missing required metadata field: @{field}")]
    MissingMetadata { field: String },

    #[error("duplicate metadata field @{field} at line {line}")]
    DuplicateMetadata { field: String, line: usize },

    #[error("invalid UUID in @id field: {value:?}")]
    InvalidUuid { value: String },

    #[error("invalid timestamp: {value:?}")]
    InvalidTimestamp { value: String },

    #[error("book has no chapters")]
    NoChapters,

    #[error("chapter {title:?} has no pages")]
    EmptyChapter { title: String },

    #[error("chapter without title at line {line}")]
    MissingChapterTitle { line: usize },

    #[error("page block before any chapter at line {line}")]
    BlockBeforeChapter { line: usize },

    #[error("malformed metadata at line {line}: {reason}")]
    MalformedMetadata { line: usize, reason: String },

    #[error("metadata field @{field} after first chapter at line {line}")]
    MisplacedMetadata { field: String, line: usize },

    #[error("unknown metadata field @{field} at line {line}")]
    UnknownMetadata { field: String, line: usize },

    #[error("I/O error reading manuscript: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid UTF-8 at line {line}")]
    EncodingFailure { line: usize },
}

/// Field-less tag for [`ParseError`], convenient for UI dispatch and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    MissingMetadata,
    DuplicateMetadata,
    InvalidUuid,
    InvalidTimestamp,
    NoChapters,
    EmptyChapter,
    MissingChapterTitle,
    BlockBeforeChapter,
    MalformedMetadata,
    MisplacedMetadata,
    UnknownMetadata,
    IoFailure,
    EncodingFailure,
}

impl ParseError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingMetadata {
            field: field.to_string(),
        }
    }

    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedMetadata {
            line,
            reason: reason.into(),
        }
    }

    /// Tag identifying the error variant.
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            Self::MissingMetadata { .. } => ParseErrorKind::MissingMetadata,
            Self::DuplicateMetadata { .. } => ParseErrorKind::DuplicateMetadata,
            Self::InvalidUuid { .. } => ParseErrorKind::InvalidUuid,
            Self::InvalidTimestamp { .. } => ParseErrorKind::InvalidTimestamp,
            Self::NoChapters => ParseErrorKind::NoChapters,
            Self::EmptyChapter { .. } => ParseErrorKind::EmptyChapter,
            Self::MissingChapterTitle { .. } => ParseErrorKind::MissingChapterTitle,
            Self::BlockBeforeChapter { .. } => ParseErrorKind::BlockBeforeChapter,
            Self::MalformedMetadata { .. } => ParseErrorKind::MalformedMetadata,
            Self::MisplacedMetadata { .. } => ParseErrorKind::MisplacedMetadata,
            Self::UnknownMetadata { .. } => ParseErrorKind::UnknownMetadata,
            Self::Io(_) => ParseErrorKind::IoFailure,
            Self::EncodingFailure { .. } => ParseErrorKind::EncodingFailure,
        }
    }

    /// Input line the error points at, when it is position based.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::DuplicateMetadata { line, .. }
            | Self::MissingChapterTitle { line }
            | Self::BlockBeforeChapter { line }
            | Self::MalformedMetadata { line, .. }
            | Self::MisplacedMetadata { line, .. }
            | Self::UnknownMetadata { line, .. }
            | Self::EncodingFailure { line } => Some(*line),
            _ => None,
        }
    }

    /// Remediation text for the error.
    pub fn help(&self) -> String {
        match self {
            Self::MissingMetadata { field } => {
                format!("Add the required '@{field}:' field at the top of the manuscript, before the first '#chapter:'")
            }
            Self::DuplicateMetadata { field, .. } => {
                format!("Remove the duplicate '@{field}:' line; each metadata field may appear only once")
            }
            Self::InvalidUuid { .. } => {
                "The @id field must be a valid UUID (e.g. 550e8400-e29b-41d4-a009-426655440000). Remove @id to have one generated".to_string()
            }
            Self::InvalidTimestamp { .. } => {
                "Timestamps must be RFC 3339 strings such as 2025-01-15T10:30:00Z".to_string()
            }
            Self::NoChapters => {
                "Add at least one chapter using '#chapter: Chapter Title'".to_string()
            }
            Self::EmptyChapter { title } => {
                format!("Add an '@page:' block with some text under '#chapter: {title}', or remove the chapter")
            }
            Self::MissingChapterTitle { .. } => {
                "A chapter declaration must include a title: '#chapter: Your Title'".to_string()
            }
            Self::BlockBeforeChapter { .. } => {
                "Move the '@page:' block below a '#chapter:' line".to_string()
            }
            Self::MalformedMetadata { reason, .. } => {
                format!("Metadata lines use the form '@field: value' ({reason})")
            }
            Self::MisplacedMetadata { field, .. } => {
                format!("Move '@{field}:' to the metadata section at the top, before the first '#chapter:'")
            }
            Self::UnknownMetadata { field, .. } => {
                format!("Remove '@{field}:' or parse in lenient mode; known fields are @title, @author, @id and @dedication")
            }
            Self::Io(_) => "Check that the file exists and is readable".to_string(),
            Self::EncodingFailure { .. } => {
                "Save the manuscript as UTF-8 text".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_has_help_text() {
        let errors = [
            ParseError::missing("title"),
            ParseError::DuplicateMetadata {
                field: "author".into(),
                line: 3,
            },
            ParseError::InvalidUuid {
                value: "nope".into(),
            },
            ParseError::InvalidTimestamp {
                value: "yesterday".into(),
            },
            ParseError::NoChapters,
            ParseError::EmptyChapter {
                title: "One".into(),
            },
            ParseError::MissingChapterTitle { line: 4 },
            ParseError::BlockBeforeChapter { line: 5 },
            ParseError::malformed(2, "missing ':'"),
            ParseError::MisplacedMetadata {
                field: "title".into(),
                line: 9,
            },
            ParseError::UnknownMetadata {
                field: "genre".into(),
                line: 2,
            },
            ParseError::Io(std::io::Error::other("boom")),
            ParseError::EncodingFailure { line: 1 },
        ];
        for err in &errors {
            assert!(!err.to_string().is_empty());
            assert!(!err.help().is_empty(), "no help for {:?}", err.kind());
        }
    }

    #[test]
    fn help_mentions_the_directive_to_fix() {
        assert!(ParseError::missing("title").help().contains("@title:"));
        assert!(ParseError::NoChapters.help().contains("#chapter:"));
        assert!(ParseError::InvalidUuid {
            value: "x".into()
        }
        .help()
        .contains("UUID"));
    }

    #[test]
    fn line_is_reported_for_positional_errors_only() {
        assert_eq!(ParseError::BlockBeforeChapter { line: 7 }.line(), Some(7));
        assert_eq!(ParseError::NoChapters.line(), None);
        assert_eq!(ParseError::missing("author").line(), None);
    }

    #[test]
    fn io_errors_convert() {
        let err: ParseError = std::io::Error::other("disk").into();
        assert_eq!(err.kind(), ParseErrorKind::IoFailure);
    }
}
