//! Manuscript parser and document model for bookwriter.
//!
//! A manuscript is plain text with `@field:` metadata, `#chapter:` headers and
//! `@page:` blocks. Parsing yields a [`Book`] whose chapter and block ids are
//! derived deterministically, so re-parsing after every edit keeps ids stable.
//!
//! ```rust
//! use bookwriter::parse;
//!
//! let book = parse("@title: T\n@author: A\n#chapter: One\n@page:\nHello world")?;
//! assert_eq!(book.chapters[0].blocks[0].content, "Hello world");
//! # Ok::<(), bookwriter::ParseError>(())
//! ```
//!
//! Pagination lives in the `bookwriter-render` crate.

#![cfg_attr(
    not(test),
    deny(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod error;
pub mod model;
pub mod parser;
pub mod writer;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use model::{block_id, chapter_id, Block, BlockType, Book, Chapter};
pub use parser::{
    parse, parse_bytes, parse_reader, parse_timestamp, parse_with_rfc3339, parse_with_timestamps,
    ManuscriptParser, ParseOptions, Strictness,
};
pub use writer::{to_manuscript, ManuscriptDisplay};
