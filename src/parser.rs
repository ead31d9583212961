//! Manuscript parser.
//!
//! The manuscript format is line oriented:
//!
//! ```text
//! @title: The Way of Iron
//! @author: Tej
//! @dedication: To my family
//!
//! #chapter: Chapter One
//! @page:
//! The morning sun cracked over the horizon...
//! ```
//!
//! Parsing is a single pass over lines driven by a small state machine. Lines
//! mutate an accumulator only; the [`Book`] is assembled after the whole input
//! has been scanned, so an error never leaves a partially built tree behind.

use std::io::BufRead;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ParseError, ParseResult};
use crate::model::{block_id, chapter_id, Block, BlockType, Book, Chapter};

const CHAPTER_DIRECTIVE: &str = "#chapter:";
const PAGE_DIRECTIVE: &str = "@page:";
const BOM: char = '\u{feff}';

/// How unexpected-but-harmless input is treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Unknown `@field:` lines are skipped and empty chapters are kept.
    #[default]
    Lenient,
    /// Unknown `@field:` lines and chapters without pages are errors.
    Strict,
}

/// Parser options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub strictness: Strictness,
}

impl ParseOptions {
    /// Options with [`Strictness::Strict`].
    pub fn strict() -> Self {
        Self {
            strictness: Strictness::Strict,
        }
    }
}

/// Parser state machine states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParserState {
    /// Nothing but blank lines seen so far.
    ReadingMetadata,
    /// At least one metadata line seen, no chapter yet.
    ExpectingChapterOrMetadata,
    /// Inside a chapter, before its first block.
    ReadingChapterHeader,
    /// Accumulating block content.
    ReadingBlock,
}

/// A classified input line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Chapter(&'a str),
    Page(&'a str),
    Field { name: &'a str, value: &'a str },
    Text,
}

impl<'a> Line<'a> {
    fn classify(raw: &'a str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Blank;
        }
        if let Some(title) = trimmed.strip_prefix(CHAPTER_DIRECTIVE) {
            return Self::Chapter(title.trim());
        }
        if trimmed == "#chapter" {
            return Self::Chapter("");
        }
        if let Some(rest) = trimmed.strip_prefix(PAGE_DIRECTIVE) {
            return Self::Page(rest.trim());
        }
        if let Some(body) = trimmed.strip_prefix('@') {
            if let Some((name, value)) = body.split_once(':') {
                if is_field_name(name) {
                    return Self::Field {
                        name,
                        value: value.trim(),
                    };
                }
            }
        }
        Self::Text
    }
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[derive(Debug, Default)]
struct PendingMetadata {
    title: Option<String>,
    author: Option<String>,
    id: Option<String>,
    dedication: Option<String>,
}

#[derive(Debug)]
struct PendingChapter {
    title: String,
    blocks: Vec<String>,
}

/// Streaming manuscript parser.
///
/// Feed lines with [`push_line`](Self::push_line) and call
/// [`finish`](Self::finish), or use one of the `parse_*` helpers.
#[derive(Debug)]
pub struct ManuscriptParser {
    options: ParseOptions,
    state: ParserState,
    line_number: usize,
    metadata: PendingMetadata,
    chapters: Vec<PendingChapter>,
    block: Vec<String>,
}

impl Default for ManuscriptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ManuscriptParser {
    /// Parser with default (lenient) options.
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self {
            options,
            state: ParserState::ReadingMetadata,
            line_number: 0,
            metadata: PendingMetadata::default(),
            chapters: Vec::new(),
            block: Vec::new(),
        }
    }

    /// Number of lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Whether an `@id:` line has been consumed.
    pub fn has_id(&self) -> bool {
        self.metadata.id.is_some()
    }

    /// Consume one line (without its terminator).
    pub fn push_line(&mut self, raw: &str) -> ParseResult<()> {
        self.line_number += 1;
        let raw = if self.line_number == 1 {
            raw.strip_prefix(BOM).unwrap_or(raw)
        } else {
            raw
        };
        let line = Line::classify(raw);
        self.state = match self.state {
            ParserState::ReadingMetadata | ParserState::ExpectingChapterOrMetadata => {
                self.step_metadata(line)?
            }
            ParserState::ReadingChapterHeader => self.step_chapter_header(line, raw)?,
            ParserState::ReadingBlock => self.step_block(line, raw)?,
        };
        Ok(())
    }

    fn step_metadata(&mut self, line: Line<'_>) -> ParseResult<ParserState> {
        match line {
            Line::Blank => Ok(self.state),
            Line::Field { name, value } => {
                self.set_field(name, value)?;
                Ok(ParserState::ExpectingChapterOrMetadata)
            }
            Line::Chapter(title) => self.open_chapter(title),
            Line::Page(_) => Err(ParseError::BlockBeforeChapter {
                line: self.line_number,
            }),
            Line::Text => Err(ParseError::malformed(
                self.line_number,
                "expected '@field: value' or '#chapter: Title'",
            )),
        }
    }

    fn step_chapter_header(&mut self, line: Line<'_>, raw: &str) -> ParseResult<ParserState> {
        match line {
            Line::Blank => Ok(ParserState::ReadingChapterHeader),
            Line::Chapter(title) => {
                self.close_chapter();
                self.open_chapter(title)
            }
            Line::Page(first) => {
                self.open_block(first);
                Ok(ParserState::ReadingBlock)
            }
            Line::Field { name, .. } if is_known_field(name) => {
                Err(ParseError::MisplacedMetadata {
                    field: name.to_string(),
                    line: self.line_number,
                })
            }
            Line::Field { .. } | Line::Text => {
                // Prose directly under a chapter header opens an implicit page.
                self.block.push(raw.to_string());
                Ok(ParserState::ReadingBlock)
            }
        }
    }

    fn step_block(&mut self, line: Line<'_>, raw: &str) -> ParseResult<ParserState> {
        match line {
            Line::Chapter(title) => {
                self.close_block();
                self.close_chapter();
                self.open_chapter(title)
            }
            Line::Page(first) => {
                self.close_block();
                self.open_block(first);
                Ok(ParserState::ReadingBlock)
            }
            Line::Blank | Line::Field { .. } | Line::Text => {
                self.block.push(raw.to_string());
                Ok(ParserState::ReadingBlock)
            }
        }
    }

    fn set_field(&mut self, name: &str, value: &str) -> ParseResult<()> {
        let line = self.line_number;
        let slot = match name {
            "title" => &mut self.metadata.title,
            "author" => &mut self.metadata.author,
            "id" => &mut self.metadata.id,
            "dedication" => &mut self.metadata.dedication,
            _ => {
                return match self.options.strictness {
                    Strictness::Strict => Err(ParseError::UnknownMetadata {
                        field: name.to_string(),
                        line,
                    }),
                    Strictness::Lenient => {
                        log::debug!("ignoring unknown metadata field @{} at line {}", name, line);
                        Ok(())
                    }
                };
            }
        };
        if slot.is_some() {
            return Err(ParseError::DuplicateMetadata {
                field: name.to_string(),
                line,
            });
        }
        if value.is_empty() {
            return Err(ParseError::malformed(
                line,
                format!("@{name} has an empty value"),
            ));
        }
        *slot = Some(value.to_string());
        Ok(())
    }

    fn open_chapter(&mut self, title: &str) -> ParseResult<ParserState> {
        if title.is_empty() {
            return Err(ParseError::MissingChapterTitle {
                line: self.line_number,
            });
        }
        self.chapters.push(PendingChapter {
            title: title.to_string(),
            blocks: Vec::new(),
        });
        Ok(ParserState::ReadingChapterHeader)
    }

    fn open_block(&mut self, first_line: &str) {
        if !first_line.is_empty() {
            self.block.push(first_line.to_string());
        }
    }

    fn close_block(&mut self) {
        let content = self.block.join("\n");
        self.block.clear();
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        if let Some(chapter) = self.chapters.last_mut() {
            chapter.blocks.push(content.to_string());
        }
    }

    fn close_chapter(&mut self) {
        // Chapters are pushed when opened; only the pending block needs flushing.
        self.close_block();
    }

    /// Validate the scan result and build the book.
    pub fn finish(
        mut self,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> ParseResult<Book> {
        self.close_chapter();

        let title = self.metadata.title.ok_or_else(|| ParseError::missing("title"))?;
        let author = self
            .metadata
            .author
            .ok_or_else(|| ParseError::missing("author"))?;
        let id = match self.metadata.id {
            Some(raw) => Uuid::parse_str(&raw).map_err(|_| ParseError::InvalidUuid { value: raw })?,
            None => Uuid::new_v4(),
        };
        if self.chapters.is_empty() {
            return Err(ParseError::NoChapters);
        }
        if self.options.strictness == Strictness::Strict {
            if let Some(empty) = self.chapters.iter().find(|c| c.blocks.is_empty()) {
                return Err(ParseError::EmptyChapter {
                    title: empty.title.clone(),
                });
            }
        }

        let chapters: Vec<Chapter> = self
            .chapters
            .into_iter()
            .enumerate()
            .map(|(order, pending)| {
                let chapter_id = chapter_id(&id, order, &pending.title);
                let blocks = pending
                    .blocks
                    .into_iter()
                    .enumerate()
                    .map(|(block_order, content)| Block {
                        id: block_id(&chapter_id, block_order),
                        content,
                        order: block_order,
                        block_type: BlockType::Page,
                    })
                    .collect();
                Chapter {
                    id: chapter_id,
                    title: pending.title,
                    order,
                    blocks,
                    created_at,
                    updated_at,
                }
            })
            .collect();

        log::debug!(
            "parsed manuscript {:?}: {} chapters, {} lines",
            title,
            chapters.len(),
            self.line_number
        );

        Ok(Book {
            id,
            title,
            author,
            dedication: self.metadata.dedication,
            created_at,
            updated_at,
            chapters,
        })
    }

    /// Parse a complete manuscript held in memory.
    pub fn parse_str(
        mut self,
        source: &str,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> ParseResult<Book> {
        for line in source.lines() {
            self.push_line(line)?;
        }
        self.finish(created_at, updated_at)
    }

    /// Parse raw bytes that must be UTF-8.
    pub fn parse_bytes(
        self,
        bytes: &[u8],
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> ParseResult<Book> {
        let source = std::str::from_utf8(bytes).map_err(|e| ParseError::EncodingFailure {
            line: line_of_offset(bytes, e.valid_up_to()),
        })?;
        self.parse_str(source, created_at, updated_at)
    }

    /// Parse from a buffered reader, line by line.
    pub fn parse_reader<R: BufRead>(
        mut self,
        reader: R,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> ParseResult<Book> {
        self.push_reader(reader)?;
        self.finish(created_at, updated_at)
    }

    /// Feed every line of `reader` without finishing.
    pub fn push_reader<R: BufRead>(&mut self, mut reader: R) -> ParseResult<()> {
        let mut buf = Vec::with_capacity(128);
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(());
            }
            strip_line_terminator(&mut buf);
            let line = std::str::from_utf8(&buf).map_err(|_| ParseError::EncodingFailure {
                line: self.line_number + 1,
            })?;
            self.push_line(line)?;
        }
    }
}

fn is_known_field(name: &str) -> bool {
    matches!(name, "title" | "author" | "id" | "dedication")
}

fn strip_line_terminator(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

fn line_of_offset(bytes: &[u8], offset: usize) -> usize {
    bytes[..offset].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Parse a manuscript, stamping it with the current time.
pub fn parse(source: &str) -> ParseResult<Book> {
    let now = Utc::now();
    parse_with_timestamps(source, now, now)
}

/// Parse a manuscript with caller-supplied timestamps.
pub fn parse_with_timestamps(
    source: &str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> ParseResult<Book> {
    ManuscriptParser::new().parse_str(source, created_at, updated_at)
}

/// Parse a manuscript with optional RFC 3339 timestamps; missing ones default to now.
pub fn parse_with_rfc3339(
    source: &str,
    created_at: Option<&str>,
    updated_at: Option<&str>,
) -> ParseResult<Book> {
    let now = Utc::now();
    let created = parse_timestamp(created_at)?.unwrap_or(now);
    let updated = parse_timestamp(updated_at)?.unwrap_or(now);
    parse_with_timestamps(source, created, updated)
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(value: Option<&str>) -> ParseResult<Option<DateTime<Utc>>> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| ParseError::InvalidTimestamp {
                    value: raw.to_string(),
                })
        })
        .transpose()
}

/// Parse UTF-8 bytes with caller-supplied timestamps.
pub fn parse_bytes(
    bytes: &[u8],
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> ParseResult<Book> {
    ManuscriptParser::new().parse_bytes(bytes, created_at, updated_at)
}

/// Parse from a reader with caller-supplied timestamps.
pub fn parse_reader<R: BufRead>(
    reader: R,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> ParseResult<Book> {
    ManuscriptParser::new().parse_reader(reader, created_at, updated_at)
}
