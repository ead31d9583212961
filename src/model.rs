//! Document tree: a book owns its chapters, a chapter owns its blocks.
//!
//! Chapter and block identifiers are name-based (UUID v5) so that parsing the
//! same manuscript twice yields the same ids. Only the book id may be random,
//! and only when the manuscript does not carry an `@id:` line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A parsed manuscript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Book identifier, from `@id:` or generated once at parse time.
    pub id: Uuid,
    /// Book title (`@title:`).
    pub title: String,
    /// Book author (`@author:`).
    pub author: String,
    /// Optional dedication (`@dedication:`).
    pub dedication: Option<String>,
    /// Creation timestamp supplied by the caller.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp supplied by the caller.
    pub updated_at: DateTime<Utc>,
    /// Chapters in declaration order.
    pub chapters: Vec<Chapter>,
}

/// A chapter within a book.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Derived from the book id, `order` and `title`.
    pub id: Uuid,
    pub title: String,
    /// Zero-based declaration position.
    pub order: usize,
    pub blocks: Vec<Block>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A unit of content within a chapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Derived from the chapter id and `order`.
    pub id: Uuid,
    /// Block text with enclosing blank lines trimmed.
    pub content: String,
    /// Zero-based position within the chapter.
    pub order: usize,
    pub block_type: BlockType,
}

/// Kind of content a block holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum BlockType {
    /// Flowing prose introduced by `@page:`.
    #[default]
    Page,
}

/// Deterministic chapter id.
pub fn chapter_id(book_id: &Uuid, order: usize, title: &str) -> Uuid {
    let name = format!("{order}-{title}");
    Uuid::new_v5(book_id, name.as_bytes())
}

/// Deterministic block id.
pub fn block_id(chapter_id: &Uuid, order: usize) -> Uuid {
    Uuid::new_v5(chapter_id, order.to_string().as_bytes())
}

impl Book {
    /// Create an empty book with a fresh id and "now" timestamps.
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            author: author.into(),
            dedication: None,
            created_at: now,
            updated_at: now,
            chapters: Vec::new(),
        }
    }

    /// Append a chapter holding `content` as a single page block.
    ///
    /// Blank content produces a chapter without blocks.
    pub fn add_chapter(&mut self, title: impl Into<String>, content: &str) -> &Chapter {
        let title = title.into();
        let order = self.chapters.len();
        let id = chapter_id(&self.id, order, &title);
        let content = content.trim();
        let blocks = if content.is_empty() {
            Vec::new()
        } else {
            vec![Block {
                id: block_id(&id, 0),
                content: content.to_string(),
                order: 0,
                block_type: BlockType::Page,
            }]
        };
        self.chapters.push(Chapter {
            id,
            title,
            order,
            blocks,
            created_at: self.created_at,
            updated_at: self.updated_at,
        });
        &self.chapters[order]
    }

    /// Look up a chapter by id.
    pub fn chapter(&self, id: &Uuid) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == *id)
    }

    /// Total number of blocks across all chapters.
    pub fn block_count(&self) -> usize {
        self.chapters.iter().map(|c| c.blocks.len()).sum()
    }

    /// Whitespace-delimited word count of all block content.
    pub fn word_count(&self) -> usize {
        self.chapters.iter().map(Chapter::word_count).sum()
    }
}

impl Chapter {
    /// All block content joined with a blank line.
    pub fn content(&self) -> String {
        let mut out = String::new();
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&block.content);
        }
        out
    }

    /// Whitespace-delimited word count.
    pub fn word_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.content.split_whitespace().count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_id() -> Uuid {
        Uuid::parse_str("550e8400-e29b-41d4-a009-426655440000").unwrap()
    }

    #[test]
    fn chapter_ids_depend_on_order_and_title() {
        let book = fixed_id();
        assert_eq!(chapter_id(&book, 0, "One"), chapter_id(&book, 0, "One"));
        assert_ne!(chapter_id(&book, 0, "One"), chapter_id(&book, 1, "One"));
        assert_ne!(chapter_id(&book, 0, "One"), chapter_id(&book, 0, "Two"));
        assert_eq!(chapter_id(&book, 0, "One").get_version_num(), 5);
    }

    #[test]
    fn block_ids_depend_on_chapter_and_order() {
        let ch = chapter_id(&fixed_id(), 0, "One");
        let other = chapter_id(&fixed_id(), 1, "Two");
        assert_eq!(block_id(&ch, 0), block_id(&ch, 0));
        assert_ne!(block_id(&ch, 0), block_id(&ch, 1));
        assert_ne!(block_id(&ch, 0), block_id(&other, 0));
    }

    #[test]
    fn add_chapter_assigns_order_and_derived_ids() {
        let mut book = Book::new("Title", "Author");
        book.add_chapter("First", "Hello");
        book.add_chapter("Second", "   ");

        assert_eq!(book.chapters.len(), 2);
        assert_eq!(book.chapters[1].order, 1);
        assert_eq!(book.chapters[0].id, chapter_id(&book.id, 0, "First"));
        assert_eq!(book.chapters[0].blocks[0].id, block_id(&book.chapters[0].id, 0));
        assert!(book.chapters[1].is_empty());
        assert_eq!(book.block_count(), 1);
    }

    #[test]
    fn chapter_content_joins_blocks_with_blank_line() {
        let mut book = Book::new("Title", "Author");
        book.add_chapter("Ch", "First page");
        let chapter = &mut book.chapters[0];
        chapter.blocks.push(Block {
            id: block_id(&chapter.id, 1),
            content: "Second page".into(),
            order: 1,
            block_type: BlockType::Page,
        });

        assert_eq!(book.chapters[0].content(), "First page\n\nSecond page");
        assert_eq!(book.word_count(), 4);
    }

    #[test]
    fn block_type_serializes_as_variant_name() {
        let json = serde_json::to_string(&BlockType::Page).unwrap();
        assert_eq!(json, "\"Page\"");
    }
}
