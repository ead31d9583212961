//! Manuscript writer: the inverse of the parser.
//!
//! Output is canonical: metadata first, one blank line, then chapters with
//! their pages separated by blank lines. Parsing the output yields the same
//! chapter and block structure, and the same ids when the book id is written.
//! Parsed values never contain line breaks, so they are written unchanged.

use std::borrow::Cow;
use std::fmt;

use crate::model::Book;

/// `Display` adapter rendering a [`Book`] in manuscript form.
#[derive(Clone, Copy, Debug)]
pub struct ManuscriptDisplay<'a> {
    book: &'a Book,
    write_id: bool,
}

impl ManuscriptDisplay<'_> {
    /// Leave out the `@id:` line.
    ///
    /// Re-parsing then assigns a fresh book id, so chapter and block ids change.
    pub fn without_id(mut self) -> Self {
        self.write_id = false;
        self
    }
}

impl fmt::Display for ManuscriptDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let book = self.book;
        writeln!(f, "@title: {}", single_line(&book.title))?;
        writeln!(f, "@author: {}", single_line(&book.author))?;
        if self.write_id {
            writeln!(f, "@id: {}", book.id)?;
        }
        if let Some(dedication) = book.dedication.as_deref() {
            writeln!(f, "@dedication: {}", single_line(dedication))?;
        }
        for chapter in &book.chapters {
            writeln!(f)?;
            writeln!(f, "#chapter: {}", single_line(&chapter.title))?;
            for (i, block) in chapter.blocks.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "@page:")?;
                writeln!(f, "{}", block.content)?;
            }
        }
        Ok(())
    }
}

/// Directive values cannot span lines; turn line breaks into spaces and keep
/// every other character as is.
fn single_line(value: &str) -> Cow<'_, str> {
    let is_break = |c: char| c == '\n' || c == '\r';
    if value.contains(is_break) {
        Cow::Owned(value.replace(is_break, " "))
    } else {
        Cow::Borrowed(value)
    }
}

impl Book {
    /// Display adapter for the manuscript form of this book.
    pub fn to_manuscript(&self) -> ManuscriptDisplay<'_> {
        ManuscriptDisplay {
            book: self,
            write_id: true,
        }
    }
}

/// Render a book as manuscript text.
pub fn to_manuscript(book: &Book) -> String {
    book.to_manuscript().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_with_timestamps;

    #[test]
    fn writes_canonical_layout() {
        let mut book = Book::new("T", "A");
        book.dedication = Some("For you".into());
        book.add_chapter("One", "Hello world");

        let text = to_manuscript(&book);
        let expected = format!(
            "@title: T\n@author: A\n@id: {}\n@dedication: For you\n\n#chapter: One\n@page:\nHello world\n",
            book.id
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn output_parses_back_to_the_same_book() {
        let mut book = Book::new("Round Trip", "Writer");
        book.add_chapter("First", "Line one\n\nLine three");
        book.add_chapter("Second", "Only page");

        let reparsed =
            parse_with_timestamps(&to_manuscript(&book), book.created_at, book.updated_at)
                .unwrap();
        assert_eq!(reparsed, book);
    }

    #[test]
    fn multiline_titles_are_folded() {
        let mut book = Book::new("Two\nLines", "A");
        book.add_chapter("Ch", "x");
        assert!(to_manuscript(&book).starts_with("@title: Two Lines\n"));
    }

    #[test]
    fn inner_whitespace_in_titles_keeps_ids() {
        let source = "@title: The  Long\tWay\n@author: A\n@id: 6f2c1d3e-8a4b-4c5d-9e6f-7a8b9c0d1e2f\n\
                      #chapter: Part  One\n@page:\nfirst\n#chapter: Cap\u{ed}tulo\t2\n@page:\nsecond";
        let created = chrono::Utc::now();
        let book = parse_with_timestamps(source, created, created).unwrap();
        assert_eq!(book.chapters[0].title, "Part  One");

        let text = to_manuscript(&book);
        assert!(text.contains("#chapter: Part  One\n"));
        let reparsed = parse_with_timestamps(&text, created, created).unwrap();
        assert_eq!(reparsed.title, "The  Long\tWay");
        assert_eq!(reparsed.chapters[0].id, book.chapters[0].id);
        assert_eq!(
            reparsed.chapters[0].blocks[0].id,
            book.chapters[0].blocks[0].id
        );
        assert_eq!(reparsed, book);
    }

    #[test]
    fn id_line_can_be_left_out() {
        let mut book = Book::new("T", "A");
        book.add_chapter("One", "Hello");
        let text = book.to_manuscript().without_id().to_string();
        assert!(!text.contains("@id:"));
        assert_eq!(text, "@title: T\n@author: A\n\n#chapter: One\n@page:\nHello\n");
    }
}
