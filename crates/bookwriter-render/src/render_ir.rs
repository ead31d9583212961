use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Paginated output for one book.
///
/// A render tree is a pure function of the book, the layout configuration and
/// the text metrics: laying out the same inputs twice yields equal trees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderTree {
    /// Id of the book this tree was laid out from.
    pub book_id: Uuid,
    /// Pages in reading order.
    pub pages: Vec<PageRender>,
    /// Summary counts and chapter page spans.
    pub metadata: RenderMetadata,
}

impl RenderTree {
    /// Page by 1-based page number.
    pub fn page(&self, page_number: usize) -> Option<&PageRender> {
        page_number
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
    }

    /// Page span of a chapter.
    pub fn chapter_span(&self, chapter_id: &Uuid) -> Option<&ChapterPageSpan> {
        self.metadata
            .chapters
            .iter()
            .find(|span| span.chapter_id == *chapter_id)
    }

    /// Iterate every fragment on every page.
    pub fn fragments(&self) -> impl Iterator<Item = &TextFragment> + '_ {
        self.pages.iter().flat_map(PageRender::fragments)
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Summary of a render tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderMetadata {
    pub total_pages: usize,
    pub total_chapters: usize,
    /// One entry per chapter, in chapter order.
    pub chapters: Vec<ChapterPageSpan>,
}

/// Pages occupied by one chapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPageSpan {
    pub chapter_id: Uuid,
    /// Chapter index in book order (0-based).
    pub chapter_index: usize,
    /// 1-based page number holding the chapter title.
    pub first_page: usize,
    /// Pages from the title page through the chapter's last line.
    pub page_count: usize,
}

/// A single laid-out page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageRender {
    /// 1-based page number.
    pub page_number: usize,
    /// Physical side, used for margin mirroring only.
    pub side: PageSide,
    pub frames: Vec<TextFrame>,
}

impl PageRender {
    /// `true` for inserted blank pages.
    pub fn is_blank(&self) -> bool {
        self.frames.is_empty()
    }

    /// First frame of the given type.
    pub fn frame(&self, frame_type: FrameType) -> Option<&TextFrame> {
        self.frames.iter().find(|f| f.frame_type == frame_type)
    }

    pub fn fragments(&self) -> impl Iterator<Item = &TextFragment> + '_ {
        self.frames
            .iter()
            .flat_map(|f| f.lines.iter())
            .flat_map(|l| l.fragments.iter())
    }
}

/// Page side. Odd page numbers are recto (`Right`), even are verso (`Left`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageSide {
    Left,
    Right,
}

impl PageSide {
    /// Side for a 1-based page number.
    pub fn for_page(page_number: usize) -> Self {
        if page_number % 2 == 1 {
            Self::Right
        } else {
            Self::Left
        }
    }
}

/// A positioned text box on a page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextFrame {
    /// Frame rectangle in page coordinates (points, origin top-left).
    pub bounds: Rectangle,
    /// Lines with `y_offset` relative to `bounds.y`.
    pub lines: Vec<TextLine>,
    pub frame_type: FrameType,
}

impl TextFrame {
    /// Text of each line, fragments joined by a single space.
    pub fn line_texts(&self) -> Vec<String> {
        self.lines.iter().map(TextLine::text).collect()
    }
}

/// Role of a text frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum FrameType {
    ChapterTitle,
    BodyText,
    PageNumber,
    Dedication,
}

/// A line of text positioned within its frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub y_offset: f32,
    pub fragments: Vec<TextFragment>,
}

impl TextLine {
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&fragment.text);
        }
        out
    }
}

/// A run of text sharing one style.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// Horizontal offset from the frame's left edge.
    pub x_offset: f32,
    pub style: TextStyle,
    /// Block (or chapter, for titles) this text came from. Traceability only.
    pub source_block_id: Uuid,
}

/// Axis-aligned rectangle in points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Text styling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Font size in points.
    pub font_size: f32,
    /// Line-height multiplier applied to `font_size`.
    pub line_height: f32,
    pub alignment: Alignment,
}

impl TextStyle {
    pub fn new(font_size: f32, line_height: f32, alignment: Alignment) -> Self {
        Self {
            font_size,
            line_height,
            alignment,
        }
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            line_height: 1.5,
            alignment: Alignment::Left,
        }
    }
}

/// Horizontal alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    /// Stretch inter-word gaps so every line but the last fills the width.
    Justify,
}
