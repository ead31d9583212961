use std::fmt;
use std::sync::Arc;

use bookwriter::{Book, Chapter};
use uuid::Uuid;

use crate::render_ir::{
    Alignment, ChapterPageSpan, FrameType, PageRender, PageSide, Rectangle, RenderMetadata,
    RenderTree, TextFrame, TextLine, TextStyle,
};
use crate::render_layout::{ApproxTextMetrics, LayoutConfig, LineBreaker, TextMetrics};

/// Slack for float comparisons when checking whether a line fits.
const FIT_EPSILON: f32 = 1e-3;

/// Layout engine: turns a [`Book`] into a [`RenderTree`].
#[derive(Clone)]
pub struct LayoutEngine {
    cfg: LayoutConfig,
    metrics: Arc<dyn TextMetrics>,
}

impl fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutEngine {
    /// Create an engine using [`ApproxTextMetrics`].
    pub fn new(cfg: LayoutConfig) -> Self {
        Self {
            cfg,
            metrics: Arc::new(ApproxTextMetrics::default()),
        }
    }

    /// Replace the text metrics used for line fitting.
    pub fn with_text_metrics(mut self, metrics: Arc<dyn TextMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.cfg
    }

    /// Lay out `book` into pages.
    pub fn layout(&self, book: &Book) -> Result<RenderTree, LayoutError> {
        layout_book_with_metrics(book, &self.cfg, self.metrics.as_ref())
    }
}

/// Lay out `book` with the default text metrics.
pub fn layout_book(book: &Book, cfg: &LayoutConfig) -> Result<RenderTree, LayoutError> {
    layout_book_with_metrics(book, cfg, &ApproxTextMetrics::default())
}

/// Lay out `book` with caller-provided text metrics.
///
/// The configuration is validated first; on error no pages are produced.
pub fn layout_book_with_metrics(
    book: &Book,
    cfg: &LayoutConfig,
    metrics: &dyn TextMetrics,
) -> Result<RenderTree, LayoutError> {
    cfg.validate(metrics)?;

    let mut paginator = Paginator::new(cfg, metrics);
    if cfg.dedication_page {
        if let Some(dedication) = book.dedication.as_deref() {
            paginator.dedication(dedication, book.id);
        }
    }
    let mut spans = Vec::with_capacity(book.chapters.len());
    for (index, chapter) in book.chapters.iter().enumerate() {
        let odd_start = cfg.chapters_on_odd_page || (index == 0 && cfg.first_chapter_on_odd_page);
        spans.push(paginator.chapter(index, chapter, odd_start));
    }
    let pages = paginator.finish();

    log::debug!(
        "laid out book {}: {} chapters on {} pages",
        book.id,
        book.chapters.len(),
        pages.len()
    );
    Ok(RenderTree {
        book_id: book.id,
        metadata: RenderMetadata {
            total_pages: pages.len(),
            total_chapters: book.chapters.len(),
            chapters: spans,
        },
        pages,
    })
}

/// Page under construction. `cursor` is the absolute y of the next line.
struct OpenPage {
    page_number: usize,
    side: PageSide,
    frames: Vec<TextFrame>,
    cursor: f32,
}

impl OpenPage {
    fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

struct Paginator<'a> {
    cfg: &'a LayoutConfig,
    breaker: LineBreaker<'a>,
    metrics: &'a dyn TextMetrics,
    pages: Vec<PageRender>,
    open: Option<OpenPage>,
    /// Spacing owed before the next line; dropped at a page top.
    pending_gap: f32,
}

impl<'a> Paginator<'a> {
    fn new(cfg: &'a LayoutConfig, metrics: &'a dyn TextMetrics) -> Self {
        Self {
            cfg,
            breaker: LineBreaker::new(metrics, cfg.content_width()),
            metrics,
            pages: Vec::new(),
            open: None,
            pending_gap: 0.0,
        }
    }

    fn next_page_number(&self) -> usize {
        self.pages.len() + usize::from(self.open.is_some()) + 1
    }

    fn content_top(&self) -> f32 {
        self.cfg.margins.top
    }

    fn content_bottom(&self) -> f32 {
        self.cfg.page_size.height - self.cfg.margins.bottom
    }

    fn open_page(&mut self) -> &mut OpenPage {
        let top = self.content_top();
        let page_number = self.next_page_number();
        self.open.get_or_insert_with(|| OpenPage {
            page_number,
            side: PageSide::for_page(page_number),
            frames: Vec::new(),
            cursor: top,
        })
    }

    fn close_page(&mut self) {
        let Some(page) = self.open.take() else {
            return;
        };
        self.pending_gap = 0.0;
        let mut frames = page.frames;
        if self.cfg.page_numbers && !frames.is_empty() {
            frames.push(self.page_number_frame(page.page_number, page.side));
        }
        log::trace!(
            "finalized page {} ({:?}) with {} frames",
            page.page_number,
            page.side,
            frames.len()
        );
        self.pages.push(PageRender {
            page_number: page.page_number,
            side: page.side,
            frames,
        });
    }

    fn push_blank_page(&mut self) {
        let page_number = self.next_page_number();
        log::trace!("inserted blank page {page_number}");
        self.pages.push(PageRender {
            page_number,
            side: PageSide::for_page(page_number),
            frames: Vec::new(),
        });
    }

    fn page_number_frame(&self, page_number: usize, side: PageSide) -> TextFrame {
        let style = self.cfg.body_style.with_alignment(Alignment::Center);
        let line_height = self.metrics.line_height(style.font_size, style.line_height);
        let bottom_margin = self.cfg.margins.bottom;
        let y = self.content_bottom() + ((bottom_margin - line_height) / 2.0).max(0.0);
        TextFrame {
            bounds: Rectangle {
                x: self.cfg.margins.left_for(side),
                y,
                width: self.cfg.content_width(),
                height: line_height,
            },
            lines: self
                .breaker
                .break_lines(&page_number.to_string(), &style, Uuid::nil()),
            frame_type: FrameType::PageNumber,
        }
    }

    /// Dedication page: centred text on a page of its own.
    fn dedication(&mut self, text: &str, book_id: Uuid) {
        let style = self.cfg.body_style.with_alignment(Alignment::Center);
        let lines = self.breaker.break_lines(text, &style, book_id);
        if lines.is_empty() {
            return;
        }
        self.close_page();
        let cfg = self.cfg;
        let line_height = self.metrics.line_height(style.font_size, style.line_height);
        let height = lines.len() as f32 * line_height;
        let y = cfg.margins.top + ((cfg.content_height() - height) / 2.0).max(0.0);

        let page = self.open_page();
        page.frames.push(TextFrame {
            bounds: Rectangle {
                x: cfg.margins.left_for(page.side),
                y,
                width: cfg.content_width(),
                height,
            },
            lines,
            frame_type: FrameType::Dedication,
        });
        self.close_page();
    }

    fn chapter(&mut self, index: usize, chapter: &Chapter, odd_start: bool) -> ChapterPageSpan {
        self.close_page();
        if odd_start && self.next_page_number() % 2 == 0 {
            self.push_blank_page();
        }
        let first_page = self.next_page_number();

        let title_style = self.cfg.chapter_title_style;
        let title_lines = self
            .breaker
            .break_lines(&chapter.title, &title_style, chapter.id);
        self.place_lines(title_lines, &title_style, FrameType::ChapterTitle);
        self.pending_gap = self.cfg.block_spacing;

        let body_style = self.cfg.body_style;
        for block in &chapter.blocks {
            let lines = self
                .breaker
                .break_lines(&block.content, &body_style, block.id);
            if lines.is_empty() {
                continue;
            }
            self.place_lines(lines, &body_style, FrameType::BodyText);
            self.pending_gap = self.cfg.block_spacing;
        }

        // A chapter with an empty title and no blocks still owns its page.
        self.open_page();
        let last_page = self.next_page_number() - 1;
        ChapterPageSpan {
            chapter_id: chapter.id,
            chapter_index: index,
            first_page,
            page_count: last_page + 1 - first_page,
        }
    }

    /// Place lines top to bottom, breaking pages where a line does not fit.
    fn place_lines(&mut self, lines: Vec<TextLine>, style: &TextStyle, frame_type: FrameType) {
        let line_height = self.metrics.line_height(style.font_size, style.line_height);
        for line in lines {
            self.place_line(line, line_height, frame_type);
        }
    }

    fn place_line(&mut self, mut line: TextLine, line_height: f32, frame_type: FrameType) {
        let cfg = self.cfg;
        let bottom = self.content_bottom();
        let fits = self.open.as_ref().map_or(true, |page| {
            page.is_empty() || page.cursor + self.pending_gap + line_height <= bottom + FIT_EPSILON
        });
        if !fits {
            self.close_page();
        }
        let gap = core::mem::take(&mut self.pending_gap);

        // An empty page always takes the line, so every call makes progress.
        let page = self.open_page();
        if !page.is_empty() {
            page.cursor += gap;
        }

        let reuse = page
            .frames
            .last()
            .is_some_and(|frame| frame.frame_type == frame_type);
        if !reuse {
            // Body frames reach the bottom margin; other frames grow with their lines.
            let height = match frame_type {
                FrameType::BodyText => (bottom - page.cursor).max(0.0),
                _ => 0.0,
            };
            page.frames.push(TextFrame {
                bounds: Rectangle {
                    x: cfg.margins.left_for(page.side),
                    y: page.cursor,
                    width: cfg.content_width(),
                    height,
                },
                lines: Vec::new(),
                frame_type,
            });
        }
        let cursor = page.cursor;
        if let Some(frame) = page.frames.last_mut() {
            line.y_offset = cursor - frame.bounds.y;
            frame.lines.push(line);
            if frame.frame_type != FrameType::BodyText {
                frame.bounds.height = cursor + line_height - frame.bounds.y;
            }
        }
        page.cursor = cursor + line_height;
    }

    fn finish(mut self) -> Vec<PageRender> {
        self.close_page();
        self.pages
    }
}

/// Layout configuration error, reported before any page is produced.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutError {
    /// Page width or height is not a positive finite number.
    InvalidPageSize { width: f32, height: f32 },
    /// A margin is negative or not finite.
    InvalidMargin { edge: &'static str, value: f32 },
    /// Margins leave no room for text.
    NoContentArea { width: f32, height: f32 },
    /// Font size or line-height multiplier is unusable.
    InvalidTextStyle { role: &'static str, reason: String },
    /// Block spacing is negative or not finite.
    InvalidSpacing { value: f32 },
    /// A single line is taller than the body area of a page.
    LineTallerThanPage {
        role: &'static str,
        line_height: f32,
        body_height: f32,
    },
}

impl LayoutError {
    /// Remediation hint for the error.
    pub fn help(&self) -> String {
        match self {
            Self::InvalidPageSize { .. } => {
                "Use a preset page size (letter or a4) or give a width and height greater than zero, in points.".to_string()
            }
            Self::InvalidMargin { edge, .. } => format!(
                "Set the {edge} margin to zero or a positive number of points."
            ),
            Self::NoContentArea { .. } => {
                "The margins cover the whole page. Reduce the margins or choose a larger page size.".to_string()
            }
            Self::InvalidTextStyle { role, .. } => format!(
                "Give the {role} style a font size and line-height multiplier greater than zero."
            ),
            Self::InvalidSpacing { .. } => {
                "Set block spacing to zero or a positive number of points.".to_string()
            }
            Self::LineTallerThanPage { role, .. } => format!(
                "Reduce the {role} font size or line height, or shrink the top and bottom margins."
            ),
        }
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPageSize { width, height } => {
                write!(f, "invalid page size {}x{}", width, height)
            }
            Self::InvalidMargin { edge, value } => {
                write!(f, "invalid {} margin: {}", edge, value)
            }
            Self::NoContentArea { width, height } => write!(
                f,
                "no content area left inside margins ({}x{})",
                width, height
            ),
            Self::InvalidTextStyle { role, reason } => {
                write!(f, "invalid {} style: {}", role, reason)
            }
            Self::InvalidSpacing { value } => write!(f, "invalid block spacing: {}", value),
            Self::LineTallerThanPage {
                role,
                line_height,
                body_height,
            } => write!(
                f,
                "{} line height {} exceeds page body height {}",
                role, line_height, body_height
            ),
        }
    }
}

impl std::error::Error for LayoutError {}
