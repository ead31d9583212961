use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::render_engine::LayoutError;
use crate::render_ir::{Alignment, PageSide, TextFragment, TextLine, TextStyle};

const DEFAULT_CHAR_WIDTH_RATIO: f32 = 0.6;

/// Text measurement capability used for line fitting.
///
/// Implementations must be pure: the same arguments always produce the same
/// result, and no state may carry over between calls.
pub trait TextMetrics: Send + Sync {
    /// Width of `text` at `font_size`.
    fn measure_text(&self, text: &str, font_size: f32) -> f32;

    /// Width of a single character at `font_size`.
    fn measure_char(&self, c: char, font_size: f32) -> f32;

    /// Line advance for `font_size` scaled by the line-height `multiplier`.
    fn line_height(&self, font_size: f32, multiplier: f32) -> f32;
}

/// Fixed-advance approximation: every character is `font_size * ratio` wide.
///
/// Crude, but deterministic and good enough for previews. Swap in a
/// font-backed [`TextMetrics`] for print-accurate output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApproxTextMetrics {
    pub char_width_ratio: f32,
}

impl Default for ApproxTextMetrics {
    fn default() -> Self {
        Self {
            char_width_ratio: DEFAULT_CHAR_WIDTH_RATIO,
        }
    }
}

impl ApproxTextMetrics {
    pub fn with_ratio(char_width_ratio: f32) -> Self {
        Self { char_width_ratio }
    }
}

impl TextMetrics for ApproxTextMetrics {
    fn measure_text(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * self.char_width_ratio
    }

    fn measure_char(&self, _c: char, font_size: f32) -> f32 {
        font_size * self.char_width_ratio
    }

    fn line_height(&self, font_size: f32, multiplier: f32) -> f32 {
        font_size * multiplier
    }
}

/// Page dimensions in points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// US Letter, 8.5" x 11".
    pub const US_LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    /// A4, 210mm x 297mm.
    pub const A4: PageSize = PageSize {
        width: 595.0,
        height: 842.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Preset by name (`letter`, `us-letter`, `a4`), case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "letter" | "us-letter" | "us_letter" => Some(Self::US_LETTER),
            "a4" => Some(Self::A4),
            _ => None,
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::US_LETTER
    }
}

/// Page margins in points. `inner` is the binding edge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub inner: f32,
    pub outer: f32,
}

impl Margins {
    /// All four margins equal.
    pub fn uniform(margin: f32) -> Self {
        Self {
            top: margin,
            bottom: margin,
            inner: margin,
            outer: margin,
        }
    }

    /// Top/bottom share `vertical`, inner/outer share `horizontal`.
    pub fn symmetric(vertical: f32, horizontal: f32) -> Self {
        Self {
            top: vertical,
            bottom: vertical,
            inner: horizontal,
            outer: horizontal,
        }
    }

    /// Physical left margin for a page side.
    ///
    /// Recto pages bind on the left, verso pages on the right.
    pub fn left_for(&self, side: PageSide) -> f32 {
        match side {
            PageSide::Right => self.inner,
            PageSide::Left => self.outer,
        }
    }

    /// Physical right margin for a page side.
    pub fn right_for(&self, side: PageSide) -> f32 {
        match side {
            PageSide::Right => self.outer,
            PageSide::Left => self.inner,
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(72.0)
    }
}

/// Layout configuration for page construction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub page_size: PageSize,
    pub margins: Margins,
    /// Style for block text.
    pub body_style: TextStyle,
    /// Style for chapter titles.
    pub chapter_title_style: TextStyle,
    /// Start the first chapter on a recto page, inserting a blank page if needed.
    pub first_chapter_on_odd_page: bool,
    /// Apply the recto rule to every chapter, not only the first.
    pub chapters_on_odd_page: bool,
    /// Vertical gap after a chapter title and between blocks.
    pub block_spacing: f32,
    /// Emit a page-number frame in the bottom margin of non-blank pages.
    pub page_numbers: bool,
    /// Emit a dedication page ahead of the first chapter when the book has one.
    pub dedication_page: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::US_LETTER,
            margins: Margins::uniform(72.0),
            body_style: TextStyle::new(12.0, 1.5, Alignment::Left),
            chapter_title_style: TextStyle::new(24.0, 1.2, Alignment::Left),
            first_chapter_on_odd_page: true,
            chapters_on_odd_page: false,
            block_spacing: 12.0,
            page_numbers: true,
            dedication_page: true,
        }
    }
}

impl LayoutConfig {
    /// Defaults with a different page size.
    pub fn for_page_size(page_size: PageSize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Width available to text on every page.
    pub fn content_width(&self) -> f32 {
        self.page_size.width - self.margins.inner - self.margins.outer
    }

    /// Height between top and bottom margins.
    pub fn content_height(&self) -> f32 {
        self.page_size.height - self.margins.top - self.margins.bottom
    }

    /// Check the configuration against `metrics` before any page is produced.
    pub fn validate(&self, metrics: &dyn TextMetrics) -> Result<(), LayoutError> {
        let PageSize { width, height } = self.page_size;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(LayoutError::InvalidPageSize { width, height });
        }
        for (edge, value) in [
            ("top", self.margins.top),
            ("bottom", self.margins.bottom),
            ("inner", self.margins.inner),
            ("outer", self.margins.outer),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(LayoutError::InvalidMargin { edge, value });
            }
        }
        let (content_w, content_h) = (self.content_width(), self.content_height());
        if content_w <= 0.0 || content_h <= 0.0 {
            return Err(LayoutError::NoContentArea {
                width: content_w,
                height: content_h,
            });
        }
        if !(self.block_spacing.is_finite() && self.block_spacing >= 0.0) {
            return Err(LayoutError::InvalidSpacing {
                value: self.block_spacing,
            });
        }
        for (role, style) in [
            ("body", &self.body_style),
            ("chapter title", &self.chapter_title_style),
        ] {
            check_style(role, style)?;
            let line_height = metrics.line_height(style.font_size, style.line_height);
            if !(line_height.is_finite() && line_height > 0.0) {
                return Err(LayoutError::InvalidTextStyle {
                    role,
                    reason: format!("text metrics produced line height {line_height}"),
                });
            }
            if line_height > content_h {
                return Err(LayoutError::LineTallerThanPage {
                    role,
                    line_height,
                    body_height: content_h,
                });
            }
        }
        Ok(())
    }
}

fn check_style(role: &'static str, style: &TextStyle) -> Result<(), LayoutError> {
    if !(style.font_size.is_finite() && style.font_size > 0.0) {
        return Err(LayoutError::InvalidTextStyle {
            role,
            reason: format!("font size must be positive, got {}", style.font_size),
        });
    }
    if !(style.line_height.is_finite() && style.line_height > 0.0) {
        return Err(LayoutError::InvalidTextStyle {
            role,
            reason: format!(
                "line-height multiplier must be positive, got {}",
                style.line_height
            ),
        });
    }
    Ok(())
}

/// Greedy first-fit line breaker.
///
/// Words are whitespace-delimited; runs of whitespace collapse to one space.
/// A word wider than the available width gets a line of its own and is allowed
/// to overflow; words are never split.
pub struct LineBreaker<'a> {
    metrics: &'a dyn TextMetrics,
    max_width: f32,
}

impl fmt::Debug for LineBreaker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineBreaker")
            .field("max_width", &self.max_width)
            .finish()
    }
}

impl<'a> LineBreaker<'a> {
    pub fn new(metrics: &'a dyn TextMetrics, max_width: f32) -> Self {
        Self { metrics, max_width }
    }

    pub fn max_width(&self) -> f32 {
        self.max_width
    }

    /// Break `text` into positioned lines.
    ///
    /// Line `i` has `y_offset = i * line_height`. Empty or whitespace-only
    /// text yields no lines.
    pub fn break_lines(&self, text: &str, style: &TextStyle, source_id: Uuid) -> Vec<TextLine> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let spans = self.fit_words(&words, style.font_size);
        let line_height = self.metrics.line_height(style.font_size, style.line_height);
        let last = spans.len() - 1;
        spans
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                let fragments = self.place_fragments(&words[span], style, source_id, index == last);
                TextLine {
                    y_offset: index as f32 * line_height,
                    fragments,
                }
            })
            .collect()
    }

    /// Word ranges for each line.
    fn fit_words(&self, words: &[&str], font_size: f32) -> Vec<core::ops::Range<usize>> {
        let mut spans = Vec::new();
        let mut line = String::with_capacity(64);
        let mut start = 0;

        for (i, word) in words.iter().enumerate() {
            if line.is_empty() {
                line.push_str(word);
                start = i;
                continue;
            }
            line.push(' ');
            line.push_str(word);
            if self.metrics.measure_text(&line, font_size) <= self.max_width {
                continue;
            }
            spans.push(start..i);
            line.clear();
            line.push_str(word);
            start = i;
        }
        if !line.is_empty() {
            spans.push(start..words.len());
        }
        spans
    }

    fn place_fragments(
        &self,
        words: &[&str],
        style: &TextStyle,
        source_id: Uuid,
        last_line: bool,
    ) -> Vec<TextFragment> {
        let fragment = |text: String, x_offset: f32| TextFragment {
            text,
            x_offset,
            style: *style,
            source_block_id: source_id,
        };

        if style.alignment == Alignment::Justify && !last_line && words.len() > 1 {
            let widths: Vec<f32> = words
                .iter()
                .map(|w| self.metrics.measure_text(w, style.font_size))
                .collect();
            let slack = self.max_width - widths.iter().sum::<f32>();
            let gap = (slack / (words.len() - 1) as f32).max(0.0);
            let mut x = 0.0;
            return words
                .iter()
                .zip(widths)
                .map(|(word, width)| {
                    let placed = fragment((*word).to_string(), x);
                    x += width + gap;
                    placed
                })
                .collect();
        }

        let text = words.join(" ");
        let free = (self.max_width - self.metrics.measure_text(&text, style.font_size)).max(0.0);
        let x_offset = match style.alignment {
            Alignment::Left | Alignment::Justify => 0.0,
            Alignment::Center => free / 2.0,
            Alignment::Right => free,
        };
        vec![fragment(text, x_offset)]
    }
}

/// Break `text` into lines no wider than `available_width` where possible.
pub fn break_lines(
    text: &str,
    available_width: f32,
    style: &TextStyle,
    metrics: &dyn TextMetrics,
    source_id: Uuid,
) -> Vec<TextLine> {
    LineBreaker::new(metrics, available_width).break_lines(text, style, source_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WideMetrics;

    impl TextMetrics for WideMetrics {
        fn measure_text(&self, text: &str, font_size: f32) -> f32 {
            text.chars().count() as f32 * font_size
        }

        fn measure_char(&self, _c: char, font_size: f32) -> f32 {
            font_size
        }

        fn line_height(&self, font_size: f32, multiplier: f32) -> f32 {
            font_size * multiplier + 2.0
        }
    }

    fn texts(lines: &[TextLine]) -> Vec<String> {
        lines.iter().map(TextLine::text).collect()
    }

    #[test]
    fn approx_metrics_scale_with_chars_and_size() {
        let metrics = ApproxTextMetrics::default();
        assert_eq!(metrics.measure_text("Hello", 12.0), 5.0 * 12.0 * 0.6);
        assert_eq!(metrics.measure_text("世界", 10.0), 2.0 * 10.0 * 0.6);
        assert_eq!(metrics.measure_char('A', 12.0), 12.0 * 0.6);
        assert_eq!(metrics.line_height(12.0, 1.5), 18.0);
    }

    #[test]
    fn empty_text_returns_no_lines() {
        let metrics = ApproxTextMetrics::default();
        let breaker = LineBreaker::new(&metrics, 100.0);
        assert!(breaker
            .break_lines("", &TextStyle::default(), Uuid::nil())
            .is_empty());
        assert!(breaker
            .break_lines(" \n\t ", &TextStyle::default(), Uuid::nil())
            .is_empty());
    }

    #[test]
    fn short_text_fits_on_one_line() {
        let metrics = ApproxTextMetrics::default();
        let lines = break_lines(
            "Hello    world\ntest",
            1000.0,
            &TextStyle::default(),
            &metrics,
            Uuid::nil(),
        );
        assert_eq!(texts(&lines), vec!["Hello world test"]);
        assert_eq!(lines[0].fragments.len(), 1);
        assert_eq!(lines[0].fragments[0].x_offset, 0.0);
    }

    #[test]
    fn words_wrap_greedily() {
        let metrics = ApproxTextMetrics::default();
        // 7.2pt per char at 12pt: "aaa bbb" is 50.4pt, "aaa bbb ccc" is 79.2pt.
        let lines = break_lines(
            "aaa bbb ccc ddd",
            60.0,
            &TextStyle::default(),
            &metrics,
            Uuid::nil(),
        );
        assert_eq!(texts(&lines), vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn overlong_word_gets_its_own_line() {
        let metrics = ApproxTextMetrics::default();
        let lines = break_lines(
            "a Supercalifragilisticexpialidocious b",
            50.0,
            &TextStyle::default(),
            &metrics,
            Uuid::nil(),
        );
        assert_eq!(
            texts(&lines),
            vec!["a", "Supercalifragilisticexpialidocious", "b"]
        );
    }

    #[test]
    fn y_offsets_step_by_line_height() {
        let metrics = ApproxTextMetrics::default();
        let style = TextStyle::new(12.0, 1.5, Alignment::Left);
        let lines = break_lines("word1 word2 word3 word4", 50.0, &style, &metrics, Uuid::nil());
        assert!(lines.len() > 1);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line.y_offset, i as f32 * 18.0);
        }
    }

    #[test]
    fn custom_metrics_change_wrapping() {
        let style = TextStyle::default();
        let text = "one two three four five six seven eight nine ten";
        let approx = break_lines(text, 200.0, &style, &ApproxTextMetrics::default(), Uuid::nil());
        let wide = break_lines(text, 200.0, &style, &WideMetrics, Uuid::nil());
        assert!(wide.len() > approx.len());
        assert_eq!(wide[1].y_offset, 20.0);
    }

    #[test]
    fn fragments_carry_style_and_source() {
        let metrics = ApproxTextMetrics::default();
        let source = Uuid::from_u128(42);
        let style = TextStyle::new(10.0, 1.2, Alignment::Left);
        let lines = break_lines("hi there", 500.0, &style, &metrics, source);
        let fragment = &lines[0].fragments[0];
        assert_eq!(fragment.source_block_id, source);
        assert_eq!(fragment.style, style);
    }

    #[test]
    fn right_and_center_alignment_offset_lines() {
        let metrics = ApproxTextMetrics::default();
        // "abc" is 21.6pt wide at 12pt.
        let right = break_lines(
            "abc",
            100.0,
            &TextStyle::default().with_alignment(Alignment::Right),
            &metrics,
            Uuid::nil(),
        );
        let center = break_lines(
            "abc",
            100.0,
            &TextStyle::default().with_alignment(Alignment::Center),
            &metrics,
            Uuid::nil(),
        );
        let free = 100.0 - metrics.measure_text("abc", 12.0);
        assert_eq!(right[0].fragments[0].x_offset, free);
        assert_eq!(center[0].fragments[0].x_offset, free / 2.0);
    }

    #[test]
    fn overflowing_line_never_gets_negative_offset() {
        let metrics = ApproxTextMetrics::default();
        let lines = break_lines(
            "Supercalifragilistic",
            20.0,
            &TextStyle::default().with_alignment(Alignment::Right),
            &metrics,
            Uuid::nil(),
        );
        assert_eq!(lines[0].fragments[0].x_offset, 0.0);
    }

    #[test]
    fn justify_spreads_all_but_last_line() {
        let metrics = ApproxTextMetrics::default();
        let style = TextStyle::default().with_alignment(Alignment::Justify);
        let lines = break_lines("aaa bbb ccc ddd eee", 80.0, &style, &metrics, Uuid::nil());
        assert_eq!(texts(&lines), vec!["aaa bbb ccc", "ddd eee"]);

        let first = &lines[0].fragments;
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].x_offset, 0.0);
        let last_word_end = first[2].x_offset + metrics.measure_text("ccc", 12.0);
        assert!((last_word_end - 80.0).abs() < 1e-3);

        assert_eq!(lines[1].fragments.len(), 1);
        assert_eq!(lines[1].fragments[0].x_offset, 0.0);
    }

    #[test]
    fn page_size_presets_by_name() {
        assert_eq!(PageSize::from_name("A4"), Some(PageSize::A4));
        assert_eq!(PageSize::from_name(" letter "), Some(PageSize::US_LETTER));
        assert_eq!(PageSize::from_name("tabloid"), None);
    }

    #[test]
    fn margins_mirror_by_side() {
        let margins = Margins {
            top: 10.0,
            bottom: 10.0,
            inner: 50.0,
            outer: 30.0,
        };
        assert_eq!(margins.left_for(PageSide::Right), 50.0);
        assert_eq!(margins.right_for(PageSide::Right), 30.0);
        assert_eq!(margins.left_for(PageSide::Left), 30.0);
        assert_eq!(margins.right_for(PageSide::Left), 50.0);
        assert_eq!(Margins::symmetric(20.0, 40.0).inner, 40.0);
    }

    #[test]
    fn default_config_validates() {
        let cfg = LayoutConfig::default();
        assert_eq!(cfg.content_width(), 612.0 - 144.0);
        assert_eq!(cfg.content_height(), 792.0 - 144.0);
        assert!(cfg.validate(&ApproxTextMetrics::default()).is_ok());
    }

    #[test]
    fn config_rejects_margins_that_swallow_the_page() {
        let cfg = LayoutConfig {
            margins: Margins::uniform(400.0),
            ..LayoutConfig::default()
        };
        let err = cfg.validate(&ApproxTextMetrics::default()).unwrap_err();
        assert!(matches!(err, LayoutError::NoContentArea { .. }));
    }

    #[test]
    fn config_rejects_bad_styles_and_spacing() {
        let metrics = ApproxTextMetrics::default();
        let mut cfg = LayoutConfig::default();
        cfg.body_style.font_size = 0.0;
        assert!(matches!(
            cfg.validate(&metrics),
            Err(LayoutError::InvalidTextStyle { role: "body", .. })
        ));

        let mut cfg = LayoutConfig::default();
        cfg.chapter_title_style.line_height = f32::NAN;
        assert!(matches!(
            cfg.validate(&metrics),
            Err(LayoutError::InvalidTextStyle {
                role: "chapter title",
                ..
            })
        ));

        let cfg = LayoutConfig {
            block_spacing: -1.0,
            ..LayoutConfig::default()
        };
        assert!(matches!(
            cfg.validate(&metrics),
            Err(LayoutError::InvalidSpacing { .. })
        ));

        let cfg = LayoutConfig {
            margins: Margins {
                top: -5.0,
                ..Margins::default()
            },
            ..LayoutConfig::default()
        };
        assert!(matches!(
            cfg.validate(&metrics),
            Err(LayoutError::InvalidMargin { edge: "top", .. })
        ));

        let cfg = LayoutConfig::for_page_size(PageSize::new(0.0, 100.0));
        assert!(matches!(
            cfg.validate(&metrics),
            Err(LayoutError::InvalidPageSize { .. })
        ));
    }

    #[test]
    fn config_rejects_lines_taller_than_the_page() {
        let mut cfg = LayoutConfig::default();
        cfg.body_style.font_size = 500.0;
        let err = cfg.validate(&ApproxTextMetrics::default()).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::LineTallerThanPage { role: "body", .. }
        ));
    }

    #[test]
    fn partial_json_config_fills_defaults() {
        let cfg: LayoutConfig =
            serde_json::from_str(r#"{"page_size":{"width":595.0,"height":842.0},"page_numbers":false}"#)
                .unwrap();
        assert_eq!(cfg.page_size, PageSize::A4);
        assert!(!cfg.page_numbers);
        assert_eq!(cfg.margins, Margins::uniform(72.0));
        assert!(cfg.first_chapter_on_odd_page);
    }
}
