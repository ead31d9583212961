//! Text metrics, line breaking and pagination for `bookwriter`.
//!
//! ```rust
//! use bookwriter_render::{layout_book, FrameType, LayoutConfig};
//!
//! let book = bookwriter::parse("@title: T\n@author: A\n#chapter: One\n@page:\nHello world")?;
//! let tree = layout_book(&book, &LayoutConfig::default())?;
//! let body = tree.pages[0].frame(FrameType::BodyText).map(|f| f.line_texts());
//! assert_eq!(body, Some(vec!["Hello world".to_string()]));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod render_engine;
mod render_ir;
mod render_layout;

pub use render_engine::{layout_book, layout_book_with_metrics, LayoutEngine, LayoutError};
pub use render_ir::{
    Alignment, ChapterPageSpan, FrameType, PageRender, PageSide, Rectangle, RenderMetadata,
    RenderTree, TextFragment, TextFrame, TextLine, TextStyle,
};
pub use render_layout::{
    break_lines, ApproxTextMetrics, LayoutConfig, LineBreaker, Margins, PageSize, TextMetrics,
};
