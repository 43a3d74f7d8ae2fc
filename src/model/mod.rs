//! Document model types shared by the pipeline stages.
//!
//! Primitives come out of the content stream interpreter, blocks out of the
//! layout reconstructor, and chunks out of the Markdown emitter.

mod geometry;
pub mod metadata;
mod output;
mod page;
mod primitive;
mod table;

pub use geometry::{Matrix, Point, Rect};
pub use metadata::DocumentInfo;
pub use output::{ChunkMetadata, MarkdownOutput, PageChunk, Warning};
pub use page::{Block, BlockKind, Page, TextRun};
pub use primitive::{Glyph, ImagePrimitive, ImageSource, PaintStyle, PathPrimitive, Primitive};
pub use table::{Table, TableRow};
