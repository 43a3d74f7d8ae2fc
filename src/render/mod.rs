//! Rendering of reconstructed pages to Markdown, and output persistence.

mod json;
mod markdown;
mod options;
mod text;

pub use json::{to_json, JsonFormat};
pub use markdown::{join_pages, page_to_markdown, MarkdownRenderer};
pub use options::RenderOptions;
pub use text::{escape_line_start, escape_markdown, escape_table_cell, normalize_text};

use crate::error::Result;
use crate::model::MarkdownOutput;
use std::fs;
use std::path::Path;

/// Write output to `path` as UTF-8, creating parent directories.
///
/// Chunked output gets a `# Page <n>` header before each chunk.
pub fn save(output: &MarkdownOutput, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, output.to_markdown())?;
    log::debug!("saved output to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChunkMetadata, PageChunk};

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.md");
        save(&MarkdownOutput::text("Hello\n\n"), &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Hello\n\n");
    }

    #[test]
    fn test_save_chunked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.md");
        let output = MarkdownOutput::Chunks(vec![
            PageChunk {
                text: "One".into(),
                metadata: ChunkMetadata {
                    page: Some(1),
                    ..Default::default()
                },
            },
            PageChunk {
                text: "Two".into(),
                metadata: ChunkMetadata::default(),
            },
        ]);
        save(&output, &path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# Page 1\n\nOne\n\n# Page unknown\n\nTwo\n\n"
        );
    }
}
