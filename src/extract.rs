//! The extraction pipeline: load, interpret, reconstruct and emit, one
//! page per rayon task.

use crate::error::{Error, Result};
use crate::images::{extract_page_images, ImageFormat, ImageOutput, ImageSettings};
use crate::interp::interpret_page;
use crate::layout::{reconstruct_page, LayoutConfig};
use crate::model::{ChunkMetadata, MarkdownOutput, PageChunk, Warning};
use crate::parser::PdfDocument;
use crate::render::{join_pages, page_to_markdown, RenderOptions};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Image file stem used when extracting from bytes.
pub const DEFAULT_IMAGE_STEM: &str = "image";

/// A shared flag for aborting an extraction from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Pages already started run to completion.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for an extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// 0-based page indices; out-of-range entries are dropped. `None` or
    /// an empty list selects every page.
    pub pages: Option<Vec<usize>>,

    /// Write images to `image_path`
    pub write_images: bool,

    /// Embed images as data URIs (takes precedence over `write_images`)
    pub embed_images: bool,

    /// Directory for written images
    pub image_path: PathBuf,

    /// Image resolution in dots per inch
    pub dpi: u32,

    pub image_format: ImageFormat,

    /// Return one chunk per page instead of a single string
    pub chunked: bool,

    pub layout: LayoutConfig,

    pub render: RenderOptions,

    /// Worker threads; `None` uses the available parallelism
    pub threads: Option<usize>,

    /// Abort when the extraction runs longer than this
    pub timeout: Option<Duration>,

    pub cancel: Option<CancelFlag>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            pages: None,
            write_images: false,
            embed_images: false,
            image_path: PathBuf::from("images"),
            dpi: 150,
            image_format: ImageFormat::Png,
            chunked: false,
            layout: LayoutConfig::default(),
            render: RenderOptions::default(),
            threads: None,
            timeout: None,
            cancel: None,
        }
    }
}

impl ExtractOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select pages by 0-based index.
    pub fn with_pages(mut self, pages: Vec<usize>) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn with_write_images(mut self, enabled: bool) -> Self {
        self.write_images = enabled;
        self
    }

    pub fn with_embed_images(mut self, enabled: bool) -> Self {
        self.embed_images = enabled;
        self
    }

    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = path.into();
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_image_format(mut self, format: ImageFormat) -> Self {
        self.image_format = format;
        self
    }

    pub fn with_chunks(mut self, chunked: bool) -> Self {
        self.chunked = chunked;
        self
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_render(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.dpi == 0 {
            return Err(Error::InvalidOption("dpi must be greater than 0".into()));
        }
        if self.threads == Some(0) {
            return Err(Error::InvalidOption(
                "threads must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Page indices to process: in range, deduplicated, ascending.
    pub fn select_pages(&self, page_count: usize) -> Result<Vec<usize>> {
        let requested = match &self.pages {
            Some(pages) if !pages.is_empty() => pages,
            _ => return Ok((0..page_count).collect()),
        };
        let mut selected: Vec<usize> = requested
            .iter()
            .copied()
            .filter(|&p| p < page_count)
            .collect();
        selected.sort_unstable();
        selected.dedup();
        if selected.is_empty() {
            return Err(Error::NoValidPages { page_count });
        }
        if selected.len() < requested.len() {
            log::debug!(
                "page selection reduced from {} to {} entries",
                requested.len(),
                selected.len()
            );
        }
        Ok(selected)
    }
}

/// Where the input came from.
struct Source<'a> {
    stem: &'a str,
    file_path: Option<String>,
}

/// Extract Markdown from PDF bytes.
pub fn extract(data: &[u8], options: &ExtractOptions) -> Result<MarkdownOutput> {
    options.validate()?;
    let doc = PdfDocument::load(data)?;
    run(
        &doc,
        options,
        &Source {
            stem: DEFAULT_IMAGE_STEM,
            file_path: None,
        },
    )
}

/// Extract Markdown from a PDF file. Images are named after the file stem
/// and chunk metadata carries the path.
pub fn extract_file<P: AsRef<Path>>(path: P, options: &ExtractOptions) -> Result<MarkdownOutput> {
    options.validate()?;
    let path = path.as_ref();
    let doc = PdfDocument::load_file(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_IMAGE_STEM.to_string());
    run(
        &doc,
        options,
        &Source {
            stem: &stem,
            file_path: Some(path.display().to_string()),
        },
    )
}

/// One processed page.
struct PageResult {
    index: usize,
    body: String,
    images: Vec<String>,
    warnings: Vec<Warning>,
}

fn run(doc: &PdfDocument, options: &ExtractOptions, source: &Source<'_>) -> Result<MarkdownOutput> {
    let started = Instant::now();
    let selected = options.select_pages(doc.page_count())?;

    let images = (options.write_images || options.embed_images).then(|| ImageSettings {
        output: if options.embed_images {
            ImageOutput::Embed
        } else {
            ImageOutput::Files
        },
        dir: options.image_path.clone(),
        stem: source.stem.to_string(),
        dpi: options.dpi,
        format: options.image_format,
    });

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.unwrap_or(0))
        .build()
        .map_err(|e| Error::InvalidOption(format!("thread pool: {}", e)))?;
    let deadline = options.timeout.map(|t| started + t);

    let results: Vec<PageResult> = pool.install(|| {
        selected
            .par_iter()
            .map(|&index| {
                check_abort(options, deadline)?;
                Ok(process_page(doc, index, options, images.as_ref()))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    log::info!(
        "extracted {} of {} pages in {:?}",
        results.len(),
        doc.page_count(),
        started.elapsed()
    );

    for result in &results {
        for warning in &result.warnings {
            log::warn!("page {}: {}", result.index + 1, warning);
        }
    }

    if !options.chunked {
        let bodies: Vec<&str> = results.iter().map(|r| r.body.as_str()).collect();
        let text = join_pages(&bodies, &options.render);
        let warnings = results.into_iter().flat_map(|r| r.warnings).collect();
        return Ok(MarkdownOutput::Text { text, warnings });
    }

    let chunks = results
        .into_iter()
        .map(|result| {
            let mut metadata = ChunkMetadata::from_info(
                doc.info(),
                u32::try_from(result.index + 1).ok(),
                doc.page_count(),
            );
            metadata.file_path = source.file_path.clone();
            metadata.images = result.images;
            metadata.warnings = result.warnings;
            PageChunk {
                text: result.body,
                metadata,
            }
        })
        .collect();
    Ok(MarkdownOutput::Chunks(chunks))
}

fn check_abort(options: &ExtractOptions, deadline: Option<Instant>) -> Result<()> {
    if options.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
        return Err(Error::Cancelled("cancelled by caller".into()));
    }
    if let (Some(deadline), Some(timeout)) = (deadline, options.timeout) {
        if Instant::now() >= deadline {
            return Err(Error::Cancelled(format!("timed out after {:?}", timeout)));
        }
    }
    Ok(())
}

fn process_page(
    doc: &PdfDocument,
    index: usize,
    options: &ExtractOptions,
    images: Option<&ImageSettings>,
) -> PageResult {
    let Some(page) = doc.page(index) else {
        return PageResult {
            index,
            body: String::new(),
            images: Vec::new(),
            warnings: Vec::new(),
        };
    };

    let content = interpret_page(doc, page);
    let mut warnings = content.warnings;
    let page_images = images
        .map(|settings| extract_page_images(doc, page, &content.primitives, settings))
        .unwrap_or_default();
    warnings.extend(page_images.warnings);

    let reconstructed = reconstruct_page(
        index,
        &content.primitives,
        page.media_box,
        &page_images.placed,
        &options.layout,
    );
    let body = page_to_markdown(&reconstructed, &options.render);
    if !warnings.is_empty() {
        log::debug!("page {}: {} warnings", index, warnings.len());
    }

    PageResult {
        index,
        body,
        images: page_images.names,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::text_pdf;

    #[test]
    fn test_page_selection() {
        let options = ExtractOptions::new().with_pages(vec![3, 0, 3, 9]);
        assert_eq!(options.select_pages(5).unwrap(), vec![0, 3]);
        assert_eq!(ExtractOptions::new().select_pages(3).unwrap(), vec![0, 1, 2]);
        assert_eq!(
            ExtractOptions::new().with_pages(vec![]).select_pages(2).unwrap(),
            vec![0, 1]
        );
        assert!(matches!(
            ExtractOptions::new().with_pages(vec![7]).select_pages(2),
            Err(Error::NoValidPages { page_count: 2 })
        ));
    }

    #[test]
    fn test_invalid_options() {
        let pdf = text_pdf(&["x"]);
        assert!(matches!(
            extract(&pdf, &ExtractOptions::new().with_dpi(0)),
            Err(Error::InvalidOption(_))
        ));
        assert!(matches!(
            extract(&pdf, &ExtractOptions::new().with_threads(0)),
            Err(Error::InvalidOption(_))
        ));
    }

    #[test]
    fn test_unchunked_text() {
        let pdf = text_pdf(&["Hello", "Goodbye"]);
        let output = extract(&pdf, &ExtractOptions::default()).unwrap();
        assert_eq!(output.as_text(), Some("Hello\n\nGoodbye\n\n"));
        assert!(output.warnings().is_empty());
    }

    #[test]
    fn test_unchunked_text_keeps_warnings() {
        let pdf = crate::testutil::content_pdf(&[
            "BT /F1 12 Tf 72 720 Td (Kept) Tj ET zz",
            "Q BT /F1 12 Tf 72 720 Td (Also kept) Tj ET",
        ]);
        let output = extract(&pdf, &ExtractOptions::default()).unwrap();
        assert_eq!(output.as_text(), Some("Kept\n\nAlso kept\n\n"));
        assert_eq!(
            output.warnings(),
            vec![
                &Warning::UnsupportedOperator {
                    operator: "zz".into()
                },
                &Warning::UnbalancedRestore,
            ]
        );
    }

    #[test]
    fn test_chunked_metadata() {
        let pdf = text_pdf(&["Hello", "Goodbye"]);
        let options = ExtractOptions::new().with_chunks(true).with_pages(vec![1]);
        let output = extract(&pdf, &options).unwrap();
        let chunks = output.chunks().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Goodbye");
        assert_eq!(chunks[0].metadata.page, Some(2));
        assert_eq!(chunks[0].metadata.page_count, 2);
        assert_eq!(chunks[0].metadata.format, "PDF 1.4");
        assert!(chunks[0].metadata.file_path.is_none());
    }

    #[test]
    fn test_cancelled_before_start() {
        let flag = CancelFlag::new();
        flag.cancel();
        let options = ExtractOptions::new().with_cancel_flag(flag);
        assert!(matches!(
            extract(&text_pdf(&["x"]), &options),
            Err(Error::Cancelled(_))
        ));
    }

    #[test]
    fn test_zero_timeout_aborts() {
        let options = ExtractOptions::new().with_timeout(Duration::ZERO);
        assert!(matches!(
            extract(&text_pdf(&["x"]), &options),
            Err(Error::Cancelled(_))
        ));
    }

    #[test]
    fn test_single_thread_matches_parallel() {
        let pdf = text_pdf(&["One", "Two", "Three", "Four"]);
        let serial = extract(&pdf, &ExtractOptions::new().with_threads(1)).unwrap();
        let parallel = extract(&pdf, &ExtractOptions::new().with_threads(4)).unwrap();
        assert_eq!(serial, parallel);
    }
}
