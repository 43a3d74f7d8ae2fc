//! Image extraction: decode placed images, resample to the output
//! resolution, and write files or build data URIs.
//!
//! Files are named `<stem>-<page index>-<sequence>.<ext>`, where the
//! sequence counts the page's image placements in drawing order. Names are
//! unique per page, so pages can be processed concurrently.

mod decode;
mod writer;

pub use decode::{convert_samples, decode_image, resolve_color_space, ColorSpace};
pub use writer::{data_uri, encode, resample, target_size, write_file};

use crate::error::{Error, Result};
use crate::layout::PlacedImage;
use crate::model::{ImageSource, Primitive, Warning};
use crate::parser::{Object, PdfDocument, PdfPage, Stream};
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Output encoding for extracted images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpg,
    Jpeg,
    Bmp,
    Tiff,
    Pnm,
}

impl ImageFormat {
    /// File extension, as requested.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Pnm => "pnm",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpg | ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Pnm => "image/x-portable-anymap",
        }
    }

    fn codec(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpg | ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
            ImageFormat::Tiff => image::ImageFormat::Tiff,
            ImageFormat::Pnm => image::ImageFormat::Pnm,
        }
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" => Ok(ImageFormat::Jpg),
            "jpeg" => Ok(ImageFormat::Jpeg),
            "bmp" => Ok(ImageFormat::Bmp),
            "tif" | "tiff" => Ok(ImageFormat::Tiff),
            "pnm" | "ppm" | "pgm" => Ok(ImageFormat::Pnm),
            other => Err(Error::InvalidOption(format!(
                "unsupported image format '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Where extracted images go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutput {
    /// Write files under the image directory
    Files,
    /// Embed as base64 data URIs
    Embed,
}

/// Per-extraction image settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSettings {
    pub output: ImageOutput,
    pub dir: PathBuf,
    /// File name stem, normally the input file stem
    pub stem: String,
    pub dpi: u32,
    pub format: ImageFormat,
}

impl ImageSettings {
    /// Output name for the `sequence`-th image of page `page`.
    pub fn file_name(&self, page: usize, sequence: usize) -> String {
        format!(
            "{}-{}-{}.{}",
            self.stem,
            page,
            sequence,
            self.format.extension()
        )
    }
}

/// Images produced for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageImages {
    /// Images to merge into the page's text flow
    pub placed: Vec<PlacedImage>,
    /// File names written or embedded
    pub names: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// Decode, resample and output every image painted on a page. A failing
/// image becomes an `ImageDecodeFailed` warning; the others still go out.
pub fn extract_page_images(
    doc: &PdfDocument,
    page: &PdfPage,
    primitives: &[Primitive],
    settings: &ImageSettings,
) -> PageImages {
    let mut out = PageImages::default();
    let images = primitives.iter().filter_map(|p| match p {
        Primitive::Image(image) => Some(image),
        _ => None,
    });

    for (sequence, image) in images.enumerate() {
        let name = settings.file_name(page.index, sequence);
        let label = match &image.source {
            ImageSource::XObject { name, .. } => name.clone(),
            ImageSource::Inline { .. } => "inline".to_string(),
        };
        match output_image(doc, page, image, settings, &name) {
            Ok(target) => {
                log::debug!("page {}: image {} -> {}", page.index, label, name);
                out.placed.push(PlacedImage {
                    bbox: image.bbox,
                    target,
                });
                out.names.push(name);
            }
            Err(e) => {
                log::warn!("page {}: image {} skipped: {}", page.index, label, e);
                out.warnings.push(Warning::ImageDecodeFailed {
                    name: label,
                    reason: e.to_string(),
                });
            }
        }
    }
    out
}

fn output_image(
    doc: &PdfDocument,
    page: &PdfPage,
    image: &crate::model::ImagePrimitive,
    settings: &ImageSettings,
    name: &str,
) -> Result<String> {
    let stream: Cow<'_, Stream> = match &image.source {
        ImageSource::XObject { id, .. } => {
            let object = doc.get(*id)?;
            match object {
                Object::Stream(stream) => Cow::Borrowed(stream),
                other => {
                    return Err(Error::Decode(format!(
                        "image object is a {}",
                        other.type_name()
                    )))
                }
            }
        }
        ImageSource::Inline { dict, data } => Cow::Owned(Stream::new(dict.clone(), data.clone())),
    };

    let decoded = decode_image(doc, &stream, &page.resources)?;
    let resampled = resample(decoded, &image.bbox, settings.dpi);
    let bytes = encode(&resampled, settings.format)?;
    match settings.output {
        ImageOutput::Files => write_file(&settings.dir, name, &bytes),
        ImageOutput::Embed => Ok(data_uri(&bytes, settings.format)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::interpret_page;
    use crate::testutil::PdfBuilder;

    fn settings(dir: &std::path::Path, output: ImageOutput) -> ImageSettings {
        ImageSettings {
            output,
            dir: dir.to_path_buf(),
            stem: "doc".into(),
            dpi: 72,
            format: ImageFormat::Png,
        }
    }

    /// One page drawing a 2x2 gray image at 100x50pt, then a broken one.
    fn image_pdf() -> Vec<u8> {
        let content = b"q 100 0 0 50 10 10 cm /Im1 Do Q q 20 0 0 20 200 200 cm /Im2 Do Q";
        PdfBuilder::new()
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
            .object(
                3,
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
                 /Resources << /XObject << /Im1 5 0 R /Im2 6 0 R >> >> >>",
            )
            .stream(4, "", content)
            .stream(
                5,
                "/Type /XObject /Subtype /Image /Width 2 /Height 2 /ColorSpace /DeviceGray \
                 /BitsPerComponent 8",
                &[0, 255, 255, 0],
            )
            .stream(
                6,
                "/Type /XObject /Subtype /Image /Width 2 /Height 2 /ColorSpace /Pattern \
                 /BitsPerComponent 8",
                &[0, 0, 0, 0],
            )
            .build("/Root 1 0 R")
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("jpeg".parse::<ImageFormat>().unwrap().extension(), "jpeg");
        assert_eq!("tif".parse::<ImageFormat>().unwrap(), ImageFormat::Tiff);
        assert!(matches!(
            "gif".parse::<ImageFormat>(),
            Err(Error::InvalidOption(_))
        ));
    }

    #[test]
    fn test_file_names_are_deterministic() {
        let s = settings(std::path::Path::new("images"), ImageOutput::Files);
        assert_eq!(s.file_name(3, 1), "doc-3-1.png");
    }

    #[test]
    fn test_extract_writes_files_and_warns() {
        let doc = PdfDocument::load(&image_pdf()).unwrap();
        let page = doc.page(0).unwrap();
        let content = interpret_page(&doc, page);
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path(), ImageOutput::Files);

        let images = extract_page_images(&doc, page, &content.primitives, &s);
        assert_eq!(images.names, vec!["doc-0-0.png"]);
        assert_eq!(images.placed.len(), 1);
        assert!(images.placed[0].target.ends_with("doc-0-0.png"));
        assert_eq!(images.placed[0].bbox.y1, 60.0);
        assert!(matches!(
            &images.warnings[..],
            [Warning::ImageDecodeFailed { name, .. }] if name == "Im2"
        ));

        let written = image::open(dir.path().join("doc-0-0.png")).unwrap();
        assert_eq!((written.width(), written.height()), (100, 50));
    }

    #[test]
    fn test_extract_embeds() {
        let doc = PdfDocument::load(&image_pdf()).unwrap();
        let page = doc.page(0).unwrap();
        let content = interpret_page(&doc, page);
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path(), ImageOutput::Embed);

        let images = extract_page_images(&doc, page, &content.primitives, &s);
        assert!(images.placed[0]
            .target
            .starts_with("data:image/png;base64,"));
        assert!(!dir.path().join("doc-0-0.png").exists());
    }

    #[test]
    fn test_inline_image() {
        let content = b"q 10 0 0 10 0 0 cm BI /W 1 /H 1 /CS /RGB /BPC 8 ID \xFF\x00\x00 EI Q";
        let pdf = PdfBuilder::new()
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
            .object(
                3,
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>",
            )
            .stream(4, "", content)
            .build("/Root 1 0 R");
        let doc = PdfDocument::load(&pdf).unwrap();
        let page = doc.page(0).unwrap();
        let prims = interpret_page(&doc, page).primitives;
        let dir = tempfile::tempdir().unwrap();
        let images = extract_page_images(&doc, page, &prims, &settings(dir.path(), ImageOutput::Files));
        assert!(images.warnings.is_empty(), "{:?}", images.warnings);
        let written = image::open(dir.path().join("doc-0-0.png")).unwrap().to_rgb8();
        assert_eq!(written.get_pixel(0, 0).0, [255, 0, 0]);
    }
}
