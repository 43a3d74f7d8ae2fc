//! Image sample decoding and colour conversion.
//!
//! Raw samples are unpacked at 1, 2, 4, 8 or 16 bits per component and
//! converted to 8-bit gray or RGB. DCT data goes through the JPEG decoder.

use crate::error::{Error, Result};
use crate::parser::{Dictionary, ImageCodec, Object, PdfDocument, Stream};
use image::{DynamicImage, GrayImage, RgbImage};

/// Nesting bound for colour space definitions.
const MAX_COLORSPACE_DEPTH: usize = 8;

/// Largest decoded image, in pixels.
pub const MAX_PIXELS: u64 = 1 << 26;

/// A colour space reduced to what sample conversion needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Lab, approximated by its lightness channel
    Lab,
    /// Separation or DeviceN: tint 1 is full ink
    Tint { components: usize },
    Indexed {
        base: Box<ColorSpace>,
        hival: usize,
        lookup: Vec<u8>,
    },
}

impl ColorSpace {
    /// Components per sample.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb | ColorSpace::Lab => 3,
            ColorSpace::Cmyk => 4,
            ColorSpace::Tint { components } => *components,
        }
    }

    fn is_gray(&self) -> bool {
        match self {
            ColorSpace::Gray | ColorSpace::Lab | ColorSpace::Tint { .. } => true,
            ColorSpace::Indexed { base, .. } => base.is_gray(),
            _ => false,
        }
    }

    /// Convert normalized components (0.0..=1.0) to RGB.
    fn to_rgb(&self, c: &[f32]) -> [u8; 3] {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        match self {
            ColorSpace::Gray | ColorSpace::Lab => {
                let g = byte(c.first().copied().unwrap_or(0.0));
                [g, g, g]
            }
            ColorSpace::Tint { .. } => {
                let ink = c.iter().copied().fold(0.0f32, f32::max);
                let g = byte(1.0 - ink);
                [g, g, g]
            }
            ColorSpace::Rgb => [
                byte(c.first().copied().unwrap_or(0.0)),
                byte(c.get(1).copied().unwrap_or(0.0)),
                byte(c.get(2).copied().unwrap_or(0.0)),
            ],
            ColorSpace::Cmyk => {
                let get = |i: usize| c.get(i).copied().unwrap_or(0.0);
                let k = 1.0 - get(3);
                [
                    byte((1.0 - get(0)) * k),
                    byte((1.0 - get(1)) * k),
                    byte((1.0 - get(2)) * k),
                ]
            }
            ColorSpace::Indexed {
                base,
                hival,
                lookup,
            } => {
                let index = (c.first().copied().unwrap_or(0.0).round() as usize).min(*hival);
                let n = base.components();
                let entry: Vec<f32> = (0..n)
                    .map(|i| {
                        lookup
                            .get(index * n + i)
                            .map(|&b| f32::from(b) / 255.0)
                            .unwrap_or(0.0)
                    })
                    .collect();
                base.to_rgb(&entry)
            }
        }
    }
}

/// Resolve an image's `/ColorSpace`. Names not defined by PDF are looked
/// up in the resources' `/ColorSpace` dictionary.
pub fn resolve_color_space(
    doc: &PdfDocument,
    obj: &Object,
    resources: &Dictionary,
) -> Result<ColorSpace> {
    resolve_inner(doc, obj, resources, 0)
}

fn resolve_inner(
    doc: &PdfDocument,
    obj: &Object,
    resources: &Dictionary,
    depth: usize,
) -> Result<ColorSpace> {
    if depth > MAX_COLORSPACE_DEPTH {
        return Err(Error::Decode("colour space nesting too deep".into()));
    }
    let obj = doc.resolve(obj)?;
    match obj {
        Object::Name(name) => match name.as_str() {
            "DeviceGray" | "G" | "CalGray" => Ok(ColorSpace::Gray),
            "DeviceRGB" | "RGB" | "CalRGB" => Ok(ColorSpace::Rgb),
            "DeviceCMYK" | "CMYK" => Ok(ColorSpace::Cmyk),
            "Lab" => Ok(ColorSpace::Lab),
            other => {
                let named = doc
                    .get_in(resources, "ColorSpace")
                    .and_then(Object::as_dict)
                    .and_then(|spaces| spaces.get(other))
                    .ok_or_else(|| Error::Decode(format!("unknown colour space /{}", other)))?;
                resolve_inner(doc, named, resources, depth + 1)
            }
        },
        Object::Array(items) => {
            let family = items.first().and_then(Object::as_name).unwrap_or("");
            match family {
                "DeviceGray" | "G" | "CalGray" => Ok(ColorSpace::Gray),
                "DeviceRGB" | "RGB" | "CalRGB" => Ok(ColorSpace::Rgb),
                "DeviceCMYK" | "CMYK" => Ok(ColorSpace::Cmyk),
                "Lab" => Ok(ColorSpace::Lab),
                "ICCBased" => {
                    let stream = items
                        .get(1)
                        .and_then(|s| doc.resolve_opt(s))
                        .and_then(Object::as_stream)
                        .ok_or_else(|| Error::Decode("ICCBased without profile".into()))?;
                    match doc.get_in(&stream.dict, "N").and_then(Object::as_i64) {
                        Some(1) => Ok(ColorSpace::Gray),
                        Some(3) => Ok(ColorSpace::Rgb),
                        Some(4) => Ok(ColorSpace::Cmyk),
                        _ => match stream.dict.get("Alternate") {
                            Some(alt) => resolve_inner(doc, alt, resources, depth + 1),
                            None => Err(Error::Decode("ICCBased with unsupported /N".into())),
                        },
                    }
                }
                "Indexed" | "I" => {
                    let base = items
                        .get(1)
                        .ok_or_else(|| Error::Decode("Indexed without base".into()))?;
                    let base = resolve_inner(doc, base, resources, depth + 1)?;
                    let hival = items
                        .get(2)
                        .and_then(|h| doc.resolve_opt(h))
                        .and_then(Object::as_i64)
                        .unwrap_or(255)
                        .clamp(0, 255) as usize;
                    let lookup = match items.get(3).map(|l| doc.resolve(l)).transpose()? {
                        Some(Object::String(bytes)) => bytes.clone(),
                        Some(Object::Stream(stream)) => doc.decode_stream(stream)?,
                        _ => return Err(Error::Decode("Indexed without lookup table".into())),
                    };
                    Ok(ColorSpace::Indexed {
                        base: Box::new(base),
                        hival,
                        lookup,
                    })
                }
                "Separation" => Ok(ColorSpace::Tint { components: 1 }),
                "DeviceN" => {
                    let components = items
                        .get(1)
                        .and_then(|n| doc.resolve_opt(n))
                        .and_then(Object::as_array)
                        .map(<[Object]>::len)
                        .unwrap_or(1)
                        .max(1);
                    Ok(ColorSpace::Tint { components })
                }
                other => Err(Error::Decode(format!("unsupported colour space /{}", other))),
            }
        }
        other => Err(Error::Decode(format!(
            "colour space is a {}",
            other.type_name()
        ))),
    }
}

fn int_entry(doc: &PdfDocument, dict: &Dictionary, key: &str) -> Option<i64> {
    doc.get_in(dict, key).and_then(Object::as_i64)
}

/// Decode an image XObject or inline image to 8-bit gray or RGB pixels.
pub fn decode_image(
    doc: &PdfDocument,
    stream: &Stream,
    resources: &Dictionary,
) -> Result<DynamicImage> {
    let dict = &stream.dict;
    let width = int_entry(doc, dict, "Width").unwrap_or(0);
    let height = int_entry(doc, dict, "Height").unwrap_or(0);
    if width <= 0 || height <= 0 || width > 1 << 16 || height > 1 << 16 {
        return Err(Error::Decode(format!(
            "invalid image size {}x{}",
            width, height
        )));
    }
    if width as u64 * height as u64 > MAX_PIXELS {
        return Err(Error::Decode(format!(
            "image size {}x{} exceeds {} pixels",
            width, height, MAX_PIXELS
        )));
    }
    let (width, height) = (width as u32, height as u32);

    let decoded = doc.decode_stream_partial(stream)?;
    match decoded.image_codec {
        None => {}
        Some(ImageCodec::Dct) => {
            let image = image::load_from_memory_with_format(&decoded.data, image::ImageFormat::Jpeg)
                .map_err(|e| Error::Decode(format!("JPEG: {}", e)))?;
            return Ok(match image {
                DynamicImage::ImageLuma8(_) => image,
                other => DynamicImage::ImageRgb8(other.to_rgb8()),
            });
        }
        Some(codec) => {
            return Err(Error::Decode(format!("{:?} images are not supported", codec)));
        }
    }

    let is_mask = doc
        .get_in(dict, "ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false);
    let decode_array: Vec<f32> = doc
        .get_in(dict, "Decode")
        .and_then(Object::as_array)
        .map(|items| items.iter().filter_map(Object::as_f32).collect())
        .unwrap_or_default();

    if is_mask {
        return decode_mask(&decoded.data, width, height, &decode_array);
    }

    let bpc = int_entry(doc, dict, "BitsPerComponent").unwrap_or(8);
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        return Err(Error::Decode(format!("unsupported BitsPerComponent {}", bpc)));
    }
    let color_space = match dict.get("ColorSpace") {
        Some(cs) => resolve_color_space(doc, cs, resources)?,
        None => ColorSpace::Gray,
    };
    convert_samples(
        &decoded.data,
        width,
        height,
        bpc as u32,
        &color_space,
        &decode_array,
    )
}

/// Bit-packed rows of samples.
struct SampleReader<'a> {
    data: &'a [u8],
    bpc: u32,
    row_bytes: usize,
}

impl SampleReader<'_> {
    /// Sample `index` of `row`; missing data reads as 0.
    fn get(&self, row: usize, index: usize) -> u32 {
        let base = row * self.row_bytes;
        match self.bpc {
            8 => u32::from(self.data.get(base + index).copied().unwrap_or(0)),
            // High byte only
            16 => u32::from(self.data.get(base + index * 2).copied().unwrap_or(0)),
            bits => {
                let bit = index * bits as usize;
                let byte = self.data.get(base + bit / 8).copied().unwrap_or(0);
                let shift = 8 - bits as usize - bit % 8;
                (u32::from(byte) >> shift) & ((1 << bits) - 1)
            }
        }
    }

    fn max_value(&self) -> f32 {
        match self.bpc {
            16 => 255.0,
            bits => ((1u32 << bits) - 1) as f32,
        }
    }
}

/// Convert unpacked samples to pixels.
pub fn convert_samples(
    data: &[u8],
    width: u32,
    height: u32,
    bpc: u32,
    color_space: &ColorSpace,
    decode: &[f32],
) -> Result<DynamicImage> {
    let n = color_space.components();
    let row_bytes = (width as usize * n * bpc as usize).div_ceil(8);
    let expected = row_bytes * height as usize;
    // Truncated streams are padded; a stream missing most of its rows is
    // not an image worth guessing at.
    if data.len() < expected / 2 {
        return Err(Error::Decode(format!(
            "image data truncated: {} of {} bytes",
            data.len(),
            expected
        )));
    }
    if data.len() < expected {
        log::warn!(
            "image data short: {} of {} bytes, padding",
            data.len(),
            expected
        );
    }
    let reader = SampleReader {
        data,
        bpc,
        row_bytes,
    };
    let max = reader.max_value();
    let indexed = matches!(color_space, ColorSpace::Indexed { .. });

    // Maps a raw sample of component `i` to the colour space's range.
    let normalize = |raw: u32, i: usize| -> f32 {
        let v = raw as f32;
        if indexed {
            return match (decode.first(), decode.get(1)) {
                (Some(&lo), Some(&hi)) => lo + v * (hi - lo) / max,
                _ => v,
            };
        }
        match (decode.get(2 * i), decode.get(2 * i + 1)) {
            (Some(&lo), Some(&hi)) => lo + v * (hi - lo) / max,
            _ => v / max,
        }
    };

    let (w, h) = (width as usize, height as usize);
    let mut components = vec![0.0f32; n];
    if color_space.is_gray() && !indexed {
        let mut pixels = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                for (i, c) in components.iter_mut().enumerate() {
                    *c = normalize(reader.get(y, x * n + i), i);
                }
                pixels.push(color_space.to_rgb(&components)[0]);
            }
        }
        return GrayImage::from_raw(width, height, pixels)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| Error::Decode("pixel buffer size mismatch".into()));
    }

    let gray_palette = color_space.is_gray();
    let mut pixels = Vec::with_capacity(w * h * if gray_palette { 1 } else { 3 });
    for y in 0..h {
        for x in 0..w {
            for (i, c) in components.iter_mut().enumerate() {
                *c = normalize(reader.get(y, x * n + i), i);
            }
            let rgb = color_space.to_rgb(&components);
            if gray_palette {
                pixels.push(rgb[0]);
            } else {
                pixels.extend_from_slice(&rgb);
            }
        }
    }
    let image = if gray_palette {
        GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
    } else {
        RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
    };
    image.ok_or_else(|| Error::Decode("pixel buffer size mismatch".into()))
}

/// A stencil mask: sample 0 paints black unless `/Decode [1 0]`.
fn decode_mask(data: &[u8], width: u32, height: u32, decode: &[f32]) -> Result<DynamicImage> {
    let row_bytes = (width as usize).div_ceil(8);
    if data.len() < row_bytes * height as usize / 2 {
        return Err(Error::Decode(format!(
            "mask data truncated: {} of {} bytes",
            data.len(),
            row_bytes * height as usize
        )));
    }
    let reader = SampleReader {
        data,
        bpc: 1,
        row_bytes,
    };
    let invert = decode.first().is_some_and(|&d| d >= 1.0);
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let painted = (reader.get(y, x) == 0) != invert;
            pixels.push(if painted { 0 } else { 255 });
        }
    }
    GrayImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageLuma8)
        .ok_or_else(|| Error::Decode("pixel buffer size mismatch".into()))
}
