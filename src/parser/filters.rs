//! Stream filter decoding.
//!
//! General-purpose filters are decoded here. Image codecs (DCT, JPX, CCITT,
//! JBIG2) stop the chain: the bytes are handed to the image extractor with
//! the name of the codec still to apply.

use super::object::{Dictionary, Object, Stream};
use crate::error::{Error, Result};
use flate2::{Decompress, FlushDecompress, Status};
use std::io::Read;
use weezl::{decode::Decoder, BitOrder};

/// Result of running a stream's filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Bytes after every general-purpose filter was applied
    pub data: Vec<u8>,
    /// Image codec left for the image extractor, if any
    pub image_codec: Option<ImageCodec>,
}

/// Image-only codecs that pass through the filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCodec {
    Dct,
    Jpx,
    Ccitt,
    Jbig2,
}

impl ImageCodec {
    fn from_filter(name: &str) -> Option<Self> {
        match name {
            "DCTDecode" | "DCT" => Some(Self::Dct),
            "JPXDecode" => Some(Self::Jpx),
            "CCITTFaxDecode" | "CCF" => Some(Self::Ccitt),
            "JBIG2Decode" => Some(Self::Jbig2),
            _ => None,
        }
    }
}

/// Decode a stream's content and require that no image codec remains.
pub fn decode_stream(stream: &Stream) -> Result<Vec<u8>> {
    let decoded = decode(&stream.dict, &stream.content)?;
    match decoded.image_codec {
        None => Ok(decoded.data),
        Some(codec) => Err(Error::Decode(format!(
            "{:?} data cannot be decoded as a general stream",
            codec
        ))),
    }
}

/// Run the filter chain described by `dict` over `data`.
///
/// Filter parameters must already be direct objects.
pub fn decode(dict: &Dictionary, data: &[u8]) -> Result<Decoded> {
    let filters = filter_names(dict.get("Filter").or_else(|| dict.get("F")));
    let params = dict.get("DecodeParms").or_else(|| dict.get("DP"));

    let mut current = data.to_vec();
    for (index, name) in filters.iter().enumerate() {
        if let Some(codec) = ImageCodec::from_filter(name) {
            return Ok(Decoded {
                data: current,
                image_codec: Some(codec),
            });
        }
        let parms = params_at(params, index);
        current = apply_filter(name, &current, parms)?;
    }

    Ok(Decoded {
        data: current,
        image_codec: None,
    })
}

fn filter_names(filter: Option<&Object>) -> Vec<String> {
    match filter {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn params_at(params: Option<&Object>, index: usize) -> Option<&Dictionary> {
    match params {
        Some(Object::Dictionary(dict)) if index == 0 => Some(dict),
        Some(Object::Array(items)) => items.get(index).and_then(Object::as_dict),
        _ => None,
    }
}

fn apply_filter(name: &str, data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    let int_param = |key: &str, default: i64| {
        parms
            .and_then(|p| p.get(key))
            .and_then(Object::as_i64)
            .unwrap_or(default)
    };

    let decoded = match name {
        "FlateDecode" | "Fl" => flate_decode(data)?,
        "LZWDecode" | "LZW" => lzw_decode(data, int_param("EarlyChange", 1))?,
        "ASCIIHexDecode" | "AHx" => ascii_hex_decode(data)?,
        "ASCII85Decode" | "A85" => ascii85_decode(data)?,
        "RunLengthDecode" | "RL" => run_length_decode(data),
        "Crypt" => data.to_vec(),
        other => return Err(Error::Decode(format!("unsupported filter /{}", other))),
    };

    if matches!(name, "FlateDecode" | "Fl" | "LZWDecode" | "LZW") {
        let predictor = Predictor {
            predictor: int_param("Predictor", 1),
            colors: int_param("Colors", 1).max(1) as usize,
            bits_per_component: int_param("BitsPerComponent", 8).max(1) as usize,
            columns: int_param("Columns", 1).max(1) as usize,
        };
        return predictor.apply(decoded);
    }
    Ok(decoded)
}

/// Inflate zlib data. Truncated or corrupt input yields what was inflated
/// before the failure.
pub fn flate_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    if decoder.read_to_end(&mut out).is_ok() {
        return Ok(out);
    }

    let partial = inflate_partial(data, true);
    if !partial.is_empty() {
        log::debug!("FlateDecode recovered {} bytes from a damaged stream", partial.len());
        return Ok(partial);
    }
    // Some producers omit the zlib header.
    let raw = inflate_partial(data, false);
    if !raw.is_empty() {
        return Ok(raw);
    }
    Err(Error::Decode("FlateDecode produced no data".to_string()))
}

fn inflate_partial(data: &[u8], zlib_header: bool) -> Vec<u8> {
    let mut decoder = Decompress::new(zlib_header);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 8192];
    let mut pos = 0usize;

    while pos < data.len() {
        let before_in = decoder.total_in();
        let before_out = decoder.total_out();
        let end = (pos + 1024).min(data.len());
        let status = decoder.decompress(&data[pos..end], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        out.extend_from_slice(&buf[..produced]);
        let consumed = (decoder.total_in() - before_in) as usize;
        match status {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) if consumed == 0 && produced == 0 => break,
            Ok(_) => pos += consumed,
        }
    }

    // Drain output still buffered in the decoder.
    loop {
        let before_out = decoder.total_out();
        let status = decoder.decompress(&[], &mut buf, FlushDecompress::Sync);
        let produced = (decoder.total_out() - before_out) as usize;
        out.extend_from_slice(&buf[..produced]);
        if produced == 0 || status.is_err() {
            break;
        }
    }
    out
}

/// LZW decode, MSB-first with 8-bit symbols. `EarlyChange` 1 (the default)
/// widens the code one entry early, which is the TIFF-style size switch.
pub fn lzw_decode(data: &[u8], early_change: i64) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        Decoder::new(BitOrder::Msb, 8)
    } else {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };
    let mut out = Vec::new();
    let result = decoder.into_vec(&mut out).decode(data);
    if let Err(err) = result.status {
        if out.is_empty() {
            return Err(Error::Decode(format!("LZWDecode: {}", err)));
        }
        log::debug!("LZWDecode stopped early: {}", err);
    }
    Ok(out)
}

pub fn ascii_hex_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &b in data {
        if b == b'>' {
            break;
        }
        if super::lexer::is_whitespace(b) {
            continue;
        }
        let nibble = super::lexer::hex_value(b)
            .ok_or_else(|| Error::Decode(format!("ASCIIHexDecode: invalid digit 0x{:02x}", b)))?;
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

pub fn ascii85_decode(data: &[u8]) -> Result<Vec<u8>> {
    let body = data.strip_prefix(b"<~").unwrap_or(data);
    let mut out = Vec::with_capacity(body.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut count = 0usize;

    for &b in body {
        match b {
            b'~' => break,
            b'z' if count == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[count] = b - b'!';
                count += 1;
                if count == 5 {
                    out.extend_from_slice(&ascii85_group(&group)?);
                    count = 0;
                }
            }
            b if super::lexer::is_whitespace(b) => {}
            other => {
                return Err(Error::Decode(format!(
                    "ASCII85Decode: invalid character 0x{:02x}",
                    other
                )))
            }
        }
    }

    if count > 1 {
        for slot in group.iter_mut().skip(count) {
            *slot = b'u' - b'!';
        }
        let bytes = ascii85_group(&group)?;
        out.extend_from_slice(&bytes[..count - 1]);
    }
    Ok(out)
}

fn ascii85_group(group: &[u8; 5]) -> Result<[u8; 4]> {
    let value = group
        .iter()
        .try_fold(0u64, |acc, &digit| Some(acc * 85 + u64::from(digit)))
        .filter(|&v| v <= u64::from(u32::MAX))
        .ok_or_else(|| Error::Decode("ASCII85Decode: group overflow".to_string()))?;
    Ok((value as u32).to_be_bytes())
}

pub fn run_length_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0usize;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let end = (i + length as usize + 1).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&b) = data.get(i) {
                    out.extend(std::iter::repeat(b).take(257 - length as usize));
                }
                i += 1;
            }
        }
    }
    out
}

/// PNG (10..=15) and TIFF (2) predictor parameters.
#[derive(Debug, Clone, Copy)]
pub struct Predictor {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Predictor {
    pub fn apply(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        match self.predictor {
            1 => Ok(data),
            2 => Ok(self.undo_tiff(data)),
            10..=15 => Ok(self.undo_png(&data)),
            other => Err(Error::Decode(format!("unknown predictor {}", other))),
        }
    }

    fn row_bytes(&self) -> usize {
        (self.colors * self.bits_per_component * self.columns).div_ceil(8)
    }

    fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }

    fn undo_png(&self, data: &[u8]) -> Vec<u8> {
        let row_bytes = self.row_bytes();
        let bpp = self.pixel_bytes();
        let mut out = Vec::with_capacity(data.len());
        let mut prev = vec![0u8; row_bytes];
        let mut row = vec![0u8; row_bytes];

        for chunk in data.chunks(row_bytes + 1) {
            let Some((&filter, encoded)) = chunk.split_first() else {
                break;
            };
            let n = encoded.len();
            for i in 0..n {
                let left = if i >= bpp { row[i - bpp] } else { 0 };
                let up = prev[i];
                let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
                row[i] = match filter {
                    1 => encoded[i].wrapping_add(left),
                    2 => encoded[i].wrapping_add(up),
                    3 => encoded[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                    4 => encoded[i].wrapping_add(paeth(left, up, up_left)),
                    _ => encoded[i],
                };
            }
            out.extend_from_slice(&row[..n]);
            std::mem::swap(&mut prev, &mut row);
        }
        out
    }

    fn undo_tiff(&self, mut data: Vec<u8>) -> Vec<u8> {
        if self.bits_per_component != 8 {
            log::debug!(
                "TIFF predictor with {} bits per component left as is",
                self.bits_per_component
            );
            return data;
        }
        let row_bytes = self.row_bytes();
        for row in data.chunks_mut(row_bytes) {
            for i in self.colors..row.len() {
                row[i] = row[i].wrapping_add(row[i - self.colors]);
            }
        }
        data
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
