//! Shared fixtures: PDFs assembled in memory.

#![allow(dead_code)]

use std::fmt::Write as _;

/// Builds a PDF body and writes a matching cross-reference table.
#[derive(Default)]
pub struct PdfBuilder {
    objects: Vec<(u32, Vec<u8>)>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(mut self, num: u32, body: &str) -> Self {
        self.objects.push((num, body.as_bytes().to_vec()));
        self
    }

    pub fn stream(mut self, num: u32, dict: &str, data: &[u8]) -> Self {
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((num, body));
        self
    }

    pub fn build(&self, trailer: &str) -> Vec<u8> {
        let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let max = self.objects.iter().map(|(n, _)| *n).max().unwrap_or(0);
        let mut offsets = vec![None; max as usize + 1];
        for (num, body) in &self.objects {
            offsets[*num as usize] = Some(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let start = out.len();
        let mut xref = format!("xref\n0 {}\n", max + 1);
        for offset in &offsets {
            match offset {
                Some(o) => writeln!(xref, "{:010} 00000 n ", o).unwrap(),
                None => writeln!(xref, "0000000000 65535 f ").unwrap(),
            }
        }
        write!(
            xref,
            "trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n",
            max + 1,
            trailer,
            start
        )
        .unwrap();
        out.extend_from_slice(xref.as_bytes());
        out
    }
}

/// Pages with the given content streams; `/F1` is Helvetica, `/F2`
/// Helvetica-Bold, `/Im1` a 2x2 gray image.
pub fn pages_pdf(contents: &[&str]) -> Vec<u8> {
    let mut builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(3, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>")
        .object(4, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold >>")
        .stream(
            5,
            "/Type /XObject /Subtype /Image /Width 2 /Height 2 /ColorSpace /DeviceGray /BitsPerComponent 8",
            &[0, 255, 255, 0],
        );

    let mut kids = Vec::new();
    for (i, content) in contents.iter().enumerate() {
        let page = 10 + 2 * i as u32;
        kids.push(format!("{} 0 R", page));
        builder = builder
            .object(
                page,
                &format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", page + 1),
            )
            .stream(page + 1, "", content.as_bytes());
    }

    builder
        .object(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> /XObject << /Im1 5 0 R >> >> >>",
                kids.join(" "),
                contents.len()
            ),
        )
        .build("/Root 1 0 R")
}

/// One Helvetica line per page.
pub fn text_pages(lines: &[&str]) -> Vec<u8> {
    let contents: Vec<String> = lines
        .iter()
        .map(|text| format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text))
        .collect();
    let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
    pages_pdf(&refs)
}

/// The two-page Hello/Goodbye document.
pub fn hello_goodbye() -> Vec<u8> {
    text_pages(&["First page: Hello World!", "Second page: Goodbye World!"])
}
