//! Damaged and unsupported documents.

mod common;

use common::{hello_goodbye, PdfBuilder};
use pdfmd::{extract, Error, ExtractOptions, PdfDocument};

#[test]
fn test_shifted_offsets_are_recovered() {
    let mut pdf = hello_goodbye();
    pdf.splice(15..15, b"% inserted comment shifts every offset\n".iter().copied());

    let doc = PdfDocument::load(&pdf).unwrap();
    assert!(doc.is_recovered());

    let output = extract(&pdf, &ExtractOptions::default()).unwrap();
    let text = output.as_text().unwrap();
    assert!(text.contains("Hello World!"));
    assert!(text.contains("Goodbye World!"));
}

#[test]
fn test_truncated_trailer_is_recovered() {
    let pdf = hello_goodbye();
    let cut = pdf.windows(4).rposition(|w| w == b"xref").unwrap();
    let output = extract(&pdf[..cut], &ExtractOptions::default()).unwrap();
    assert!(output.as_text().unwrap().contains("Goodbye World!"));
}

#[test]
fn test_encrypted_document_is_rejected() {
    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .object(3, "<< /Filter /Standard /V 1 /R 2 /O (x) /U (y) /P -4 >>")
        .build("/Root 1 0 R /Encrypt 3 0 R");
    let result = extract(&pdf, &ExtractOptions::default());
    assert!(matches!(result, Err(Error::EncryptedDocument)));
}

#[test]
fn test_garbage_body_is_corrupt() {
    let result = extract(b"%PDF-1.7\nnothing useful here\n%%EOF\n", &ExtractOptions::default());
    assert!(matches!(result, Err(Error::CorruptDocument(_))));
}

#[test]
fn test_bad_operator_becomes_warning() {
    let content = "BT /F1 12 Tf 72 720 Td (Still here) Tj ET zz";
    let pdf = common::pages_pdf(&[content]);
    let output = extract(&pdf, &ExtractOptions::new().with_chunks(true)).unwrap();
    let chunk = &output.chunks().unwrap()[0];
    assert_eq!(chunk.text, "Still here");
    assert!(!chunk.metadata.warnings.is_empty());
}

#[test]
fn test_unchunked_output_keeps_warnings() {
    let content = "BT /F1 12 Tf 72 720 Td (Still here) Tj ET zz";
    let output = extract(&common::pages_pdf(&[content]), &ExtractOptions::default()).unwrap();
    assert_eq!(output.as_text(), Some("Still here\n\n"));
    assert!(matches!(
        &output.warnings()[..],
        [pdfmd::Warning::UnsupportedOperator { operator }] if operator == "zz"
    ));
}
