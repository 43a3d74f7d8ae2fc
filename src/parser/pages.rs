//! Page tree traversal with attribute inheritance.

use super::document::PdfDocument;
use super::object::{Dictionary, Object, ObjectId};
use crate::error::{Error, Result};
use crate::model::Rect;
use std::collections::HashSet;

/// A page leaf with its inherited attributes resolved.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// 0-based position in document order
    pub index: usize,
    /// Object id of the page dictionary
    pub id: ObjectId,
    pub media_box: Rect,
    pub crop_box: Option<Rect>,
    /// Resource dictionary with the top level resolved
    pub resources: Dictionary,
    /// Rotation in degrees, normalised to 0, 90, 180 or 270
    pub rotate: i32,
    /// Content streams in drawing order
    pub contents: Vec<Object>,
}

impl PdfPage {
    /// The visible area: CropBox clipped to MediaBox, or the MediaBox.
    pub fn visible_box(&self) -> Rect {
        match self.crop_box {
            Some(crop) => Rect::new(
                crop.x0.max(self.media_box.x0),
                crop.y0.max(self.media_box.y0),
                crop.x1.min(self.media_box.x1),
                crop.y1.min(self.media_box.y1),
            ),
            None => self.media_box,
        }
    }
}

/// Attributes a page inherits from its ancestors.
#[derive(Debug, Clone, Default)]
struct Inherited {
    media_box: Option<Rect>,
    crop_box: Option<Rect>,
    resources: Option<Dictionary>,
    rotate: Option<i32>,
}

impl Inherited {
    fn overlay(&self, doc: &PdfDocument, node: &Dictionary) -> Inherited {
        Inherited {
            media_box: read_rect(doc, node.get("MediaBox")).or(self.media_box),
            crop_box: read_rect(doc, node.get("CropBox")).or(self.crop_box),
            resources: node
                .get("Resources")
                .and_then(|r| doc.resolve_opt(r))
                .and_then(Object::as_dict)
                .cloned()
                .or_else(|| self.resources.clone()),
            rotate: node
                .get("Rotate")
                .and_then(|r| doc.resolve_opt(r))
                .and_then(Object::as_i64)
                .map(|r| r as i32)
                .or(self.rotate),
        }
    }
}

fn read_rect(doc: &PdfDocument, obj: Option<&Object>) -> Option<Rect> {
    let values: Vec<f32> = doc
        .resolve_opt(obj?)?
        .as_array()?
        .iter()
        .filter_map(|v| doc.resolve_opt(v).and_then(Object::as_f32))
        .collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => Some(Rect::new(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

/// Walk the page tree from the catalog's `/Pages` root, depth-first in
/// `/Kids` order, without recursion.
pub fn collect_pages(doc: &PdfDocument, catalog: &Dictionary) -> Result<Vec<PdfPage>> {
    let root = catalog
        .get("Pages")
        .and_then(Object::as_reference)
        .ok_or_else(|| Error::MalformedPageTree("catalog has no /Pages reference".to_string()))?;

    let mut pages = Vec::new();
    let mut visited: HashSet<ObjectId> = HashSet::new();
    let mut stack: Vec<(ObjectId, Inherited)> = vec![(root, Inherited::default())];

    while let Some((id, inherited)) = stack.pop() {
        if !visited.insert(id) {
            return Err(Error::MalformedPageTree(format!(
                "page tree node {} {} R is reachable twice",
                id.0, id.1
            )));
        }

        let node = doc
            .get(id)
            .ok()
            .and_then(Object::as_dict)
            .ok_or_else(|| {
                Error::MalformedPageTree(format!("page tree node {} {} R is not a dictionary", id.0, id.1))
            })?;

        let attrs = inherited.overlay(doc, node);
        let kids = node.get("Kids").and_then(|k| doc.resolve_opt(k)).and_then(Object::as_array);

        match kids {
            Some(kids) if !node.has_type("Page") => {
                // Reverse so the first kid is popped first.
                for kid in kids.iter().rev() {
                    let kid_id = kid.as_reference().ok_or_else(|| {
                        Error::MalformedPageTree(format!(
                            "/Kids entry in {} {} R is a {}, not a reference",
                            id.0,
                            id.1,
                            kid.type_name()
                        ))
                    })?;
                    stack.push((kid_id, attrs.clone()));
                }
            }
            _ => {
                if node.has_type("Pages") {
                    log::debug!("Page tree node {} {} R has no kids", id.0, id.1);
                    continue;
                }
                pages.push(build_page(doc, id, node, attrs, pages.len()));
            }
        }
    }

    Ok(pages)
}

fn build_page(
    doc: &PdfDocument,
    id: ObjectId,
    node: &Dictionary,
    attrs: Inherited,
    index: usize,
) -> PdfPage {
    let media_box = attrs.media_box.unwrap_or_else(|| {
        log::debug!("Page {} has no MediaBox, using US Letter", index);
        Rect::LETTER
    });

    PdfPage {
        index,
        id,
        media_box,
        crop_box: attrs.crop_box,
        resources: attrs.resources.unwrap_or_default(),
        rotate: attrs.rotate.unwrap_or(0).rem_euclid(360) / 90 * 90,
        contents: content_streams(doc, node.get("Contents")),
    }
}

/// Flatten `/Contents` (a stream reference, an array of them, or a
/// reference to such an array) into a list.
fn content_streams(doc: &PdfDocument, contents: Option<&Object>) -> Vec<Object> {
    match contents {
        None => Vec::new(),
        Some(Object::Array(items)) => items.clone(),
        Some(reference @ Object::Reference(_)) => match doc.resolve_opt(reference) {
            Some(Object::Array(items)) => items.clone(),
            Some(_) => vec![reference.clone()],
            None => Vec::new(),
        },
        Some(other) => vec![other.clone()],
    }
}
