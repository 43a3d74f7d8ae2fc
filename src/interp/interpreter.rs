//! Page content execution against a virtual graphics state.

use super::content::{parse_content, Operation};
use super::font::PdfFont;
use super::state::{GraphicsStack, GraphicsState};
use crate::model::{
    Glyph, ImagePrimitive, ImageSource, Matrix, PaintStyle, PathPrimitive, Point, Primitive,
    Warning,
};
use crate::parser::{Dictionary, Object, ObjectId, PdfDocument, PdfPage, Stream};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Form XObjects nested deeper than this are skipped.
pub const MAX_FORM_DEPTH: usize = 12;

/// Primitives and advisory warnings produced for one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub primitives: Vec<Primitive>,
    pub warnings: Vec<Warning>,
}

/// Execute every content stream of a page.
///
/// Never fails: unreadable streams, syntax errors and unknown operators
/// become warnings and whatever was drawn before them is kept.
pub fn interpret_page(doc: &PdfDocument, page: &PdfPage) -> PageContent {
    let mut data = Vec::new();
    let mut interp = Interpreter::new(doc);

    for content in &page.contents {
        let stream = match doc.resolve(content) {
            Ok(Object::Stream(stream)) => stream,
            Ok(other) => {
                interp.warn(Warning::ContentError {
                    message: format!("content is a {}, not a stream", other.type_name()),
                });
                continue;
            }
            Err(e) => {
                interp.warn(Warning::ContentError {
                    message: e.to_string(),
                });
                continue;
            }
        };
        match doc.decode_stream(stream) {
            Ok(bytes) => {
                data.extend_from_slice(&bytes);
                data.push(b'\n');
            }
            Err(e) => {
                log::warn!("page {}: content stream skipped: {}", page.index, e);
                interp.warn(Warning::ContentError {
                    message: e.to_string(),
                });
            }
        }
    }

    let (ops, err) = parse_content(&data);
    log::trace!("page {}: {} operations", page.index, ops.len());
    interp.execute(&ops, &page.resources);
    if let Some(e) = err {
        interp.warn(Warning::ContentError {
            message: e.to_string(),
        });
    }

    PageContent {
        primitives: interp.primitives,
        warnings: interp.warnings,
    }
}

struct Interpreter<'d> {
    doc: &'d PdfDocument,
    stack: GraphicsStack,
    text_matrix: Matrix,
    line_matrix: Matrix,
    /// Subpaths under construction, in page space
    path: Vec<Vec<Point>>,
    fonts: HashMap<ObjectId, Rc<PdfFont>>,
    forms: Vec<ObjectId>,
    form_depth: usize,
    /// Nesting of `BX`/`EX` sections
    compat: usize,
    primitives: Vec<Primitive>,
    warnings: Vec<Warning>,
    seen: HashSet<Warning>,
}

impl<'d> Interpreter<'d> {
    fn new(doc: &'d PdfDocument) -> Self {
        Self {
            doc,
            stack: GraphicsStack::new(GraphicsState::default()),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            path: Vec::new(),
            fonts: HashMap::new(),
            forms: Vec::new(),
            form_depth: 0,
            compat: 0,
            primitives: Vec::new(),
            warnings: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn warn(&mut self, warning: Warning) {
        if self.seen.insert(warning.clone()) {
            self.warnings.push(warning);
        }
    }

    fn state(&mut self) -> &mut GraphicsState {
        self.stack.current_mut()
    }

    fn execute(&mut self, ops: &[Operation], resources: &'d Dictionary) {
        for op in ops {
            self.execute_op(op, resources);
        }
    }

    fn execute_op(&mut self, op: &Operation, resources: &'d Dictionary) {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            // Graphics state
            "q" => self.stack.save(),
            "Q" => {
                if !self.stack.restore() {
                    self.warn(Warning::UnbalancedRestore);
                }
            }
            "cm" => {
                if let Some(m) = matrix_operand(operands) {
                    let state = self.state();
                    state.ctm = m.multiply(&state.ctm);
                }
            }
            "w" => {
                if let Some([w]) = numbers::<1>(operands) {
                    self.state().line_width = w;
                }
            }
            "gs" => self.apply_ext_gstate(operands, resources),
            "J" | "j" | "M" | "d" | "ri" | "i" => {}

            // Colour
            "G" | "RG" | "K" | "SC" | "SCN" => {
                self.state().stroke_color = color_components(operands)
            }
            "g" | "rg" | "k" | "sc" | "scn" => self.state().fill_color = color_components(operands),
            "CS" => self.state().stroke_color = vec![0.0],
            "cs" => self.state().fill_color = vec![0.0],

            // Path construction
            "m" => {
                if let Some([x, y]) = numbers::<2>(operands) {
                    let p = self.to_page(x, y);
                    self.path.push(vec![p]);
                }
            }
            "l" => {
                if let Some([x, y]) = numbers::<2>(operands) {
                    let p = self.to_page(x, y);
                    self.extend_path(&[p]);
                }
            }
            "c" => {
                if let Some([x1, y1, x2, y2, x3, y3]) = numbers::<6>(operands) {
                    let points = [self.to_page(x1, y1), self.to_page(x2, y2), self.to_page(x3, y3)];
                    self.extend_path(&points);
                }
            }
            "v" | "y" => {
                if let Some([xa, ya, xb, yb]) = numbers::<4>(operands) {
                    let points = [self.to_page(xa, ya), self.to_page(xb, yb)];
                    self.extend_path(&points);
                }
            }
            "h" => self.close_subpath(),
            "re" => {
                if let Some([x, y, w, h]) = numbers::<4>(operands) {
                    let corners = vec![
                        self.to_page(x, y),
                        self.to_page(x + w, y),
                        self.to_page(x + w, y + h),
                        self.to_page(x, y + h),
                        self.to_page(x, y),
                    ];
                    self.path.push(corners);
                }
            }

            // Path painting
            "S" => self.paint(true, false),
            "s" => {
                self.close_subpath();
                self.paint(true, false);
            }
            "f" | "F" | "f*" => self.paint(false, true),
            "B" | "B*" => self.paint(true, true),
            "b" | "b*" => {
                self.close_subpath();
                self.paint(true, true);
            }
            "n" => self.path.clear(),
            // Clipping is not tracked; the pending path is painted or
            // discarded by the next operator.
            "W" | "W*" => {}

            // Text objects and state
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "ET" => {}
            "Tf" => {
                if let (Some(name), Some(size)) = (
                    operands.len().checked_sub(2).and_then(|i| operands[i].as_name()),
                    operands.last().and_then(Object::as_f32),
                ) {
                    let font = self.select_font(resources, name);
                    let text = &mut self.state().text;
                    text.font = Some(font);
                    text.font_size = size;
                }
            }
            "Tc" => {
                if let Some([v]) = numbers::<1>(operands) {
                    self.state().text.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some([v]) = numbers::<1>(operands) {
                    self.state().text.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some([v]) = numbers::<1>(operands) {
                    self.state().text.horizontal_scale = v / 100.0;
                }
            }
            "TL" => {
                if let Some([v]) = numbers::<1>(operands) {
                    self.state().text.leading = v;
                }
            }
            "Ts" => {
                if let Some([v]) = numbers::<1>(operands) {
                    self.state().text.rise = v;
                }
            }
            "Tr" => {
                if let Some(mode) = operands.last().and_then(Object::as_i64) {
                    self.state().text.render_mode = mode as i32;
                }
            }

            // Text positioning
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    self.state().text.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operand(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),

            // Text showing
            "Tj" => {
                if let Some(bytes) = operands.last().and_then(Object::as_string_bytes) {
                    self.show_text(bytes);
                }
            }
            "'" => {
                if let Some(bytes) = operands.last().and_then(Object::as_string_bytes) {
                    self.next_line();
                    self.show_text(bytes);
                }
            }
            "\"" => {
                if let (Some([aw, ac]), Some(bytes)) = (
                    numbers::<2>(&operands[..operands.len().saturating_sub(1)]),
                    operands.last().and_then(Object::as_string_bytes),
                ) {
                    let text = &mut self.state().text;
                    text.word_spacing = aw;
                    text.char_spacing = ac;
                    self.next_line();
                    self.show_text(bytes);
                }
            }
            "TJ" => {
                if let Some(items) = operands.last().and_then(Object::as_array) {
                    for item in items {
                        match item {
                            Object::String(bytes) => self.show_text(bytes),
                            other => {
                                if let Some(adjust) = other.as_f32() {
                                    self.adjust_text(adjust);
                                }
                            }
                        }
                    }
                }
            }

            // XObjects and inline images
            "Do" => {
                if let Some(name) = operands.last().and_then(Object::as_name) {
                    self.invoke_xobject(name, resources);
                }
            }
            "BI" => {
                if let [Object::Dictionary(dict), Object::String(data)] = operands {
                    let source = ImageSource::Inline {
                        dict: dict.clone(),
                        data: data.clone(),
                    };
                    self.place_image(source);
                }
            }

            // Recognised and ignored
            "BMC" | "BDC" | "EMC" | "MP" | "DP" | "sh" | "d0" | "d1" => {}
            "BX" => self.compat += 1,
            "EX" => self.compat = self.compat.saturating_sub(1),

            other => {
                if self.compat == 0 {
                    log::debug!("skipping unsupported operator '{}'", other);
                    self.warn(Warning::UnsupportedOperator {
                        operator: other.to_string(),
                    });
                }
            }
        }
    }

    fn next_order(&self) -> usize {
        self.primitives.len()
    }

    fn to_page(&self, x: f32, y: f32) -> Point {
        self.stack.current().ctm.apply(Point::new(x, y))
    }

    fn extend_path(&mut self, points: &[Point]) {
        match self.path.last_mut() {
            Some(subpath) => subpath.extend_from_slice(points),
            // A segment without a current point starts a new subpath.
            None => self.path.push(points.to_vec()),
        }
    }

    fn close_subpath(&mut self) {
        if let Some(subpath) = self.path.last_mut() {
            if let Some(&first) = subpath.first() {
                if subpath.last() != Some(&first) {
                    subpath.push(first);
                }
            }
        }
    }

    fn paint(&mut self, stroke: bool, fill: bool) {
        let subpaths: Vec<Vec<Point>> = std::mem::take(&mut self.path)
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if subpaths.is_empty() {
            return;
        }
        let primitive = PathPrimitive {
            subpaths,
            style: PaintStyle { stroke, fill },
            line_width: self.stack.current().page_line_width(),
            order: self.next_order(),
        };
        self.primitives.push(Primitive::Path(primitive));
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.stack.current().text.leading;
        self.move_line(0.0, -leading);
    }

    /// `TJ` number: move back by `n / 1000` text space units.
    fn adjust_text(&mut self, adjust: f32) {
        let text = &self.stack.current().text;
        let tx = -adjust / 1000.0 * text.font_size * text.horizontal_scale;
        self.text_matrix = Matrix::translate(tx, 0.0).multiply(&self.text_matrix);
    }

    fn show_text(&mut self, bytes: &[u8]) {
        let font = match self.stack.current().text.font.clone() {
            Some(font) => font,
            None => {
                self.warn(Warning::MetricsDegraded {
                    font: "(none)".to_string(),
                });
                Rc::new(PdfFont::fallback("(none)"))
            }
        };
        let state = self.stack.current();
        let text = state.text.clone();
        let ctm = state.ctm;
        let th = text.horizontal_scale;
        let size_matrix = Matrix::new(text.font_size * th, 0.0, 0.0, text.font_size, 0.0, text.rise);

        for ch in font.decode(bytes) {
            let text_to_page = self.text_matrix.multiply(&ctm);
            let tx = (ch.width * text.font_size
                + text.char_spacing
                + if ch.word_space { text.word_spacing } else { 0.0 })
                * th;

            if !ch.text.is_empty() {
                let trm = size_matrix.multiply(&text_to_page);
                let glyph = Glyph {
                    text: ch.text,
                    origin: trm.apply(Point::new(0.0, 0.0)),
                    advance: tx * text_to_page.scale_x(),
                    font_size: trm.scale_y(),
                    font_name: font.base_name.clone(),
                    bold: font.bold,
                    italic: font.italic,
                    order: self.next_order(),
                };
                self.primitives.push(Primitive::Glyph(glyph));
            }
            self.text_matrix = Matrix::translate(tx, 0.0).multiply(&self.text_matrix);
        }
    }

    fn select_font(&mut self, resources: &'d Dictionary, name: &str) -> Rc<PdfFont> {
        let doc = self.doc;
        let entry = doc
            .get_in(resources, "Font")
            .and_then(Object::as_dict)
            .and_then(|fonts| fonts.get(name));
        match entry {
            Some(obj) => self.load_font(obj, name),
            None => {
                self.warn(Warning::MetricsDegraded {
                    font: name.to_string(),
                });
                Rc::new(PdfFont::fallback(name))
            }
        }
    }

    fn load_font(&mut self, obj: &Object, label: &str) -> Rc<PdfFont> {
        let id = obj.as_reference();
        if let Some(font) = id.and_then(|id| self.fonts.get(&id)) {
            return Rc::clone(font);
        }
        let font = match self.doc.resolve_opt(obj).and_then(Object::as_dict) {
            Some(dict) => PdfFont::load(self.doc, dict),
            None => PdfFont::fallback(label),
        };
        if font.is_degraded() {
            self.warn(Warning::MetricsDegraded {
                font: font.base_name.clone(),
            });
        }
        let font = Rc::new(font);
        if let Some(id) = id {
            self.fonts.insert(id, Rc::clone(&font));
        }
        font
    }

    fn apply_ext_gstate(&mut self, operands: &[Object], resources: &'d Dictionary) {
        let doc = self.doc;
        let Some(gs) = operands
            .last()
            .and_then(Object::as_name)
            .and_then(|name| {
                doc.get_in(resources, "ExtGState")
                    .and_then(Object::as_dict)
                    .and_then(|states| doc.get_in(states, name))
            })
            .and_then(Object::as_dict)
        else {
            return;
        };

        if let Some(lw) = doc.get_in(gs, "LW").and_then(Object::as_f32) {
            self.state().line_width = lw;
        }
        if let Some([font_ref, size]) = doc
            .get_in(gs, "Font")
            .and_then(Object::as_array)
            .and_then(|a| <&[Object; 2]>::try_from(a).ok())
        {
            if let Some(size) = size.as_f32() {
                let font = self.load_font(font_ref, "ExtGState");
                let text = &mut self.state().text;
                text.font = Some(font);
                text.font_size = size;
            }
        }
    }

    fn place_image(&mut self, source: ImageSource) {
        let placement = self.stack.current().ctm;
        let image = ImagePrimitive {
            source,
            placement,
            bbox: placement.unit_square_bbox(),
            order: self.next_order(),
        };
        self.primitives.push(Primitive::Image(image));
    }

    fn invoke_xobject(&mut self, name: &str, resources: &'d Dictionary) {
        let doc = self.doc;
        let Some(entry) = doc
            .get_in(resources, "XObject")
            .and_then(Object::as_dict)
            .and_then(|xobjects| xobjects.get(name))
        else {
            self.warn(Warning::ContentError {
                message: format!("XObject /{} not found", name),
            });
            return;
        };
        let id = entry.as_reference();
        let Some(stream) = doc.resolve_opt(entry).and_then(Object::as_stream) else {
            self.warn(Warning::ContentError {
                message: format!("XObject /{} is not a stream", name),
            });
            return;
        };

        match stream.dict.get_name("Subtype") {
            Some("Image") => {
                let source = match id {
                    Some(id) => ImageSource::XObject {
                        name: name.to_string(),
                        id,
                    },
                    None => ImageSource::Inline {
                        dict: stream.dict.clone(),
                        data: stream.content.clone(),
                    },
                };
                self.place_image(source);
            }
            Some("Form") => self.run_form(name, id, stream, resources),
            other => log::debug!("ignoring XObject /{} of subtype {:?}", name, other),
        }
    }

    fn run_form(
        &mut self,
        name: &str,
        id: Option<ObjectId>,
        stream: &'d Stream,
        parent_resources: &'d Dictionary,
    ) {
        if self.form_depth >= MAX_FORM_DEPTH {
            self.warn(Warning::ContentError {
                message: format!("form /{} nested too deeply", name),
            });
            return;
        }
        if let Some(id) = id {
            if self.forms.contains(&id) {
                self.warn(Warning::ContentError {
                    message: format!("form /{} invokes itself", name),
                });
                return;
            }
        }

        let data = match self.doc.decode_stream(stream) {
            Ok(data) => data,
            Err(e) => {
                self.warn(Warning::ContentError {
                    message: format!("form /{}: {}", name, e),
                });
                return;
            }
        };
        let (ops, err) = parse_content(&data);
        let resources = self
            .doc
            .get_in(&stream.dict, "Resources")
            .and_then(Object::as_dict)
            .unwrap_or(parent_resources);

        log::trace!("entering form /{} ({} operations)", name, ops.len());
        let depth = self.stack.depth();
        self.stack.save();
        if let Some(m) = self
            .doc
            .get_in(&stream.dict, "Matrix")
            .and_then(Object::as_array)
            .and_then(matrix_operand)
        {
            let state = self.state();
            state.ctm = m.multiply(&state.ctm);
        }
        let saved_text = (self.text_matrix, self.line_matrix);

        if let Some(id) = id {
            self.forms.push(id);
        }
        self.form_depth += 1;
        self.execute(&ops, resources);
        self.form_depth -= 1;
        if id.is_some() {
            self.forms.pop();
        }

        // Drop saves the form left open, then undo the form's own save.
        while self.stack.depth() > depth {
            self.stack.restore();
        }
        (self.text_matrix, self.line_matrix) = saved_text;

        if let Some(e) = err {
            self.warn(Warning::ContentError {
                message: format!("form /{}: {}", name, e),
            });
        }
    }
}

/// The last `N` operands as numbers.
fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    let start = operands.len().checked_sub(N)?;
    let mut out = [0.0; N];
    for (slot, obj) in out.iter_mut().zip(&operands[start..]) {
        *slot = obj.as_f32()?;
    }
    Some(out)
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    numbers::<6>(operands).map(|[a, b, c, d, e, f]| Matrix::new(a, b, c, d, e, f))
}

/// Numeric colour operands; a trailing pattern name is ignored.
fn color_components(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(Object::as_f32).collect()
}
