//! Graphics and text state with an explicit save/restore stack.

use super::font::PdfFont;
use crate::model::Matrix;
use std::rc::Rc;

/// Text state parameters (`Tc Tw Tz TL Tf Ts Tr`).
#[derive(Debug, Clone)]
pub struct TextState {
    /// Font selected by `Tf` or `gs`
    pub font: Option<Rc<PdfFont>>,
    pub font_size: f32,
    pub char_spacing: f32,
    pub word_spacing: f32,
    /// `Tz / 100`
    pub horizontal_scale: f32,
    pub leading: f32,
    pub rise: f32,
    pub render_mode: i32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

/// The part of the interpreter state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    pub ctm: Matrix,
    /// Fill colour components in the current colour space
    pub fill_color: Vec<f32>,
    pub stroke_color: Vec<f32>,
    pub line_width: f32,
    pub text: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill_color: vec![0.0],
            stroke_color: vec![0.0],
            line_width: 1.0,
            text: TextState::default(),
        }
    }
}

impl GraphicsState {
    /// Line width transformed to page space.
    pub fn page_line_width(&self) -> f32 {
        let scale = (self.ctm.scale_x() + self.ctm.scale_y()) / 2.0;
        self.line_width * scale
    }
}

/// The current graphics state plus the states saved by `q`.
#[derive(Debug, Clone, Default)]
pub struct GraphicsStack {
    current: GraphicsState,
    saved: Vec<GraphicsState>,
}

impl GraphicsStack {
    pub fn new(initial: GraphicsState) -> Self {
        Self {
            current: initial,
            saved: Vec::new(),
        }
    }

    pub fn current(&self) -> &GraphicsState {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut GraphicsState {
        &mut self.current
    }

    /// `q`
    pub fn save(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// `Q`. Returns `false`, leaving the state untouched, when there is no
    /// matching save.
    pub fn restore(&mut self) -> bool {
        match self.saved.pop() {
            Some(state) => {
                self.current = state;
                true
            }
            None => false,
        }
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }
}
