//! Drawing-surface abstraction and the render engines that provide it.

use serde::{Deserialize, Serialize};

use super::svg_canvas::SvgCanvas;
use crate::error::RenderError;
use crate::font_sizes::FontSizes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Font {
    pub family: String,
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
}

impl Default for Font {
    fn default() -> Self {
        Self::new("Georgia", 12.0)
    }
}

impl Font {
    pub fn new(family: impl Into<String>, size: f64) -> Self {
        Self {
            family: family.into(),
            size,
            bold: false,
            italic: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// A surface the layout paints onto. Paths follow the usual
/// begin / move / line / curve / fill-or-stroke sequence.
pub trait Canvas: Send {
    /// Start a new result of the given size, discarding previous content.
    fn begin_render(&mut self, width: f64, height: f64);
    /// Finish the current result and return its serialized form.
    fn end_render(&mut self) -> String;

    fn set_color(&mut self, color: &str);
    fn set_line_width(&mut self, width: f64);
    fn set_font(&mut self, font: &Font);
    fn set_text_align(&mut self, align: TextAlign);

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn fill_circle(&mut self, x: f64, y: f64, radius: f64);
    fn fill_ellipse(&mut self, cx: f64, cy: f64, rx: f64, ry: f64);

    fn begin_path(&mut self);
    fn close_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64);
    fn fill(&mut self);
    fn stroke(&mut self);

    fn fill_text(&mut self, text: &str, x: f64, y: f64);
    /// Width of `text` in the current font.
    fn measure_text(&self, text: &str) -> f64;
}

/// Available render engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEngine {
    Svg,
}

impl RenderEngine {
    pub fn from_name(name: &str) -> Result<Self, RenderError> {
        match name.to_ascii_lowercase().as_str() {
            "svg" | "default" => Ok(RenderEngine::Svg),
            other => Err(RenderError::Configuration(format!(
                "unknown render engine '{other}'"
            ))),
        }
    }

    /// Whether canvases of this engine can be created off the control context.
    pub fn supports_workers(self) -> bool {
        match self {
            RenderEngine::Svg => true,
        }
    }

    pub fn create_canvas(self, font_sizes: FontSizes) -> Box<dyn Canvas> {
        match self {
            RenderEngine::Svg => Box::new(SvgCanvas::new(font_sizes)),
        }
    }
}
