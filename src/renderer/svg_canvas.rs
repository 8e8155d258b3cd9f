//! SVG canvas: accumulates SVG elements and produces the final string.

use super::canvas::{Canvas, Font, TextAlign};
use crate::font_sizes::FontSizes;

pub struct SvgCanvas {
    elements: Vec<String>,
    path: String,
    width: f64,
    height: f64,
    color: String,
    line_width: f64,
    font: Font,
    text_align: TextAlign,
    font_sizes: FontSizes,
}

impl SvgCanvas {
    pub fn new(font_sizes: FontSizes) -> Self {
        Self {
            elements: Vec::new(),
            path: String::new(),
            width: 0.0,
            height: 0.0,
            color: "#000000".to_string(),
            line_width: 1.0,
            font: Font::default(),
            text_align: TextAlign::Left,
            font_sizes,
        }
    }

    fn build(&self) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {:.1} {:.1}" width="{:.1}" height="{:.1}">"#,
            self.width, self.height, self.width, self.height
        );
        svg.push('\n');
        for el in &self.elements {
            svg.push_str("  ");
            svg.push_str(el);
            svg.push('\n');
        }
        svg.push_str("</svg>\n");
        svg
    }
}

fn escape(content: &str) -> String {
    content
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl Canvas for SvgCanvas {
    fn begin_render(&mut self, width: f64, height: f64) {
        self.elements.clear();
        self.path.clear();
        self.width = width;
        self.height = height;
    }

    fn end_render(&mut self) -> String {
        let svg = self.build();
        self.elements.clear();
        self.path.clear();
        svg
    }

    fn set_color(&mut self, color: &str) {
        self.color = color.to_string();
    }

    fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
    }

    fn set_font(&mut self, font: &Font) {
        self.font = font.clone();
    }

    fn set_text_align(&mut self, align: TextAlign) {
        self.text_align = align;
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        self.elements.push(format!(
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
            x, y, w, h, self.color
        ));
    }

    fn fill_circle(&mut self, x: f64, y: f64, radius: f64) {
        self.elements.push(format!(
            r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}"/>"#,
            x, y, radius, self.color
        ));
    }

    fn fill_ellipse(&mut self, cx: f64, cy: f64, rx: f64, ry: f64) {
        self.elements.push(format!(
            r#"<ellipse cx="{:.1}" cy="{:.1}" rx="{:.1}" ry="{:.1}" fill="{}" transform="rotate(-15,{:.1},{:.1})"/>"#,
            cx, cy, rx, ry, self.color, cx, cy
        ));
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn close_path(&mut self) {
        self.path.push_str(" Z");
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.path.push_str(&format!(" M{:.1},{:.1}", x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.path.push_str(&format!(" L{:.1},{:.1}", x, y));
    }

    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        self.path.push_str(&format!(
            " C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}",
            cp1x, cp1y, cp2x, cp2y, x, y
        ));
    }

    fn fill(&mut self) {
        if !self.path.is_empty() {
            self.elements.push(format!(
                r#"<path d="{}" fill="{}" stroke="none"/>"#,
                self.path.trim_start(),
                self.color
            ));
        }
        self.path.clear();
    }

    fn stroke(&mut self) {
        if !self.path.is_empty() {
            self.elements.push(format!(
                r#"<path d="{}" fill="none" stroke="{}" stroke-width="{:.1}" stroke-linecap="round"/>"#,
                self.path.trim_start(),
                self.color,
                self.line_width
            ));
        }
        self.path.clear();
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        let anchor = match self.text_align {
            TextAlign::Left => "start",
            TextAlign::Center => "middle",
            TextAlign::Right => "end",
        };
        let weight = if self.font.bold { "bold" } else { "normal" };
        let style = if self.font.italic { "italic" } else { "normal" };
        self.elements.push(format!(
            r#"<text x="{:.1}" y="{:.1}" font-family="{}" font-size="{:.0}" font-weight="{}" font-style="{}" fill="{}" text-anchor="{}">{}</text>"#,
            x, y, escape(&self.font.family), self.font.size, weight, style, self.color, anchor, escape(text)
        ));
    }

    fn measure_text(&self, text: &str) -> f64 {
        self.font_sizes.measure(text, &self.font)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_flushed_on_fill_and_stroke() {
        let mut canvas = SvgCanvas::new(FontSizes::default());
        canvas.begin_render(100.0, 50.0);
        canvas.set_color("#333333");
        canvas.begin_path();
        canvas.move_to(1.0, 2.0);
        canvas.line_to(1.0, 40.0);
        canvas.stroke();
        canvas.begin_path();
        canvas.move_to(0.0, 0.0);
        canvas.bezier_curve_to(1.0, 1.0, 2.0, 2.0, 3.0, 3.0);
        canvas.close_path();
        canvas.fill();
        canvas.fill_text("A & B", 5.0, 5.0);
        let svg = canvas.end_render();

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"d="M1.0,2.0 L1.0,40.0""#));
        assert!(svg.contains("C1.0,1.0 2.0,2.0 3.0,3.0 Z"));
        assert!(svg.contains("A &amp; B"));
        assert!(svg.contains(r#"width="100.0""#));
    }
}
