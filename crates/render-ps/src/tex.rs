//! LaTeX text overlay.
//!
//! Only strings are kept. The overlay is a `picture` environment that includes
//! the companion EPS (written separately with the same geometry) and places each
//! string on top of it with `\put` and `\makebox`.

use log::debug;
use std::fmt::Write as _;
use vexport_path::Path;
use vexport_render_core::utils::{fmt_num, fmt_unit};
use vexport_render_core::{
    DeviceState, DocumentInfo, ImageData, Justification, MarkerShape, RenderError, VectorDevice,
    VerticalJustification,
};
use vexport_types::{Color, Point2, Rect, Size};

#[derive(Debug, Clone)]
pub struct TexDevice {
    state: DeviceState,
    info: DocumentInfo,
    /// Graphics file passed to `\includegraphics`, usually the EPS file stem.
    graphics: String,
    puts: Vec<String>,
}

/// `\makebox` position flags for an anchor; centered on both axes needs none.
fn makebox_position(h: Justification, v: VerticalJustification) -> &'static str {
    match (v, h) {
        (VerticalJustification::Bottom, Justification::Left) => "[bl]",
        (VerticalJustification::Bottom, Justification::Center) => "[b]",
        (VerticalJustification::Bottom, Justification::Right) => "[br]",
        (VerticalJustification::Center, Justification::Left) => "[l]",
        (VerticalJustification::Center, Justification::Center) => "",
        (VerticalJustification::Center, Justification::Right) => "[r]",
        (VerticalJustification::Top, Justification::Left) => "[tl]",
        (VerticalJustification::Top, Justification::Center) => "[t]",
        (VerticalJustification::Top, Justification::Right) => "[tr]",
    }
}

impl TexDevice {
    pub fn new(canvas: Size, info: DocumentInfo, graphics: impl Into<String>) -> Self {
        Self { state: DeviceState::new(canvas), info, graphics: graphics.into(), puts: Vec::new() }
    }

    fn document(&self) -> String {
        let canvas = self.state.canvas;
        let mut out = String::new();
        let _ = writeln!(out, "% Title: {}", self.info.title);
        let _ = writeln!(out, "% Creator: {}", self.info.creator);
        let _ = writeln!(out, "% For: {}", self.info.creator);
        let _ = writeln!(out, "% CreationDate: {}", self.info.timestamp().format("%a %b %e %H:%M:%S %Y"));
        out.push_str("\\setlength{\\unitlength}{1pt}\n");
        out.push_str("\\begin{picture}(0,0)\n");
        let _ = writeln!(out, "\\includegraphics{{{}}}", self.graphics);
        out.push_str("\\end{picture}%\n");
        let _ = writeln!(
            out,
            "\\begin{{picture}}({},{})(0,0)",
            canvas.width.ceil() as i64,
            canvas.height.ceil() as i64
        );
        for put in &self.puts {
            out.push_str(put);
        }
        out.push_str("\\end{picture}\n");
        out
    }
}

impl VectorDevice for TexDevice {
    fn name(&self) -> &'static str {
        "tex"
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    fn begin(&mut self) -> Result<(), RenderError> {
        self.state.reset();
        self.puts.clear();
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, RenderError> {
        debug!("tex: {} strings placed over {}", self.puts.len(), self.graphics);
        Ok(self.document().into_bytes())
    }

    fn draw_poly(&mut self, _: &[Point2], _: Option<&[Color]>) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_lines(&mut self, _: &[Point2], _: Option<&[Color]>) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_points(&mut self, _: &[Point2], _: Option<&[Color]>) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_markers(&mut self, _: MarkerShape, _: bool, _: &[Point2], _: Option<&[Color]>) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_polygon(&mut self, _: &[Point2], _: Option<&[Color]>) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_ellipse_wedge(&mut self, _: Point2, _: (f64, f64), _: (f64, f64), _: f64, _: f64) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_elliptic_arc(&mut self, _: Point2, _: f64, _: f64, _: f64, _: f64) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_string(&mut self, at: Point2, text: &str) -> Result<(), RenderError> {
        let line = text.replace('\n', " ");
        if line.trim().is_empty() {
            return Ok(());
        }
        let prop = self.state.text;
        let anchor = self.state.matrix().transform_point(at);
        let mut put = format!("\\fontsize{{{}}}{{0}}\n\\selectfont\\put({},{})", fmt_num(prop.size), fmt_num(anchor.x), fmt_num(anchor.y));
        let rotated = prop.orientation != 0.0;
        if rotated {
            let _ = write!(put, "{{\\rotatebox{{{}}}", fmt_num(prop.orientation));
        }
        let _ = write!(
            put,
            "{{\\makebox(0,0){}{{\\textcolor[rgb]{{{},{},{}}}{{{{{}}}}}",
            makebox_position(prop.justification, prop.vertical_justification),
            fmt_unit(prop.color.r),
            fmt_unit(prop.color.g),
            fmt_unit(prop.color.b),
            line
        );
        if rotated {
            put.push('}');
        }
        put.push_str("}}\n");
        self.puts.push(put);
        Ok(())
    }

    fn draw_path(&mut self, _: &Path, _: Point2) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_image(&mut self, _: Rect, _: &ImageData) -> Result<(), RenderError> {
        Ok(())
    }

    fn apply_transform(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    fn set_clip(&mut self, clip: Option<Rect>) -> Result<(), RenderError> {
        self.state.clip = clip;
        Ok(())
    }
}
