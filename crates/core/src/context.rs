//! Per-export capture state.

use crate::error::ExportError;
use crate::options::ExportOptions;
use log::debug;
use vexport_capture::{
    AttributeLayout, FeedbackDecoder, ImmediateCapture, Primitive, PrimitiveBuffer, SortMode, Topology,
    parse_feedback, sort_primitives,
};
use vexport_projector::Projector;
use vexport_render_core::VectorDevice;
use vexport_types::Color;

/// Everything one export pass mutates: the device, the camera used for capture
/// and the buffer of captured primitives. Created when the pass starts and
/// consumed by [`ExportContext::finish`].
pub struct ExportContext {
    device: Box<dyn VectorDevice>,
    projector: Projector,
    primitives: PrimitiveBuffer,
    buffer_size: usize,
    sort_mode: SortMode,
    point_size_factor: f64,
    line_width_factor: f64,
}

impl ExportContext {
    pub fn new(device: Box<dyn VectorDevice>, projector: Projector, options: &ExportOptions) -> Self {
        Self {
            device,
            projector,
            primitives: PrimitiveBuffer::with_capacity(options.buffer_size),
            buffer_size: options.buffer_size,
            sort_mode: options.sort_mode,
            point_size_factor: options.point_size_factor,
            line_width_factor: options.line_width_factor,
        }
    }

    pub fn device(&mut self) -> &mut dyn VectorDevice {
        self.device.as_mut()
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn projector_mut(&mut self) -> &mut Projector {
        &mut self.projector
    }

    /// Primitives captured and not yet drawn.
    pub fn pending(&self) -> usize {
        self.primitives.len()
    }

    /// Immediate-mode capture into this context's buffer.
    pub fn capture(&mut self) -> ImmediateCapture<'_, PrimitiveBuffer> {
        ImmediateCapture::new(&self.projector, &mut self.primitives)
    }

    /// Decodes a transform-feedback vertex buffer; returns the primitives captured.
    pub fn capture_feedback(
        &mut self,
        buffer: &[u8],
        layout: AttributeLayout,
        topology: Topology,
        fallback_color: Color,
    ) -> Result<usize, ExportError> {
        let decoder = FeedbackDecoder::new(&self.projector, layout, topology).with_fallback_color(fallback_color);
        Ok(decoder.decode(buffer, &mut self.primitives)?)
    }

    /// Reads a legacy feedback token stream; returns the primitives captured.
    pub fn capture_tokens(&mut self, buffer: &[f32]) -> Result<usize, ExportError> {
        Ok(parse_feedback(buffer, &mut self.primitives)?)
    }

    /// Sorts the pending primitives and draws them, scaling point sizes and
    /// line widths by the configured factors.
    pub fn flush(&mut self) -> Result<usize, ExportError> {
        if self.primitives.is_empty() {
            return Ok(0);
        }
        let buffer = std::mem::replace(&mut self.primitives, PrimitiveBuffer::with_capacity(self.buffer_size));
        if buffer.has_grown() {
            debug!("Captured {} primitives past the initial buffer of {}", buffer.len(), self.buffer_size);
        }
        let sorted = sort_primitives(buffer.into_vec(), self.sort_mode);
        let count = sorted.len();
        for mut primitive in sorted {
            match &mut primitive {
                Primitive::Point { size, .. } => *size *= self.point_size_factor,
                Primitive::Line { width, .. } => *width *= self.line_width_factor,
                Primitive::Triangle { .. } | Primitive::PolygonFan { .. } => {}
            }
            self.device.draw_primitive(&primitive)?;
        }
        debug!("{}: drew {} captured primitives", self.device.name(), count);
        Ok(count)
    }

    /// Draws what is still pending and closes the document.
    pub fn finish(mut self) -> Result<Vec<u8>, ExportError> {
        self.flush()?;
        Ok(self.device.finish()?)
    }
}
