//! Export orchestration.
//!
//! An export validates its options, optionally renders the raster-only part of
//! the scene into a background image, then replays the scene into one fresh
//! device per output document. The scene is restored whatever happens, and
//! files are only written once every document rendered.

use crate::context::ExportContext;
use crate::error::ExportError;
use crate::options::{ExportOptions, OutputFormat};
use crate::scene::{ExportPhase, Scene};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vexport_render_core::{ImageData, VectorDevice};
use vexport_render_lopdf::{PdfDevice, PdfOptions};
use vexport_render_ps::{PsDevice, PsOptions, TexDevice};
use vexport_render_svg::{SvgDevice, SvgOptions};
use vexport_traits::{MonospaceTextBackend, TextBackend};
use vexport_types::{Rect, Size};

/// Builds a text backend for each device an export creates.
pub type TextBackendFactory = Arc<dyn Fn() -> Box<dyn TextBackend> + Send + Sync>;

/// One rendered document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutput {
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct Exporter {
    options: ExportOptions,
    text_backend: Option<TextBackendFactory>,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options, text_backend: None }
    }

    pub fn with_text_backend(mut self, factory: TextBackendFactory) -> Self {
        self.text_backend = Some(factory);
        self
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    fn text_backend(&self) -> Box<dyn TextBackend> {
        match &self.text_backend {
            Some(factory) => factory(),
            None => Box::new(MonospaceTextBackend::default()),
        }
    }

    /// Documents one export produces, in writing order. TeX needs its EPS
    /// companion rendered first.
    fn documents(&self) -> Vec<OutputFormat> {
        match self.options.format {
            OutputFormat::Tex => vec![OutputFormat::Eps, OutputFormat::Tex],
            format => vec![format],
        }
    }

    fn device(&self, format: OutputFormat, canvas: Size, graphics: &str) -> Box<dyn VectorDevice> {
        let options = &self.options;
        let companion = options.format == OutputFormat::Tex;
        match format {
            OutputFormat::Ps | OutputFormat::Eps => Box::new(
                PsDevice::new(
                    canvas,
                    PsOptions {
                        encapsulated: format == OutputFormat::Eps,
                        compress: options.compress && !companion,
                        tight_bounding_box: options.tight_bounding_box,
                        text_as_paths: options.text_as_paths(),
                        omit_text: companion,
                        info: options.info(),
                        tessellation: options.tessellation,
                    },
                )
                .with_text_backend(self.text_backend()),
            ),
            OutputFormat::Pdf => Box::new(
                PdfDevice::new(
                    canvas,
                    PdfOptions { compress: options.compress, text_as_paths: options.text_as_paths(), info: options.info() },
                )
                .with_text_backend(self.text_backend()),
            ),
            OutputFormat::Svg => Box::new(
                SvgDevice::new(
                    canvas,
                    SvgOptions {
                        text_as_paths: options.text_as_paths(),
                        embed_fonts: options.embed_fonts,
                        info: options.info(),
                        tessellation: options.tessellation,
                    },
                )
                .with_text_backend(self.text_backend()),
            ),
            OutputFormat::Tex => Box::new(TexDevice::new(canvas, options.info(), graphics)),
        }
    }

    /// Renders every document of the configured format. `graphics` names the
    /// EPS companion a TeX overlay includes.
    pub fn render(&self, scene: &mut dyn Scene, graphics: &str) -> Result<Vec<ExportOutput>, ExportError> {
        self.options.validate()?;
        if scene.is_empty() {
            return Err(ExportError::EmptyScene);
        }
        let canvas = scene.canvas();
        if !(canvas.width > 0.0 && canvas.height > 0.0) {
            return Err(ExportError::Config(format!("canvas must be positive, got {}x{}", canvas.width, canvas.height)));
        }

        let result = self.render_documents(scene, canvas, graphics);
        scene.restore();
        if let Err(e) = &result {
            error!("{} export failed: {}", self.options.format.extension(), e);
        }
        result
    }

    fn render_background(&self, scene: &mut dyn Scene) -> Result<Option<ImageData>, ExportError> {
        if !(self.options.rasterize_3d && scene.has_raster_content()) {
            return Ok(None);
        }
        scene.prepare(ExportPhase::Background);
        let image = scene.rasterize()?;
        debug!("Background raster is {}x{}", image.width, image.height);
        Ok(Some(image))
    }

    fn render_documents(
        &self,
        scene: &mut dyn Scene,
        canvas: Size,
        graphics: &str,
    ) -> Result<Vec<ExportOutput>, ExportError> {
        let background = self.render_background(scene)?;
        let phase = if background.is_some() { ExportPhase::Capture } else { ExportPhase::CaptureAll };

        let mut outputs = Vec::new();
        for format in self.documents() {
            scene.prepare(phase);
            let mut ctx = ExportContext::new(self.device(format, canvas, graphics), scene.projector(), &self.options);
            ctx.device().begin()?;
            if self.options.draw_background {
                if let Some(color) = scene.background_color() {
                    ctx.device().fill_background(color)?;
                }
            }
            if let Some(image) = &background {
                ctx.device().draw_image(Rect::new(0.0, 0.0, canvas.width, canvas.height), image)?;
            }
            scene.render(&mut ctx)?;
            let bytes = ctx.finish()?;
            debug!("Rendered {} document, {} bytes", format.extension(), bytes.len());
            outputs.push(ExportOutput { format, bytes });
        }
        Ok(outputs)
    }

    /// Renders and writes the documents. The main document goes to `path`;
    /// a TeX companion goes next to it with an `.eps` extension.
    pub fn export(&self, scene: &mut dyn Scene, path: &Path) -> Result<Vec<PathBuf>, ExportError> {
        if path.as_os_str().is_empty() {
            return Err(ExportError::MissingOutputPath);
        }
        let companion = path.with_extension(OutputFormat::Eps.extension());
        if self.options.format == OutputFormat::Tex && companion == path {
            return Err(ExportError::Config(format!("{} would overwrite its own graphics file", path.display())));
        }
        let graphics = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default();

        let outputs = self.render(scene, &graphics)?;
        let mut written = Vec::with_capacity(outputs.len());
        for output in outputs {
            let target = if output.format == self.options.format { path.to_path_buf() } else { companion.clone() };
            if let Err(e) = fs::write(&target, &output.bytes) {
                remove_written(&written);
                return Err(e.into());
            }
            info!("Wrote {} ({} bytes)", target.display(), output.bytes.len());
            written.push(target);
        }
        Ok(written)
    }
}

/// Removes the documents of a partly written export.
fn remove_written(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => debug!("Removed {} after a failed export", path.display()),
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexport_types::{Color, Point2};

    /// Records the phases it was prepared for; raster content is optional.
    #[derive(Default)]
    struct RecordingScene {
        raster: bool,
        fail_render: bool,
        phases: Vec<ExportPhase>,
        restored: usize,
    }

    impl Scene for RecordingScene {
        fn canvas(&self) -> Size {
            Size::new(40.0, 20.0)
        }

        fn is_empty(&self) -> bool {
            false
        }

        fn has_raster_content(&self) -> bool {
            self.raster
        }

        fn background_color(&self) -> Option<Color> {
            Some(Color::rgb(0, 0, 255))
        }

        fn prepare(&mut self, phase: ExportPhase) {
            self.phases.push(phase);
        }

        fn restore(&mut self) {
            self.restored += 1;
        }

        fn rasterize(&mut self) -> Result<ImageData, ExportError> {
            Ok(ImageData::rgb(1, 1, vec![0, 255, 0]))
        }

        fn render(&mut self, ctx: &mut ExportContext) -> Result<(), ExportError> {
            if self.fail_render {
                return Err(ExportError::Scene("render failed".into()));
            }
            ctx.device().draw_string(Point2::new(5.0, 5.0), "hello")?;
            Ok(())
        }
    }

    fn exporter(format: OutputFormat) -> Exporter {
        Exporter::new(ExportOptions { format, compress: false, ..ExportOptions::default() })
    }

    #[test]
    fn test_tex_renders_companion_first() {
        let mut scene = RecordingScene::default();
        let outputs = exporter(OutputFormat::Tex).render(&mut scene, "figure").unwrap();
        let formats: Vec<_> = outputs.iter().map(|o| o.format).collect();
        assert_eq!(formats, vec![OutputFormat::Eps, OutputFormat::Tex]);

        let eps = String::from_utf8_lossy(&outputs[0].bytes);
        assert!(eps.starts_with("%!PS-Adobe-3.0 EPSF-3.0"));
        assert!(!eps.contains("(hello)"));
        let tex = String::from_utf8_lossy(&outputs[1].bytes);
        assert!(tex.contains("\\includegraphics{figure}"));
        assert!(tex.contains("hello"));
        assert_eq!(scene.restored, 1);
    }

    #[test]
    fn test_background_phase_only_when_requested() {
        let mut scene = RecordingScene { raster: true, ..RecordingScene::default() };
        exporter(OutputFormat::Svg).render(&mut scene, "").unwrap();
        assert_eq!(scene.phases, vec![ExportPhase::CaptureAll]);

        let mut scene = RecordingScene { raster: true, ..RecordingScene::default() };
        let exporter = Exporter::new(ExportOptions { format: OutputFormat::Svg, rasterize_3d: true, ..ExportOptions::default() });
        let outputs = exporter.render(&mut scene, "").unwrap();
        assert_eq!(scene.phases, vec![ExportPhase::Background, ExportPhase::Capture]);
        let svg = String::from_utf8_lossy(&outputs[0].bytes);
        assert!(svg.contains("data:image/png;base64,"));
    }

    #[test]
    fn test_failed_render_still_restores() {
        let mut scene = RecordingScene { fail_render: true, ..RecordingScene::default() };
        let err = exporter(OutputFormat::Pdf).render(&mut scene, "").unwrap_err();
        assert!(matches!(err, ExportError::Scene(_)));
        assert_eq!(scene.restored, 1);
    }

    #[test]
    fn test_invalid_options_fail_before_rendering() {
        let mut scene = RecordingScene::default();
        let exporter = Exporter::new(ExportOptions { line_width_factor: 0.0, ..ExportOptions::default() });
        assert!(exporter.render(&mut scene, "").unwrap_err().is_config());
        assert!(scene.phases.is_empty());
    }

    #[test]
    fn test_missing_path() {
        let mut scene = RecordingScene::default();
        let err = exporter(OutputFormat::Pdf).export(&mut scene, Path::new("")).unwrap_err();
        assert!(matches!(err, ExportError::MissingOutputPath));
        assert!(scene.phases.is_empty());
    }
}
