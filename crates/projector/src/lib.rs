//! # vexport-projector
//!
//! Maps points between world, clip, normalized-device and device (pixel) space so that
//! captured geometry lands exactly where the rasterizer would have put it.
//!
//! Forward:
//! `clip = Projection · ModelView · (Actor) · p`, `ndc = clip / clip.w`,
//! `device.x = (ndc.x + 1)·w/2 + origin.x`, `device.y = (ndc.y + 1)·h/2 + origin.y`,
//! `device.z = ndc.z·zFactor1 + zFactor2`.
//!
//! The inverse undoes each step, recovering `w` before applying the inverse transform.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vexport_types::{Matrix4, Vec3};

const W_EPSILON: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectError {
    #[error("clip-space w is zero; point lies on the camera plane")]
    ZeroW,

    #[error("composite transform is singular and cannot be inverted")]
    SingularTransform,

    #[error("viewport or depth range is degenerate: {0}")]
    DegenerateViewport(String),
}

/// Pixel rectangle the NDC square maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    fn half_extents(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// Window depth range NDC z is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthRange {
    pub min: f64,
    pub max: f64,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl DepthRange {
    pub fn z_factors(&self) -> (f64, f64) {
        ((self.max - self.min) / 2.0, (self.max + self.min) / 2.0)
    }
}

#[derive(Debug, Clone)]
pub struct Projector {
    projection: Matrix4,
    model_view: Matrix4,
    viewport: Viewport,
    depth: DepthRange,
    composite: Matrix4,
}

impl Projector {
    pub fn new(projection: Matrix4, model_view: Matrix4, viewport: Viewport) -> Self {
        Self {
            projection,
            model_view,
            viewport,
            depth: DepthRange::default(),
            composite: projection * model_view,
        }
    }

    /// A projector whose world space already is NDC.
    pub fn identity(viewport: Viewport) -> Self {
        Self::new(Matrix4::IDENTITY, Matrix4::IDENTITY, viewport)
    }

    pub fn with_depth_range(mut self, depth: DepthRange) -> Self {
        self.depth = depth;
        self
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn depth_range(&self) -> &DepthRange {
        &self.depth
    }

    pub fn projection(&self) -> &Matrix4 {
        &self.projection
    }

    pub fn model_view(&self) -> &Matrix4 {
        &self.model_view
    }

    pub fn set_model_view(&mut self, model_view: Matrix4) {
        self.model_view = model_view;
        self.composite = self.projection * model_view;
    }

    pub fn set_projection(&mut self, projection: Matrix4) {
        self.projection = projection;
        self.composite = projection * self.model_view;
    }

    fn transform_for(&self, actor: Option<&Matrix4>) -> Matrix4 {
        match actor {
            Some(a) => self.composite * *a,
            None => self.composite,
        }
    }

    /// World (or object, with `actor`) point to device space.
    pub fn project(&self, p: Vec3, actor: Option<&Matrix4>) -> Result<Vec3, ProjectError> {
        let clip = self.transform_for(actor).transform_point(p);
        self.project_clip(clip)
    }

    /// Clip-space point to device space.
    pub fn project_clip(&self, clip: [f64; 4]) -> Result<Vec3, ProjectError> {
        let w = clip[3];
        if w.abs() < W_EPSILON {
            return Err(ProjectError::ZeroW);
        }
        let ndc = [clip[0] / w, clip[1] / w, clip[2] / w];
        Ok(self.ndc_to_device(ndc))
    }

    pub fn ndc_to_device(&self, ndc: [f64; 3]) -> Vec3 {
        let (hw, hh) = self.viewport.half_extents();
        let (zf1, zf2) = self.depth.z_factors();
        Vec3::new(
            (ndc[0] + 1.0) * hw + self.viewport.x,
            (ndc[1] + 1.0) * hh + self.viewport.y,
            ndc[2] * zf1 + zf2,
        )
    }

    pub fn device_to_ndc(&self, d: Vec3) -> Result<[f64; 3], ProjectError> {
        let (hw, hh) = self.viewport.half_extents();
        let (zf1, zf2) = self.depth.z_factors();
        if hw == 0.0 || hh == 0.0 {
            return Err(ProjectError::DegenerateViewport(format!(
                "{}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        if zf1 == 0.0 {
            return Err(ProjectError::DegenerateViewport(format!(
                "depth range [{}, {}]",
                self.depth.min, self.depth.max
            )));
        }
        Ok([
            (d.x - self.viewport.x) / hw - 1.0,
            (d.y - self.viewport.y) / hh - 1.0,
            (d.z - zf2) / zf1,
        ])
    }

    /// Device point back to clip space given the inverse composite transform.
    fn device_to_clip(&self, inverse: &Matrix4, d: Vec3) -> Result<[f64; 4], ProjectError> {
        let ndc = self.device_to_ndc(d)?;
        let h = inverse.transform_homogeneous([ndc[0], ndc[1], ndc[2], 1.0]);
        if h[3].abs() < W_EPSILON {
            return Err(ProjectError::ZeroW);
        }
        let w = 1.0 / h[3];
        Ok([ndc[0] * w, ndc[1] * w, ndc[2] * w, w])
    }

    fn inverse_for(&self, actor: Option<&Matrix4>) -> Result<Matrix4, ProjectError> {
        self.transform_for(actor).inverse().ok_or(ProjectError::SingularTransform)
    }

    /// Device point back to clip space, recovering `w` through the inverse transform.
    pub fn unproject_to_clip(&self, d: Vec3, actor: Option<&Matrix4>) -> Result<[f64; 4], ProjectError> {
        self.device_to_clip(&self.inverse_for(actor)?, d)
    }

    /// Exact inverse of [`Projector::project`].
    pub fn unproject(&self, d: Vec3, actor: Option<&Matrix4>) -> Result<Vec3, ProjectError> {
        let inverse = self.inverse_for(actor)?;
        let p = inverse.transform_homogeneous(self.device_to_clip(&inverse, d)?);
        Ok(Vec3::new(p[0], p[1], p[2]))
    }

    /// Projects every point in place. Stops at the first failure.
    pub fn project_points(&self, points: &mut [Vec3], actor: Option<&Matrix4>) -> Result<(), ProjectError> {
        let m = self.transform_for(actor);
        for p in points.iter_mut() {
            *p = self.project_clip(m.transform_point(*p))?;
        }
        Ok(())
    }

    /// Unprojects every point in place. Stops at the first failure.
    pub fn unproject_points(&self, points: &mut [Vec3], actor: Option<&Matrix4>) -> Result<(), ProjectError> {
        let inverse = self.inverse_for(actor)?;
        for p in points.iter_mut() {
            let q = inverse.transform_homogeneous(self.device_to_clip(&inverse, *p)?);
            *p = Vec3::new(q[0], q[1], q[2]);
        }
        Ok(())
    }
}
