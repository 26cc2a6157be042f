use log::debug;
use vexport_types::{Color, Vertex};

/// OpenGL-style line stipple: 16-bit on/off mask repeated `factor` pixels per bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stipple {
    pub pattern: u16,
    pub factor: u16,
}

/// A captured device-space primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Point { vertex: Vertex, size: f64 },
    Line { vertices: [Vertex; 2], width: f64, stipple: Option<Stipple> },
    Triangle { vertices: [Vertex; 3] },
    PolygonFan { vertices: Vec<Vertex> },
}

impl Primitive {
    pub fn vertices(&self) -> &[Vertex] {
        match self {
            Primitive::Point { vertex, .. } => std::slice::from_ref(vertex),
            Primitive::Line { vertices, .. } => vertices,
            Primitive::Triangle { vertices } => vertices,
            Primitive::PolygonFan { vertices } => vertices,
        }
    }

    pub fn vertices_mut(&mut self) -> &mut [Vertex] {
        match self {
            Primitive::Point { vertex, .. } => std::slice::from_mut(vertex),
            Primitive::Line { vertices, .. } => vertices,
            Primitive::Triangle { vertices } => vertices,
            Primitive::PolygonFan { vertices } => vertices,
        }
    }

    /// The shared color when every vertex has the same one.
    pub fn uniform_color(&self) -> Option<Color> {
        let mut iter = self.vertices().iter().map(|v| v.color);
        let first = iter.next()?;
        iter.all(|c| c == first).then_some(first)
    }

    /// Mean device z of the vertices; `0.0` for a vertexless fan.
    pub fn average_depth(&self) -> f64 {
        let vertices = self.vertices();
        if vertices.is_empty() {
            return 0.0;
        }
        vertices.iter().map(|v| v.position.z).sum::<f64>() / vertices.len() as f64
    }

    /// Splits a fan into triangles `(v0, vi, vi+1)`; triangles return themselves.
    pub fn triangles(&self) -> Vec<[Vertex; 3]> {
        match self {
            Primitive::Triangle { vertices } => vec![*vertices],
            Primitive::PolygonFan { vertices } if vertices.len() >= 3 => vertices[1..]
                .windows(2)
                .map(|pair| [vertices[0], pair[0], pair[1]])
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Receiver of captured primitives.
pub trait PrimitiveSink {
    fn accept(&mut self, primitive: Primitive);
}

impl PrimitiveSink for Vec<Primitive> {
    fn accept(&mut self, primitive: Primitive) {
        self.push(primitive);
    }
}

/// Primitive storage with a configured initial size that grows on overflow.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveBuffer {
    primitives: Vec<Primitive>,
    initial_capacity: usize,
    grown: bool,
}

impl PrimitiveBuffer {
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self { primitives: Vec::with_capacity(initial_capacity), initial_capacity, grown: false }
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn has_grown(&self) -> bool {
        self.grown
    }

    pub fn as_slice(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn into_vec(self) -> Vec<Primitive> {
        self.primitives
    }

    pub fn clear(&mut self) {
        self.primitives.clear();
    }
}

impl PrimitiveSink for PrimitiveBuffer {
    fn accept(&mut self, primitive: Primitive) {
        if !self.grown && self.primitives.len() == self.initial_capacity {
            debug!("Primitive buffer of {} entries overflowed; growing", self.initial_capacity);
            self.grown = true;
        }
        self.primitives.push(primitive);
    }
}
