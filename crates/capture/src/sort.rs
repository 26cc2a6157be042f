//! Back-to-front ordering of captured primitives.
//!
//! Flat vector formats have no depth buffer; later primitives simply paint over
//! earlier ones. `Simple` orders by mean depth, `Bsp` builds a binary space
//! partition, splitting primitives that straddle a plane, and traverses it from
//! the viewer's far side.

use crate::primitive::Primitive;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use vexport_types::{Color, Vec3, Vertex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    /// Capture order.
    None,
    #[default]
    Simple,
    Bsp,
}

/// Orders primitives so that painting them in sequence reproduces depth testing.
pub fn sort_primitives(primitives: Vec<Primitive>, mode: SortMode) -> Vec<Primitive> {
    match mode {
        SortMode::None => primitives,
        SortMode::Simple => simple_sort(primitives),
        SortMode::Bsp => bsp_sort(primitives),
    }
}

/// Larger device z is farther away and is painted first; ties keep capture order.
fn simple_sort(primitives: Vec<Primitive>) -> Vec<Primitive> {
    primitives
        .into_iter()
        .map(|p| (p.average_depth(), p))
        .sorted_by(|a, b| b.0.total_cmp(&a.0))
        .map(|(_, p)| p)
        .collect()
}

const Z_RANGE: f64 = 1000.0;
const EPSILON: f64 = 5e-3;
/// Viewer position in rescaled depth, on the near side of every primitive.
const EYE: Vec3 = Vec3::new(0.0, 0.0, -100.0 * Z_RANGE);

#[derive(Debug, Clone, Copy)]
struct Plane {
    normal: Vec3,
    d: f64,
}

impl Plane {
    fn through(normal: Vec3, point: Vec3) -> Self {
        let len = normal.length();
        let normal = if len > 0.0 { normal * (1.0 / len) } else { Vec3::new(0.0, 0.0, 1.0) };
        Plane { normal, d: -normal.dot(&point) }
    }

    fn distance(&self, p: &Vec3) -> f64 {
        self.normal.dot(p) + self.d
    }

    fn of(primitive: &Primitive) -> Plane {
        let v = primitive.vertices();
        match primitive {
            Primitive::Triangle { .. } | Primitive::PolygonFan { .. } if v.len() >= 3 => {
                let normal = (v[1].position - v[0].position).cross(&(v[2].position - v[0].position));
                Plane::through(normal, v[0].position)
            }
            Primitive::Line { vertices, .. } => {
                let dir = vertices[1].position - vertices[0].position;
                let axis = if dir.x.abs() < EPSILON {
                    Vec3::new(1.0, 0.0, 0.0)
                } else if dir.y.abs() < EPSILON {
                    Vec3::new(0.0, 1.0, 0.0)
                } else {
                    Vec3::new(0.0, 0.0, 1.0)
                };
                Plane::through(dir.cross(&axis), vertices[0].position)
            }
            _ => Plane::through(Vec3::new(0.0, 0.0, 1.0), v.first().map(|v| v.position).unwrap_or(Vec3::ZERO)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Coincident,
    Front,
    Back,
    Spanning,
}

fn classify(plane: &Plane, primitive: &Primitive) -> Side {
    let (mut front, mut back) = (false, false);
    for v in primitive.vertices() {
        let d = plane.distance(&v.position);
        front |= d > EPSILON;
        back |= d < -EPSILON;
    }
    match (front, back) {
        (false, false) => Side::Coincident,
        (true, false) => Side::Front,
        (false, true) => Side::Back,
        (true, true) => Side::Spanning,
    }
}

fn lerp_color(a: Color, b: Color, t: f64) -> Color {
    let l = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round().clamp(0.0, 255.0) as u8;
    Color::rgba(l(a.r, b.r), l(a.g, b.g), l(a.b, b.b), l(a.a, b.a))
}

fn intersect(a: &Vertex, b: &Vertex, da: f64, db: f64) -> Vertex {
    let t = da / (da - db);
    Vertex::new(a.position.lerp(&b.position, t), lerp_color(a.color, b.color, t))
}

fn polygon(vertices: Vec<Vertex>) -> Option<Primitive> {
    match vertices.len() {
        0..=2 => None,
        3 => Some(Primitive::Triangle { vertices: [vertices[0], vertices[1], vertices[2]] }),
        _ => Some(Primitive::PolygonFan { vertices }),
    }
}

/// Splits a spanning primitive into its front and back parts.
fn split(plane: &Plane, primitive: Primitive) -> (Vec<Primitive>, Vec<Primitive>) {
    match primitive {
        Primitive::Line { vertices: [a, b], width, stipple } => {
            let (da, db) = (plane.distance(&a.position), plane.distance(&b.position));
            let mid = intersect(&a, &b, da, db);
            let first = Primitive::Line { vertices: [a, mid], width, stipple };
            let second = Primitive::Line { vertices: [mid, b], width, stipple };
            if da > 0.0 { (vec![first], vec![second]) } else { (vec![second], vec![first]) }
        }
        Primitive::Triangle { .. } | Primitive::PolygonFan { .. } => {
            let vertices = primitive.vertices();
            let (mut front, mut back) = (Vec::new(), Vec::new());
            for (i, a) in vertices.iter().enumerate() {
                let b = &vertices[(i + 1) % vertices.len()];
                let (da, db) = (plane.distance(&a.position), plane.distance(&b.position));
                if da >= -EPSILON {
                    front.push(*a);
                }
                if da <= EPSILON {
                    back.push(*a);
                }
                if (da > EPSILON && db < -EPSILON) || (da < -EPSILON && db > EPSILON) {
                    let cut = intersect(a, b, da, db);
                    front.push(cut);
                    back.push(cut);
                }
            }
            (polygon(front).into_iter().collect(), polygon(back).into_iter().collect())
        }
        point @ Primitive::Point { .. } => (vec![point], Vec::new()),
    }
}

#[derive(Debug)]
struct Node {
    plane: Plane,
    primitives: Vec<Primitive>,
    front: Option<usize>,
    back: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Root,
    Front(usize),
    Back(usize),
}

/// Root choice: the first surface, falling back to the first primitive.
fn pick_root(primitives: &[Primitive]) -> usize {
    primitives
        .iter()
        .position(|p| matches!(p, Primitive::Triangle { .. } | Primitive::PolygonFan { .. }))
        .unwrap_or(0)
}

fn build(primitives: Vec<Primitive>) -> (Vec<Node>, Option<usize>) {
    let mut arena: Vec<Node> = Vec::new();
    let mut root = None;
    let mut work = vec![(primitives, Slot::Root)];
    let mut splits = 0usize;

    while let Some((mut list, slot)) = work.pop() {
        if list.is_empty() {
            continue;
        }
        let pivot = list.swap_remove(pick_root(&list));
        let plane = Plane::of(&pivot);
        let mut node = Node { plane, primitives: vec![pivot], front: None, back: None };
        let (mut front, mut back) = (Vec::new(), Vec::new());

        for primitive in list {
            match classify(&plane, &primitive) {
                Side::Coincident => node.primitives.push(primitive),
                Side::Front => front.push(primitive),
                Side::Back => back.push(primitive),
                Side::Spanning => {
                    splits += 1;
                    let (f, b) = split(&plane, primitive);
                    front.extend(f);
                    back.extend(b);
                }
            }
        }

        let index = arena.len();
        arena.push(node);
        match slot {
            Slot::Root => root = Some(index),
            Slot::Front(parent) => arena[parent].front = Some(index),
            Slot::Back(parent) => arena[parent].back = Some(index),
        }
        work.push((back, Slot::Back(index)));
        work.push((front, Slot::Front(index)));
    }

    debug!("BSP tree built with {} nodes, {} primitives split", arena.len(), splits);
    (arena, root)
}

enum Step {
    Visit(Option<usize>),
    Emit(usize),
}

fn traverse(mut arena: Vec<Node>, root: Option<usize>) -> Vec<Primitive> {
    let mut out = Vec::new();
    let mut stack = vec![Step::Visit(root)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Visit(None) => {}
            Step::Visit(Some(i)) => {
                let node = &arena[i];
                let side = node.plane.distance(&EYE);
                // Pushed in reverse of paint order.
                if side > EPSILON {
                    stack.extend([Step::Visit(node.front), Step::Emit(i), Step::Visit(node.back)]);
                } else if side < -EPSILON {
                    stack.extend([Step::Visit(node.back), Step::Emit(i), Step::Visit(node.front)]);
                } else {
                    // Seen edge-on: the node's own primitives are invisible.
                    stack.extend([Step::Visit(node.back), Step::Visit(node.front)]);
                }
            }
            Step::Emit(i) => out.append(&mut arena[i].primitives),
        }
    }
    out
}

fn bsp_sort(mut primitives: Vec<Primitive>) -> Vec<Primitive> {
    if primitives.len() < 2 {
        return primitives;
    }

    let (min, max) = primitives
        .iter()
        .flat_map(|p| p.vertices().iter().map(|v| v.position.z))
        .minmax()
        .into_option()
        .unwrap_or((0.0, 0.0));
    let scale = if max - min > 0.0 { Z_RANGE / (max - min) } else { 1.0 };

    for p in primitives.iter_mut() {
        for v in p.vertices_mut() {
            v.position.z = (v.position.z - min) * scale;
        }
    }

    let (arena, root) = build(primitives);
    let mut sorted = traverse(arena, root);

    for p in sorted.iter_mut() {
        for v in p.vertices_mut() {
            v.position.z = v.position.z / scale + min;
        }
    }
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(z: f64, color: Color) -> Primitive {
        Primitive::Triangle {
            vertices: [
                Vertex::at(0.0, 0.0, z, color),
                Vertex::at(10.0, 0.0, z, color),
                Vertex::at(0.0, 10.0, z, color),
            ],
        }
    }

    const NEAR: Color = Color::rgb(255, 0, 0);
    const FAR: Color = Color::rgb(0, 0, 255);

    #[test]
    fn test_simple_sort_paints_far_first_and_is_stable() {
        let a = triangle(0.5, Color::rgb(1, 1, 1));
        let b = triangle(0.5, Color::rgb(2, 2, 2));
        let sorted = sort_primitives(vec![triangle(0.1, NEAR), a.clone(), triangle(0.9, FAR), b.clone()], SortMode::Simple);
        assert_eq!(sorted[0].uniform_color(), Some(FAR));
        assert_eq!(sorted[1], a);
        assert_eq!(sorted[2], b);
        assert_eq!(sorted[3].uniform_color(), Some(NEAR));
    }

    #[test]
    fn test_none_keeps_capture_order() {
        let input = vec![triangle(0.1, NEAR), triangle(0.9, FAR)];
        assert_eq!(sort_primitives(input.clone(), SortMode::None), input);
    }

    #[test]
    fn test_bsp_orders_parallel_planes_either_winding() {
        let mut reversed = triangle(0.1, NEAR);
        reversed.vertices_mut().swap(1, 2);
        for near in [triangle(0.1, NEAR), reversed] {
            let sorted = sort_primitives(vec![near, triangle(0.9, FAR)], SortMode::Bsp);
            let colors: Vec<_> = sorted.iter().map(|p| p.uniform_color()).collect();
            assert_eq!(colors, vec![Some(FAR), Some(NEAR)]);
            // Depths are restored after rescaling.
            assert!((sorted[0].average_depth() - 0.9).abs() < 1e-9);
            assert!((sorted[1].average_depth() - 0.1).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bsp_splits_spanning_triangle() {
        // A wall in the x = 5 plane crossing a floor triangle lying at constant z.
        let wall = Primitive::Triangle {
            vertices: [
                Vertex::at(5.0, 0.0, 0.0, NEAR),
                Vertex::at(5.0, 10.0, 0.0, NEAR),
                Vertex::at(5.0, 0.0, 1.0, NEAR),
            ],
        };
        let floor = Primitive::Triangle {
            vertices: [
                Vertex::at(0.0, 0.0, 0.5, FAR),
                Vertex::at(10.0, 0.0, 0.5, FAR),
                Vertex::at(0.0, 10.0, 0.5, FAR),
            ],
        };
        let sorted = sort_primitives(vec![wall, floor], SortMode::Bsp);
        let floor_parts: Vec<_> = sorted.iter().filter(|p| p.uniform_color() == Some(FAR)).collect();
        assert_eq!(floor_parts.len(), 2);
        for part in floor_parts {
            assert!(part.vertices().iter().all(|v| (v.position.z - 0.5).abs() < 1e-9));
        }
    }

    #[test]
    fn test_split_line_keeps_style() {
        let plane = Plane::through(Vec3::new(1.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0));
        let line = Primitive::Line {
            vertices: [Vertex::at(0.0, 0.0, 0.0, Color::BLACK), Vertex::at(10.0, 0.0, 0.0, Color::WHITE)],
            width: 2.0,
            stipple: None,
        };
        assert_eq!(classify(&plane, &line), Side::Spanning);
        let (front, back) = split(&plane, line);
        let Primitive::Line { vertices, width, .. } = &front[0] else { panic!("expected line") };
        assert_eq!(*width, 2.0);
        assert_eq!(vertices[0].position, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(vertices[1].color, Color::WHITE);
        assert_eq!(back[0].vertices()[0].color, Color::BLACK);
    }
}
