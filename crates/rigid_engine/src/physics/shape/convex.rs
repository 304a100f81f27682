//! Closed-form queries for the primitive convex shapes
//!
//! All primitives are centred on the shape origin. Capsules and cylinders run
//! along the shape X axis with `half_height` measured to the end of the
//! straight section.

use crate::foundation::math::{utils, Vec3};
use crate::physics::primitives::Segment;

const EPSILON: f32 = 1.0e-6;

/// Side count of the prism standing in for a cylinder when slicing
pub(crate) const CYLINDER_SLICE_SEGMENTS: usize = 16;

fn sign(value: f32) -> f32 {
    if value >= 0.0 { 1.0 } else { -1.0 }
}

/// Unit direction of the radial part of `dir` around the X axis
fn radial(dir: &Vec3) -> Vec3 {
    utils::try_normalize(&Vec3::new(0.0, dir.y, dir.z)).unwrap_or_else(Vec3::zeros)
}

/// Smaller root of `a t^2 + b t + c`
fn entry_root(a: f32, b: f32, c: f32) -> Option<f32> {
    if a < EPSILON {
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    Some((-b - disc.sqrt()) / (2.0 * a))
}

fn in_unit(t: f32) -> bool {
    (0.0..=1.0).contains(&t)
}

pub(crate) fn sphere_support(radius: f32, dir: &Vec3) -> Vec3 {
    utils::try_normalize(dir).unwrap_or_else(Vec3::x) * radius
}

/// Box corner along `dir`; the index packs the positive axes as bits
pub(crate) fn box_support(half: &Vec3, dir: &Vec3) -> (Vec3, usize) {
    let mut index = 0;
    let mut vertex = -half;
    for axis in 0..3 {
        if dir[axis] >= 0.0 {
            vertex[axis] = half[axis];
            index |= 1 << axis;
        }
    }
    (vertex, index)
}

pub(crate) fn capsule_support(radius: f32, half_height: f32, dir: &Vec3) -> Vec3 {
    Vec3::new(sign(dir.x) * half_height, 0.0, 0.0) + sphere_support(radius, dir)
}

pub(crate) fn cylinder_support(radius: f32, half_height: f32, dir: &Vec3) -> Vec3 {
    Vec3::new(sign(dir.x) * half_height, 0.0, 0.0) + radial(dir) * radius
}

pub(crate) fn box_special(half: &Vec3, dir: &Vec3, skin: f32) -> (Vec3, usize) {
    let (vertex, index) = box_support(half, dir);
    let eroded = vertex.zip_map(half, |v, h| sign(v) * (h - skin.min(h)));
    (eroded, index)
}

pub(crate) fn box_project(half: &Vec3, point: &Vec3, dir: &Vec3, skin: f32) -> Vec3 {
    let inflate = half.zip_map(dir, |h, d| sign(d) * skin.min(h));
    point + inflate
}

pub(crate) fn cylinder_special(radius: f32, half_height: f32, dir: &Vec3, skin: f32) -> Vec3 {
    Vec3::new(sign(dir.x) * (half_height - skin.min(half_height)), 0.0, 0.0)
        + radial(dir) * (radius - skin.min(radius))
}

pub(crate) fn cylinder_project(radius: f32, half_height: f32, point: &Vec3, dir: &Vec3, skin: f32) -> Vec3 {
    point
        + Vec3::new(sign(dir.x) * skin.min(half_height), 0.0, 0.0)
        + radial(dir) * skin.min(radius)
}

pub(crate) fn sphere_contains(radius: f32, point: &Vec3) -> bool {
    point.norm_squared() < radius * radius
}

pub(crate) fn box_contains(half: &Vec3, point: &Vec3) -> bool {
    (0..3).all(|i| point[i].abs() < half[i])
}

pub(crate) fn capsule_contains(radius: f32, half_height: f32, point: &Vec3) -> bool {
    let x = point.x.clamp(-half_height, half_height);
    (point - Vec3::new(x, 0.0, 0.0)).norm_squared() < radius * radius
}

pub(crate) fn cylinder_contains(radius: f32, half_height: f32, point: &Vec3) -> bool {
    point.x.abs() < half_height && point.y * point.y + point.z * point.z < radius * radius
}

fn sphere_entry_at(center: &Vec3, radius: f32, segment: &Segment) -> Option<(f32, Vec3)> {
    let d = segment.delta();
    let p = segment.p0 - center;
    let t = entry_root(d.dot(&d), 2.0 * p.dot(&d), p.dot(&p) - radius * radius)?;
    in_unit(t).then(|| (t, (segment.point_at(t) - center).normalize()))
}

/// Hit on the side wall of the infinite X-axis cylinder, bounded to `|x| <= half_height`
fn lateral_entry(radius: f32, half_height: f32, segment: &Segment) -> Option<(f32, Vec3)> {
    let d = segment.delta();
    let p = segment.p0;
    let a = d.y * d.y + d.z * d.z;
    let b = 2.0 * (p.y * d.y + p.z * d.z);
    let c = p.y * p.y + p.z * p.z - radius * radius;
    let t = entry_root(a, b, c)?;
    if !in_unit(t) {
        return None;
    }
    let hit = segment.point_at(t);
    (hit.x.abs() <= half_height).then(|| (t, radial(&hit)))
}

fn nearest(hits: impl IntoIterator<Item = Option<(f32, Vec3)>>) -> Option<(f32, Vec3)> {
    hits.into_iter().flatten().min_by(|a, b| a.0.total_cmp(&b.0))
}

pub(crate) fn sphere_entry(radius: f32, segment: &Segment) -> Option<(f32, Vec3)> {
    sphere_entry_at(&Vec3::zeros(), radius, segment)
}

/// Slab test; the normal is the face of the last slab entered
pub(crate) fn box_entry(half: &Vec3, segment: &Segment) -> Option<(f32, Vec3)> {
    let d = segment.delta();
    let p = segment.p0;
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = Vec3::zeros();

    for axis in 0..3 {
        if d[axis].abs() < EPSILON {
            if p[axis].abs() > half[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d[axis];
        let t1 = (-half[axis] - p[axis]) * inv;
        let t2 = (half[axis] - p[axis]) * inv;
        let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
        if near > t_enter {
            t_enter = near;
            normal = Vec3::zeros();
            normal[axis] = -sign(d[axis]);
        }
        t_exit = t_exit.min(far);
    }

    (t_enter <= t_exit && in_unit(t_enter)).then_some((t_enter, normal))
}

pub(crate) fn capsule_entry(radius: f32, half_height: f32, segment: &Segment) -> Option<(f32, Vec3)> {
    let end = Vec3::new(half_height, 0.0, 0.0);
    nearest([
        lateral_entry(radius, half_height, segment),
        sphere_entry_at(&end, radius, segment),
        sphere_entry_at(&-end, radius, segment),
    ])
}

pub(crate) fn cylinder_entry(radius: f32, half_height: f32, segment: &Segment) -> Option<(f32, Vec3)> {
    let d = segment.delta();
    let cap = |side: f32| {
        if d.x.abs() < EPSILON {
            return None;
        }
        let t = (side * half_height - segment.p0.x) / d.x;
        let hit = segment.point_at(t);
        (in_unit(t) && hit.y * hit.y + hit.z * hit.z <= radius * radius)
            .then(|| (t, Vec3::new(side, 0.0, 0.0)))
    };
    nearest([lateral_entry(radius, half_height, segment), cap(1.0), cap(-1.0)])
}

/// Corners of a box, index bits select the positive axes
pub(crate) fn box_vertices(half: &Vec3) -> Vec<Vec3> {
    (0..8).map(|i| box_support(half, &Vec3::new(
        if i & 1 == 0 { -1.0 } else { 1.0 },
        if i & 2 == 0 { -1.0 } else { 1.0 },
        if i & 4 == 0 { -1.0 } else { 1.0 },
    )).0).collect()
}

/// The twelve box edges as vertex index pairs
pub(crate) fn box_edges() -> Vec<(u32, u32)> {
    let mut edges = Vec::with_capacity(12);
    for i in 0..8u32 {
        for bit in [1, 2, 4] {
            if i & bit == 0 {
                edges.push((i, i | bit));
            }
        }
    }
    edges
}

/// Prism approximation of a cylinder: vertices and edges
pub(crate) fn cylinder_prism(radius: f32, half_height: f32) -> (Vec<Vec3>, Vec<(u32, u32)>) {
    let n = CYLINDER_SLICE_SEGMENTS;
    let mut vertices = Vec::with_capacity(2 * n);
    for side in [-half_height, half_height] {
        for k in 0..n {
            let angle = crate::foundation::math::constants::TAU * k as f32 / n as f32;
            vertices.push(Vec3::new(side, radius * angle.cos(), radius * angle.sin()));
        }
    }
    let mut edges = Vec::with_capacity(3 * n);
    for k in 0..n as u32 {
        let next = (k + 1) % n as u32;
        edges.push((k, next));
        edges.push((k + n as u32, next + n as u32));
        edges.push((k, k + n as u32));
    }
    (vertices, edges)
}

/// Cross-section of a polyhedron with the plane `normal . x = offset`.
///
/// The returned polygon is ordered counter-clockwise around `normal`.
pub(crate) fn slice_polyhedron(vertices: &[Vec3], edges: &[(u32, u32)], normal: &Vec3, offset: f32) -> Vec<Vec3> {
    const PLANE_TOLERANCE: f32 = 1.0e-5;

    let dist = |v: &Vec3| normal.dot(v) - offset;
    let mut points: Vec<Vec3> = vertices
        .iter()
        .filter(|v| dist(v).abs() <= PLANE_TOLERANCE)
        .copied()
        .collect();

    for &(a, b) in edges {
        let (va, vb) = (vertices[a as usize], vertices[b as usize]);
        let (da, db) = (dist(&va), dist(&vb));
        if (da > PLANE_TOLERANCE && db < -PLANE_TOLERANCE) || (da < -PLANE_TOLERANCE && db > PLANE_TOLERANCE) {
            points.push(va + (vb - va) * (da / (da - db)));
        }
    }

    let mut unique: Vec<Vec3> = Vec::with_capacity(points.len());
    for p in points {
        if !unique.iter().any(|q| (q - p).norm_squared() < 1.0e-10) {
            unique.push(p);
        }
    }
    sort_around(&mut unique, normal);
    unique
}

/// Order coplanar points by angle around their centroid
pub(crate) fn sort_around(points: &mut [Vec3], normal: &Vec3) {
    if points.len() < 3 {
        return;
    }
    let centroid: Vec3 = points.iter().sum::<Vec3>() / points.len() as f32;
    let u = utils::any_perpendicular(normal);
    let v = normal.cross(&u);
    let angle = |p: &Vec3| {
        let r = p - centroid;
        r.dot(&v).atan2(r.dot(&u))
    };
    points.sort_by(|a, b| angle(a).total_cmp(&angle(b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_capsule_entry_hits_cap_and_side() {
        // straight down onto the cap
        let seg = Segment::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 0.0));
        let (t, n) = capsule_entry(1.0, 2.0, &seg).unwrap();
        assert_relative_eq!(t, 0.4, epsilon = 1e-5);
        assert_relative_eq!(n, Vec3::x(), epsilon = 1e-5);

        // side wall
        let seg = Segment::new(Vec3::new(0.5, 4.0, 0.0), Vec3::new(0.5, 0.0, 0.0));
        let (t, n) = capsule_entry(1.0, 2.0, &seg).unwrap();
        assert_relative_eq!(t, 0.75, epsilon = 1e-5);
        assert_relative_eq!(n, Vec3::y(), epsilon = 1e-5);
    }

    #[test]
    fn test_cylinder_entry_cap() {
        let seg = Segment::new(Vec3::new(-3.0, 0.2, 0.1), Vec3::new(3.0, 0.2, 0.1));
        let (t, n) = cylinder_entry(1.0, 1.0, &seg).unwrap();
        assert_relative_eq!(t, 1.0 / 3.0, epsilon = 1e-5);
        assert_relative_eq!(n, -Vec3::x(), epsilon = 1e-5);
    }

    #[test]
    fn test_box_entry_parallel_miss() {
        let half = Vec3::repeat(1.0);
        let seg = Segment::new(Vec3::new(-3.0, 2.0, 0.0), Vec3::new(3.0, 2.0, 0.0));
        assert!(box_entry(&half, &seg).is_none());
    }

    #[test]
    fn test_box_slice_is_square() {
        let half = Vec3::repeat(1.0);
        let polygon = slice_polyhedron(&box_vertices(&half), &box_edges(), &Vec3::y(), 0.0);
        assert_eq!(polygon.len(), 4);
        for p in &polygon {
            assert_relative_eq!(p.y, 0.0, epsilon = 1e-6);
            assert_relative_eq!(p.x.abs(), 1.0, epsilon = 1e-6);
            assert_relative_eq!(p.z.abs(), 1.0, epsilon = 1e-6);
        }
        // consecutive corners share an edge of the square
        for k in 0..4 {
            let edge = polygon[(k + 1) % 4] - polygon[k];
            assert_relative_eq!(edge.norm(), 2.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_special_support_round_trips_box_vertex() {
        let half = Vec3::new(1.0, 2.0, 3.0);
        let dir = Vec3::new(0.3, -0.2, 0.9);
        let (eroded, index) = box_special(&half, &dir, 0.1);
        assert_eq!(index, 0b101);
        assert_relative_eq!(box_project(&half, &eroded, &dir, 0.1), box_support(&half, &dir).0, epsilon = 1e-6);
    }
}
