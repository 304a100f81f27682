//! Compound shape: a list of convex child instances
//!
//! Every child carries its own placement, scale and material. Children are
//! placed in the compound's shape space through their local matrix and link
//! back to the compound through a weak parent reference.

use crate::foundation::math::Vec3;
use crate::physics::error::PhysicsError;
use crate::physics::primitives::Segment;
use crate::physics::shape::instance::ShapeInstance;
use crate::physics::shape::mass::VolumeMoments;

/// Children of a compound shape
#[derive(Debug, Clone, Default)]
pub struct Compound {
    children: Vec<ShapeInstance>,
}

impl Compound {
    /// Child instances in insertion order
    pub fn children(&self) -> &[ShapeInstance] {
        &self.children
    }

    pub(crate) fn push(&mut self, child: ShapeInstance) -> usize {
        self.children.push(child);
        self.children.len() - 1
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<ShapeInstance> {
        (index < self.children.len()).then(|| self.children.remove(index))
    }

    /// Farthest child support point; earlier children win ties
    pub(crate) fn support(&self, dir: &Vec3) -> Vec3 {
        let mut best = Vec3::zeros();
        let mut best_dist = f32::NEG_INFINITY;
        for child in &self.children {
            let p = child.support_in_parent(dir);
            let dist = p.dot(dir);
            if dist > best_dist {
                best = p;
                best_dist = dist;
            }
        }
        best
    }

    pub(crate) fn ray_cast(&self, segment: &Segment) -> Option<(f32, Vec3)> {
        self.children
            .iter()
            .filter_map(|child| child.ray_cast_in_parent(segment))
            .min_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// Union of the children's sections, child by child
    pub(crate) fn plane_section(&self, normal: &Vec3, offset: f32) -> Vec<Vec3> {
        self.children
            .iter()
            .flat_map(|child| child.plane_section_in_parent(normal, offset))
            .collect()
    }

    pub(crate) fn moments(&self) -> Result<VolumeMoments, PhysicsError> {
        if self.children.is_empty() {
            return Err(PhysicsError::UnsupportedShape("empty compound inertia"));
        }
        self.children.iter().try_fold(VolumeMoments::zero(), |acc, child| {
            Ok(acc.combined(&child.moments_in_parent()?))
        })
    }

    pub(crate) fn obb(&self) -> (Vec3, Vec3) {
        if self.children.is_empty() {
            return (Vec3::zeros(), Vec3::zeros());
        }
        let mut min = Vec3::repeat(f32::MAX);
        let mut max = Vec3::repeat(f32::MIN);
        for axis in 0..3 {
            let mut dir = Vec3::zeros();
            dir[axis] = 1.0;
            max[axis] = self.support(&dir)[axis];
            min[axis] = self.support(&-dir)[axis];
        }
        ((min + max) * 0.5, (max - min) * 0.5)
    }
}
