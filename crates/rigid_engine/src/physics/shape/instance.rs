//! Shape instance: a shared shape placed, scaled and given a material
//!
//! The instance maps shape space into its parent frame through
//! `local_matrix * diag(scale) * alignment`, and the parent frame into world
//! space through the owning body's matrix. Every query picks a fast path from
//! the scale type; unit scale never touches scale math.

use crate::debug::ShapeDebugNotify;
use crate::foundation::collections::BodyHandle;
use crate::foundation::math::{constants::TAU, utils, Affine, Mat3, Transform, Vec3};
use crate::physics::error::PhysicsError;
use crate::physics::primitives::{Aabb, Segment, ShapeRayHit, BOX_PADDING};
use crate::physics::shape::mass::{MassProperties, VolumeMoments};
use crate::physics::shape::material::ShapeMaterial;
use crate::physics::shape::scale::{polar_decompose, ScaleEnvelope, ScaleType};
use crate::physics::shape::{Shape, ShapeKind, SharedShape, WeakShape};

/// Contact skin given to new instances
pub const DEFAULT_SKIN_MARGIN: f32 = 1.0 / 64.0;

/// Latitude rings used to outline curved shapes
const DEBUG_RINGS: usize = 8;
/// Longitude segments used to outline curved shapes
const DEBUG_SEGMENTS: usize = 16;

/// Summary of an instance for tools and editors
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeInfo {
    /// Shape discriminant
    pub kind: ShapeKind,
    /// Unscaled half size of the shape's bounding box
    pub dimensions: Vec3,
    /// Discrete vertex count
    pub vertex_count: usize,
    /// Compound child count
    pub child_count: usize,
    /// Instance scale
    pub scale: Vec3,
    /// Instance scale type
    pub scale_type: ScaleType,
    /// Placement in the parent frame
    pub local_matrix: Transform,
    /// Material user id
    pub user_id: u64,
    /// Whether the instance generates contacts
    pub collision_mode: bool,
}

/// A shared shape with placement, scale envelope and material
#[derive(Debug)]
pub struct ShapeInstance {
    shape: SharedShape,
    local_matrix: Transform,
    global_matrix: Transform,
    envelope: ScaleEnvelope,
    material: ShapeMaterial,
    parent: Option<WeakShape>,
    owner_body: Option<BodyHandle>,
    collision_mode: bool,
    skin_margin: f32,
}

impl Clone for ShapeInstance {
    /// Copies share the shape but belong to no body or compound
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            local_matrix: self.local_matrix,
            global_matrix: self.global_matrix,
            envelope: self.envelope,
            material: self.material,
            parent: None,
            owner_body: None,
            collision_mode: self.collision_mode,
            skin_margin: self.skin_margin,
        }
    }
}

impl ShapeInstance {
    /// Instance of `shape` at the identity with unit scale
    pub fn new(shape: SharedShape) -> Self {
        Self {
            shape,
            local_matrix: Transform::identity(),
            global_matrix: Transform::identity(),
            envelope: ScaleEnvelope::unit(),
            material: ShapeMaterial::default(),
            parent: None,
            owner_body: None,
            collision_mode: true,
            skin_margin: DEFAULT_SKIN_MARGIN,
        }
    }

    /// Copy of `other` that uses a different shape
    pub fn with_shape(other: &ShapeInstance, shape: SharedShape) -> Self {
        Self {
            shape,
            ..other.clone()
        }
    }

    /// The shared shape
    pub fn shape(&self) -> &SharedShape {
        &self.shape
    }

    /// Placement in the parent frame
    pub fn local_matrix(&self) -> &Transform {
        &self.local_matrix
    }

    /// Set the placement in the parent frame
    pub fn set_local_matrix(&mut self, matrix: Transform) {
        self.local_matrix = matrix;
    }

    /// `body * local * alignment`, as of the last [`Self::update_global_matrix`]
    pub fn global_matrix(&self) -> &Transform {
        &self.global_matrix
    }

    /// Recompute the global matrix after the owning body moved
    pub fn update_global_matrix(&mut self, body_matrix: &Transform) {
        self.global_matrix = body_matrix.combine(&self.local_matrix).combine(&self.alignment_matrix());
    }

    /// World frame of the instance without the alignment, `body * local`
    pub fn frame(&self) -> Transform {
        self.global_matrix.combine(&self.alignment_matrix().inverse())
    }

    /// Shape-side rotation of the scale envelope, identity unless the scale type is global
    pub fn alignment_matrix(&self) -> Transform {
        match self.envelope.scale_type() {
            ScaleType::Global => Transform::from_rotation_matrix(&self.envelope.alignment(), Vec3::zeros()),
            _ => Transform::identity(),
        }
    }

    /// Scale per axis
    pub fn scale(&self) -> Vec3 {
        self.envelope.scale()
    }

    /// Component-wise inverse scale
    pub fn inv_scale(&self) -> Vec3 {
        self.envelope.inv_scale()
    }

    /// Largest scale component
    pub fn max_scale(&self) -> f32 {
        self.envelope.max_scale()
    }

    /// Scale classification
    pub fn scale_type(&self) -> ScaleType {
        self.envelope.scale_type()
    }

    pub(crate) fn envelope(&self) -> &ScaleEnvelope {
        &self.envelope
    }

    pub(crate) fn set_envelope(&mut self, envelope: ScaleEnvelope) {
        self.envelope = envelope;
    }

    /// Set an axis aligned scale in shape space.
    ///
    /// Components must be finite and positive; otherwise the previous scale
    /// is kept and `InvalidScale` is returned.
    pub fn set_scale(&mut self, scale: Vec3) -> Result<(), PhysicsError> {
        match ScaleEnvelope::new(scale) {
            Ok(envelope) => {
                self.envelope = envelope;
                Ok(())
            }
            Err(err) => {
                log::warn!("Rejected shape scale {:?}: {}", scale, err);
                Err(err)
            }
        }
    }

    /// Scale the instance in its parent frame.
    ///
    /// The placement is scaled too. A non-uniform scale of a rotated
    /// instance is split into a new rotation, an axis scale and an alignment
    /// rotation.
    pub fn set_global_scale(&mut self, scale: Vec3) -> Result<(), PhysicsError> {
        if let Err(err) = ScaleEnvelope::new(scale) {
            log::warn!("Rejected global shape scale {:?}: {}", scale, err);
            return Err(err);
        }

        let position = scale.component_mul(&self.local_matrix.position);
        let uniform = (scale.x - scale.y).abs() <= 1.0e-4 * scale.max()
            && (scale.x - scale.z).abs() <= 1.0e-4 * scale.max();

        if uniform {
            let envelope = ScaleEnvelope::global(self.envelope.scale() * scale.x, self.envelope.alignment())?;
            self.envelope = envelope;
            self.local_matrix.position = position;
            return Ok(());
        }

        let linear = Mat3::from_diagonal(&scale) * self.local_matrix.rotation_matrix() * self.envelope.linear();
        let (rotation, axis_scale, alignment) = polar_decompose(&linear)?;
        let envelope = ScaleEnvelope::global(axis_scale, alignment)?;

        let rotation = if envelope.scale_type() == ScaleType::Global {
            rotation
        } else {
            // alignment was absorbed, fold it into the placement
            rotation * alignment
        };

        log::debug!(
            "Global scale {:?} -> scale {:?} ({:?})",
            scale,
            envelope.scale(),
            envelope.scale_type()
        );
        self.envelope = envelope;
        self.local_matrix = Transform::from_rotation_matrix(&rotation, position);
        Ok(())
    }

    /// Surface material
    pub fn material(&self) -> &ShapeMaterial {
        &self.material
    }

    /// Mutable surface material
    pub fn material_mut(&mut self) -> &mut ShapeMaterial {
        &mut self.material
    }

    /// Replace the surface material
    pub fn set_material(&mut self, material: ShapeMaterial) {
        self.material = material;
    }

    /// Enclosing compound, if this instance is a compound child
    pub fn parent(&self) -> Option<SharedShape> {
        self.parent.as_ref().and_then(WeakShape::upgrade)
    }

    pub(crate) fn set_parent(&mut self, parent: Option<WeakShape>) {
        self.parent = parent;
    }

    /// Owning body
    pub fn owner_body(&self) -> Option<BodyHandle> {
        self.owner_body
    }

    /// Set the owning body
    pub fn set_owner_body(&mut self, owner: Option<BodyHandle>) {
        self.owner_body = owner;
    }

    /// Clear the parent and owner back-references
    pub fn detach(&mut self) {
        self.parent = None;
        self.owner_body = None;
    }

    /// Whether the instance generates contacts
    pub fn collision_mode(&self) -> bool {
        self.collision_mode
    }

    /// Enable or disable contact generation
    pub fn set_collision_mode(&mut self, mode: bool) {
        self.collision_mode = mode;
    }

    /// Contact skin thickness
    pub fn skin_margin(&self) -> f32 {
        self.skin_margin
    }

    /// Set the contact skin thickness
    pub fn set_skin_margin(&mut self, skin: f32) -> Result<(), PhysicsError> {
        if !(skin >= 0.0 && skin.is_finite()) {
            return Err(PhysicsError::InvalidArgument(format!("skin margin must be non-negative, got {skin}")));
        }
        self.skin_margin = skin;
        Ok(())
    }

    /// Padding added on each side of [`Self::calculate_aabb`]
    pub const fn box_padding() -> f32 {
        BOX_PADDING
    }

    /// Skin expressed in shape space
    fn shape_skin(&self) -> f32 {
        self.skin_margin / self.envelope.max_scale()
    }

    /// Farthest point of the scaled shape along `dir`, in instance space.
    ///
    /// Ties resolve to the lowest vertex index, so repeated queries agree.
    pub fn support_vertex(&self, dir: &Vec3) -> Vec3 {
        let shape = self.shape.read();
        match self.envelope.scale_type() {
            ScaleType::Unit => shape.support(dir).0,
            _ => {
                let (point, _) = shape.support(&self.envelope.shape_direction(dir));
                self.envelope.scale_point(&point)
            }
        }
    }

    /// Skin eroded support point and the selected vertex index.
    ///
    /// Spheres and capsules report their core point or segment end.
    pub fn support_vertex_special(&self, dir: &Vec3) -> (Vec3, Option<usize>) {
        let shape = self.shape.read();
        match self.envelope.scale_type() {
            ScaleType::Unit => shape.support_special(dir, self.skin_margin),
            _ => {
                let (point, index) = shape.support_special(&self.envelope.shape_direction(dir), self.shape_skin());
                (self.envelope.scale_point(&point), index)
            }
        }
    }

    /// Move a point from [`Self::support_vertex_special`] back onto the surface
    pub fn support_vertex_special_project_point(&self, point: &Vec3, dir: &Vec3) -> Vec3 {
        let shape = self.shape.read();
        match self.envelope.scale_type() {
            ScaleType::Unit => shape.special_project(point, dir, self.skin_margin),
            _ => {
                let local = self.envelope.unscale_point(point);
                let projected = shape.special_project(&local, &self.envelope.shape_direction(dir), self.shape_skin());
                self.envelope.scale_point(&projected)
            }
        }
    }

    /// Cast the segment `p0 -> p1` (instance space) against the scaled shape.
    ///
    /// A segment starting inside reports where it leaves the shape.
    /// Zero length segments never hit.
    pub fn ray_cast(&self, p0: &Vec3, p1: &Vec3) -> Option<ShapeRayHit> {
        let segment = Segment::new(*p0, *p1);
        if segment.is_degenerate() {
            return None;
        }

        let shape = self.shape.read();
        let (fraction, normal) = match self.envelope.scale_type() {
            ScaleType::Unit => shape.ray_cast(&segment)?,
            _ => {
                let local = Segment::new(self.envelope.unscale_point(p0), self.envelope.unscale_point(p1));
                let (fraction, normal) = shape.ray_cast(&local)?;
                (fraction, utils::try_normalize(&self.envelope.scale_normal(&normal))?)
            }
        };

        Some(ShapeRayHit {
            fraction,
            normal,
            point: segment.point_at(fraction),
        })
    }

    /// Contact section of the scaled shape with a plane (instance space).
    ///
    /// Empty when the plane misses the shape or the normal is degenerate.
    pub fn calculate_plane_intersection(&self, normal: &Vec3, point: &Vec3) -> Vec<Vec3> {
        let Some(normal) = utils::try_normalize(normal) else {
            return Vec::new();
        };
        if !utils::is_finite(point) {
            return Vec::new();
        }
        let offset = normal.dot(point);

        let shape = self.shape.read();
        match self.envelope.scale_type() {
            ScaleType::Unit => shape.plane_section(&normal, offset),
            _ => {
                let shape_normal = self.envelope.shape_direction(&normal);
                let len = shape_normal.norm();
                shape
                    .plane_section(&(shape_normal / len), offset / len)
                    .iter()
                    .map(|p| self.envelope.scale_point(p))
                    .collect()
            }
        }
    }

    /// World bounding box of the scaled shape placed by `matrix`, padded by
    /// [`Self::box_padding`]
    pub fn calculate_aabb(&self, matrix: &Transform) -> Aabb {
        let mut min = Vec3::zeros();
        let mut max = Vec3::zeros();
        for axis in 0..3 {
            let mut world_dir = Vec3::zeros();
            world_dir[axis] = 1.0;
            let dir = matrix.unrotate_vector(&world_dir);
            max[axis] = matrix.transform_point(&self.support_vertex(&dir))[axis];
            min[axis] = matrix.transform_point(&self.support_vertex(&-dir))[axis];
        }
        Aabb::new(min, max).padded(BOX_PADDING)
    }

    /// Bounding box in instance space: `(origin, half_size)`
    pub fn calculate_obb(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::zeros();
        let mut max = Vec3::zeros();
        for axis in 0..3 {
            let mut dir = Vec3::zeros();
            dir[axis] = 1.0;
            max[axis] = self.support_vertex(&dir)[axis];
            min[axis] = self.support_vertex(&-dir)[axis];
        }
        ((min + max) * 0.5, (max - min) * 0.5)
    }

    /// Map from shape space to the frame placed by `matrix`:
    /// `matrix * diag(scale) * alignment`
    pub fn scaled_transform(&self, matrix: &Transform) -> Affine {
        Affine::from(*matrix).combine(&Affine::new(self.envelope.linear(), Vec3::zeros()))
    }

    /// Map from shape space to the parent frame
    fn parent_map(&self) -> Affine {
        self.scaled_transform(&self.local_matrix)
    }

    /// Inertia per unit mass, centre of mass and volume in the parent frame.
    ///
    /// Fails with `UnsupportedShape` for shapes without a closed form.
    pub fn calculate_inertia(&self) -> Result<MassProperties, PhysicsError> {
        Ok(self.moments_in_parent()?.mass_properties())
    }

    pub(crate) fn moments_in_parent(&self) -> Result<VolumeMoments, PhysicsError> {
        Ok(self.shape.read().moments()?.transformed(&self.parent_map()))
    }

    /// Volume of the scaled shape
    pub fn volume(&self) -> f32 {
        self.shape.read().volume() * self.envelope.volume_factor()
    }

    /// Smallest half size of the shape's box, times the max scale
    pub fn box_min_radius(&self) -> f32 {
        self.shape.read().obb().1.min() * self.envelope.max_scale()
    }

    /// Length of the shape's box half diagonal, times the max scale
    pub fn box_max_radius(&self) -> f32 {
        self.shape.read().obb().1.norm() * self.envelope.max_scale()
    }

    /// Radius beyond which the instance can be culled from shadow volumes
    pub fn umbra_clip_size(&self) -> f32 {
        3.0 * self.box_max_radius()
    }

    /// Discrete vertex count of the shape
    pub fn convex_vertex_count(&self) -> usize {
        self.shape.read().vertex_count()
    }

    /// Material user id
    pub fn user_data_id(&self) -> u64 {
        self.material.user_id
    }

    /// Summary for tools
    pub fn shape_info(&self) -> ShapeInfo {
        let shape = self.shape.read();
        ShapeInfo {
            kind: shape.kind(),
            dimensions: shape.obb().1,
            vertex_count: shape.vertex_count(),
            child_count: match &*shape {
                Shape::Compound(compound) => compound.children().len(),
                _ => 0,
            },
            scale: self.envelope.scale(),
            scale_type: self.envelope.scale_type(),
            local_matrix: self.local_matrix,
            user_id: self.material.user_id,
            collision_mode: self.collision_mode,
        }
    }

    /// Emit outline polygons of the scaled shape placed by `matrix`
    pub fn debug_shape(&self, matrix: &Transform, notify: &mut dyn ShapeDebugNotify) {
        self.debug_affine(&Affine::from(*matrix), notify);
    }

    fn debug_affine(&self, frame: &Affine, notify: &mut dyn ShapeDebugNotify) {
        let map = frame.combine(&Affine::new(self.envelope.linear(), Vec3::zeros()));
        let shape = self.shape.read();

        if let Shape::Compound(compound) = &*shape {
            for child in compound.children() {
                child.debug_affine(&map.combine(&Affine::from(child.local_matrix)), notify);
            }
            return;
        }

        if let Some(faces) = shape.debug_faces() {
            for (face_id, face) in faces.iter().enumerate() {
                let polygon: Vec<Vec3> = face.iter().map(|p| map.transform_point(p)).collect();
                notify.polygon(&polygon, face_id);
            }
            return;
        }

        if shape.kind() == ShapeKind::Null {
            return;
        }

        // curved shapes: support points over a latitude/longitude grid around X
        let grid: Vec<Vec<Vec3>> = (0..=DEBUG_RINGS)
            .map(|ring| {
                let theta = TAU * 0.5 * ring as f32 / DEBUG_RINGS as f32;
                (0..DEBUG_SEGMENTS)
                    .map(|seg| {
                        let phi = TAU * seg as f32 / DEBUG_SEGMENTS as f32;
                        let dir = Vec3::new(theta.cos(), theta.sin() * phi.cos(), theta.sin() * phi.sin());
                        map.transform_point(&shape.support(&dir).0)
                    })
                    .collect()
            })
            .collect();

        let mut face_id = 0;
        for ring in 0..DEBUG_RINGS {
            for seg in 0..DEBUG_SEGMENTS {
                let next = (seg + 1) % DEBUG_SEGMENTS;
                let quad = [grid[ring][seg], grid[ring + 1][seg], grid[ring + 1][next], grid[ring][next]];
                notify.polygon(&quad, face_id);
                face_id += 1;
            }
        }
    }

    /// Support point in the parent frame
    pub(crate) fn support_in_parent(&self, dir: &Vec3) -> Vec3 {
        let local_dir = self.local_matrix.unrotate_vector(dir);
        self.local_matrix.transform_point(&self.support_vertex(&local_dir))
    }

    /// Ray cast with the segment given in the parent frame
    pub(crate) fn ray_cast_in_parent(&self, segment: &Segment) -> Option<(f32, Vec3)> {
        let p0 = self.local_matrix.untransform_point(&segment.p0);
        let p1 = self.local_matrix.untransform_point(&segment.p1);
        self.ray_cast(&p0, &p1)
            .map(|hit| (hit.fraction, self.local_matrix.rotate_vector(&hit.normal)))
    }

    /// Plane section with the plane given in the parent frame
    pub(crate) fn plane_section_in_parent(&self, normal: &Vec3, offset: f32) -> Vec<Vec3> {
        let local_normal = self.local_matrix.unrotate_vector(normal);
        let local_offset = offset - normal.dot(&self.local_matrix.position);
        self.calculate_plane_intersection(&local_normal, &(local_normal * local_offset))
            .iter()
            .map(|p| self.local_matrix.transform_point(p))
            .collect()
    }
}
