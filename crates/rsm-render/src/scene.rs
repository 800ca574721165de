//! Drawable scene objects

use crate::mesh::GpuMesh;
use glam::{Mat4, Vec3};

/// A mesh placed in the world with a constant material tint
///
/// The mesh buffers are shared (`GpuMesh` is cheap to clone); the renderer
/// only references them for the duration of a frame.
#[derive(Clone, Debug)]
pub struct SceneObject {
    pub mesh: GpuMesh,
    pub model: Mat4,
    /// Linear RGB albedo; also the flux tint in the RSM
    pub albedo: Vec3,
}

impl SceneObject {
    pub fn new(mesh: GpuMesh) -> Self {
        Self {
            mesh,
            model: Mat4::IDENTITY,
            albedo: Vec3::splat(0.8),
        }
    }

    pub fn with_transform(mut self, model: Mat4) -> Self {
        self.model = model;
        self
    }

    pub fn with_albedo(mut self, albedo: Vec3) -> Self {
        self.albedo = albedo;
        self
    }

    /// Inverse-transpose of the model matrix for transforming normals
    pub fn normal_matrix(&self) -> Mat4 {
        normal_matrix(self.model)
    }
}

pub(crate) fn normal_matrix(model: Mat4) -> Mat4 {
    if model.determinant().abs() <= f32::EPSILON {
        return Mat4::IDENTITY;
    }
    model.inverse().transpose()
}
