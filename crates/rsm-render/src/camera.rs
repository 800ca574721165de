//! Camera utilities

use crate::{Error, Result};
use glam::{Mat4, Vec3};

/// Camera pose supplied by the caller each frame
///
/// The basis is read-only input; the renderer never updates it. `forward`
/// need not be normalized but must not be degenerate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraPose {
    /// Build an orthonormal pose at `position` looking at `target`
    pub fn look_at(position: Vec3, target: Vec3, world_up: Vec3) -> Self {
        let forward = (target - position).normalize_or_zero();
        let right = forward.cross(world_up).normalize_or_zero();
        let up = right.cross(forward);
        Self {
            position,
            forward,
            right,
            up,
            ..Self::default()
        }
    }

    /// Same pose with a basis rebuilt from yaw/pitch angles (radians)
    pub fn with_yaw_pitch(mut self, yaw: f32, pitch: f32) -> Self {
        let (sy, cy) = yaw.sin_cos();
        let (sp, cp) = pitch.sin_cos();
        self.forward = Vec3::new(cp * sy, sp, -cp * cy);
        self.right = Vec3::new(cy, 0.0, sy);
        self.up = self.right.cross(self.forward);
        self
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward.normalize_or_zero(), self.up)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }

    /// Check the `render_frame` preconditions on the pose
    pub fn validate(&self) -> Result<()> {
        if !self.position.is_finite() {
            return Err(Error::InvalidInput(format!("camera position is not finite: {}", self.position)));
        }
        if !self.forward.is_finite() || self.forward.length_squared() <= 1e-12 {
            return Err(Error::InvalidInput(format!("camera forward is degenerate: {}", self.forward)));
        }
        if !self.up.is_finite() || self.forward.normalize().cross(self.up).length_squared() <= 1e-12 {
            return Err(Error::InvalidInput("camera up is zero or parallel to forward".into()));
        }
        if !(self.fov_y > 0.0 && self.fov_y < std::f32::consts::PI) {
            return Err(Error::InvalidInput(format!("camera fov {} out of range", self.fov_y)));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(Error::InvalidInput(format!(
                "camera clip planes invalid: near={} far={}",
                self.near, self.far
            )));
        }
        Ok(())
    }
}

impl Default for CameraPose {
    /// Eye at (-2, 0, -5) looking at the origin, 45° vertical FOV, clip 1..100
    fn default() -> Self {
        let position = Vec3::new(-2.0, 0.0, -5.0);
        let forward = (-position).normalize();
        let right = forward.cross(Vec3::Y).normalize();
        let up = right.cross(forward);
        Self {
            position,
            forward,
            right,
            up,
            fov_y: 0.25 * std::f32::consts::PI,
            near: 1.0,
            far: 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pose_looks_at_origin() {
        let pose = CameraPose::default();
        let origin = pose.view().transform_point3(Vec3::ZERO);
        // Right-handed view space looks down -Z
        assert!(origin.x.abs() < 1e-5 && origin.y.abs() < 1e-5);
        assert!((origin.z + pose.position.length()).abs() < 1e-5);
        assert!(pose.validate().is_ok());
    }

    #[test]
    fn basis_is_orthonormal() {
        let pose = CameraPose::look_at(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y);
        assert!(pose.forward.dot(pose.right).abs() < 1e-6);
        assert!(pose.forward.dot(pose.up).abs() < 1e-6);
        assert!((pose.up.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn rejects_degenerate_forward() {
        let pose = CameraPose { forward: Vec3::ZERO, ..CameraPose::default() };
        assert!(matches!(pose.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rejects_non_finite_position() {
        let pose = CameraPose { position: Vec3::new(f32::NAN, 0.0, 0.0), ..CameraPose::default() };
        assert!(pose.validate().is_err());
    }

    #[test]
    fn yaw_zero_looks_down_negative_z() {
        let pose = CameraPose::default().with_yaw_pitch(0.0, 0.0);
        assert!((pose.forward - Vec3::NEG_Z).length() < 1e-6);
        assert!((pose.up - Vec3::Y).length() < 1e-6);
    }
}
