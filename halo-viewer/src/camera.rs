use halo_renderer::frame_task::Camera;

/// 绕 target 旋转的相机，投影使用 reverse z + 无限远平面
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: glam::Vec3,
    pub distance: f32,
    /// 角度制
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y: f32,
    pub z_near: f32,
}
impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: glam::Vec3::new(0.0, 0.5, 0.0),
            distance: 9.0,
            yaw: 35.0,
            pitch: 25.0,
            fov_y: 45.0,
            z_near: 0.05,
        }
    }
}

impl OrbitCamera {
    const PITCH_LIMIT: f32 = 89.0;
    const MIN_DISTANCE: f32 = 0.5;
    const MAX_DISTANCE: f32 = 200.0;
    /// 每个像素旋转的角度
    const ROTATE_SPEED: f32 = 0.3;

    pub fn eye(&self) -> glam::Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        let dir = glam::Vec3::new(pitch.cos() * yaw.sin(), pitch.sin(), pitch.cos() * yaw.cos());
        self.target + dir * self.distance
    }

    /// 鼠标拖动的像素偏移
    pub fn rotate(&mut self, delta: glam::Vec2) {
        self.yaw -= delta.x * Self::ROTATE_SPEED;
        self.pitch = (self.pitch + delta.y * Self::ROTATE_SPEED).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    /// 正数拉近
    pub fn zoom(&mut self, steps: f32) {
        self.distance = (self.distance * 0.9_f32.powf(steps)).clamp(Self::MIN_DISTANCE, Self::MAX_DISTANCE);
    }

    pub fn camera(&self, aspect_ratio: f32) -> Camera {
        Camera {
            view: glam::Mat4::look_at_rh(self.eye(), self.target, glam::Vec3::Y),
            projection: glam::Mat4::perspective_infinite_reverse_rh(
                self.fov_y.to_radians(),
                aspect_ratio.max(f32::EPSILON),
                self.z_near,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_stays_on_sphere_around_target() {
        let mut camera = OrbitCamera::default();
        camera.rotate(glam::Vec2::new(120.0, -45.0));
        assert!((camera.eye().distance(camera.target) - camera.distance).abs() < 1e-4);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = OrbitCamera::default();
        camera.rotate(glam::Vec2::new(0.0, 10_000.0));
        assert_eq!(camera.pitch, 89.0);
        camera.rotate(glam::Vec2::new(0.0, -10_000.0));
        assert_eq!(camera.pitch, -89.0);
    }

    #[test]
    fn view_position_matches_eye() {
        let camera = OrbitCamera::default();
        let view_position = camera.camera(1.5).view_position();
        assert!(view_position.distance(camera.eye()) < 1e-3);
    }

    #[test]
    fn target_is_in_front_with_reverse_depth() {
        let camera = OrbitCamera::default();
        let clip = camera.camera(1.5).projection_view() * camera.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(clip.w > 0.0);
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        // reverse z：近处深度接近 1，远处接近 0
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn zoom_is_bounded() {
        let mut camera = OrbitCamera::default();
        camera.zoom(1_000.0);
        assert_eq!(camera.distance, 0.5);
        camera.zoom(-1_000.0);
        assert_eq!(camera.distance, 200.0);
    }
}
