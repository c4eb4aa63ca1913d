use crate::scene::BoundingSphere;

/// 由 projection * view 矩阵提取的 6 个平面，法线指向内部
///
/// 适用于 Vulkan 的 [0, 1] 深度范围，正向或 reverse z 都成立
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [glam::Vec4; 6],
}
impl Frustum {
    pub fn from_projection_view(proj_view: &glam::Mat4) -> Self {
        let row = |i: usize| proj_view.row(i);
        let raw = [
            row(3) + row(0), // left
            row(3) - row(0), // right
            row(3) + row(1), // bottom
            row(3) - row(1), // top
            row(2),          // z >= 0
            row(3) - row(2), // z <= w
        ];
        Self {
            planes: raw.map(|plane| {
                let len = plane.truncate().length();
                // 退化的平面（例如无限远平面）不参与剔除
                if len <= f32::EPSILON { glam::Vec4::new(0.0, 0.0, 0.0, 1.0) } else { plane / len }
            }),
        }
    }

    /// 球与 frustum 相交或者在内部
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes.iter().all(|plane| plane.truncate().dot(sphere.center) + plane.w >= -sphere.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(x: f32, y: f32, z: f32, radius: f32) -> BoundingSphere {
        BoundingSphere {
            center: glam::Vec3::new(x, y, z),
            radius,
        }
    }

    fn camera_frustum() -> Frustum {
        // reverse z：near 和 far 交换
        let proj = glam::Mat4::perspective_rh(60f32.to_radians(), 1.0, 100.0, 0.1);
        let view = glam::Mat4::look_at_rh(glam::Vec3::ZERO, glam::Vec3::NEG_Z, glam::Vec3::Y);
        Frustum::from_projection_view(&(proj * view))
    }

    #[test]
    fn sphere_in_front_is_visible() {
        let frustum = camera_frustum();
        assert!(frustum.intersects_sphere(&sphere(0.0, 0.0, -10.0, 1.0)));
        // 中心在视野外，但球与侧面相交
        assert!(frustum.intersects_sphere(&sphere(7.0, 0.0, -10.0, 2.0)));
    }

    #[test]
    fn spheres_outside_are_culled() {
        let frustum = camera_frustum();
        assert!(!frustum.intersects_sphere(&sphere(0.0, 0.0, 10.0, 1.0)));
        assert!(!frustum.intersects_sphere(&sphere(50.0, 0.0, -10.0, 1.0)));
        assert!(!frustum.intersects_sphere(&sphere(0.0, 0.0, -200.0, 1.0)));
    }
}
