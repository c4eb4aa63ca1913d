//! 每帧由外部构建的任务描述，`Frame::update` 消费之后丢弃

use std::{collections::BTreeSet, rc::Rc};

use ash::vk;

use crate::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub view: glam::Mat4,
    /// reverse z 的投影矩阵
    pub projection: glam::Mat4,
}
impl Camera {
    #[inline]
    pub fn projection_view(&self) -> glam::Mat4 {
        self.projection * self.view
    }

    /// 去掉 view 的平移部分，用于 skybox
    #[inline]
    pub fn translationless_projection_view(&self) -> glam::Mat4 {
        self.projection * glam::Mat4::from_mat3(glam::Mat3::from_mat4(self.view))
    }

    /// view 矩阵的逆矩阵的第 4 列
    #[inline]
    pub fn view_position(&self) -> glam::Vec3 {
        self.view.inverse().w_axis.truncate()
    }
}

/// 描边样式，thickness 以像素为单位
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineStyle {
    pub color: glam::Vec3,
    pub thickness: f32,
}

/// 需要绘制场景时携带的数据
#[derive(Clone)]
pub struct SceneRenderRequest {
    pub scene: Rc<Scene>,
    pub rendering_nodes: BTreeSet<u32>,
    pub selected_nodes: BTreeSet<u32>,
    pub selected_outline: Option<OutlineStyle>,
    pub hovering_node: Option<u32>,
    pub hovering_outline: Option<OutlineStyle>,
    pub frustum_culling: bool,
}

#[derive(Clone)]
pub struct FrameTask {
    pub camera: Camera,
    /// 场景在窗口中的绘制区域
    pub passthru_rect: vk::Rect2D,
    /// None 时使用 skybox
    pub solid_background: Option<glam::Vec3>,
    /// 窗口坐标系下的鼠标位置（物理像素）
    pub cursor_position: Option<glam::Vec2>,
    pub scene: Option<SceneRenderRequest>,
    /// swapchain 重建之后，每个 slot 第一次 update 时携带新的 extent
    pub swapchain_resize: Option<vk::Extent2D>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    /// 上一次使用该 slot 时 prepass 拾取到的 node
    pub hovering_node_index: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_derived_values() {
        let eye = glam::Vec3::new(1.0, 2.0, 5.0);
        let camera = Camera {
            view: glam::Mat4::look_at_rh(eye, glam::Vec3::ZERO, glam::Vec3::Y),
            projection: glam::Mat4::perspective_rh(45f32.to_radians(), 1.0, 100.0, 0.1),
        };
        assert!(camera.view_position().abs_diff_eq(eye, 1e-4));

        // 平移对 skybox 矩阵没有影响
        let moved = Camera {
            view: camera.view * glam::Mat4::from_translation(glam::Vec3::new(3.0, 0.0, 0.0)),
            ..camera
        };
        assert!(
            moved
                .translationless_projection_view()
                .abs_diff_eq(camera.translationless_projection_view(), 1e-5)
        );
        assert!(!moved.projection_view().abs_diff_eq(camera.projection_view(), 1e-5));
    }
}
