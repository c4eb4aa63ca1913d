//! passthru rect 尺寸相关的资源
//!
//! 只有 passthru rect 的尺寸变化或者 swapchain 重建时才会重建

use ash::vk;
use halo_gfx::resources::{
    image::{GfxImage, GfxImageCreateInfo},
    image_view::{GfxImageView, GfxImageViewDesc},
};

use crate::{
    jump_flood::resources::JumpFloodResources, outline::OutlineRole, settings::RendererSettings,
    shared_data::SharedData,
};

/// 按尺寸缓存的资源
///
/// `invalidate` 之后即使尺寸不变也会重建
pub struct PassthruSlot<T> {
    extent: Option<vk::Extent2D>,
    stale: bool,
    value: Option<T>,
}
impl<T> Default for PassthruSlot<T> {
    fn default() -> Self {
        Self {
            extent: None,
            stale: false,
            value: None,
        }
    }
}
impl<T> PassthruSlot<T> {
    #[inline]
    pub fn needs_rebuild(&self, extent: vk::Extent2D) -> bool {
        self.stale || self.value.is_none() || self.extent != Some(extent)
    }

    /// 旧的资源先释放，再创建新的
    pub fn rebuild(
        &mut self,
        extent: vk::Extent2D,
        build: impl FnOnce(vk::Extent2D) -> anyhow::Result<T>,
    ) -> anyhow::Result<&T> {
        self.value = None;
        self.extent = None;

        let value = build(extent)?;
        self.extent = Some(extent);
        self.stale = false;
        Ok(self.value.insert(value))
    }

    #[inline]
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    #[inline]
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.extent
    }

    #[inline]
    pub fn clear(&mut self) {
        self.value = None;
        self.extent = None;
    }
}

/// prepass 以及 jump flood 使用的 attachment
///
/// 创建之后不做 layout 初始化，每一帧使用前都从 UNDEFINED 转换
pub struct PassthruResources {
    node_index_image: GfxImage,
    node_index_view: GfxImageView,
    depth_image: GfxImage,
    depth_view: GfxImageView,

    hovering_jump_flood: JumpFloodResources,
    selected_jump_flood: JumpFloodResources,
}
impl PassthruResources {
    pub fn new(extent: vk::Extent2D, shared: &SharedData, debug_name: &str) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("PassthruResources::new");
        let depth_format = shared.depth_format();

        let node_index_image = GfxImage::new_device_local(
            &GfxImageCreateInfo::new_image_2d_info(
                extent,
                RendererSettings::NODE_INDEX_FORMAT,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
            ),
            &format!("{debug_name}-node-index"),
        )?;
        let node_index_view = GfxImageView::new(
            node_index_image.handle(),
            GfxImageViewDesc::new_2d(RendererSettings::NODE_INDEX_FORMAT, vk::ImageAspectFlags::COLOR),
            format!("{debug_name}-node-index"),
        )?;

        let depth_image = GfxImage::new_device_local(
            &GfxImageCreateInfo::new_image_2d_info(extent, depth_format, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
            &format!("{debug_name}-prepass-depth"),
        )?;
        let depth_view = GfxImageView::new(
            depth_image.handle(),
            GfxImageViewDesc::new_2d(depth_format, vk::ImageAspectFlags::DEPTH),
            format!("{debug_name}-prepass-depth"),
        )?;

        let pipelines = shared.pipelines();
        let create_jump_flood = |role: OutlineRole| {
            JumpFloodResources::new(
                extent,
                depth_format,
                pipelines.jump_flood_set_layout.handle(),
                pipelines.outline_set_layout.handle(),
                shared.nearest_sampler(),
                &format!("{debug_name}-{}", role.name()),
            )
        };
        let hovering_jump_flood = create_jump_flood(OutlineRole::Hovering)?;
        let selected_jump_flood = create_jump_flood(OutlineRole::Selected)?;

        log::info!("{debug_name}: passthru resources built: {}x{}", extent.width, extent.height);
        Ok(Self {
            node_index_image,
            node_index_view,
            depth_image,
            depth_view,
            hovering_jump_flood,
            selected_jump_flood,
        })
    }
}
// getters
impl PassthruResources {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.node_index_image.extent_2d()
    }

    #[inline]
    pub fn node_index_image(&self) -> &GfxImage {
        &self.node_index_image
    }

    #[inline]
    pub fn node_index_view(&self) -> &GfxImageView {
        &self.node_index_view
    }

    #[inline]
    pub fn depth_image(&self) -> &GfxImage {
        &self.depth_image
    }

    #[inline]
    pub fn depth_view(&self) -> &GfxImageView {
        &self.depth_view
    }

    #[inline]
    pub fn jump_flood(&self, role: OutlineRole) -> &JumpFloodResources {
        match role {
            OutlineRole::Selected => &self.selected_jump_flood,
            OutlineRole::Hovering => &self.hovering_jump_flood,
        }
    }
}

/// y 轴翻转的 viewport：glTF 使用 y 向上，vulkan 的 framebuffer 使用 y 向下
#[inline]
pub fn flipped_viewport(rect: vk::Rect2D) -> vk::Viewport {
    vk::Viewport {
        x: rect.offset.x as f32,
        y: (rect.offset.y as i64 + rect.extent.height as i64) as f32,
        width: rect.extent.width as f32,
        height: -(rect.extent.height as f32),
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn resize_round_trip_restores_original_extent() {
        let mut slot = PassthruSlot::<vk::Extent2D>::default();
        let mut builds = vec![];
        let (a, b) = (extent(800, 600), extent(1024, 768));

        for target in [a, a, b, b, a] {
            if slot.needs_rebuild(target) {
                slot.rebuild(target, |e| {
                    builds.push(e);
                    Ok(e)
                })
                .unwrap();
            }
        }

        assert_eq!(builds, vec![a, b, a]);
        assert_eq!(slot.get(), Some(&a));
        assert_eq!(slot.extent(), Some(a));
    }

    #[test]
    fn invalidate_forces_rebuild_with_same_extent() {
        let mut slot = PassthruSlot::<u32>::default();
        let e = extent(64, 64);
        slot.rebuild(e, |_| Ok(1)).unwrap();
        assert!(!slot.needs_rebuild(e));

        slot.invalidate();
        assert!(slot.needs_rebuild(e));
        slot.rebuild(e, |_| Ok(2)).unwrap();
        assert!(!slot.needs_rebuild(e));
        assert_eq!(slot.get(), Some(&2));
    }

    #[test]
    fn failed_rebuild_leaves_slot_empty() {
        let mut slot = PassthruSlot::<u32>::default();
        let e = extent(64, 64);
        slot.rebuild(e, |_| Ok(1)).unwrap();
        assert!(slot.rebuild(extent(128, 128), |_| anyhow::bail!("out of device memory")).is_err());
        assert_eq!(slot.get(), None);
        assert!(slot.needs_rebuild(e));
    }

    #[test]
    fn viewport_is_flipped_inside_rect() {
        let rect = vk::Rect2D {
            offset: vk::Offset2D { x: 200, y: 40 },
            extent: extent(640, 480),
        };
        let viewport = flipped_viewport(rect);
        assert_eq!((viewport.x, viewport.y), (200.0, 520.0));
        assert_eq!((viewport.width, viewport.height), (640.0, -480.0));
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));
    }
}
