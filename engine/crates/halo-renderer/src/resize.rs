use ash::vk;

use crate::settings::{FrameLabel, RendererSettings};

/// 判断 swapchain 是否需要重建，并记录每个 frame in flight slot 是否已经得知重建
///
/// slot 是轮流录制的，重建之后还没有被访问过的 slot 仍然持有旧尺寸的资源
#[derive(Debug)]
pub struct SwapchainResizeCoordinator {
    last_extent: vk::Extent2D,
    pending_slots: [bool; RendererSettings::FIF_COUNT],
}
impl SwapchainResizeCoordinator {
    pub fn new(swapchain_extent: vk::Extent2D) -> Self {
        Self {
            last_extent: swapchain_extent,
            pending_slots: [false; RendererSettings::FIF_COUNT],
        }
    }

    /// 上一帧 present 失败，或者窗口尺寸发生变化
    #[inline]
    pub fn should_recreate(&self, last_execute_ok: bool, window_extent: vk::Extent2D) -> bool {
        !last_execute_ok || window_extent != self.last_extent
    }

    /// 最小化时窗口尺寸为 0，无法创建 swapchain
    #[inline]
    pub fn is_degenerate(extent: vk::Extent2D) -> bool {
        extent.width == 0 || extent.height == 0
    }

    pub fn on_recreated(&mut self, swapchain_extent: vk::Extent2D) {
        log::info!(
            "swapchain recreated: {}x{} -> {}x{}",
            self.last_extent.width,
            self.last_extent.height,
            swapchain_extent.width,
            swapchain_extent.height
        );
        self.last_extent = swapchain_extent;
        self.pending_slots = [true; RendererSettings::FIF_COUNT];
    }

    /// slot 第一次访问时返回新的 extent，之后返回 None
    #[inline]
    pub fn take_slot_flag(&mut self, frame_label: FrameLabel) -> Option<vk::Extent2D> {
        std::mem::take(&mut self.pending_slots[*frame_label]).then_some(self.last_extent)
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.last_extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };
    const B: vk::Extent2D = vk::Extent2D {
        width: 1024,
        height: 768,
    };

    #[test]
    fn recreate_on_failure_or_extent_change() {
        let coordinator = SwapchainResizeCoordinator::new(A);
        assert!(!coordinator.should_recreate(true, A));
        assert!(coordinator.should_recreate(false, A));
        assert!(coordinator.should_recreate(true, B));
    }

    #[test]
    fn minimized_window_is_degenerate() {
        assert!(SwapchainResizeCoordinator::is_degenerate(vk::Extent2D { width: 0, height: 0 }));
        assert!(SwapchainResizeCoordinator::is_degenerate(vk::Extent2D { width: 10, height: 0 }));
        assert!(!SwapchainResizeCoordinator::is_degenerate(A));
    }

    #[test]
    fn every_slot_sees_resize_exactly_once() {
        let mut coordinator = SwapchainResizeCoordinator::new(A);
        assert_eq!(coordinator.take_slot_flag(FrameLabel::A), None);

        coordinator.on_recreated(B);
        assert!(!coordinator.should_recreate(true, B));

        assert_eq!(coordinator.take_slot_flag(FrameLabel::B), Some(B));
        assert_eq!(coordinator.take_slot_flag(FrameLabel::B), None);
        assert_eq!(coordinator.take_slot_flag(FrameLabel::A), Some(B));
        assert_eq!(coordinator.take_slot_flag(FrameLabel::A), None);
    }
}
