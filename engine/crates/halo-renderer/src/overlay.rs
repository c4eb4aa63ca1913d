use ash::vk;
use halo_gfx::commands::command_buffer::GfxCommandBuffer;

/// 在 composition pass 的最后绘制 UI
///
/// 调用时 swapchain image 处于 COLOR_ATTACHMENT_OPTIMAL，并且已经包含场景以及描边；
/// overlay 需要自己 begin/end rendering
pub trait UiOverlay {
    fn record(&mut self, cmd: &GfxCommandBuffer, swapchain_view: vk::ImageView, extent: vk::Extent2D);
}

/// 不绘制任何内容
#[derive(Debug, Default)]
pub struct NullOverlay;
impl UiOverlay for NullOverlay {
    fn record(&mut self, _cmd: &GfxCommandBuffer, _swapchain_view: vk::ImageView, _extent: vk::Extent2D) {}
}
