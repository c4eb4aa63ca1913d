use anyhow::Context;
use ash::vk;

use crate::foundation::debug_messenger::DebugType;

/// 窗口对应的 surface
///
/// 需要在选择物理设备之前创建，因为 present 能力是按 surface 查询的
///
/// # destroy
/// 跟随 GfxCore 一起销毁，需要在 instance 之前、swapchain 之后
pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
}

impl GfxSurface {
    pub fn new(
        vk_entry: &ash::Entry,
        instance: &ash::Instance,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> anyhow::Result<Self> {
        let pf = ash::khr::surface::Instance::new(vk_entry, instance);
        let handle =
            unsafe { ash_window::create_surface(vk_entry, instance, raw_display_handle, raw_window_handle, None) }
                .context("create window surface")?;
        Ok(Self { handle, pf })
    }

    pub fn destroy(self) {
        log::info!("destroying surface");
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}

// getters
impl GfxSurface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// 某个 queue family 是否可以向这个 surface present
    pub fn support_present(&self, pdevice: vk::PhysicalDevice, queue_family_index: u32) -> bool {
        unsafe { self.pf.get_physical_device_surface_support(pdevice, queue_family_index, self.handle) }
            .unwrap_or(false)
    }

    pub fn capabilities(&self, pdevice: vk::PhysicalDevice) -> anyhow::Result<vk::SurfaceCapabilitiesKHR> {
        unsafe { self.pf.get_physical_device_surface_capabilities(pdevice, self.handle) }
            .context("query surface capabilities")
    }

    pub fn formats(&self, pdevice: vk::PhysicalDevice) -> anyhow::Result<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.pf.get_physical_device_surface_formats(pdevice, self.handle) }.context("query surface formats")
    }

    pub fn present_modes(&self, pdevice: vk::PhysicalDevice) -> anyhow::Result<Vec<vk::PresentModeKHR>> {
        unsafe { self.pf.get_physical_device_surface_present_modes(pdevice, self.handle) }
            .context("query surface present modes")
    }
}

impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
