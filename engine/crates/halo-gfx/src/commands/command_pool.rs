use anyhow::Context;
use ash::vk;

use crate::{commands::command_queue::GfxQueueFamily, foundation::debug_messenger::DebugType, gfx::Gfx};

/// command pool 是和 queue family 绑定的，而不是和 queue 绑定的
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    queue_family_index: u32,

    debug_name: String,
    valid: bool,
}
// init & destory
impl GfxCommandPool {
    pub fn new(queue_family: &GfxQueueFamily, flags: vk::CommandPoolCreateFlags, debug_name: &str) -> anyhow::Result<Self> {
        Self::new_with_device(Gfx::get().gfx_device(), queue_family, flags, debug_name)
    }

    /// Gfx 单例尚未初始化时使用
    pub(crate) fn new_with_device(
        gfx_device: &crate::foundation::device::GfxDevice,
        queue_family: &GfxQueueFamily,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let pool = unsafe {
            gfx_device.create_command_pool(
                &vk::CommandPoolCreateInfo::default().queue_family_index(queue_family.queue_family_index).flags(flags),
                None,
            )
        }
        .with_context(|| format!("create command pool {debug_name}"))?;

        let command_pool = Self {
            handle: pool,
            queue_family_index: queue_family.queue_family_index,
            debug_name: debug_name.to_string(),
            valid: true,
        };
        gfx_device.set_debug_name(&command_pool, debug_name);
        Ok(command_pool)
    }

    pub fn destroy(&mut self) {
        self.destroy_with_device(Gfx::get().gfx_device());
    }

    pub(crate) fn destroy_with_device(&mut self, gfx_device: &crate::foundation::device::GfxDevice) {
        unsafe {
            gfx_device.destroy_command_pool(self.handle, None);
        }
        self.valid = false;
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }
}
// tools
impl GfxCommandPool {
    /// 将 pool 内的 command buffer 设置到初始状态，之后可以重新录制命令
    ///
    /// 调用者需要保证这些 command buffer 已经执行完毕
    pub fn reset_all_buffers(&self) -> anyhow::Result<()> {
        let gfx_device = Gfx::get().gfx_device();
        unsafe { gfx_device.reset_command_pool(self.handle, vk::CommandPoolResetFlags::RELEASE_RESOURCES) }
            .with_context(|| format!("reset command pool {}", self.debug_name))
    }
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        assert!(!self.valid, "CommandPool {} must be destroyed manually.", self.debug_name);
    }
}
