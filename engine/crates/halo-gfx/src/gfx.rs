use anyhow::Context;
use ash::vk;

use crate::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, command_queue::GfxCommandQueue,
        fence::GfxFence, submit_info::GfxSubmitInfo,
    },
    foundation::{
        device::GfxDevice,
        instance::GfxInstance,
        mem_allocator::GfxMemAllocator,
        physical_device::{GfxPhysicalDevice, QueueFamilyIndices},
    },
    gfx_core::GfxCore,
    swapchain::surface::GfxSurface,
};

/// Vulkan 图形上下文单例
///
/// 管理所有 Vulkan 核心资源，包括实例、surface、设备、三条队列以及内存分配器。
/// 采用单例模式简化参数传递和生命周期管理，仅适用于单线程环境。
///
/// # 初始化流程
/// ```ignore
/// Gfx::init("MyApp", display_handle, window_handle)?;
/// let device = Gfx::get().gfx_device();
/// // 使用...
/// Gfx::destroy();
/// ```
pub struct Gfx {
    pub(crate) gfx_core: GfxCore,
    pub(crate) vm_allocator: GfxMemAllocator,

    /// 临时的 graphics command pool，用于 one time 命令
    pub(crate) temp_graphics_command_pool: GfxCommandPool,
}

// 创建与销毁
impl Gfx {
    const ENGINE_NAME: &'static str = "Halo";

    fn new(
        app_name: &str,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> anyhow::Result<Self> {
        let gfx_core = GfxCore::new(app_name, Self::ENGINE_NAME, raw_display_handle, raw_window_handle)?;

        let vm_allocator = GfxMemAllocator::new(
            &gfx_core.instance.ash_instance,
            gfx_core.physical_device.vk_handle,
            &gfx_core.gfx_device,
        )?;

        // 单例还没有初始化，只能显式传入 device
        let temp_graphics_command_pool = GfxCommandPool::new_with_device(
            &gfx_core.gfx_device,
            &gfx_core.graphics_queue.queue_family,
            vk::CommandPoolCreateFlags::TRANSIENT,
            "gfx-one-time",
        )?;

        Ok(Self {
            gfx_core,
            vm_allocator,
            temp_graphics_command_pool,
        })
    }
}

// 此静态变量仅用于单线程环境
static mut G_GFX: Option<Gfx> = None;

// 单例模式
// - Gfx 自身的生命周期管理比较简单，因此适合使用单例模式
// - 其他类型的签名无需携带 device 的引用
impl Gfx {
    /// # Panics
    /// 如果 Gfx 还未初始化，此方法会 panic
    #[inline]
    pub fn get() -> &'static Gfx {
        unsafe {
            // 使用 addr_of! 避免直接对 static mut 创建引用
            let ptr = std::ptr::addr_of!(G_GFX);
            (*ptr).as_ref().expect("Gfx not initialized. Call Gfx::init() first.")
        }
    }

    /// # Panics
    /// 如果 Gfx 已经被初始化，此方法会 panic
    pub fn init(
        app_name: &str,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> anyhow::Result<()> {
        let gfx = Self::new(app_name, raw_display_handle, raw_window_handle)?;
        unsafe {
            let ptr = std::ptr::addr_of_mut!(G_GFX);
            assert!((*ptr).is_none(), "Gfx already initialized");
            *ptr = Some(gfx);
        }
        Ok(())
    }

    /// 调用此方法后，不应再使用 Gfx::get()
    pub fn destroy() {
        let gfx = unsafe {
            let ptr = std::ptr::addr_of_mut!(G_GFX);
            (*ptr).take()
        };
        let Some(Gfx {
            gfx_core,
            vm_allocator,
            mut temp_graphics_command_pool,
        }) = gfx
        else {
            log::warn!("Gfx::destroy called without init");
            return;
        };

        // vma 需要在 device 之前销毁
        drop(vm_allocator);
        temp_graphics_command_pool.destroy_with_device(&gfx_core.gfx_device);
        gfx_core.destroy();
    }
}

// getter
impl Gfx {
    #[inline]
    pub fn instance(&self) -> &GfxInstance {
        &self.gfx_core.instance
    }

    #[inline]
    pub fn gfx_device(&self) -> &GfxDevice {
        &self.gfx_core.gfx_device
    }

    #[inline]
    pub fn allocator(&self) -> &GfxMemAllocator {
        &self.vm_allocator
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.gfx_core.physical_device
    }

    #[inline]
    pub fn surface(&self) -> &GfxSurface {
        &self.gfx_core.surface
    }

    #[inline]
    pub fn queue_family_indices(&self) -> QueueFamilyIndices {
        self.gfx_core.physical_device.queue_family_indices()
    }

    /// 同时支持 graphics 和 present
    #[inline]
    pub fn graphics_queue(&self) -> &GfxCommandQueue {
        &self.gfx_core.graphics_queue
    }

    #[inline]
    pub fn compute_queue(&self) -> &GfxCommandQueue {
        &self.gfx_core.compute_queue
    }

    #[inline]
    pub fn transfer_queue(&self) -> &GfxCommandQueue {
        &self.gfx_core.transfer_queue
    }
}

// tools
impl Gfx {
    /// 返回 candidates 中受支持的第一个格式
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Option<vk::Format> {
        candidates.iter().copied().find(|f| {
            let props = unsafe {
                self.instance()
                    .ash_instance
                    .get_physical_device_format_properties(self.physical_device().vk_handle, *f)
            };
            match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
    }

    /// 立即执行某个 command，并同步等待执行结果
    pub fn one_time_exec<F, R>(&self, func: F, name: impl AsRef<str>) -> anyhow::Result<R>
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let name = name.as_ref();
        let command_buffer = GfxCommandBuffer::new(&self.temp_graphics_command_pool, &format!("one-time-{name}"))?;
        let fence = GfxFence::new(false, &format!("one-time-{name}"))?;

        let result: anyhow::Result<R> = (|| {
            command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name)?;
            let result = func(&command_buffer);
            command_buffer.end()?;

            self.graphics_queue().submit(&[GfxSubmitInfo::new(&[&command_buffer])], Some(&fence))?;
            fence.wait().with_context(|| format!("wait one time command {name}"))?;
            Ok(result)
        })();

        fence.destroy();
        unsafe {
            self.gfx_device().free_command_buffers(self.temp_graphics_command_pool.handle(), &[command_buffer.vk_handle()]);
        }

        result
    }

    pub fn wait_idle(&self) -> anyhow::Result<()> {
        self.gfx_device().wait_idle()
    }
}
