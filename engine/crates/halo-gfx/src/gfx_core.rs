use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use itertools::Itertools;

use crate::{
    commands::command_queue::GfxCommandQueue,
    foundation::{
        debug_messenger::GfxDebugMsger, device::GfxDevice, instance::GfxInstance, physical_device::GfxPhysicalDevice,
    },
    swapchain::surface::GfxSurface,
};

pub struct GfxCore {
    /// vk 基础函数的接口
    ///
    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    pub(crate) vk_entry: ash::Entry,

    pub(crate) instance: GfxInstance,
    pub(crate) surface: GfxSurface,
    pub(crate) physical_device: GfxPhysicalDevice,

    /// queue 内部需要持有 device 的函数指针
    pub(crate) gfx_device: Rc<GfxDevice>,

    pub(crate) debug_utils: GfxDebugMsger,

    pub(crate) graphics_queue: GfxCommandQueue,
    pub(crate) compute_queue: GfxCommandQueue,
    pub(crate) transfer_queue: GfxCommandQueue,
}

// 创建与销毁
impl GfxCore {
    pub fn new(
        app_name: &str,
        engine_name: &str,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> anyhow::Result<Self> {
        let vk_entry = unsafe { ash::Entry::load() }.context("load vulkan entry")?;

        let surface_exts = ash_window::enumerate_required_extensions(raw_display_handle)
            .context("query surface instance extensions")?
            .iter()
            .map(|ext| unsafe { std::ffi::CStr::from_ptr(*ext) })
            .collect_vec();
        let instance = GfxInstance::new(&vk_entry, app_name, engine_name, &surface_exts)?;
        let surface = GfxSurface::new(&vk_entry, &instance.ash_instance, raw_display_handle, raw_window_handle)?;

        let physical_device = GfxPhysicalDevice::pick(&instance.ash_instance, |pdevice, family_index| {
            surface.support_present(pdevice, family_index)
        })?;
        let indices = physical_device.queue_family_indices();
        log::info!("queue family indices: {:?}", indices);

        // 相同的 queue family 只创建一次 queue，每个 family 取 index 0
        let priorities = [1.0];
        let queue_create_infos = indices
            .unique()
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo::default().queue_family_index(family).queue_priorities(&priorities))
            .collect_vec();

        let gfx_device =
            Rc::new(GfxDevice::new(&instance.ash_instance, physical_device.vk_handle, &queue_create_infos)?);
        let make_queue = |name: &str, family_index: u32| GfxCommandQueue {
            vk_queue: unsafe { gfx_device.get_device_queue(family_index, 0) },
            queue_family: physical_device.queue_family(name, family_index),
            gfx_device: gfx_device.clone(),
        };
        let graphics_queue = make_queue("graphics-present", indices.graphics_present);
        let compute_queue = make_queue("compute", indices.compute);
        let transfer_queue = make_queue("transfer", indices.transfer);

        let debug_utils = GfxDebugMsger::new(&vk_entry, &instance.ash_instance)?;

        // 在 device 以及 debug_utils 之前创建的 vk::Handle
        {
            gfx_device.set_object_debug_name(instance.vk_instance(), "GfxInstance");
            gfx_device.set_debug_name(&surface, "main");
            gfx_device.set_debug_name(&physical_device, "GfxPhysicalDevice");
            gfx_device.set_object_debug_name(gfx_device.vk_handle(), "GfxDevice");
            for queue in [&graphics_queue, &compute_queue, &transfer_queue] {
                gfx_device.set_debug_name(queue, format!("GfxQueue-{}", queue.queue_family.name));
            }
        }

        Ok(Self {
            vk_entry,
            instance,
            surface,
            physical_device,
            gfx_device,
            debug_utils,
            graphics_queue,
            compute_queue,
            transfer_queue,
        })
    }

    pub fn destroy(self) {
        let Self {
            vk_entry,
            instance,
            surface,
            gfx_device,
            debug_utils,
            graphics_queue,
            compute_queue,
            transfer_queue,
            ..
        } = self;

        drop((graphics_queue, compute_queue, transfer_queue));
        gfx_device.destroy();
        drop(debug_utils);
        surface.destroy();
        instance.destroy();
        drop(vk_entry);
    }
}
