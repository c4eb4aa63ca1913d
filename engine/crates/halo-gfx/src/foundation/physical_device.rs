use std::ffi::CStr;

use anyhow::{Context, anyhow};
use ash::vk;
use itertools::Itertools;

use crate::{commands::command_queue::GfxQueueFamily, foundation::debug_messenger::DebugType};

/// 三条逻辑队列对应的 queue family，允许互相重叠
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub compute: u32,
    pub graphics_present: u32,
    pub transfer: u32,
}

impl QueueFamilyIndices {
    /// 选择 queue family
    ///
    /// - compute: 优先不带 graphics 的 compute family，否则任意 compute family
    /// - graphics_present: 必须同时支持 graphics 和 present
    /// - transfer: 优先纯 transfer family（忽略 sparse binding），否则任意支持 transfer 的 family
    ///
    /// 找不到 graphics_present 时返回 None
    pub fn select(props: &[vk::QueueFamilyProperties], present_support: impl Fn(u32) -> bool) -> Option<Self> {
        let families = || props.iter().enumerate().map(|(idx, p)| (idx as u32, p.queue_flags));

        let compute = families()
            .find(|(_, flags)| flags.contains(vk::QueueFlags::COMPUTE) && !flags.contains(vk::QueueFlags::GRAPHICS))
            .or_else(|| families().find(|(_, flags)| flags.contains(vk::QueueFlags::COMPUTE)))
            .map(|(idx, _)| idx);

        let graphics_present = families()
            .find(|(idx, flags)| flags.contains(vk::QueueFlags::GRAPHICS) && present_support(*idx))
            .map(|(idx, _)| idx)?;

        let transfer = families()
            .find(|(_, flags)| (*flags & !vk::QueueFlags::SPARSE_BINDING) == vk::QueueFlags::TRANSFER)
            .or_else(|| families().find(|(_, flags)| flags.intersects(vk::QueueFlags::TRANSFER)))
            .map(|(idx, _)| idx);

        // graphics family 一定隐式支持 compute 和 transfer
        Some(Self {
            compute: compute.unwrap_or(graphics_present),
            graphics_present,
            transfer: transfer.unwrap_or(graphics_present),
        })
    }

    /// 去重之后的 family index，用于创建 device queue 以及 CONCURRENT 共享的资源
    pub fn unique(&self) -> Vec<u32> {
        [self.compute, self.graphics_present, self.transfer].into_iter().sorted().dedup().collect()
    }
}

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    pub(crate) queue_family_indices: QueueFamilyIndices,
    pub(crate) queue_family_props: Vec<vk::QueueFamilyProperties>,
}

impl GfxPhysicalDevice {
    /// 优先选择独立显卡；显卡必须存在同时支持 graphics 和 present 的 queue family
    pub fn pick(instance: &ash::Instance, present_support: impl Fn(vk::PhysicalDevice, u32) -> bool) -> anyhow::Result<Self> {
        let pdevices = unsafe { instance.enumerate_physical_devices() }.context("enumerate physical devices")?;

        pdevices
            .into_iter()
            .filter_map(|pdevice| Self::new(instance, pdevice, |idx| present_support(pdevice, idx)))
            .find_or_first(Self::is_descrete_gpu)
            .ok_or_else(|| anyhow!("no gpu with a graphics + present queue family"))
    }

    fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, present_support: impl Fn(u32) -> bool) -> Option<Self> {
        let basic_props = unsafe { instance.get_physical_device_properties(pdevice) };
        let device_name = unsafe { CStr::from_ptr(basic_props.device_name.as_ptr()) };
        log::info!("found gpu: {:?}", device_name);

        let queue_family_props = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
        log::debug!("queue family props:\n{:#?}", queue_family_props);

        let Some(queue_family_indices) = QueueFamilyIndices::select(&queue_family_props, present_support) else {
            log::warn!("gpu {:?} has no graphics + present queue family, skipped", device_name);
            return None;
        };

        Some(Self {
            vk_handle: pdevice,
            basic_props,
            queue_family_indices,
            queue_family_props,
        })
    }

    /// 当前 gpu 是否是独立显卡
    #[inline]
    pub fn is_descrete_gpu(&self) -> bool {
        self.basic_props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    #[inline]
    pub fn queue_family_indices(&self) -> QueueFamilyIndices {
        self.queue_family_indices
    }

    /// 根据 index 构造 queue family 的描述
    pub(crate) fn queue_family(&self, name: &str, family_index: u32) -> GfxQueueFamily {
        let props = &self.queue_family_props[family_index as usize];
        GfxQueueFamily {
            name: name.to_string(),
            queue_family_index: family_index,
            queue_flags: props.queue_flags,
            queue_count: props.queue_count,
        }
    }
}

impl DebugType for GfxPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "GfxPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn dedicated_families_are_preferred() {
        let props = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER | vk::QueueFlags::SPARSE_BINDING),
        ];
        let indices = QueueFamilyIndices::select(&props, |_| true).unwrap();
        assert_eq!(indices.graphics_present, 0);
        assert_eq!(indices.compute, 1);
        assert_eq!(indices.transfer, 2);
        assert_eq!(indices.unique(), vec![0, 1, 2]);
    }

    #[test]
    fn single_family_aliases_all_queues() {
        let props = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];
        let indices = QueueFamilyIndices::select(&props, |_| true).unwrap();
        assert_eq!(indices.compute, 0);
        assert_eq!(indices.transfer, 0);
        assert_eq!(indices.unique(), vec![0]);
    }

    #[test]
    fn graphics_family_must_support_present() {
        let props = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::select(&props, |idx| idx == 1).unwrap();
        assert_eq!(indices.graphics_present, 1);

        assert!(QueueFamilyIndices::select(&props, |_| false).is_none());
    }
}
