use anyhow::Context;
use ash::vk;
use vk_mem::Alloc;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 由 VMA 分配的 image，drop 时释放
pub struct GfxImage {
    handle: vk::Image,
    allocation: vk_mem::Allocation,

    extent: vk::Extent3D,
    format: vk::Format,
    array_layers: u32,

    name: String,
}
// getter
impl GfxImage {
    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    #[inline]
    pub fn extent_2d(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.extent.width,
            height: self.extent.height,
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }
}
// new & init
impl GfxImage {
    pub fn new(
        image_info: &GfxImageCreateInfo,
        alloc_info: &vk_mem::AllocationCreateInfo,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let allocator = Gfx::get().allocator();
        let (image, allocation) = unsafe { allocator.create_image(&image_info.as_info(), alloc_info) }
            .with_context(|| format!("allocate image {debug_name}"))?;
        let image = Self {
            handle: image,
            allocation,
            extent: image_info.inner.extent,
            format: image_info.inner.format,
            array_layers: image_info.inner.array_layers,

            name: debug_name.to_string(),
        };
        Gfx::get().gfx_device().set_debug_name(&image, debug_name);
        Ok(image)
    }

    /// 放在 device local 内存中的 image
    #[inline]
    pub fn new_device_local(image_info: &GfxImageCreateInfo, debug_name: &str) -> anyhow::Result<Self> {
        Self::new(
            image_info,
            &vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            debug_name,
        )
    }
}
impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxImage {
    fn drop(&mut self) {
        log::debug!("destroying image: {}", self.name);
        unsafe { Gfx::get().allocator().destroy_image(self.handle, &mut self.allocation) }
    }
}

pub struct GfxImageCreateInfo {
    inner: vk::ImageCreateInfo<'static>,

    queue_family_indices: Vec<u32>,
}
impl GfxImageCreateInfo {
    #[inline]
    pub fn new_image_2d_info(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            inner: vk::ImageCreateInfo {
                image_type: vk::ImageType::TYPE_2D,
                format,
                extent: extent.into(),
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                // Vulkan 要求这里只能是 UNDEFINED 或者 PREINITIALIZED
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            },
            queue_family_indices: Vec::new(),
        }
    }

    /// 6 个 layer 的 cube map
    #[inline]
    pub fn new_cube_info(size: u32, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        let mut info = Self::new_image_2d_info(
            vk::Extent2D {
                width: size,
                height: size,
            },
            format,
            usage,
        );
        info.inner.array_layers = 6;
        info.inner.flags = vk::ImageCreateFlags::CUBE_COMPATIBLE;
        info
    }

    #[inline]
    pub fn as_info(&self) -> vk::ImageCreateInfo<'_> {
        let mut info = self.inner;
        if self.queue_family_indices.len() > 1 {
            info = info.sharing_mode(vk::SharingMode::CONCURRENT).queue_family_indices(&self.queue_family_indices);
        }
        info
    }

    /// builder
    #[inline]
    pub fn array_layers(mut self, layers: u32) -> Self {
        self.inner.array_layers = layers;
        self
    }

    /// builder
    #[inline]
    pub fn samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.inner.samples = samples;
        self
    }

    /// builder
    ///
    /// 多个 queue family 共享时使用 CONCURRENT 模式，无需 ownership transfer；
    /// 去重后只剩一个 family 时保持 EXCLUSIVE
    #[inline]
    pub fn queue_family_indices(mut self, queue_family_indices: &[u32]) -> Self {
        let mut indices = queue_family_indices.to_vec();
        indices.sort_unstable();
        indices.dedup();
        self.queue_family_indices = indices;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent() -> vk::Extent2D {
        vk::Extent2D {
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn shared_families_use_concurrent_mode() {
        let info = GfxImageCreateInfo::new_image_2d_info(extent(), vk::Format::R16G16_UINT, vk::ImageUsageFlags::STORAGE)
            .array_layers(2)
            .queue_family_indices(&[0, 2, 0]);
        let vk_info = info.as_info();
        assert_eq!(vk_info.sharing_mode, vk::SharingMode::CONCURRENT);
        assert_eq!(vk_info.queue_family_index_count, 2);
        assert_eq!(vk_info.array_layers, 2);
    }

    #[test]
    fn single_family_stays_exclusive() {
        let info = GfxImageCreateInfo::new_image_2d_info(extent(), vk::Format::R32_UINT, vk::ImageUsageFlags::SAMPLED)
            .queue_family_indices(&[1, 1, 1]);
        assert_eq!(info.as_info().sharing_mode, vk::SharingMode::EXCLUSIVE);
    }

    #[test]
    fn cube_info_has_six_layers() {
        let info = GfxImageCreateInfo::new_cube_info(16, vk::Format::R8G8B8A8_UNORM, vk::ImageUsageFlags::SAMPLED);
        let vk_info = info.as_info();
        assert_eq!(vk_info.array_layers, 6);
        assert!(vk_info.flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE));
    }
}
