use anyhow::Context;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// drop 时销毁 view，不影响 image 本身
pub struct GfxImageView {
    handle: vk::ImageView,
    desc: GfxImageViewDesc,
}
impl DebugType for GfxImageView {
    fn debug_type_name() -> &'static str {
        "GfxImageView"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// new & init
impl GfxImageView {
    pub fn new(image: vk::Image, view_desc: GfxImageViewDesc, name: impl AsRef<str>) -> anyhow::Result<Self> {
        let gfx_device = Gfx::get().gfx_device();

        let info = vk::ImageViewCreateInfo {
            image,
            view_type: view_desc.view_type,
            format: view_desc.format,
            subresource_range: view_desc.subresource_range(),
            ..Default::default()
        };

        let handle = unsafe { gfx_device.create_image_view(&info, None) }
            .with_context(|| format!("create image view {}", name.as_ref()))?;
        let image_view = Self { handle, desc: view_desc };
        gfx_device.set_debug_name(&image_view, name);
        Ok(image_view)
    }
}
impl Drop for GfxImageView {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_image_view(self.handle, None);
        }
    }
}
// getters
impl GfxImageView {
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }

    #[inline]
    pub fn desc(&self) -> &GfxImageViewDesc {
        &self.desc
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxImageViewDesc {
    /// format 可以基于 vk::Image 重解释
    pub(crate) format: vk::Format,
    pub(crate) view_type: vk::ImageViewType,
    pub(crate) aspect_mask: vk::ImageAspectFlags,
    /// base mip level 和 mip level count
    pub(crate) mip: (u32, u32),
    /// base layer 和 layer count
    pub(crate) layer: (u32, u32),
}
impl GfxImageViewDesc {
    pub fn new_2d(format: vk::Format, aspect: vk::ImageAspectFlags) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::TYPE_2D,
            aspect_mask: aspect,
            mip: (0, 1),
            layer: (0, 1),
        }
    }

    /// array image 中的单个 layer，按 2D 解释
    pub fn new_2d_layer(format: vk::Format, aspect: vk::ImageAspectFlags, layer: u32) -> Self {
        Self {
            layer: (layer, 1),
            ..Self::new_2d(format, aspect)
        }
    }

    /// 整个 array image
    pub fn new_2d_array(format: vk::Format, aspect: vk::ImageAspectFlags, layer_count: u32) -> Self {
        Self {
            view_type: vk::ImageViewType::TYPE_2D_ARRAY,
            layer: (0, layer_count),
            ..Self::new_2d(format, aspect)
        }
    }

    pub fn new_cube(format: vk::Format) -> Self {
        Self {
            view_type: vk::ImageViewType::CUBE,
            layer: (0, 6),
            ..Self::new_2d(format, vk::ImageAspectFlags::COLOR)
        }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect_mask,
            base_mip_level: self.mip.0,
            level_count: self.mip.1,
            base_array_layer: self.layer.0,
            layer_count: self.layer.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_view_covers_exactly_one_layer() {
        let desc = GfxImageViewDesc::new_2d_layer(vk::Format::R16G16_UINT, vk::ImageAspectFlags::COLOR, 1);
        let range = desc.subresource_range();
        assert_eq!(desc.view_type, vk::ImageViewType::TYPE_2D);
        assert_eq!((range.base_array_layer, range.layer_count), (1, 1));
    }

    #[test]
    fn array_view_covers_all_layers() {
        let desc = GfxImageViewDesc::new_2d_array(vk::Format::R16G16_UINT, vk::ImageAspectFlags::COLOR, 2);
        assert_eq!(desc.view_type, vk::ImageViewType::TYPE_2D_ARRAY);
        assert_eq!(desc.subresource_range().layer_count, 2);
    }
}
