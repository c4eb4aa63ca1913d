use anyhow::Context;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

pub struct GfxSampler {
    handle: vk::Sampler,
}
impl DebugType for GfxSampler {
    fn debug_type_name() -> &'static str {
        "GfxSampler"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxSampler {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_sampler(self.handle, None);
        }
    }
}

impl GfxSampler {
    pub fn new(info: &vk::SamplerCreateInfo, debug_name: &str) -> anyhow::Result<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let handle =
            unsafe { gfx_device.create_sampler(info, None) }.with_context(|| format!("create sampler {debug_name}"))?;
        let sampler = Self { handle };
        gfx_device.set_debug_name(&sampler, debug_name);
        Ok(sampler)
    }

    /// 整数格式的 image 只能使用 nearest 采样
    pub fn nearest_clamp_info() -> vk::SamplerCreateInfo<'static> {
        vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::NEAREST)
            .min_filter(vk::Filter::NEAREST)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .max_lod(vk::LOD_CLAMP_NONE)
    }

    /// 默认配置：linear，clamp
    pub fn linear_clamp_info() -> vk::SamplerCreateInfo<'static> {
        Self::nearest_clamp_info()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }
}
