use anyhow::Context;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 单个 binding 的描述
#[derive(Clone, Copy, Debug)]
pub struct GfxDescriptorBinding {
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub count: u32,
    pub stage: vk::ShaderStageFlags,
}
impl GfxDescriptorBinding {
    #[inline]
    pub const fn new(binding: u32, ty: vk::DescriptorType, stage: vk::ShaderStageFlags) -> Self {
        Self {
            binding,
            ty,
            count: 1,
            stage,
        }
    }

    #[inline]
    fn vk_binding(&self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(self.binding)
            .descriptor_type(self.ty)
            .descriptor_count(self.count)
            .stage_flags(self.stage)
    }
}

/// 统计一组 binding 所需的 pool size，相同类型的 descriptor 合并
pub fn pool_sizes_for(bindings: &[GfxDescriptorBinding], set_count: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in bindings {
        match sizes.iter_mut().find(|s| s.ty == binding.ty) {
            Some(size) => size.descriptor_count += binding.count * set_count,
            None => sizes.push(vk::DescriptorPoolSize {
                ty: binding.ty,
                descriptor_count: binding.count * set_count,
            }),
        }
    }
    sizes
}

pub struct GfxDescriptorSetLayout {
    handle: vk::DescriptorSetLayout,
    bindings: Vec<GfxDescriptorBinding>,
}
impl DebugType for GfxDescriptorSetLayout {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSetLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe { Gfx::get().gfx_device().destroy_descriptor_set_layout(self.handle, None) };
    }
}
impl GfxDescriptorSetLayout {
    pub fn new(bindings: &[GfxDescriptorBinding], debug_name: &str) -> anyhow::Result<Self> {
        let vk_bindings = bindings.iter().map(GfxDescriptorBinding::vk_binding).collect::<Vec<_>>();
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);

        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_descriptor_set_layout(&info, None) }
            .with_context(|| format!("create descriptor set layout {debug_name}"))?;
        let layout = Self {
            handle,
            bindings: bindings.to_vec(),
        };
        gfx_device.set_debug_name(&layout, debug_name);
        Ok(layout)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    #[inline]
    pub fn bindings(&self) -> &[GfxDescriptorBinding] {
        &self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_sizes_merge_same_type() {
        let bindings = [
            GfxDescriptorBinding::new(0, vk::DescriptorType::STORAGE_IMAGE, vk::ShaderStageFlags::COMPUTE),
            GfxDescriptorBinding::new(1, vk::DescriptorType::STORAGE_IMAGE, vk::ShaderStageFlags::COMPUTE),
            GfxDescriptorBinding::new(2, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT),
        ];
        let sizes = pool_sizes_for(&bindings, 2);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::STORAGE_IMAGE);
        assert_eq!(sizes[0].descriptor_count, 4);
        assert_eq!(sizes[1].descriptor_count, 2);
    }
}
