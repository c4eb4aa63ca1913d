use anyhow::Context;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 描述符池创建信息
///
/// pool size 需要和 create info 保持同样的生命周期
pub struct GfxDescriptorPoolCreateInfo {
    flags: vk::DescriptorPoolCreateFlags,
    max_sets: u32,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
}
impl GfxDescriptorPoolCreateInfo {
    #[inline]
    pub fn new(flags: vk::DescriptorPoolCreateFlags, max_sets: u32, pool_sizes: Vec<vk::DescriptorPoolSize>) -> Self {
        Self {
            flags,
            max_sets,
            pool_sizes,
        }
    }

    #[inline]
    fn info(&self) -> vk::DescriptorPoolCreateInfo<'_> {
        vk::DescriptorPoolCreateInfo::default()
            .flags(self.flags)
            .max_sets(self.max_sets)
            .pool_sizes(&self.pool_sizes)
    }
}

/// 描述符池，drop 时会一并释放从中分配的所有 descriptor set
pub struct GfxDescriptorPool {
    handle: vk::DescriptorPool,
    name: String,
}
impl DebugType for GfxDescriptorPool {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxDescriptorPool {
    fn drop(&mut self) {
        log::info!("destroying descriptor pool: {}", self.name);
        unsafe { Gfx::get().gfx_device().destroy_descriptor_pool(self.handle, None) };
    }
}
impl GfxDescriptorPool {
    pub fn new(ci: &GfxDescriptorPoolCreateInfo, name: &str) -> anyhow::Result<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_descriptor_pool(&ci.info(), None) }
            .with_context(|| format!("create descriptor pool {name}"))?;
        let pool = Self {
            handle,
            name: name.to_string(),
        };
        gfx_device.set_debug_name(&pool, name);
        Ok(pool)
    }

    /// 每个 layout 分配一个 descriptor set
    pub fn allocate(&self, layouts: &[vk::DescriptorSetLayout]) -> anyhow::Result<Vec<vk::DescriptorSet>> {
        let info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(self.handle).set_layouts(layouts);
        unsafe { Gfx::get().gfx_device().allocate_descriptor_sets(&info) }
            .with_context(|| format!("allocate descriptor sets from {}", self.name))
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }
}
