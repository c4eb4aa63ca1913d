use std::collections::HashMap;
use std::ffi::CStr;

use anyhow::Context;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// # Destroy
///
/// 需要手动调用 `destroy` 方法来释放资源。
pub struct ShaderModule {
    handle: vk::ShaderModule,

    #[cfg(debug_assertions)]
    destroyed: bool,
}
impl ShaderModule {
    /// # param
    /// * path - spv shader 文件路径
    pub fn new(path: &std::path::Path) -> anyhow::Result<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let mut file =
            std::fs::File::open(path).with_context(|| format!("open shader file {}", path.display()))?;
        let shader_code = ash::util::read_spv(&mut file).with_context(|| format!("read spv {}", path.display()))?;

        let shader_module_info = vk::ShaderModuleCreateInfo::default().code(&shader_code);

        let handle = unsafe { gfx_device.create_shader_module(&shader_module_info, None) }
            .with_context(|| format!("create shader module {}", path.display()))?;
        let shader_module = Self {
            handle,

            #[cfg(debug_assertions)]
            destroyed: false,
        };
        gfx_device.set_debug_name(&shader_module, path.to_string_lossy());
        Ok(shader_module)
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    #[inline]
    pub fn destroy(mut self) {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.destroy_shader_module(self.handle, None);
        }
        #[cfg(debug_assertions)]
        {
            self.destroyed = true;
        }
    }
}
impl Drop for ShaderModule {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed, "ShaderModule must be destroyed manually before drop.");
    }
}
impl DebugType for ShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

/// 可以存放多个 ShaderModule，使用路径进行索引
#[derive(Default)]
pub struct ShaderModuleCache {
    shader_modules: HashMap<String, ShaderModule>,
}
impl ShaderModuleCache {
    pub fn get_or_load(&mut self, path: &std::path::Path) -> anyhow::Result<vk::ShaderModule> {
        let key = path.to_string_lossy().into_owned();
        if let Some(module) = self.shader_modules.get(&key) {
            return Ok(module.handle());
        }
        let module = ShaderModule::new(path)?;
        let handle = module.handle();
        self.shader_modules.insert(key, module);
        Ok(handle)
    }

    pub fn destroy(mut self) {
        std::mem::take(&mut self.shader_modules).into_values().for_each(ShaderModule::destroy);
    }
}

#[derive(Clone, Debug)]
pub struct ShaderStageInfo {
    pub stage: vk::ShaderStageFlags,
    pub entry_point: &'static CStr,
    pub path: String,
}
impl ShaderStageInfo {
    #[inline]
    pub fn path(&self) -> &std::path::Path {
        std::path::Path::new(self.path.as_str())
    }
}

/// specialization constant，所有 constant 都按 4 字节存放
#[derive(Clone, Debug, Default)]
pub struct SpecializationConstants {
    entries: Vec<vk::SpecializationMapEntry>,
    data: Vec<u8>,
}
impl SpecializationConstants {
    /// builder
    pub fn constant_u32(mut self, constant_id: u32, value: u32) -> Self {
        self.entries.push(vk::SpecializationMapEntry {
            constant_id,
            offset: self.data.len() as u32,
            size: size_of::<u32>(),
        });
        self.data.extend_from_slice(&value.to_ne_bytes());
        self
    }

    /// builder，GLSL 中的 bool constant 对应 Bool32
    #[inline]
    pub fn constant_bool(self, constant_id: u32, value: bool) -> Self {
        self.constant_u32(constant_id, value as vk::Bool32)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn info(&self) -> vk::SpecializationInfo<'_> {
        vk::SpecializationInfo::default().map_entries(&self.entries).data(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialization_entries_are_packed() {
        let spec = SpecializationConstants::default().constant_u32(0, 2).constant_bool(1, true);
        let info = spec.info();
        assert_eq!(info.map_entry_count, 2);
        assert_eq!(info.data_size, 8);
        assert_eq!(spec.entries[1].offset, 4);
        assert_eq!(&spec.data[4..8], &1u32.to_ne_bytes());
    }
}
