use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::{
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    pipelines::{pipeline_layout::PipelineLayout, shader::ShaderModule},
};

pub struct ComputePipeline {
    pipeline: vk::Pipeline,
    pipeline_layout: Rc<PipelineLayout>,
}
impl ComputePipeline {
    pub fn new(
        shader_path: &std::path::Path,
        entry_point: &std::ffi::CStr,
        pipeline_layout: Rc<PipelineLayout>,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let shader_module = ShaderModule::new(shader_path)?;
        let stage_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader_module.handle())
            .name(entry_point);
        let pipeline_info =
            vk::ComputePipelineCreateInfo::default().stage(stage_info).layout(pipeline_layout.handle());

        let gfx_device = Gfx::get().gfx_device();
        let result = unsafe {
            gfx_device.create_compute_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
        };
        shader_module.destroy();

        let pipeline = result
            .map_err(|(_, e)| e)
            .with_context(|| format!("create compute pipeline {debug_name}"))?[0];
        let pipeline = Self {
            pipeline,
            pipeline_layout,
        };
        gfx_device.set_debug_name(&pipeline, debug_name);
        Ok(pipeline)
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout.handle()
    }
}
impl Drop for ComputePipeline {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_pipeline(self.pipeline, None);
        }
    }
}
impl DebugType for ComputePipeline {
    fn debug_type_name() -> &'static str {
        "GfxComputePipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.pipeline
    }
}
