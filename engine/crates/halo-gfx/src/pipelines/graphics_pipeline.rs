use std::{convert::identity, ffi::CStr, rc::Rc};

use anyhow::Context;
use ash::vk;
use itertools::Itertools;

use crate::{
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    pipelines::{
        pipeline_layout::PipelineLayout,
        shader::{ShaderModuleCache, ShaderStageInfo, SpecializationConstants},
    },
};

pub struct GraphicsPipeline {
    pipeline: vk::Pipeline,

    /// 多个 pipeline 可以使用同一个 pipeline layout
    pipeline_layout: Rc<PipelineLayout>,
}
impl GraphicsPipeline {
    pub fn new(
        create_info: &GraphicsPipelineCreateInfo,
        pipeline_layout: Rc<PipelineLayout>,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        // dynamic rendering 需要的 framebuffer 信息
        let mut attach_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&create_info.color_attach_formats)
            .depth_attachment_format(create_info.depth_attach_format)
            .stencil_attachment_format(create_info.stencil_attach_format);

        let mut shader_modules_cache = ShaderModuleCache::default();
        let modules = create_info
            .shader_stages
            .iter()
            .map(|stage| shader_modules_cache.get_or_load(stage.path()))
            .collect::<anyhow::Result<Vec<_>>>();
        let modules = match modules {
            Ok(modules) => modules,
            Err(e) => {
                shader_modules_cache.destroy();
                return Err(e.context(format!("load shaders of pipeline {debug_name}")));
            }
        };

        let specialization_info = create_info.specialization.info();
        let shader_stages_info = create_info
            .shader_stages
            .iter()
            .zip(modules)
            .map(|(stage, module)| {
                let info = vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage.stage)
                    .module(module)
                    .name(stage.entry_point);
                if create_info.specialization.is_empty() {
                    info
                } else {
                    info.specialization_info(&specialization_info)
                }
            })
            .collect_vec();

        // 顶点数据全部通过 buffer device address 读取，没有 vertex input
        let vertex_input_state_info = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(create_info.primitive_topology)
            .primitive_restart_enable(false);

        // viewport 和 scissor 具体值由 dynamic 决定，但是数量由该 create info 决定
        let viewport_info = vk::PipelineViewportStateCreateInfo {
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };

        // MSAA 配置
        let msaa_info = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(create_info.enable_sample_shading)
            .min_sample_shading(if create_info.enable_sample_shading { 1.0 } else { 0.0 })
            .rasterization_samples(create_info.msaa_sample);

        // 混合设置：需要为每个 color attachment 分别指定
        let color_blend_info = create_info.blend_info.attachments(&create_info.color_attach_blend_states);

        let dynamic_state_info =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&create_info.dynamic_states);

        // =======================================
        // === 创建 pipeline

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages_info)
            .vertex_input_state(&vertex_input_state_info)
            .input_assembly_state(&input_assembly_info)
            .viewport_state(&viewport_info)
            .rasterization_state(&create_info.rasterize_state_info)
            .multisample_state(&msaa_info)
            .color_blend_state(&color_blend_info)
            .depth_stencil_state(&create_info.depth_stencil_info)
            .layout(pipeline_layout.handle())
            .dynamic_state(&dynamic_state_info)
            .push_next(&mut attach_info);

        let gfx_device = Gfx::get().gfx_device();
        let result = unsafe {
            gfx_device.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
        };
        shader_modules_cache.destroy();

        let pipeline = result
            .map_err(|(_, e)| e)
            .with_context(|| format!("create graphics pipeline {debug_name}"))?[0];
        let pipeline = GraphicsPipeline {
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
impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_pipeline(self.pipeline, None);
        }
    }
}
impl DebugType for GraphicsPipeline {
    fn debug_type_name() -> &'static str {
        "GfxGraphicsPipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.pipeline
    }
}

#[derive(Clone)]
pub struct GraphicsPipelineCreateInfo {
    /// dynamic render 需要的 framebuffer 信息
    color_attach_formats: Vec<vk::Format>,
    depth_attach_format: vk::Format,
    stencil_attach_format: vk::Format,

    shader_stages: Vec<ShaderStageInfo>,
    /// 所有 stage 共用
    specialization: SpecializationConstants,

    primitive_topology: vk::PrimitiveTopology,

    rasterize_state_info: vk::PipelineRasterizationStateCreateInfo<'static>,

    msaa_sample: vk::SampleCountFlags,
    enable_sample_shading: bool,

    color_attach_blend_states: Vec<vk::PipelineColorBlendAttachmentState>,
    blend_info: vk::PipelineColorBlendStateCreateInfo<'static>,

    depth_stencil_info: vk::PipelineDepthStencilStateCreateInfo<'static>,

    dynamic_states: Vec<vk::DynamicState>,
}
impl Default for GraphicsPipelineCreateInfo {
    fn default() -> Self {
        Self {
            color_attach_formats: vec![],

            // format = undefined 表示不使用这个 attachment
            depth_attach_format: vk::Format::UNDEFINED,
            stencil_attach_format: vk::Format::UNDEFINED,

            shader_stages: vec![],
            specialization: SpecializationConstants::default(),

            primitive_topology: vk::PrimitiveTopology::TRIANGLE_LIST,

            rasterize_state_info: vk::PipelineRasterizationStateCreateInfo::default()
                .depth_clamp_enable(false)
                .rasterizer_discard_enable(false)
                .polygon_mode(vk::PolygonMode::FILL)
                .line_width(1.0)
                .cull_mode(vk::CullModeFlags::BACK)
                // glTF 约定 CCW 为 front face
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .depth_bias_enable(false),
            msaa_sample: vk::SampleCountFlags::TYPE_1,
            enable_sample_shading: false,

            color_attach_blend_states: vec![],
            blend_info: vk::PipelineColorBlendStateCreateInfo::default()
                .logic_op_enable(false)
                .blend_constants([0.0, 0.0, 0.0, 0.0]),

            depth_stencil_info: vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(false)
                .depth_write_enable(false)
                .depth_compare_op(vk::CompareOp::NEVER)
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false),
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
        }
    }
}
// builder
impl GraphicsPipelineCreateInfo {
    /// builder
    #[inline]
    pub fn attach_info(
        &mut self,
        color_attach_formats: Vec<vk::Format>,
        depth_format: Option<vk::Format>,
        stencil_format: Option<vk::Format>,
    ) -> &mut Self {
        self.color_attach_formats = color_attach_formats;
        self.depth_attach_format = depth_format.unwrap_or(vk::Format::UNDEFINED);
        self.stencil_attach_format = stencil_format.unwrap_or(vk::Format::UNDEFINED);

        self
    }

    /// builder
    #[inline]
    pub fn vertex_shader_stage(&mut self, path: &str, entry_point: &'static CStr) -> &mut Self {
        self.shader_stages.push(ShaderStageInfo {
            stage: vk::ShaderStageFlags::VERTEX,
            entry_point,
            path: path.to_string(),
        });
        self
    }

    /// builder
    #[inline]
    pub fn fragment_shader_stage(&mut self, path: &str, entry_point: &'static CStr) -> &mut Self {
        self.shader_stages.push(ShaderStageInfo {
            stage: vk::ShaderStageFlags::FRAGMENT,
            entry_point,
            path: path.to_string(),
        });
        self
    }

    /// builder
    #[inline]
    pub fn specialization(&mut self, constants: SpecializationConstants) -> &mut Self {
        self.specialization = constants;
        self
    }

    /// 为每个 color attachment 指定 blend 操作
    #[inline]
    pub fn color_blend(
        &mut self,
        states: Vec<vk::PipelineColorBlendAttachmentState>,
        blend_constants: [f32; 4],
    ) -> &mut Self {
        self.color_attach_blend_states = states;
        self.blend_info.blend_constants = blend_constants;
        self.blend_info.logic_op_enable = vk::FALSE;
        self
    }

    #[inline]
    pub fn cull_mode(&mut self, mode: vk::CullModeFlags, front_face: vk::FrontFace) -> &mut Self {
        self.rasterize_state_info.cull_mode = mode;
        self.rasterize_state_info.front_face = front_face;
        self
    }

    #[inline]
    pub fn depth_test(&mut self, depth_test_op: Option<vk::CompareOp>, depth_write: bool) -> &mut Self {
        self.depth_stencil_info.depth_test_enable = depth_test_op.map_or(vk::FALSE, |_| vk::TRUE);
        self.depth_stencil_info.depth_compare_op = depth_test_op.map_or(vk::CompareOp::NEVER, identity);
        self.depth_stencil_info.depth_write_enable = if depth_write { vk::TRUE } else { vk::FALSE };
        self
    }

    #[inline]
    pub fn msaa(&mut self, samples: vk::SampleCountFlags, sample_shading: bool) -> &mut Self {
        self.msaa_sample = samples;
        self.enable_sample_shading = sample_shading;
        self
    }

    /// 在 viewport 和 scissor 之外追加 dynamic state
    #[inline]
    pub fn push_dynamic_state(&mut self, state: vk::DynamicState) -> &mut Self {
        if !self.dynamic_states.contains(&state) {
            self.dynamic_states.push(state);
        }
        self
    }
}

/// 不做混合，写入所有通道
pub fn opaque_blend_state() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default().blend_enable(false).color_write_mask(vk::ColorComponentFlags::RGBA)
}

/// 标准 alpha 混合：src * a + dst * (1 - a)
pub fn alpha_blend_state() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .alpha_blend_op(vk::BlendOp::ADD)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_states_are_not_duplicated() {
        let mut ci = GraphicsPipelineCreateInfo::default();
        ci.push_dynamic_state(vk::DynamicState::CULL_MODE).push_dynamic_state(vk::DynamicState::CULL_MODE);
        assert_eq!(
            ci.dynamic_states,
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR, vk::DynamicState::CULL_MODE]
        );
    }

    #[test]
    fn depth_test_none_disables_test() {
        let mut ci = GraphicsPipelineCreateInfo::default();
        ci.depth_test(Some(vk::CompareOp::GREATER), true);
        assert_eq!(ci.depth_stencil_info.depth_test_enable, vk::TRUE);
        assert_eq!(ci.depth_stencil_info.depth_compare_op, vk::CompareOp::GREATER);
        ci.depth_test(None, false);
        assert_eq!(ci.depth_stencil_info.depth_test_enable, vk::FALSE);
        assert_eq!(ci.depth_stencil_info.depth_write_enable, vk::FALSE);
    }
}
