use std::{ffi::CStr, rc::Rc};

use ash::vk;
use halo_crate_tools::resource::HaloPath;
use halo_gfx::{
    descriptors::descriptor::{GfxDescriptorBinding, GfxDescriptorSetLayout},
    pipelines::{
        compute_pipeline::ComputePipeline,
        graphics_pipeline::{GraphicsPipeline, GraphicsPipelineCreateInfo, alpha_blend_state, opaque_blend_state},
        pipeline_layout::PipelineLayout,
        shader::SpecializationConstants,
    },
};

use crate::{
    command_separation::criteria::AlphaMode,
    jump_flood::plan::JumpFloodPushConstant,
    outline::OutlinePushConstant,
    settings::RendererSettings,
    weighted_blended::{accumulation_blend_state, revealage_blend_state},
};

const ENTRY: &CStr = c"main";

/// scene shader 中的 specialization constant id
mod spec_id {
    pub const FACETED: u32 = 0;
    pub const ALPHA_MODE: u32 = 1;
}

/// 与 shader 中 ALPHA_MODE 的取值对应
#[inline]
fn alpha_mode_constant(alpha_mode: AlphaMode) -> u32 {
    match alpha_mode {
        AlphaMode::Opaque => 0,
        AlphaMode::Mask => 1,
        AlphaMode::Blend => 2,
    }
}

pub const JUMP_FLOOD_SET_BINDINGS: [GfxDescriptorBinding; 1] = [GfxDescriptorBinding::new(
    0,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::ShaderStageFlags::COMPUTE,
)];
pub const OUTLINE_SET_BINDINGS: [GfxDescriptorBinding; 1] = [GfxDescriptorBinding::new(
    0,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::ShaderStageFlags::FRAGMENT,
)];
/// binding 0: accumulation，binding 1: revealage
pub const WEIGHTED_BLENDED_SET_BINDINGS: [GfxDescriptorBinding; 2] = [
    GfxDescriptorBinding::new(0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT),
    GfxDescriptorBinding::new(1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT),
];
pub const SKYBOX_SET_BINDINGS: [GfxDescriptorBinding; 1] = [GfxDescriptorBinding::new(
    0,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::ShaderStageFlags::FRAGMENT,
)];

/// 所有 scene pipeline 共用的 push constant，shader 中使用 scalar layout
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ScenePushConstant {
    pub projection_view: glam::Mat4,
    pub primitive_buffer: vk::DeviceAddress,
    pub node_transform_buffer: vk::DeviceAddress,
    pub material_buffer: vk::DeviceAddress,
    pub view_position: glam::Vec3,
    pub _padding: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkyboxPushConstant {
    pub translationless_projection_view: glam::Mat4,
}

/// 所有 pipeline 以及它们的 layout
///
/// 只依赖 swapchain format，swapchain 重建时无需重建
pub struct ScenePipelines {
    /// node index + depth
    pub depth: GraphicsPipeline,
    pub mask_depth: GraphicsPipeline,
    /// jump flood 的 seed
    pub seed: GraphicsPipeline,
    pub mask_seed: GraphicsPipeline,
    /// opaque 与 mask：[alpha mode][faceted]
    primitives: [[GraphicsPipeline; 2]; 2],
    /// 写入 accumulation 和 revealage：[faceted]
    blend_primitives: [GraphicsPipeline; 2],
    pub weighted_blended_composition: GraphicsPipeline,
    pub skybox: GraphicsPipeline,
    pub outline: GraphicsPipeline,
    pub jump_flood: ComputePipeline,

    pub jump_flood_set_layout: GfxDescriptorSetLayout,
    pub outline_set_layout: GfxDescriptorSetLayout,
    pub skybox_set_layout: GfxDescriptorSetLayout,
    pub weighted_blended_set_layout: GfxDescriptorSetLayout,
}
impl ScenePipelines {
    pub fn new(swapchain_format: vk::Format, depth_format: vk::Format) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("ScenePipelines::new");

        let jump_flood_set_layout = GfxDescriptorSetLayout::new(&JUMP_FLOOD_SET_BINDINGS, "jump-flood")?;
        let outline_set_layout = GfxDescriptorSetLayout::new(&OUTLINE_SET_BINDINGS, "outline")?;
        let skybox_set_layout = GfxDescriptorSetLayout::new(&SKYBOX_SET_BINDINGS, "skybox")?;
        let weighted_blended_set_layout =
            GfxDescriptorSetLayout::new(&WEIGHTED_BLENDED_SET_BINDINGS, "weighted-blended-composition")?;

        let scene_layout = Rc::new(PipelineLayout::new(
            &[],
            &[vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                offset: 0,
                size: size_of::<ScenePushConstant>() as u32,
            }],
            "scene",
        )?);

        let depth = Self::create_prepass_pipeline(
            &scene_layout,
            "node_index.frag",
            RendererSettings::NODE_INDEX_FORMAT,
            depth_format,
            AlphaMode::Opaque,
            "depth",
        )?;
        let mask_depth = Self::create_prepass_pipeline(
            &scene_layout,
            "node_index.frag",
            RendererSettings::NODE_INDEX_FORMAT,
            depth_format,
            AlphaMode::Mask,
            "mask-depth",
        )?;
        let seed = Self::create_prepass_pipeline(
            &scene_layout,
            "jump_flood_seed.frag",
            RendererSettings::JUMP_FLOOD_FORMAT,
            depth_format,
            AlphaMode::Opaque,
            "jump-flood-seed",
        )?;
        let mask_seed = Self::create_prepass_pipeline(
            &scene_layout,
            "jump_flood_seed.frag",
            RendererSettings::JUMP_FLOOD_FORMAT,
            depth_format,
            AlphaMode::Mask,
            "mask-jump-flood-seed",
        )?;

        let create_primitives = |alpha_mode: AlphaMode| -> anyhow::Result<[GraphicsPipeline; 2]> {
            Ok([
                Self::create_primitive_pipeline(&scene_layout, swapchain_format, depth_format, alpha_mode, false)?,
                Self::create_primitive_pipeline(&scene_layout, swapchain_format, depth_format, alpha_mode, true)?,
            ])
        };
        let primitives = [create_primitives(AlphaMode::Opaque)?, create_primitives(AlphaMode::Mask)?];
        let blend_primitives = [
            Self::create_blend_primitive_pipeline(&scene_layout, depth_format, false)?,
            Self::create_blend_primitive_pipeline(&scene_layout, depth_format, true)?,
        ];
        let weighted_blended_composition =
            Self::create_weighted_blended_composition_pipeline(&weighted_blended_set_layout, swapchain_format)?;

        let skybox = Self::create_skybox_pipeline(&skybox_set_layout, swapchain_format, depth_format)?;
        let outline = Self::create_outline_pipeline(&outline_set_layout, swapchain_format)?;

        let jump_flood_layout = Rc::new(PipelineLayout::new(
            &[jump_flood_set_layout.handle()],
            &[vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::COMPUTE,
                offset: 0,
                size: size_of::<JumpFloodPushConstant>() as u32,
            }],
            "jump-flood",
        )?);
        let jump_flood = ComputePipeline::new(
            std::path::Path::new(&HaloPath::shader_build_path_str("jump_flood.comp")),
            ENTRY,
            jump_flood_layout,
            "jump-flood",
        )?;

        log::info!("scene pipelines created, swapchain format: {swapchain_format:?}, depth format: {depth_format:?}");

        Ok(Self {
            depth,
            mask_depth,
            seed,
            mask_seed,
            primitives,
            blend_primitives,
            weighted_blended_composition,
            skybox,
            outline,
            jump_flood,
            jump_flood_set_layout,
            outline_set_layout,
            skybox_set_layout,
            weighted_blended_set_layout,
        })
    }

    /// depth prepass 以及 jump flood seed：单采样，整数 color attachment
    fn create_prepass_pipeline(
        layout: &Rc<PipelineLayout>,
        fragment_shader: &str,
        color_format: vk::Format,
        depth_format: vk::Format,
        alpha_mode: AlphaMode,
        debug_name: &str,
    ) -> anyhow::Result<GraphicsPipeline> {
        let mut ci = GraphicsPipelineCreateInfo::default();
        ci.attach_info(vec![color_format], Some(depth_format), None)
            .vertex_shader_stage(&HaloPath::shader_build_path_str("depth.vert"), ENTRY)
            .fragment_shader_stage(&HaloPath::shader_build_path_str(fragment_shader), ENTRY)
            .specialization(
                SpecializationConstants::default().constant_u32(spec_id::ALPHA_MODE, alpha_mode_constant(alpha_mode)),
            )
            // 整数格式不能开启混合
            .color_blend(vec![opaque_blend_state()], [0.0; 4])
            .depth_test(Some(vk::CompareOp::GREATER), true)
            .push_dynamic_state(vk::DynamicState::CULL_MODE);
        GraphicsPipeline::new(&ci, layout.clone(), debug_name)
    }

    fn create_primitive_pipeline(
        layout: &Rc<PipelineLayout>,
        color_format: vk::Format,
        depth_format: vk::Format,
        alpha_mode: AlphaMode,
        faceted: bool,
    ) -> anyhow::Result<GraphicsPipeline> {
        let mut ci = GraphicsPipelineCreateInfo::default();
        ci.attach_info(vec![color_format], Some(depth_format), None)
            .vertex_shader_stage(&HaloPath::shader_build_path_str("primitive.vert"), ENTRY)
            .fragment_shader_stage(&HaloPath::shader_build_path_str("primitive.frag"), ENTRY)
            .specialization(
                SpecializationConstants::default()
                    .constant_bool(spec_id::FACETED, faceted)
                    .constant_u32(spec_id::ALPHA_MODE, alpha_mode_constant(alpha_mode)),
            )
            .color_blend(vec![opaque_blend_state()], [0.0; 4])
            .depth_test(Some(vk::CompareOp::GREATER), true)
            .msaa(RendererSettings::SCENE_MSAA_SAMPLES, false)
            .push_dynamic_state(vk::DynamicState::CULL_MODE);

        let debug_name = format!("primitive-{alpha_mode:?}{}", if faceted { "-faceted" } else { "" });
        GraphicsPipeline::new(&ci, layout.clone(), &debug_name)
    }

    /// blend 的 primitive 只做 depth test，不写入 depth
    fn create_blend_primitive_pipeline(
        layout: &Rc<PipelineLayout>,
        depth_format: vk::Format,
        faceted: bool,
    ) -> anyhow::Result<GraphicsPipeline> {
        let mut ci = GraphicsPipelineCreateInfo::default();
        ci.attach_info(
            vec![RendererSettings::ACCUMULATION_FORMAT, RendererSettings::REVEALAGE_FORMAT],
            Some(depth_format),
            None,
        )
        .vertex_shader_stage(&HaloPath::shader_build_path_str("primitive.vert"), ENTRY)
        .fragment_shader_stage(&HaloPath::shader_build_path_str("primitive_blend.frag"), ENTRY)
        .specialization(
            SpecializationConstants::default()
                .constant_bool(spec_id::FACETED, faceted)
                .constant_u32(spec_id::ALPHA_MODE, alpha_mode_constant(AlphaMode::Blend)),
        )
        .color_blend(vec![accumulation_blend_state(), revealage_blend_state()], [0.0; 4])
        .depth_test(Some(vk::CompareOp::GREATER), false)
        .msaa(RendererSettings::SCENE_MSAA_SAMPLES, false)
        .push_dynamic_state(vk::DynamicState::CULL_MODE);

        let debug_name = format!("primitive-Blend{}", if faceted { "-faceted" } else { "" });
        GraphicsPipeline::new(&ci, layout.clone(), &debug_name)
    }

    /// 全屏三角形，把 accumulation / revealage 混合到 MSAA scene color
    fn create_weighted_blended_composition_pipeline(
        set_layout: &GfxDescriptorSetLayout,
        color_format: vk::Format,
    ) -> anyhow::Result<GraphicsPipeline> {
        let layout = Rc::new(PipelineLayout::new(&[set_layout.handle()], &[], "weighted-blended-composition")?);

        let mut ci = GraphicsPipelineCreateInfo::default();
        ci.attach_info(vec![color_format], None, None)
            .vertex_shader_stage(&HaloPath::shader_build_path_str("fullscreen.vert"), ENTRY)
            .fragment_shader_stage(&HaloPath::shader_build_path_str("weighted_blended_composition.frag"), ENTRY)
            .color_blend(vec![alpha_blend_state()], [0.0; 4])
            .cull_mode(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE)
            .msaa(RendererSettings::SCENE_MSAA_SAMPLES, false);
        GraphicsPipeline::new(&ci, layout, "weighted-blended-composition")
    }

    fn create_skybox_pipeline(
        set_layout: &GfxDescriptorSetLayout,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> anyhow::Result<GraphicsPipeline> {
        let layout = Rc::new(PipelineLayout::new(
            &[set_layout.handle()],
            &[vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::VERTEX,
                offset: 0,
                size: size_of::<SkyboxPushConstant>() as u32,
            }],
            "skybox",
        )?);

        let mut ci = GraphicsPipelineCreateInfo::default();
        ci.attach_info(vec![color_format], Some(depth_format), None)
            .vertex_shader_stage(&HaloPath::shader_build_path_str("skybox.vert"), ENTRY)
            .fragment_shader_stage(&HaloPath::shader_build_path_str("skybox.frag"), ENTRY)
            .color_blend(vec![opaque_blend_state()], [0.0; 4])
            .cull_mode(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE)
            // skybox 位于 reverse z 的最远处（depth = 0），只填充没有被遮挡的像素
            .depth_test(Some(vk::CompareOp::GREATER_OR_EQUAL), false)
            .msaa(RendererSettings::SCENE_MSAA_SAMPLES, false);
        GraphicsPipeline::new(&ci, layout, "skybox")
    }

    /// 全屏三角形，直接混合到 swapchain image
    fn create_outline_pipeline(
        set_layout: &GfxDescriptorSetLayout,
        color_format: vk::Format,
    ) -> anyhow::Result<GraphicsPipeline> {
        let layout = Rc::new(PipelineLayout::new(
            &[set_layout.handle()],
            &[vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                offset: 0,
                size: size_of::<OutlinePushConstant>() as u32,
            }],
            "outline",
        )?);

        let mut ci = GraphicsPipelineCreateInfo::default();
        ci.attach_info(vec![color_format], None, None)
            .vertex_shader_stage(&HaloPath::shader_build_path_str("fullscreen.vert"), ENTRY)
            .fragment_shader_stage(&HaloPath::shader_build_path_str("outline.frag"), ENTRY)
            .color_blend(vec![alpha_blend_state()], [0.0; 4])
            .cull_mode(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE);
        GraphicsPipeline::new(&ci, layout, "outline")
    }
}
// getters
impl ScenePipelines {
    /// blend 的 pipeline 只能在 weighted blended 的 rendering scope 中使用
    #[inline]
    pub fn primitive(&self, alpha_mode: AlphaMode, faceted: bool) -> &GraphicsPipeline {
        match alpha_mode {
            AlphaMode::Opaque => &self.primitives[0][faceted as usize],
            AlphaMode::Mask => &self.primitives[1][faceted as usize],
            AlphaMode::Blend => &self.blend_primitives[faceted as usize],
        }
    }

    /// prepass 中 blend 的 primitive 按照 opaque 处理
    #[inline]
    pub fn depth_for(&self, alpha_mode: AlphaMode) -> &GraphicsPipeline {
        if alpha_mode == AlphaMode::Mask { &self.mask_depth } else { &self.depth }
    }

    #[inline]
    pub fn seed_for(&self, alpha_mode: AlphaMode) -> &GraphicsPipeline {
        if alpha_mode == AlphaMode::Mask { &self.mask_seed } else { &self.seed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_constant_sizes_match_shaders() {
        assert_eq!(size_of::<ScenePushConstant>(), 112);
        assert_eq!(size_of::<SkyboxPushConstant>(), 64);
        assert_eq!(size_of::<JumpFloodPushConstant>(), 8);
        // 单个 stage 的 push constant 需要在 128 字节以内
        assert!(size_of::<ScenePushConstant>() <= 128);
    }

    #[test]
    fn alpha_mode_constants_are_distinct() {
        let constants = [AlphaMode::Opaque, AlphaMode::Mask, AlphaMode::Blend].map(alpha_mode_constant);
        assert_eq!(constants, [0, 1, 2]);
    }
}
