use ash::vk;
use halo_gfx::{
    basic::color::LabelColor,
    commands::{barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer},
    pipelines::compute_pipeline::ComputePipeline,
};

use crate::jump_flood::{
    plan::{JumpFloodPlan, dispatch_group_count},
    resources::JumpFloodResources,
};

/// 在 compute 队列上录制 jump flood
///
/// 进入时 ping layer 处于 COLOR_ATTACHMENT_OPTIMAL（seed pass 的输出），
/// 结束时两个 layer 都处于 GENERAL，结果 layer 由返回值决定
pub struct JumpFloodComputer<'a> {
    pipeline: &'a ComputePipeline,
}
impl<'a> JumpFloodComputer<'a> {
    #[inline]
    pub fn new(pipeline: &'a ComputePipeline) -> Self {
        Self { pipeline }
    }

    /// 返回 true 表示结果位于 pong layer
    pub fn record(
        &self,
        cmd: &GfxCommandBuffer,
        resources: &JumpFloodResources,
        thickness: f32,
        debug_name: &str,
    ) -> bool {
        let plan = JumpFloodPlan::from_thickness(thickness);
        let image = resources.image().handle();

        cmd.begin_label(debug_name, LabelColor::COLOR_COMPUTE);

        // semaphore 在 COMPUTE_SHADER 阶段等待，layout 转换需要在同一个阶段之后发生
        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[
                GfxImageBarrier::new()
                    .image(image)
                    .layers(0, 1)
                    .layout_transfer(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::GENERAL)
                    .src_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::NONE)
                    .dst_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_READ),
                GfxImageBarrier::new()
                    .image(image)
                    .layers(1, 1)
                    .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::GENERAL)
                    .src_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::NONE)
                    .dst_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE),
            ],
        );

        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::COMPUTE, self.pipeline.handle());
        cmd.bind_descriptor_sets(vk::PipelineBindPoint::COMPUTE, self.pipeline.layout(), 0, &[resources.storage_set()]);

        let group_count = dispatch_group_count(resources.extent());
        let step_count = plan.steps().len();
        for (idx, step) in plan.steps().iter().enumerate() {
            cmd.cmd_push_constants(
                self.pipeline.layout(),
                vk::ShaderStageFlags::COMPUTE,
                0,
                bytemuck::bytes_of(&step.push_constant()),
            );
            cmd.cmd_dispatch(group_count);

            if idx + 1 < step_count {
                cmd.memory_barrier(&[vk::MemoryBarrier2::default()
                    .src_stage_mask(vk::PipelineStageFlags2::COMPUTE_SHADER)
                    .src_access_mask(vk::AccessFlags2::SHADER_STORAGE_WRITE)
                    .dst_stage_mask(vk::PipelineStageFlags2::COMPUTE_SHADER)
                    .dst_access_mask(vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE)]);
            }
        }

        cmd.end_label();
        plan.result_forward()
    }
}
