//! 把分组后的 indirect draw 录制到 command buffer

use ash::vk;
use halo_gfx::{commands::command_buffer::GfxCommandBuffer, pipelines::graphics_pipeline::GraphicsPipeline};

use crate::{
    command_separation::{
        binding_state::ResourceBindingState, criteria::SeparationKey, indirect_commands::IndirectDrawBuffer,
    },
    scene::Scene,
    shared_data::pipelines::ScenePushConstant,
};

/// 一个 render pass 内连续的场景绘制
///
/// 所有场景 pipeline 共用同一个 layout，push constant 在第一次绘制前设置
pub struct SceneDrawRecorder<'a> {
    cmd: &'a GfxCommandBuffer,
    scene: &'a Scene,
    push_constant: &'a ScenePushConstant,
    binding_state: ResourceBindingState<vk::Pipeline>,
}
impl<'a> SceneDrawRecorder<'a> {
    pub fn new(cmd: &'a GfxCommandBuffer, scene: &'a Scene, push_constant: &'a ScenePushConstant) -> Self {
        Self {
            cmd,
            scene,
            push_constant,
            binding_state: ResourceBindingState::default(),
        }
    }

    /// 绑定了其他 layout 的 pipeline 之后，之前的绑定状态不再可信
    #[inline]
    pub fn reset_binding_state(&mut self) {
        self.binding_state = ResourceBindingState::default();
    }

    /// 返回实际录制的 draw buffer 数量
    pub fn record<'p, 'd>(
        &mut self,
        draws: impl Iterator<Item = (&'d SeparationKey, &'d IndirectDrawBuffer)>,
        pipeline_of: impl Fn(&SeparationKey) -> &'p GraphicsPipeline,
    ) -> usize {
        let mut recorded = 0;
        for (key, buffer) in draws {
            if buffer.draw_count() == 0 {
                continue;
            }

            let index_buffer = match key.index_type {
                Some(index_type) => match self.scene.index_buffer(index_type) {
                    Some(index_buffer) => Some((index_type, index_buffer.vk_buffer())),
                    None => {
                        log::warn!("scene has no {index_type:?} index buffer, skip {} draws", buffer.draw_count());
                        continue;
                    }
                },
                None => None,
            };

            let pipeline = pipeline_of(key);
            if self.binding_state.bind_pipeline(pipeline.handle()) {
                self.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.handle());
            }
            if self.binding_state.bind_push_constant() {
                self.cmd.cmd_push_constants(
                    pipeline.layout(),
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(self.push_constant),
                );
            }
            if self.binding_state.set_cull_mode(key.cull_mode()) {
                self.cmd.cmd_set_cull_mode(key.cull_mode());
            }
            if let Some((index_type, vk_buffer)) = index_buffer {
                if self.binding_state.bind_index_buffer(Some(index_type)).is_some() {
                    self.cmd.cmd_bind_index_buffer(vk_buffer, 0, index_type.vk_index_type());
                }
            }

            buffer.record(self.cmd);
            recorded += 1;
        }
        recorded
    }
}
