//! 一个 frame in flight slot：`update` 准备本帧数据，`execute` 录制并提交 4 个 command buffer
//!
//! 提交顺序以及 semaphore：
//! ```text
//! prepass (graphics) ──prepass──> jump flood (compute) ──jump flood──┐
//! acquire ──> scene (graphics) ──scene──────────────────────────────> composition (graphics) ──present──> present
//! ```

pub mod background;
pub mod passthru;
pub mod record;
pub mod state;

use std::{collections::BTreeSet, rc::Rc};

use ash::vk;
use halo_gfx::{
    basic::color::LabelColor,
    commands::{
        barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, fence::GfxFence,
        semaphore::GfxSemaphore, submit_info::GfxSubmitInfo,
    },
    gfx::Gfx,
};

use crate::{
    command_separation::{
        criteria::{AlphaMode, SeparationKey},
        memo::{self, Memoized},
        table::{DrawGroupKey, IndirectDrawCommandGroup},
    },
    frame::{
        background::Background,
        passthru::{PassthruResources, PassthruSlot, flipped_viewport},
        record::SceneDrawRecorder,
        state::FrameState,
    },
    frame_task::{FrameTask, OutlineStyle, SceneRenderRequest, UpdateResult},
    frustum::Frustum,
    jump_flood::{computer::JumpFloodComputer, resources::SEED_CLEAR_VALUE},
    mouse_pick::{PickReadback, cursor_offset},
    outline::{OutlinePlan, OutlinePushConstant, OutlineRole},
    overlay::UiOverlay,
    scene::Scene,
    settings::{FrameLabel, RendererSettings},
    shared_data::{
        SharedData,
        attachment_group::SwapchainAttachmentGroup,
        pipelines::{ScenePushConstant, SkyboxPushConstant},
    },
    weighted_blended::{ACCUMULATION_CLEAR_VALUE, REVEALAGE_CLEAR_VALUE},
};

type DrawGroupSlot = Option<Memoized<DrawGroupKey, IndirectDrawCommandGroup>>;

/// skybox.vert 使用 gl_VertexIndex 生成的立方体
const SKYBOX_VERTEX_COUNT: u32 = 36;

pub struct Frame {
    label: FrameLabel,
    state: FrameState,

    graphics_command_pool: GfxCommandPool,
    compute_command_pool: GfxCommandPool,
    prepass_cmd: GfxCommandBuffer,
    jump_flood_cmd: GfxCommandBuffer,
    scene_cmd: GfxCommandBuffer,
    composition_cmd: GfxCommandBuffer,

    acquire_semaphore: GfxSemaphore,
    prepass_semaphore: GfxSemaphore,
    jump_flood_semaphore: GfxSemaphore,
    scene_semaphore: GfxSemaphore,
    in_flight_fence: GfxFence,

    pick: PickReadback,
    passthru: PassthruSlot<PassthruResources>,

    /// 以下字段由 update 写入，execute 只读
    passthru_rect: vk::Rect2D,
    translationless_projection_view: glam::Mat4,
    cursor_offset: Option<glam::UVec2>,
    background: Background,

    scene: Option<Rc<Scene>>,
    scene_push_constant: ScenePushConstant,
    rendering_group: DrawGroupSlot,
    selected_group: DrawGroupSlot,
    hovering_group: DrawGroupSlot,
    rendering_active: bool,
    outline_plan: OutlinePlan,
}
// new & init
impl Frame {
    pub fn new(label: FrameLabel) -> anyhow::Result<Self> {
        let gfx = Gfx::get();
        let name = |s: &str| format!("frame-{label}-{s}");

        let graphics_command_pool = GfxCommandPool::new(
            gfx.graphics_queue().queue_family(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            &name("graphics"),
        )?;
        let compute_command_pool = GfxCommandPool::new(
            gfx.compute_queue().queue_family(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            &name("compute"),
        )?;

        Ok(Self {
            label,
            state: FrameState::Uninitialized,

            prepass_cmd: GfxCommandBuffer::new(&graphics_command_pool, &name("prepass"))?,
            jump_flood_cmd: GfxCommandBuffer::new(&compute_command_pool, &name("jump-flood"))?,
            scene_cmd: GfxCommandBuffer::new(&graphics_command_pool, &name("scene"))?,
            composition_cmd: GfxCommandBuffer::new(&graphics_command_pool, &name("composition"))?,
            graphics_command_pool,
            compute_command_pool,

            acquire_semaphore: GfxSemaphore::new(&name("acquire"))?,
            prepass_semaphore: GfxSemaphore::new(&name("prepass"))?,
            jump_flood_semaphore: GfxSemaphore::new(&name("jump-flood"))?,
            scene_semaphore: GfxSemaphore::new(&name("scene"))?,
            // 第一次 update 不需要等待
            in_flight_fence: GfxFence::new(true, &name("in-flight"))?,

            pick: PickReadback::new(&name("pick"))?,
            passthru: PassthruSlot::default(),

            passthru_rect: vk::Rect2D::default(),
            translationless_projection_view: glam::Mat4::IDENTITY,
            cursor_offset: None,
            background: Background::default(),

            scene: None,
            scene_push_constant: bytemuck::Zeroable::zeroed(),
            rendering_group: None,
            selected_group: None,
            hovering_group: None,
            rendering_active: false,
            outline_plan: OutlinePlan::default(),
        })
    }

    /// 调用之前需要 wait idle
    pub fn destroy(mut self) {
        self.passthru.clear();
        self.rendering_group = None;
        self.selected_group = None;
        self.hovering_group = None;
        self.scene = None;

        self.graphics_command_pool.destroy();
        self.compute_command_pool.destroy();

        let Self {
            acquire_semaphore,
            prepass_semaphore,
            jump_flood_semaphore,
            scene_semaphore,
            in_flight_fence,
            ..
        } = self;
        acquire_semaphore.destroy();
        prepass_semaphore.destroy();
        jump_flood_semaphore.destroy();
        scene_semaphore.destroy();
        in_flight_fence.destroy();
    }
}
// getters
impl Frame {
    #[inline]
    pub fn label(&self) -> FrameLabel {
        self.label
    }

    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    #[inline]
    pub fn passthru_extent(&self) -> Option<vk::Extent2D> {
        self.passthru.extent()
    }
}
// update
impl Frame {
    pub fn update(&mut self, shared: &mut SharedData, task: &FrameTask) -> anyhow::Result<UpdateResult> {
        let _span = tracy_client::span!("Frame::update");

        // 上一次使用该 slot 的 GPU 命令必须已经完成
        self.in_flight_fence.wait()?;

        if let Some(extent) = task.swapchain_resize {
            if shared.handle_swapchain_resize(extent)? {
                log::info!("frame {}: swapchain attachment groups rebuilt", self.label);
            }
            self.passthru.invalidate();
        }

        let hovering_node_index = self.pick.drain()?;

        let passthru_extent = task.passthru_rect.extent;
        anyhow::ensure!(
            passthru_extent.width > 0 && passthru_extent.height > 0,
            "passthru rect is empty: {}x{}",
            passthru_extent.width,
            passthru_extent.height
        );
        if self.passthru.needs_rebuild(passthru_extent) {
            self.state.transition(FrameState::AwaitingPassthruResize);
            let debug_name = format!("frame-{}", self.label);
            self.passthru.rebuild(passthru_extent, |extent| PassthruResources::new(extent, shared, &debug_name))?;
        }

        let projection_view = task.camera.projection_view();
        self.passthru_rect = task.passthru_rect;
        self.translationless_projection_view = task.camera.translationless_projection_view();
        self.cursor_offset = cursor_offset(task.cursor_position, task.passthru_rect);

        match &task.scene {
            Some(request) => self.update_scene(request, projection_view, task.camera.view_position())?,
            None => {
                self.scene = None;
                self.rendering_active = false;
                self.outline_plan = OutlinePlan::default();
            }
        }

        self.background = Background::resolve(task.solid_background, shared.skybox_set());

        self.state.transition(FrameState::Ready);
        Ok(UpdateResult { hovering_node_index })
    }

    fn update_scene(
        &mut self,
        request: &SceneRenderRequest,
        projection_view: glam::Mat4,
        view_position: glam::Vec3,
    ) -> anyhow::Result<()> {
        let scene = &request.scene;
        let frustum = request.frustum_culling.then(|| Frustum::from_projection_view(&projection_view));
        let label = self.label;

        let refresh_group = |slot: &mut DrawGroupSlot, nodes: &BTreeSet<u32>, role: &str| -> anyhow::Result<()> {
            let key = DrawGroupKey {
                scene: scene.id(),
                node_indices: nodes.clone(),
            };
            memo::refresh(slot, key, |key| {
                IndirectDrawCommandGroup::new(scene, &key.node_indices, &format!("frame-{label}-{role}"))
            })?;
            if let Some(memo) = slot.as_mut() {
                memo.value_mut().cull(scene, frustum.as_ref())?;
            }
            Ok(())
        };

        self.outline_plan = OutlinePlan::new(request);
        self.rendering_active = !request.rendering_nodes.is_empty();

        if self.rendering_active {
            refresh_group(&mut self.rendering_group, &request.rendering_nodes, "rendering")?;
        }
        if self.outline_plan.selected.is_some() {
            refresh_group(&mut self.selected_group, &request.selected_nodes, "selected")?;
        }
        if let (Some(_), Some(node)) = (self.outline_plan.hovering, request.hovering_node) {
            refresh_group(&mut self.hovering_group, &BTreeSet::from([node]), "hovering")?;
        }

        self.scene_push_constant = ScenePushConstant {
            projection_view,
            primitive_buffer: scene.primitive_buffer_address(),
            node_transform_buffer: scene.node_transform_buffer_address(),
            material_buffer: scene.material_buffer_address(),
            view_position,
            _padding: [0; 3],
        };
        self.scene = Some(scene.clone());
        Ok(())
    }

    /// 本帧需要绘制的描边以及对应的分组
    fn active_outlines(&self) -> impl Iterator<Item = (OutlineRole, OutlineStyle)> + '_ {
        self.outline_plan.draws().filter(|(role, _)| self.group(*role).is_some_and(|g| !g.is_empty()))
    }

    fn group(&self, role: OutlineRole) -> Option<&IndirectDrawCommandGroup> {
        let slot = match role {
            OutlineRole::Selected => &self.selected_group,
            OutlineRole::Hovering => &self.hovering_group,
        };
        slot.as_ref().map(|memo| memo.value())
    }
}
// execute
impl Frame {
    /// 返回 false 表示 swapchain 需要重建
    pub fn execute(&mut self, shared: &SharedData, overlay: &mut dyn UiOverlay) -> anyhow::Result<bool> {
        let _span = tracy_client::span!("Frame::execute");
        debug_assert_eq!(self.state, FrameState::Ready, "execute before update");

        let swapchain = shared.swapchain()?;
        let Some(image_index) = swapchain.acquire_next_image(&self.acquire_semaphore)? else {
            self.state.transition(FrameState::AwaitingSwapchainResize);
            return Ok(false);
        };
        self.state.transition(FrameState::Recording);

        self.graphics_command_pool.reset_all_buffers()?;
        self.compute_command_pool.reset_all_buffers()?;

        let passthru = self.passthru.get().ok_or_else(|| anyhow::anyhow!("passthru resources are not built"))?;

        self.record_prepass(shared, passthru)?;
        let forwards = self.record_jump_flood(shared, passthru)?;
        self.record_scene(shared, image_index)?;
        self.record_composition(shared, passthru, image_index, forwards, overlay)?;

        self.submit(shared, image_index)?;
        self.state.transition(FrameState::Submitted);

        let presented = swapchain.present_image(
            Gfx::get().graphics_queue(),
            image_index,
            &[shared.present_semaphore(image_index)],
        )?;
        if !presented {
            self.state.transition(FrameState::AwaitingSwapchainResize);
        }
        Ok(presented)
    }

    /// node index + depth，以及两个描边的 seed
    fn record_prepass(&self, shared: &SharedData, passthru: &PassthruResources) -> anyhow::Result<()> {
        let cmd = &self.prepass_cmd;
        let pipelines = shared.pipelines();
        let extent = passthru.extent();
        let full_rect = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };

        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("frame-{}-prepass", self.label))?;

        let rendering_group = self.rendering_group.as_ref().filter(|_| self.rendering_active);
        if let (Some(scene), Some(memo)) = (&self.scene, rendering_group) {
            let pick = self.cursor_offset.is_some();
            cmd.begin_label("node-index", LabelColor::COLOR_PASS);
            cmd.image_memory_barrier(
                vk::DependencyFlags::empty(),
                &[
                    GfxImageBarrier::new()
                        .image(passthru.node_index_image().handle())
                        .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                        .src_mask(vk::PipelineStageFlags2::COPY, vk::AccessFlags2::NONE)
                        .dst_mask(
                            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                        ),
                    Self::depth_attachment_barrier(passthru.depth_image().handle()),
                ],
            );

            let color_attachment = vk::RenderingAttachmentInfo::default()
                .image_view(passthru.node_index_view().handle())
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(if pick { vk::AttachmentLoadOp::CLEAR } else { vk::AttachmentLoadOp::DONT_CARE })
                .store_op(if pick { vk::AttachmentStoreOp::STORE } else { vk::AttachmentStoreOp::DONT_CARE })
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue {
                        uint32: [RendererSettings::PICK_SENTINEL, 0, 0, 0],
                    },
                });
            let depth_attachment = Self::cleared_depth_attachment(passthru.depth_view().handle());
            cmd.cmd_begin_rendering(
                &vk::RenderingInfo::default()
                    .render_area(full_rect)
                    .layer_count(1)
                    .color_attachments(std::slice::from_ref(&color_attachment))
                    .depth_attachment(&depth_attachment),
            );
            cmd.cmd_set_viewport(0, &[flipped_viewport(full_rect)]);
            cmd.cmd_set_scissor(0, &[full_rect]);

            let mut recorder = SceneDrawRecorder::new(cmd, scene, &self.scene_push_constant);
            recorder.record(memo.value().iter(), |key| pipelines.depth_for(key.alpha_mode));

            cmd.cmd_end_rendering();

            if let Some(offset) = self.cursor_offset {
                self.pick.record_copy(cmd, passthru.node_index_image().handle(), offset);
            }
            cmd.end_label();
        }

        // hovering 在前，与 jump flood 的顺序一致
        for role in [OutlineRole::Hovering, OutlineRole::Selected] {
            let (Some(scene), Some(group)) = (&self.scene, self.group(role)) else {
                continue;
            };
            if self.outline_plan.style(role).is_none() || group.is_empty() {
                continue;
            }
            let jump_flood = passthru.jump_flood(role);

            cmd.begin_label(&format!("{}-seed", role.name()), LabelColor::COLOR_STAGE);
            cmd.image_memory_barrier(
                vk::DependencyFlags::empty(),
                &[
                    GfxImageBarrier::new()
                        .image(jump_flood.image().handle())
                        .layers(0, 1)
                        .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                        .src_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags2::NONE)
                        .dst_mask(
                            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                        ),
                    Self::depth_attachment_barrier(jump_flood.seed_depth_image().handle()),
                ],
            );

            let color_attachment = vk::RenderingAttachmentInfo::default()
                .image_view(jump_flood.ping_view().handle())
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue { color: SEED_CLEAR_VALUE });
            let depth_attachment = Self::cleared_depth_attachment(jump_flood.seed_depth_view().handle());
            cmd.cmd_begin_rendering(
                &vk::RenderingInfo::default()
                    .render_area(full_rect)
                    .layer_count(1)
                    .color_attachments(std::slice::from_ref(&color_attachment))
                    .depth_attachment(&depth_attachment),
            );
            cmd.cmd_set_viewport(0, &[flipped_viewport(full_rect)]);
            cmd.cmd_set_scissor(0, &[full_rect]);

            let mut recorder = SceneDrawRecorder::new(cmd, scene, &self.scene_push_constant);
            recorder.record(group.iter(), |key| pipelines.seed_for(key.alpha_mode));

            cmd.cmd_end_rendering();
            cmd.end_label();
        }

        cmd.end()
    }

    /// 返回 [selected, hovering] 的结果 layer，未绘制的描边为 None
    fn record_jump_flood(
        &self,
        shared: &SharedData,
        passthru: &PassthruResources,
    ) -> anyhow::Result<[Option<bool>; 2]> {
        let cmd = &self.jump_flood_cmd;
        let computer = JumpFloodComputer::new(&shared.pipelines().jump_flood);
        let mut forwards = [None; 2];

        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("frame-{}-jump-flood", self.label))?;
        for role in [OutlineRole::Hovering, OutlineRole::Selected] {
            let Some((_, style)) = self.active_outlines().find(|(r, _)| *r == role) else {
                continue;
            };
            let forward = computer.record(cmd, passthru.jump_flood(role), style.thickness, role.name());
            forwards[Self::role_index(role)] = Some(forward);
        }
        cmd.end()?;

        Ok(forwards)
    }

    fn record_scene(&self, shared: &SharedData, image_index: u32) -> anyhow::Result<()> {
        let cmd = &self.scene_cmd;
        let pipelines = shared.pipelines();
        let swapchain = shared.swapchain()?;
        let attachments = shared.attachment_group(image_index);
        let swapchain_view = swapchain.image_view(image_index).handle();
        let full_rect = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: swapchain.extent(),
        };

        let rendering_group = self.rendering_group.as_ref().filter(|_| self.rendering_active);
        let mut recorder = match (&self.scene, rendering_group) {
            (Some(scene), Some(memo)) => Some((SceneDrawRecorder::new(cmd, scene, &self.scene_push_constant), memo)),
            _ => None,
        };
        // 有 blend 的 draw 时，scene color 在 weighted blended composition 之后才 resolve 到 swapchain image
        let has_blend = recorder.as_ref().is_some_and(|(_, memo)| {
            memo.value().with_alpha_mode(AlphaMode::Blend).any(|(_, buffer)| buffer.draw_count() > 0)
        });

        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("frame-{}-scene", self.label))?;
        cmd.begin_label("scene", LabelColor::COLOR_PASS);

        // acquire semaphore 在 COLOR_ATTACHMENT_OUTPUT 等待，所有 layout 转换都需要在其之后
        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[
                Self::color_attachment_barrier(swapchain.image(image_index)),
                Self::color_attachment_barrier(attachments.color_image().handle()),
                Self::depth_attachment_barrier(attachments.depth_image().handle()),
            ],
        );

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(attachments.color_view().handle())
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .clear_value(vk::ClearValue {
                color: self.background.clear_color(),
            });
        let color_attachment = if has_blend {
            color_attachment.store_op(vk::AttachmentStoreOp::STORE)
        } else {
            Self::resolved_to_swapchain(color_attachment.store_op(vk::AttachmentStoreOp::DONT_CARE), swapchain_view)
        };
        let mut depth_attachment = Self::cleared_depth_attachment(attachments.depth_view().handle());
        if has_blend {
            depth_attachment = depth_attachment.store_op(vk::AttachmentStoreOp::STORE);
        }
        cmd.cmd_begin_rendering(
            &vk::RenderingInfo::default()
                .render_area(full_rect)
                .layer_count(1)
                .color_attachments(std::slice::from_ref(&color_attachment))
                .depth_attachment(&depth_attachment),
        );
        cmd.cmd_set_viewport(0, &[flipped_viewport(self.passthru_rect)]);
        cmd.cmd_set_scissor(0, &[self.passthru_rect]);

        let primitive_pipeline = |key: &SeparationKey| pipelines.primitive(key.alpha_mode, key.faceted);

        if let Some((recorder, memo)) = recorder.as_mut() {
            recorder.record(memo.value().with_alpha_mode(AlphaMode::Opaque), primitive_pipeline);
            recorder.record(memo.value().with_alpha_mode(AlphaMode::Mask), primitive_pipeline);
        }

        if let Some(skybox_set) = self.background.skybox_set() {
            cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipelines.skybox.handle());
            cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, pipelines.skybox.layout(), 0, &[skybox_set]);
            cmd.cmd_push_constants(
                pipelines.skybox.layout(),
                vk::ShaderStageFlags::VERTEX,
                0,
                bytemuck::bytes_of(&SkyboxPushConstant {
                    translationless_projection_view: self.translationless_projection_view,
                }),
            );
            cmd.cmd_draw(SKYBOX_VERTEX_COUNT, 1, 0, 0);
            if let Some((recorder, _)) = recorder.as_mut() {
                recorder.reset_binding_state();
            }
        }

        cmd.cmd_end_rendering();

        if let (true, Some((recorder, memo))) = (has_blend, recorder.as_mut()) {
            cmd.begin_label("weighted-blended", LabelColor::COLOR_STAGE);
            Self::record_weighted_blended(cmd, shared, attachments, swapchain_view, full_rect, self.passthru_rect, |_| {
                recorder.reset_binding_state();
                recorder.record(memo.value().with_alpha_mode(AlphaMode::Blend), primitive_pipeline)
            });
            cmd.end_label();
        }

        cmd.end_label();
        cmd.end()
    }

    /// 在 opaque scope 之后：
    /// 1. blend 的 primitive 写入 accumulation / revealage，depth 只读
    /// 2. 全屏三角形把结果混合到 MSAA scene color，并 resolve 到 swapchain image
    fn record_weighted_blended(
        cmd: &GfxCommandBuffer,
        shared: &SharedData,
        attachments: &SwapchainAttachmentGroup,
        swapchain_view: vk::ImageView,
        full_rect: vk::Rect2D,
        passthru_rect: vk::Rect2D,
        record_blend_draws: impl FnOnce(&GfxCommandBuffer) -> usize,
    ) {
        let pipelines = shared.pipelines();
        let (accumulation, revealage) = (attachments.accumulation(), attachments.revealage());

        // 上一次使用这组 attachment 的 composition 在 FRAGMENT_SHADER 中读取 resolve image
        let mut barriers = [accumulation, revealage]
            .into_iter()
            .flat_map(|attachment| [attachment.image().handle(), attachment.resolve_image().handle()])
            .map(|image| {
                Self::color_attachment_barrier(image).src_mask(
                    vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags2::FRAGMENT_SHADER,
                    vk::AccessFlags2::NONE,
                )
            })
            .collect::<Vec<_>>();
        barriers.push(
            GfxImageBarrier::new()
                .image(attachments.depth_image().handle())
                .image_aspect_flag(vk::ImageAspectFlags::DEPTH)
                .layout_transfer(
                    vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                    vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                )
                .src_mask(
                    vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                    vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                )
                .dst_mask(
                    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                    vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
                ),
        );
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), &barriers);

        let blend_attachments = [
            (accumulation, ACCUMULATION_CLEAR_VALUE),
            (revealage, REVEALAGE_CLEAR_VALUE),
        ]
        .map(|(attachment, clear_color)| {
            vk::RenderingAttachmentInfo::default()
                .image_view(attachment.view().handle())
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .clear_value(vk::ClearValue { color: clear_color })
                .resolve_mode(vk::ResolveModeFlags::AVERAGE)
                .resolve_image_view(attachment.resolve_view().handle())
                .resolve_image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        });
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(attachments.depth_view().handle())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::DONT_CARE);
        cmd.cmd_begin_rendering(
            &vk::RenderingInfo::default()
                .render_area(full_rect)
                .layer_count(1)
                .color_attachments(&blend_attachments)
                .depth_attachment(&depth_attachment),
        );
        cmd.cmd_set_viewport(0, &[flipped_viewport(passthru_rect)]);
        cmd.cmd_set_scissor(0, &[passthru_rect]);
        let draw_count = record_blend_draws(cmd);
        cmd.cmd_end_rendering();
        log::trace!("weighted blended: {draw_count} draw buffers");

        let resolve_barriers = [accumulation, revealage].map(|attachment| {
            GfxImageBarrier::new()
                .image(attachment.resolve_image().handle())
                .layout_transfer(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
                .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_SAMPLED_READ)
        });
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), &resolve_barriers);
        cmd.memory_barrier(&[vk::MemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)]);

        let color_attachment = Self::resolved_to_swapchain(
            vk::RenderingAttachmentInfo::default()
                .image_view(attachments.color_view().handle())
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::LOAD)
                .store_op(vk::AttachmentStoreOp::DONT_CARE),
            swapchain_view,
        );
        cmd.cmd_begin_rendering(
            &vk::RenderingInfo::default()
                .render_area(full_rect)
                .layer_count(1)
                .color_attachments(std::slice::from_ref(&color_attachment)),
        );
        // composition 按照 gl_FragCoord 读取 resolve image，viewport 不翻转
        cmd.cmd_set_viewport(
            0,
            &[vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: full_rect.extent.width as f32,
                height: full_rect.extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );
        cmd.cmd_set_scissor(0, &[passthru_rect]);
        let composition = &pipelines.weighted_blended_composition;
        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, composition.handle());
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            composition.layout(),
            0,
            &[attachments.weighted_blended_set()],
        );
        // 全屏三角形
        cmd.cmd_draw(3, 1, 0, 0);
        cmd.cmd_end_rendering();
    }

    fn record_composition(
        &self,
        shared: &SharedData,
        passthru: &PassthruResources,
        image_index: u32,
        forwards: [Option<bool>; 2],
        overlay: &mut dyn UiOverlay,
    ) -> anyhow::Result<()> {
        let cmd = &self.composition_cmd;
        let pipelines = shared.pipelines();
        let swapchain = shared.swapchain()?;
        let swapchain_image = swapchain.image(image_index);
        let swapchain_view = swapchain.image_view(image_index).handle();
        let extent = swapchain.extent();

        let outlines = self
            .active_outlines()
            .filter_map(|(role, style)| forwards[Self::role_index(role)].map(|forward| (role, style, forward)))
            .collect::<Vec<_>>();

        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("frame-{}-composition", self.label))?;

        if !outlines.is_empty() {
            cmd.begin_label("outline", LabelColor::COLOR_PASS);
            let barriers = outlines
                .iter()
                .map(|(role, _, forward)| {
                    GfxImageBarrier::new()
                        .image(passthru.jump_flood(*role).image().handle())
                        .layers(*forward as u32, 1)
                        .layout_transfer(vk::ImageLayout::GENERAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                        .src_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::NONE)
                        .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_SAMPLED_READ)
                })
                .collect::<Vec<_>>();
            cmd.image_memory_barrier(vk::DependencyFlags::empty(), &barriers);

            let color_attachment = vk::RenderingAttachmentInfo::default()
                .image_view(swapchain_view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::LOAD)
                .store_op(vk::AttachmentStoreOp::STORE);
            cmd.cmd_begin_rendering(
                &vk::RenderingInfo::default()
                    .render_area(self.passthru_rect)
                    .layer_count(1)
                    .color_attachments(std::slice::from_ref(&color_attachment)),
            );
            cmd.cmd_set_viewport(
                0,
                &[vk::Viewport {
                    x: self.passthru_rect.offset.x as f32,
                    y: self.passthru_rect.offset.y as f32,
                    width: self.passthru_rect.extent.width as f32,
                    height: self.passthru_rect.extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                }],
            );
            cmd.cmd_set_scissor(0, &[self.passthru_rect]);
            cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipelines.outline.handle());

            for (role, style, forward) in &outlines {
                cmd.begin_label(role.name(), LabelColor::COLOR_STAGE);
                cmd.bind_descriptor_sets(
                    vk::PipelineBindPoint::GRAPHICS,
                    pipelines.outline.layout(),
                    0,
                    &[passthru.jump_flood(*role).sampled_set(*forward)],
                );
                let push_constant = OutlinePushConstant {
                    color: style.color.to_array(),
                    thickness: style.thickness,
                    passthru_offset: [self.passthru_rect.offset.x, self.passthru_rect.offset.y],
                };
                cmd.cmd_push_constants(
                    pipelines.outline.layout(),
                    vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(&push_constant),
                );
                // 全屏三角形
                cmd.cmd_draw(3, 1, 0, 0);
                cmd.end_label();
            }

            cmd.cmd_end_rendering();
            cmd.end_label();
        }

        // overlay 需要看到之前所有对 swapchain image 的写入
        cmd.memory_barrier(&[vk::MemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)]);

        cmd.begin_label("overlay", LabelColor::COLOR_PASS);
        overlay.record(cmd, swapchain_view, extent);
        cmd.end_label();

        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[GfxImageBarrier::new()
                .image(swapchain_image)
                .layout_transfer(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR)
                .src_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
                .dst_mask(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE)],
        );

        cmd.end()
    }

    fn submit(&self, shared: &SharedData, image_index: u32) -> anyhow::Result<()> {
        let gfx = Gfx::get();

        gfx.graphics_queue().submit(
            &[GfxSubmitInfo::new(&[&self.prepass_cmd])
                .signal(&self.prepass_semaphore, vk::PipelineStageFlags2::ALL_COMMANDS)],
            None,
        )?;

        gfx.compute_queue().submit(
            &[GfxSubmitInfo::new(&[&self.jump_flood_cmd])
                .wait(&self.prepass_semaphore, vk::PipelineStageFlags2::COMPUTE_SHADER)
                .signal(&self.jump_flood_semaphore, vk::PipelineStageFlags2::COMPUTE_SHADER)],
            None,
        )?;

        self.in_flight_fence.reset()?;
        gfx.graphics_queue().submit(
            &[
                GfxSubmitInfo::new(&[&self.scene_cmd])
                    .wait(&self.acquire_semaphore, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                    .signal(&self.scene_semaphore, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT),
                GfxSubmitInfo::new(&[&self.composition_cmd])
                    .wait(&self.scene_semaphore, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                    .wait(&self.jump_flood_semaphore, vk::PipelineStageFlags2::FRAGMENT_SHADER)
                    .signal(shared.present_semaphore(image_index), vk::PipelineStageFlags2::ALL_COMMANDS),
            ],
            Some(&self.in_flight_fence),
        )
    }
}
// tools
impl Frame {
    #[inline]
    fn role_index(role: OutlineRole) -> usize {
        match role {
            OutlineRole::Selected => 0,
            OutlineRole::Hovering => 1,
        }
    }

    fn depth_attachment_barrier(image: vk::Image) -> GfxImageBarrier {
        GfxImageBarrier::new()
            .image(image)
            .image_aspect_flag(vk::ImageAspectFlags::DEPTH)
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .src_mask(vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS, vk::AccessFlags2::NONE)
            .dst_mask(
                vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
    }

    /// 从 UNDEFINED 开始的 color attachment，acquire 之后才能写入
    fn color_attachment_barrier(image: vk::Image) -> GfxImageBarrier {
        GfxImageBarrier::new()
            .image(image)
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .src_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags2::NONE)
            .dst_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
    }

    /// MSAA scene color 平均之后写入 swapchain image
    fn resolved_to_swapchain(
        attachment: vk::RenderingAttachmentInfo<'static>,
        swapchain_view: vk::ImageView,
    ) -> vk::RenderingAttachmentInfo<'static> {
        attachment
            .resolve_mode(vk::ResolveModeFlags::AVERAGE)
            .resolve_image_view(swapchain_view)
            .resolve_image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
    }

    /// reverse z：清空为 0
    fn cleared_depth_attachment(view: vk::ImageView) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(view)
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 0.0, stencil: 0 },
            })
    }
}
