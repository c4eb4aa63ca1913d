//! 鼠标拾取：将 node index attachment 中鼠标所在的 1 个 texel 拷贝到 host 可见的 buffer
//!
//! GPU 写入之后，同一个 slot 下一次 `update` 时读取，因此有一帧的延迟

use ash::vk;
use halo_gfx::{
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier},
        command_buffer::GfxCommandBuffer,
    },
    resources::buffer::GfxBuffer,
};

use crate::settings::RendererSettings;

/// 取出当前值并写回 sentinel
#[inline]
pub fn drain_pick(value: &mut u32) -> Option<u32> {
    let picked = std::mem::replace(value, RendererSettings::PICK_SENTINEL);
    (picked != RendererSettings::PICK_SENTINEL).then_some(picked)
}

/// 鼠标相对于 passthru rect 左上角的偏移，鼠标不在 rect 内时为 None
pub fn cursor_offset(cursor_position: Option<glam::Vec2>, passthru_rect: vk::Rect2D) -> Option<glam::UVec2> {
    let cursor = cursor_position?;
    let offset = glam::Vec2::new(passthru_rect.offset.x as f32, passthru_rect.offset.y as f32);
    let local = (cursor - offset).floor();
    let inside = local.x >= 0.0
        && local.y >= 0.0
        && local.x < passthru_rect.extent.width as f32
        && local.y < passthru_rect.extent.height as f32;
    inside.then(|| local.as_uvec2())
}

/// 存放一个拾取结果的位置：GPU 拷贝写入，CPU 在 fence 之后读取
pub trait PickCell {
    fn load(&self) -> anyhow::Result<u32>;
    fn store(&self, value: u32) -> anyhow::Result<()>;
}
impl PickCell for GfxBuffer {
    fn load(&self) -> anyhow::Result<u32> {
        self.read_by_mmap(0)
    }

    fn store(&self, value: u32) -> anyhow::Result<()> {
        self.write_by_mmap(0, &[value])
    }
}
impl PickCell for std::cell::Cell<u32> {
    fn load(&self) -> anyhow::Result<u32> {
        Ok(self.get())
    }

    fn store(&self, value: u32) -> anyhow::Result<()> {
        self.set(value);
        Ok(())
    }
}

/// 每个 frame slot 一个，`update` 时 drain，`execute` 时录制拷贝
pub struct PickReadback<C: PickCell = GfxBuffer> {
    cell: C,
}
impl<C: PickCell> PickReadback<C> {
    /// 写入 sentinel 作为初始值
    pub fn with_cell(cell: C) -> anyhow::Result<Self> {
        cell.store(RendererSettings::PICK_SENTINEL)?;
        Ok(Self { cell })
    }

    /// 调用之前需要等待该 slot 的 fence
    pub fn drain(&self) -> anyhow::Result<Option<u32>> {
        let mut value = self.cell.load()?;
        let picked = drain_pick(&mut value);
        if picked.is_some() {
            self.cell.store(value)?;
        }
        Ok(picked)
    }

    #[inline]
    pub fn cell(&self) -> &C {
        &self.cell
    }
}
impl PickReadback<GfxBuffer> {
    pub fn new(debug_name: &str) -> anyhow::Result<Self> {
        let buffer = GfxBuffer::new(
            size_of::<u32>() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_DST,
            None,
            true,
            debug_name,
        )?;
        Self::with_cell(buffer)
    }

    /// 在 node index attachment 写入之后录制
    ///
    /// 进入时 image 处于 COLOR_ATTACHMENT_OPTIMAL，结束时处于 TRANSFER_SRC_OPTIMAL
    pub fn record_copy(&self, cmd: &GfxCommandBuffer, node_index_image: vk::Image, cursor_offset: glam::UVec2) {
        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[GfxImageBarrier::new()
                .image(node_index_image)
                .layout_transfer(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .src_mask(
                    vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                )
                .dst_mask(vk::PipelineStageFlags2::COPY, vk::AccessFlags2::TRANSFER_READ)],
        );

        let region = vk::BufferImageCopy2::default()
            .buffer_offset(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D {
                x: cursor_offset.x as i32,
                y: cursor_offset.y as i32,
                z: 0,
            })
            .image_extent(vk::Extent3D {
                width: 1,
                height: 1,
                depth: 1,
            });
        cmd.cmd_copy_image_to_buffer(
            &vk::CopyImageToBufferInfo2::default()
                .src_image(node_index_image)
                .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .dst_buffer(self.cell.vk_buffer())
                .regions(std::slice::from_ref(&region)),
        );

        cmd.buffer_memory_barrier(
            vk::DependencyFlags::empty(),
            &[GfxBufferBarrier::new()
                .buffer(self.cell.vk_buffer(), 0, vk::WHOLE_SIZE)
                .src_mask(vk::PipelineStageFlags2::COPY, vk::AccessFlags2::TRANSFER_WRITE)
                .dst_mask(vk::PipelineStageFlags2::HOST, vk::AccessFlags2::HOST_READ)],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 100, y: 50 },
            extent: vk::Extent2D {
                width: 200,
                height: 100,
            },
        }
    }

    #[test]
    fn drain_swaps_with_sentinel() {
        let mut value = 42;
        assert_eq!(drain_pick(&mut value), Some(42));
        assert_eq!(value, RendererSettings::PICK_SENTINEL);
        assert_eq!(drain_pick(&mut value), None);
    }

    #[test]
    fn cursor_offset_relative_to_rect() {
        assert_eq!(cursor_offset(Some(glam::Vec2::new(150.5, 60.0)), rect()), Some(glam::UVec2::new(50, 10)));
        assert_eq!(cursor_offset(Some(glam::Vec2::new(100.0, 50.0)), rect()), Some(glam::UVec2::ZERO));
        assert_eq!(cursor_offset(Some(glam::Vec2::new(299.9, 149.9)), rect()), Some(glam::UVec2::new(199, 99)));
    }

    #[test]
    fn cursor_outside_rect_is_none() {
        assert_eq!(cursor_offset(Some(glam::Vec2::new(99.0, 60.0)), rect()), None);
        assert_eq!(cursor_offset(Some(glam::Vec2::new(300.0, 60.0)), rect()), None);
        assert_eq!(cursor_offset(Some(glam::Vec2::new(150.0, 150.0)), rect()), None);
        assert_eq!(cursor_offset(None, rect()), None);
    }

    /// GPU 的拷贝在请求帧的 execute 中写入，之后同一个 slot 的 update 读取
    #[test]
    fn pick_visible_within_two_frames() {
        use std::cell::Cell;

        use crate::frame_counter::FrameCounter;

        let slots = FrameCounter::frame_labels()
            .map(|_| PickReadback::with_cell(Cell::new(0)).unwrap());
        let mut counter = FrameCounter::new(0);
        let request_frame = 5u64;
        let picked_node = 9;

        let mut seen_at = None;
        for _ in 0..12 {
            let slot = &slots[*counter.frame_label()];
            // update：fence 已经等待
            if let Some(node) = slot.drain().unwrap() {
                assert_eq!(node, picked_node);
                assert!(seen_at.is_none(), "pick reported twice");
                seen_at = Some(counter.frame_id());
            }
            // execute：只有请求帧的鼠标在 rect 内
            if counter.frame_id() == request_frame {
                slot.cell().store(picked_node).unwrap();
            }
            counter.next_frame();
        }

        let seen_at = seen_at.expect("pick never surfaced");
        assert!(seen_at > request_frame && seen_at <= request_frame + 2);
    }

    #[test]
    fn readback_starts_empty_and_drains_once() {
        let readback = PickReadback::with_cell(std::cell::Cell::new(17)).unwrap();
        assert_eq!(readback.drain().unwrap(), None);

        readback.cell().store(4).unwrap();
        assert_eq!(readback.drain().unwrap(), Some(4));
        assert_eq!(readback.drain().unwrap(), None);
        assert_eq!(readback.cell().get(), RendererSettings::PICK_SENTINEL);
    }
}
