use ash::vk;
use halo_gfx::{commands::command_buffer::GfxCommandBuffer, resources::buffer::GfxBuffer};

use crate::scene::ScenePrimitive;

/// 与 VkDrawIndexedIndirectCommand 内存布局一致
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct IndexedDrawCommand {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    /// primitive 序号，shader 中通过 gl_InstanceIndex 取得
    pub first_instance: u32,
}

/// 与 VkDrawIndirectCommand 内存布局一致
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawCommand {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    /// primitive 序号，shader 中通过 gl_InstanceIndex 取得
    pub first_instance: u32,
}

/// 同一组内的 draw command 类型一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCommands {
    Indexed(Vec<IndexedDrawCommand>),
    NonIndexed(Vec<DrawCommand>),
}
impl DrawCommands {
    /// 按 primitive 的遍历顺序生成 draw command
    ///
    /// vertex 通过 device address 读取，因此 vertex offset 始终为 0
    pub fn from_primitives(indexed: bool, ordinals: &[u32], primitives: &[ScenePrimitive]) -> Self {
        if indexed {
            Self::Indexed(
                ordinals
                    .iter()
                    .map(|&ordinal| {
                        let indices = primitives[ordinal as usize].indices;
                        IndexedDrawCommand {
                            index_count: indices.map_or(0, |i| i.index_count),
                            instance_count: 1,
                            first_index: indices.map_or(0, |i| i.first_index),
                            vertex_offset: 0,
                            first_instance: ordinal,
                        }
                    })
                    .collect(),
            )
        } else {
            Self::NonIndexed(
                ordinals
                    .iter()
                    .map(|&ordinal| DrawCommand {
                        vertex_count: primitives[ordinal as usize].vertex_count,
                        instance_count: 1,
                        first_vertex: 0,
                        first_instance: ordinal,
                    })
                    .collect(),
            )
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Indexed(commands) => commands.len(),
            Self::NonIndexed(commands) => commands.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn stride(&self) -> u32 {
        match self {
            Self::Indexed(_) => size_of::<IndexedDrawCommand>() as u32,
            Self::NonIndexed(_) => size_of::<DrawCommand>() as u32,
        }
    }

    #[inline]
    pub fn primitive_ordinals(&self) -> Vec<u32> {
        match self {
            Self::Indexed(commands) => commands.iter().map(|c| c.first_instance).collect(),
            Self::NonIndexed(commands) => commands.iter().map(|c| c.first_instance).collect(),
        }
    }

    /// 可见的 command 移动到前面，保持各自的相对顺序，返回可见数量
    pub fn partition_visible(&mut self, is_visible: impl Fn(u32) -> bool) -> usize {
        fn partition<T: Copy>(commands: &mut [T], is_visible: impl Fn(&T) -> bool) -> usize {
            let (visible, hidden): (Vec<T>, Vec<T>) = commands.iter().partition(|c| is_visible(c));
            let visible_count = visible.len();
            for (dst, src) in commands.iter_mut().zip(visible.into_iter().chain(hidden)) {
                *dst = src;
            }
            visible_count
        }

        match self {
            Self::Indexed(commands) => partition(commands, |c| is_visible(c.first_instance)),
            Self::NonIndexed(commands) => partition(commands, |c| is_visible(c.first_instance)),
        }
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Indexed(commands) => bytemuck::cast_slice(commands),
            Self::NonIndexed(commands) => bytemuck::cast_slice(commands),
        }
    }
}

/// 一组 draw command 以及对应的 GPU buffer
///
/// buffer 是 host 可见的，frustum culling 之后直接重写
pub struct IndirectDrawBuffer {
    commands: DrawCommands,
    draw_count: u32,
    buffer: GfxBuffer,
}
impl IndirectDrawBuffer {
    pub fn new(commands: DrawCommands, debug_name: &str) -> anyhow::Result<Self> {
        let size = (commands.len().max(1) * commands.stride() as usize) as vk::DeviceSize;
        let buffer = GfxBuffer::new(size, vk::BufferUsageFlags::INDIRECT_BUFFER, None, true, debug_name)?;
        buffer.write_by_mmap(0, commands.bytes())?;
        Ok(Self {
            draw_count: commands.len() as u32,
            commands,
            buffer,
        })
    }

    #[inline]
    pub fn commands(&self) -> &DrawCommands {
        &self.commands
    }

    #[inline]
    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }

    /// 只保留可见的 primitive，并更新 draw count
    pub fn cull(&mut self, is_visible: impl Fn(u32) -> bool) -> anyhow::Result<()> {
        self.draw_count = self.commands.partition_visible(is_visible) as u32;
        self.buffer.write_by_mmap(0, self.commands.bytes())
    }

    /// 恢复为绘制全部 primitive，command 顺序无需还原
    #[inline]
    pub fn reset_draw_count(&mut self) {
        self.draw_count = self.commands.len() as u32;
    }

    pub fn record(&self, cmd: &GfxCommandBuffer) {
        if self.draw_count == 0 {
            return;
        }
        match self.commands {
            DrawCommands::Indexed(_) => {
                cmd.cmd_draw_indexed_indirect(self.buffer.vk_buffer(), 0, self.draw_count, self.commands.stride())
            }
            DrawCommands::NonIndexed(_) => {
                cmd.cmd_draw_indirect(self.buffer.vk_buffer(), 0, self.draw_count, self.commands.stride())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command_separation::criteria::IndexType,
        scene::{AttributeAccessor, BoundingSphere, PrimitiveIndices},
    };

    fn primitive(first_index: u32, index_count: u32) -> ScenePrimitive {
        ScenePrimitive {
            node_index: 0,
            positions: AttributeAccessor { address: 0, stride: 12 },
            normals: None,
            vertex_count: 24,
            indices: Some(PrimitiveIndices {
                index_type: IndexType::U32,
                first_index,
                index_count,
            }),
            material_index: None,
            bounds: BoundingSphere {
                center: glam::Vec3::ZERO,
                radius: 1.0,
            },
        }
    }

    #[test]
    fn first_instance_encodes_primitive_ordinal() {
        let primitives = vec![primitive(0, 36), primitive(36, 6), primitive(42, 3)];
        let DrawCommands::Indexed(commands) = DrawCommands::from_primitives(true, &[2, 0], &primitives) else {
            panic!("expected indexed commands");
        };
        assert_eq!(commands[0].first_instance, 2);
        assert_eq!(commands[0].first_index, 42);
        assert_eq!(commands[1].index_count, 36);
        assert!(commands.iter().all(|c| c.instance_count == 1 && c.vertex_offset == 0));
    }

    #[test]
    fn non_indexed_commands_use_vertex_count() {
        let primitives = vec![primitive(0, 36)];
        let commands = DrawCommands::from_primitives(false, &[0], &primitives);
        assert_eq!(commands.stride(), 16);
        assert_eq!(
            commands,
            DrawCommands::NonIndexed(vec![DrawCommand {
                vertex_count: 24,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0,
            }])
        );
    }

    #[test]
    fn partition_keeps_relative_order() {
        let primitives = (0..5).map(|i| primitive(i * 3, 3)).collect::<Vec<_>>();
        let mut commands = DrawCommands::from_primitives(true, &[0, 1, 2, 3, 4], &primitives);
        let visible = commands.partition_visible(|ordinal| ordinal % 2 == 1);
        assert_eq!(visible, 2);
        assert_eq!(commands.primitive_ordinals(), vec![1, 3, 0, 2, 4]);
        assert_eq!(commands.stride(), 20);
    }
}
