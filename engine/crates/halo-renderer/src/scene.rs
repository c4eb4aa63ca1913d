//! 场景资源的接口
//!
//! 场景由外部的资源构建者（asset loader 或者 viewer 中的程序化场景）准备好 GPU buffer，
//! 渲染核心只读取其中的 device address 以及 index buffer，从不修改。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use ash::vk;
use halo_gfx::resources::buffer::GfxBuffer;
use itertools::Itertools;

use crate::command_separation::criteria::{AlphaMode, IndexType, SeparationKey};

/// 每个 Scene 唯一，用于判断绘制分组是否需要重建
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(u64);
impl SceneId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// 局部空间的包围球
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: glam::Vec3,
    pub radius: f32,
}
impl BoundingSphere {
    pub fn from_points(points: &[glam::Vec3]) -> Self {
        if points.is_empty() {
            return Self {
                center: glam::Vec3::ZERO,
                radius: 0.0,
            };
        }
        let (min, max) = points.iter().fold((glam::Vec3::splat(f32::MAX), glam::Vec3::splat(f32::MIN)), |(min, max), p| {
            (min.min(*p), max.max(*p))
        });
        let center = (min + max) * 0.5;
        let radius = points.iter().map(|p| p.distance(center)).fold(0.0, f32::max);
        Self { center, radius }
    }

    /// 变换到世界空间，半径按最大的轴向缩放放大
    pub fn transformed(&self, transform: &glam::Mat4) -> Self {
        let scale = transform.x_axis.truncate().length().max(transform.y_axis.truncate().length()).max(
            transform.z_axis.truncate().length(),
        );
        Self {
            center: transform.transform_point3(self.center),
            radius: self.radius * scale,
        }
    }
}

/// 顶点属性的位置：device address + stride
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeAccessor {
    pub address: vk::DeviceAddress,
    pub stride: u32,
}

/// primitive 在共享 index buffer 中的范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveIndices {
    pub index_type: IndexType,
    pub first_index: u32,
    pub index_count: u32,
}

/// 一个可绘制的 primitive，属于唯一的 node
#[derive(Debug, Clone)]
pub struct ScenePrimitive {
    pub node_index: u32,
    pub positions: AttributeAccessor,
    /// 没有法线的 primitive 使用 faceted shading
    pub normals: Option<AttributeAccessor>,
    pub vertex_count: u32,
    pub indices: Option<PrimitiveIndices>,
    pub material_index: Option<u32>,
    pub bounds: BoundingSphere,
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub world_transform: glam::Mat4,
    /// primitive 在 [`Scene::primitives`] 中的序号
    pub primitives: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneMaterial {
    pub base_color: glam::Vec4,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
}
impl Default for SceneMaterial {
    fn default() -> Self {
        Self {
            base_color: glam::Vec4::ONE,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
        }
    }
}

/// shader 中通过 gl_InstanceIndex 索引的 primitive 信息
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuPrimitive {
    pub position_address: u64,
    pub normal_address: u64,
    pub position_stride: u32,
    pub normal_stride: u32,
    pub node_index: u32,
    /// -1 表示没有材质
    pub material_index: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuMaterial {
    pub base_color: glam::Vec4,
    pub alpha_cutoff: f32,
    pub _padding: [f32; 3],
}

/// 构建 Scene 所需的全部数据，vertex 和 index buffer 的所有权一并交给 Scene
pub struct SceneDesc {
    pub nodes: Vec<SceneNode>,
    pub primitives: Vec<ScenePrimitive>,
    pub materials: Vec<SceneMaterial>,
    pub vertex_buffers: Vec<GfxBuffer>,
    pub index_buffers: BTreeMap<IndexType, GfxBuffer>,
}

pub struct Scene {
    id: SceneId,

    nodes: Vec<SceneNode>,
    primitives: Vec<ScenePrimitive>,
    materials: Vec<SceneMaterial>,

    _vertex_buffers: Vec<GfxBuffer>,
    index_buffers: BTreeMap<IndexType, GfxBuffer>,

    primitive_buffer: GfxBuffer,
    node_transform_buffer: GfxBuffer,
    material_buffer: GfxBuffer,
}
// new & init
impl Scene {
    pub fn new(desc: SceneDesc) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("Scene::new");
        validate_topology(&desc.nodes, &desc.primitives, desc.materials.len())?;

        let gpu_primitives = desc.primitives.iter().map(Self::gpu_primitive).collect_vec();
        let node_transforms = desc.nodes.iter().map(|n| n.world_transform).collect_vec();
        let gpu_materials = desc
            .materials
            .iter()
            .map(|m| GpuMaterial {
                base_color: m.base_color,
                alpha_cutoff: m.alpha_cutoff,
                _padding: [0.0; 3],
            })
            .collect_vec();

        let usage = vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
        let primitive_buffer = GfxBuffer::new_with_data(&non_empty(gpu_primitives), usage, "scene-primitives")
            .context("upload primitive table")?;
        let node_transform_buffer =
            GfxBuffer::new_with_data(&non_empty(node_transforms), usage, "scene-node-transforms")
                .context("upload node transforms")?;
        let material_buffer = GfxBuffer::new_with_data(&non_empty(gpu_materials), usage, "scene-materials")
            .context("upload material table")?;

        log::info!(
            "scene created: {} nodes, {} primitives, {} materials",
            desc.nodes.len(),
            desc.primitives.len(),
            desc.materials.len()
        );

        Ok(Self {
            id: SceneId::next(),
            nodes: desc.nodes,
            primitives: desc.primitives,
            materials: desc.materials,
            _vertex_buffers: desc.vertex_buffers,
            index_buffers: desc.index_buffers,
            primitive_buffer,
            node_transform_buffer,
            material_buffer,
        })
    }

    fn gpu_primitive(primitive: &ScenePrimitive) -> GpuPrimitive {
        let normals = primitive.normals.unwrap_or(AttributeAccessor { address: 0, stride: 0 });
        GpuPrimitive {
            position_address: primitive.positions.address,
            normal_address: normals.address,
            position_stride: primitive.positions.stride,
            normal_stride: normals.stride,
            node_index: primitive.node_index,
            material_index: primitive.material_index.map_or(-1, |m| m as i32),
        }
    }
}

/// 帧循环中直接用下标访问 node 和 primitive，构建时保证所有引用都在范围内
pub fn validate_topology(
    nodes: &[SceneNode],
    primitives: &[ScenePrimitive],
    material_count: usize,
) -> anyhow::Result<()> {
    for (node_index, node) in nodes.iter().enumerate() {
        for &primitive in &node.primitives {
            anyhow::ensure!(
                (primitive as usize) < primitives.len(),
                "node {node_index} ({}) references primitive {primitive}, but the scene has {} primitives",
                node.name,
                primitives.len()
            );
        }
    }
    for (ordinal, primitive) in primitives.iter().enumerate() {
        anyhow::ensure!(
            (primitive.node_index as usize) < nodes.len(),
            "primitive {ordinal} belongs to node {}, but the scene has {} nodes",
            primitive.node_index,
            nodes.len()
        );
        if let Some(material) = primitive.material_index {
            anyhow::ensure!(
                (material as usize) < material_count,
                "primitive {ordinal} uses material {material}, but the scene has {material_count} materials"
            );
        }
    }
    Ok(())
}

/// 空的 storage buffer 无法创建，至少保留一个元素
fn non_empty<T: bytemuck::Pod>(mut data: Vec<T>) -> Vec<T> {
    if data.is_empty() {
        data.push(T::zeroed());
    }
    data
}

// getters
impl Scene {
    #[inline]
    pub fn id(&self) -> SceneId {
        self.id
    }

    #[inline]
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    #[inline]
    pub fn primitives(&self) -> &[ScenePrimitive] {
        &self.primitives
    }

    #[inline]
    pub fn index_buffer(&self, index_type: IndexType) -> Option<&GfxBuffer> {
        self.index_buffers.get(&index_type)
    }

    #[inline]
    pub fn primitive_buffer_address(&self) -> vk::DeviceAddress {
        self.primitive_buffer.device_address().unwrap_or_default()
    }

    #[inline]
    pub fn node_transform_buffer_address(&self) -> vk::DeviceAddress {
        self.node_transform_buffer.device_address().unwrap_or_default()
    }

    #[inline]
    pub fn material_buffer_address(&self) -> vk::DeviceAddress {
        self.material_buffer.device_address().unwrap_or_default()
    }

    /// primitive 的世界空间包围球
    pub fn world_bounds(&self, primitive_ordinal: u32) -> BoundingSphere {
        let primitive = &self.primitives[primitive_ordinal as usize];
        primitive.bounds.transformed(&self.nodes[primitive.node_index as usize].world_transform)
    }

    /// 决定 primitive 的分组
    pub fn separation_key(&self, primitive_ordinal: u32) -> SeparationKey {
        separation_key_of(&self.primitives[primitive_ordinal as usize], &self.materials)
    }
}

/// 没有材质时按照 glTF 默认材质处理：opaque，单面
pub fn separation_key_of(primitive: &ScenePrimitive, materials: &[SceneMaterial]) -> SeparationKey {
    let material = primitive.material_index.and_then(|m| materials.get(m as usize)).copied().unwrap_or_default();
    SeparationKey {
        alpha_mode: material.alpha_mode,
        faceted: primitive.normals.is_none(),
        double_sided: material.double_sided,
        index_type: primitive.indices.map(|i| i.index_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive(normals: bool, material_index: Option<u32>, indices: Option<IndexType>) -> ScenePrimitive {
        ScenePrimitive {
            node_index: 0,
            positions: AttributeAccessor {
                address: 0x1000,
                stride: 12,
            },
            normals: normals.then_some(AttributeAccessor {
                address: 0x2000,
                stride: 12,
            }),
            vertex_count: 3,
            indices: indices.map(|index_type| PrimitiveIndices {
                index_type,
                first_index: 0,
                index_count: 3,
            }),
            material_index,
            bounds: BoundingSphere {
                center: glam::Vec3::ZERO,
                radius: 1.0,
            },
        }
    }

    #[test]
    fn missing_material_is_opaque_single_sided() {
        let key = separation_key_of(&primitive(true, None, Some(IndexType::U16)), &[]);
        assert_eq!(key.alpha_mode, AlphaMode::Opaque);
        assert!(!key.double_sided);
        assert!(!key.faceted);
        assert_eq!(key.index_type, Some(IndexType::U16));
    }

    #[test]
    fn primitive_without_normals_is_faceted() {
        let materials = [SceneMaterial {
            alpha_mode: AlphaMode::Mask,
            double_sided: true,
            ..Default::default()
        }];
        let key = separation_key_of(&primitive(false, Some(0), None), &materials);
        assert!(key.faceted);
        assert!(key.double_sided);
        assert_eq!(key.alpha_mode, AlphaMode::Mask);
        assert_eq!(key.index_type, None);
    }

    #[test]
    fn gpu_primitive_marks_missing_material() {
        let gpu = Scene::gpu_primitive(&primitive(false, None, None));
        assert_eq!(gpu.material_index, -1);
        assert_eq!(gpu.normal_address, 0);
        assert_eq!(size_of::<GpuPrimitive>(), 32);
        assert_eq!(size_of::<GpuMaterial>(), 32);
    }

    fn node(primitives: Vec<u32>) -> SceneNode {
        SceneNode {
            name: "node".to_string(),
            world_transform: glam::Mat4::IDENTITY,
            primitives,
        }
    }

    #[test]
    fn topology_accepts_consistent_scene() {
        let primitives = vec![primitive(true, Some(0), None), primitive(true, None, None)];
        assert!(validate_topology(&[node(vec![0, 1])], &primitives, 1).is_ok());
        assert!(validate_topology(&[], &[], 0).is_ok());
    }

    #[test]
    fn topology_rejects_dangling_references() {
        let primitives = vec![primitive(true, None, None); 3];
        // node 引用了不存在的 primitive
        let err = validate_topology(&[node(vec![0, 7])], &primitives, 0).unwrap_err();
        assert!(err.to_string().contains("primitive 7"));

        // primitive 指向不存在的 node
        let mut orphan = primitive(true, None, None);
        orphan.node_index = 2;
        assert!(validate_topology(&[node(vec![0])], &[orphan], 0).is_err());

        // 材质越界
        assert!(validate_topology(&[node(vec![0])], &[primitive(true, Some(1), None)], 1).is_err());
    }

    #[test]
    fn bounding_sphere_scales_with_transform() {
        let sphere = BoundingSphere::from_points(&[glam::Vec3::new(-1.0, 0.0, 0.0), glam::Vec3::new(1.0, 0.0, 0.0)]);
        assert_eq!(sphere.center, glam::Vec3::ZERO);
        assert!((sphere.radius - 1.0).abs() < 1e-6);

        let transform = glam::Mat4::from_scale_rotation_translation(
            glam::Vec3::new(1.0, 3.0, 1.0),
            glam::Quat::IDENTITY,
            glam::Vec3::new(0.0, 0.0, 5.0),
        );
        let world = sphere.transformed(&transform);
        assert_eq!(world.center, glam::Vec3::new(0.0, 0.0, 5.0));
        assert!((world.radius - 3.0).abs() < 1e-6);
    }
}
