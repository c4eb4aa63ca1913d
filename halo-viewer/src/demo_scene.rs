//! 程序生成的演示场景
//!
//! 覆盖所有绘制分组：opaque / mask / blend、u16 / u32 index、无 index、双面材质、没有法线的 primitive

use std::collections::BTreeMap;

use anyhow::Context;
use ash::vk;
use halo_gfx::resources::buffer::GfxBuffer;
use halo_renderer::{
    command_separation::criteria::{AlphaMode, IndexType},
    scene::{
        AttributeAccessor, BoundingSphere, PrimitiveIndices, Scene, SceneDesc, SceneMaterial, SceneNode,
        ScenePrimitive,
    },
};

/// 每个面 4 个顶点，法线按面区分
pub struct CubeMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u16>,
}

/// 边长为 1，中心在原点，逆时针为正面
pub fn cube_mesh() -> CubeMesh {
    let face_normals = [
        glam::Vec3::X,
        glam::Vec3::NEG_X,
        glam::Vec3::Y,
        glam::Vec3::NEG_Y,
        glam::Vec3::Z,
        glam::Vec3::NEG_Z,
    ];

    let mut mesh = CubeMesh {
        positions: Vec::with_capacity(24),
        normals: Vec::with_capacity(24),
        indices: Vec::with_capacity(36),
    };
    for n in face_normals {
        let u = if n.y.abs() > 0.5 { glam::Vec3::X } else { glam::Vec3::Y };
        let v = n.cross(u);
        let base = mesh.positions.len() as u16;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = 0.5 * (n + su * u + sv * v);
            mesh.positions.push(p.to_array());
            mesh.normals.push(n.to_array());
        }
        mesh.indices.extend([0, 1, 2, 0, 2, 3].map(|i| base + i));
    }
    mesh
}

/// y = 0 平面上边长为 2 的正方形，两个三角形，正面朝 +y
pub fn plane_positions() -> Vec<[f32; 3]> {
    vec![
        [-1.0, 0.0, -1.0],
        [-1.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [-1.0, 0.0, -1.0],
        [1.0, 0.0, 1.0],
        [1.0, 0.0, -1.0],
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoShape {
    /// u16 index
    Cube,
    /// 同样的 cube，使用 u32 index
    CubeWide,
    /// 没有 index，也没有法线
    Plane,
}

pub struct DemoNode {
    pub name: &'static str,
    pub transform: glam::Mat4,
    pub shape: DemoShape,
    pub material: SceneMaterial,
}

pub fn demo_nodes() -> Vec<DemoNode> {
    let opaque = |color: glam::Vec3| SceneMaterial {
        base_color: color.extend(1.0),
        ..Default::default()
    };
    let at = |x: f32, y: f32, z: f32| glam::Mat4::from_translation(glam::Vec3::new(x, y, z));

    vec![
        DemoNode {
            name: "red-cube",
            transform: at(-2.0, 0.5, 0.0),
            shape: DemoShape::Cube,
            material: opaque(glam::Vec3::new(0.85, 0.2, 0.2)),
        },
        DemoNode {
            name: "green-cube",
            transform: at(0.0, 0.75, 0.0)
                * glam::Mat4::from_rotation_y(0.6)
                * glam::Mat4::from_scale(glam::Vec3::splat(1.5)),
            shape: DemoShape::Cube,
            material: opaque(glam::Vec3::new(0.2, 0.75, 0.3)),
        },
        DemoNode {
            name: "masked-cube",
            transform: at(2.0, 0.5, 0.0),
            shape: DemoShape::CubeWide,
            material: SceneMaterial {
                base_color: glam::Vec4::new(0.9, 0.8, 0.2, 0.8),
                alpha_mode: AlphaMode::Mask,
                alpha_cutoff: 0.5,
                ..Default::default()
            },
        },
        DemoNode {
            name: "glass-cube",
            transform: at(0.0, 0.5, 2.2),
            shape: DemoShape::Cube,
            material: SceneMaterial {
                base_color: glam::Vec4::new(0.3, 0.5, 0.95, 0.45),
                alpha_mode: AlphaMode::Blend,
                ..Default::default()
            },
        },
        DemoNode {
            name: "ground",
            transform: glam::Mat4::from_scale(glam::Vec3::new(6.0, 1.0, 6.0)),
            shape: DemoShape::Plane,
            material: SceneMaterial {
                base_color: glam::Vec4::new(0.55, 0.55, 0.58, 1.0),
                double_sided: true,
                ..Default::default()
            },
        },
    ]
}

fn upload_vertices(data: &[[f32; 3]], name: &str) -> anyhow::Result<(GfxBuffer, AttributeAccessor)> {
    let buffer = GfxBuffer::new_with_data(
        data,
        vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        name,
    )?;
    let address = buffer.device_address().with_context(|| format!("{name} has no device address"))?;
    let accessor = AttributeAccessor {
        address,
        stride: size_of::<[f32; 3]>() as u32,
    };
    Ok((buffer, accessor))
}

fn to_points(data: &[[f32; 3]]) -> Vec<glam::Vec3> {
    data.iter().copied().map(glam::Vec3::from).collect()
}

pub fn build_demo_scene() -> anyhow::Result<Scene> {
    let _span = tracy_client::span!("build_demo_scene");

    let cube = cube_mesh();
    let plane = plane_positions();
    let cube_bounds = BoundingSphere::from_points(&to_points(&cube.positions));
    let plane_bounds = BoundingSphere::from_points(&to_points(&plane));

    let (cube_position_buffer, cube_positions) = upload_vertices(&cube.positions, "demo-cube-positions")?;
    let (cube_normal_buffer, cube_normals) = upload_vertices(&cube.normals, "demo-cube-normals")?;
    let (plane_position_buffer, plane_positions) = upload_vertices(&plane, "demo-plane-positions")?;

    let wide_indices = cube.indices.iter().map(|&i| i as u32).collect::<Vec<_>>();
    let mut index_buffers = BTreeMap::new();
    index_buffers.insert(
        IndexType::U16,
        GfxBuffer::new_with_data(&cube.indices, vk::BufferUsageFlags::INDEX_BUFFER, "demo-index-u16")?,
    );
    index_buffers.insert(
        IndexType::U32,
        GfxBuffer::new_with_data(&wide_indices, vk::BufferUsageFlags::INDEX_BUFFER, "demo-index-u32")?,
    );

    let mut desc = SceneDesc {
        nodes: vec![],
        primitives: vec![],
        materials: vec![],
        vertex_buffers: vec![cube_position_buffer, cube_normal_buffer, plane_position_buffer],
        index_buffers,
    };
    for (node_index, node) in demo_nodes().into_iter().enumerate() {
        let node_index = node_index as u32;
        let material_index = Some(desc.materials.len() as u32);
        let cube_primitive = |index_type: IndexType| ScenePrimitive {
            node_index,
            positions: cube_positions,
            normals: Some(cube_normals),
            vertex_count: cube.positions.len() as u32,
            indices: Some(PrimitiveIndices {
                index_type,
                first_index: 0,
                index_count: cube.indices.len() as u32,
            }),
            material_index,
            bounds: cube_bounds,
        };
        let primitive = match node.shape {
            DemoShape::Cube => cube_primitive(IndexType::U16),
            DemoShape::CubeWide => cube_primitive(IndexType::U32),
            DemoShape::Plane => ScenePrimitive {
                node_index,
                positions: plane_positions,
                normals: None,
                vertex_count: plane.len() as u32,
                indices: None,
                material_index,
                bounds: plane_bounds,
            },
        };

        desc.nodes.push(SceneNode {
            name: node.name.to_string(),
            world_transform: node.transform,
            primitives: vec![desc.primitives.len() as u32],
        });
        desc.primitives.push(primitive);
        desc.materials.push(node.material);
    }

    Scene::new(desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_normal(positions: &[[f32; 3]], tri: [usize; 3]) -> glam::Vec3 {
        let [a, b, c] = tri.map(|i| glam::Vec3::from(positions[i]));
        (b - a).cross(c - a)
    }

    #[test]
    fn cube_triangles_face_outward() {
        let mesh = cube_mesh();
        assert_eq!(mesh.positions.len(), 24);
        assert_eq!(mesh.indices.len(), 36);

        for tri in mesh.indices.chunks(3) {
            let tri = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let normal = glam::Vec3::from(mesh.normals[tri[0]]);
            assert!(triangle_normal(&mesh.positions, tri).dot(normal) > 0.0);
        }
        for p in &mesh.positions {
            assert!(p.iter().all(|c| c.abs() == 0.5));
        }
    }

    #[test]
    fn plane_faces_up() {
        let plane = plane_positions();
        assert_eq!(plane.len() % 3, 0);
        for tri in 0..plane.len() / 3 {
            let n = triangle_normal(&plane, [tri * 3, tri * 3 + 1, tri * 3 + 2]);
            assert!(n.normalize().abs_diff_eq(glam::Vec3::Y, 1e-6));
        }
    }

    #[test]
    fn demo_covers_every_draw_group() {
        let nodes = demo_nodes();
        for mode in [AlphaMode::Opaque, AlphaMode::Mask, AlphaMode::Blend] {
            assert!(nodes.iter().any(|n| n.material.alpha_mode == mode));
        }
        for shape in [DemoShape::Cube, DemoShape::CubeWide, DemoShape::Plane] {
            assert!(nodes.iter().any(|n| n.shape == shape));
        }
        assert!(nodes.iter().any(|n| n.shape == DemoShape::Plane && n.material.double_sided));
    }
}
