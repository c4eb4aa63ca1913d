//! 程序生成的渐变 cubemap，代替 IBL 提供 skybox

use ash::vk;
use halo_gfx::{
    commands::barrier::GfxImageBarrier,
    gfx::Gfx,
    resources::{
        buffer::GfxBuffer,
        image::{GfxImage, GfxImageCreateInfo},
        image_view::{GfxImageView, GfxImageViewDesc},
        sampler::GfxSampler,
    },
};

const FACE_SIZE: u32 = 64;
const FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

const ZENITH: glam::Vec3 = glam::Vec3::new(0.18, 0.32, 0.62);
const HORIZON: glam::Vec3 = glam::Vec3::new(0.72, 0.78, 0.85);
const NADIR: glam::Vec3 = glam::Vec3::new(0.16, 0.15, 0.14);

/// cube face 上 uv ∈ [-1, 1] 对应的方向，face 顺序为 +x -x +y -y +z -z
pub fn face_direction(face: u32, u: f32, v: f32) -> glam::Vec3 {
    let dir = match face {
        0 => glam::Vec3::new(1.0, -v, -u),
        1 => glam::Vec3::new(-1.0, -v, u),
        2 => glam::Vec3::new(u, 1.0, v),
        3 => glam::Vec3::new(u, -1.0, -v),
        4 => glam::Vec3::new(u, -v, 1.0),
        _ => glam::Vec3::new(-u, -v, -1.0),
    };
    dir.normalize()
}

pub fn sky_color(dir: glam::Vec3) -> glam::Vec3 {
    if dir.y >= 0.0 {
        HORIZON.lerp(ZENITH, dir.y.powf(0.6))
    } else {
        HORIZON.lerp(NADIR, (-dir.y).powf(0.4))
    }
}

/// 6 个 face 依次排列的 RGBA8 像素
pub fn gradient_texels(size: u32) -> Vec<[u8; 4]> {
    let to_unorm = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    let mut texels = Vec::with_capacity((size * size * 6) as usize);
    for face in 0..6 {
        for y in 0..size {
            for x in 0..size {
                let u = (x as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                let v = (y as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                let c = sky_color(face_direction(face, u, v));
                texels.push([to_unorm(c.x), to_unorm(c.y), to_unorm(c.z), 255]);
            }
        }
    }
    texels
}

pub struct GradientSkybox {
    _image: GfxImage,
    view: GfxImageView,
    sampler: GfxSampler,
}
impl GradientSkybox {
    pub fn new() -> anyhow::Result<Self> {
        let _span = tracy_client::span!("GradientSkybox::new");

        let image = GfxImage::new_device_local(
            &GfxImageCreateInfo::new_cube_info(
                FACE_SIZE,
                FORMAT,
                vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            ),
            "skybox-cubemap",
        )?;

        let texels = gradient_texels(FACE_SIZE);
        let stage_size = size_of_val(texels.as_slice()) as vk::DeviceSize;
        let stage_buffer = GfxBuffer::new_stage_buffer(stage_size, "skybox-stage")?;
        stage_buffer.write_by_mmap(0, &texels)?;

        Gfx::get().one_time_exec(
            |cmd| {
                cmd.image_memory_barrier(
                    vk::DependencyFlags::empty(),
                    &[GfxImageBarrier::new()
                        .image(image.handle())
                        .layers(0, 6)
                        .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                        .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
                        .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)],
                );

                let region = vk::BufferImageCopy2::default()
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: 0,
                        base_array_layer: 0,
                        layer_count: 6,
                    })
                    .image_extent(vk::Extent3D {
                        width: FACE_SIZE,
                        height: FACE_SIZE,
                        depth: 1,
                    });
                cmd.cmd_copy_buffer_to_image(
                    &vk::CopyBufferToImageInfo2::default()
                        .src_buffer(stage_buffer.vk_buffer())
                        .dst_image(image.handle())
                        .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                        .regions(std::slice::from_ref(&region)),
                );

                cmd.image_memory_barrier(
                    vk::DependencyFlags::empty(),
                    &[GfxImageBarrier::new()
                        .image(image.handle())
                        .layers(0, 6)
                        .layout_transfer(
                            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                        )
                        .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                        .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_SAMPLED_READ)],
                );
            },
            "upload-skybox",
        )?;

        let view = GfxImageView::new(image.handle(), GfxImageViewDesc::new_cube(FORMAT), "skybox-cubemap")?;
        let sampler = GfxSampler::new(&GfxSampler::linear_clamp_info(), "skybox")?;

        log::info!("gradient skybox uploaded: {FACE_SIZE}x{FACE_SIZE}x6");
        Ok(Self {
            _image: image,
            view,
            sampler,
        })
    }

    #[inline]
    pub fn view(&self) -> &GfxImageView {
        &self.view
    }

    #[inline]
    pub fn sampler(&self) -> &GfxSampler {
        &self.sampler
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_centers_point_along_axes() {
        let expected = [
            glam::Vec3::X,
            glam::Vec3::NEG_X,
            glam::Vec3::Y,
            glam::Vec3::NEG_Y,
            glam::Vec3::Z,
            glam::Vec3::NEG_Z,
        ];
        for (face, axis) in expected.into_iter().enumerate() {
            assert!(face_direction(face as u32, 0.0, 0.0).abs_diff_eq(axis, 1e-6));
        }
    }

    #[test]
    fn gradient_goes_from_ground_to_sky() {
        assert!(sky_color(glam::Vec3::Y).abs_diff_eq(ZENITH, 1e-6));
        assert!(sky_color(glam::Vec3::NEG_Y).abs_diff_eq(NADIR, 1e-6));
        assert!(sky_color(glam::Vec3::X).abs_diff_eq(HORIZON, 1e-6));
    }

    #[test]
    fn texel_count_covers_six_faces() {
        let texels = gradient_texels(4);
        assert_eq!(texels.len(), 4 * 4 * 6);
        assert!(texels.iter().all(|t| t[3] == 255));
    }
}
