use ash::vk;
use halo_gfx::{
    descriptors::{
        descriptor::pool_sizes_for,
        descriptor_pool::{GfxDescriptorPool, GfxDescriptorPoolCreateInfo},
    },
    gfx::Gfx,
    resources::{
        image::{GfxImage, GfxImageCreateInfo},
        image_view::{GfxImageView, GfxImageViewDesc},
        sampler::GfxSampler,
    },
};

use crate::{
    jump_flood::plan::JUMP_FLOOD_SENTINEL,
    settings::RendererSettings,
    shared_data::pipelines::{JUMP_FLOOD_SET_BINDINGS, OUTLINE_SET_BINDINGS},
};

/// seed pass 的 clear 值，对应 shader 中的 sentinel
pub const SEED_CLEAR_VALUE: vk::ClearColorValue = vk::ClearColorValue {
    uint32: [JUMP_FLOOD_SENTINEL as u32, JUMP_FLOOD_SENTINEL as u32, 0, 0],
};

/// 一个描边角色（selected 或者 hovering）需要的 jump flood 资源
///
/// - image 有两个 layer：layer 0 为 ping，也是 seed pass 的 color attachment；layer 1 为 pong
/// - graphics 和 compute 两条队列都会访问，使用 CONCURRENT 共享
pub struct JumpFloodResources {
    image: GfxImage,
    /// compute shader 使用，包含两个 layer
    array_view: GfxImageView,
    /// [ping, pong]
    layer_views: [GfxImageView; 2],

    seed_depth_image: GfxImage,
    seed_depth_view: GfxImageView,

    _descriptor_pool: GfxDescriptorPool,
    /// binding 0: storage image (array view)
    storage_set: vk::DescriptorSet,
    /// outline pass 读取结果 layer，每个 layer 一个 set
    sampled_sets: [vk::DescriptorSet; 2],
}
impl JumpFloodResources {
    pub fn new(
        extent: vk::Extent2D,
        depth_format: vk::Format,
        storage_set_layout: vk::DescriptorSetLayout,
        sampled_set_layout: vk::DescriptorSetLayout,
        sampler: &GfxSampler,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let queue_family_indices = Gfx::get().queue_family_indices();
        let format = RendererSettings::JUMP_FLOOD_FORMAT;

        let image_info = GfxImageCreateInfo::new_image_2d_info(
            extent,
            format,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
        )
        .array_layers(2)
        .queue_family_indices(&[queue_family_indices.graphics_present, queue_family_indices.compute]);
        let image = GfxImage::new_device_local(&image_info, &format!("{debug_name}-jump-flood"))?;

        let array_view = GfxImageView::new(
            image.handle(),
            GfxImageViewDesc::new_2d_array(format, vk::ImageAspectFlags::COLOR, 2),
            format!("{debug_name}-jump-flood-array"),
        )?;
        let ping_view = GfxImageView::new(
            image.handle(),
            GfxImageViewDesc::new_2d_layer(format, vk::ImageAspectFlags::COLOR, 0),
            format!("{debug_name}-jump-flood-ping"),
        )?;
        let pong_view = GfxImageView::new(
            image.handle(),
            GfxImageViewDesc::new_2d_layer(format, vk::ImageAspectFlags::COLOR, 1),
            format!("{debug_name}-jump-flood-pong"),
        )?;

        let seed_depth_image = GfxImage::new_device_local(
            &GfxImageCreateInfo::new_image_2d_info(extent, depth_format, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
            &format!("{debug_name}-seed-depth"),
        )?;
        let seed_depth_view = GfxImageView::new(
            seed_depth_image.handle(),
            GfxImageViewDesc::new_2d(depth_format, vk::ImageAspectFlags::DEPTH),
            format!("{debug_name}-seed-depth"),
        )?;

        let mut pool_sizes = pool_sizes_for(&JUMP_FLOOD_SET_BINDINGS, 1);
        pool_sizes.extend(pool_sizes_for(&OUTLINE_SET_BINDINGS, 2));
        let descriptor_pool = GfxDescriptorPool::new(
            &GfxDescriptorPoolCreateInfo::new(vk::DescriptorPoolCreateFlags::empty(), 3, pool_sizes),
            &format!("{debug_name}-jump-flood"),
        )?;
        let sets = descriptor_pool.allocate(&[storage_set_layout, sampled_set_layout, sampled_set_layout])?;
        let (storage_set, sampled_sets) = (sets[0], [sets[1], sets[2]]);

        let storage_info = [vk::DescriptorImageInfo::default()
            .image_view(array_view.handle())
            .image_layout(vk::ImageLayout::GENERAL)];
        let sampled_infos = [&ping_view, &pong_view].map(|view| {
            [vk::DescriptorImageInfo::default()
                .sampler(sampler.handle())
                .image_view(view.handle())
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)]
        });
        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(storage_set)
                .dst_binding(JUMP_FLOOD_SET_BINDINGS[0].binding)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .image_info(&storage_info),
            vk::WriteDescriptorSet::default()
                .dst_set(sampled_sets[0])
                .dst_binding(OUTLINE_SET_BINDINGS[0].binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&sampled_infos[0]),
            vk::WriteDescriptorSet::default()
                .dst_set(sampled_sets[1])
                .dst_binding(OUTLINE_SET_BINDINGS[0].binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&sampled_infos[1]),
        ];
        Gfx::get().gfx_device().write_descriptor_sets(&writes);

        Ok(Self {
            image,
            array_view,
            layer_views: [ping_view, pong_view],
            seed_depth_image,
            seed_depth_view,
            _descriptor_pool: descriptor_pool,
            storage_set,
            sampled_sets,
        })
    }
}
// getters
impl JumpFloodResources {
    #[inline]
    pub fn image(&self) -> &GfxImage {
        &self.image
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent_2d()
    }

    #[inline]
    pub fn array_view(&self) -> &GfxImageView {
        &self.array_view
    }

    /// seed pass 的 color attachment
    #[inline]
    pub fn ping_view(&self) -> &GfxImageView {
        &self.layer_views[0]
    }

    #[inline]
    pub fn seed_depth_image(&self) -> &GfxImage {
        &self.seed_depth_image
    }

    #[inline]
    pub fn seed_depth_view(&self) -> &GfxImageView {
        &self.seed_depth_view
    }

    #[inline]
    pub fn storage_set(&self) -> vk::DescriptorSet {
        self.storage_set
    }

    /// 结果所在 layer 对应的 sampled set
    #[inline]
    pub fn sampled_set(&self, forward: bool) -> vk::DescriptorSet {
        self.sampled_sets[forward as usize]
    }
}
