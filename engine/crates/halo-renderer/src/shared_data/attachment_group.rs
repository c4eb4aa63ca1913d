use ash::vk;
use halo_gfx::{
    descriptors::{
        descriptor::{GfxDescriptorSetLayout, pool_sizes_for},
        descriptor_pool::{GfxDescriptorPool, GfxDescriptorPoolCreateInfo},
    },
    gfx::Gfx,
    resources::{
        image::{GfxImage, GfxImageCreateInfo},
        image_view::{GfxImageView, GfxImageViewDesc},
        sampler::GfxSampler,
    },
};

use crate::{settings::RendererSettings, shared_data::pipelines::WEIGHTED_BLENDED_SET_BINDINGS};

/// 一个 MSAA attachment 以及它的单采样 resolve 目标
pub struct ResolvedAttachment {
    image: GfxImage,
    view: GfxImageView,
    resolve_image: GfxImage,
    resolve_view: GfxImageView,
}
impl ResolvedAttachment {
    /// resolve 的结果会在 composition 中被采样
    fn new(extent: vk::Extent2D, format: vk::Format, debug_name: &str) -> anyhow::Result<Self> {
        let (image, view) = Self::create(
            extent,
            format,
            RendererSettings::SCENE_MSAA_SAMPLES,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
            debug_name,
        )?;
        let (resolve_image, resolve_view) = Self::create(
            extent,
            format,
            vk::SampleCountFlags::TYPE_1,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            &format!("{debug_name}-resolve"),
        )?;
        Ok(Self {
            image,
            view,
            resolve_image,
            resolve_view,
        })
    }

    fn create(
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
        usage: vk::ImageUsageFlags,
        debug_name: &str,
    ) -> anyhow::Result<(GfxImage, GfxImageView)> {
        let image = GfxImage::new_device_local(
            &GfxImageCreateInfo::new_image_2d_info(extent, format, usage).samples(samples),
            debug_name,
        )?;
        let view = GfxImageView::new(
            image.handle(),
            GfxImageViewDesc::new_2d(format, vk::ImageAspectFlags::COLOR),
            debug_name.to_string(),
        )?;
        Ok((image, view))
    }

    #[inline]
    pub fn image(&self) -> &GfxImage {
        &self.image
    }

    #[inline]
    pub fn view(&self) -> &GfxImageView {
        &self.view
    }

    #[inline]
    pub fn resolve_image(&self) -> &GfxImage {
        &self.resolve_image
    }

    #[inline]
    pub fn resolve_view(&self) -> &GfxImageView {
        &self.resolve_view
    }
}

/// scene pass 的 MSAA color 以及 depth，resolve 到对应的 swapchain image；
/// 以及 weighted blended 的 accumulation / revealage
///
/// 每张 swapchain image 一组，swapchain 重建时一起重建
pub struct SwapchainAttachmentGroup {
    color_image: GfxImage,
    color_view: GfxImageView,
    depth_image: GfxImage,
    depth_view: GfxImageView,

    accumulation: ResolvedAttachment,
    revealage: ResolvedAttachment,

    _descriptor_pool: GfxDescriptorPool,
    /// composition 读取两个 resolve image
    weighted_blended_set: vk::DescriptorSet,
}
impl SwapchainAttachmentGroup {
    pub fn new(
        extent: vk::Extent2D,
        color_format: vk::Format,
        depth_format: vk::Format,
        weighted_blended_set_layout: &GfxDescriptorSetLayout,
        sampler: &GfxSampler,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let samples = RendererSettings::SCENE_MSAA_SAMPLES;

        let color_image = GfxImage::new_device_local(
            &GfxImageCreateInfo::new_image_2d_info(
                extent,
                color_format,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
            )
            .samples(samples),
            &format!("{debug_name}-color"),
        )?;
        let color_view = GfxImageView::new(
            color_image.handle(),
            GfxImageViewDesc::new_2d(color_format, vk::ImageAspectFlags::COLOR),
            format!("{debug_name}-color"),
        )?;

        let depth_image = GfxImage::new_device_local(
            &GfxImageCreateInfo::new_image_2d_info(
                extent,
                depth_format,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
            )
            .samples(samples),
            &format!("{debug_name}-depth"),
        )?;
        let depth_view = GfxImageView::new(
            depth_image.handle(),
            GfxImageViewDesc::new_2d(depth_format, vk::ImageAspectFlags::DEPTH),
            format!("{debug_name}-depth"),
        )?;

        let accumulation = ResolvedAttachment::new(
            extent,
            RendererSettings::ACCUMULATION_FORMAT,
            &format!("{debug_name}-accumulation"),
        )?;
        let revealage =
            ResolvedAttachment::new(extent, RendererSettings::REVEALAGE_FORMAT, &format!("{debug_name}-revealage"))?;

        let descriptor_pool = GfxDescriptorPool::new(
            &GfxDescriptorPoolCreateInfo::new(
                vk::DescriptorPoolCreateFlags::empty(),
                1,
                pool_sizes_for(&WEIGHTED_BLENDED_SET_BINDINGS, 1),
            ),
            &format!("{debug_name}-weighted-blended"),
        )?;
        let weighted_blended_set = descriptor_pool.allocate(&[weighted_blended_set_layout.handle()])?[0];

        let image_infos = [&accumulation, &revealage].map(|attachment| {
            [vk::DescriptorImageInfo::default()
                .sampler(sampler.handle())
                .image_view(attachment.resolve_view().handle())
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)]
        });
        let writes = [0, 1].map(|idx| {
            vk::WriteDescriptorSet::default()
                .dst_set(weighted_blended_set)
                .dst_binding(WEIGHTED_BLENDED_SET_BINDINGS[idx].binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_infos[idx])
        });
        Gfx::get().gfx_device().write_descriptor_sets(&writes);

        Ok(Self {
            color_image,
            color_view,
            depth_image,
            depth_view,
            accumulation,
            revealage,
            _descriptor_pool: descriptor_pool,
            weighted_blended_set,
        })
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.color_image.extent_2d()
    }

    #[inline]
    pub fn color_image(&self) -> &GfxImage {
        &self.color_image
    }

    #[inline]
    pub fn color_view(&self) -> &GfxImageView {
        &self.color_view
    }

    #[inline]
    pub fn depth_image(&self) -> &GfxImage {
        &self.depth_image
    }

    #[inline]
    pub fn depth_view(&self) -> &GfxImageView {
        &self.depth_view
    }

    #[inline]
    pub fn accumulation(&self) -> &ResolvedAttachment {
        &self.accumulation
    }

    #[inline]
    pub fn revealage(&self) -> &ResolvedAttachment {
        &self.revealage
    }

    #[inline]
    pub fn weighted_blended_set(&self) -> vk::DescriptorSet {
        self.weighted_blended_set
    }
}
