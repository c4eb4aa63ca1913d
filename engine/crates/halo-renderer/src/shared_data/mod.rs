//! 所有 frame in flight slot 共享的资源
//!
//! 只在初始化以及 swapchain 重建时修改，重建之前调用者需要 wait idle

pub mod attachment_group;
pub mod pipelines;

use ash::vk;
use halo_gfx::{
    commands::semaphore::GfxSemaphore,
    descriptors::{
        descriptor::pool_sizes_for,
        descriptor_pool::{GfxDescriptorPool, GfxDescriptorPoolCreateInfo},
    },
    gfx::Gfx,
    resources::{image_view::GfxImageView, sampler::GfxSampler},
    swapchain::render_swapchain::{GfxRenderSwapchain, GfxSwapchainDesc},
};

use crate::{
    settings::RendererSettings,
    shared_data::{
        attachment_group::SwapchainAttachmentGroup,
        pipelines::{SKYBOX_SET_BINDINGS, ScenePipelines},
    },
};

pub struct SharedData {
    swapchain: Option<GfxRenderSwapchain>,
    depth_format: vk::Format,

    pipelines: ScenePipelines,

    /// 与 swapchain image 一一对应
    attachment_groups: Vec<SwapchainAttachmentGroup>,
    /// composition 完成后 signal，present 时等待；与 swapchain image 一一对应
    present_semaphores: Vec<GfxSemaphore>,

    /// 读取 jump flood 结果
    nearest_sampler: GfxSampler,

    skybox_descriptor_pool: GfxDescriptorPool,
    skybox_set: Option<vk::DescriptorSet>,
}
// new & init
impl SharedData {
    pub fn new(window_extent: vk::Extent2D) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("SharedData::new");

        let depth_format = Gfx::get()
            .find_supported_format(
                RendererSettings::DEPTH_FORMAT_CANDIDATES,
                vk::ImageTiling::OPTIMAL,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
            .ok_or_else(|| anyhow::anyhow!("no supported depth format"))?;

        let swapchain = GfxRenderSwapchain::new(
            &GfxSwapchainDesc {
                format_candidates: RendererSettings::SURFACE_FORMAT_CANDIDATES.to_vec(),
                present_mode: RendererSettings::DEFAULT_PRESENT_MODE,
            },
            window_extent,
        )?;

        let pipelines = ScenePipelines::new(swapchain.format(), depth_format)?;
        let nearest_sampler = GfxSampler::new(&GfxSampler::nearest_clamp_info(), "nearest-clamp")?;
        let skybox_descriptor_pool = GfxDescriptorPool::new(
            &GfxDescriptorPoolCreateInfo::new(
                vk::DescriptorPoolCreateFlags::empty(),
                1,
                pool_sizes_for(&SKYBOX_SET_BINDINGS, 1),
            ),
            "skybox",
        )?;

        let mut shared_data = Self {
            swapchain: Some(swapchain),
            depth_format,
            pipelines,
            attachment_groups: vec![],
            present_semaphores: vec![],
            nearest_sampler,
            skybox_descriptor_pool,
            skybox_set: None,
        };
        shared_data.rebuild_swapchain_dependents()?;
        Ok(shared_data)
    }

    /// attachment group 以及 present semaphore 跟随 swapchain image
    fn rebuild_swapchain_dependents(&mut self) -> anyhow::Result<()> {
        let swapchain = self.swapchain()?;
        let extent = swapchain.extent();
        let format = swapchain.format();
        let image_count = swapchain.image_count();

        self.attachment_groups.clear();
        self.attachment_groups = (0..image_count)
            .map(|idx| {
                SwapchainAttachmentGroup::new(
                    extent,
                    format,
                    self.depth_format,
                    &self.pipelines.weighted_blended_set_layout,
                    &self.nearest_sampler,
                    &format!("swapchain-attachment-{idx}"),
                )
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        if self.present_semaphores.len() != image_count {
            for semaphore in self.present_semaphores.drain(..) {
                semaphore.destroy();
            }
            self.present_semaphores = (0..image_count)
                .map(|idx| GfxSemaphore::new(&format!("present-{idx}")))
                .collect::<anyhow::Result<Vec<_>>>()?;
        }

        log::info!("{} swapchain attachment groups built: {}x{}", image_count, extent.width, extent.height);
        Ok(())
    }

    pub fn destroy(mut self) {
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy();
        }
        self.attachment_groups.clear();
        for semaphore in self.present_semaphores.drain(..) {
            semaphore.destroy();
        }
    }
}
// resize
impl SharedData {
    /// 重建 swapchain 以及依赖它的资源，调用者需要保证 GPU 已经 idle
    pub fn recreate_swapchain(&mut self, window_extent: vk::Extent2D) -> anyhow::Result<()> {
        let _span = tracy_client::span!("SharedData::recreate_swapchain");
        self.swapchain
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("swapchain already destroyed"))?
            .recreate(window_extent)?;
        self.rebuild_swapchain_dependents()
    }

    /// attachment group 已经和 swapchain 的尺寸一致时不做任何事情
    ///
    /// 返回是否发生了重建
    pub fn handle_swapchain_resize(&mut self, extent: vk::Extent2D) -> anyhow::Result<bool> {
        let swapchain_extent = self.swapchain()?.extent();
        let up_to_date = self.attachment_groups.len() == self.swapchain()?.image_count()
            && self.attachment_groups.iter().all(|group| group.extent() == swapchain_extent);
        if up_to_date {
            if swapchain_extent != extent {
                log::debug!(
                    "requested extent {}x{} clamped to swapchain extent {}x{}",
                    extent.width,
                    extent.height,
                    swapchain_extent.width,
                    swapchain_extent.height
                );
            }
            return Ok(false);
        }
        self.rebuild_swapchain_dependents()?;
        Ok(true)
    }

    /// skybox 的 cubemap 由外部准备，view 需要在 SharedData 销毁之前保持有效
    pub fn set_skybox(&mut self, cubemap_view: &GfxImageView, sampler: &GfxSampler) -> anyhow::Result<()> {
        let set = match self.skybox_set {
            Some(set) => set,
            None => {
                let set = self.skybox_descriptor_pool.allocate(&[self.pipelines.skybox_set_layout.handle()])?[0];
                self.skybox_set = Some(set);
                set
            }
        };

        let image_info = [vk::DescriptorImageInfo::default()
            .sampler(sampler.handle())
            .image_view(cubemap_view.handle())
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(SKYBOX_SET_BINDINGS[0].binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);
        Gfx::get().gfx_device().write_descriptor_sets(std::slice::from_ref(&write));
        Ok(())
    }
}
// getters
impl SharedData {
    #[inline]
    pub fn swapchain(&self) -> anyhow::Result<&GfxRenderSwapchain> {
        self.swapchain.as_ref().ok_or_else(|| anyhow::anyhow!("swapchain already destroyed"))
    }

    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    #[inline]
    pub fn pipelines(&self) -> &ScenePipelines {
        &self.pipelines
    }

    #[inline]
    pub fn attachment_group(&self, image_index: u32) -> &SwapchainAttachmentGroup {
        &self.attachment_groups[image_index as usize]
    }

    #[inline]
    pub fn present_semaphore(&self, image_index: u32) -> &GfxSemaphore {
        &self.present_semaphores[image_index as usize]
    }

    #[inline]
    pub fn nearest_sampler(&self) -> &GfxSampler {
        &self.nearest_sampler
    }

    #[inline]
    pub fn skybox_set(&self) -> Option<vk::DescriptorSet> {
        self.skybox_set
    }
}
