use anyhow::Context;
use ash::vk;
use ash::vk::Handle;
use itertools::Itertools;

use crate::{
    commands::{command_queue::GfxCommandQueue, semaphore::GfxSemaphore},
    gfx::Gfx,
    resources::image_view::{GfxImageView, GfxImageViewDesc},
};

/// 创建 swapchain 时的偏好
#[derive(Clone, Debug)]
pub struct GfxSwapchainDesc {
    /// 按顺序尝试，都不支持时使用 surface 的第一个格式
    pub format_candidates: Vec<vk::SurfaceFormatKHR>,
    /// 不支持时回退到 FIFO
    pub present_mode: vk::PresentModeKHR,
}

pub struct GfxRenderSwapchain {
    swapchain_handle: vk::SwapchainKHR,

    swapchain_images: Vec<vk::Image>,
    swapchain_image_views: Vec<GfxImageView>,

    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    swapchain_extent: vk::Extent2D,
}

// new & init
impl GfxRenderSwapchain {
    pub fn new(desc: &GfxSwapchainDesc, window_physical_extent: vk::Extent2D) -> anyhow::Result<Self> {
        let gfx = Gfx::get();
        let pdevice = gfx.physical_device().vk_handle;
        let surface = gfx.surface();

        let surface_format = select_surface_format(&surface.formats(pdevice)?, &desc.format_candidates)
            .context("surface reports no format")?;
        let present_mode = select_present_mode(&surface.present_modes(pdevice)?, desc.present_mode);
        log::info!("swapchain format: {:?}, present mode: {:?}", surface_format, present_mode);

        let mut swapchain = Self {
            swapchain_handle: vk::SwapchainKHR::null(),
            swapchain_images: vec![],
            swapchain_image_views: vec![],
            surface_format,
            present_mode,
            swapchain_extent: vk::Extent2D::default(),
        };
        swapchain.recreate(window_physical_extent)?;
        Ok(swapchain)
    }

    /// 基于旧的 swapchain 创建新的 swapchain，之后销毁旧的
    ///
    /// 调用者需要保证旧的 swapchain image 不再被 GPU 使用
    pub fn recreate(&mut self, window_physical_extent: vk::Extent2D) -> anyhow::Result<()> {
        let _span = tracy_client::span!("GfxRenderSwapchain::recreate");
        let gfx = Gfx::get();
        let gfx_device = gfx.gfx_device();
        let surface_capabilities = gfx.surface().capabilities(gfx.physical_device().vk_handle)?;

        // 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
        let extent = calculate_swapchain_extent(&surface_capabilities, window_physical_extent);
        log::info!(
            "create swapchain: window physical extent: {}x{}, final swapchain extent: {}x{}",
            window_physical_extent.width,
            window_physical_extent.height,
            extent.width,
            extent.height
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(gfx.surface().handle())
            .min_image_count(image_count(&surface_capabilities))
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            // TRANSFER_DST 用于 Nsight 分析
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true)
            .old_swapchain(self.swapchain_handle);

        let new_handle = unsafe { gfx_device.swapchain.create_swapchain(&create_info, None) }
            .context("create swapchain")?;

        // 旧的 image view 需要先于旧 swapchain 销毁
        self.swapchain_image_views.clear();
        if !self.swapchain_handle.is_null() {
            unsafe { gfx_device.swapchain.destroy_swapchain(self.swapchain_handle, None) };
        }
        self.swapchain_handle = new_handle;
        gfx_device.set_object_debug_name(new_handle, "main");

        self.swapchain_images =
            unsafe { gfx_device.swapchain.get_swapchain_images(new_handle) }.context("get swapchain images")?;
        self.swapchain_image_views = self
            .swapchain_images
            .iter()
            .enumerate()
            .map(|(idx, image)| {
                gfx_device.set_object_debug_name(*image, format!("swapchain-image-{idx}"));
                GfxImageView::new(
                    *image,
                    GfxImageViewDesc::new_2d(self.surface_format.format, vk::ImageAspectFlags::COLOR),
                    format!("swapchain-image-{idx}"),
                )
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.swapchain_extent = extent;

        Ok(())
    }
}

// getters
impl GfxRenderSwapchain {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain_extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain_images.len()
    }

    #[inline]
    pub fn image(&self, index: u32) -> vk::Image {
        self.swapchain_images[index as usize]
    }

    #[inline]
    pub fn image_view(&self, index: u32) -> &GfxImageView {
        &self.swapchain_image_views[index as usize]
    }
}

// update
impl GfxRenderSwapchain {
    /// 不阻塞地获取下一张 image
    ///
    /// # return
    /// * `Ok(Some(index))` - 成功，suboptimal 也视为成功
    /// * `Ok(None)` - swapchain 已经 out of date，需要重建
    pub fn acquire_next_image(&self, semaphore: &GfxSemaphore) -> anyhow::Result<Option<u32>> {
        let result = unsafe {
            Gfx::get().gfx_device().swapchain.acquire_next_image(
                self.swapchain_handle,
                u64::MAX,
                semaphore.handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, is_suboptimal)) => {
                if is_suboptimal {
                    log::warn!("swapchain acquire image index {} is not optimal", image_index);
                }
                Ok(Some(image_index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when acquire next image");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::from(e).context("acquire next swapchain image")),
        }
    }

    /// # return
    /// * `Ok(false)` - out of date 或者 suboptimal，需要重建
    pub fn present_image(
        &self,
        queue: &GfxCommandQueue,
        image_index: u32,
        wait_semaphores: &[&GfxSemaphore],
    ) -> anyhow::Result<bool> {
        let wait_semaphores = wait_semaphores.iter().map(|s| s.handle()).collect_vec();
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.swapchain_handle));

        let result = unsafe { Gfx::get().gfx_device().swapchain.queue_present(queue.handle(), &present_info) };
        match result {
            Ok(false) => Ok(true),
            Ok(true) => {
                log::warn!("swapchain present image index {} is not optimal", image_index);
                Ok(false)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when present image");
                Ok(false)
            }
            Err(e) => Err(anyhow::Error::from(e).context("present swapchain image")),
        }
    }
}

// destroy
impl GfxRenderSwapchain {
    pub fn destroy(mut self) {
        self.swapchain_image_views.clear();
        unsafe {
            Gfx::get().gfx_device().swapchain.destroy_swapchain(self.swapchain_handle, None);
        }
        self.swapchain_handle = vk::SwapchainKHR::null();
    }
}
impl Drop for GfxRenderSwapchain {
    fn drop(&mut self) {
        debug_assert!(self.swapchain_handle.is_null(), "GfxRenderSwapchain must be destroyed manually");
    }
}

// tools

/// 确定 swapchain 的 extent 尺寸
///
/// 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
pub fn calculate_swapchain_extent(
    surface_capabilities: &vk::SurfaceCapabilitiesKHR,
    window_physical_extent: vk::Extent2D,
) -> vk::Extent2D {
    let surface_extent = surface_capabilities.current_extent;
    if surface_extent.width == u32::MAX || surface_extent.height == u32::MAX {
        let width = window_physical_extent
            .width
            .clamp(surface_capabilities.min_image_extent.width, surface_capabilities.max_image_extent.width);
        let height = window_physical_extent
            .height
            .clamp(surface_capabilities.min_image_extent.height, surface_capabilities.max_image_extent.height);
        vk::Extent2D { width, height }
    } else {
        surface_extent
    }
}

/// max_image_count == 0，表示不限制 image 数量
pub fn image_count(surface_capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = surface_capabilities.min_image_count + 1;
    if surface_capabilities.max_image_count == 0 {
        wanted
    } else {
        wanted.min(surface_capabilities.max_image_count)
    }
}

pub fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
    candidates: &[vk::SurfaceFormatKHR],
) -> Option<vk::SurfaceFormatKHR> {
    candidates
        .iter()
        .find(|c| available.iter().any(|a| a.format == c.format && a.color_space == c.color_space))
        .or_else(|| available.first())
        .copied()
}

/// FIFO 一定受支持
pub fn select_present_mode(available: &[vk::PresentModeKHR], preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
    if available.contains(&preferred) { preferred } else { vk::PresentModeKHR::FIFO }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            min_image_count: min_count,
            max_image_count: max_count,
            ..Default::default()
        }
    }

    #[test]
    fn extent_follows_surface_unless_special_value() {
        let window = vk::Extent2D {
            width: 8000,
            height: 600,
        };
        assert_eq!(calculate_swapchain_extent(&caps((1280, 720), 2, 3), window).width, 1280);
        let free = calculate_swapchain_extent(&caps((u32::MAX, u32::MAX), 2, 3), window);
        assert_eq!((free.width, free.height), (4096, 600));
    }

    #[test]
    fn image_count_respects_max() {
        assert_eq!(image_count(&caps((1, 1), 2, 0)), 3);
        assert_eq!(image_count(&caps((1, 1), 2, 2)), 2);
    }

    #[test]
    fn surface_format_prefers_candidate_order() {
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(select_surface_format(&[unorm, srgb], &[srgb]), Some(srgb));
        assert_eq!(select_surface_format(&[unorm], &[srgb]), Some(unorm));
        assert_eq!(select_surface_format(&[], &[srgb]), None);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(select_present_mode(&available, vk::PresentModeKHR::MAILBOX), vk::PresentModeKHR::MAILBOX);
        assert_eq!(select_present_mode(&available, vk::PresentModeKHR::IMMEDIATE), vk::PresentModeKHR::FIFO);
    }
}
