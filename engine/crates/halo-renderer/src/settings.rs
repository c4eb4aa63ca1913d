use std::{fmt::Display, ops::Deref};

use ash::vk;

/// 渲染器默认配置
pub struct RendererSettings;
impl RendererSettings {
    /// frames in flight 的数量
    pub const FIF_COUNT: usize = 2;

    pub const SURFACE_FORMAT_CANDIDATES: &'static [vk::SurfaceFormatKHR] = &[
        vk::SurfaceFormatKHR {
            // shader 输出会被自动改变： liner -> sRGB
            format: vk::Format::B8G8R8A8_SRGB,
            // 通知 OS，将数值按照 sRGB 空间进行处理和显示
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
        vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
    ];
    pub const DEFAULT_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;

    /// reverse z，只需要 depth，不需要 stencil
    pub const DEPTH_FORMAT_CANDIDATES: &'static [vk::Format] =
        &[vk::Format::D32_SFLOAT, vk::Format::D32_SFLOAT_S8_UINT, vk::Format::D24_UNORM_S8_UINT];

    pub const SCENE_MSAA_SAMPLES: vk::SampleCountFlags = vk::SampleCountFlags::TYPE_4;

    /// weighted blended OIT：带权重的 premultiplied color 之和，以及 revealage
    pub const ACCUMULATION_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
    pub const REVEALAGE_FORMAT: vk::Format = vk::Format::R16_SFLOAT;

    /// depth prepass 输出的 node index
    pub const NODE_INDEX_FORMAT: vk::Format = vk::Format::R32_UINT;
    /// jump flood 中每个像素保存最近 seed 的坐标
    pub const JUMP_FLOOD_FORMAT: vk::Format = vk::Format::R16G16_UINT;
    /// compute shader 的 workgroup 大小
    pub const JUMP_FLOOD_WORKGROUP_SIZE: u32 = 16;

    /// node index attachment 的 clear 值，也表示 pick buffer 中没有结果
    ///
    /// 场景中的 node 数量需要远小于这个值
    pub const PICK_SENTINEL: u32 = u32::MAX;
}

/// 帧标签（A/B）
///
/// 表示当前处于 Frames in Flight 的哪一帧。
/// 通过 `Deref` 转换为索引 0/1。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLabel {
    A,
    B,
}
impl Deref for FrameLabel {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
        }
    }
}
impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}
impl FrameLabel {
    const INDEX: [usize; RendererSettings::FIF_COUNT] = [0, 1];

    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        match idx {
            0 => Self::A,
            1 => Self::B,
            _ => panic!("Invalid frame index: {idx}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_label_round_trips_index() {
        for idx in 0..RendererSettings::FIF_COUNT {
            assert_eq!(*FrameLabel::from_usize(idx), idx);
        }
        assert_eq!(FrameLabel::B.to_string(), "B");
    }
}
