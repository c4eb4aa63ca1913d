//! alpha mode 为 blend 的 primitive 使用 weighted blended order independent transparency
//!
//! 1. blend pass：每个片元向 accumulation 累加 `(color * a, a) * w`，并把 revealage 乘以 `1 - a`
//! 2. composition：`accumulation.rgb / accumulation.a` 以 `1 - revealage` 的不透明度混合到 scene color
//!
//! 两个 attachment 的混合都满足交换律，结果与绘制顺序无关。
//! 这里的 CPU 实现与 primitive_blend.frag / weighted_blended_composition.frag 保持一致。

use ash::vk;

/// accumulation 的 clear 值
pub const ACCUMULATION_CLEAR_VALUE: vk::ClearColorValue = vk::ClearColorValue { float32: [0.0; 4] };
/// revealage 的 clear 值：完全可见
pub const REVEALAGE_CLEAR_VALUE: vk::ClearColorValue = vk::ClearColorValue {
    float32: [1.0, 0.0, 0.0, 0.0],
};

/// accumulation：dst + src
pub fn accumulation_blend_state() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::ONE)
        .dst_color_blend_factor(vk::BlendFactor::ONE)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ONE)
        .alpha_blend_op(vk::BlendOp::ADD)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

/// revealage：dst * (1 - src)，只有 R 通道
pub fn revealage_blend_state() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::ZERO)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_COLOR)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ZERO)
        .dst_alpha_blend_factor(vk::BlendFactor::ONE)
        .alpha_blend_op(vk::BlendOp::ADD)
        .color_write_mask(vk::ColorComponentFlags::R)
}

/// 片元的权重，depth 为 reverse z 下的深度（1 最近，0 最远）
pub fn weight(alpha: f32, depth: f32) -> f32 {
    let w = (alpha * 10.0).min(1.0) + 0.01;
    let d = 1.0 - (1.0 - depth) * 0.9;
    (w.powi(3) * 1e3 * d.powi(3)).clamp(1e-2, 3e3)
}

/// 一个像素上 accumulation 和 revealage 两个 attachment 的值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedBlendedPixel {
    pub accumulation: glam::Vec4,
    pub revealage: f32,
}
impl Default for WeightedBlendedPixel {
    fn default() -> Self {
        Self {
            accumulation: glam::Vec4::ZERO,
            revealage: 1.0,
        }
    }
}
impl WeightedBlendedPixel {
    /// blend pass 中的一个片元
    pub fn add(&mut self, color: glam::Vec3, alpha: f32, depth: f32) {
        self.accumulation += (color * alpha).extend(alpha) * weight(alpha, depth);
        self.revealage *= 1.0 - alpha;
    }

    /// composition 之后的颜色；没有片元覆盖时保持 background
    pub fn composite(&self, background: glam::Vec3) -> glam::Vec3 {
        if self.revealage >= 1.0 {
            return background;
        }
        let color = self.accumulation.truncate() / self.accumulation.w.clamp(1e-4, 5e4);
        let alpha = 1.0 - self.revealage;
        color * alpha + background * (1.0 - alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKGROUND: glam::Vec3 = glam::Vec3::new(0.1, 0.2, 0.3);

    /// (color, alpha, depth)
    const LAYERS: [(glam::Vec3, f32, f32); 3] = [
        (glam::Vec3::new(1.0, 0.0, 0.0), 0.5, 0.8),
        (glam::Vec3::new(0.0, 1.0, 0.0), 0.3, 0.4),
        (glam::Vec3::new(0.0, 0.0, 1.0), 0.7, 0.1),
    ];

    fn blend(order: [usize; 3]) -> glam::Vec3 {
        let mut pixel = WeightedBlendedPixel::default();
        for idx in order {
            let (color, alpha, depth) = LAYERS[idx];
            pixel.add(color, alpha, depth);
        }
        pixel.composite(BACKGROUND)
    }

    #[test]
    fn result_does_not_depend_on_draw_order() {
        let expected = blend([0, 1, 2]);
        for order in [[2, 1, 0], [1, 0, 2], [2, 0, 1]] {
            assert!(blend(order).abs_diff_eq(expected, 1e-5), "{order:?}");
        }
    }

    #[test]
    fn uncovered_pixel_keeps_background() {
        assert_eq!(WeightedBlendedPixel::default().composite(BACKGROUND), BACKGROUND);

        let mut invisible = WeightedBlendedPixel::default();
        invisible.add(glam::Vec3::ONE, 0.0, 0.5);
        assert!(invisible.composite(BACKGROUND).abs_diff_eq(BACKGROUND, 1e-6));
    }

    #[test]
    fn single_layer_matches_alpha_blending() {
        let mut pixel = WeightedBlendedPixel::default();
        pixel.add(glam::Vec3::X, 0.25, 0.5);
        let expected = glam::Vec3::X * 0.25 + BACKGROUND * 0.75;
        assert!(pixel.composite(BACKGROUND).abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn nearer_fragments_weigh_more() {
        assert!(weight(0.5, 0.9) > weight(0.5, 0.1));
        assert!(weight(0.9, 0.5) > weight(0.05, 0.5));
        assert!(weight(0.0, 0.0) >= 1e-2);
        assert!(weight(1.0, 1.0) <= 3e3);
    }

    #[test]
    fn revealage_only_writes_red() {
        let state = revealage_blend_state();
        assert_eq!(state.color_write_mask, vk::ColorComponentFlags::R);
        assert_eq!(state.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_COLOR);
        assert_eq!(accumulation_blend_state().dst_color_blend_factor, vk::BlendFactor::ONE);
    }
}
