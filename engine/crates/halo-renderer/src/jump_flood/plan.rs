use ash::vk;

use crate::settings::RendererSettings;

/// 没有被 seed 覆盖的像素
pub const JUMP_FLOOD_SENTINEL: u16 = u16::MAX;

/// seed 坐标以 u16 存放，更宽的描边没有意义
pub const MAX_THICKNESS: u32 = JUMP_FLOOD_SENTINEL as u32;

/// 与 jump_flood.comp 中的 push constant 对应
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct JumpFloodPushConstant {
    /// 为 true 时读取 ping (layer 0) 写入 pong (layer 1)
    pub forward: vk::Bool32,
    pub sample_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpFloodStep {
    pub forward: bool,
    pub sample_offset: u32,
}
impl JumpFloodStep {
    #[inline]
    pub fn push_constant(&self) -> JumpFloodPushConstant {
        JumpFloodPushConstant {
            forward: self.forward as vk::Bool32,
            sample_offset: self.sample_offset,
        }
    }
}

/// 一次 jump flood 的全部 step
///
/// 初始 offset 为 bit_ceil(thickness)，每步减半，直到 1（包含 1）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpFloodPlan {
    steps: Vec<JumpFloodStep>,
}
impl JumpFloodPlan {
    /// thickness 限制在 [1, MAX_THICKNESS]
    pub fn new(thickness: u32) -> Self {
        let mut steps = vec![];
        let mut forward = true;
        let mut sample_offset = thickness.clamp(1, MAX_THICKNESS).next_power_of_two();
        while sample_offset > 0 {
            steps.push(JumpFloodStep { forward, sample_offset });
            forward = !forward;
            sample_offset >>= 1;
        }
        Self { steps }
    }

    /// 描边宽度以像素为单位，向上取整；NaN 按 1 处理
    #[inline]
    pub fn from_thickness(thickness: f32) -> Self {
        Self::new(thickness.ceil().clamp(1.0, MAX_THICKNESS as f32) as u32)
    }

    #[inline]
    pub fn steps(&self) -> &[JumpFloodStep] {
        &self.steps
    }

    /// 结果是否位于 pong layer
    ///
    /// 每一步都切换方向，因此 step 数为奇数时结果在 pong
    #[inline]
    pub fn result_forward(&self) -> bool {
        self.steps.last().is_some_and(|step| step.forward)
    }

    #[inline]
    pub fn result_layer(&self) -> u32 {
        self.result_forward() as u32
    }
}

/// 每个 workgroup 处理 16x16 个像素
#[inline]
pub fn dispatch_group_count(extent: vk::Extent2D) -> glam::UVec3 {
    let size = RendererSettings::JUMP_FLOOD_WORKGROUP_SIZE;
    glam::UVec3::new(extent.width.div_ceil(size), extent.height.div_ceil(size), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 与 jump_flood.comp 相同的算法，在 CPU 上逐步执行
    fn reference_flood(width: u32, height: u32, seeds: &[(u32, u32)], thickness: u32) -> Vec<Option<(u32, u32)>> {
        let mut layers = [vec![None; (width * height) as usize], vec![None; (width * height) as usize]];
        for &(x, y) in seeds {
            layers[0][(y * width + x) as usize] = Some((x, y));
        }

        let plan = JumpFloodPlan::new(thickness);
        for step in plan.steps() {
            let (src, dst) = if step.forward { (0, 1) } else { (1, 0) };
            let offset = step.sample_offset as i64;
            let mut next = vec![None; (width * height) as usize];
            for y in 0..height as i64 {
                for x in 0..width as i64 {
                    let mut best: Option<((u32, u32), f32)> = None;
                    for dy in -1..=1 {
                        for dx in -1..=1 {
                            let (qx, qy) = (x + dx * offset, y + dy * offset);
                            if qx < 0 || qy < 0 || qx >= width as i64 || qy >= height as i64 {
                                continue;
                            }
                            let Some(seed) = layers[src][(qy * width as i64 + qx) as usize] else {
                                continue;
                            };
                            let d = glam::Vec2::new(x as f32, y as f32)
                                .distance(glam::Vec2::new(seed.0 as f32, seed.1 as f32));
                            if best.is_none_or(|(_, best_d)| d < best_d) {
                                best = Some((seed, d));
                            }
                        }
                    }
                    next[(y * width as i64 + x) as usize] = best.map(|(seed, _)| seed);
                }
            }
            layers[dst] = next;
        }
        layers[plan.result_layer() as usize].clone()
    }

    #[test]
    fn single_seed_reaches_pixels_within_thickness() {
        let field = reference_flood(100, 100, &[(50, 50)], 32);
        assert_eq!(field[55 * 100 + 60], Some((50, 50)));
        // 距离 T 以内的像素全部收敛到唯一的 seed
        for y in 0..100u32 {
            for x in 0..100u32 {
                let d = ((x as f32 - 50.0).powi(2) + (y as f32 - 50.0).powi(2)).sqrt();
                if d <= 32.0 {
                    assert_eq!(field[(y * 100 + x) as usize], Some((50, 50)), "pixel ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn nearest_of_two_seeds_wins() {
        let field = reference_flood(64, 16, &[(10, 8), (50, 8)], 16);
        assert_eq!(field[8 * 64 + 20], Some((10, 8)));
        assert_eq!(field[8 * 64 + 40], Some((50, 8)));
    }

    #[test]
    fn step_count_and_parity() {
        for thickness in 1..=300u32 {
            let plan = JumpFloodPlan::new(thickness);
            let step_count = plan.steps().len() as u32;
            assert_eq!(step_count, thickness.next_power_of_two().ilog2() + 1, "thickness {thickness}");
            assert_eq!(plan.result_forward(), step_count % 2 == 1, "thickness {thickness}");
        }
    }

    #[test]
    fn offsets_halve_down_to_one() {
        let plan = JumpFloodPlan::new(5);
        let offsets = plan.steps().iter().map(|s| s.sample_offset).collect::<Vec<_>>();
        assert_eq!(offsets, vec![8, 4, 2, 1]);
        // 第一步读取 ping，写入 pong
        assert!(plan.steps()[0].forward);
        assert!(!plan.result_forward());
        assert_eq!(plan.steps()[1].push_constant().forward, vk::FALSE);
    }

    #[test]
    fn fractional_thickness_rounds_up() {
        assert_eq!(JumpFloodPlan::from_thickness(2.5), JumpFloodPlan::new(3));
        assert_eq!(JumpFloodPlan::from_thickness(0.0), JumpFloodPlan::new(1));
    }

    #[test]
    fn huge_thickness_is_clamped() {
        let widest = JumpFloodPlan::new(MAX_THICKNESS);
        assert_eq!(widest.steps()[0].sample_offset, 1 << 16);
        assert_eq!(widest.steps().len(), 17);

        assert_eq!(JumpFloodPlan::new(u32::MAX), widest);
        assert_eq!(JumpFloodPlan::new(1 << 31), widest);
        assert_eq!(JumpFloodPlan::from_thickness(f32::INFINITY), widest);
        assert_eq!(JumpFloodPlan::from_thickness(3.0e9), widest);
        assert_eq!(JumpFloodPlan::from_thickness(f32::NAN), JumpFloodPlan::new(1));
    }

    #[test]
    fn dispatch_covers_extent() {
        let groups = dispatch_group_count(vk::Extent2D {
            width: 33,
            height: 16,
        });
        assert_eq!(groups, glam::UVec3::new(3, 1, 1));
    }
}
