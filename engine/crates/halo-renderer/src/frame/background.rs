use ash::vk;

/// scene pass 的背景：纯色或者 skybox，二者互斥
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    Solid(glam::Vec3),
    Skybox(vk::DescriptorSet),
}
impl Default for Background {
    fn default() -> Self {
        Self::Solid(glam::Vec3::ZERO)
    }
}
impl Background {
    /// 纯色优先；两者都没有时使用黑色
    pub fn resolve(solid_background: Option<glam::Vec3>, skybox_set: Option<vk::DescriptorSet>) -> Self {
        match (solid_background, skybox_set) {
            (Some(color), _) => Self::Solid(color),
            (None, Some(set)) => Self::Skybox(set),
            (None, None) => Self::default(),
        }
    }

    /// skybox 会覆盖所有未被遮挡的像素，clear color 无关紧要
    #[inline]
    pub fn clear_color(&self) -> vk::ClearColorValue {
        match self {
            Self::Solid(color) => vk::ClearColorValue {
                float32: [color.x, color.y, color.z, 1.0],
            },
            Self::Skybox(_) => vk::ClearColorValue { float32: [0.0; 4] },
        }
    }

    #[inline]
    pub fn skybox_set(&self) -> Option<vk::DescriptorSet> {
        match self {
            Self::Skybox(set) => Some(*set),
            Self::Solid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn solid_color_wins_over_skybox() {
        let set = vk::DescriptorSet::from_raw(7);
        let color = glam::Vec3::new(0.1, 0.2, 0.3);
        assert_eq!(Background::resolve(Some(color), Some(set)), Background::Solid(color));
        assert_eq!(Background::resolve(None, Some(set)), Background::Skybox(set));
        assert_eq!(Background::resolve(None, Some(set)).skybox_set(), Some(set));
    }

    #[test]
    fn falls_back_to_black() {
        let background = Background::resolve(None, None);
        assert_eq!(background, Background::Solid(glam::Vec3::ZERO));
        assert_eq!(unsafe { background.clear_color().float32 }, [0.0, 0.0, 0.0, 1.0]);
    }
}
