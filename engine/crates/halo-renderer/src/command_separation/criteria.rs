use ash::vk;

/// glTF 的 alpha mode
///
/// 声明顺序决定了分组表中的顺序：opaque、blend、mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Blend,
    Mask,
}

/// 支持的 index 宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexType {
    U16,
    U32,
}
impl IndexType {
    #[inline]
    pub fn vk_index_type(self) -> vk::IndexType {
        match self {
            Self::U16 => vk::IndexType::UINT16,
            Self::U32 => vk::IndexType::UINT32,
        }
    }
}

/// 分组依据：同一组内的 primitive 可以共用 pipeline 以及动态状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeparationKey {
    pub alpha_mode: AlphaMode,
    /// 没有顶点法线，需要在 fragment shader 中由屏幕空间导数计算面法线
    pub faceted: bool,
    pub double_sided: bool,
    /// None 表示非 indexed 绘制
    pub index_type: Option<IndexType>,
}
impl SeparationKey {
    /// double sided 时关闭背面剔除
    #[inline]
    pub fn cull_mode(&self) -> vk::CullModeFlags {
        if self.double_sided { vk::CullModeFlags::NONE } else { vk::CullModeFlags::BACK }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(alpha_mode: AlphaMode, index_type: Option<IndexType>) -> SeparationKey {
        SeparationKey {
            alpha_mode,
            faceted: false,
            double_sided: false,
            index_type,
        }
    }

    #[test]
    fn alpha_mode_dominates_ordering() {
        let mut keys = vec![
            key(AlphaMode::Mask, None),
            key(AlphaMode::Blend, Some(IndexType::U32)),
            key(AlphaMode::Opaque, Some(IndexType::U32)),
            key(AlphaMode::Opaque, None),
        ];
        keys.sort();
        let modes = keys.iter().map(|k| k.alpha_mode).collect::<Vec<_>>();
        assert_eq!(modes, vec![AlphaMode::Opaque, AlphaMode::Opaque, AlphaMode::Blend, AlphaMode::Mask]);
        assert_eq!(keys[0].index_type, None);
    }

    #[test]
    fn double_sided_disables_culling() {
        let mut k = key(AlphaMode::Opaque, None);
        assert_eq!(k.cull_mode(), vk::CullModeFlags::BACK);
        k.double_sided = true;
        assert_eq!(k.cull_mode(), vk::CullModeFlags::NONE);
    }
}
