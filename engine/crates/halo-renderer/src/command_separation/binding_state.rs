use ash::vk;

use crate::command_separation::criteria::IndexType;

/// 连续的 draw 之间避免重复绑定相同的状态
///
/// 每个 render pass 开始时重新创建
#[derive(Debug)]
pub struct ResourceBindingState<P> {
    bound_pipeline: Option<P>,
    push_constant_bound: bool,
    cull_mode: Option<vk::CullModeFlags>,
    index_type: Option<IndexType>,
}
impl<P> Default for ResourceBindingState<P> {
    fn default() -> Self {
        Self {
            bound_pipeline: None,
            push_constant_bound: false,
            cull_mode: None,
            index_type: None,
        }
    }
}
impl<P: Copy + PartialEq> ResourceBindingState<P> {
    /// 返回是否需要绑定
    #[inline]
    pub fn bind_pipeline(&mut self, pipeline: P) -> bool {
        Self::replace(&mut self.bound_pipeline, pipeline)
    }

    /// 所有 pipeline 的 layout 兼容，push constant 只需要设置一次
    #[inline]
    pub fn bind_push_constant(&mut self) -> bool {
        !std::mem::replace(&mut self.push_constant_bound, true)
    }

    #[inline]
    pub fn set_cull_mode(&mut self, cull_mode: vk::CullModeFlags) -> bool {
        Self::replace(&mut self.cull_mode, cull_mode)
    }

    /// 非 indexed 绘制不会改变已绑定的 index buffer
    #[inline]
    pub fn bind_index_buffer(&mut self, index_type: Option<IndexType>) -> Option<IndexType> {
        let index_type = index_type?;
        Self::replace(&mut self.index_type, index_type).then_some(index_type)
    }

    fn replace<T: Copy + PartialEq>(slot: &mut Option<T>, value: T) -> bool {
        if *slot == Some(value) {
            false
        } else {
            *slot = Some(value);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_state_is_not_rebound() {
        let mut state = ResourceBindingState::<u8>::default();
        assert!(state.bind_pipeline(1));
        assert!(!state.bind_pipeline(1));
        assert!(state.bind_pipeline(2));

        assert!(state.bind_push_constant());
        assert!(!state.bind_push_constant());

        assert!(state.set_cull_mode(vk::CullModeFlags::BACK));
        assert!(!state.set_cull_mode(vk::CullModeFlags::BACK));
        assert!(state.set_cull_mode(vk::CullModeFlags::NONE));
    }

    #[test]
    fn non_indexed_draw_keeps_index_buffer() {
        let mut state = ResourceBindingState::<u8>::default();
        assert_eq!(state.bind_index_buffer(Some(IndexType::U16)), Some(IndexType::U16));
        assert_eq!(state.bind_index_buffer(None), None);
        assert_eq!(state.bind_index_buffer(Some(IndexType::U16)), None);
        assert_eq!(state.bind_index_buffer(Some(IndexType::U32)), Some(IndexType::U32));
    }
}
