/// 一个 frame in flight slot 当前所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// 刚创建，还没有 passthru 资源
    Uninitialized,
    /// update 完成，可以 execute
    Ready,
    Recording,
    /// 已经提交，fence 尚未等待
    Submitted,
    AwaitingPassthruResize,
    /// acquire 或 present 失败，等待调用者重建 swapchain
    AwaitingSwapchainResize,
}
impl FrameState {
    pub fn can_transition_to(self, next: FrameState) -> bool {
        use FrameState::*;
        match (self, next) {
            (_, AwaitingSwapchainResize) => true,
            (Uninitialized, AwaitingPassthruResize) => true,
            (Ready, Ready | Recording | AwaitingPassthruResize) => true,
            (Recording, Submitted) => true,
            (Submitted, Ready | AwaitingPassthruResize) => true,
            (AwaitingPassthruResize, Ready) => true,
            (AwaitingSwapchainResize, Ready | AwaitingPassthruResize) => true,
            _ => false,
        }
    }

    /// 非法的转换属于编程错误
    #[inline]
    pub fn transition(&mut self, next: FrameState) {
        debug_assert!(self.can_transition_to(next), "invalid frame state transition: {self:?} -> {next:?}");
        log::trace!("frame state: {self:?} -> {next:?}");
        *self = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_state_cycle() {
        let mut state = FrameState::Uninitialized;
        for next in [
            FrameState::AwaitingPassthruResize,
            FrameState::Ready,
            FrameState::Recording,
            FrameState::Submitted,
            FrameState::Ready,
            FrameState::Recording,
            FrameState::Submitted,
        ] {
            state.transition(next);
        }
        assert_eq!(state, FrameState::Submitted);
    }

    #[test]
    fn swapchain_resize_reachable_from_everywhere() {
        use FrameState::*;
        for state in [Uninitialized, Ready, Recording, Submitted, AwaitingPassthruResize, AwaitingSwapchainResize] {
            assert!(state.can_transition_to(AwaitingSwapchainResize), "{state:?}");
        }
    }

    #[test]
    fn recording_cannot_skip_submit() {
        assert!(!FrameState::Recording.can_transition_to(FrameState::Ready));
        assert!(!FrameState::Uninitialized.can_transition_to(FrameState::Recording));
        assert!(!FrameState::Submitted.can_transition_to(FrameState::Recording));
    }
}
