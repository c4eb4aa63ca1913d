use crate::settings::{FrameLabel, RendererSettings};

pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64) -> Self {
        Self { frame_id: init_frame_id }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub const fn fif_count() -> usize {
        RendererSettings::FIF_COUNT
    }
    #[inline]
    pub const fn frame_labels() -> [FrameLabel; RendererSettings::FIF_COUNT] {
        [FrameLabel::A, FrameLabel::B]
    }
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel::from_usize((self.frame_id % Self::fif_count() as u64) as usize)
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_rotate_round_robin() {
        let mut counter = FrameCounter::new(0);
        let mut labels = vec![];
        for _ in 0..5 {
            labels.push(counter.frame_label());
            counter.next_frame();
        }
        assert_eq!(labels, vec![FrameLabel::A, FrameLabel::B, FrameLabel::A, FrameLabel::B, FrameLabel::A]);
        assert_eq!(counter.frame_name(), "[F5B]");
    }
}
