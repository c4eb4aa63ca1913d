use std::collections::BTreeSet;

/// viewer 关心的鼠标状态以及选择集
#[derive(Debug, Default)]
pub struct ViewerInput {
    /// 窗口内的物理像素坐标，离开窗口后为 None
    cursor: Option<glam::Vec2>,
    rotating: bool,
    hovering_node: Option<u32>,
    selected_nodes: BTreeSet<u32>,
}

impl ViewerInput {
    /// 返回相机需要旋转的像素偏移
    pub fn on_cursor_moved(&mut self, position: glam::Vec2) -> Option<glam::Vec2> {
        let last = self.cursor.replace(position);
        match last {
            Some(last) if self.rotating => Some(position - last),
            _ => None,
        }
    }

    pub fn on_cursor_left(&mut self) {
        self.cursor = None;
        self.hovering_node = None;
    }

    pub fn set_rotating(&mut self, rotating: bool) {
        self.rotating = rotating;
    }

    /// 拾取结果比当前帧晚若干帧，由 frame 的 update 返回
    pub fn set_hovering(&mut self, node: Option<u32>) {
        if self.cursor.is_some() {
            self.hovering_node = node;
        }
    }

    /// 点击空白处会清空选择
    pub fn select_hovering(&mut self) {
        self.selected_nodes.clear();
        if let Some(node) = self.hovering_node {
            log::info!("select node {node}");
            self.selected_nodes.insert(node);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_nodes.clear();
    }
}
// getters
impl ViewerInput {
    #[inline]
    pub fn cursor(&self) -> Option<glam::Vec2> {
        self.cursor
    }

    #[inline]
    pub fn hovering_node(&self) -> Option<u32> {
        self.hovering_node
    }

    #[inline]
    pub fn selected_nodes(&self) -> &BTreeSet<u32> {
        &self.selected_nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_reports_delta_only_while_rotating() {
        let mut input = ViewerInput::default();
        assert_eq!(input.on_cursor_moved(glam::Vec2::new(10.0, 10.0)), None);
        assert_eq!(input.on_cursor_moved(glam::Vec2::new(12.0, 10.0)), None);

        input.set_rotating(true);
        assert_eq!(input.on_cursor_moved(glam::Vec2::new(15.0, 6.0)), Some(glam::Vec2::new(3.0, -4.0)));

        input.set_rotating(false);
        assert_eq!(input.on_cursor_moved(glam::Vec2::new(20.0, 6.0)), None);
    }

    #[test]
    fn click_selects_hovering_and_escape_clears() {
        let mut input = ViewerInput::default();
        input.on_cursor_moved(glam::Vec2::new(1.0, 1.0));
        input.set_hovering(Some(3));
        input.select_hovering();
        assert_eq!(input.selected_nodes(), &BTreeSet::from([3]));

        input.set_hovering(None);
        input.select_hovering();
        assert!(input.selected_nodes().is_empty());

        input.set_hovering(Some(1));
        input.select_hovering();
        input.clear_selection();
        assert!(input.selected_nodes().is_empty());
    }

    #[test]
    fn leaving_window_drops_stale_hover() {
        let mut input = ViewerInput::default();
        input.on_cursor_moved(glam::Vec2::new(1.0, 1.0));
        input.set_hovering(Some(2));
        input.on_cursor_left();
        // 离开之后仍在途中的拾取结果不再生效
        input.set_hovering(Some(2));
        assert_eq!(input.hovering_node(), None);
        assert_eq!(input.cursor(), None);
    }
}
