//! selected / hovering 两种描边的决策

use std::collections::BTreeSet;

use crate::frame_task::{OutlineStyle, SceneRenderRequest};

/// 与 outline.frag 中的 push constant 对应
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OutlinePushConstant {
    pub color: [f32; 3],
    pub thickness: f32,
    /// passthru rect 在 swapchain 中的偏移
    pub passthru_offset: [i32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineRole {
    Selected,
    Hovering,
}
impl OutlineRole {
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::Hovering => "hovering",
        }
    }
}

/// 本帧需要绘制哪些描边
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct OutlinePlan {
    pub selected: Option<OutlineStyle>,
    pub hovering: Option<OutlineStyle>,
}
impl OutlinePlan {
    pub fn new(request: &SceneRenderRequest) -> Self {
        Self {
            selected: Self::selected_style(&request.selected_nodes, request.selected_outline),
            hovering: Self::hovering_style(&request.selected_nodes, request.hovering_node, request.hovering_outline),
        }
    }

    fn selected_style(selected_nodes: &BTreeSet<u32>, style: Option<OutlineStyle>) -> Option<OutlineStyle> {
        if selected_nodes.is_empty() { None } else { style }
    }

    /// 唯一被选中的 node 就是 hovering node 时，两条描边重合，不绘制 hovering
    fn hovering_style(
        selected_nodes: &BTreeSet<u32>,
        hovering_node: Option<u32>,
        style: Option<OutlineStyle>,
    ) -> Option<OutlineStyle> {
        let hovering_node = hovering_node?;
        if selected_nodes.len() == 1 && selected_nodes.contains(&hovering_node) {
            return None;
        }
        style
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.selected.is_none() && self.hovering.is_none()
    }

    /// 绘制顺序：selected 在前，hovering 覆盖在上面
    pub fn draws(&self) -> impl Iterator<Item = (OutlineRole, OutlineStyle)> {
        [(OutlineRole::Selected, self.selected), (OutlineRole::Hovering, self.hovering)]
            .into_iter()
            .filter_map(|(role, style)| style.map(|style| (role, style)))
    }

    #[inline]
    pub fn style(&self, role: OutlineRole) -> Option<OutlineStyle> {
        match role {
            OutlineRole::Selected => self.selected,
            OutlineRole::Hovering => self.hovering,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLE: OutlineStyle = OutlineStyle {
        color: glam::Vec3::new(1.0, 0.5, 0.2),
        thickness: 4.0,
    };
    const HOVER: OutlineStyle = OutlineStyle {
        color: glam::Vec3::ONE,
        thickness: 2.0,
    };

    fn plan(selected: &[u32], hovering: Option<u32>) -> OutlinePlan {
        let selected = selected.iter().copied().collect();
        OutlinePlan {
            selected: OutlinePlan::selected_style(&selected, Some(STYLE)),
            hovering: OutlinePlan::hovering_style(&selected, hovering, Some(HOVER)),
        }
    }

    #[test]
    fn sole_selected_node_suppresses_hovering() {
        let plan = plan(&[3], Some(3));
        assert_eq!(plan.draws().count(), 1);
        assert_eq!(plan.draws().next().map(|(role, _)| role), Some(OutlineRole::Selected));
    }

    #[test]
    fn repeated_sole_selection_still_suppresses_hovering() {
        let plan = plan(&[3, 3], Some(3));
        assert_eq!(plan.hovering, None);
        assert_eq!(plan.selected, Some(STYLE));
    }

    #[test]
    fn hovering_kept_when_selection_has_more_nodes() {
        let plan = plan(&[3, 4], Some(3));
        let roles = plan.draws().map(|(role, _)| role).collect::<Vec<_>>();
        assert_eq!(roles, vec![OutlineRole::Selected, OutlineRole::Hovering]);
    }

    #[test]
    fn empty_selection_has_no_selected_outline() {
        let hovering_only = plan(&[], Some(7));
        assert_eq!(hovering_only.selected, None);
        assert_eq!(hovering_only.style(OutlineRole::Hovering), Some(HOVER));

        assert!(plan(&[], None).is_empty());
    }

    #[test]
    fn missing_style_disables_role() {
        let selected = BTreeSet::from([1]);
        assert_eq!(OutlinePlan::selected_style(&selected, None), None);
        assert_eq!(OutlinePlan::hovering_style(&selected, Some(2), None), None);
    }

    #[test]
    fn push_constant_is_24_bytes() {
        assert_eq!(size_of::<OutlinePushConstant>(), 24);
    }
}
