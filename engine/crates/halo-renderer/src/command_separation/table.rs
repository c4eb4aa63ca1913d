use std::collections::{BTreeMap, BTreeSet};

use crate::{
    command_separation::{
        criteria::{AlphaMode, SeparationKey},
        indirect_commands::{DrawCommands, IndirectDrawBuffer},
    },
    frustum::Frustum,
    scene::{Scene, SceneId},
};

/// 按 key 分组，组内保持遍历顺序
///
/// 每个 primitive 恰好出现在一个组中，重复出现的 primitive 只保留第一次
pub fn separate_primitives(
    ordinals: impl IntoIterator<Item = u32>,
    key_of: impl Fn(u32) -> SeparationKey,
) -> BTreeMap<SeparationKey, Vec<u32>> {
    let mut visited = BTreeSet::new();
    let mut groups: BTreeMap<SeparationKey, Vec<u32>> = BTreeMap::new();
    for ordinal in ordinals {
        if visited.insert(ordinal) {
            groups.entry(key_of(ordinal)).or_default().push(ordinal);
        }
    }
    groups
}

/// 按 node index 从小到大展开 primitive，越界的 node index 会被忽略
pub fn traverse_primitives<'a>(
    scene: &'a Scene,
    node_indices: &'a BTreeSet<u32>,
) -> impl Iterator<Item = u32> + 'a {
    node_indices
        .iter()
        .filter_map(|&node| scene.nodes().get(node as usize))
        .flat_map(|node| node.primitives.iter().copied())
}

/// 分组缓存的 key：场景以及 node 集合，与 node 的传入顺序以及重复无关
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawGroupKey {
    pub scene: SceneId,
    pub node_indices: BTreeSet<u32>,
}

/// 一个 node 集合对应的全部 indirect draw buffer
pub struct IndirectDrawCommandGroup {
    buffers: BTreeMap<SeparationKey, IndirectDrawBuffer>,
}
impl IndirectDrawCommandGroup {
    pub fn new(scene: &Scene, node_indices: &BTreeSet<u32>, debug_name: &str) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("IndirectDrawCommandGroup::new");

        let separated = separate_primitives(traverse_primitives(scene, node_indices), |ordinal| {
            scene.separation_key(ordinal)
        });

        let mut buffers = BTreeMap::new();
        for (idx, (key, ordinals)) in separated.into_iter().enumerate() {
            let commands = DrawCommands::from_primitives(key.index_type.is_some(), &ordinals, scene.primitives());
            let buffer = IndirectDrawBuffer::new(commands, &format!("{debug_name}-indirect-{idx}"))?;
            buffers.insert(key, buffer);
        }
        log::debug!("{debug_name}: {} nodes separated into {} groups", node_indices.len(), buffers.len());

        Ok(Self { buffers })
    }

    /// 顺序：opaque、blend、mask
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&SeparationKey, &IndirectDrawBuffer)> {
        self.buffers.iter()
    }

    #[inline]
    pub fn with_alpha_mode(&self, alpha_mode: AlphaMode) -> impl Iterator<Item = (&SeparationKey, &IndirectDrawBuffer)> {
        self.buffers.iter().filter(move |(key, _)| key.alpha_mode == alpha_mode)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// frustum 为 None 时恢复为绘制全部
    pub fn cull(&mut self, scene: &Scene, frustum: Option<&Frustum>) -> anyhow::Result<()> {
        for buffer in self.buffers.values_mut() {
            match frustum {
                Some(frustum) => buffer.cull(|ordinal| frustum.intersects_sphere(&scene.world_bounds(ordinal)))?,
                None => buffer.reset_draw_count(),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_separation::{criteria::IndexType, memo};

    fn key(alpha_mode: AlphaMode, double_sided: bool, index_type: Option<IndexType>) -> SeparationKey {
        SeparationKey {
            alpha_mode,
            faceted: false,
            double_sided,
            index_type,
        }
    }

    #[test]
    fn groups_are_ordered_opaque_blend_mask() {
        let keys = [
            key(AlphaMode::Mask, false, Some(IndexType::U16)),
            key(AlphaMode::Opaque, true, Some(IndexType::U32)),
            key(AlphaMode::Blend, false, None),
            key(AlphaMode::Opaque, false, Some(IndexType::U16)),
            key(AlphaMode::Mask, false, Some(IndexType::U16)),
            key(AlphaMode::Opaque, true, Some(IndexType::U32)),
        ];
        let groups = separate_primitives(0..keys.len() as u32, |ordinal| keys[ordinal as usize]);

        let order = groups.keys().map(|k| k.alpha_mode).collect::<Vec<_>>();
        assert_eq!(order, vec![AlphaMode::Opaque, AlphaMode::Opaque, AlphaMode::Blend, AlphaMode::Mask]);

        // 同一个 key 的 primitive 连续，并保持遍历顺序
        let draws = groups.values().flatten().copied().collect::<Vec<_>>();
        assert_eq!(draws, vec![3, 1, 5, 2, 0, 4]);
    }

    #[test]
    fn every_primitive_in_exactly_one_group() {
        let keys = [
            key(AlphaMode::Opaque, false, None),
            key(AlphaMode::Blend, true, None),
            key(AlphaMode::Opaque, false, None),
        ];
        let groups = separate_primitives([2, 0, 1], |ordinal| keys[ordinal as usize]);
        let mut all = groups.values().flatten().copied().collect::<Vec<_>>();
        all.sort();
        assert_eq!(all, vec![0, 1, 2]);
        assert_eq!(groups[&keys[0]], vec![2, 0]);
    }

    #[test]
    fn repeated_primitive_drawn_once() {
        let keys = [key(AlphaMode::Opaque, false, None), key(AlphaMode::Mask, false, None)];
        let groups = separate_primitives([0, 1, 0, 0, 1], |ordinal| keys[ordinal as usize]);
        assert_eq!(groups[&keys[0]], vec![0]);
        assert_eq!(groups[&keys[1]], vec![1]);
    }

    #[test]
    fn node_order_and_repeats_share_one_memo_entry() {
        let scene = SceneId::next();
        let key_of = |nodes: &[u32]| DrawGroupKey {
            scene,
            node_indices: nodes.iter().copied().collect(),
        };
        assert_eq!(key_of(&[1, 2]), key_of(&[2, 1, 2]));

        let mut slot = None;
        let mut builds = 0;
        let mut build = |_: &DrawGroupKey| -> anyhow::Result<()> {
            builds += 1;
            Ok(())
        };
        assert!(memo::refresh(&mut slot, key_of(&[1, 2]), &mut build).unwrap());
        assert!(!memo::refresh(&mut slot, key_of(&[2, 1]), &mut build).unwrap());
        drop(build);
        assert_eq!(builds, 1);

        // 不同场景中相同的 node 集合需要重建
        let other = DrawGroupKey {
            scene: SceneId::next(),
            ..key_of(&[1, 2])
        };
        assert_ne!(other, key_of(&[1, 2]));
    }
}
