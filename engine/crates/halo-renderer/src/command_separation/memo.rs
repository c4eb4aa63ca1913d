/// 带 key 的缓存值，key 不变时跳过重建
pub struct Memoized<K, V> {
    key: K,
    value: V,
}
impl<K, V> Memoized<K, V> {
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }
}

/// key 与缓存中的相同时直接复用，否则调用 `build` 重建
///
/// 返回是否发生了重建
pub fn refresh<K: PartialEq, V>(
    slot: &mut Option<Memoized<K, V>>,
    key: K,
    build: impl FnOnce(&K) -> anyhow::Result<V>,
) -> anyhow::Result<bool> {
    if slot.as_ref().is_some_and(|m| m.key == key) {
        return Ok(false);
    }
    let value = build(&key)?;
    *slot = Some(Memoized { key, value });
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_key_skips_rebuild() {
        let mut slot: Option<Memoized<Vec<u32>, usize>> = None;
        let mut rebuild_count = 0;
        let mut build = |key: &Vec<u32>| -> anyhow::Result<usize> {
            rebuild_count += 1;
            Ok(key.len())
        };

        assert!(refresh(&mut slot, vec![1, 2, 3], &mut build).unwrap());
        // 不同的实例，相同的值
        assert!(!refresh(&mut slot, vec![1, 2, 3], &mut build).unwrap());
        assert!(refresh(&mut slot, vec![4], &mut build).unwrap());
        assert!(!refresh(&mut slot, vec![4], &mut build).unwrap());
        drop(build);

        assert_eq!(rebuild_count, 2);
        assert_eq!(*slot.unwrap().value(), 1);
    }

    #[test]
    fn failed_build_keeps_previous_value() {
        let mut slot = None;
        refresh(&mut slot, 1, |_| Ok("one")).unwrap();
        assert!(refresh(&mut slot, 2, |_| anyhow::bail!("out of memory")).is_err());
        let memo = slot.unwrap();
        assert_eq!((*memo.key(), *memo.value()), (1, "one"));
    }
}
