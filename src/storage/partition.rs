use std::collections::BTreeSet;

use crate::aspect::AspectKind;

/// 分区白名单；为空时不限制
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionFilter {
    kinds: BTreeSet<AspectKind>,
}

impl PartitionFilter {
    pub fn new<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = AspectKind>,
    {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn permits(&self, kind: AspectKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    /// 替换白名单。已存的库存不受影响，只拦截之后的放入。
    pub fn set_whitelist<I>(&mut self, kinds: I)
    where
        I: IntoIterator<Item = AspectKind>,
    {
        self.kinds = kinds.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.kinds.clear();
    }

    pub fn is_active(&self) -> bool {
        !self.kinds.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = AspectKind> + '_ {
        self.kinds.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_permits_everything() {
        let filter = PartitionFilter::default();
        assert!(!filter.is_active());
        assert!(filter.permits(AspectKind::from_index(0)));
        assert!(filter.permits(AspectKind::from_index(1000)));
    }

    #[test]
    fn whitelist_replaces_previous_set() {
        let a = AspectKind::from_index(0);
        let b = AspectKind::from_index(1);
        let mut filter = PartitionFilter::new([a]);
        assert!(filter.permits(a));
        assert!(!filter.permits(b));

        filter.set_whitelist([b, b]);
        assert!(!filter.permits(a));
        assert!(filter.permits(b));
        assert_eq!(filter.kinds().count(), 1);

        filter.clear();
        assert!(filter.permits(a));
    }
}
