use std::cmp::Ordering;

use super::{AspectQuantity, AspectRegistry};

/// 报告用的确定性排序，与插入顺序无关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayOrder {
    #[default]
    ByName,
    ByTag,
    /// 数量降序，同量按名称
    ByAmount,
}

impl DisplayOrder {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "name" => Some(Self::ByName),
            "tag" => Some(Self::ByTag),
            "amount" | "count" => Some(Self::ByAmount),
            _ => None,
        }
    }

    pub fn compare(
        self,
        registry: &AspectRegistry,
        a: &AspectQuantity,
        b: &AspectQuantity,
    ) -> Ordering {
        let by_name = || label(registry, a, |d| &d.name).cmp(&label(registry, b, |d| &d.name));
        let primary = match self {
            Self::ByName => by_name(),
            Self::ByTag => label(registry, a, |d| &d.tag).cmp(&label(registry, b, |d| &d.tag)),
            Self::ByAmount => b.amount.cmp(&a.amount).then_with(by_name),
        };
        // 下标兜底，保证全序
        primary.then_with(|| a.kind.cmp(&b.kind))
    }
}

/// 未注册的种类排在最后
fn label<F>(registry: &AspectRegistry, q: &AspectQuantity, pick: F) -> (bool, String)
where
    F: Fn(&super::AspectDef) -> &String,
{
    match registry.get(q.kind) {
        Ok(d) => (false, pick(d).to_lowercase()),
        Err(_) => (true, String::new()),
    }
}
