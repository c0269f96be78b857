use std::borrow::Cow;

/// 单个时间步的属性场
/// 每个网格单元一个标量值，按 C 语言顺序存储 (x变化最快，y其次，z最慢)
/// 索引计算: index = k * nx * ny + j * nx + i
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyField {
    /// 属性名称，例如 "YMFS"
    pub property: String,
    /// 数据数组，长度不一定等于 nx * ny * nz
    pub data: Vec<f64>,
}

impl PropertyField {
    pub fn new(property: impl Into<String>, data: Vec<f64>) -> Self {
        PropertyField {
            property: property.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 将数据长度调整为 `total`：不足补零，超出截断
    /// 长度正好匹配时不复制
    pub fn reconciled(&self, total: usize) -> Cow<'_, [f64]> {
        if self.data.len() == total {
            return Cow::Borrowed(&self.data);
        }

        if self.data.len() > total {
            tracing::debug!(
                "[属性场] {} 数据量 {} 超过网格单元数 {}，截断",
                self.property,
                self.data.len(),
                total
            );
            return Cow::Borrowed(&self.data[..total]);
        }

        tracing::debug!(
            "[属性场] {} 数据量 {} 少于网格单元数 {}，补零",
            self.property,
            self.data.len(),
            total
        );
        let mut padded = Vec::with_capacity(total);
        padded.extend_from_slice(&self.data);
        padded.resize(total, 0.0);
        Cow::Owned(padded)
    }

    /// 最小值与最大值，空场返回 None
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let mut iter = self.data.iter().copied().filter(|v| v.is_finite());
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}
