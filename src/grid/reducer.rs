use serde::{Deserialize, Serialize};

use crate::grid::geometry::GridGeometry;
use crate::utils::property_field::PropertyField;

/// 活跃单元：最小角点坐标与标量值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveCell {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub value: f64,
}

/// 按阈值筛选活跃单元
///
/// 属性场先补零或截断到 nx * ny * nz，再按线性索引升序遍历，
/// `value >= threshold` 的单元被保留（下界包含）。
pub fn reduce(field: &PropertyField, geometry: &GridGeometry, threshold: f64) -> Vec<ActiveCell> {
    let total = geometry.total_cells();
    let data = field.reconciled(total);

    data.iter()
        .enumerate()
        .filter(|(_, value)| **value >= threshold)
        .map(|(idx, &value)| {
            let [x, y, z] = geometry.cell_origin(idx);
            ActiveCell { x, y, z, value }
        })
        .collect()
}
