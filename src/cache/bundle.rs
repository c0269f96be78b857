use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grid::{ActiveCell, Bounds, CellSize};
use crate::mesh::InjectorGeometry;

/// 某个阈值下的缓存键
///
/// 阈值四舍五入到两位小数，0.101 与 0.1 共用同一份数据。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: String,
    pub prefix: String,
    centi: i64,
}

impl CacheKey {
    pub fn new(dataset: impl Into<String>, prefix: impl Into<String>, threshold: f64) -> Self {
        CacheKey {
            dataset: dataset.into(),
            prefix: prefix.into(),
            centi: (threshold * 100.0).round() as i64,
        }
    }

    /// 取整后的阈值
    pub fn threshold(&self) -> f64 {
        self.centi as f64 / 100.0
    }

    /// 例如 `data_thr0.10.json`、`geosx_data_thr0.25.json`
    pub fn file_name(&self) -> String {
        format!("{}data_thr{:.2}.json", self.prefix, self.threshold())
    }

    /// 数据集在缓存目录下的子目录名，只保留安全字符
    pub fn dir_name(&self) -> String {
        let name: String = self
            .dataset
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
                _ => '_',
            })
            .collect();
        if name.is_empty() || name.chars().all(|c| c == '.') {
            format!("_{}", name)
        } else {
            name
        }
    }
}

/// 单个时间步的活跃单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestepCells {
    pub cells: Vec<ActiveCell>,
    pub count: usize,
}

impl TimestepCells {
    pub fn new(cells: Vec<ActiveCell>) -> Self {
        let count = cells.len();
        TimestepCells { cells, count }
    }
}

/// 一个数据集在某个阈值下的全部时间步
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestepBundle {
    pub threshold: f64,
    /// 升序排列的时间步编号
    pub timesteps: Vec<u32>,
    pub data: BTreeMap<u32, TimestepCells>,
    pub injectors: InjectorGeometry,
    pub grid: CellSize,
    pub bounds: Bounds,
}

impl TimestepBundle {
    pub fn cells(&self, timestep: u32) -> Option<&TimestepCells> {
        self.data.get(&timestep)
    }

    pub fn is_empty(&self) -> bool {
        self.timesteps.is_empty()
    }

    /// 所有时间步中活跃单元的最大值，用于前端色标
    pub fn max_value(&self) -> Option<f64> {
        self.data
            .values()
            .flat_map(|ts| ts.cells.iter().map(|c| c.value))
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
    }
}
