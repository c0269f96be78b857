use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 物理包围盒，每个轴为 [min, max]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: [f64; 2],
    pub y: [f64; 2],
    pub z: [f64; 2],
}

impl Bounds {
    fn axis(&self, axis: usize) -> [f64; 2] {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    fn set_axis(&mut self, axis: usize, range: [f64; 2]) {
        match axis {
            0 => self.x = range,
            1 => self.y = range,
            _ => self.z = range,
        }
    }
}

/// 默认包围盒：X/Y 为 10 km，Z 为 -2700 到 -2500 m
pub const DEFAULT_BOUNDS: Bounds = Bounds {
    x: [0.0, 10000.0],
    y: [0.0, 10000.0],
    z: [-2700.0, -2500.0],
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSize {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl CellSize {
    fn axis(&self, axis: usize) -> f64 {
        match axis {
            0 => self.dx,
            1 => self.dy,
            _ => self.dz,
        }
    }

    fn set_axis(&mut self, axis: usize, value: f64) {
        match axis {
            0 => self.dx = value,
            1 => self.dy = value,
            _ => self.dz = value,
        }
    }
}

/// 单元尺寸除数
/// - `Cells`: 包围盒按单元划分，d = (max - min) / n
/// - `Points`: 包围盒两端都是采样点，d = (max - min) / (n - 1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CellSpacing {
    #[default]
    Cells,
    Points,
}

impl CellSpacing {
    pub fn cell_size(self, range: [f64; 2], n: usize) -> f64 {
        let extent = range[1] - range[0];
        match self {
            CellSpacing::Cells => extent / n.max(1) as f64,
            CellSpacing::Points if n > 1 => extent / (n - 1) as f64,
            CellSpacing::Points => extent,
        }
    }
}

/// 外部数据源提供的真实单元坐标，每个轴可选
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealCoordinates {
    pub x: Option<Vec<f64>>,
    pub y: Option<Vec<f64>>,
    pub z: Option<Vec<f64>>,
}

impl RealCoordinates {
    pub fn full(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        RealCoordinates {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    pub fn axis(&self, axis: usize) -> Option<&[f64]> {
        match axis {
            0 => self.x.as_deref(),
            1 => self.y.as_deref(),
            _ => self.z.as_deref(),
        }
    }

    /// 所有提供的轴长度都等于 `total`，且至少提供了一个轴
    pub fn matches(&self, total: usize) -> bool {
        let provided: Vec<&[f64]> = (0..3).filter_map(|a| self.axis(a)).collect();
        !provided.is_empty() && provided.iter().all(|v| v.len() == total)
    }
}

/// 结构网格几何信息，每个数据集计算一次，所有时间步共享
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub bounds: Bounds,
    pub cell_size: CellSize,
    pub spacing: CellSpacing,
    /// 真实坐标（覆盖按包围盒推算的坐标）
    pub coordinates: Option<Arc<RealCoordinates>>,
}

impl GridGeometry {
    pub fn from_bounds(shape: [usize; 3], bounds: Bounds, spacing: CellSpacing) -> Self {
        let [nx, ny, nz] = shape.map(|n| n.max(1));
        let cell_size = CellSize {
            dx: spacing.cell_size(bounds.x, nx),
            dy: spacing.cell_size(bounds.y, ny),
            dz: spacing.cell_size(bounds.z, nz),
        };
        GridGeometry {
            nx,
            ny,
            nz,
            bounds,
            cell_size,
            spacing,
            coordinates: None,
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    pub fn total_cells(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// 线性索引 -> (i, j, k)
    pub fn decode(&self, idx: usize) -> (usize, usize, usize) {
        (idx % self.nx, (idx / self.nx) % self.ny, idx / (self.nx * self.ny))
    }

    /// 单元最小角点坐标：真实坐标优先，否则按包围盒推算
    pub fn cell_origin(&self, idx: usize) -> [f64; 3] {
        let (i, j, k) = self.decode(idx);
        let synthetic = [
            self.bounds.x[0] + i as f64 * self.cell_size.dx,
            self.bounds.y[0] + j as f64 * self.cell_size.dy,
            self.bounds.z[0] + k as f64 * self.cell_size.dz,
        ];
        match &self.coordinates {
            None => synthetic,
            Some(real) => [0, 1, 2].map(|axis| {
                real.axis(axis)
                    .map(|values| values[idx])
                    .unwrap_or(synthetic[axis])
            }),
        }
    }

    /// 应用真实坐标
    ///
    /// 提供的每个轴都必须与单元数一致，否则整体丢弃；真实坐标覆盖对应轴的
    /// 包围盒和单元尺寸。数据源未提供 Z 时才会出现真实 X/Y 与推算 Z 的组合。
    pub fn with_real_coordinates(mut self, real: RealCoordinates) -> Self {
        let total = self.total_cells();
        if !real.matches(total) {
            tracing::warn!(
                "[几何] 真实坐标长度与单元数 {} 不一致 (x={:?}, y={:?}, z={:?})，忽略真实坐标",
                total,
                real.x.as_ref().map(Vec::len),
                real.y.as_ref().map(Vec::len),
                real.z.as_ref().map(Vec::len)
            );
            return self;
        }

        let shape = self.shape();
        for axis in 0..3 {
            let Some(values) = real.axis(axis) else {
                continue;
            };
            let Some((lo, hi)) = finite_range(values) else {
                continue;
            };
            let n = shape[axis];
            let step = if n > 1 {
                (hi - lo) / (n - 1) as f64
            } else {
                self.cell_size.axis(axis)
            };
            let range = match self.spacing {
                CellSpacing::Cells => [lo, hi + step],
                CellSpacing::Points => [lo, hi],
            };
            self.bounds.set_axis(axis, range);
            self.cell_size.set_axis(axis, step);
        }

        if real.z.is_none() {
            tracing::debug!("[几何] 数据源未提供 Z 坐标，Z 轴使用推算值");
        }
        tracing::debug!(
            "[几何] 使用真实坐标: X {:?}, Y {:?}, Z {:?}",
            self.bounds.axis(0),
            self.bounds.axis(1),
            self.bounds.axis(2)
        );
        self.coordinates = Some(Arc::new(real));
        self
    }
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied().filter(|v| v.is_finite());
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

/// 已知数据集的几何预设
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryPreset {
    pub shape: [usize; 3],
    pub bounds: Bounds,
    #[serde(default)]
    pub spacing: CellSpacing,
}

impl GeometryPreset {
    pub fn total_cells(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn geometry(&self) -> GridGeometry {
        GridGeometry::from_bounds(self.shape, self.bounds, self.spacing)
    }
}

fn index_bounds(shape: [usize; 3]) -> Bounds {
    Bounds {
        x: [0.0, shape[0] as f64],
        y: [0.0, shape[1] as f64],
        z: [0.0, shape[2] as f64],
    }
}

/// 内置预设：未在注册表中登记的数据集按总单元数匹配
pub fn builtin_presets() -> Vec<(String, GeometryPreset)> {
    vec![
        (
            "sleipner".to_string(),
            GeometryPreset {
                shape: [100, 100, 10],
                bounds: DEFAULT_BOUNDS,
                spacing: CellSpacing::Cells,
            },
        ),
        (
            "geosx".to_string(),
            GeometryPreset {
                shape: [64, 28, 25],
                bounds: Bounds {
                    x: [0.0, 6000.0],
                    y: [0.0, 2800.0],
                    z: [2640.0, 2860.0],
                },
                spacing: CellSpacing::Cells,
            },
        ),
        (
            "grid_110x63x65".to_string(),
            GeometryPreset {
                shape: [110, 63, 65],
                bounds: index_bounds([110, 63, 65]),
                spacing: CellSpacing::Cells,
            },
        ),
        (
            "grid_263x118x64".to_string(),
            GeometryPreset {
                shape: [263, 118, 64],
                bounds: index_bounds([263, 118, 64]),
                spacing: CellSpacing::Cells,
            },
        ),
    ]
}

/// 几何解析器
///
/// 解析顺序：
/// 1. 调用方登记的 `数据集 -> 预设`
/// 2. 数据源声明的维度（如 VTK 的 DIMENSIONS）
/// 3. 按总单元数唯一匹配的内置预设
/// 4. 启发式分解 nx = ny = 100
///
/// 最后由真实坐标覆盖推算坐标。
pub struct GeometryResolver {
    registry: HashMap<String, GeometryPreset>,
    fallback: Vec<(String, GeometryPreset)>,
    default_spacing: CellSpacing,
}

impl GeometryResolver {
    pub fn new() -> Self {
        GeometryResolver {
            registry: HashMap::new(),
            fallback: builtin_presets(),
            default_spacing: CellSpacing::Cells,
        }
    }

    pub fn with_default_spacing(mut self, spacing: CellSpacing) -> Self {
        self.default_spacing = spacing;
        self
    }

    pub fn register(&mut self, dataset_id: impl Into<String>, preset: GeometryPreset) {
        self.registry.insert(dataset_id.into(), preset);
    }

    pub fn preset_for(&self, dataset_id: &str) -> Option<&GeometryPreset> {
        self.registry.get(dataset_id)
    }

    pub fn resolve(
        &self,
        dataset_id: &str,
        total_cells: usize,
        declared_dimensions: Option<[usize; 3]>,
        real: Option<RealCoordinates>,
    ) -> GridGeometry {
        let geometry = if let Some(preset) = self.registry.get(dataset_id) {
            preset.geometry()
        } else if let Some(shape) = declared_dimensions {
            GridGeometry::from_bounds(shape, DEFAULT_BOUNDS, self.default_spacing)
        } else if let Some(preset) = self.match_by_cell_count(total_cells) {
            preset.geometry()
        } else {
            self.heuristic(total_cells)
        };

        match real {
            Some(real) => geometry.with_real_coordinates(real),
            None => geometry,
        }
    }

    /// 总单元数恰好匹配一个内置预设时返回该预设
    fn match_by_cell_count(&self, total_cells: usize) -> Option<&GeometryPreset> {
        let mut matches = self
            .fallback
            .iter()
            .filter(|(_, preset)| preset.total_cells() == total_cells);
        let (name, preset) = matches.next()?;
        if matches.next().is_some() {
            tracing::warn!("[几何] 单元数 {} 匹配多个内置预设，改用启发式分解", total_cells);
            return None;
        }
        tracing::debug!("[几何] 单元数 {} 匹配内置预设 {}", total_cells, name);
        Some(preset)
    }

    fn heuristic(&self, total_cells: usize) -> GridGeometry {
        let (nx, ny) = (100, 100);
        let nz = (total_cells / (nx * ny)).max(1);
        tracing::warn!(
            "[几何] 单元数 {} 没有匹配的预设，使用启发式维度 {}x{}x{}",
            total_cells,
            nx,
            ny,
            nz
        );
        GridGeometry::from_bounds([nx, ny, nz], DEFAULT_BOUNDS, self.default_spacing)
    }
}

impl Default for GeometryResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_and_point_divisors_differ() {
        let cells = GridGeometry::from_bounds([100, 100, 10], DEFAULT_BOUNDS, CellSpacing::Cells);
        assert_eq!(cells.cell_size.dx, 100.0);
        assert_eq!(cells.cell_size.dz, 20.0);

        let points = GridGeometry::from_bounds([100, 100, 10], DEFAULT_BOUNDS, CellSpacing::Points);
        assert!((points.cell_size.dx - 10000.0 / 99.0).abs() < 1e-9);
        assert!((points.cell_size.dz - 200.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn registry_entry_wins_over_cell_count() {
        let mut resolver = GeometryResolver::new();
        let preset = GeometryPreset {
            shape: [50, 200, 10],
            bounds: DEFAULT_BOUNDS,
            spacing: CellSpacing::Cells,
        };
        resolver.register("custom", preset);
        let geometry = resolver.resolve("custom", 100_000, None, None);
        assert_eq!(geometry.shape(), [50, 200, 10]);

        let by_count = resolver.resolve("unregistered", 100_000, None, None);
        assert_eq!(by_count.shape(), [100, 100, 10]);
    }

    #[test]
    fn builtin_geosx_matched_by_count() {
        let geometry = GeometryResolver::new().resolve("anything", 64 * 28 * 25, None, None);
        assert_eq!(geometry.shape(), [64, 28, 25]);
        assert_eq!(geometry.bounds.z, [2640.0, 2860.0]);
    }

    #[test]
    fn unknown_count_uses_heuristic() {
        let geometry = GeometryResolver::new().resolve("x", 30_000, None, None);
        assert_eq!(geometry.shape(), [100, 100, 3]);

        let tiny = GeometryResolver::new().resolve("x", 7, None, None);
        assert_eq!(tiny.shape(), [100, 100, 1]);
    }

    #[test]
    fn declared_dimensions_beat_heuristic() {
        let geometry = GeometryResolver::new().resolve("x", 24, Some([4, 3, 2]), None);
        assert_eq!(geometry.shape(), [4, 3, 2]);
    }

    #[test]
    fn real_z_overrides_preset_z() {
        let base = GridGeometry::from_bounds([2, 1, 2], DEFAULT_BOUNDS, CellSpacing::Cells);
        let real = RealCoordinates {
            x: None,
            y: None,
            z: Some(vec![-3000.0, -3000.0, -2900.0, -2900.0]),
        };
        let geometry = base.with_real_coordinates(real);
        assert_eq!(geometry.bounds.z, [-3000.0, -2800.0]);
        assert_eq!(geometry.cell_size.dz, 100.0);
        assert_eq!(geometry.bounds.x, DEFAULT_BOUNDS.x);
        assert_eq!(geometry.cell_origin(3), [5000.0, 0.0, -2900.0]);
    }

    #[test]
    fn mismatched_real_coordinates_are_ignored() {
        let base = GridGeometry::from_bounds([2, 2, 2], DEFAULT_BOUNDS, CellSpacing::Cells);
        let real = RealCoordinates::full(vec![0.0; 8], vec![0.0; 8], vec![1.0; 5]);
        let geometry = base.clone().with_real_coordinates(real);
        assert_eq!(geometry, base);
        assert!(geometry.coordinates.is_none());
    }
}
