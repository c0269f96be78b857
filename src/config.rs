use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::grid::{Bounds, CellSpacing, DEFAULT_BOUNDS, GeometryPreset, GeometryResolver};
use crate::mesh::InjectorConfig;
use crate::playback::OnComplete;

pub const DEFAULT_THRESHOLD: f64 = 0.10;
pub const MIN_Z_SCALE: u32 = 1;
pub const MAX_Z_SCALE: u32 = 20;

/// 服务启动参数
#[derive(Parser, Debug, Clone)]
#[command(name = "co2-voxel-backend")]
#[command(about = "CO2 封存模拟体素数据服务", long_about = None)]
pub struct ServerConfig {
    /// 监听地址
    #[arg(long, env = "CO2_BIND", default_value = "127.0.0.1")]
    pub bind: String,
    /// 监听端口
    #[arg(long, env = "CO2_PORT", default_value_t = 8080)]
    pub port: u16,
    /// 资源目录，数据集的 source_dir 相对于此目录
    #[arg(long, env = "CO2_RESOURCE_DIR", default_value = "test/resource")]
    pub resource_dir: PathBuf,
    /// 按阈值缓存的数据包目录
    #[arg(long, env = "CO2_CACHE_DIR", default_value = "cache")]
    pub cache_dir: PathBuf,
    /// 数据集注册表 (YAML)，缺省时使用内置的 sleipner/geosx 数据集
    #[arg(long, env = "CO2_REGISTRY")]
    pub registry: Option<PathBuf>,
    /// 默认阈值，限制在 [0, 1]
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub default_threshold: f64,
    /// 播放到最后一帧时的行为
    #[arg(long, value_enum, default_value_t = OnComplete::Stop)]
    pub on_complete: OnComplete,
    /// 自动播放的帧间隔（毫秒）
    #[arg(long, default_value_t = 300)]
    pub frame_period_ms: u64,
    /// 播放会话过期时间（秒）
    #[arg(long, default_value_t = 30 * 60)]
    pub session_ttl_secs: u64,
    /// 未登记几何的数据集使用的单元尺寸除数
    #[arg(long, value_enum, default_value_t = CellSpacing::Cells)]
    pub cell_spacing: CellSpacing,
}

impl ServerConfig {
    pub fn default_threshold(&self) -> f64 {
        clamp_threshold(self.default_threshold)
    }

    pub fn load_registry(&self) -> PipelineResult<DatasetRegistry> {
        let registry = match &self.registry {
            Some(path) => DatasetRegistry::from_yaml_file(path)?,
            None => DatasetRegistry::builtin(),
        };
        Ok(registry.rooted_at(&self.resource_dir))
    }
}

/// 阈值限制在 [0, 1]，非有限值按 0 处理
pub fn clamp_threshold(threshold: f64) -> f64 {
    if threshold.is_finite() {
        threshold.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn clamp_z_scale(z_scale: i64) -> u32 {
    z_scale.clamp(MIN_Z_SCALE as i64, MAX_Z_SCALE as i64) as u32
}

/// 单个数据集的描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub id: String,
    /// 时间步文件所在目录
    pub source_dir: PathBuf,
    /// 时间步文件名前缀，例如 "YMFS_ts_"
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_property")]
    pub property: String,
    /// 缓存文件名前缀，例如 "geosx_" -> geosx_data_thr0.10.json
    #[serde(default)]
    pub cache_prefix: String,
    #[serde(default)]
    pub geometry: Option<GeometryPreset>,
    #[serde(default)]
    pub injectors: InjectorConfig,
}

fn default_file_prefix() -> String {
    "YMFS_ts_".to_string()
}

fn default_property() -> String {
    "YMFS".to_string()
}

impl DatasetSpec {
    pub fn new(id: impl Into<String>, source_dir: impl Into<PathBuf>) -> Self {
        DatasetSpec {
            id: id.into(),
            source_dir: source_dir.into(),
            file_prefix: default_file_prefix(),
            property: default_property(),
            cache_prefix: String::new(),
            geometry: None,
            injectors: InjectorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetRegistry {
    pub datasets: Vec<DatasetSpec>,
}

impl DatasetRegistry {
    /// 内置数据集：ResInsight 导出的 GRDECL 时间步与 GEOSX 的 VTK 时间步
    pub fn builtin() -> Self {
        let sleipner = DatasetSpec {
            geometry: Some(GeometryPreset {
                shape: [100, 100, 10],
                bounds: DEFAULT_BOUNDS,
                spacing: CellSpacing::Cells,
            }),
            ..DatasetSpec::new("sleipner", "timesteps_export")
        };
        let geosx = DatasetSpec {
            file_prefix: "ymfs_ts_".to_string(),
            cache_prefix: "geosx_".to_string(),
            geometry: Some(GeometryPreset {
                shape: [64, 28, 25],
                bounds: Bounds {
                    x: [0.0, 6000.0],
                    y: [0.0, 2800.0],
                    z: [2640.0, 2860.0],
                },
                spacing: CellSpacing::Cells,
            }),
            ..DatasetSpec::new("geosx", "geosx/timesteps_vtk")
        };
        DatasetRegistry {
            datasets: vec![sleipner, geosx],
        }
    }

    pub fn from_yaml_str(text: &str) -> PipelineResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: &Path) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// 相对路径的 source_dir 拼接到资源目录下
    pub fn rooted_at(mut self, resource_dir: &Path) -> Self {
        for dataset in &mut self.datasets {
            if dataset.source_dir.is_relative() {
                dataset.source_dir = resource_dir.join(&dataset.source_dir);
            }
        }
        self
    }

    pub fn get(&self, id: &str) -> PipelineResult<&DatasetSpec> {
        self.datasets
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| PipelineError::UnknownDataset { id: id.to_string() })
    }

    pub fn ids(&self) -> Vec<String> {
        self.datasets.iter().map(|d| d.id.clone()).collect()
    }

    /// 将登记的几何预设写入解析器
    pub fn geometry_resolver(&self, spacing: CellSpacing) -> GeometryResolver {
        let mut resolver = GeometryResolver::new().with_default_spacing(spacing);
        for dataset in &self.datasets {
            if let Some(preset) = dataset.geometry {
                resolver.register(dataset.id.clone(), preset);
            }
        }
        resolver
    }
}
