use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{BundleStorage, FileStorage, TimestepBundle, TimestepCache};
use crate::config::{DatasetRegistry, ServerConfig, clamp_threshold};
use crate::error::PipelineResult;
use crate::playback::PlaybackOptions;
use crate::session::SessionStore;
use crate::utils::parser_registry::ParserRegistry;

/// 全局应用状态，在各个 handler 之间共享解析器、数据集注册表、缓存与播放会话
pub struct AppState {
    pub parser_registry: Arc<ParserRegistry>,
    pub datasets: Arc<DatasetRegistry>,
    pub cache: Arc<TimestepCache>,
    pub session_store: Arc<SessionStore>,
    pub playback: PlaybackOptions,
    pub default_threshold: f64,
    pub cache_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        datasets: DatasetRegistry,
        storage: Box<dyn BundleStorage>,
        config: &ServerConfig,
    ) -> Self {
        let parser_registry = Arc::new(ParserRegistry::new());
        let resolver = Arc::new(datasets.geometry_resolver(config.cell_spacing));
        let cache = TimestepCache::new(storage, parser_registry.clone(), resolver);
        AppState {
            parser_registry,
            datasets: Arc::new(datasets),
            cache: Arc::new(cache),
            session_store: Arc::new(SessionStore::with_ttl(Duration::from_secs(
                config.session_ttl_secs,
            ))),
            playback: PlaybackOptions {
                on_complete: config.on_complete,
                frame_period: Duration::from_millis(config.frame_period_ms),
            },
            default_threshold: config.default_threshold(),
            cache_dir: None,
        }
    }

    /// 按启动参数创建：文件存储 + 注册表
    pub fn from_config(config: &ServerConfig) -> PipelineResult<Self> {
        let datasets = config.load_registry()?;
        let storage = Box::new(FileStorage::new(&config.cache_dir));
        Ok(AppState {
            cache_dir: Some(config.cache_dir.clone()),
            ..Self::new(datasets, storage, config)
        })
    }

    /// 未给出阈值时使用默认阈值，结果限制在 [0, 1]
    pub fn threshold_or_default(&self, threshold: Option<f64>) -> f64 {
        clamp_threshold(threshold.unwrap_or(self.default_threshold))
    }

    pub fn load_bundle(&self, dataset_id: &str, threshold: Option<f64>) -> PipelineResult<TimestepBundle> {
        let dataset = self.datasets.get(dataset_id)?;
        self.cache
            .get_bundle(dataset, self.threshold_or_default(threshold))
    }
}
