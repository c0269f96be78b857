use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::bundle::{CacheKey, TimestepBundle, TimestepCells};
use crate::cache::memo::FieldMemo;
use crate::cache::storage::BundleStorage;
use crate::cache::timesteps::{TimestepSeries, load_all_timesteps};
use crate::config::DatasetSpec;
use crate::error::PipelineResult;
use crate::grid::{GeometryResolver, GridGeometry, reduce};
use crate::mesh::InjectorGeometry;
use crate::utils::parser_registry::ParserRegistry;

/// 按 (数据集, 阈值) 缓存的时间步数据包
///
/// 命中时直接返回已持久化的数据包；未命中时解析全部时间步、
/// 过滤活跃单元并整体写入存储。并发构建互不等待，后写入者覆盖。
pub struct TimestepCache {
    storage: Box<dyn BundleStorage>,
    parsers: Arc<ParserRegistry>,
    resolver: Arc<GeometryResolver>,
    memo: FieldMemo,
}

impl TimestepCache {
    pub fn new(
        storage: Box<dyn BundleStorage>,
        parsers: Arc<ParserRegistry>,
        resolver: Arc<GeometryResolver>,
    ) -> Self {
        TimestepCache {
            storage,
            parsers,
            resolver,
            memo: FieldMemo::new(),
        }
    }

    pub fn storage_name(&self) -> &'static str {
        self.storage.name()
    }

    pub fn get_bundle(&self, dataset: &DatasetSpec, threshold: f64) -> PipelineResult<TimestepBundle> {
        let key = CacheKey::new(&dataset.id, &dataset.cache_prefix, threshold);
        if let Some(bundle) = self.storage.load(&key)? {
            tracing::debug!("[缓存] 命中 {} {}", dataset.id, key.file_name());
            return Ok(bundle);
        }

        let bundle = self.build_bundle(dataset, &key)?;
        self.storage.store(&key, &bundle)?;
        Ok(bundle)
    }

    fn build_bundle(&self, dataset: &DatasetSpec, key: &CacheKey) -> PipelineResult<TimestepBundle> {
        let start = Instant::now();
        let series = load_all_timesteps(dataset, &self.parsers, &self.memo)?;
        let geometry = self.resolve_geometry(dataset, &series);
        let threshold = key.threshold();

        let mut data = BTreeMap::new();
        for (&timestep, source) in &series.sources {
            let cells = reduce(&source.field, &geometry, threshold);
            data.insert(timestep, TimestepCells::new(cells));
        }

        let bundle = TimestepBundle {
            threshold,
            timesteps: series.timesteps(),
            data,
            injectors: InjectorGeometry::from_config(&dataset.injectors),
            grid: geometry.cell_size,
            bounds: geometry.bounds,
        };
        tracing::info!(
            "[缓存] 构建 {} 阈值 {:.2}: {} 个时间步, 网格 {:?}, 耗时 {:.2} ms",
            dataset.id,
            threshold,
            bundle.timesteps.len(),
            geometry.shape(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(bundle)
    }

    /// 整个数据集共用第一个时间步推断出的网格
    pub fn resolve_geometry(&self, dataset: &DatasetSpec, series: &TimestepSeries) -> GridGeometry {
        match series.first() {
            Some(first) => self.resolver.resolve(
                &dataset.id,
                first.field.len(),
                first.dimensions,
                first.coordinates.clone(),
            ),
            None => self.resolver.resolve(&dataset.id, 0, None, None),
        }
    }
}
