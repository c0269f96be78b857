use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::memo::FieldMemo;
use crate::config::DatasetSpec;
use crate::error::PipelineResult;
use crate::utils::parser::ParsedSource;
use crate::utils::parser_registry::ParserRegistry;

/// 一个数据集全部时间步的解析结果
#[derive(Debug, Default)]
pub struct TimestepSeries {
    pub sources: BTreeMap<u32, Arc<ParsedSource>>,
}

impl TimestepSeries {
    /// 升序的时间步编号
    pub fn timesteps(&self) -> Vec<u32> {
        self.sources.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// 第一个时间步，用于推断整个数据集的网格
    pub fn first(&self) -> Option<&Arc<ParsedSource>> {
        self.sources.values().next()
    }
}

/// 从文件名中提取时间步编号：`ts_` 之后的连续数字
///
/// `YMFS_ts_12.GRDECL` -> 12
pub fn timestep_id(file_name: &str) -> Option<u32> {
    let lower = file_name.to_ascii_lowercase();
    let start = lower.find("ts_")? + 3;
    let digits: String = lower[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// 列出目录下符合前缀且有对应解析器的时间步文件，按编号升序
///
/// 目录不存在时返回空列表。
pub fn discover_timestep_files(
    dir: &Path,
    file_prefix: &str,
    parsers: &ParserRegistry,
) -> PipelineResult<Vec<(u32, PathBuf)>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("[时间步] 目录不存在: {}", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let prefix = file_prefix.to_ascii_lowercase();
    let mut found: BTreeMap<u32, PathBuf> = BTreeMap::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || parsers.find_parser_for_file(&path).is_none() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.to_ascii_lowercase().starts_with(&prefix) {
            continue;
        }
        let Some(id) = timestep_id(name) else {
            tracing::debug!("[时间步] 文件名中没有时间步编号: {}", name);
            continue;
        };
        if let Some(previous) = found.insert(id, path.clone()) {
            tracing::warn!(
                "[时间步] 时间步 {} 有多个文件，使用 {} 替换 {}",
                id,
                path.display(),
                previous.display()
            );
        }
    }
    Ok(found.into_iter().collect())
}

/// 解析数据集的全部时间步
pub fn load_all_timesteps(
    dataset: &DatasetSpec,
    parsers: &ParserRegistry,
    memo: &FieldMemo,
) -> PipelineResult<TimestepSeries> {
    let files = discover_timestep_files(&dataset.source_dir, &dataset.file_prefix, parsers)?;
    let mut series = TimestepSeries::default();
    for (id, path) in files {
        let parsed = memo.get_or_parse(&path, &dataset.property, parsers)?;
        series.sources.insert(id, parsed);
    }
    tracing::info!(
        "[时间步] 数据集 {} 加载 {} 个时间步",
        dataset.id,
        series.sources.len()
    );
    Ok(series)
}
