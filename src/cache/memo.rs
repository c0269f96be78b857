//! 已解析属性场的进程内缓存，按文件内容标识去重。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::error::PipelineResult;
use crate::utils::parser::ParsedSource;
use crate::utils::parser_registry::ParserRegistry;

/// 由路径、属性名、修改时间和文件大小计算的内容键
pub fn content_key(path: &Path, property: &str) -> std::io::Result<String> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(property.as_bytes());
    hasher.update(modified.to_le_bytes());
    hasher.update(metadata.len().to_le_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// 每个 (文件, 属性) 只保留最新内容的解析结果
#[derive(Default)]
pub struct FieldMemo {
    entries: RwLock<HashMap<(PathBuf, String), (String, Arc<ParsedSource>)>>,
}

impl FieldMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// 文件未变化时直接返回上次的解析结果
    pub fn get_or_parse(
        &self,
        path: &Path,
        property: &str,
        parsers: &ParserRegistry,
    ) -> PipelineResult<Arc<ParsedSource>> {
        let hash = content_key(path, property)?;
        let slot = (path.to_path_buf(), property.to_string());
        if let Some((cached_hash, hit)) = self.entries.read().get(&slot) {
            if *cached_hash == hash {
                tracing::trace!("[解析缓存] 命中 {}", path.display());
                return Ok(hit.clone());
            }
        }

        let parsed = Arc::new(parsers.parse_file(path, property)?);
        // 文件改写后旧结果直接被替换
        self.entries.write().insert(slot, (hash, parsed.clone()));
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{}-{}", prefix, nanos));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn repeated_parse_hits_memo() {
        let dir = unique_temp_dir("co2-memo");
        let file = dir.join("YMFS_ts_1.GRDECL");
        std::fs::write(&file, "YMFS\n0.5 2*0.25 /\n").unwrap();

        let memo = FieldMemo::new();
        let registry = ParserRegistry::new();
        let first = memo.get_or_parse(&file, "YMFS", &registry).unwrap();
        let second = memo.get_or_parse(&file, "YMFS", &registry).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.field.data, vec![0.5, 0.25, 0.25]);
        assert_eq!(memo.len(), 1);

        // 内容变化（大小不同）后重新解析
        std::fs::write(&file, "YMFS\n0.5 3*0.25 0.125 /\n").unwrap();
        let third = memo.get_or_parse(&file, "YMFS", &registry).unwrap();
        assert_eq!(third.field.data.len(), 5);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(memo.len(), 1);

        let fourth = memo.get_or_parse(&file, "YMFS", &registry).unwrap();
        assert!(Arc::ptr_eq(&third, &fourth));
        assert_eq!(memo.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn key_depends_on_property() {
        let dir = unique_temp_dir("co2-memo-key");
        let file = dir.join("a.GRDECL");
        std::fs::write(&file, "YMFS\n1 /\n").unwrap();
        assert_ne!(
            content_key(&file, "YMFS").unwrap(),
            content_key(&file, "SGAS").unwrap()
        );
        assert!(content_key(&dir.join("missing.GRDECL"), "YMFS").is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
