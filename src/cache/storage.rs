use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::cache::bundle::{CacheKey, TimestepBundle};
use crate::error::PipelineResult;

/// 数据包的持久化后端
pub trait BundleStorage: Send + Sync {
    /// 读取已有数据包，不存在时返回 `Ok(None)`
    fn load(&self, key: &CacheKey) -> PipelineResult<Option<TimestepBundle>>;

    /// 整体写入，覆盖同一个键下的旧数据
    fn store(&self, key: &CacheKey, bundle: &TimestepBundle) -> PipelineResult<()>;

    fn name(&self) -> &'static str;
}

/// 进程内存储，主要用于测试和临时会话
#[derive(Default)]
pub struct MemoryStorage {
    bundles: RwLock<HashMap<CacheKey, TimestepBundle>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bundles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.read().is_empty()
    }
}

impl BundleStorage for MemoryStorage {
    fn load(&self, key: &CacheKey) -> PipelineResult<Option<TimestepBundle>> {
        Ok(self.bundles.read().get(key).cloned())
    }

    fn store(&self, key: &CacheKey, bundle: &TimestepBundle) -> PipelineResult<()> {
        self.bundles.write().insert(key.clone(), bundle.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// 文件存储：每个数据集一个子目录，每个阈值一个 JSON 文件
///
/// 先写入同目录下的临时文件再 rename，读者不会看到写了一半的文件。
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStorage { root: root.into() }
    }

    pub fn dataset_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.dir_name())
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dataset_dir(key).join(key.file_name())
    }
}

impl BundleStorage for FileStorage {
    fn load(&self, key: &CacheKey) -> PipelineResult<Option<TimestepBundle>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let bundle = serde_json::from_slice(&bytes)?;
        tracing::debug!("[缓存] 读取 {}", path.display());
        Ok(Some(bundle))
    }

    fn store(&self, key: &CacheKey, bundle: &TimestepBundle) -> PipelineResult<()> {
        let dir = self.dataset_dir(key);
        fs::create_dir_all(&dir)?;
        let path = dir.join(key.file_name());
        let tmp = dir.join(format!(".{}.{}.tmp", key.file_name(), Uuid::new_v4()));
        let json = serde_json::to_vec(bundle)?;
        if let Err(e) = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        tracing::debug!("[缓存] 写入 {}", path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
