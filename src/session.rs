use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::cache::TimestepBundle;
use crate::playback::PlaybackController;

/// 服务端持有的播放会话：一个控制器绑定一个数据包
pub struct PlaybackSession {
    pub dataset: String,
    pub bundle: Arc<TimestepBundle>,
    /// 每个会话独立加锁，指令按到达顺序串行执行
    pub controller: Mutex<PlaybackController>,
    /// 最近一次访问时间，用于 TTL 过期检查
    last_access: Mutex<Instant>,
}

impl PlaybackSession {
    pub fn new(
        dataset: impl Into<String>,
        bundle: Arc<TimestepBundle>,
        controller: PlaybackController,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            bundle,
            controller: Mutex::new(controller),
            last_access: Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_access.lock())
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<PlaybackSession>>>,
    /// 空闲超过该时长的会话会被清理
    ttl: Duration,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(30 * 60))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn insert(&self, session: PlaybackSession) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .insert(session_id.clone(), Arc::new(session));
        session_id
    }

    /// 获取会话并刷新访问时间
    pub fn get(&self, session_id: &str) -> Option<Arc<PlaybackSession>> {
        let session = self.sessions.read().get(session_id).cloned()?;
        session.touch();
        Some(session)
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<PlaybackSession>> {
        self.sessions.write().remove(session_id)
    }

    /// 清理过期的会话，返回清理数量
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write();
        let before_count = sessions.len();
        sessions.retain(|_, session| session.idle_for(now) < self.ttl);
        before_count - sessions.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::grid::{CellSize, DEFAULT_BOUNDS};
    use crate::mesh::InjectorGeometry;
    use crate::playback::PlaybackOptions;

    fn session() -> PlaybackSession {
        let bundle = TimestepBundle {
            threshold: 0.1,
            timesteps: vec![],
            data: BTreeMap::new(),
            injectors: InjectorGeometry::default(),
            grid: CellSize {
                dx: 1.0,
                dy: 1.0,
                dz: 1.0,
            },
            bounds: DEFAULT_BOUNDS,
        };
        let controller = PlaybackController::for_bundle(&bundle, PlaybackOptions::default());
        PlaybackSession::new("sleipner", Arc::new(bundle), controller)
    }

    #[test]
    fn insert_and_get() {
        let store = SessionStore::new();
        let id = store.insert(session());
        assert_eq!(store.session_count(), 1);
        assert_eq!(store.get(&id).unwrap().dataset, "sleipner");
        assert!(store.get("nope").is_none());
        assert!(store.remove(&id).is_some());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn idle_sessions_expire() {
        let store = SessionStore::with_ttl(Duration::ZERO);
        store.insert(session());
        store.insert(session());
        assert_eq!(store.cleanup_expired(), 2);
        assert_eq!(store.session_count(), 0);

        let store = SessionStore::with_ttl(Duration::from_secs(3600));
        store.insert(session());
        assert_eq!(store.cleanup_expired(), 0);
    }
}
