pub mod bundle;
pub mod memo;
pub mod storage;
pub mod timestep_cache;
pub mod timesteps;

pub use bundle::{CacheKey, TimestepBundle, TimestepCells};
pub use memo::FieldMemo;
pub use storage::{BundleStorage, FileStorage, MemoryStorage};
pub use timestep_cache::TimestepCache;
pub use timesteps::{TimestepSeries, discover_timestep_files, load_all_timesteps, timestep_id};
