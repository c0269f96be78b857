pub mod app_state;
pub mod cache;
pub mod config;
pub mod error;
pub mod grid;
pub mod handlers;
pub mod mesh;
pub mod parsers;
pub mod playback;
pub mod routes;
pub mod session;
pub mod utils;

pub use error::{PipelineError, PipelineResult};
