pub mod bundle;
pub mod datasets;
pub mod health;
pub mod mesh;
pub mod playback;

use actix_web::HttpResponse;
use actix_web::error::BlockingError;

use crate::error::PipelineError;

pub use bundle::get_bundle;
pub use datasets::list_datasets;
pub use health::hello;
pub use mesh::get_mesh;
pub use playback::{create_playback, get_playback_frame, playback_command};

/// 将管线错误转换为 JSON 错误响应
pub fn error_response(err: PipelineError) -> HttpResponse {
    let body = serde_json::json!({
        "error": err.to_string(),
    });
    match err {
        PipelineError::UnknownDataset { .. }
        | PipelineError::TimestepNotFound { .. }
        | PipelineError::SessionNotFound { .. } => HttpResponse::NotFound().json(body),
        PipelineError::UnsupportedFormat { .. } => HttpResponse::BadRequest().json(body),
        PipelineError::Io(_)
        | PipelineError::Json(_)
        | PipelineError::Yaml(_)
        | PipelineError::InvalidVtk { .. } => {
            tracing::error!("[请求失败] {}", err);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// 阻塞任务被取消（线程池关闭）时的响应
pub fn blocking_error(err: BlockingError) -> HttpResponse {
    tracing::error!("[请求失败] 后台任务被取消: {}", err);
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": "后台任务被取消",
        "details": err.to_string(),
    }))
}
