use actix_web::{HttpResponse, Responder, get, web};

use crate::app_state::AppState;

/// 根路径健康检查/服务说明
#[get("/")]
pub async fn hello(data: web::Data<AppState>) -> impl Responder {
    let supported = data.parser_registry.supported_extensions();
    HttpResponse::Ok().json(serde_json::json!({
        "message": "CO2 体素数据服务",
        "endpoints": [
            "/datasets",
            "/bundle?dataset=<id>&threshold=<t>",
            "/mesh?dataset=<id>&threshold=<t>&timestep=<ts>&gzip=<bool>",
            "/playback",
        ],
        "supported_extensions": supported,
        "datasets": data.datasets.ids(),
        "default_threshold": data.default_threshold,
        "cache": data.cache.storage_name(),
        "cache_dir": data.cache_dir,
        "sessions": data.session_store.session_count(),
    }))
}
