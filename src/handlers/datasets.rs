use actix_web::{HttpResponse, Responder, get, web};

use crate::app_state::AppState;

/// 已登记的数据集列表
#[get("/datasets")]
pub async fn list_datasets(data: web::Data<AppState>) -> impl Responder {
    let datasets: Vec<_> = data
        .datasets
        .datasets
        .iter()
        .map(|d| {
            serde_json::json!({
                "id": d.id,
                "source_dir": d.source_dir,
                "file_prefix": d.file_prefix,
                "property": d.property,
                "geometry": d.geometry,
                "injector_count": d.injectors.wells.len(),
            })
        })
        .collect();
    HttpResponse::Ok().json(serde_json::json!({ "datasets": datasets }))
}
