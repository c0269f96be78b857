use actix_web::{HttpResponse, Responder, get, web};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::handlers::{blocking_error, error_response};

#[derive(Deserialize)]
pub struct BundleQuery {
    pub dataset: String,
    /// 缺省时使用服务的默认阈值
    pub threshold: Option<f64>,
}

/// 返回某个阈值下的完整数据包（所有时间步的活跃单元、注入井、网格信息）
/// 例如: /bundle?dataset=sleipner&threshold=0.1
#[get("/bundle")]
pub async fn get_bundle(
    data: web::Data<AppState>,
    query: web::Query<BundleQuery>,
) -> impl Responder {
    let state = data.clone();
    let BundleQuery { dataset, threshold } = query.into_inner();
    match web::block(move || state.load_bundle(&dataset, threshold)).await {
        Ok(Ok(bundle)) => HttpResponse::Ok().json(bundle),
        Ok(Err(err)) => error_response(err),
        Err(err) => blocking_error(err),
    }
}
