use std::sync::Arc;

use actix_web::{HttpResponse, Responder, get, post, web};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::PipelineError;
use crate::handlers::{blocking_error, error_response};
use crate::playback::{PlaybackCommand, PlaybackController, RenderFrame};
use crate::session::PlaybackSession;

#[derive(Deserialize)]
pub struct CreatePlaybackRequest {
    pub dataset: String,
    pub threshold: Option<f64>,
}

/// 创建播放会话：加载（或构建）数据包并绑定一个播放控制器
#[post("/playback")]
pub async fn create_playback(
    data: web::Data<AppState>,
    payload: web::Json<CreatePlaybackRequest>,
) -> impl Responder {
    let state = data.clone();
    let CreatePlaybackRequest { dataset, threshold } = payload.into_inner();
    let dataset_id = dataset.clone();

    let bundle = match web::block(move || state.load_bundle(&dataset, threshold)).await {
        Ok(Ok(bundle)) => bundle,
        Ok(Err(err)) => return error_response(err),
        Err(err) => return blocking_error(err),
    };

    let controller = PlaybackController::for_bundle(&bundle, data.playback);
    let playback_state = controller.state();
    let session_id = data.session_store.insert(PlaybackSession::new(
        dataset_id.clone(),
        Arc::new(bundle),
        controller,
    ));
    tracing::info!(
        "[播放] 创建会话 {} 数据集 {}，共 {} 个时间步",
        session_id,
        dataset_id,
        playback_state.timestep_count
    );

    HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "dataset": dataset_id,
        "state": playback_state,
        "frame_period_ms": data.playback.frame_period.as_millis() as u64,
    }))
}

/// 执行一条播放指令并返回新状态
/// 例如: {"command": "seek", "index": 3}
#[post("/playback/{session_id}/command")]
pub async fn playback_command(
    data: web::Data<AppState>,
    path: web::Path<String>,
    command: web::Json<PlaybackCommand>,
) -> impl Responder {
    let session_id = path.into_inner();
    let Some(session) = data.session_store.get(&session_id) else {
        return error_response(PipelineError::SessionNotFound { session_id });
    };

    let mut controller = session.controller.lock();
    controller.apply(command.into_inner());
    HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "state": controller.state(),
        "needs_render": controller.needs_render(),
    }))
}

/// 当前帧的渲染数据
#[get("/playback/{session_id}/frame")]
pub async fn get_playback_frame(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let session_id = path.into_inner();
    let Some(session) = data.session_store.get(&session_id) else {
        return error_response(PipelineError::SessionNotFound { session_id });
    };

    // 网格构建较重，放到阻塞线程池
    let frame = match web::block(move || render_frame(&session)).await {
        Ok(frame) => frame,
        Err(err) => return blocking_error(err),
    };
    HttpResponse::Ok().json(frame)
}

fn render_frame(session: &PlaybackSession) -> RenderFrame {
    let mut controller = session.controller.lock();
    let frame = controller.render(&session.bundle);
    controller.mark_rendered();
    frame
}
