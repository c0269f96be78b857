use actix_web::web;

use crate::handlers;

/// 统一注册 HTTP 路由，方便集中管理
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(handlers::hello)
        .service(handlers::list_datasets)
        .service(handlers::get_bundle)
        .service(handlers::get_mesh)
        .service(handlers::create_playback)
        .service(handlers::playback_command)
        .service(handlers::get_playback_frame);
}
