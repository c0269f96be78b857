use std::time::Duration;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use co2_voxel_backend::app_state::AppState;
use co2_voxel_backend::config::ServerConfig;
use co2_voxel_backend::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    let state = AppState::from_config(&config).map_err(std::io::Error::other)?;

    tracing::info!(
        "已注册的解析器: {}",
        state
            .parser_registry
            .supported_extensions()
            .iter()
            .map(|ext| format!(".{}", ext))
            .collect::<Vec<_>>()
            .join(", ")
    );
    for dataset in &state.datasets.datasets {
        tracing::info!("数据集 {}: {}", dataset.id, dataset.source_dir.display());
    }

    let session_store = state.session_store.clone();
    let app_state = web::Data::new(state);

    // 后台定期清理空闲的播放会话
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(5 * 60));
        loop {
            interval.tick().await;
            let cleaned_count = session_store.cleanup_expired();
            if cleaned_count > 0 {
                tracing::info!(
                    "[清理任务] 清理了 {} 个过期会话，当前剩余: {} 个会话",
                    cleaned_count,
                    session_store.session_count()
                );
            }
        }
    });

    tracing::info!("服务器启动在 http://{}:{}", config.bind, config.port);
    tracing::info!("缓存目录: {}", config.cache_dir.display());
    tracing::info!(
        "会话 TTL: {} 分钟, 帧间隔 {} ms, 播放结束行为 {:?}",
        config.session_ttl_secs / 60,
        config.frame_period_ms,
        config.on_complete
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
    })
    .bind((config.bind.as_str(), config.port))?
    .run()
    .await
}
