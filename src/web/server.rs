//! Web服务器实现
//!
//! 提供HTTP服务器和路由管理

use super::{handlers, WebAppState, KEEP_ALIVE_PATH};
use crate::config::ServerConfig;
use crate::error::{ConfigError, Result};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// 创建路由
pub fn router(state: WebAppState) -> Router {
    Router::new()
        .route(KEEP_ALIVE_PATH, get(handlers::keep_alive))
        .route("/health", get(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(handlers::panic_response)),
        )
        .with_state(state)
}

/// Web服务器
pub struct WebServer {
    /// 配置
    config: ServerConfig,
    /// 应用状态
    state: WebAppState,
    /// 关闭信号接收器
    shutdown_rx: broadcast::Receiver<()>,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(
        config: ServerConfig,
        state: WebAppState,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            state,
            shutdown_rx,
        }
    }

    /// 启动Web服务器，直到收到关闭信号
    pub async fn start(self) -> Result<()> {
        let addr = self
            .config
            .socket_addr()
            .map_err(ConfigError::ValidationError)?;

        let listener = TcpListener::bind(addr).await?;
        info!("Web服务器已启动: http://{}", addr);
        info!("触发端点: http://{}{}", addr, KEEP_ALIVE_PATH);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })
            .await?;

        info!("Web服务器已关闭");
        Ok(())
    }
}
