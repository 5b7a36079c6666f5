//! 主应用程序入口
//!
//! 启动 Axum Web API 服务与 WebSocket 聊天核心。

use std::{sync::Arc, time::Duration};

use application::{
    services::{ChatService, ChatServiceDependencies, UserService, UserServiceDependencies},
    ChatServer, Clock, MessageRepository, SystemClock, UserRepository,
};
use config::AppConfig;
use infrastructure::{create_pg_pool, PgStorage, MIGRATOR};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 读取环境变量配置
    let config = AppConfig::from_env_with_defaults();
    config.validate()?;

    tracing::info!(
        "Connecting to database: {}",
        config.database.url.split('@').last().unwrap_or("unknown")
    );

    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;

    // 运行迁移
    MIGRATOR.run(&pg_pool).await?;

    let storage = PgStorage::new(pg_pool);
    let user_repository: Arc<dyn UserRepository> = storage.user_repository.clone();
    let message_repository: Arc<dyn MessageRepository> = storage.message_repository.clone();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());

    // 聊天核心：会话注册表 + 心跳巡检
    let chat_server = Arc::new(ChatServer::new(Duration::from_secs(
        config.heartbeat.interval_secs,
    )));
    chat_server.start().await;

    // 创建应用层服务
    let user_service = UserService::new(UserServiceDependencies {
        user_repository,
        clock: clock.clone(),
    });

    let chat_service = ChatService::new(ChatServiceDependencies {
        registry: chat_server.registry().clone(),
        message_repository,
        clock,
    });

    // 创建 JWT 服务
    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));

    // 创建应用状态
    let state = AppState::new(
        Arc::new(user_service),
        Arc::new(chat_service),
        chat_server.clone(),
        jwt_service,
    );

    // 启动 Web 服务器
    let app = router(state);
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!("Chat backend listening on http://{}", address);
    tracing::info!(
        "WebSocket endpoint ready with {} connected clients",
        chat_server.client_count().await
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 停止心跳并终止存量连接
    chat_server.stop().await;
    tracing::info!("Chat backend stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
