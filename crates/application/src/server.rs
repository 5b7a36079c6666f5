use std::sync::Arc;
use std::time::Duration;

use domain::OutboundFrame;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::heartbeat::HeartbeatMonitor;
use crate::registry::ConnectionRegistry;

/// 服务器上下文：会话注册表与心跳任务的生命周期属主。
///
/// 显式构造并注入到网关、广播引擎与监控，整个进程没有全局单例。
pub struct ChatServer {
    registry: Arc<ConnectionRegistry>,
    heartbeat_interval: Duration,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChatServer {
    pub fn new(heartbeat_interval: Duration) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            heartbeat_interval,
            heartbeat_task: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// 启动心跳扫描。重复调用是无操作。
    pub async fn start(&self) {
        let mut task = self.heartbeat_task.lock().await;
        if task.is_some() {
            return;
        }
        let monitor =
            HeartbeatMonitor::new(Arc::clone(&self.registry), self.heartbeat_interval);
        *task = Some(monitor.run());
        tracing::info!(
            interval_secs = self.heartbeat_interval.as_secs(),
            "heartbeat monitor started"
        );
    }

    /// 停止心跳扫描并终止所有会话。幂等。
    pub async fn stop(&self) {
        if let Some(task) = self.heartbeat_task.lock().await.take() {
            task.abort();
        }
        for session in self.registry.sessions().await {
            session.terminate();
            self.registry.unregister(session.id()).await;
        }
        tracing::info!("chat server stopped");
    }

    /// 当前已注册的连接数。
    pub async fn client_count(&self) -> usize {
        self.registry.count().await
    }

    /// 向绑定到该用户身份的所有开放会话投递一帧。
    /// 返回是否至少有一次投递被接受。
    pub async fn send_to_user(&self, user_id: &str, frame: &OutboundFrame) -> bool {
        let payload = match serde_json::to_string(frame) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize direct message");
                return false;
            }
        };
        let mut sent = false;
        for session in self.registry.sessions_for_user(user_id).await {
            if session.send_text(payload.clone()) {
                sent = true;
            }
        }
        sent
    }
}
