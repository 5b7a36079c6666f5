use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::registry::ConnectionRegistry;

/// 心跳监控：周期性活性扫描。
///
/// 每轮扫描压下所有存活会话的活性标志并发送 ping；
/// 上一轮未应答（标志仍为低）的会话被强制终止并移出注册表，
/// 即静默连接在失联后的第二轮扫描被回收，享有一个完整周期的宽限。
pub struct HeartbeatMonitor {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
}

impl HeartbeatMonitor {
    pub fn new(registry: Arc<ConnectionRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// 启动后台扫描任务。
    pub fn run(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval 的首个 tick 立即完成；跳过它保证新会话的完整宽限期
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }

    /// 单轮扫描。独立方法便于测试直接驱动。
    pub async fn sweep(&self) {
        for session in self.registry.sessions().await {
            if !session.probe() {
                tracing::info!(session_id = %session.id(), "terminating unresponsive session");
                session.terminate();
                self.registry.unregister(session.id()).await;
            } else if !session.send_ping() {
                tracing::debug!(session_id = %session.id(), "ping probe not delivered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ChatSession, SessionCommand, SessionState};

    fn monitor(registry: &Arc<ConnectionRegistry>) -> HeartbeatMonitor {
        HeartbeatMonitor::new(Arc::clone(registry), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn first_sweep_probes_and_second_terminates() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (session, mut commands) = ChatSession::new(None);
        registry.register(Arc::clone(&session)).await;
        let monitor = monitor(&registry);

        monitor.sweep().await;
        assert_eq!(registry.count().await, 1);
        assert!(!session.is_alive());
        assert!(matches!(
            commands.try_recv(),
            Ok(SessionCommand::SendPing)
        ));

        monitor.sweep().await;
        assert_eq!(registry.count().await, 0);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn pong_between_sweeps_keeps_the_session() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (session, _commands) = ChatSession::new(None);
        registry.register(Arc::clone(&session)).await;
        let monitor = monitor(&registry);

        monitor.sweep().await;
        session.mark_alive();
        monitor.sweep().await;

        assert_eq!(registry.count().await, 1);
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn sweep_only_pings_surviving_sessions() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (silent, mut silent_commands) = ChatSession::new(None);
        let (responsive, mut responsive_commands) = ChatSession::new(None);
        registry.register(Arc::clone(&silent)).await;
        registry.register(Arc::clone(&responsive)).await;
        let monitor = monitor(&registry);

        monitor.sweep().await;
        assert!(matches!(
            silent_commands.try_recv(),
            Ok(SessionCommand::SendPing)
        ));
        responsive.mark_alive();

        monitor.sweep().await;
        // 静默会话被终止，不再收到探测
        assert!(silent_commands.try_recv().is_err());
        assert!(matches!(
            responsive_commands.try_recv(),
            Ok(SessionCommand::SendPing)
        ));
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_reaps_silent_sessions_on_schedule() {
        let interval = Duration::from_secs(30);
        let registry = Arc::new(ConnectionRegistry::new());
        let (session, _commands) = ChatSession::new(None);
        registry.register(Arc::clone(&session)).await;

        let task = HeartbeatMonitor::new(Arc::clone(&registry), interval).run();

        // 第一轮扫描后仍在宽限期内
        tokio::time::sleep(interval + Duration::from_millis(100)).await;
        assert_eq!(registry.count().await, 1);

        // 第二轮扫描回收静默会话
        tokio::time::sleep(interval).await;
        assert_eq!(registry.count().await, 0);
        assert_eq!(session.state(), SessionState::Closed);

        task.abort();
    }
}
