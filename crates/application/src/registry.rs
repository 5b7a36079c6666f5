use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::session::ChatSession;

/// 当前存活会话的索引。
///
/// 注册/注销由各连接任务调用；广播与心跳只读取快照，
/// 因此迭代天然容忍并发移除。
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<HashMap<Uuid, Arc<ChatSession>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接管一个新会话。每条物理连接都是全新条目，无需去重。
    pub async fn register(&self, session: Arc<ChatSession>) {
        let session_id = session.id();
        self.inner.write().await.insert(session_id, session);
        tracing::debug!(session_id = %session_id, "session registered");
    }

    /// 幂等注销：不存在的条目是无操作。返回是否确实移除。
    pub async fn unregister(&self, session_id: Uuid) -> bool {
        match self.inner.write().await.remove(&session_id) {
            Some(session) => {
                session.mark_closed();
                tracing::debug!(session_id = %session_id, "session unregistered");
                true
            }
            None => false,
        }
    }

    /// 所有已注册会话的快照。心跳扫描遍历全部条目。
    pub async fn sessions(&self) -> Vec<Arc<ChatSession>> {
        self.inner.read().await.values().cloned().collect()
    }

    /// 仍处于 Open 状态的会话快照，广播扇出的目标集。
    pub async fn open_sessions(&self) -> Vec<Arc<ChatSession>> {
        self.inner
            .read()
            .await
            .values()
            .filter(|session| session.is_open())
            .cloned()
            .collect()
    }

    /// 绑定到指定用户身份的开放会话。
    pub async fn sessions_for_user(&self, user_id: &str) -> Vec<Arc<ChatSession>> {
        self.inner
            .read()
            .await
            .values()
            .filter(|session| session.is_open() && session.user_id() == Some(user_id))
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }
}
