//! 广播引擎：入站事件的规范化、存档与扇出。

use std::sync::Arc;

use domain::message::ANONYMOUS_SENDER;
use domain::{ChatMessage, InboundFrame, OutboundFrame, RepositoryError, Timestamp};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    clock::Clock, error::ApplicationError, registry::ConnectionRegistry,
    repository::MessageRepository, session::ChatSession,
};

/// 处理失败时回发给发送者的提示。
const PROCESSING_FAILURE_TEXT: &str = "Failed to process message";

/// 新连接建立后推送的问候语。
const WELCOME_TEXT: &str = "Welcome to the WebSocket server!";

/// 一次挂起的存档写入。
///
/// 广播路径提交后即丢弃（fire-and-forget），失败只进日志；
/// 调用方也可以等待句柄检视写入结果。
#[derive(Debug)]
pub struct PersistenceSubmission {
    handle: JoinHandle<Result<ChatMessage, RepositoryError>>,
}

impl PersistenceSubmission {
    pub async fn outcome(self) -> Result<ChatMessage, RepositoryError> {
        self.handle
            .await
            .map_err(|err| RepositoryError::storage(format!("persistence task failed: {err}")))?
    }
}

/// 一次入站事件的处理结果。
#[derive(Debug)]
pub struct DispatchOutcome {
    /// 扇出中接受投递的会话数。
    pub delivered: usize,
    /// 扇出中拒绝投递（已关闭或缓冲满）的会话数。
    pub failed: usize,
    /// 存档提交句柄；非聊天类型的帧不产生提交。
    pub persistence: Option<PersistenceSubmission>,
}

pub struct ChatServiceDependencies {
    pub registry: Arc<ConnectionRegistry>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 聊天用例服务：WebSocket 连接任务把收到的文本帧交给它处理。
pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 连接建立后向新会话推送问候帧。
    pub fn send_welcome(&self, session: &ChatSession) -> bool {
        session.send_frame(&OutboundFrame::welcome(WELCOME_TEXT, self.deps.clock.now()))
    }

    /// 消息入口。管线失败只通知发送者，其他参与者不受影响。
    pub async fn handle_inbound(&self, sender: &ChatSession, raw: &str) {
        tracing::debug!(session_id = %sender.id(), "received message");
        match self.dispatch(sender, raw).await {
            Ok(outcome) => {
                tracing::debug!(
                    session_id = %sender.id(),
                    delivered = outcome.delivered,
                    failed = outcome.failed,
                    persisted = outcome.persistence.is_some(),
                    "broadcast dispatched"
                );
            }
            Err(err) => {
                tracing::error!(error = %err, session_id = %sender.id(), "Error processing message");
                self.notify_failure(sender);
            }
        }
    }

    /// 规范化 → 存档（异步提交，不等待）→ 重新盖时间戳 → 全量扇出。
    pub async fn dispatch(
        &self,
        sender: &ChatSession,
        raw: &str,
    ) -> Result<DispatchOutcome, ApplicationError> {
        let frame = self.normalize(sender, raw);

        let persistence = frame
            .is_chat_message()
            .then(|| self.submit_persistence(&frame));

        // 广播时间戳在扇出时重新生成，与存档时间戳相互独立
        let broadcast = OutboundFrame::broadcast(
            frame.content,
            self.deps.clock.now(),
            frame
                .user_id
                .or_else(|| sender.user_id().map(ToOwned::to_owned)),
        );
        let payload = serde_json::to_string(&broadcast)?;

        let (delivered, failed) = self.fan_out(&payload).await;
        Ok(DispatchOutcome {
            delivered,
            failed,
            persistence,
        })
    }

    /// 历史消息，新到旧，`before` 为排他上界。
    pub async fn history(
        &self,
        limit: i64,
        before: Option<Timestamp>,
    ) -> Result<Vec<ChatMessage>, ApplicationError> {
        Ok(self
            .deps
            .message_repository
            .list_recent(limit, before)
            .await?)
    }

    /// 解码失败时整段原始输入按纯文本聊天消息处理。
    fn normalize(&self, sender: &ChatSession, raw: &str) -> InboundFrame {
        match serde_json::from_str::<InboundFrame>(raw) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(
                    error = %err,
                    session_id = %sender.id(),
                    "inbound payload is not structured, treating as plain text"
                );
                InboundFrame::plain_text(
                    raw,
                    self.deps.clock.now(),
                    sender.user_id().map(ToOwned::to_owned),
                )
            }
        }
    }

    fn submit_persistence(&self, frame: &InboundFrame) -> PersistenceSubmission {
        let message = ChatMessage::new(
            Uuid::new_v4(),
            frame
                .user_id
                .clone()
                .unwrap_or_else(|| ANONYMOUS_SENDER.to_owned()),
            frame.content.clone(),
            frame.timestamp.unwrap_or_else(|| self.deps.clock.now()),
        );
        let repository = Arc::clone(&self.deps.message_repository);
        let handle = tokio::spawn(async move {
            let result = repository.save(message).await;
            if let Err(err) = &result {
                tracing::error!(error = %err, "Failed to save message");
            }
            result
        });
        PersistenceSubmission { handle }
    }

    /// 向开放会话快照逐一投递，包含发送者本人。
    /// 单个会话投递失败只计数，不影响其余会话。
    async fn fan_out(&self, payload: &str) -> (usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;
        for session in self.deps.registry.open_sessions().await {
            if session.send_text(payload.to_owned()) {
                delivered += 1;
            } else {
                failed += 1;
                tracing::debug!(
                    session_id = %session.id(),
                    "skipping unreachable session during fan-out"
                );
            }
        }
        (delivered, failed)
    }

    fn notify_failure(&self, sender: &ChatSession) {
        let frame = OutboundFrame::error(PROCESSING_FAILURE_TEXT, self.deps.clock.now());
        if !sender.send_frame(&frame) {
            tracing::debug!(session_id = %sender.id(), "failed to notify sender of processing error");
        }
    }
}
