use std::sync::Arc;

use application::{ChatSession, SessionCommand};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;

/// WebSocket 连接管理器
///
/// 封装单个 WebSocket 连接的生命周期，包括：
/// - 会话注册与欢迎帧
/// - 消息接收和发送
/// - Ping/Pong 心跳响应
/// - 断开时的资源清理
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    session: Arc<ChatSession>,
    commands: mpsc::Receiver<SessionCommand>,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState, user_id: Option<String>) -> Self {
        let (session, commands) = ChatSession::new(user_id);
        Self {
            socket,
            state,
            session,
            commands,
        }
    }

    /// 运行 WebSocket 连接的主循环
    ///
    /// 写任务串行化所有出站帧；读任务把入站帧交给广播引擎。
    /// 任意一个任务结束即认为连接终止，随后注销会话。
    pub async fn run(self) {
        let WebSocketConnection {
            socket,
            state,
            session,
            mut commands,
        } = self;

        tracing::info!(
            session_id = %session.id(),
            user_id = session.user_id().unwrap_or("-"),
            "WebSocket client connected"
        );

        // 先入队问候帧再注册，保证它排在任何广播之前
        if !state.chat_service.send_welcome(&session) {
            tracing::warn!(session_id = %session.id(), "failed to queue welcome frame");
        }
        state
            .chat_server
            .registry()
            .register(Arc::clone(&session))
            .await;

        let (mut sink, mut stream) = socket.split();

        // 写任务：统一处理所有对 WebSocket sink 的写操作
        let writer_session = Arc::clone(&session);
        let mut send_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // 心跳巡检强制终止时尽量补发关闭帧
                    _ = writer_session.terminated() => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        break;
                    }
                    command = commands.recv() => {
                        let Some(command) = command else { break };
                        let sent = match command {
                            SessionCommand::SendText(text) => {
                                sink.send(WsMessage::Text(text.into())).await
                            }
                            SessionCommand::SendPing => {
                                sink.send(WsMessage::Ping(Vec::new().into())).await
                            }
                            SessionCommand::SendPong(data) => {
                                sink.send(WsMessage::Pong(data.into())).await
                            }
                        };
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        // 读任务：处理来自客户端的帧
        let reader_session = Arc::clone(&session);
        let chat_service = Arc::clone(&state.chat_service);
        let mut recv_task = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(err) => {
                        // 传输错误只终止本连接
                        tracing::warn!(
                            error = %err,
                            session_id = %reader_session.id(),
                            "WebSocket transport error"
                        );
                        break;
                    }
                };
                match message {
                    WsMessage::Text(text) => {
                        chat_service
                            .handle_inbound(&reader_session, text.as_str())
                            .await;
                    }
                    WsMessage::Pong(_) => {
                        reader_session.mark_alive();
                    }
                    WsMessage::Ping(data) => {
                        if !reader_session.send_pong(data.to_vec()) {
                            tracing::debug!(
                                session_id = %reader_session.id(),
                                "failed to queue pong reply"
                            );
                        }
                    }
                    WsMessage::Close(_) => {
                        reader_session.begin_close();
                        break;
                    }
                    WsMessage::Binary(_) => {
                        tracing::debug!(
                            session_id = %reader_session.id(),
                            "ignoring binary frame"
                        );
                    }
                }
            }
        });

        // 等待任意一个任务完成（连接断开）
        tokio::select! {
            _ = &mut send_task => {}
            _ = &mut recv_task => {}
        }

        session.terminate();
        send_task.abort();
        recv_task.abort();

        state.chat_server.registry().unregister(session.id()).await;
        tracing::info!(session_id = %session.id(), "WebSocket client disconnected");
    }
}
