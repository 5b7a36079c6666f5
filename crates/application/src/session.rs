use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use domain::OutboundFrame;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use uuid::Uuid;

/// 会话出站命令。所有对底层 socket 的写操作都经由此通道，
/// 保证 sink 只有单一写者。
#[derive(Debug)]
pub enum SessionCommand {
    /// 已序列化的文本帧。
    SendText(String),
    /// 心跳探测。
    SendPing,
    /// 应答客户端主动发来的 ping。
    SendPong(Vec<u8>),
}

/// 会话生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

const OUTBOUND_BUFFER: usize = 32;

/// 单个 WebSocket 连接的会话记录。
///
/// 持有连接身份、心跳活性标志与出站命令通道；
/// 传输句柄本身归 WebSocket 读写任务所有。
pub struct ChatSession {
    id: Uuid,
    user_id: Option<String>,
    alive: AtomicBool,
    state: AtomicU8,
    outbound: mpsc::Sender<SessionCommand>,
    shutdown: Notify,
}

impl ChatSession {
    /// 新建会话记录，返回会话与出站命令的消费端。
    pub fn new(user_id: Option<String>) -> (Arc<Self>, mpsc::Receiver<SessionCommand>) {
        let (outbound, commands) = mpsc::channel(OUTBOUND_BUFFER);
        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            user_id,
            alive: AtomicBool::new(true),
            state: AtomicU8::new(STATE_OPEN),
            outbound,
            shutdown: Notify::new(),
        });
        (session, commands)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn state(&self) -> SessionState {
        match self.state.load(Ordering::SeqCst) {
            STATE_OPEN => SessionState::Open,
            STATE_CLOSING => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// 客户端发起关闭握手，进入 Closing。已终止的会话保持 Closed。
    pub fn begin_close(&self) {
        let _ = self.state.compare_exchange(
            STATE_OPEN,
            STATE_CLOSING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub(crate) fn mark_closed(&self) {
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
    }

    /// Pong 到达，活性恢复。
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }

    /// 心跳扫描：压下活性标志并返回压下前的值。
    /// 返回 false 表示自上次扫描以来没有任何 pong。
    pub fn probe(&self) -> bool {
        self.alive.swap(false, Ordering::SeqCst)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// 尽力投递一条已序列化文本；会话非 Open 或通道不可用时返回 false。
    pub fn send_text(&self, payload: String) -> bool {
        self.is_open()
            && self
                .outbound
                .try_send(SessionCommand::SendText(payload))
                .is_ok()
    }

    /// 序列化并投递一个出站帧。
    pub fn send_frame(&self, frame: &OutboundFrame) -> bool {
        match serde_json::to_string(frame) {
            Ok(payload) => self.send_text(payload),
            Err(err) => {
                tracing::warn!(error = %err, session_id = %self.id, "failed to serialize outbound frame");
                false
            }
        }
    }

    /// 投递心跳探测。失败不重试，留给下一轮扫描处理。
    pub fn send_ping(&self) -> bool {
        self.outbound.try_send(SessionCommand::SendPing).is_ok()
    }

    pub fn send_pong(&self, payload: Vec<u8>) -> bool {
        self.outbound
            .try_send(SessionCommand::SendPong(payload))
            .is_ok()
    }

    /// 强制终止：跳过关闭握手，标记 Closed 并唤醒传输任务退出。
    pub fn terminate(&self) {
        self.mark_closed();
        self.shutdown.notify_one();
    }

    /// 在强制终止时完成。连接的写任务在此与命令通道间 select。
    pub async fn terminated(&self) {
        self.shutdown.notified().await;
    }
}
