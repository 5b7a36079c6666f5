use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::Timestamp;

/// 发送者身份缺失时使用的占位名。
pub const ANONYMOUS_SENDER: &str = "anonymous";

/// 一条已持久化的聊天消息。写入后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    #[serde(rename = "from")]
    pub sender: String,
    /// 预留的点对点收件人，广播模式下为空。
    #[serde(rename = "to", default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub content: String,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn new(
        id: Uuid,
        sender: impl Into<String>,
        content: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            sender: sender.into(),
            recipient: None,
            content: content.into(),
            timestamp,
        }
    }
}
