use serde::{Deserialize, Serialize};

use crate::value_objects::Timestamp;

/// 客户端入站帧。结构宽松：未知字段忽略，`content` 必填。
///
/// 无法按此结构解码的负载整体按纯文本处理。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

impl InboundFrame {
    /// 纯文本回退：整段原始输入作为消息内容。
    pub fn plain_text(
        content: impl Into<String>,
        now: Timestamp,
        user_id: Option<String>,
    ) -> Self {
        Self {
            kind: Some("message".to_owned()),
            content: content.into(),
            timestamp: Some(now),
            user_id,
        }
    }

    /// 仅 type 为 message / broadcast 的帧会写入历史存档。
    pub fn is_chat_message(&self) -> bool {
        matches!(self.kind.as_deref(), Some("message") | Some("broadcast"))
    }
}

/// 服务端出站帧，`type` 字段自描述。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    Welcome {
        content: String,
        timestamp: Timestamp,
    },
    Broadcast {
        content: String,
        timestamp: Timestamp,
        #[serde(
            rename = "userId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        user_id: Option<String>,
    },
    Error {
        content: String,
        timestamp: Timestamp,
    },
}

impl OutboundFrame {
    pub fn welcome(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::Welcome {
            content: content.into(),
            timestamp,
        }
    }

    pub fn broadcast(
        content: impl Into<String>,
        timestamp: Timestamp,
        user_id: Option<String>,
    ) -> Self {
        Self::Broadcast {
            content: content.into(),
            timestamp,
            user_id,
        }
    }

    pub fn error(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::Error {
            content: content.into(),
            timestamp,
        }
    }
}
