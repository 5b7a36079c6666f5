//! 领域层：聊天后端的核心类型。
//!
//! 包含用户与消息实体、WebSocket 线格式帧以及错误类型，
//! 不依赖任何运行时或存储实现。

pub mod errors;
pub mod frame;
pub mod message;
pub mod user;
pub mod value_objects;

pub use errors::{DomainError, RepositoryError};
pub use frame::{InboundFrame, OutboundFrame};
pub use message::ChatMessage;
pub use user::User;
pub use value_objects::{Timestamp, UserId};
