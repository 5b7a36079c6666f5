//! 应用层实现。
//!
//! 提供会话注册表、心跳监控、广播引擎等连接管理核心，
//! 以及围绕领域模型的用例服务；对存储的访问通过仓储端口抽象。

pub mod clock;
pub mod error;
pub mod heartbeat;
pub mod registry;
pub mod repository;
pub mod server;
pub mod services;
pub mod session;

pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use heartbeat::HeartbeatMonitor;
pub use registry::ConnectionRegistry;
pub use repository::{MessageRepository, UserRepository};
pub use server::ChatServer;
pub use services::{
    ChatService, ChatServiceDependencies, DispatchOutcome, PersistenceSubmission, UserService,
    UserServiceDependencies,
};
pub use session::{ChatSession, SessionCommand, SessionState};
