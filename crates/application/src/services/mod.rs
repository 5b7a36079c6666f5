mod chat_service;
mod user_service;

pub use chat_service::{
    ChatService, ChatServiceDependencies, DispatchOutcome, PersistenceSubmission,
};
pub use user_service::{UserService, UserServiceDependencies};
