use std::sync::Arc;

use application::{ChatServer, ChatService, UserService};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub chat_service: Arc<ChatService>,
    pub chat_server: Arc<ChatServer>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        user_service: Arc<UserService>,
        chat_service: Arc<ChatService>,
        chat_server: Arc<ChatServer>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            user_service,
            chat_service,
            chat_server,
            jwt_service,
        }
    }
}
