use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use application::{
    repository::{MessageRepository, UserRepository},
    services::{ChatService, ChatServiceDependencies, UserService, UserServiceDependencies},
    ChatServer, Clock, SystemClock,
};
use axum::Router;
use tokio::{net::TcpListener, sync::oneshot, sync::RwLock};
use web_api::{router as build_router, AppState, JwtConfig, JwtService};

use domain::{ChatMessage, RepositoryError, Timestamp, User, UserId};

// 内存用户目录，测试无需数据库
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(user.id.as_str()) {
            return Err(RepositoryError::Conflict);
        }
        users.insert(user.id.as_str().to_owned(), user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(id.as_str()).cloned())
    }

    async fn exists(&self, id: &UserId) -> Result<bool, RepositoryError> {
        Ok(self.users.read().await.contains_key(id.as_str()))
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|user| user.created_at);
        Ok(users)
    }
}

// 内存消息存档，保留写入顺序
#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<ChatMessage>>,
}

impl InMemoryMessageRepository {
    pub async fn stored(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn save(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError> {
        self.messages.write().await.push(message.clone());
        Ok(message)
    }

    async fn list_recent(
        &self,
        limit: i64,
        before: Option<Timestamp>,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut recent: Vec<ChatMessage> = messages
            .iter()
            .filter(|message| before.is_none_or(|cutoff| message.timestamp < cutoff))
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(limit.max(0) as usize);
        Ok(recent)
    }
}

pub struct TestBackend {
    pub router: Router,
    pub chat_server: Arc<ChatServer>,
    pub message_repository: Arc<InMemoryMessageRepository>,
}

pub fn build_backend() -> TestBackend {
    // 心跳间隔放大，避免巡检干扰用例时序
    let chat_server = Arc::new(ChatServer::new(Duration::from_secs(300)));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());

    let user_repository = Arc::new(InMemoryUserRepository::default());
    let message_repository = Arc::new(InMemoryMessageRepository::default());

    let user_service = UserService::new(UserServiceDependencies {
        user_repository: user_repository.clone(),
        clock: clock.clone(),
    });

    let chat_service = ChatService::new(ChatServiceDependencies {
        registry: chat_server.registry().clone(),
        message_repository: message_repository.clone(),
        clock,
    });

    let jwt_service = Arc::new(JwtService::new(JwtConfig {
        secret: "test-secret-key-with-at-least-32-chars!".to_string(),
        expiration_days: 7,
    }));

    let state = AppState::new(
        Arc::new(user_service),
        Arc::new(chat_service),
        chat_server.clone(),
        jwt_service,
    );

    TestBackend {
        router: build_router(state),
        chat_server,
        message_repository,
    }
}

pub struct RunningServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RunningServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/api/ws{}", self.addr, query)
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub async fn spawn_server(router: Router) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    RunningServer {
        addr,
        shutdown: Some(shutdown_tx),
    }
}
