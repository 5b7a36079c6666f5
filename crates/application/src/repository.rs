use async_trait::async_trait;
use domain::{ChatMessage, RepositoryError, Timestamp, User, UserId};

#[cfg(test)]
use mockall::automock;

/// 用户目录端口。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 创建新用户；标识已被占用时返回 `Conflict`。
    async fn create(&self, user: User) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn exists(&self, id: &UserId) -> Result<bool, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<User>, RepositoryError>;
}

/// 聊天历史端口：只追加，按时间倒序分页查询。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn save(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError>;
    /// 最新的 `limit` 条消息，新到旧；`before` 为排他的时间上界。
    async fn list_recent(
        &self,
        limit: i64,
        before: Option<Timestamp>,
    ) -> Result<Vec<ChatMessage>, RepositoryError>;
}
