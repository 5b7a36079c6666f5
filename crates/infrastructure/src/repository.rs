use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use application::repository::{MessageRepository, UserRepository};
use domain::{ChatMessage, RepositoryError, Timestamp, User, UserId};

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        return RepositoryError::Conflict;
    }
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: String,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let id = UserId::parse(value.id).map_err(|err| invalid_data(err.to_string()))?;

        Ok(User {
            id,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    sender: String,
    recipient: Option<String>,
    content: String,
    sent_at: Timestamp,
}

impl From<MessageRecord> for ChatMessage {
    fn from(value: MessageRecord) -> Self {
        ChatMessage {
            id: value.id,
            sender: value.sender,
            recipient: value.recipient,
            content: value.content,
            timestamp: value.sent_at,
        }
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"INSERT INTO users (id, created_at, updated_at)
            VALUES ($1, $2, $3)
            RETURNING id, created_at, updated_at"#,
        )
        .bind(user.id.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        User::try_from(record)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, created_at, updated_at FROM users WHERE id = $1"#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn exists(&self, id: &UserId) -> Result<bool, RepositoryError> {
        let found: bool = sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)"#)
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(found)
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let records = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, created_at, updated_at FROM users ORDER BY created_at"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn save(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"INSERT INTO messages (id, sender, recipient, content, sent_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, sender, recipient, content, sent_at"#,
        )
        .bind(message.id)
        .bind(&message.sender)
        .bind(&message.recipient)
        .bind(&message.content)
        .bind(message.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(ChatMessage::from(record))
    }

    async fn list_recent(
        &self,
        limit: i64,
        before: Option<Timestamp>,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let records = if let Some(cutoff) = before {
            sqlx::query_as::<_, MessageRecord>(
                r#"SELECT id, sender, recipient, content, sent_at
                FROM messages
                WHERE sent_at < $1
                ORDER BY sent_at DESC
                LIMIT $2"#,
            )
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?
        } else {
            sqlx::query_as::<_, MessageRecord>(
                r#"SELECT id, sender, recipient, content, sent_at
                FROM messages
                ORDER BY sent_at DESC
                LIMIT $1"#,
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?
        };

        Ok(records.into_iter().map(ChatMessage::from).collect())
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
