use std::sync::Arc;

use domain::{User, UserId};

use crate::{clock::Clock, error::ApplicationError, repository::UserRepository};

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 注册 / 登录簿记。无密码：身份即经过校验的用户 ID。
pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, raw_id: &str) -> Result<User, ApplicationError> {
        let id = UserId::parse(raw_id)?;

        if self.deps.user_repository.exists(&id).await? {
            return Err(ApplicationError::AccountAlreadyRegistered);
        }

        let user = User::new(id, self.deps.clock.now());
        let stored = self.deps.user_repository.create(user).await?;
        tracing::info!(user_id = %stored.id, "User registered");
        Ok(stored)
    }

    pub async fn login(&self, raw_id: &str) -> Result<User, ApplicationError> {
        let id = UserId::parse(raw_id)?;

        let user = self
            .deps
            .user_repository
            .find_by_id(&id)
            .await?
            .ok_or(ApplicationError::UserNotFound)?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApplicationError> {
        Ok(self.deps.user_repository.list_all().await?)
    }
}
