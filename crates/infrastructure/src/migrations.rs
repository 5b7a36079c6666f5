//! 数据库迁移入口，SQL 文件位于仓库根目录 `migrations/`。

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
