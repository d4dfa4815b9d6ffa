use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::retrieval::ChunkStore;

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub use models::*;
pub use queries::{ArticleQueries, KnowledgeChunkQueries};

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join(crate::config::settings::DATABASE_FILE_NAME)).await
    }

    // Article operations
    #[inline]
    pub async fn list_active_articles(&self) -> Result<Vec<KnowledgeArticle>> {
        ArticleQueries::list_active(&self.pool).await
    }

    #[inline]
    pub async fn save_article(&self, article: NewKnowledgeArticle) -> Result<KnowledgeArticle> {
        ArticleQueries::create(&self.pool, article).await
    }

    // Knowledge chunk operations
    #[inline]
    pub async fn get_chunks_for_article(&self, article_id: i64) -> Result<Vec<KnowledgeChunk>> {
        KnowledgeChunkQueries::list_by_article(&self.pool, article_id).await
    }

    #[inline]
    pub async fn statistics(&self) -> Result<KnowledgeBaseStatistics> {
        KnowledgeChunkQueries::statistics(&self.pool).await
    }

    /// Optimize database performance by running VACUUM and ANALYZE
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        info!("Optimizing database performance");

        // Merge full-text index segments left behind by a bulk rebuild
        sqlx::query("INSERT INTO knowledge_chunks_fts(knowledge_chunks_fts) VALUES ('optimize')")
            .execute(&self.pool)
            .await
            .context("Failed to optimize full-text index")?;

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .context("Failed to vacuum database")?;

        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .context("Failed to analyze database")?;

        debug!("Database optimization completed");
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for Database {
    async fn search_chunks(&self, match_query: &str, limit: usize) -> Result<Vec<RetrievedChunk>> {
        KnowledgeChunkQueries::search(&self.pool, match_query, limit as i64).await
    }

    async fn first_chunks(&self, limit: usize) -> Result<Vec<RetrievedChunk>> {
        KnowledgeChunkQueries::first_chunks(&self.pool, limit as i64).await
    }
}
