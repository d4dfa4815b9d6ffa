
use super::models::*;
use anyhow::{Context, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

const ARTICLE_COLUMNS: &str = "id, headline, text, active, created_date";

const CHUNK_COLUMNS: &str = "id, article_id, chunk_index, headline, section_heading, chunk_text, \
     chunk_tokens, chunk_char_length, start_offset, end_offset, created_date";

pub struct ArticleQueries;

impl ArticleQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_article: NewKnowledgeArticle) -> Result<KnowledgeArticle> {
        if new_article.id.is_some() {
            return Self::upsert(pool, new_article).await;
        }

        let id = sqlx::query("INSERT INTO articles (headline, text, active) VALUES (?, ?, ?)")
            .bind(&new_article.headline)
            .bind(&new_article.text)
            .bind(new_article.active)
            .execute(pool)
            .await
            .context("Failed to create article")?
            .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created article"))
    }

    /// Insert an article under its own id, replacing any previous version
    #[inline]
    pub async fn upsert(pool: &SqlitePool, article: NewKnowledgeArticle) -> Result<KnowledgeArticle> {
        let id = article
            .id
            .ok_or_else(|| anyhow::anyhow!("Cannot upsert an article without an id"))?;

        sqlx::query(
            r#"
            INSERT INTO articles (id, headline, text, active)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                headline = excluded.headline,
                text = excluded.text,
                active = excluded.active
            "#,
        )
        .bind(id)
        .bind(&article.headline)
        .bind(&article.text)
        .bind(article.active)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to upsert article {}", id))?;

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve upserted article {}", id))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<KnowledgeArticle>> {
        let query = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
        let result = sqlx::query_as::<_, KnowledgeArticle>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get article by id")?;

        Ok(result)
    }

    /// Articles eligible for chunking, in id order
    #[inline]
    pub async fn list_active(pool: &SqlitePool) -> Result<Vec<KnowledgeArticle>> {
        let query = format!(
            "SELECT {} FROM articles WHERE active = 1 ORDER BY id ASC",
            ARTICLE_COLUMNS
        );
        let articles = sqlx::query_as::<_, KnowledgeArticle>(&query)
            .fetch_all(pool)
            .await
            .context("Failed to list active articles")?;

        Ok(articles)
    }

    #[inline]
    pub async fn set_active(pool: &SqlitePool, id: i64, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE articles SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update article state")?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an article together with its chunks and their full-text rows
    #[inline]
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        let mut transaction = pool
            .begin()
            .await
            .context("Failed to begin article delete")?;

        sqlx::query("DELETE FROM knowledge_chunks_fts WHERE article_id = ?")
            .bind(id)
            .execute(&mut *transaction)
            .await
            .context("Failed to remove article from full-text index")?;

        // Chunks follow through the foreign key cascade
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&mut *transaction)
            .await
            .context("Failed to delete article")?;

        transaction
            .commit()
            .await
            .context("Failed to commit article delete")?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(pool)
            .await
            .context("Failed to count articles")
    }
}

pub struct KnowledgeChunkQueries;

impl KnowledgeChunkQueries {
    /// Full-text search ranked by BM25, best match first
    #[inline]
    pub async fn search(
        pool: &SqlitePool,
        match_query: &str,
        limit: i64,
    ) -> Result<Vec<RetrievedChunk>> {
        let chunks = sqlx::query_as::<_, RetrievedChunk>(
            r#"
            SELECT kc.id,
                   kc.article_id,
                   kc.chunk_index,
                   kc.headline,
                   kc.section_heading,
                   kc.chunk_text,
                   kc.chunk_tokens,
                   kc.chunk_char_length,
                   bm25(knowledge_chunks_fts) AS score
            FROM knowledge_chunks_fts
            JOIN knowledge_chunks kc ON kc.id = knowledge_chunks_fts.rowid
            WHERE knowledge_chunks_fts MATCH ?
            ORDER BY score ASC, kc.id ASC
            LIMIT ?
            "#,
        )
        .bind(match_query)
        .bind(limit)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to search knowledge chunks for '{}'", match_query))?;

        debug!("Full-text query '{}' matched {} chunks", match_query, chunks.len());
        Ok(chunks)
    }

    /// Opening chunk of each article, largest first
    #[inline]
    pub async fn first_chunks(pool: &SqlitePool, limit: i64) -> Result<Vec<RetrievedChunk>> {
        let chunks = sqlx::query_as::<_, RetrievedChunk>(
            r#"
            SELECT id,
                   article_id,
                   chunk_index,
                   headline,
                   section_heading,
                   chunk_text,
                   chunk_tokens,
                   chunk_char_length,
                   NULL AS score
            FROM knowledge_chunks
            WHERE chunk_index = 0
            ORDER BY chunk_tokens DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to load fallback chunks")?;

        Ok(chunks)
    }

    #[inline]
    pub async fn list_by_article(pool: &SqlitePool, article_id: i64) -> Result<Vec<KnowledgeChunk>> {
        let query = format!(
            "SELECT {} FROM knowledge_chunks WHERE article_id = ? ORDER BY chunk_index ASC",
            CHUNK_COLUMNS
        );
        let chunks = sqlx::query_as::<_, KnowledgeChunk>(&query)
            .bind(article_id)
            .fetch_all(pool)
            .await
            .context("Failed to list chunks for article")?;

        Ok(chunks)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks")
            .fetch_one(pool)
            .await
            .context("Failed to count knowledge chunks")
    }

    #[inline]
    pub async fn count_indexed(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks_fts")
            .fetch_one(pool)
            .await
            .context("Failed to count full-text rows")
    }

    #[inline]
    pub async fn statistics(pool: &SqlitePool) -> Result<KnowledgeBaseStatistics> {
        let total_articles = ArticleQueries::count(pool).await?;

        let active_articles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE active = 1")
            .fetch_one(pool)
            .await
            .context("Failed to count active articles")?;

        let (total_chunks, avg_chunk_tokens, max_chunk_tokens): (i64, Option<f64>, Option<i64>) =
            sqlx::query_as(
                "SELECT COUNT(*), AVG(chunk_tokens), MAX(chunk_tokens) FROM knowledge_chunks",
            )
            .fetch_one(pool)
            .await
            .context("Failed to aggregate chunk statistics")?;

        let indexed_chunks = Self::count_indexed(pool).await?;

        Ok(KnowledgeBaseStatistics {
            total_articles,
            active_articles,
            total_chunks,
            indexed_chunks,
            avg_chunk_tokens: avg_chunk_tokens.unwrap_or(0.0),
            max_chunk_tokens: max_chunk_tokens.unwrap_or(0),
        })
    }

    /// Remove every chunk, its full-text row and the id sequence
    #[inline]
    pub async fn delete_all(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query("DELETE FROM knowledge_chunks")
            .execute(&mut *conn)
            .await
            .context("Failed to delete knowledge chunks")?;

        sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'knowledge_chunks'")
            .execute(&mut *conn)
            .await
            .context("Failed to reset knowledge chunk sequence")?;

        sqlx::query("DELETE FROM knowledge_chunks_fts")
            .execute(&mut *conn)
            .await
            .context("Failed to clear full-text index")?;

        Ok(())
    }

    #[inline]
    pub async fn insert(conn: &mut SqliteConnection, chunk: &NewKnowledgeChunk) -> Result<i64> {
        let id = sqlx::query(
            r#"
            INSERT INTO knowledge_chunks (
                article_id, chunk_index, headline, section_heading, chunk_text,
                chunk_tokens, chunk_char_length, start_offset, end_offset
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(chunk.article_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.headline)
        .bind(&chunk.section_heading)
        .bind(&chunk.chunk_text)
        .bind(chunk.chunk_tokens)
        .bind(chunk.chunk_char_length)
        .bind(chunk.start_offset)
        .bind(chunk.end_offset)
        .execute(&mut *conn)
        .await
        .with_context(|| {
            format!(
                "Failed to insert chunk {} of article {}",
                chunk.chunk_index, chunk.article_id
            )
        })?
        .last_insert_rowid();

        Ok(id)
    }

    /// Stored chunk identities in article and chunk order
    #[inline]
    pub async fn list_keys(conn: &mut SqliteConnection) -> Result<Vec<StoredChunkKey>> {
        let keys = sqlx::query_as::<_, StoredChunkKey>(
            "SELECT id, article_id, chunk_index FROM knowledge_chunks ORDER BY article_id ASC, chunk_index ASC",
        )
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list stored chunk keys")?;

        Ok(keys)
    }

    #[inline]
    pub async fn insert_fts(
        conn: &mut SqliteConnection,
        id: i64,
        chunk: &NewKnowledgeChunk,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO knowledge_chunks_fts (rowid, chunk_text, headline, section_heading, article_id, chunk_index)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&chunk.chunk_text)
        .bind(&chunk.headline)
        .bind(chunk.section_heading.as_deref().unwrap_or_default())
        .bind(chunk.article_id)
        .bind(chunk.chunk_index)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to index chunk {}", id))?;

        Ok(())
    }
}
