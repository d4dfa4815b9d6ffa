// Indexer module
// Rebuilds the chunk table and full-text index from the active articles

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunking::{ChunkingConfig, chunk_article};
use crate::database::sqlite::{ArticleQueries, Database, KnowledgeChunkQueries, NewKnowledgeChunk};
use crate::{KbError, Result};


/// Summary of a completed rebuild
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuildStats {
    pub article_count: usize,
    pub chunk_count: usize,
    pub avg_chunks_per_article: f64,
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

/// Replace every stored chunk with a fresh chunking of the active articles
///
/// Chunks, their full-text rows and the id sequence are replaced in a single
/// transaction, so readers see either the old or the new index. A mismatch
/// between the stored rows and the chunked payload aborts the rebuild and
/// leaves the previous index in place.
#[inline]
pub async fn rebuild_chunks(database: &Database, config: &ChunkingConfig) -> Result<RebuildStats> {
    info!(
        "Rebuilding knowledge chunks (max_tokens={}, overlap_tokens={})",
        config.max_tokens, config.overlap_tokens
    );

    let articles = ArticleQueries::list_active(database.pool()).await?;

    let payload: Vec<NewKnowledgeChunk> = articles
        .iter()
        .flat_map(|article| chunk_article(&article.to_article(), config))
        .map(|chunk| NewKnowledgeChunk::from(&chunk))
        .collect();

    debug!(
        "Chunked {} active articles into {} chunks",
        articles.len(),
        payload.len()
    );

    let mut transaction = database
        .pool()
        .begin()
        .await
        .context("Failed to begin rebuild transaction")?;

    KnowledgeChunkQueries::delete_all(&mut *transaction).await?;

    for chunk in &payload {
        KnowledgeChunkQueries::insert(&mut *transaction, chunk).await?;
    }

    let keys = KnowledgeChunkQueries::list_keys(&mut *transaction).await?;
    if keys.len() != payload.len() {
        return Err(KbError::Rebuild(format!(
            "Stored {} chunks but chunked {}",
            keys.len(),
            payload.len()
        )));
    }

    for (key, chunk) in keys.iter().zip(&payload) {
        if key.article_id != chunk.article_id || key.chunk_index != chunk.chunk_index {
            return Err(KbError::Rebuild(format!(
                "Stored chunk {} of article {} does not match chunk {} of article {}",
                key.chunk_index, key.article_id, chunk.chunk_index, chunk.article_id
            )));
        }
        KnowledgeChunkQueries::insert_fts(&mut *transaction, key.id, chunk).await?;
    }

    transaction
        .commit()
        .await
        .context("Failed to commit rebuild transaction")?;

    let article_count = articles.len();
    let chunk_count = payload.len();
    let avg_chunks_per_article = if article_count == 0 {
        0.0
    } else {
        chunk_count as f64 / article_count as f64
    };

    info!(
        "Rebuilt {} chunks for {} articles",
        chunk_count, article_count
    );

    Ok(RebuildStats {
        article_count,
        chunk_count,
        avg_chunks_per_article,
        max_tokens: config.max_tokens,
        overlap_tokens: config.overlap_tokens,
    })
}
