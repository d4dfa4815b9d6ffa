#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::chunking::{Article, Chunk};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct KnowledgeArticle {
    pub id: i64,
    pub headline: String,
    pub text: String,
    pub active: bool,
    pub created_date: NaiveDateTime,
}

impl KnowledgeArticle {
    /// The fields the chunker works on
    #[inline]
    pub fn to_article(&self) -> Article {
        Article {
            id: self.id,
            headline: self.headline.clone(),
            text: self.text.clone(),
        }
    }
}

/// Article as accepted by create and import; `id` is kept when given
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKnowledgeArticle {
    #[serde(default)]
    pub id: Option<i64>,
    pub headline: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct KnowledgeChunk {
    pub id: i64,
    pub article_id: i64,
    pub chunk_index: i64,
    pub headline: String,
    pub section_heading: Option<String>,
    pub chunk_text: String,
    pub chunk_tokens: i64,
    pub chunk_char_length: i64,
    pub start_offset: i64,
    pub end_offset: i64,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKnowledgeChunk {
    pub article_id: i64,
    pub chunk_index: i64,
    pub headline: String,
    pub section_heading: Option<String>,
    pub chunk_text: String,
    pub chunk_tokens: i64,
    pub chunk_char_length: i64,
    pub start_offset: i64,
    pub end_offset: i64,
}

impl From<&Chunk> for NewKnowledgeChunk {
    #[inline]
    fn from(chunk: &Chunk) -> Self {
        Self {
            article_id: chunk.article_id,
            chunk_index: chunk.chunk_index as i64,
            headline: chunk.headline.clone(),
            section_heading: chunk.section_heading.clone(),
            chunk_text: chunk.chunk_text.clone(),
            chunk_tokens: chunk.chunk_tokens as i64,
            chunk_char_length: chunk.chunk_char_length as i64,
            start_offset: chunk.start_offset as i64,
            end_offset: chunk.end_offset as i64,
        }
    }
}

/// Identity of a stored chunk, used to key full-text rows during a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct StoredChunkKey {
    pub id: i64,
    pub article_id: i64,
    pub chunk_index: i64,
}

/// A chunk returned to a retrieval caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RetrievedChunk {
    pub id: i64,
    pub article_id: i64,
    pub chunk_index: i64,
    pub headline: String,
    pub section_heading: Option<String>,
    pub chunk_text: String,
    pub chunk_tokens: i64,
    pub chunk_char_length: i64,
    /// BM25 rank from the full-text index, lower is better. `None` for
    /// fallback rows that did not come from a search.
    pub score: Option<f64>,
}

impl RetrievedChunk {
    #[inline]
    pub fn is_search_hit(&self) -> bool {
        self.score.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseStatistics {
    pub total_articles: i64,
    pub active_articles: i64,
    pub total_chunks: i64,
    pub indexed_chunks: i64,
    pub avg_chunk_tokens: f64,
    pub max_chunk_tokens: i64,
}

impl KnowledgeBaseStatistics {
    /// Every chunk row has exactly one full-text row
    #[inline]
    pub fn is_index_consistent(&self) -> bool {
        self.total_chunks == self.indexed_chunks
    }
}
