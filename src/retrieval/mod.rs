
pub mod cache;
pub mod query;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::database::sqlite::models::RetrievedChunk;
use crate::{KbError, Result};

pub use cache::RetrievalCache;
pub use query::{build_match_query, compose_query_text, normalize_query_text, query_terms};

pub const DEFAULT_LIMIT: usize = 6;
pub const MAX_QUERY_TERMS: usize = 12;
pub const CONTEXT_TURNS: usize = 2;

/// Source of indexed chunks the retriever searches
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Run a full-text match expression, best `limit` rows by ascending score
    async fn search_chunks(&self, match_query: &str, limit: usize) -> anyhow::Result<Vec<RetrievedChunk>>;

    /// Deterministic default context: the first chunk of each article,
    /// largest first
    async fn first_chunks(&self, limit: usize) -> anyhow::Result<Vec<RetrievedChunk>>;
}

/// Configuration for chunk retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks returned when the caller does not ask for a limit
    pub default_limit: usize,
    pub max_query_terms: usize,
    /// Recent user messages appended to the prompt
    pub context_turns: usize,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub search_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_query_terms: MAX_QUERY_TERMS,
            context_turns: CONTEXT_TURNS,
            cache_ttl_secs: cache::DEFAULT_CACHE_TTL.as_secs(),
            cache_capacity: cache::DEFAULT_CACHE_CAPACITY,
            search_timeout_ms: 5000,
        }
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[inline]
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }
}

/// One turn of the conversation a prompt belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub text: String,
    pub is_user: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetrievalRequest {
    pub prompt: String,
    pub conversation: Vec<ConversationMessage>,
    pub limit: Option<usize>,
    /// Bound on each store call; the retriever's configured timeout otherwise
    pub timeout: Option<Duration>,
}

impl RetrievalRequest {
    #[inline]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_conversation(mut self, conversation: Vec<ConversationMessage>) -> Self {
        self.conversation = conversation;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// FTS5 expression that was searched, `None` when no term survived
    pub match_query: Option<String>,
    pub from_cache: bool,
    /// The chunks are the default set rather than search hits
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retrieval {
    pub chunks: Vec<RetrievedChunk>,
    pub diagnostics: Diagnostics,
}

/// Lexical retriever over a [`ChunkStore`] with a per-instance result cache
pub struct Retriever<S> {
    store: S,
    cache: RetrievalCache,
    config: RetrievalConfig,
}

impl<S: ChunkStore> Retriever<S> {
    #[inline]
    pub fn new(store: S, config: RetrievalConfig) -> Self {
        let cache = RetrievalCache::new(config.cache_ttl(), config.cache_capacity);
        Self {
            store,
            cache,
            config,
        }
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[inline]
    pub fn cache(&self) -> &RetrievalCache {
        &self.cache
    }

    #[inline]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Chunks relevant to the prompt and its recent user turns
    ///
    /// Zero search hits, or a prompt without usable terms, yields the
    /// fallback set. Store failures and timeouts are returned as errors.
    #[inline]
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<Retrieval> {
        let limit = request.limit.unwrap_or(self.config.default_limit);
        let timeout = request
            .timeout
            .unwrap_or_else(|| self.config.search_timeout());

        let query_text = compose_query_text(
            &request.prompt,
            &request.conversation,
            self.config.context_turns,
        );

        let Some(match_query) = build_match_query(&query_text, self.config.max_query_terms) else {
            debug!("No usable query terms in prompt, using fallback chunks");
            let chunks = bounded(timeout, self.store.first_chunks(limit)).await?;
            return Ok(Retrieval {
                chunks,
                diagnostics: Diagnostics {
                    match_query: None,
                    from_cache: false,
                    fallback: true,
                },
            });
        };

        let cache_key = RetrievalCache::key(limit, &match_query);
        if let Some(cached) = self.cache.get(&cache_key).await {
            debug!("Retrieval cache hit for '{}'", match_query);
            return Ok(Retrieval {
                chunks: cached.chunks,
                diagnostics: Diagnostics {
                    match_query: Some(match_query),
                    from_cache: true,
                    fallback: cached.diagnostics.fallback,
                },
            });
        }

        let mut chunks = bounded(timeout, self.store.search_chunks(&match_query, limit)).await?;
        let fallback = chunks.is_empty();
        if fallback {
            warn!("No chunks matched '{}', using fallback chunks", match_query);
            chunks = bounded(timeout, self.store.first_chunks(limit)).await?;
        }

        let retrieval = Retrieval {
            chunks,
            diagnostics: Diagnostics {
                match_query: Some(match_query),
                from_cache: false,
                fallback,
            },
        };
        self.cache.insert(cache_key, retrieval.clone()).await;

        Ok(retrieval)
    }

    #[inline]
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }
}

async fn bounded<T>(
    limit: Duration,
    operation: impl Future<Output = anyhow::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result.map_err(|e| KbError::Database(format!("{:#}", e))),
        Err(_) => Err(KbError::Timeout(limit)),
    }
}
