use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::Config;
use crate::database::sqlite::{Database, NewKnowledgeArticle};
use crate::indexer::{RebuildStats, rebuild_chunks};
use crate::retrieval::{Retrieval, RetrievalRequest, Retriever};

/// Characters of chunk text shown per search result
const PREVIEW_CHARS: usize = 160;

#[inline]
pub async fn open_database(config: &Config) -> Result<Database> {
    Database::new(config.database_path())
        .await
        .context("Failed to initialize database")
}

/// Upsert articles from a JSON array of `{id, headline, text, active}`
#[inline]
pub async fn import_articles(config: &Config, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read article file: {}", path.display()))?;
    let articles: Vec<NewKnowledgeArticle> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse article file: {}", path.display()))?;

    let database = open_database(config).await?;

    let mut imported = 0;
    for article in articles {
        if article.headline.trim().is_empty() {
            warn!("Skipping article without headline (id {:?})", article.id);
            continue;
        }
        database.save_article(article).await?;
        imported += 1;
    }

    info!("Imported {} articles from {}", imported, path.display());
    println!("Imported {} articles", imported);

    Ok(imported)
}

/// Rebuild all chunks, optionally overriding the configured chunk sizes
#[inline]
pub async fn rebuild_index(
    config: &Config,
    max_tokens: Option<usize>,
    overlap_tokens: Option<usize>,
) -> Result<RebuildStats> {
    let mut config = config.clone();
    if let Some(max_tokens) = max_tokens {
        config.chunking.max_tokens = max_tokens;
    }
    if let Some(overlap_tokens) = overlap_tokens {
        config.chunking.overlap_tokens = overlap_tokens;
    }
    config
        .validate()
        .context("Invalid chunking options for rebuild")?;

    let database = open_database(&config).await?;

    let bar = if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    };
    bar.set_message("Rebuilding knowledge chunks");

    let result = rebuild_chunks(&database, &config.chunking).await;
    bar.finish_and_clear();
    let stats = result?;

    database.optimize().await?;

    println!("{}", style("Knowledge chunks rebuilt").bold().green());
    println!("  Articles: {}", stats.article_count);
    println!("  Chunks: {}", stats.chunk_count);
    println!(
        "  Avg chunks per article: {:.2}",
        stats.avg_chunks_per_article
    );
    println!("  Max tokens: {}", stats.max_tokens);
    println!("  Overlap tokens: {}", stats.overlap_tokens);

    Ok(stats)
}

/// Run a retrieval against the local knowledge base and print the result
#[inline]
pub async fn search(
    config: &Config,
    prompt: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<Retrieval> {
    let database = open_database(config).await?;
    let retriever = Retriever::new(database, config.retrieval.clone());

    let mut request = RetrievalRequest::new(prompt);
    if let Some(limit) = limit {
        request = request.with_limit(limit);
    }

    let retrieval = retriever.retrieve(&request).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&retrieval).context("Failed to serialize results")?
        );
        return Ok(retrieval);
    }

    let diagnostics = &retrieval.diagnostics;
    println!(
        "Query: {}",
        style(diagnostics.match_query.as_deref().unwrap_or("<none>")).cyan()
    );
    if diagnostics.fallback {
        println!("{}", style("No matches, showing default context").yellow());
    }

    if retrieval.chunks.is_empty() {
        println!("No chunks indexed. Run 'kb-search rebuild' first.");
        return Ok(retrieval);
    }

    for (rank, chunk) in retrieval.chunks.iter().enumerate() {
        println!();
        let section = chunk
            .section_heading
            .as_deref()
            .map(|heading| format!(" > {}", heading))
            .unwrap_or_default();
        println!(
            "{}. {}{} (article {}, chunk {})",
            rank + 1,
            style(&chunk.headline).bold(),
            section,
            chunk.article_id,
            chunk.chunk_index
        );
        if let Some(score) = chunk.score {
            println!("   Score: {:.4}", score);
        }
        println!("   {}", preview(&chunk.chunk_text));
    }

    Ok(retrieval)
}

/// Print article and chunk counts
#[inline]
pub async fn show_stats(config: &Config) -> Result<()> {
    let database = open_database(config).await?;
    let stats = database.statistics().await?;

    println!("{}", style("Knowledge Base Statistics").bold().cyan());
    println!(
        "  Articles: {} ({} active)",
        stats.total_articles, stats.active_articles
    );
    println!("  Chunks: {}", stats.total_chunks);
    println!("  Indexed chunks: {}", stats.indexed_chunks);
    println!("  Avg chunk tokens: {:.1}", stats.avg_chunk_tokens);
    println!("  Max chunk tokens: {}", stats.max_chunk_tokens);

    if !stats.is_index_consistent() {
        println!(
            "{}",
            style("Full-text index is out of sync, run 'kb-search rebuild'").red()
        );
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Max Tokens: {}", style(config.chunking.max_tokens).cyan());
    eprintln!("  Min Tokens: {}", style(config.chunking.min_tokens).cyan());
    eprintln!(
        "  Overlap Tokens: {}",
        style(config.chunking.overlap_tokens).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!(
        "  Default Limit: {}",
        style(config.retrieval.default_limit).cyan()
    );
    eprintln!(
        "  Max Query Terms: {}",
        style(config.retrieval.max_query_terms).cyan()
    );
    eprintln!(
        "  Context Turns: {}",
        style(config.retrieval.context_turns).cyan()
    );
    eprintln!(
        "  Cache TTL: {}s",
        style(config.retrieval.cache_ttl_secs).cyan()
    );
    eprintln!(
        "  Cache Capacity: {}",
        style(config.retrieval.cache_capacity).cyan()
    );
    eprintln!(
        "  Search Timeout: {}ms",
        style(config.retrieval.search_timeout_ms).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!("Database: {}", style(config.database_path().display()).dim());

    Ok(())
}

/// Write the current configuration, creating the file with defaults if absent
#[inline]
pub fn write_config(config: &Config) -> Result<()> {
    config.save()?;
    eprintln!(
        "{} {}",
        style("Configuration saved to").green(),
        config.config_file_path().display()
    );
    Ok(())
}

fn preview(text: &str) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= PREVIEW_CHARS {
        return flattened;
    }

    let mut preview: String = flattened.chars().take(PREVIEW_CHARS).collect();
    preview.push('…');
    preview
}
