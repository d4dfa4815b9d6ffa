use super::*;
use anyhow::Result;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    Ok((temp_dir, database))
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (temp_dir, database) = create_test_database().await?;

    assert!(temp_dir.path().join("knowledge.db").exists());

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(database.pool())
    .await?;

    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    for expected in ["articles", "knowledge_chunks", "knowledge_chunks_fts"] {
        assert!(actual_tables.contains(expected), "missing table {}", expected);
    }

    Ok(())
}

#[tokio::test]
async fn integration_migrations_are_idempotent() -> Result<()> {
    let (temp_dir, database) = create_test_database().await?;
    database.run_migrations().await?;

    let reopened = Database::initialize_from_config_dir(temp_dir.path()).await?;
    assert_eq!(ArticleQueries::count(reopened.pool()).await?, 0);

    Ok(())
}

#[tokio::test]
async fn integration_foreign_key_constraints() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let article = database
        .save_article(NewKnowledgeArticle {
            id: None,
            headline: "Bibliothek".to_string(),
            text: "Mo-Fr 8-20 Uhr.".to_string(),
            active: true,
        })
        .await?;

    let chunk = NewKnowledgeChunk {
        article_id: article.id,
        chunk_index: 0,
        headline: "Bibliothek".to_string(),
        section_heading: None,
        chunk_text: "# Bibliothek\n\nMo-Fr 8-20 Uhr.".to_string(),
        chunk_tokens: 10,
        chunk_char_length: 29,
        start_offset: 0,
        end_offset: 15,
    };

    let mut conn = database.pool().acquire().await?;
    KnowledgeChunkQueries::insert(&mut conn, &chunk).await?;

    let orphan = NewKnowledgeChunk {
        article_id: article.id + 100,
        ..chunk
    };
    assert!(KnowledgeChunkQueries::insert(&mut conn, &orphan).await.is_err());
    drop(conn);

    assert_eq!(database.get_chunks_for_article(article.id).await?.len(), 1);

    ArticleQueries::delete(database.pool(), article.id).await?;
    assert!(database.get_chunks_for_article(article.id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn integration_chunk_store_search() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let article = database
        .save_article(NewKnowledgeArticle {
            id: Some(7),
            headline: "Parken".to_string(),
            text: String::new(),
            active: true,
        })
        .await?;

    let chunk = NewKnowledgeChunk {
        article_id: article.id,
        chunk_index: 0,
        headline: "Parken".to_string(),
        section_heading: Some("Tiefgarage".to_string()),
        chunk_text: "# Parken\n\n## Tiefgarage\n\nDie Tiefgarage ist werktags geoeffnet.".to_string(),
        chunk_tokens: 18,
        chunk_char_length: 63,
        start_offset: 0,
        end_offset: 40,
    };

    let mut conn = database.pool().acquire().await?;
    let id = KnowledgeChunkQueries::insert(&mut conn, &chunk).await?;
    KnowledgeChunkQueries::insert_fts(&mut conn, id, &chunk).await?;
    drop(conn);

    let hits = database.search_chunks("tiefgarage*", 6).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].section_heading.as_deref(), Some("Tiefgarage"));
    assert!(hits[0].score.is_some());

    let fallback = database.first_chunks(6).await?;
    assert_eq!(fallback.len(), 1);
    assert_eq!(fallback[0].score, None);

    database.optimize().await?;

    Ok(())
}
