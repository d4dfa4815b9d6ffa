use chrono::Utc;

use super::*;

#[test]
fn article_conversion_keeps_chunker_fields() {
    let article = KnowledgeArticle {
        id: 12,
        headline: "Mensa".to_string(),
        text: "## Preise\n\nStudierende zahlen 2,50 Euro.".to_string(),
        active: true,
        created_date: Utc::now().naive_utc(),
    };

    let converted = article.to_article();

    assert_eq!(converted.id, 12);
    assert_eq!(converted.headline, "Mensa");
    assert_eq!(converted.text, article.text);
}

#[test]
fn new_article_defaults_from_json() {
    let parsed: Vec<NewKnowledgeArticle> =
        serde_json::from_str(r#"[{"headline": "Bibliothek"}, {"id": 4, "headline": "Mensa", "text": "Essen", "active": false}]"#)
            .expect("should parse articles");

    assert_eq!(parsed[0].id, None);
    assert_eq!(parsed[0].text, "");
    assert!(parsed[0].active);
    assert_eq!(parsed[1].id, Some(4));
    assert!(!parsed[1].active);
}

#[test]
fn new_chunk_from_chunker_output() {
    let chunk = Chunk {
        article_id: 3,
        chunk_index: 2,
        headline: "Bibliothek".to_string(),
        section_heading: Some("Kontakt".to_string()),
        chunk_text: "# Bibliothek\n\n## Kontakt\n\nTel. 0351-123456.".to_string(),
        chunk_tokens: 14,
        chunk_char_length: 43,
        start_offset: 48,
        end_offset: 65,
    };

    let row = NewKnowledgeChunk::from(&chunk);

    assert_eq!(row.article_id, 3);
    assert_eq!(row.chunk_index, 2);
    assert_eq!(row.section_heading.as_deref(), Some("Kontakt"));
    assert_eq!(row.chunk_tokens, 14);
    assert_eq!((row.start_offset, row.end_offset), (48, 65));
}

#[test]
fn statistics_consistency() {
    let stats = KnowledgeBaseStatistics {
        total_articles: 3,
        active_articles: 2,
        total_chunks: 5,
        indexed_chunks: 5,
        avg_chunk_tokens: 120.5,
        max_chunk_tokens: 300,
    };
    assert!(stats.is_index_consistent());

    let stale = KnowledgeBaseStatistics {
        indexed_chunks: 4,
        ..stats
    };
    assert!(!stale.is_index_consistent());
}
