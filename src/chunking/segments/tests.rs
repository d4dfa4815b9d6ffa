use super::*;

#[test]
fn normalize_line_endings_and_whitespace() {
    assert_eq!(normalize_text("  a b \t\r\nc\r\rd  "), "a b\nc\n\nd");
    assert_eq!(normalize_text("Mensa\u{a0}Reichenbachstraße"), "Mensa Reichenbachstraße");
    assert_eq!(normalize_text(" \n\t \n"), "");
}

#[test]
fn heading_title_detection() {
    assert_eq!(heading_title("## Öffnungszeiten"), Some("Öffnungszeiten".to_string()));
    assert_eq!(heading_title("# Kontakt  "), Some("Kontakt".to_string()));
    assert_eq!(heading_title("###### Tief"), Some("Tief".to_string()));
    assert_eq!(heading_title("####### Zu tief"), None);
    assert_eq!(heading_title("#hashtag"), None);
    assert_eq!(heading_title("Kein # Titel"), None);
}

#[test]
fn segment_offsets_point_into_normalized_text() {
    let normalized = normalize_text("Intro\r\n\r\n## A\n# B\nText\tx \nmehr  \n\n\n\nEnde");
    let segments = segment_text(&normalized);

    let kinds: Vec<SegmentKind> = segments.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SegmentKind::Text,
            SegmentKind::Heading,
            SegmentKind::Heading,
            SegmentKind::Text,
            SegmentKind::Text,
        ]
    );

    let chars: Vec<char> = normalized.chars().collect();
    for segment in &segments {
        let span: String = chars[segment.start..segment.end].iter().collect();
        assert_eq!(span, segment.text);
    }

    assert_eq!(segments[3].text, "Text\tx\nmehr");
    assert_eq!((segments[4].start, segments[4].end), (31, 35));
}

#[test]
fn heading_with_body_on_following_line() {
    let segments = segment_text("## Preise\nStudierende zahlen 2,50 Euro.");

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].kind, SegmentKind::Heading);
    assert_eq!(segments[0].text, "## Preise");
    assert_eq!(segments[1].kind, SegmentKind::Text);
    assert_eq!(segments[1].text, "Studierende zahlen 2,50 Euro.");
    assert_eq!(segments[1].start, 10);
}

#[test]
fn small_segment_is_not_split() {
    let segment = Segment {
        kind: SegmentKind::Text,
        text: "Kurzer Absatz.".to_string(),
        start: 4,
        end: 18,
    };

    assert_eq!(ensure_segment_size(segment.clone(), 10), vec![segment]);
}

#[test]
fn oversized_segment_splits_at_sentence_boundaries() {
    let text = "Die Hochschule informiert über Fristen, Gebühren und Unterlagen für die Einschreibung. "
        .repeat(60);
    let text = text.trim();
    let segment = Segment {
        kind: SegmentKind::Text,
        text: text.to_string(),
        start: 100,
        end: 100 + text.chars().count(),
    };

    let pieces = ensure_segment_size(segment, 285);

    assert!(pieces.len() > 1);
    let chars: Vec<char> = text.chars().collect();
    for piece in &pieces {
        assert!(estimate_tokens(&piece.text) <= 285);
        assert!(piece.text.ends_with("Einschreibung."));
        let span: String = chars[piece.start - 100..piece.end - 100].iter().collect();
        assert_eq!(span, piece.text);
    }
}

#[test]
fn text_without_boundaries_falls_back_to_raw_offsets() {
    let text = "x".repeat(5000);
    let segment = Segment {
        kind: SegmentKind::Text,
        text: text.clone(),
        start: 0,
        end: 5000,
    };

    let pieces = ensure_segment_size(segment, 100);

    assert!(pieces.len() > 1);
    assert!(pieces.iter().all(|p| estimate_tokens(&p.text) <= 100));
    let rejoined: String = pieces.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(rejoined, text);
}

#[test]
fn headings_are_never_split() {
    let segment = Segment {
        kind: SegmentKind::Heading,
        text: format!("## {}", "Lang ".repeat(200)),
        start: 0,
        end: 1003,
    };

    assert_eq!(ensure_segment_size(segment, 10).len(), 1);
}
