#[cfg(test)]
mod tests;

use std::sync::LazyLock;

use fancy_regex::Regex;

use super::tokens::{AVG_CHARS_PER_TOKEN, estimate_tokens};

static HEADING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+(.*)$").expect("heading pattern is valid"));

const SENTENCE_BREAKS: [&str; 4] = [". ", "! ", "? ", "; "];

/// Kind of a contiguous span of article text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Heading,
    Text,
}

/// A contiguous span of normalized article text
///
/// `start` and `end` are character offsets into the normalized body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Unify line endings, replace non-breaking spaces, strip trailing blanks
/// before newlines and trim the result
#[inline]
pub fn normalize_text(text: &str) -> String {
    let unified = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{a0}', " ");

    let mut normalized = String::with_capacity(unified.len());
    for (i, line) in unified.split('\n').enumerate() {
        if i > 0 {
            normalized.push('\n');
        }
        normalized.push_str(line.trim_end_matches([' ', '\t']));
    }

    normalized.trim().to_string()
}

/// Title of a markdown heading line, or `None` if the line is not a heading
#[inline]
pub fn heading_title(line: &str) -> Option<String> {
    HEADING_LINE
        .captures(line)
        .ok()
        .flatten()
        .and_then(|captures| captures.get(1))
        .map(|title| title.as_str().trim().to_string())
}

/// Split normalized text on blank-line runs and classify each piece
#[inline]
pub fn segment_text(normalized: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut piece_start_byte = 0;
    let mut piece_start_char = 0;
    let mut run_start_byte = 0;
    let mut run_len = 0;

    for (char_idx, (byte_idx, c)) in normalized.char_indices().enumerate() {
        if c == '\n' {
            if run_len == 0 {
                run_start_byte = byte_idx;
            }
            run_len += 1;
            continue;
        }

        if run_len >= 2 {
            add_piece(
                &mut segments,
                &normalized[piece_start_byte..run_start_byte],
                piece_start_char,
            );
            piece_start_byte = byte_idx;
            piece_start_char = char_idx;
        }
        run_len = 0;
    }

    add_piece(
        &mut segments,
        &normalized[piece_start_byte..],
        piece_start_char,
    );

    segments
}

/// Record one blank-line separated piece. Leading heading lines become
/// heading segments of their own; whatever follows them is body text.
fn add_piece(segments: &mut Vec<Segment>, raw: &str, global_start: usize) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }

    let leading = raw[..raw.len() - raw.trim_start().len()].chars().count();
    let mut offset = global_start + leading;
    let mut rest = trimmed;

    loop {
        let (line, remainder) = match rest.split_once('\n') {
            Some((line, remainder)) => (line, Some(remainder)),
            None => (rest, None),
        };

        if heading_title(line).is_none() {
            break;
        }

        let line_chars = line.chars().count();
        segments.push(Segment {
            kind: SegmentKind::Heading,
            text: line.to_string(),
            start: offset,
            end: offset + line_chars,
        });

        let Some(remainder) = remainder else {
            return;
        };
        offset += line_chars + 1;
        rest = remainder;
    }

    let body = rest.trim();
    if body.is_empty() {
        return;
    }

    let start = offset + rest[..rest.len() - rest.trim_start().len()].chars().count();
    segments.push(Segment {
        kind: SegmentKind::Text,
        text: body.to_string(),
        start,
        end: start + body.chars().count(),
    });
}

/// Split a text segment whose estimate exceeds `budget` into pieces that fit
///
/// Headings and segments that already fit are returned unchanged.
#[inline]
pub fn ensure_segment_size(segment: Segment, budget: usize) -> Vec<Segment> {
    if segment.kind == SegmentKind::Heading || estimate_tokens(&segment.text) <= budget {
        return vec![segment];
    }

    split_oversized_segment(&segment, budget.max(1))
}

fn split_oversized_segment(segment: &Segment, budget: usize) -> Vec<Segment> {
    let text = segment.text.as_str();
    let mut pieces = Vec::new();
    let mut cursor = 0;
    let mut cursor_char = 0;

    while cursor < text.len() {
        let rest = &text[cursor..];
        let leading = rest.len() - rest.trim_start().len();
        if leading == rest.len() {
            break;
        }
        cursor_char += rest[..leading].chars().count();
        cursor += leading;

        let rest = &text[cursor..];
        let cut = if estimate_tokens(rest.trim_end()) <= budget {
            rest.len()
        } else {
            find_cut(rest, budget)
        };

        let piece = rest[..cut].trim_end();
        let start = segment.start + cursor_char;
        pieces.push(Segment {
            kind: segment.kind,
            text: piece.to_string(),
            start,
            end: start + piece.chars().count(),
        });

        cursor_char += rest[..cut].chars().count();
        cursor += cut;
    }

    pieces
}

/// Byte length of the next piece of `rest`, which starts with a
/// non-whitespace character and does not fit `budget` as a whole
///
/// The longest fitting prefix within the character window is found by binary
/// search; a natural boundary inside that prefix wins over the raw offset.
fn find_cut(rest: &str, budget: usize) -> usize {
    let max_chars = budget.saturating_mul(AVG_CHARS_PER_TOKEN).max(1);
    let ends: Vec<usize> = rest
        .char_indices()
        .skip(1)
        .map(|(i, _)| i)
        .chain(std::iter::once(rest.len()))
        .take(max_chars)
        .collect();

    let fits = |chars: usize| estimate_tokens(rest[..ends[chars - 1]].trim_end()) <= budget;

    let (mut lo, mut hi) = (1, ends.len());
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    let limit = ends[lo - 1];
    natural_break(&rest[..limit]).unwrap_or(limit)
}

/// Preferred cut inside `window`: paragraph > sentence > line > whitespace,
/// accepted only past the middle of the window
fn natural_break(window: &str) -> Option<usize> {
    let half = window.len() / 2;

    if let Some(idx) = window.rfind("\n\n").filter(|&idx| idx > half) {
        return Some(idx);
    }

    let sentence = SENTENCE_BREAKS
        .iter()
        .filter_map(|pattern| window.rfind(pattern))
        .max()
        .filter(|&idx| idx > half);
    if let Some(idx) = sentence {
        return Some(idx + 1);
    }

    if let Some(idx) = window.rfind('\n').filter(|&idx| idx > half) {
        return Some(idx);
    }

    window.rfind(char::is_whitespace).filter(|&idx| idx > half)
}
