
pub mod segments;
pub mod tokens;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use segments::{Segment, SegmentKind, heading_title, normalize_text, segment_text};
pub use tokens::{estimate_tokens, is_within_token_limit};

pub const DEFAULT_MAX_TOKENS: usize = 380;
pub const DEFAULT_MIN_TOKENS: usize = 120;
pub const DEFAULT_OVERLAP_TOKENS: usize = 60;

/// Tokens reserved in every chunk for the `# headline` and `## section` lines
pub const HEADER_BUFFER_TOKENS: usize = 35;

/// A knowledge-base article as read from the article store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub headline: String,
    pub text: String,
}

/// A token-bounded passage of an article, ready to be persisted and indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub article_id: i64,
    /// Position of this chunk within its article, starting at 0
    pub chunk_index: usize,
    pub headline: String,
    /// Nearest heading preceding the chunk body
    pub section_heading: Option<String>,
    /// Headline, optional section heading and body joined by blank lines
    pub chunk_text: String,
    /// Estimated token count of `chunk_text`
    pub chunk_tokens: usize,
    /// Exact character length of `chunk_text`
    pub chunk_char_length: usize,
    /// Character offsets into the normalized article text
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Configuration for article chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound on estimated tokens per chunk
    pub max_tokens: usize,
    /// Chunks below this size are only emitted at hard boundaries
    pub min_tokens: usize,
    /// Trailing tokens of a chunk repeated at the start of the next one
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            min_tokens: DEFAULT_MIN_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
        }
    }
}

impl ChunkingConfig {
    /// Tokens available for body text once the header and overlap are reserved
    #[inline]
    pub fn body_budget(&self) -> usize {
        self.body_budget_with_header(HEADER_BUFFER_TOKENS)
    }

    /// Body budget for an article whose header lines cost `header_tokens`;
    /// never less than [`HEADER_BUFFER_TOKENS`] is reserved
    #[inline]
    pub fn body_budget_with_header(&self, header_tokens: usize) -> usize {
        self.max_tokens
            .saturating_sub(header_tokens.max(HEADER_BUFFER_TOKENS) + self.overlap_tokens)
            .max(1)
    }
}

/// Split an article into overlapping, token-bounded chunks
///
/// Never fails: an article with blank text yields no chunks, any other
/// article yields at least one.
#[inline]
pub fn chunk_article(article: &Article, config: &ChunkingConfig) -> Vec<Chunk> {
    let normalized = normalize_text(&article.text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let segments = segment_text(&normalized);
    let budget = config.body_budget_with_header(header_tokens(&article.headline, &segments));
    let mut builder = ChunkBuilder::new(article, config);

    for segment in segments
        .into_iter()
        .flat_map(|segment| segments::ensure_segment_size(segment, budget))
    {
        match segment.kind {
            SegmentKind::Heading => {
                let title = heading_title(&segment.text).unwrap_or_else(|| segment.text.clone());
                builder.start_section(title);
            }
            SegmentKind::Text => builder.push_text(segment, budget),
        }
    }

    let chunks = builder.finish();

    debug!(
        "Chunked article {} into {} chunks (avg {} tokens)",
        article.id,
        chunks.len(),
        chunks.iter().map(|c| c.chunk_tokens).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

/// A body segment waiting in the chunk buffer
#[derive(Debug, Clone)]
struct ChunkPart {
    text: String,
    start: usize,
    end: usize,
    tokens: usize,
    section_heading: Option<String>,
    /// Carried over from the previous chunk; not counted towards the budget
    overlap: bool,
}

struct ChunkBuilder<'a> {
    article: &'a Article,
    config: &'a ChunkingConfig,
    parts: Vec<ChunkPart>,
    active_tokens: usize,
    current_heading: Option<String>,
    chunks: Vec<Chunk>,
}

impl<'a> ChunkBuilder<'a> {
    fn new(article: &'a Article, config: &'a ChunkingConfig) -> Self {
        Self {
            article,
            config,
            parts: Vec::new(),
            active_tokens: 0,
            current_heading: None,
            chunks: Vec::new(),
        }
    }

    /// A heading is a hard boundary: emit whatever is buffered, drop any
    /// overlap and continue under the new section
    fn start_section(&mut self, title: String) {
        self.drain();
        self.parts.clear();
        self.active_tokens = 0;
        self.current_heading = Some(title);
    }

    fn push_text(&mut self, segment: Segment, budget: usize) {
        let tokens = estimate_tokens(&segment.text);

        let over_budget = self.active_tokens + tokens > budget || !self.fits_with(&segment.text);
        if over_budget && self.has_active_parts() && !self.flush(false) {
            debug!(
                "Emitting chunk below {} tokens for article {} at budget boundary",
                self.config.min_tokens, self.article.id
            );
            self.flush(true);
        }

        self.parts.push(ChunkPart {
            text: segment.text,
            start: segment.start,
            end: segment.end,
            tokens,
            section_heading: self.current_heading.clone(),
            overlap: false,
        });
        self.active_tokens += tokens;
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.drain();
        self.chunks
    }

    /// Emit everything buffered, including parts a flush held back
    fn drain(&mut self) {
        while self.flush(true) {}
    }

    fn has_active_parts(&self) -> bool {
        self.parts.iter().any(|part| !part.overlap)
    }

    /// Heading shown in the next chunk: that of its first part, else the
    /// current section
    fn chunk_section(&self) -> Option<String> {
        self.parts
            .iter()
            .find_map(|part| part.section_heading.clone())
            .or_else(|| self.current_heading.clone())
    }

    /// Whether the buffered chunk with `text` appended, separators and
    /// header included, stays within `max_tokens`
    fn fits_with(&self, text: &str) -> bool {
        let section_heading = self.chunk_section();
        let body = self
            .parts
            .iter()
            .map(|part| part.text.as_str())
            .chain(std::iter::once(text))
            .join("\n\n");
        let chunk_text =
            build_chunk_text(&self.article.headline, section_heading.as_deref(), &body);

        estimate_tokens(&chunk_text) <= self.config.max_tokens
    }

    /// Emit the buffered parts as a chunk. Returns false when nothing was
    /// emitted, either because only overlap is buffered or because the chunk
    /// would be smaller than `min_tokens` and `force` is unset.
    fn flush(&mut self, force: bool) -> bool {
        if !self.has_active_parts() {
            return false;
        }

        let section_heading = self.chunk_section();
        let render = |parts: &[ChunkPart]| {
            let body = parts.iter().map(|part| part.text.as_str()).join("\n\n");
            let text = build_chunk_text(&self.article.headline, section_heading.as_deref(), &body);
            let tokens = estimate_tokens(&text);
            (text, tokens)
        };

        // Carried overlap is the first thing to give up if the chunk runs
        // past the limit, then trailing parts are held for the next chunk
        let mut first = 0;
        let mut last = self.parts.len();
        let (chunk_text, chunk_tokens) = loop {
            let (text, tokens) = render(&self.parts[first..last]);
            if tokens <= self.config.max_tokens {
                break (text, tokens);
            }
            if self.parts[first].overlap {
                first += 1;
            } else if self.parts[first..last].iter().filter(|part| !part.overlap).count() > 1 {
                last -= 1;
            } else {
                break (text, tokens);
            }
        };

        if !force && chunk_tokens < self.config.min_tokens {
            return false;
        }

        let held = self.parts.split_off(last);
        let parts = self.parts.split_off(first);
        let start_offset = parts.first().map_or(0, |part| part.start);
        let end_offset = parts.last().map_or(start_offset, |part| part.end);

        self.chunks.push(Chunk {
            article_id: self.article.id,
            chunk_index: self.chunks.len(),
            headline: self.article.headline.clone(),
            section_heading,
            chunk_char_length: chunk_text.chars().count(),
            chunk_text,
            chunk_tokens,
            start_offset,
            end_offset,
        });

        self.active_tokens = held.iter().map(|part| part.tokens).sum();
        self.parts = carry_overlap(&parts, self.config.overlap_tokens);
        self.parts.extend(held);

        true
    }
}

/// Upper bound on what the `# headline` and `## section` lines add to a
/// chunk, separators included, over every section of the article
fn header_tokens(headline: &str, segments: &[Segment]) -> usize {
    let headline_tokens = estimate_tokens(&format!("# {}", headline.trim())) + 1;
    let section_tokens = segments
        .iter()
        .filter(|segment| segment.kind == SegmentKind::Heading)
        .map(|segment| {
            let title = heading_title(&segment.text).unwrap_or_else(|| segment.text.clone());
            estimate_tokens(&format!("## {}", title.trim())) + 1
        })
        .max()
        .unwrap_or(0);

    headline_tokens + section_tokens
}

fn build_chunk_text(headline: &str, section_heading: Option<&str>, body: &str) -> String {
    let body = body.trim();
    let mut lines = vec![format!("# {}", headline.trim())];

    if let Some(section) = section_heading.filter(|_| !body.starts_with('#')) {
        lines.push(format!("## {}", section.trim()));
    }

    if !body.is_empty() {
        lines.push(body.to_string());
    }

    lines.join("\n\n")
}

/// Trailing parts of a flushed chunk that seed the next one, up to `budget`
/// estimated tokens. The oldest part taken may be cut to a suffix.
fn carry_overlap(parts: &[ChunkPart], budget: usize) -> Vec<ChunkPart> {
    let mut carried = Vec::new();
    let mut remaining = budget;

    for part in parts.iter().rev() {
        if remaining == 0 {
            break;
        }

        if part.tokens <= remaining {
            remaining -= part.tokens;
            carried.push(ChunkPart {
                overlap: true,
                ..part.clone()
            });
            continue;
        }

        if let Some(tail) = trailing_part(part, remaining) {
            carried.push(tail);
        }
        break;
    }

    carried.reverse();
    carried
}

/// Longest suffix of `part` whose estimate fits `budget`, moved forward to
/// the next word start when the cut lands inside a word
fn trailing_part(part: &ChunkPart, budget: usize) -> Option<ChunkPart> {
    let text = part.text.as_str();
    let starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    if starts.is_empty() {
        return None;
    }

    let fits = |idx: usize| estimate_tokens(text[starts[idx]..].trim_start()) <= budget;

    let (mut lo, mut hi) = (0, starts.len() - 1);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if fits(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    if !fits(lo) {
        return None;
    }

    let mut cut = starts[lo];
    let mid_word = text[..cut]
        .chars()
        .next_back()
        .is_some_and(|c| !c.is_whitespace());
    let next_word = text[cut..]
        .find(char::is_whitespace)
        .map(|ws| cut + ws)
        .filter(|&ws| !text[ws..].trim().is_empty());
    if let Some(ws) = next_word.filter(|_| mid_word) {
        cut = ws;
    }

    let suffix = text[cut..].trim_start();
    let skipped = text.len() - suffix.len();
    let start = part.start + text[..skipped].chars().count();

    Some(ChunkPart {
        text: suffix.to_string(),
        start,
        end: part.end,
        tokens: estimate_tokens(suffix),
        section_heading: part.section_heading.clone(),
        overlap: true,
    })
}
