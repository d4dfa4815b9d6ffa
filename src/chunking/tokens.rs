/// Rough number of characters per model token
pub const AVG_CHARS_PER_TOKEN: usize = 4;

/// Estimate token count using a simple heuristic
///
/// This is not a real tokenizer: it combines the character count divided by
/// [`AVG_CHARS_PER_TOKEN`] with half the number of whitespace-separated
/// pieces. Every threshold in the chunker and retriever is expressed in these
/// estimated tokens, so changing the formula moves chunk boundaries.
#[inline]
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let char_count = text.chars().count();
    let piece_count = count_whitespace_pieces(text);

    (piece_count as f64)
        .mul_add(0.5, char_count as f64 / AVG_CHARS_PER_TOKEN as f64)
        .ceil() as usize
}

#[inline]
pub fn is_within_token_limit(text: &str, max_tokens: usize) -> bool {
    estimate_tokens(text) <= max_tokens
}

/// Number of pieces produced by splitting on whitespace runs, counting the
/// empty pieces a leading or trailing run produces
fn count_whitespace_pieces(text: &str) -> usize {
    let mut pieces = 1;
    let mut in_whitespace = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                pieces += 1;
                in_whitespace = true;
            }
        } else {
            in_whitespace = false;
        }
    }

    pieces
}
