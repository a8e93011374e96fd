//! Score extraction from free-form agent output.
//!
//! Grammar: the first `Score:` marker, then optional whitespace, then one
//! whitespace-delimited token. The token counts as a score when it is a run
//! of ASCII digits, optionally followed by a `/<digits>` denominator or by
//! trailing punctuation (`.`, `,`, `;`, `:`, `)`, `!`). Anything else, or a
//! missing marker, scores 0. Scores above [`MAX_SCORE`] clamp to it.

/// Marker that precedes the numeric score in agent output.
pub const SCORE_MARKER: &str = "Score:";

/// Highest score the ranking accepts.
pub const MAX_SCORE: u8 = 10;

/// Extract the relevance score from `text`, defaulting to 0.
///
/// ```rust
/// use warm_ranker_core::score::extract_score;
///
/// assert_eq!(extract_score("Analysis... Score: 7 because of the title"), 7);
/// assert_eq!(extract_score("Score: 8/10"), 8);
/// assert_eq!(extract_score("no marker here"), 0);
/// assert_eq!(extract_score("Score: high"), 0);
/// ```
pub fn extract_score(text: &str) -> u8 {
    let Some(pos) = text.find(SCORE_MARKER) else {
        return 0;
    };
    let rest = &text[pos + SCORE_MARKER.len()..];
    let Some(token) = rest.split_whitespace().next() else {
        return 0;
    };
    parse_score_token(token).unwrap_or(0)
}

fn parse_score_token(token: &str) -> Option<u8> {
    let token = token.trim_end_matches(['.', ',', ';', ':', ')', '!']);
    let numerator = match token.split_once('/') {
        Some((num, denom)) => {
            if denom.is_empty() || !denom.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            num
        }
        None => token,
    };
    if numerator.is_empty() || !numerator.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Long digit runs overflow u64; treat them as "very high".
    let value = numerator.parse::<u64>().unwrap_or(u64::MAX);
    Some(value.min(MAX_SCORE as u64) as u8)
}

/// Arithmetic mean of `scores`; `0.0` when there are none.
pub fn average_score(scores: &[u8]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let total: u64 = scores.iter().map(|&s| s as u64).sum();
    total as f64 / scores.len() as f64
}
