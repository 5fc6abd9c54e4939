//! Shared chunking primitives and per-document-type configuration.
//!
//! This module is document-type agnostic and provides the building blocks the SCOTUS
//! and Executive Order chunkers compose:
//!
//! - [`ChunkingConfig`] with environment overrides (`RAG_SCOTUS_*`, `RAG_EO_*`).
//! - Token counting via `tiktoken-rs` (`cl100k_base`), falling back to a 4-chars-per-token
//!   approximation when the tokenizer is unavailable.
//! - Whitespace normalization that preserves paragraph breaks.
//! - The sliding-window chunker ([`chunk_text_with_tokens`]).
//!
//! The window steps in characters (4 per token) and counts real tokens only at emit
//! time; tokenizer calls are expensive, which makes the 1.2× soft cap on the final
//! merged chunk a real bound rather than a theoretical one.

pub mod executive_orders;
pub mod scotus;

use std::env;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Errors raised while loading or validating chunking parameters.
#[derive(Debug, Error)]
pub enum ChunkingConfigError {
    /// An override environment variable failed to parse.
    #[error("Invalid value for {0}")]
    InvalidOverride(String),
    /// Token counts must be positive.
    #[error("Token counts must be positive")]
    NonPositiveTokens,
    /// `min_tokens` cannot exceed `max_tokens`.
    #[error("min_tokens cannot exceed max_tokens")]
    MinExceedsMax,
    /// `overlap_ratio` must lie in `[0, 1)`.
    #[error("overlap_ratio must be between 0 and 1 (exclusive)")]
    OverlapOutOfRange,
}

/// Chunking parameters for one document type.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Minimum tokens per chunk (tails below this are absorbed).
    pub min_tokens: usize,
    /// Target window size for the sliding window.
    pub target_tokens: usize,
    /// Maximum tokens per chunk (soft-capped at 1.2× for the final merge).
    pub max_tokens: usize,
    /// Fraction of `target_tokens` to overlap between adjacent chunks.
    pub overlap_ratio: f64,
}

impl ChunkingConfig {
    /// Validate and build a configuration.
    pub fn new(
        min_tokens: usize,
        target_tokens: usize,
        max_tokens: usize,
        overlap_ratio: f64,
    ) -> Result<Self, ChunkingConfigError> {
        if min_tokens == 0 || target_tokens == 0 || max_tokens == 0 {
            return Err(ChunkingConfigError::NonPositiveTokens);
        }
        if min_tokens > max_tokens {
            return Err(ChunkingConfigError::MinExceedsMax);
        }
        if !(0.0..1.0).contains(&overlap_ratio) {
            return Err(ChunkingConfigError::OverlapOutOfRange);
        }
        Ok(Self {
            min_tokens,
            target_tokens,
            max_tokens,
            overlap_ratio,
        })
    }

    /// Default parameters for Supreme Court opinions.
    pub fn scotus_defaults() -> Self {
        Self {
            min_tokens: 500,
            target_tokens: 600,
            max_tokens: 800,
            overlap_ratio: 0.15,
        }
    }

    /// Default parameters for Executive Orders.
    pub fn eo_defaults() -> Self {
        Self {
            min_tokens: 240,
            target_tokens: 340,
            max_tokens: 400,
            overlap_ratio: 0.10,
        }
    }

    /// SCOTUS configuration with `RAG_SCOTUS_*` environment overrides applied.
    pub fn scotus_from_env() -> Result<Self, ChunkingConfigError> {
        Self::from_env("RAG_SCOTUS", Self::scotus_defaults())
    }

    /// Executive Order configuration with `RAG_EO_*` environment overrides applied.
    pub fn eo_from_env() -> Result<Self, ChunkingConfigError> {
        Self::from_env("RAG_EO", Self::eo_defaults())
    }

    fn from_env(prefix: &str, defaults: Self) -> Result<Self, ChunkingConfigError> {
        let min_tokens = load_override(&format!("{prefix}_MIN_TOKENS"), defaults.min_tokens)?;
        let target_tokens =
            load_override(&format!("{prefix}_TARGET_TOKENS"), defaults.target_tokens)?;
        let max_tokens = load_override(&format!("{prefix}_MAX_TOKENS"), defaults.max_tokens)?;
        let overlap_key = format!("{prefix}_OVERLAP_RATIO");
        let overlap_ratio = match env::var(&overlap_key) {
            Ok(value) => value
                .parse()
                .map_err(|_| ChunkingConfigError::InvalidOverride(overlap_key))?,
            Err(_) => defaults.overlap_ratio,
        };
        Self::new(min_tokens, target_tokens, max_tokens, overlap_ratio)
    }

    /// Number of tokens to overlap between adjacent chunks.
    pub fn overlap_tokens(&self) -> usize {
        ((self.target_tokens as f64) * self.overlap_ratio).max(0.0) as usize
    }
}

fn load_override(key: &str, default: usize) -> Result<usize, ChunkingConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| ChunkingConfigError::InvalidOverride(key.to_string())),
        Err(_) => Ok(default),
    }
}

/// One size-bounded span of document text plus its section label.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Chunk text, whitespace-normalized.
    pub text: String,
    /// Free-form section label (e.g. `"Syllabus"`, `"Sec. 2 - Policy(a)"`).
    pub section_label: String,
    /// Token count of the chunk text at emit time.
    pub token_count: usize,
}

/// Count tokens using the `cl100k_base` encoding, approximating with `len / 4`
/// when the tokenizer cannot be constructed.
pub fn count_tokens(text: &str) -> usize {
    static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();
    let encoder = ENCODER.get_or_init(|| match cl100k_base() {
        Ok(bpe) => Some(bpe),
        Err(error) => {
            tracing::warn!(%error, "Tokenizer unavailable, falling back to chars/4 approximation");
            None
        }
    });

    match encoder {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => text.len() / 4,
    }
}

/// Normalize whitespace while preserving paragraph structure.
///
/// Trims the text and collapses runs of blank lines into a single paragraph break.
pub fn normalize_whitespace(text: &str) -> String {
    static BLANKS_RE: OnceLock<Regex> = OnceLock::new();
    let re = BLANKS_RE.get_or_init(|| Regex::new(r"\n\s*\n+").expect("blank-line regex"));
    re.replace_all(text.trim(), "\n\n").into_owned()
}

const CHARS_PER_TOKEN: usize = 4;

/// Chunk text with a sliding window and configurable overlap.
///
/// Emits chunks of roughly `target_tokens`, snapping window ends back to the last
/// sentence terminator found in the final 20% of the window, and absorbing a tail
/// smaller than `min_tokens` into the previous chunk (up to 1.2× `max_tokens`).
pub fn chunk_text_with_tokens(
    text: &str,
    section_label: &str,
    config: &ChunkingConfig,
    overlap_tokens: usize,
) -> Vec<Chunk> {
    let mut overlap_tokens = overlap_tokens;
    if overlap_tokens >= config.target_tokens {
        tracing::warn!(
            overlap_tokens,
            target_tokens = config.target_tokens,
            "Overlap exceeds target, clamping"
        );
        overlap_tokens = config.target_tokens.saturating_sub(1);
    }

    let text = normalize_whitespace(text);
    if text.is_empty() {
        return Vec::new();
    }

    let total_tokens = count_tokens(&text);
    if total_tokens <= config.min_tokens.max(config.target_tokens) {
        return vec![Chunk {
            text,
            section_label: section_label.to_string(),
            token_count: total_tokens,
        }];
    }

    let step_tokens = config.target_tokens.saturating_sub(overlap_tokens).max(1);
    let window_chars = config.target_tokens * CHARS_PER_TOKEN;
    let step_chars = step_tokens * CHARS_PER_TOKEN;
    let overlap_chars = overlap_tokens * CHARS_PER_TOKEN;
    let text_len = text.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text_len {
        let mut end = ceil_char_boundary(&text, (start + window_chars).min(text_len));
        let mut window = &text[start..end];

        // Snap back to a sentence boundary when one lands in the last 20% of the window.
        if end < text_len {
            if let Some(sentence_end) = last_sentence_end(window) {
                if sentence_end > window.len() * 4 / 5 {
                    end = start + sentence_end;
                    window = &text[start..end];
                }
            }
        }

        let token_count = count_tokens(window);
        let remainder = text[end..].trim();
        let remainder_tokens = if remainder.is_empty() {
            0
        } else {
            count_tokens(remainder)
        };

        if remainder_tokens > 0 && remainder_tokens < config.min_tokens && !chunks.is_empty() {
            let merged = text[start..].trim();
            let merged_tokens = count_tokens(merged);
            let soft_cap = (config.max_tokens as f64 * 1.2) as usize;
            if merged_tokens <= soft_cap {
                chunks.push(Chunk {
                    text: normalize_whitespace(merged),
                    section_label: section_label.to_string(),
                    token_count: merged_tokens,
                });
            } else {
                chunks.push(Chunk {
                    text: normalize_whitespace(window),
                    section_label: section_label.to_string(),
                    token_count,
                });
                chunks.push(Chunk {
                    text: normalize_whitespace(remainder),
                    section_label: section_label.to_string(),
                    token_count: remainder_tokens,
                });
            }
            break;
        }

        chunks.push(Chunk {
            text: normalize_whitespace(window),
            section_label: section_label.to_string(),
            token_count,
        });

        if overlap_tokens > 0 && end < text_len {
            let candidate = (start + step_chars).max(end.saturating_sub(overlap_chars));
            start = ceil_char_boundary(&text, candidate);
        } else {
            start = end;
        }

        // Forward progress: never re-open a window that ends where the last one did.
        if start + window_chars <= end {
            start = end;
        }
    }

    chunks
}

/// Position just past the last sentence terminator (`. `, `? `, `! `) in the window.
fn last_sentence_end(window: &str) -> Option<usize> {
    [". ", "? ", "! "]
        .iter()
        .filter_map(|terminator| window.rfind(terminator))
        .max()
        .map(|index| index + 2)
}

/// Round a byte index up to the next UTF-8 character boundary.
fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index.min(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(count: usize) -> String {
        (0..count)
            .map(|i| format!("Sentence number {i} discusses the statutory question. "))
            .collect()
    }

    #[test]
    fn config_rejects_invalid_parameters() {
        assert!(matches!(
            ChunkingConfig::new(0, 10, 20, 0.1),
            Err(ChunkingConfigError::NonPositiveTokens)
        ));
        assert!(matches!(
            ChunkingConfig::new(30, 10, 20, 0.1),
            Err(ChunkingConfigError::MinExceedsMax)
        ));
        assert!(matches!(
            ChunkingConfig::new(10, 10, 20, 1.0),
            Err(ChunkingConfigError::OverlapOutOfRange)
        ));
    }

    #[test]
    fn overlap_tokens_derive_from_ratio() {
        let config = ChunkingConfig::scotus_defaults();
        assert_eq!(config.overlap_tokens(), 90);
        let config = ChunkingConfig::eo_defaults();
        assert_eq!(config.overlap_tokens(), 34);
    }

    #[test]
    fn normalize_collapses_blank_runs_and_trims() {
        let text = "  First paragraph.\n\n\n   \nSecond paragraph.\nSame paragraph.  ";
        assert_eq!(
            normalize_whitespace(text),
            "First paragraph.\n\nSecond paragraph.\nSame paragraph."
        );
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let config = ChunkingConfig::scotus_defaults();
        let chunks = chunk_text_with_tokens("A short opinion.", "Opinion", &config, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_label, "Opinion");
        assert_eq!(chunks[0].text, "A short opinion.");
    }

    #[test]
    fn long_text_respects_soft_token_bound() {
        let config = ChunkingConfig::eo_defaults();
        let text = sentences(400);
        let chunks = chunk_text_with_tokens(&text, "Sec. 1", &config, config.overlap_tokens());
        assert!(chunks.len() > 1);
        let soft_cap = (config.max_tokens as f64 * 1.2) as usize;
        for chunk in &chunks {
            assert!(
                chunk.token_count <= soft_cap,
                "chunk of {} tokens exceeds soft cap {soft_cap}",
                chunk.token_count
            );
        }
    }

    #[test]
    fn chunking_is_idempotent_under_normalization() {
        let config = ChunkingConfig::eo_defaults();
        let text = format!("  {}\n\n\n\n{}", sentences(150), sentences(150));
        let direct = chunk_text_with_tokens(&text, "Sec. 1", &config, config.overlap_tokens());
        let normalized = chunk_text_with_tokens(
            &normalize_whitespace(&text),
            "Sec. 1",
            &config,
            config.overlap_tokens(),
        );
        assert_eq!(direct, normalized);
    }

    #[test]
    fn small_tail_is_absorbed_into_previous_chunk() {
        let config = ChunkingConfig::eo_defaults();
        let text = sentences(120);
        let chunks = chunk_text_with_tokens(&text, "Sec. 1", &config, 0);
        if let Some(last) = chunks.last() {
            // Any final chunk below min_tokens must be the only chunk.
            if chunks.len() > 1 {
                assert!(last.token_count >= config.min_tokens || chunks.len() == 1);
            }
        }
    }

    #[test]
    fn excessive_overlap_is_clamped_and_makes_progress() {
        // Clamped to target - 1, the window still advances and terminates.
        let config = ChunkingConfig::eo_defaults();
        let text = sentences(60);
        let chunks = chunk_text_with_tokens(&text, "Sec. 1", &config, config.target_tokens + 50);
        assert!(!chunks.is_empty());
        let reassembled_start = &chunks[0].text;
        assert!(text.starts_with(reassembled_start.split(' ').next().unwrap_or_default()));
    }

    #[test]
    fn multibyte_text_never_splits_a_character() {
        let config = ChunkingConfig::eo_defaults();
        let text = "Die Behörde prüft die Maßnahme gemäß § 12. ".repeat(150);
        let chunks = chunk_text_with_tokens(&text, "Sec. 1", &config, config.overlap_tokens());
        assert!(!chunks.is_empty());
        for chunk in chunks {
            assert!(chunk.text.chars().count() > 0);
        }
    }
}
