//! Section-aware chunking for Executive Orders.
//!
//! Orders are split into preamble, numbered sections (`Sec. 1.`, `Section 2.`),
//! lettered subsections (`(a)`, `(b)`), and roman-numeral subparagraphs (`(i)`,
//! `(ii)`). Every deepest non-empty unit is chunked independently, so overlap is
//! never applied across a section boundary even when two adjacent units are small.

use std::sync::OnceLock;

use regex::Regex;

use super::{Chunk, ChunkingConfig, chunk_text_with_tokens};

fn section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^\s*(Sec(?:tion)?\.?\s*\d+[A-Za-z\-]*\.)").expect("section regex")
    })
}

fn section_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+[A-Za-z\-]*").expect("section number regex"))
}

fn section_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Sec(?:tion)?\.?\s*\d+[A-Za-z\-]*\.\s*([^.]+)\.").expect("title regex")
    })
}

fn subsection_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([a-z])\)").expect("subsection regex"))
}

fn subparagraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*\((?:i|ii|iii|iv|v|vi|vii|viii|ix|x)+\)\s*").expect("subpara regex")
    })
}

/// Chunk an Executive Order with section awareness.
pub fn chunk_executive_order(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let overlap = config.overlap_tokens();
    let matches: Vec<_> = section_re().find_iter(text).collect();
    let mut chunks = Vec::new();

    if let Some(first) = matches.first() {
        let preamble = text[..first.start()].trim();
        if !preamble.is_empty() {
            chunks.extend(chunk_text_with_tokens(preamble, "Preamble", config, overlap));
        }
    }

    for (index, found) in matches.iter().enumerate() {
        let start = found.start();
        let end = matches
            .get(index + 1)
            .map(|next| next.start())
            .unwrap_or(text.len());
        let section_text = text[start..end].trim();
        if section_text.is_empty() {
            continue;
        }

        let header = found.as_str();
        let section_number = section_number_re()
            .find(header)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| (index + 1).to_string());
        let section_title = section_title_re()
            .captures(section_text)
            .map(|captures| captures[1].trim().to_string())
            .filter(|title| !title.is_empty());

        let section_label = match &section_title {
            Some(title) => format!("Sec. {section_number} - {title}"),
            None => format!("Sec. {section_number}"),
        };

        chunks.extend(chunk_section(section_text, &section_label, config, overlap));
    }

    if chunks.is_empty() {
        tracing::warn!("No section markers found in Executive Order");
        return chunk_text_with_tokens(text, "Executive Order", config, overlap);
    }

    tracing::info!(chunks = chunks.len(), "Chunked Executive Order");
    chunks
}

/// Find lettered subsection markers within one section.
///
/// Markers count only when they sit at a sentence boundary (line start or after
/// terminal punctuation) and continue the strict alphabetical chain starting at
/// `(a)`. The chain requirement keeps roman subparagraphs like `(i)` and stray
/// parentheticals in prose from opening a new subsection.
fn subsection_markers(section_text: &str) -> Vec<(usize, char)> {
    let mut expected = b'a';
    let mut markers = Vec::new();

    for captures in subsection_re().captures_iter(section_text) {
        let whole = captures.get(0).expect("capture 0 always present");
        let letter = captures[1].chars().next().expect("single letter capture");
        if letter as u8 != expected {
            continue;
        }
        if !at_sentence_boundary(section_text, whole.start()) {
            continue;
        }
        markers.push((whole.start(), letter));
        expected += 1;
    }

    markers
}

/// Whether a marker position follows a line start or terminal punctuation.
fn at_sentence_boundary(text: &str, position: usize) -> bool {
    let before = text[..position].trim_end_matches([' ', '\t']);
    if before.is_empty() || before.ends_with('\n') {
        return true;
    }
    matches!(before.chars().next_back(), Some('.' | ';' | ':'))
}

/// Chunk one numbered section, descending into lettered subsections and
/// roman-numeral subparagraphs when more than one is present.
fn chunk_section(
    section_text: &str,
    section_label: &str,
    config: &ChunkingConfig,
    overlap: usize,
) -> Vec<Chunk> {
    let subsections = subsection_markers(section_text);

    if subsections.len() <= 1 {
        return chunk_text_with_tokens(section_text, section_label, config, overlap);
    }

    let mut chunks = Vec::new();
    for (index, &(start, letter)) in subsections.iter().enumerate() {
        let end = subsections
            .get(index + 1)
            .map(|&(next_start, _)| next_start)
            .unwrap_or(section_text.len());
        let subsection_text = section_text[start..end].trim();
        if subsection_text.is_empty() {
            continue;
        }

        let subsection_label = format!("{section_label}({letter})");

        let subparagraphs: Vec<_> = subparagraph_re().find_iter(subsection_text).collect();
        if subparagraphs.len() > 1 {
            for (para_index, para) in subparagraphs.iter().enumerate() {
                let para_start = para.start();
                let para_end = subparagraphs
                    .get(para_index + 1)
                    .map(|next| next.start())
                    .unwrap_or(subsection_text.len());
                let para_text = subsection_text[para_start..para_end].trim();
                if para_text.is_empty() {
                    continue;
                }
                chunks.extend(chunk_text_with_tokens(
                    para_text,
                    &subsection_label,
                    config,
                    overlap,
                ));
            }
        } else {
            chunks.extend(chunk_text_with_tokens(
                subsection_text,
                &subsection_label,
                config,
                overlap,
            ));
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED_ORDER: &str = "By the authority vested in me as President, I hereby order:\n\nSection 1. Purpose. This order establishes test requirements.\n\nSec. 2. Policy. (a) Alpha.\n(b) Beta.\n    (i) Beta-one\n    (ii) Beta-two\n\nSec. 3. Implementation. Agencies shall act.";

    #[test]
    fn seed_order_yields_expected_labels() {
        let config = ChunkingConfig::eo_defaults();
        let chunks = chunk_executive_order(SEED_ORDER, &config);
        let labels: Vec<&str> = chunks.iter().map(|c| c.section_label.as_str()).collect();

        assert!(labels.contains(&"Preamble"));
        assert!(labels.contains(&"Sec. 1 - Purpose"));
        assert!(labels.contains(&"Sec. 2 - Policy(a)"));
        assert!(labels.contains(&"Sec. 2 - Policy(b)"));
        assert!(labels.contains(&"Sec. 3 - Implementation"));
    }

    #[test]
    fn no_chunk_crosses_a_section_boundary() {
        let config = ChunkingConfig::eo_defaults();
        let chunks = chunk_executive_order(SEED_ORDER, &config);
        for chunk in &chunks {
            let section_headers = chunk.text.matches("Sec. ").count()
                + chunk.text.matches("Section ").count();
            assert!(
                section_headers <= 1,
                "chunk spans multiple sections: {:?}",
                chunk.text
            );
        }
    }

    #[test]
    fn subparagraphs_stay_under_their_subsection_label() {
        let config = ChunkingConfig::eo_defaults();
        let chunks = chunk_executive_order(SEED_ORDER, &config);
        let beta_chunks: Vec<_> = chunks
            .iter()
            .filter(|c| c.section_label == "Sec. 2 - Policy(b)")
            .collect();
        assert!(!beta_chunks.is_empty());
        let combined: String = beta_chunks.iter().map(|c| c.text.as_str()).collect();
        assert!(combined.contains("Beta-one"));
        assert!(combined.contains("Beta-two"));
    }

    #[test]
    fn orders_without_sections_fall_back_to_one_unit() {
        let config = ChunkingConfig::eo_defaults();
        let chunks = chunk_executive_order("A proclamation with no numbered sections.", &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_label, "Executive Order");
    }

    #[test]
    fn subsection_chain_skips_roman_markers_and_prose_parentheticals() {
        let text = "(a) Alpha applies (see clause (b) above).\n(b) Beta.\n    (i) Beta-one\n";
        let markers = subsection_markers(text);
        let letters: Vec<char> = markers.iter().map(|&(_, letter)| letter).collect();
        assert_eq!(letters, vec!['a', 'b']);
    }

    #[test]
    fn ninth_subsection_letter_i_is_accepted_after_h() {
        let text = "(a) A.\n(b) B.\n(c) C.\n(d) D.\n(e) E.\n(f) F.\n(g) G.\n(h) H.\n(i) I.\n";
        let markers = subsection_markers(text);
        assert_eq!(markers.len(), 9);
        assert_eq!(markers.last().map(|&(_, letter)| letter), Some('i'));
    }

    #[test]
    fn preamble_comes_before_section_chunks() {
        let config = ChunkingConfig::eo_defaults();
        let chunks = chunk_executive_order(SEED_ORDER, &config);
        assert_eq!(chunks[0].section_label, "Preamble");
    }
}
