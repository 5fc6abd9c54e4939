//! Section-aware chunking for Supreme Court opinions.
//!
//! Opinions are split along their legal structure before the sliding window runs:
//! Syllabus, majority, concurrences, dissents, and concur-in-part/dissent-in-part
//! sections, each optionally subdivided by the Court's indented section markers
//! (Roman numerals, capital letters, Arabic numerals at 20+ leading spaces).
//! Overlap applies within a section or subsection, never across boundaries. The
//! Syllabus body is returned separately for the LLM extraction stage.

use std::sync::OnceLock;

use regex::Regex;

use super::{Chunk, ChunkingConfig, chunk_text_with_tokens};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SectionKind {
    Syllabus,
    Majority,
    Concurring,
    Dissenting,
    ConcurDissent,
}

impl SectionKind {
    fn label(self) -> &'static str {
        match self {
            Self::Syllabus => "Syllabus",
            Self::Majority => "Majority Opinion",
            Self::Concurring => "Concurring Opinion",
            Self::Dissenting => "Dissenting Opinion",
            Self::ConcurDissent => "Concurring in Part, Dissenting in Part",
        }
    }

    /// Priority when two patterns match at the same offset; the most specific wins.
    fn specificity(self) -> u8 {
        match self {
            Self::ConcurDissent => 2,
            _ => 1,
        }
    }
}

fn syllabus_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)^\s*SYLLABUS\s*$").expect("syllabus regex"))
}

fn majority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?mi)^\s*(?:(?:Per Curiam\.)|(?:JUSTICE\s+[A-Z][A-Za-z\-]+\s+delivered the opinion of the Court\.?)|(?:Opinion of the Court))",
        )
        .expect("majority regex")
    })
}

fn concurring_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^\s*JUSTICE\s+[A-Z][A-Za-z\-]+,\s+(?:with whom.*?joins?,\s+)?concurring")
            .expect("concurring regex")
    })
}

fn dissenting_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^\s*JUSTICE\s+[A-Z][A-Za-z\-]+,\s+(?:with whom.*?joins?,\s+)?dissenting")
            .expect("dissenting regex")
    })
}

fn concur_dissent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?mi)^\s*JUSTICE\s+[A-Z][A-Za-z\-]+,\s+(?:with whom.*?joins?,\s+)?concurring in part and dissenting in part",
        )
        .expect("concur-dissent regex")
    })
}

fn subsection_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s{20,}(?:[IVX]+|[A-Z]|\d+)\s*$").expect("subsection regex"))
}

/// Chunk a Supreme Court opinion with section awareness.
///
/// Returns the ordered chunks and, when a Syllabus header was found, the Syllabus
/// body (the lines after the header) for use by the LLM extraction stage.
pub fn chunk_supreme_court_opinion(
    text: &str,
    config: &ChunkingConfig,
) -> (Vec<Chunk>, Option<String>) {
    let overlap = config.overlap_tokens();
    let mut sections: Vec<(SectionKind, usize)> = Vec::new();

    if let Some(found) = syllabus_re().find(text) {
        sections.push((SectionKind::Syllabus, found.start()));
    }
    if let Some(found) = majority_re().find(text) {
        sections.push((SectionKind::Majority, found.start()));
    }
    for found in concurring_re().find_iter(text) {
        sections.push((SectionKind::Concurring, found.start()));
    }
    for found in dissenting_re().find_iter(text) {
        sections.push((SectionKind::Dissenting, found.start()));
    }
    for found in concur_dissent_re().find_iter(text) {
        sections.push((SectionKind::ConcurDissent, found.start()));
    }

    // A concur-in-part line also matches the plain concurring pattern at the same
    // offset; keep the most specific kind per position.
    sections.sort_by(|a, b| {
        a.1.cmp(&b.1)
            .then(b.0.specificity().cmp(&a.0.specificity()))
    });
    sections.dedup_by_key(|section| section.1);

    if sections.is_empty() {
        tracing::warn!("No section markers found in Supreme Court opinion");
        return (chunk_text_with_tokens(text, "Opinion", config, overlap), None);
    }

    let mut chunks = Vec::new();
    let mut syllabus_text = None;

    for (index, &(kind, start)) in sections.iter().enumerate() {
        let end = sections
            .get(index + 1)
            .map(|&(_, next)| next)
            .unwrap_or(text.len());
        let section_text = text[start..end].trim();
        if section_text.is_empty() {
            continue;
        }

        if kind == SectionKind::Syllabus {
            let body = section_text
                .split_once('\n')
                .map(|(_, rest)| rest.trim())
                .unwrap_or("");
            if !body.is_empty() {
                syllabus_text = Some(body.to_string());
            }
        }

        chunks.extend(chunk_section(section_text, kind.label(), config, overlap));
    }

    tracing::info!(
        chunks = chunks.len(),
        sections = sections.len(),
        "Chunked Supreme Court opinion"
    );

    (chunks, syllabus_text)
}

/// Chunk one section, splitting on indented subsection markers when more than one
/// is present. Each subsection is chunked independently so overlap never crosses
/// a subsection boundary.
fn chunk_section(
    section_text: &str,
    section_label: &str,
    config: &ChunkingConfig,
    overlap: usize,
) -> Vec<Chunk> {
    let markers: Vec<_> = subsection_re().find_iter(section_text).collect();

    if markers.len() > 1 {
        let mut chunks = Vec::new();
        for (index, marker) in markers.iter().enumerate() {
            let start = marker.start();
            let end = markers
                .get(index + 1)
                .map(|next| next.start())
                .unwrap_or(section_text.len());
            let subsection_text = section_text[start..end].trim();
            if subsection_text.is_empty() {
                continue;
            }
            let marker_label = marker.as_str().trim();
            let label = format!("{section_label} - Part {marker_label}");
            chunks.extend(chunk_text_with_tokens(
                subsection_text,
                &label,
                config,
                overlap,
            ));
        }
        chunks
    } else {
        chunk_text_with_tokens(section_text, section_label, config, overlap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED_OPINION: &str = "SYLLABUS\n\nHeld: X.\n\nJUSTICE ROBERTS delivered the opinion of the Court.\n\n                    I\n\nAlpha.\n\n                    II\n\nBeta.";

    #[test]
    fn syllabus_and_majority_parts_are_labeled_in_order() {
        let config = ChunkingConfig::scotus_defaults();
        let (chunks, syllabus) = chunk_supreme_court_opinion(SEED_OPINION, &config);

        let labels: Vec<&str> = chunks.iter().map(|c| c.section_label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Syllabus",
                "Majority Opinion - Part I",
                "Majority Opinion - Part II"
            ]
        );
        assert_eq!(syllabus.as_deref(), Some("Held: X."));
    }

    #[test]
    fn chunk_order_follows_text_order() {
        let config = ChunkingConfig::scotus_defaults();
        let (chunks, _) = chunk_supreme_court_opinion(SEED_OPINION, &config);
        let alpha = chunks
            .iter()
            .position(|c| c.text.contains("Alpha"))
            .expect("Part I chunk");
        let beta = chunks
            .iter()
            .position(|c| c.text.contains("Beta"))
            .expect("Part II chunk");
        assert!(alpha < beta);
    }

    #[test]
    fn unmarked_text_falls_back_to_a_single_opinion_section() {
        let config = ChunkingConfig::scotus_defaults();
        let (chunks, syllabus) =
            chunk_supreme_court_opinion("Just some unstructured opinion text.", &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_label, "Opinion");
        assert!(syllabus.is_none());
    }

    #[test]
    fn per_curiam_marks_the_majority() {
        let config = ChunkingConfig::scotus_defaults();
        let text = "Per Curiam.\n\nThe judgment is affirmed.";
        let (chunks, _) = chunk_supreme_court_opinion(text, &config);
        assert_eq!(chunks[0].section_label, "Majority Opinion");
    }

    #[test]
    fn concurrence_and_dissent_sections_are_split() {
        let config = ChunkingConfig::scotus_defaults();
        let text = "JUSTICE ROBERTS delivered the opinion of the Court.\n\nMajority text.\n\nJUSTICE THOMAS, concurring.\n\nConcurring text.\n\nJUSTICE SOTOMAYOR, with whom JUSTICE KAGAN joins, dissenting.\n\nDissenting text.";
        let (chunks, _) = chunk_supreme_court_opinion(text, &config);
        let labels: Vec<&str> = chunks.iter().map(|c| c.section_label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Majority Opinion",
                "Concurring Opinion",
                "Dissenting Opinion"
            ]
        );
    }

    #[test]
    fn concur_in_part_dissent_in_part_wins_over_plain_concurring() {
        let config = ChunkingConfig::scotus_defaults();
        let text = "JUSTICE ROBERTS delivered the opinion of the Court.\n\nMajority text.\n\nJUSTICE GORSUCH, concurring in part and dissenting in part.\n\nMixed text.";
        let (chunks, _) = chunk_supreme_court_opinion(text, &config);
        let labels: Vec<&str> = chunks.iter().map(|c| c.section_label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Majority Opinion",
                "Concurring in Part, Dissenting in Part"
            ]
        );
    }

    #[test]
    fn adjacent_sections_never_share_overlapping_text() {
        let config = ChunkingConfig::scotus_defaults();
        let (chunks, _) = chunk_supreme_court_opinion(SEED_OPINION, &config);
        for pair in chunks.windows(2) {
            if pair[0].section_label != pair[1].section_label {
                assert!(!pair[1].text.starts_with(&pair[0].text));
            }
        }
    }
}
