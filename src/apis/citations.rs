//! Bluebook citation assembly from CourtListener cluster data.

use serde_json::Value;

/// Build a bluebook citation like `601 U.S. 416 (2024)` from a cluster's citations
/// and filing date.
///
/// Prefers the citation whose `type == 1` (the official reporter), falling back to the
/// first citation. Returns `None` when any component is missing.
pub fn build_bluebook_citation(citations: &[Value], date_filed: &str) -> Option<String> {
    if citations.is_empty() || date_filed.is_empty() {
        return None;
    }

    let primary = citations
        .iter()
        .find(|citation| citation.get("type").and_then(Value::as_i64) == Some(1))
        .unwrap_or(&citations[0]);

    let volume = scalar_to_string(primary.get("volume")?)?;
    let reporter = scalar_to_string(primary.get("reporter")?)?;
    let page = scalar_to_string(primary.get("page")?)?;
    let year = date_filed.split('-').next().filter(|y| !y.is_empty())?;

    Some(format!("{volume} {reporter} {page} ({year})"))
}

/// Stringify a citation component that may arrive as a JSON string or number.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_type_one_citation() {
        let citations = vec![
            json!({"type": 2, "volume": "144", "reporter": "S. Ct.", "page": "1474"}),
            json!({"type": 1, "volume": "601", "reporter": "U.S.", "page": "416"}),
        ];
        let citation = build_bluebook_citation(&citations, "2024-05-16");
        assert_eq!(citation.as_deref(), Some("601 U.S. 416 (2024)"));
    }

    #[test]
    fn falls_back_to_first_citation() {
        let citations = vec![json!({"type": 3, "volume": 598, "reporter": "U.S.", "page": 651})];
        let citation = build_bluebook_citation(&citations, "2023-06-30");
        assert_eq!(citation.as_deref(), Some("598 U.S. 651 (2023)"));
    }

    #[test]
    fn incomplete_components_yield_none() {
        let citations = vec![json!({"type": 1, "volume": "601", "reporter": "U.S."})];
        assert!(build_bluebook_citation(&citations, "2024-05-16").is_none());
        assert!(build_bluebook_citation(&[], "2024-05-16").is_none());
        let full = vec![json!({"type": 1, "volume": "601", "reporter": "U.S.", "page": "416"})];
        assert!(build_bluebook_citation(&full, "").is_none());
    }
}
