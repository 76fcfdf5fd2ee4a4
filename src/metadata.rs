//! Structured material metadata and the deterministic path mapper.
//!
//! The same metadata record drives both the persisted material row and
//! the object-store destination. The mapper is pure: identical field
//! values always produce a byte-identical storage key, regardless of how
//! the record was constructed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Paper type that requires the solve-specific fields.
pub const SOLVE_PAPER_TYPE: &str = "solve-question-paper";

/// Metadata describing a contributed study material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredMetadata {
    pub semester: String,
    pub branch: String,
    pub subject: String,
    pub paper_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solve_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_or_year: Option<String>,
}

/// Validation failure for a metadata record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("metadata field '{0}' must not be empty")]
    EmptyField(&'static str),
    #[error("paperType '{SOLVE_PAPER_TYPE}' requires solveType and unitOrYear")]
    MissingSolveFields,
}

impl StructuredMetadata {
    /// Check the record invariants.
    pub fn validate(&self) -> Result<(), MetadataError> {
        for (name, value) in [
            ("semester", &self.semester),
            ("branch", &self.branch),
            ("subject", &self.subject),
            ("paperType", &self.paper_type),
        ] {
            if value.trim().is_empty() {
                return Err(MetadataError::EmptyField(name));
            }
        }
        if self.paper_type == SOLVE_PAPER_TYPE
            && (is_blank(&self.solve_type) || is_blank(&self.unit_or_year))
        {
            return Err(MetadataError::MissingSolveFields);
        }
        Ok(())
    }

    /// Derive the object-store key for this record.
    ///
    /// Field order is fixed by the schema:
    /// `semester/branch/subject/paperType[/solveType][/unitOrYear].pdf`.
    /// Each segment is sanitized so the key nests cleanly with no
    /// ambiguous characters.
    pub fn object_key(&self) -> String {
        let mut segments = vec![
            sanitize_segment(&self.semester),
            sanitize_segment(&self.branch),
            sanitize_segment(&self.subject),
            sanitize_segment(&self.paper_type),
        ];
        if let Some(solve_type) = &self.solve_type {
            if !solve_type.trim().is_empty() {
                segments.push(sanitize_segment(solve_type));
            }
        }
        if let Some(unit_or_year) = &self.unit_or_year {
            if !unit_or_year.trim().is_empty() {
                segments.push(sanitize_segment(unit_or_year));
            }
        }
        format!("{}.pdf", segments.join("/"))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Sanitize a metadata value into a path segment.
///
/// Whitespace runs collapse to a single `-`; anything outside
/// `[A-Za-z0-9._-]` is dropped. The result never contains `/`.
pub fn sanitize_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_separator = false;
    for ch in value.trim().chars() {
        if ch.is_whitespace() {
            pending_separator = !out.is_empty();
            continue;
        }
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            if pending_separator {
                out.push('-');
                pending_separator = false;
            }
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StructuredMetadata {
        StructuredMetadata {
            semester: "Semester 3".to_string(),
            branch: "Computer Science".to_string(),
            subject: "Database Systems".to_string(),
            paper_type: "question-paper".to_string(),
            solve_type: None,
            unit_or_year: None,
        }
    }

    #[test]
    fn object_key_is_deterministic() {
        let a = sample();
        // same values via a different construction path
        let b: StructuredMetadata = serde_json::from_str(
            r#"{"paperType":"question-paper","subject":"Database Systems",
                "branch":"Computer Science","semester":"Semester 3"}"#,
        )
        .unwrap();
        assert_eq!(a.object_key(), b.object_key());
        assert_eq!(
            a.object_key(),
            "Semester-3/Computer-Science/Database-Systems/question-paper.pdf"
        );
    }

    #[test]
    fn object_key_includes_solve_fields() {
        let mut metadata = sample();
        metadata.paper_type = SOLVE_PAPER_TYPE.to_string();
        metadata.solve_type = Some("unit wise".to_string());
        metadata.unit_or_year = Some("Unit 2".to_string());
        assert_eq!(
            metadata.object_key(),
            "Semester-3/Computer-Science/Database-Systems/solve-question-paper/unit-wise/Unit-2.pdf"
        );
    }

    #[test]
    fn sanitize_collapses_whitespace_and_drops_specials() {
        assert_eq!(sanitize_segment("  Data   Structures "), "Data-Structures");
        assert_eq!(sanitize_segment("a/b\\c?d"), "abcd");
        assert_eq!(sanitize_segment("unit_2.old-v1"), "unit_2.old-v1");
    }

    #[test]
    fn solve_paper_requires_both_fields() {
        let mut metadata = sample();
        metadata.paper_type = SOLVE_PAPER_TYPE.to_string();
        assert_eq!(metadata.validate(), Err(MetadataError::MissingSolveFields));

        metadata.solve_type = Some("unit-wise".to_string());
        assert_eq!(metadata.validate(), Err(MetadataError::MissingSolveFields));

        metadata.unit_or_year = Some("unit-1".to_string());
        assert_eq!(metadata.validate(), Ok(()));
    }

    #[test]
    fn empty_required_field_rejected() {
        let mut metadata = sample();
        metadata.subject = "   ".to_string();
        assert_eq!(metadata.validate(), Err(MetadataError::EmptyField("subject")));
    }
}
