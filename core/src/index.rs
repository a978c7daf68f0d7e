use crate::error::BuildError;
use crate::matrix::TermMatrix;
use crate::tokenizer::Analyzer;
use crate::vectorizer::TfidfModel;
use crate::ProblemRecord;
use serde::{Deserialize, Serialize};

/// Model, matrix and records. Row `i` of `matrix` belongs to `records[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedIndex {
    pub model: TfidfModel,
    pub matrix: TermMatrix,
    pub records: Vec<ProblemRecord>,
}

impl PersistedIndex {
    /// Cross-checks the three parts against each other.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.matrix.num_rows != self.records.len() {
            return Err(format!(
                "matrix has {} rows but there are {} records",
                self.matrix.num_rows,
                self.records.len()
            ));
        }
        if self.matrix.num_cols != self.model.vocabulary_size() {
            return Err(format!(
                "matrix has {} columns but the vocabulary has {} terms",
                self.matrix.num_cols,
                self.model.vocabulary_size()
            ));
        }
        if self.model.idf.len() != self.model.vocabulary_size() {
            return Err(format!(
                "{} idf weights for {} terms",
                self.model.idf.len(),
                self.model.vocabulary_size()
            ));
        }
        if let Some((term, col)) = self.model.vocabulary.iter().find(|(_, c)| **c as usize >= self.model.idf.len()) {
            return Err(format!("term {term:?} maps to column {col} which has no idf weight"));
        }
        self.matrix.validate()
    }
}

/// Build an index with the default analyzer.
pub fn build(records: &[ProblemRecord]) -> Result<PersistedIndex, BuildError> {
    build_with(records, Analyzer::default())
}

pub fn build_with(records: &[ProblemRecord], analyzer: Analyzer) -> Result<PersistedIndex, BuildError> {
    if records.is_empty() {
        return Err(BuildError::EmptyCorpus);
    }
    if let Some(index) = records.iter().position(|r| r.title.trim().is_empty()) {
        return Err(BuildError::malformed(index, "missing title"));
    }
    let docs: Vec<String> = records.iter().map(ProblemRecord::document).collect();
    let (model, matrix) = TfidfModel::fit_transform(&docs, analyzer);
    tracing::debug!(num_records = records.len(), vocabulary = model.vocabulary_size(), "fitted tf-idf model");
    Ok(PersistedIndex { model, matrix, records: records.to_vec() })
}

/// Parse a corpus JSON array, validating each element's shape.
pub fn parse_corpus(json: &str) -> Result<Vec<ProblemRecord>, BuildError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| BuildError::MalformedCorpus(e.to_string()))?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => return Err(BuildError::MalformedCorpus(format!("expected an array, found {}", kind(&other)))),
    };
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let obj = item
            .as_object()
            .ok_or_else(|| BuildError::malformed(index, format!("expected an object, found {}", kind(&item))))?;
        match obj.get("title") {
            Some(serde_json::Value::String(_)) => {}
            Some(_) => return Err(BuildError::malformed(index, "title is not a string")),
            None => return Err(BuildError::malformed(index, "missing title")),
        }
        if !matches!(obj.get("url"), Some(serde_json::Value::String(_))) {
            return Err(BuildError::malformed(index, "missing url"));
        }
        let record: ProblemRecord =
            serde_json::from_value(item).map_err(|e| BuildError::malformed(index, e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

fn kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(title: &str, url: &str, tags: &[&str]) -> ProblemRecord {
        ProblemRecord::new(title, url, tags.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn empty_corpus_is_rejected() {
        assert_eq!(build(&[]).unwrap_err(), BuildError::EmptyCorpus);
    }

    #[test]
    fn blank_title_is_malformed() {
        let err = build(&[rec("Two Sum", "u1", &[]), rec("  ", "u2", &["dp"])]).unwrap_err();
        assert_eq!(err, BuildError::malformed(1, "missing title"));
    }

    #[test]
    fn rows_follow_record_order_and_are_unit_norm() {
        let records = vec![
            rec("Binary Search Tree", "u1", &["tree", "search"]),
            rec("The", "u2", &[]),
            rec("Graph Coloring", "u3", &["graph", "greedy"]),
        ];
        let idx = build(&records).unwrap();
        assert_eq!(idx.records, records);
        assert_eq!(idx.matrix.num_rows, 3);
        assert!((idx.matrix.row_norm(0) - 1.0).abs() < 1e-5);
        // only stop words survive in "The"
        assert_eq!(idx.matrix.row_norm(1), 0.0);
        assert!((idx.matrix.row_norm(2) - 1.0).abs() < 1e-5);
        assert!(idx.check_consistency().is_ok());
    }

    #[test]
    fn build_is_idempotent() {
        let records = vec![rec("Longest Path", "u1", &["graph", "dp"]), rec("Knapsack", "u2", &["dp"])];
        assert_eq!(build(&records).unwrap(), build(&records).unwrap());
    }

    #[test]
    fn parse_reports_missing_title() {
        let err = parse_corpus(r#"[{"title":"A","url":"u1"},{"url":"u2","tags":[]}]"#).unwrap_err();
        assert_eq!(err, BuildError::malformed(1, "missing title"));
    }

    #[test]
    fn parse_rejects_non_array() {
        assert!(matches!(parse_corpus(r#"{"title":"A"}"#), Err(BuildError::MalformedCorpus(_))));
    }

    #[test]
    fn parse_accepts_optional_fields() {
        let records = parse_corpus(
            r#"[{"title":"A","url":"u1","tags":["x"],"description":"d","source":"codeforces"},{"title":"B","url":"u2"}]"#,
        )
        .unwrap();
        assert_eq!(records[0].source.as_deref(), Some("codeforces"));
        assert!(records[1].tags.is_empty());
    }

    #[test]
    fn inconsistent_triple_is_detected() {
        let mut idx = build(&[rec("Two Sum", "u1", &[])]).unwrap();
        idx.records.push(rec("Extra", "u2", &[]));
        assert!(idx.check_consistency().is_err());
    }
}
