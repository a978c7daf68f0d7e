use crate::matrix::TermMatrix;
use crate::tokenizer::Analyzer;
use crate::TermId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Fitted vocabulary and smoothed IDF weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfidfModel {
    pub vocabulary: HashMap<String, TermId>,
    /// Indexed by `TermId`.
    pub idf: Vec<f32>,
    pub analyzer: Analyzer,
}

impl TfidfModel {
    /// Fit on the given documents and return the model with one L2-normalized
    /// row per document, in input order.
    pub fn fit_transform<S: AsRef<str>>(docs: &[S], analyzer: Analyzer) -> (Self, TermMatrix) {
        let tokenized: Vec<Vec<String>> = docs.iter().map(|d| analyzer.tokenize(d.as_ref())).collect();

        // Sorted so column ids are the same on every build of the same corpus.
        let terms: BTreeSet<&str> = tokenized.iter().flatten().map(String::as_str).collect();
        let vocabulary: HashMap<String, TermId> = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i as TermId))
            .collect();

        let mut df = vec![0u32; vocabulary.len()];
        for tokens in &tokenized {
            let unique: BTreeSet<&String> = tokens.iter().collect();
            for t in unique {
                df[vocabulary[t.as_str()] as usize] += 1;
            }
        }
        let n = tokenized.len() as f32;
        let idf = df.iter().map(|&d| ((1.0 + n) / (1.0 + d as f32)).ln() + 1.0).collect();

        let model = Self { vocabulary, idf, analyzer };
        let mut matrix = TermMatrix::new(model.vocabulary_size());
        for tokens in &tokenized {
            matrix.push_row(&model.weigh(tokens));
        }
        (model, matrix)
    }

    pub fn vocabulary_size(&self) -> usize { self.vocabulary.len() }

    /// Project text into the fitted space. Unknown tokens are dropped.
    pub fn transform(&self, text: &str) -> Vec<(TermId, f32)> {
        self.weigh(&self.analyzer.tokenize(text))
    }

    /// Dense form of [`transform`](Self::transform), one slot per column.
    pub fn transform_dense(&self, text: &str) -> Vec<f32> {
        let mut dense = vec![0.0f32; self.vocabulary_size()];
        for (col, w) in self.transform(text) {
            dense[col as usize] = w;
        }
        dense
    }

    fn weigh(&self, tokens: &[String]) -> Vec<(TermId, f32)> {
        let mut tf: BTreeMap<TermId, u32> = BTreeMap::new();
        for t in tokens {
            if let Some(&tid) = self.vocabulary.get(t) {
                *tf.entry(tid).or_insert(0) += 1;
            }
        }
        let mut row: Vec<(TermId, f32)> = tf
            .into_iter()
            .map(|(tid, count)| (tid, count as f32 * self.idf[tid as usize]))
            .collect();
        let norm = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in row.iter_mut() { *w /= norm; }
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idf_is_smoothed() {
        let (model, _) = TfidfModel::fit_transform(&["graph tree", "graph"], Analyzer::default());
        let graph = model.idf[model.vocabulary["graph"] as usize];
        let tree = model.idf[model.vocabulary["tree"] as usize];
        // ln(3/3) + 1 and ln(3/2) + 1
        assert!((graph - 1.0).abs() < 1e-6);
        assert!((tree - (1.5f32.ln() + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn vocabulary_columns_are_sorted() {
        let (model, _) = TfidfModel::fit_transform(&["zebra apple mango"], Analyzer::default());
        assert_eq!(model.vocabulary["apple"], 0);
        assert_eq!(model.vocabulary["mango"], 1);
        assert_eq!(model.vocabulary["zebra"], 2);
    }

    #[test]
    fn transform_drops_unknown_tokens() {
        let (model, _) = TfidfModel::fit_transform(&["dynamic programming"], Analyzer::default());
        let v = model.transform("quantum programming");
        assert_eq!(v.len(), 1);
        assert!((v[0].1 - 1.0).abs() < 1e-6);
        assert!(model.transform("quantum").is_empty());
    }
}
