use serde::{Deserialize, Serialize};

pub mod error;
pub mod index;
pub mod matrix;
pub mod persist;
pub mod search;
pub mod tokenizer;
pub mod vectorizer;

pub use error::{BuildError, QueryError};
pub use index::{build, build_with, parse_corpus, PersistedIndex};
pub use matrix::TermMatrix;
pub use search::{IndexSnapshot, IndexState, IndexStatus, ScoredResult, SearchService};
pub use tokenizer::Analyzer;
pub use vectorizer::TfidfModel;

pub type TermId = u32;

/// Default number of results returned by a search.
pub const DEFAULT_K: usize = 10;

/// One scraped problem. `url` is the unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Scraped statement text. Not indexed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Site the problem came from, e.g. "codeforces".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ProblemRecord {
    pub fn new(title: impl Into<String>, url: impl Into<String>, tags: Vec<String>) -> Self {
        Self { title: title.into(), url: url.into(), tags, description: None, source: None }
    }

    /// Text the index is built from: title followed by the tags.
    pub fn document(&self) -> String {
        if self.tags.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.tags.join(" "))
        }
    }
}
