//! Query path over an immutable, shared index snapshot.
//!
//! The service holds an `Arc<IndexState>` behind a short-lived lock. Searches
//! clone the `Arc` and run without any lock held; reloads build a complete new
//! state and swap the pointer, so a search sees either the old or the new
//! index and never a mix.

use crate::error::QueryError;
use crate::index::PersistedIndex;
use crate::persist::{load_index, IndexPaths};
use crate::ProblemRecord;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub similarity: f32,
}

/// A validated index, ready to serve queries.
#[derive(Debug)]
pub struct IndexSnapshot {
    index: PersistedIndex,
}

impl IndexSnapshot {
    pub fn new(index: PersistedIndex) -> Result<Self, QueryError> {
        index.check_consistency().map_err(QueryError::IndexUnavailable)?;
        Ok(Self { index })
    }

    pub fn records(&self) -> &[ProblemRecord] { &self.index.records }

    pub fn vocabulary_size(&self) -> usize { self.index.model.vocabulary_size() }

    /// Top `k` records by cosine similarity, best first. Records that share
    /// no weighted term with the query are left out entirely.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredResult>, QueryError> {
        if query.trim().is_empty() {
            return Err(QueryError::InvalidQuery);
        }
        let q = self.index.model.transform_dense(query);
        let scores = self.index.matrix.dot_rows(&q);

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().filter(|(_, s)| *s > 0.0).collect();
        // stable: equal scores keep record order
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(i, s)| {
                let r = &self.index.records[i];
                ScoredResult { title: r.title.clone(), url: r.url.clone(), tags: r.tags.clone(), similarity: s.min(1.0) }
            })
            .collect())
    }
}

#[derive(Debug)]
pub enum IndexState {
    Ready(Arc<IndexSnapshot>),
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IndexStatus {
    #[serde(rename = "ok")]
    Ready { records: usize, vocabulary: usize },
    #[serde(rename = "degraded")]
    Unavailable { error: String },
}

pub struct SearchService {
    state: RwLock<Arc<IndexState>>,
}

impl SearchService {
    /// Never fails: a load error or an inconsistent index puts the service in
    /// the unavailable state, reported on every search.
    pub fn initialize(loaded: anyhow::Result<PersistedIndex>) -> Self {
        let state = match loaded {
            Ok(index) => Self::validate(index),
            Err(e) => IndexState::Unavailable(format!("{e:#}")),
        };
        match &state {
            IndexState::Ready(snap) => tracing::info!(
                records = snap.records().len(),
                vocabulary = snap.vocabulary_size(),
                "search index loaded"
            ),
            IndexState::Unavailable(reason) => tracing::error!(%reason, "search index unavailable, serving degraded"),
        }
        Self { state: RwLock::new(Arc::new(state)) }
    }

    /// Load from an index directory, see [`initialize`](Self::initialize).
    pub fn open(paths: &IndexPaths) -> Self {
        Self::initialize(load_index(paths))
    }

    fn validate(index: PersistedIndex) -> IndexState {
        match IndexSnapshot::new(index) {
            Ok(snap) => IndexState::Ready(Arc::new(snap)),
            Err(QueryError::IndexUnavailable(reason)) => IndexState::Unavailable(reason),
            Err(e) => IndexState::Unavailable(e.to_string()),
        }
    }

    pub fn current(&self) -> Arc<IndexState> {
        self.state.read().clone()
    }

    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredResult>, QueryError> {
        match &*self.current() {
            IndexState::Ready(snap) => snap.search(query, k),
            IndexState::Unavailable(reason) => Err(QueryError::IndexUnavailable(reason.clone())),
        }
    }

    /// Validate a freshly built index and swap it in. On failure the current
    /// state is kept.
    pub fn replace(&self, index: PersistedIndex) -> Result<(), QueryError> {
        let snap = IndexSnapshot::new(index)?;
        *self.state.write() = Arc::new(IndexState::Ready(Arc::new(snap)));
        Ok(())
    }

    /// Reload from disk and swap in the result. On failure the current state
    /// is kept.
    pub fn reload(&self, paths: &IndexPaths) -> Result<IndexStatus, QueryError> {
        let index = load_index(paths).map_err(|e| QueryError::IndexUnavailable(format!("{e:#}")))?;
        self.replace(index)?;
        let status = self.status();
        tracing::info!(?status, "search index reloaded");
        Ok(status)
    }

    pub fn status(&self) -> IndexStatus {
        match &*self.current() {
            IndexState::Ready(snap) => IndexStatus::Ready {
                records: snap.records().len(),
                vocabulary: snap.vocabulary_size(),
            },
            IndexState::Unavailable(reason) => IndexStatus::Unavailable { error: reason.clone() },
        }
    }
}
