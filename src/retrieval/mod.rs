//! Guideline retrieval: knowledge-store abstraction plus a caching retriever.
//!
//! The retriever never fails a review. When the backing store is
//! unreachable it logs a warning and returns no snippets, and the caller
//! proceeds without guidelines.

pub mod http;
pub mod local;
pub mod query;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{self, GuidelineCache};
use crate::models::GuidelineSnippet;

/// Errors from a knowledge store.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("knowledge store unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected knowledge store response: {0}")]
    BadResponse(String),

    #[error("failed to read guideline file {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },
}

/// One raw result from a knowledge store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreHit {
    pub content: String,
    pub source: String,
    pub score: f64,
}

/// A searchable collection of guideline passages.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Name of the collection, part of the cache key.
    fn collection(&self) -> &str;

    /// Return up to `top_k` passages relevant to `text`.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<StoreHit>, RetrievalError>;
}

/// Where a lookup's snippets came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuidelineSource {
    Cache,
    Store,
    /// The store failed; the reason is kept for annotation.
    Unavailable(String),
    /// Retrieval is turned off or the query was empty.
    Disabled,
}

/// Snippets plus their provenance.
#[derive(Debug, Clone)]
pub struct GuidelineLookup {
    pub snippets: Vec<GuidelineSnippet>,
    pub source: GuidelineSource,
}

impl GuidelineLookup {
    fn empty(source: GuidelineSource) -> Self {
        Self {
            snippets: Vec::new(),
            source,
        }
    }
}

/// Cache-fronted guideline retriever.
pub struct GuidelineRetriever {
    store: Option<Arc<dyn KnowledgeStore>>,
    cache: Arc<GuidelineCache>,
    timeout: Duration,
}

impl GuidelineRetriever {
    pub fn new(store: Arc<dyn KnowledgeStore>, cache: Arc<GuidelineCache>) -> Self {
        Self {
            store: Some(store),
            cache,
            timeout: Duration::from_secs(10),
        }
    }

    /// A retriever with no store; every lookup is [`GuidelineSource::Disabled`].
    pub fn disabled(cache: Arc<GuidelineCache>) -> Self {
        Self {
            store: None,
            cache,
            timeout: Duration::from_secs(10),
        }
    }

    /// Bound each live store call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Snippets for `query`, ordered by descending relevance.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Vec<GuidelineSnippet> {
        self.lookup(query, top_k).await.snippets
    }

    /// Like [`retrieve`](Self::retrieve), but also reports where the snippets came from.
    pub async fn lookup(&self, query: &str, top_k: usize) -> GuidelineLookup {
        let Some(store) = &self.store else {
            return GuidelineLookup::empty(GuidelineSource::Disabled);
        };
        if query.trim().is_empty() || top_k == 0 {
            return GuidelineLookup::empty(GuidelineSource::Disabled);
        }

        let key = cache::cache_key(store.collection(), top_k, query);
        if let Some(hit) = self.cache.get(&key) {
            debug!(cache = "hit", snippets = hit.len(), "guideline lookup");
            return GuidelineLookup {
                snippets: hit.to_vec(),
                source: GuidelineSource::Cache,
            };
        }
        debug!(cache = "miss", "guideline lookup");

        let live = tokio::time::timeout(self.timeout, store.query(query, top_k)).await;
        let hits = match live {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(error = %e, "guideline retrieval failed, continuing without guidelines");
                return GuidelineLookup::empty(GuidelineSource::Unavailable(e.to_string()));
            }
            Err(_) => {
                let reason = format!("knowledge store timed out after {:?}", self.timeout);
                warn!(%reason, "guideline retrieval failed, continuing without guidelines");
                return GuidelineLookup::empty(GuidelineSource::Unavailable(reason));
            }
        };

        let snippets = rank_hits(hits, top_k);
        self.cache.insert(&key, snippets.clone());
        GuidelineLookup {
            snippets,
            source: GuidelineSource::Store,
        }
    }
}

/// Clamp scores into `[0, 1]`, sort by descending score, and truncate.
fn rank_hits(hits: Vec<StoreHit>, top_k: usize) -> Vec<GuidelineSnippet> {
    let mut snippets: Vec<GuidelineSnippet> = hits
        .into_iter()
        .filter(|h| !h.content.trim().is_empty())
        .map(|h| GuidelineSnippet {
            text: h.content,
            source_id: h.source,
            relevance_score: if h.score.is_nan() {
                0.0
            } else {
                h.score.clamp(0.0, 1.0)
            },
        })
        .collect();
    snippets.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| a.source_id.cmp(&b.source_id))
    });
    snippets.truncate(top_k);
    snippets
}
