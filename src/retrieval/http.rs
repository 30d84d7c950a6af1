//! Knowledge store backed by an HTTP search endpoint.
//!
//! The endpoint receives `POST {url}` with
//! `{"query": "...", "top_k": 3, "collection": "..."}` and answers with
//! either a bare array of hits or `{"results": [...]}`, each hit carrying
//! `content`, `source`, and `score`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{KnowledgeStore, RetrievalError, StoreHit};
use crate::constants::{APP_NAME, VERSION};

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
    collection: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Bare(Vec<StoreHit>),
    Wrapped { results: Vec<StoreHit> },
}

impl SearchResponse {
    fn into_hits(self) -> Vec<StoreHit> {
        match self {
            SearchResponse::Bare(hits) | SearchResponse::Wrapped { results: hits } => hits,
        }
    }
}

pub struct HttpKnowledgeStore {
    client: reqwest::Client,
    url: String,
    collection: String,
}

impl HttpKnowledgeStore {
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl KnowledgeStore for HttpKnowledgeStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<StoreHit>, RetrievalError> {
        let body = SearchRequest {
            query: text,
            top_k,
            collection: &self.collection,
        };

        let response = self
            .client
            .post(&self.url)
            .header("User-Agent", format!("{APP_NAME}/{VERSION}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(RetrievalError::Unreachable(format!(
                "search failed with HTTP {status}: {body}"
            )));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| RetrievalError::Unreachable(e.to_string()))?;
        parse_response(&raw)
    }
}

fn parse_response(raw: &str) -> Result<Vec<StoreHit>, RetrievalError> {
    serde_json::from_str::<SearchResponse>(raw)
        .map(SearchResponse::into_hits)
        .map_err(|e| RetrievalError::BadResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_and_wrapped_responses() {
        let bare = r#"[{"content": "Define terms early.", "source": "style#1", "score": 0.9}]"#;
        let wrapped = r#"{"results": [{"content": "Define terms early.", "source": "style#1", "score": 0.9}]}"#;
        assert_eq!(parse_response(bare).unwrap(), parse_response(wrapped).unwrap());
        assert_eq!(parse_response(bare).unwrap()[0].source, "style#1");
    }

    #[test]
    fn rejects_unexpected_shapes() {
        let err = parse_response(r#"{"hits": 3}"#).unwrap_err();
        assert!(matches!(err, RetrievalError::BadResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_reported() {
        // Port 9 on localhost is the discard service and is closed in practice.
        let store = HttpKnowledgeStore::new("http://127.0.0.1:9/search", "papers");
        let err = store.query("q", 3).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Unreachable(_)));
    }
}
