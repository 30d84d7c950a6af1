//! Knowledge store over a directory of guideline documents.
//!
//! Every `.md` and `.txt` file under the directory is split into
//! paragraph chunks. A chunk's score is the fraction of distinct query
//! terms it contains.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use super::{KnowledgeStore, RetrievalError, StoreHit};

/// Paragraphs are merged into chunks up to this many characters.
const CHUNK_CHARS: usize = 800;

struct Chunk {
    source: String,
    content: String,
    terms: BTreeSet<String>,
}

pub struct LocalKnowledgeStore {
    collection: String,
    chunks: Vec<Chunk>,
}

impl LocalKnowledgeStore {
    /// Read and chunk every guideline document under `dir`.
    pub fn load(dir: &Path) -> Result<Self, RetrievalError> {
        let mut files: Vec<_> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("txt"))
            })
            .collect();
        files.sort();

        let mut chunks = Vec::new();
        for path in &files {
            let text = std::fs::read_to_string(path).map_err(|source| RetrievalError::ReadFile {
                path: path.display().to_string(),
                source,
            })?;
            let rel = path
                .strip_prefix(dir)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            for (i, content) in chunk_paragraphs(&text).into_iter().enumerate() {
                chunks.push(Chunk {
                    source: format!("{rel}#{}", i + 1),
                    terms: terms(&content),
                    content,
                });
            }
        }
        debug!(files = files.len(), chunks = chunks.len(), "loaded local guidelines");

        let collection = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local".to_string());

        Ok(Self { collection, chunks })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
impl KnowledgeStore for LocalKnowledgeStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<StoreHit>, RetrievalError> {
        let wanted = terms(text);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<StoreHit> = self
            .chunks
            .iter()
            .filter_map(|c| {
                let shared = c.terms.intersection(&wanted).count();
                (shared > 0).then(|| StoreHit {
                    content: c.content.clone(),
                    source: c.source.clone(),
                    score: shared as f64 / wanted.len() as f64,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.source.cmp(&b.source)));
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Lowercase alphanumeric words of three or more characters.
fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

fn chunk_paragraphs(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.len() + para.len() + 2 > CHUNK_CHARS {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
