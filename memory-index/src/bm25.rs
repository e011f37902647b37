//! Per-tenant BM25 inverted index (component B).

use memory_core::{EntityIdType, MemoryId};
use std::collections::HashMap;

/// Tokenize: lowercase, strip non-alphanumerics, drop tokens shorter than 2
/// chars.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|tok| tok.to_lowercase())
        .filter(|tok| tok.len() >= 2)
        .collect()
}

#[derive(Debug, Clone, Default)]
struct Posting {
    /// doc_id -> term frequency within that doc.
    term_freq: HashMap<MemoryId, u32>,
}

/// Okapi BM25 index over one tenant's documents.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    k1: f32,
    b: f32,
    postings: HashMap<String, Posting>,
    doc_lengths: HashMap<MemoryId, u32>,
    total_length: u64,
}

impl Bm25Index {
    pub fn new(k1: f32, b: f32) -> Self {
        Self {
            k1,
            b,
            postings: HashMap::new(),
            doc_lengths: HashMap::new(),
            total_length: 0,
        }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    fn avg_doc_len(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.doc_lengths.len() as f32
        }
    }

    /// Incrementally index one document, replacing it if already present.
    pub fn add(&mut self, doc_id: MemoryId, text: &str) {
        self.remove(doc_id);
        let tokens = tokenize(text);
        let len = tokens.len() as u32;
        let mut freqs: HashMap<String, u32> = HashMap::new();
        for tok in tokens {
            *freqs.entry(tok).or_insert(0) += 1;
        }
        for (term, freq) in freqs {
            self.postings
                .entry(term)
                .or_default()
                .term_freq
                .insert(doc_id, freq);
        }
        self.doc_lengths.insert(doc_id, len);
        self.total_length += len as u64;
    }

    /// Remove a document from the index if present.
    pub fn remove(&mut self, doc_id: MemoryId) {
        if let Some(len) = self.doc_lengths.remove(&doc_id) {
            self.total_length = self.total_length.saturating_sub(len as u64);
        }
        for posting in self.postings.values_mut() {
            posting.term_freq.remove(&doc_id);
        }
        self.postings.retain(|_, p| !p.term_freq.is_empty());
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.doc_lengths.len() as f32;
        let n_t = self
            .postings
            .get(term)
            .map(|p| p.term_freq.len())
            .unwrap_or(0) as f32;
        ((n - n_t + 0.5) / (n_t + 0.5) + 1.0).ln()
    }

    /// Score every candidate document against the query terms, returning
    /// `(doc_id, score)` sorted descending.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(MemoryId, f32)> {
        if self.doc_lengths.is_empty() {
            return Vec::new();
        }
        let terms = tokenize(query);
        let avgdl = self.avg_doc_len();
        let mut scores: HashMap<MemoryId, f32> = HashMap::new();

        for term in &terms {
            let Some(posting) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf(term);
            for (&doc_id, &freq) in &posting.term_freq {
                let doc_len = *self.doc_lengths.get(&doc_id).unwrap_or(&0) as f32;
                let freq = freq as f32;
                let denom = freq + self.k1 * (1.0 - self.b + self.b * doc_len / avgdl.max(1.0));
                let score = idf * (freq * (self.k1 + 1.0)) / denom.max(f32::EPSILON);
                *scores.entry(doc_id).or_insert(0.0) += score;
            }
        }

        let mut ranked: Vec<(MemoryId, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);
        ranked
    }
}
