//! TF-IDF vectorizer with unigram + bigram terms and a capped vocabulary.
//!
//! Term weighting: raw counts times smoothed idf `ln((1 + n) / (1 + df)) + 1`,
//! each row L2-normalized. The vocabulary keeps the `max_features` terms with
//! the highest corpus frequency (ties broken alphabetically).

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// Tokens of two or more word characters.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid token regex"));

/// A sparse row: `(column, value)` pairs sorted by column.
pub type SparseRow = Vec<(usize, f32)>;

/// Fitted TF-IDF vectorizer.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    max_ngram: usize,
}

/// Lowercased word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// All n-grams from 1 to `max_n` over `tokens`, joined with single spaces.
fn ngrams(tokens: &[String], max_n: usize) -> Vec<String> {
    let mut grams = Vec::with_capacity(tokens.len() * max_n);
    for n in 1..=max_n {
        if tokens.len() < n {
            break;
        }
        for window in tokens.windows(n) {
            grams.push(window.join(" "));
        }
    }
    grams
}

impl TfidfVectorizer {
    /// Fit on `texts` and return the vectorizer together with the
    /// transformed corpus rows.
    pub fn fit_transform(texts: &[&str], max_features: usize, max_ngram: usize) -> (Self, Vec<SparseRow>) {
        let docs: Vec<Vec<String>> = texts
            .iter()
            .map(|t| ngrams(&tokenize(t), max_ngram))
            .collect();

        let mut term_freq: HashMap<&str, u64> = HashMap::new();
        let mut doc_freq: HashMap<&str, u64> = HashMap::new();
        for doc in &docs {
            let mut seen: HashSet<&str> = HashSet::new();
            for term in doc {
                *term_freq.entry(term.as_str()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(&str, u64)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_features);

        let mut kept: Vec<&str> = ranked.into_iter().map(|(t, _)| t).collect();
        kept.sort_unstable();

        let n_docs = docs.len() as f32;
        let mut vocabulary = HashMap::with_capacity(kept.len());
        let mut idf = Vec::with_capacity(kept.len());
        for (col, term) in kept.iter().enumerate() {
            let df = doc_freq.get(term).copied().unwrap_or(0) as f32;
            idf.push(((1.0 + n_docs) / (1.0 + df)).ln() + 1.0);
            vocabulary.insert(term.to_string(), col);
        }

        let vectorizer = Self {
            vocabulary,
            idf,
            max_ngram,
        };
        let rows = docs.iter().map(|d| vectorizer.weigh(d)).collect();
        (vectorizer, rows)
    }

    /// Number of vocabulary terms (columns).
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// Transform a text with the fitted vocabulary; unknown terms are ignored.
    pub fn transform(&self, text: &str) -> SparseRow {
        self.weigh(&ngrams(&tokenize(text), self.max_ngram))
    }

    fn weigh(&self, terms: &[String]) -> SparseRow {
        let mut counts: HashMap<usize, f32> = HashMap::new();
        for term in terms {
            if let Some(&col) = self.vocabulary.get(term) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseRow = counts
            .into_iter()
            .map(|(col, tf)| (col, tf * self.idf[col]))
            .collect();
        row.sort_unstable_by_key(|&(col, _)| col);

        let norm = row.iter().map(|(_, v)| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut row {
                *v /= norm;
            }
        }
        row
    }
}
