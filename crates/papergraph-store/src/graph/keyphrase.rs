//! Unsupervised single-document keyphrase ranking (YAKE-style, unigrams).
//!
//! Each candidate term gets five statistical features computed from the
//! document alone: casing, position, frequency, relatedness to context and
//! spread across sentences. They combine into a score where lower means
//! more relevant.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+(\s+|$)|\n\s*\n").expect("valid sentence regex"));

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w][\w'\-]*").expect("valid word regex"));

const MIN_TERM_CHARS: usize = 3;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
        "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down",
        "during", "each", "et", "etc", "few", "for", "from", "further", "had", "has", "have",
        "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how",
        "however", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "may",
        "me", "might", "more", "most", "must", "my", "myself", "no", "nor", "not", "now",
        "of", "off", "on", "once", "one", "only", "or", "other", "our", "ours", "ourselves",
        "out", "over", "own", "same", "shall", "she", "should", "since", "so", "some", "such",
        "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
        "these", "they", "this", "those", "through", "thus", "to", "too", "two", "under",
        "until", "up", "upon", "us", "use", "used", "using", "very", "via", "was", "we",
        "were", "what", "when", "where", "whether", "which", "while", "who", "whom", "why",
        "will", "with", "within", "without", "would", "yet", "you", "your", "yours",
        "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

/// A ranked keyphrase.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyphrase {
    /// Most frequent surface form in the text.
    pub phrase: String,
    /// Lowercased form, used for identity.
    pub normalized: String,
    /// Lower is more relevant.
    pub score: f64,
}

#[derive(Default)]
struct TermStats {
    tf: usize,
    /// ALL-CAPS occurrences (acronyms).
    tf_upper: usize,
    /// Capitalized occurrences not at a sentence start.
    tf_capital: usize,
    sentences: Vec<usize>,
    left: Vec<String>,
    right: Vec<String>,
    surfaces: Vec<(String, usize)>,
    first_seen: usize,
    stopword: bool,
    candidate: bool,
}

impl TermStats {
    fn add_surface(&mut self, surface: &str) {
        match self.surfaces.iter_mut().find(|(s, _)| s == surface) {
            Some((_, n)) => *n += 1,
            None => self.surfaces.push((surface.to_string(), 1)),
        }
    }

    fn best_surface(&self) -> String {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.surfaces {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(s, _)| s.clone()).unwrap_or_default()
    }
}

fn distinct_ratio(items: &[String]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let distinct: HashSet<&String> = items.iter().collect();
    distinct.len() as f64 / items.len() as f64
}

fn median(values: &[usize]) -> f64 {
    let mut v = values.to_vec();
    v.sort_unstable();
    match v.len() {
        0 => 0.0,
        n if n % 2 == 1 => v[n / 2] as f64,
        n => (v[n / 2 - 1] + v[n / 2]) as f64 / 2.0,
    }
}

fn is_candidate(word: &str, lower: &str) -> bool {
    word.chars().count() >= MIN_TERM_CHARS
        && !word.chars().any(|c| c.is_numeric())
        && !is_stopword(lower)
}

/// Extract up to `top` unigram keyphrases from `text`, best first.
pub fn extract_keyphrases(text: &str, top: usize) -> Vec<Keyphrase> {
    if top == 0 || text.trim().is_empty() {
        return Vec::new();
    }

    let mut terms: HashMap<String, TermStats> = HashMap::new();
    let mut order = 0usize;
    let mut n_sentences = 0usize;

    for sentence in SENTENCE_RE.split(text) {
        let words: Vec<&str> = WORD_RE
            .find_iter(sentence)
            .map(|m| m.as_str().trim_matches(|c: char| c == '\'' || c == '-'))
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            continue;
        }
        let sid = n_sentences;
        n_sentences += 1;

        let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
        for (pos, word) in words.iter().enumerate() {
            let lower = &lowered[pos];
            let stats = terms.entry(lower.clone()).or_insert_with(|| {
                order += 1;
                TermStats {
                    first_seen: order,
                    stopword: is_stopword(lower),
                    candidate: is_candidate(word, lower),
                    ..TermStats::default()
                }
            });
            stats.tf += 1;
            stats.sentences.push(sid);
            stats.add_surface(word);

            let initial_upper = word.chars().next().map_or(false, |c| c.is_uppercase());
            if word.chars().count() > 1 && word.chars().all(|c| !c.is_lowercase()) && initial_upper
            {
                stats.tf_upper += 1;
            } else if initial_upper && pos > 0 {
                stats.tf_capital += 1;
            }

            if pos > 0 {
                stats.left.push(lowered[pos - 1].clone());
            }
            if pos + 1 < words.len() {
                stats.right.push(lowered[pos + 1].clone());
            }
        }
    }

    if n_sentences == 0 {
        return Vec::new();
    }

    let valid_tfs: Vec<f64> = terms
        .values()
        .filter(|t| !t.stopword)
        .map(|t| t.tf as f64)
        .collect();
    let (mean_tf, std_tf) = if valid_tfs.is_empty() {
        (0.0, 0.0)
    } else {
        let mean = valid_tfs.iter().sum::<f64>() / valid_tfs.len() as f64;
        let var = valid_tfs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / valid_tfs.len() as f64;
        (mean, var.sqrt())
    };
    let max_tf = terms.values().map(|t| t.tf).max().unwrap_or(1) as f64;

    let mut ranked: Vec<(f64, usize, Keyphrase)> = terms
        .iter()
        .filter(|(_, t)| t.candidate)
        .map(|(lower, t)| {
            let tf = t.tf as f64;
            let casing = t.tf_upper.max(t.tf_capital) as f64 / (1.0 + tf.ln());
            let position = (3.0 + median(&t.sentences)).ln().ln();
            let frequency = tf / (mean_tf + std_tf).max(f64::EPSILON);
            let relatedness = 1.0
                + (distinct_ratio(&t.left) + distinct_ratio(&t.right)) * (tf / max_tf);
            let distinct_sentences: HashSet<usize> = t.sentences.iter().copied().collect();
            let spread = distinct_sentences.len() as f64 / n_sentences as f64;

            let h = (relatedness * position)
                / (casing + frequency / relatedness + spread / relatedness);
            let score = h / ((h + 1.0) * tf);

            (
                score,
                t.first_seen,
                Keyphrase {
                    phrase: t.best_surface(),
                    normalized: lower.clone(),
                    score,
                },
            )
        })
        .collect();

    ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    ranked.truncate(top);
    ranked.into_iter().map(|(_, _, k)| k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABSTRACT: &str = "The Transformer is a sequence model based entirely on attention. \
        Attention lets the Transformer relate distant tokens. We train the Transformer on \
        translation tasks in 2017 and report BLEU scores. The model is fast.";

    #[test]
    fn test_frequent_topic_terms_rank_high() {
        let kps = extract_keyphrases(ABSTRACT, 5);
        let names: Vec<&str> = kps.iter().map(|k| k.normalized.as_str()).collect();
        assert!(names.contains(&"transformer"), "got {:?}", names);
        assert!(names.contains(&"attention"), "got {:?}", names);
        assert!(kps.windows(2).all(|w| w[0].score <= w[1].score));
    }

    #[test]
    fn test_excludes_stopwords_numerals_and_short_tokens() {
        let kps = extract_keyphrases(ABSTRACT, 100);
        for kp in &kps {
            assert!(!is_stopword(&kp.normalized));
            assert!(kp.normalized.chars().count() >= 3);
            assert!(!kp.normalized.chars().any(|c| c.is_numeric()));
        }
        assert!(!kps.iter().any(|k| k.normalized == "2017"));
    }

    #[test]
    fn test_surface_form_and_uniqueness() {
        let kps = extract_keyphrases(ABSTRACT, 100);
        let transformer = kps.iter().find(|k| k.normalized == "transformer").unwrap();
        assert_eq!(transformer.phrase, "Transformer");

        let unique: HashSet<&str> = kps.iter().map(|k| k.normalized.as_str()).collect();
        assert_eq!(unique.len(), kps.len());
    }

    #[test]
    fn test_top_limit_and_empty_text() {
        assert_eq!(extract_keyphrases(ABSTRACT, 3).len(), 3);
        assert!(extract_keyphrases("", 15).is_empty());
        assert!(extract_keyphrases("   \n  ", 15).is_empty());
        assert!(extract_keyphrases(ABSTRACT, 0).is_empty());
    }
}
