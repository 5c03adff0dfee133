//! Frequency-based keyword extraction used when no language model is at hand.

use std::collections::BTreeMap;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "and", "any", "are", "because",
    "been", "before", "being", "below", "between", "both", "but", "can", "could", "did", "does",
    "doing", "down", "due", "during", "each", "few", "for", "from", "further", "had", "has",
    "have", "having", "her", "here", "hers", "him", "his", "how", "into", "its", "itself",
    "just", "more", "most", "our", "ours", "out", "over", "own", "same", "she", "should", "some",
    "such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "those", "through", "too", "under", "until", "very", "was", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
    "not", "nor", "only", "other", "off", "once", "per", "quarter", "we", "us",
];

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 3)
        .filter(|t| t.chars().any(char::is_alphabetic))
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}

/// The `limit` highest-weighted terms across `snippets`.
///
/// Weight is term frequency times smoothed inverse document frequency,
/// `ln((1 + n) / (1 + df)) + 1`, summed over snippets. Ties sort
/// alphabetically.
#[must_use]
pub fn top_keywords(snippets: &[String], limit: usize) -> Vec<String> {
    let mut term_counts: Vec<BTreeMap<String, usize>> = Vec::with_capacity(snippets.len());
    let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();

    for snippet in snippets {
        let mut counts = BTreeMap::new();
        for token in tokens(snippet) {
            *counts.entry(token).or_insert(0_usize) += 1;
        }
        for term in counts.keys() {
            *document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
        term_counts.push(counts);
    }

    #[allow(clippy::cast_precision_loss)]
    let n = snippets.len() as f64;
    let mut weights: BTreeMap<&str, f64> = BTreeMap::new();
    for counts in &term_counts {
        for (term, &count) in counts {
            #[allow(clippy::cast_precision_loss)]
            let df = document_frequency.get(term).copied().unwrap_or(0) as f64;
            let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
            #[allow(clippy::cast_precision_loss)]
            let tf = count as f64;
            *weights.entry(term.as_str()).or_insert(0.0) += tf * idf;
        }
    }

    let mut ranked: Vec<(&str, f64)> = weights.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(term, _)| term.to_string())
        .collect()
}
