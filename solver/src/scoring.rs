//! Embedding-based similarity between a guessed category label and the answer.

use tracing::{debug, warn};

use crate::io::embedder::Embedder;

/// Cosine similarity in `[-1, 1]`; `None` for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

pub struct CategoryScorer {
    embedder: Box<dyn Embedder>,
}

impl CategoryScorer {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Similarity of the two labels mapped to `[0, 1]`.
    ///
    /// Embedding failures are logged and yield `None`; they never end a game.
    pub fn score(&self, guessed: &str, actual: &str) -> Option<f64> {
        let guessed_vec = match self.embedder.embed(guessed) {
            Ok(vector) => vector,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "embedding guessed label failed");
                return None;
            }
        };
        let actual_vec = match self.embedder.embed(actual) {
            Ok(vector) => vector,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "embedding category label failed");
                return None;
            }
        };
        let Some(cosine) = cosine_similarity(&guessed_vec, &actual_vec) else {
            warn!(
                guessed_dims = guessed_vec.len(),
                actual_dims = actual_vec.len(),
                "embeddings not comparable"
            );
            return None;
        };
        let score = ((cosine + 1.0) / 2.0).clamp(0.0, 1.0);
        debug!(guessed, actual, score, "category similarity");
        Some(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};

    struct LetterEmbedder;

    impl Embedder for LetterEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.is_empty() {
                bail!("empty text");
            }
            let mut counts = vec![0.0f32; 26];
            for byte in text.to_ascii_lowercase().bytes() {
                if byte.is_ascii_lowercase() {
                    counts[usize::from(byte - b'a')] += 1.0;
                }
            }
            Ok(counts)
        }
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), Some(-1.0));
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), None);
    }

    #[test]
    fn identical_labels_score_one() {
        let scorer = CategoryScorer::new(Box::new(LetterEmbedder));
        let score = scorer.score("Wet Weather", "WET WEATHER").expect("score");
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn scores_stay_in_unit_interval_and_failures_are_skipped() {
        let scorer = CategoryScorer::new(Box::new(LetterEmbedder));
        let score = scorer.score("palindromes", "nba teams").expect("score");
        assert!((0.0..=1.0).contains(&score));
        assert_eq!(scorer.score("", "nba teams"), None);
    }
}
