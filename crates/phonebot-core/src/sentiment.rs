//! Pluggable sentiment scoring.
//!
//! The engine only needs a signed score per utterance; the bundled
//! [`LexiconScorer`] sums AFINN-style word weights. Swap in an LLM-backed
//! scorer behind the same trait without touching the engine.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::ScorerError;

/// Scores one utterance. Positive = favorable, negative = unfavorable.
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> Result<f32, ScorerError>;
}

/// AFINN-style weights for the words the scripts actually encounter.
static LEXICON: Lazy<HashMap<&'static str, f32>> = Lazy::new(|| {
    HashMap::from([
        ("love", 3.0),
        ("loves", 3.0),
        ("great", 3.0),
        ("good", 3.0),
        ("best", 3.0),
        ("happy", 3.0),
        ("excellent", 3.0),
        ("amazing", 4.0),
        ("awesome", 4.0),
        ("fantastic", 4.0),
        ("wonderful", 4.0),
        ("excited", 3.0),
        ("outstanding", 5.0),
        ("superb", 5.0),
        ("perfect", 3.0),
        ("interested", 2.0),
        ("thanks", 2.0),
        ("yes", 1.0),
        ("sure", 1.0),
        ("bad", -3.0),
        ("terrible", -3.0),
        ("awful", -3.0),
        ("horrible", -3.0),
        ("hate", -3.0),
        ("hates", -3.0),
        ("worst", -3.0),
        ("angry", -3.0),
        ("annoyed", -2.0),
        ("disappointed", -2.0),
        ("scam", -2.0),
        ("waste", -2.0),
        ("useless", -2.0),
        ("stop", -2.0),
        ("no", -1.0),
        ("never", -1.0),
        ("not", -1.0),
    ])
});

/// Keyword scorer: lowers the text, splits on non-alphanumeric boundaries,
/// and sums the weight of every known token. Unknown tokens score zero.
pub struct LexiconScorer;

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> Result<f32, ScorerError> {
        let lowered = text.to_lowercase();
        let total = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .filter_map(|t| LEXICON.get(t))
            .sum();
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_words_accumulate() {
        let scorer = LexiconScorer;
        assert_eq!(scorer.score("this is amazing").unwrap(), 4.0);
        assert_eq!(scorer.score("great, really great").unwrap(), 6.0);
    }

    #[test]
    fn negative_words_accumulate() {
        let scorer = LexiconScorer;
        assert_eq!(scorer.score("this is terrible").unwrap(), -3.0);
        assert_eq!(scorer.score("what a waste, never again").unwrap(), -3.0);
    }

    #[test]
    fn unknown_words_score_neutral() {
        let scorer = LexiconScorer;
        assert_eq!(scorer.score("I work in construction").unwrap(), 0.0);
        assert_eq!(scorer.score("").unwrap(), 0.0);
    }

    #[test]
    fn scoring_ignores_case_and_punctuation() {
        let scorer = LexiconScorer;
        assert_eq!(scorer.score("AMAZING!!!").unwrap(), 4.0);
        assert_eq!(scorer.score("it's great.").unwrap(), 3.0);
    }
}
