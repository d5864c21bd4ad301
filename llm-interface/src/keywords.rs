//! Deterministic keyword scoring used whenever the remote model is unavailable.

use feedlens_core::{Bias, ClassificationResult, Sentiment, Toxicity};

pub const LEFT_KEYWORDS: &[&str] = &[
    "progressive",
    "socialism",
    "medicare for all",
    "climate action",
    "wealth tax",
    "social justice",
    "equity",
    "systemic racism",
    "transgender rights",
    "abortion rights",
    "gun control",
    "universal healthcare",
    "green new deal",
    "defund police",
    "living wage",
    "workers rights",
    "unions",
    "corporate greed",
    "billionaire tax",
    "student debt",
    "immigration reform",
    "sanctuary cities",
    "blm",
    "acab",
    "resist",
    "antifa",
    "regulate corporations",
    "big pharma",
    "oligarchy",
    "income inequality",
];

pub const RIGHT_KEYWORDS: &[&str] = &[
    "conservative",
    "freedom",
    "liberty",
    "second amendment",
    "pro-life",
    "traditional values",
    "border security",
    "illegal immigration",
    "law and order",
    "back the blue",
    "maga",
    "america first",
    "drain the swamp",
    "fake news",
    "mainstream media",
    "woke",
    "cancel culture",
    "free speech",
    "big government",
    "socialism bad",
    "capitalism",
    "small business",
    "deregulation",
    "lower taxes",
    "religious freedom",
    "patriot",
    "voter fraud",
    "election integrity",
    "parental rights",
    "critical race theory",
    "crt",
    "secure borders",
    "military strong",
    "energy independence",
    "fossil fuels",
];

pub const POSITIVE_WORDS: &[&str] = &[
    "love",
    "great",
    "amazing",
    "excellent",
    "happy",
    "wonderful",
    "fantastic",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "hate",
    "terrible",
    "awful",
    "horrible",
    "worst",
    "disgusting",
    "pathetic",
];

pub const TOXIC_WORDS: &[&str] = &[
    "idiot", "stupid", "moron", "scum", "trash", "garbage", "fuck", "shit",
];

fn hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| text.contains(*k)).count()
}

/// Picks the side with strictly more hits; a tie, including zero-zero, is `Center`.
pub fn bias_from_hits(left: usize, right: usize) -> Bias {
    match left.cmp(&right) {
        std::cmp::Ordering::Greater => Bias::Left,
        std::cmp::Ordering::Less => Bias::Right,
        std::cmp::Ordering::Equal => Bias::Center,
    }
}

pub fn sentiment_from_hits(positive: usize, negative: usize) -> Sentiment {
    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

pub fn toxicity_from_hits(toxic: usize) -> Toxicity {
    match toxic {
        0 => Toxicity::Low,
        1 => Toxicity::Medium,
        _ => Toxicity::High,
    }
}

pub fn classify_keywords(text: &str) -> ClassificationResult {
    let text = text.to_lowercase();

    ClassificationResult {
        bias: bias_from_hits(hits(&text, LEFT_KEYWORDS), hits(&text, RIGHT_KEYWORDS)),
        sentiment: sentiment_from_hits(hits(&text, POSITIVE_WORDS), hits(&text, NEGATIVE_WORDS)),
        toxicity: toxicity_from_hits(hits(&text, TOXIC_WORDS)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_left_hits_lean_left() {
        let result = classify_keywords("We need a Wealth Tax and universal healthcare now");
        assert_eq!(result.bias, Bias::Left);
    }

    #[test]
    fn test_tie_and_zero_hits_are_center() {
        let tie = classify_keywords("gun control versus the second amendment");
        assert_eq!(tie.bias, Bias::Center);

        let none = classify_keywords("what a nice sunset today");
        assert_eq!(none.bias, Bias::Center);
    }

    #[test]
    fn test_right_lean() {
        let result = classify_keywords("Border security and lower taxes for small business");
        assert_eq!(result.bias, Bias::Right);
    }

    #[test]
    fn test_sentiment() {
        assert_eq!(
            classify_keywords("I love this, it's amazing").sentiment,
            Sentiment::Positive
        );
        assert_eq!(
            classify_keywords("the worst, most pathetic take").sentiment,
            Sentiment::Negative
        );
        assert_eq!(
            classify_keywords("great idea, terrible execution").sentiment,
            Sentiment::Neutral
        );
    }

    #[test]
    fn test_toxicity_thresholds() {
        assert_eq!(classify_keywords("hello").toxicity, Toxicity::Low);
        assert_eq!(classify_keywords("what an idiot").toxicity, Toxicity::Medium);
        assert_eq!(
            classify_keywords("stupid idiot posting garbage").toxicity,
            Toxicity::High
        );
    }

    #[test]
    fn test_keyword_path_is_idempotent() {
        let text = "Climate action now! Stop corporate greed, you morons";
        assert_eq!(classify_keywords(text), classify_keywords(text));
    }
}
