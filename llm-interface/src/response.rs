use feedlens_core::{Bias, ClassificationResult, LlmError, Sentiment, Toxicity};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawClassification {
    bias: Option<serde_json::Value>,
    sentiment: Option<serde_json::Value>,
    toxicity: Option<serde_json::Value>,
}

/// Strip markdown code fences the model may wrap its answer in.
pub fn strip_code_fences(content: &str) -> String {
    content
        .trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Lower-case, drop terminal punctuation, trim.
pub fn normalize_label(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn label(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => normalize_label(&s),
        _ => String::new(),
    }
}

/// Parse a model reply into a validated result.
///
/// Every field must land in its enumeration after normalization or the whole reply is
/// rejected.
pub fn parse_classification(content: &str, provider: &str) -> Result<ClassificationResult, LlmError> {
    let cleaned = strip_code_fences(content);
    let raw: RawClassification =
        serde_json::from_str(&cleaned).map_err(|_| LlmError::InvalidResponseFormat {
            provider: provider.to_string(),
        })?;

    Ok(ClassificationResult {
        bias: label(raw.bias).parse::<Bias>()?,
        sentiment: label(raw.sentiment).parse::<Sentiment>()?,
        toxicity: label(raw.toxicity).parse::<Toxicity>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let result =
            parse_classification(r#"{"bias":"left","sentiment":"negative","toxicity":"low"}"#, "groq")
                .unwrap();
        assert_eq!(result.bias, Bias::Left);
        assert_eq!(result.sentiment, Sentiment::Negative);
        assert_eq!(result.toxicity, Toxicity::Low);
    }

    #[test]
    fn test_fenced_and_noisy_labels() {
        let content = "```json\n{\"bias\":\"Right.\",\"sentiment\":\" POSITIVE! \",\"toxicity\":\"Medium;\"}\n```";
        let result = parse_classification(content, "openai").unwrap();
        assert_eq!(result.bias, Bias::Right);
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.toxicity, Toxicity::Medium);
    }

    #[test]
    fn test_out_of_range_value_is_rejected() {
        let err = parse_classification(
            r#"{"bias":"unknown","sentiment":"neutral","toxicity":"low"}"#,
            "groq",
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::InvalidLabel { .. }));
    }

    #[test]
    fn test_missing_field_and_prose_are_rejected() {
        assert!(parse_classification(r#"{"bias":"left","sentiment":"neutral"}"#, "groq").is_err());
        assert!(parse_classification("The post leans left.", "groq").is_err());
        assert!(parse_classification(r#"{"bias":1,"sentiment":"neutral","toxicity":"low"}"#, "groq").is_err());
    }
}
