pub mod classifier;
pub mod keywords;
pub mod provider;
pub mod response;

pub use classifier::{classify_with, Classified, ClassificationSource, Classifier};
pub use keywords::classify_keywords;
pub use provider::{ChatCompletionProvider, LlmProvider, ProviderKind};
