pub mod extractor;
pub mod parse;

pub use extractor::{DocumentSource, FeedExtractor, FeedRun};
pub use parse::{is_results_page, FeedItem, FeedSelectors};
