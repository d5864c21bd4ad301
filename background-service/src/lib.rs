pub mod aggregator;
pub mod bus;
pub mod service;

pub use aggregator::Aggregator;
pub use bus::{serve, ChannelBus, Envelope};
pub use service::{BackgroundService, BrowserHost};
