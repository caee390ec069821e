pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod output;
pub mod store;
pub mod webhook;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{Controller, Limits, Phase, RateLimitStatus};
pub use error::{Error, Result, SearchError};
pub use model::{ResultRecord, SearchCriteria};
pub use store::{KeyValueStore, RateLimitState, RateLimitStore};
pub use webhook::{SearchService, WebhookClient};
