//! Pipeline stages for a feed update.
//!
//! - `fetch`: download the raw feed into the run's working area
//! - `extract`: pull the URL column out of the delimited feed
//! - `normalize`: trim, deduplicate and sort into an `EntrySet`
//! - `guard`: refuse publishes that would collapse the snapshot
//! - `pipeline`: run the stages in order and publish the result

pub mod extract;
pub mod fetch;
pub mod guard;
pub mod normalize;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod workspace;

pub use extract::extract_candidates;
pub use fetch::{FeedSource, HttpFeedSource, RetryPolicy};
pub use guard::{GuardResult, PublishGuard};
pub use normalize::{NormalizeStats, normalize};
pub use pipeline::{RunOptions, run_pipeline, run_prune, run_update};
pub use workspace::Workspace;
