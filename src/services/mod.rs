/// Service layer
///
/// - `prober`: checks whether a CDN URL is still retrievable
/// - `resolver`: provider API client with failure classification
/// - `updater`: applies resolved URLs to catalog rows
/// - `notifier`: fire-and-forget report push
pub mod notifier;
pub mod prober;
pub mod resolver;
pub mod updater;

pub use notifier::Notifier;
pub use prober::UrlProber;
pub use resolver::SourceResolver;
pub use updater::RecordUpdater;
