//! Fetches the darwin guest tools images shipped with the latest fusion
//! release and unpacks them into a `tools` folder.

pub mod config;
pub mod download;
pub mod error;
pub mod listing;
pub mod pipeline;
pub mod progress;

pub use config::Config;
pub use download::{Download, HttpDownloader};
pub use error::{Error, ExtractError, FetchError, ParseError, Result};
pub use listing::{LatestVersionResolver, ListingParser, VersionToken};
pub use pipeline::{Outcome, Pipeline};
pub use progress::{ConsoleReporter, NullReporter, ProgressHook, ProgressState};
