//! Fetch domain - requests, responses and the network seam

mod fetcher;
mod request;
mod response;

pub use fetcher::Fetcher;
pub use request::{CacheEntryKey, Destination, FetchRequest};
pub use response::{OfflineApiError, Response, ResponseSource, StoredResponse, STALE_MARKER_HEADER};

#[cfg(test)]
pub use fetcher::mock::MockNetwork;
#[cfg(test)]
pub use fetcher::MockFetcher;
