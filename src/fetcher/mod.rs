//! Quote refresh against the price index.

mod batch_fetcher;

pub use batch_fetcher::{BatchPriceFetcher, Deadline, FetchMode, FetchReport, RetryPolicy, MAX_BATCH_SIZE};
