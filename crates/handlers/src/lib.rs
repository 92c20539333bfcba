//! Built-in job handlers: the in-process page fetcher and the runner
//! delegate used for externally-executed kinds.

pub mod delegate;
pub mod fetch;

pub use delegate::DelegateHandler;
pub use fetch::HttpFetchHandler;
