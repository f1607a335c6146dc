//! Domain types for feedpull.
//!
//! This module contains the request-side vocabulary of the scheduler:
//! - FeedRequest: immutable descriptor of one fetch (url, priority, retry budget)
//! - Priority / FeedName: ordering tier and logical feed category
//! - FeedProperties: open bag of typed caller metadata
//! - BackoffPolicy: delay strategy between retry attempts
//! - PullResult / PullFailure: what the callbacks receive

pub mod backoff;
pub mod feed_request;
pub mod outcome;
pub mod priority;
pub mod properties;

pub use backoff::{BackoffPolicy, DEFAULT_BACKOFF};
pub use feed_request::{FeedName, FeedRequest, FeedRequestConfig, default_dedup_key};
pub use outcome::{OnError, OnSuccess, PullFailure, PullResult, callbacks};
pub use priority::Priority;
pub use properties::FeedProperties;
