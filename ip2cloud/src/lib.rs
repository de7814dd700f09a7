//! Classify IPv4 addresses by the provider announcing them.
//!
//! A [`RangeSource`] maps provider names to range expressions. A
//! [`Classifier`] normalizes those into intervals, indexes them once and then
//! answers lookups, one at a time or in batches.

pub mod classify;
pub mod conf;
pub mod error;
pub mod interval;
pub mod range;
pub mod source;
pub mod store;
pub mod utils;

pub use classify::{Classifier, ClassifierBuilder, Skipped};
pub use error::{Error, Result};
pub use interval::IntervalIndex;
pub use range::{normalize, Ipv4Range, ProviderRange};
pub use source::RangeSource;
