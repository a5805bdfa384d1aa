// Aggregation pipeline: fan out to adapters, merge, order

pub mod aggregator;

pub use aggregator::{Aggregator, SourceOutcome, SourceReport};
