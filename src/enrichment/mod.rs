pub mod takers;
pub mod takes;

pub use takers::compute_taker_summaries;
pub use takes::{usd_fields, EnrichedTake, TakeEnricher, UsdFields};
