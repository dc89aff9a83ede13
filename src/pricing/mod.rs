pub mod resolver;

pub use resolver::{pick_best, PriceKey, PriceResolver};
