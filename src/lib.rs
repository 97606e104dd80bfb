#![doc(test(attr(deny(warnings))))]

//! Transaction Summary reports transaction counts and amounts bucketed by
//! solar Hijri day, week, and month, either aggregated live from the raw
//! transaction store or served from a TTL-bound materialized cache.

pub mod calendar;
pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod storage;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Transaction Summary tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
    }
}
