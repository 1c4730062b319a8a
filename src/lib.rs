//! Data-integrity core for an FPL decision-support pipeline: availability
//! reconciliation across feeds, slate construction, ruleset loading, and
//! the readiness gate that fronts every analysis run.

pub mod artifacts;
pub mod availability;
pub mod feed_cache;
pub mod fetch;
pub mod freshness_gate;
pub mod identity_check;
pub mod injury_resolve;
pub mod lineup;
pub mod pipeline;
pub mod projection;
pub mod ruleset;
pub mod slate;
