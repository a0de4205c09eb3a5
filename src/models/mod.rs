pub mod action;
pub mod metrics;
pub mod processing;
pub mod query;
