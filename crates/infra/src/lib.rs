//! Infrastructure layer: stores, fulfillment engine, config.

pub mod config;
pub mod fulfillment;
pub mod store;
