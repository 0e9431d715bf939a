pub mod catalog;
pub mod cli;
pub mod diff;
pub mod error;
pub mod export;
pub mod policy;
pub mod reconcile;
pub mod store;
