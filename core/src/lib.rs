pub mod aggregate;
pub mod gemini;
pub mod inference;
pub mod ledger;
pub mod models;
pub mod queue;
pub mod store;
pub mod tracker;
