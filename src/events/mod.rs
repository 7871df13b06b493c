//! Change notification for ledger views

pub mod publisher;

pub use publisher::{Publisher, Subscription};
