//! Core types and trait definitions for Marquee, the slot placement engine.
//!
//! A *slot* is an addressable region of a page. *Placements* are rows that say
//! what content a slot should show; resolution picks one winner per slot.
//! This crate holds the resolution contract, the audited write path and the
//! conduction workflow. It is free of HTTP and database dependencies.

// Native `async fn` in traits; the lint is about `Send` bounds on the futures,
// which the trait signatures spell out.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod conduction;
pub mod content;
pub mod device;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod operator;
pub mod placement;
pub mod presence;
pub mod resolver;
pub mod slot;
pub mod store;
pub mod walkthrough;

pub use error::{Error, Result};
