//! Core types and trait definitions for the Snapmark bookmarking service.
//!
//! This crate has no HTTP or database dependencies.
//! Storage backends implement [`store::SocialStore`] and
//! [`counter::CounterStore`]; everything else here is written against those
//! two traits.

// Impls use native `async fn`; the trait signatures carry the `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod action;
pub mod counter;
pub mod error;
pub mod image;
pub mod ranking;
pub mod social;
pub mod store;
pub mod user;

pub use error::{Error, Result};
