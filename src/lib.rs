//! Project portfolio aggregate.
//!
//! A [`models::Project`] owns an ordered set of [`models::Picture`]s. Both live
//! in a [`models::Gallery`] arena and refer to each other through handles, so
//! the parent/child link never forms an ownership cycle. The [`db::Database`]
//! persists whole aggregates, [`storage`] writes uploaded bytes, and
//! [`validation`] checks an aggregate before it is saved.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod slug;
pub mod storage;
pub mod validation;

pub use error::{Error, Result};
