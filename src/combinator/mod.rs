//! Aggregate combinators over many deferred values.
//!
//! Both are written against the public [`Thenable`](crate::Thenable)
//! interface only, so they accept foreign thenables as readily as
//! [`Deferred`](crate::Deferred) values.

mod all;
mod race;

pub use all::all;
pub use race::race;
