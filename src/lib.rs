//! wavecache: the response cache and invalidation/precomputation engine of
//! a spectrum-coordination service.
//!
//! Cached answers live in Postgres, one row per device identity tuple.
//! Lookups serve a row only while its state, digest and validity window all
//! agree; invalidation flips rows affected by external data changes; a
//! background scheduler recomputes invalidated rows under a bounded quota.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
