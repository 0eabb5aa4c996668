//! Application services layer scaffolding.

pub mod error;
pub mod gateways;
pub mod invalidation;
pub mod jobs;
pub mod lookup;
pub mod precompute;
pub mod repos;
pub mod status;
