//! `vista-core`: domain foundation for AI job orchestration.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the closed set of job types, plan tiers and the domain error model.

pub mod error;
pub mod id;
pub mod job_type;
pub mod plan;

pub use error::{DomainError, DomainResult};
pub use id::{AssetId, JobId, OwnerId, ResourceId};
pub use job_type::JobType;
pub use plan::PlanTier;
