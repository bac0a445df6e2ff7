//! `vista-ai`
//!
//! **Responsibility:** provider adapter boundary for AI enrichment.
//!
//! This crate knows how to talk to external AI backends and nothing about job
//! persistence, credits or notifications:
//! - It exposes one [`ProviderAdapter`] over two interaction shapes
//!   (request/response and submit-and-poll).
//! - It validates job inputs into typed shapes and owns the style/tone templates.
//! - It never reads process environment; credentials arrive via [`ProviderConfig`].

pub mod config;
pub mod fetch;
pub mod input;
pub mod poll;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod result;
pub mod templates;

pub use config::ProviderConfig;
pub use fetch::{AssetFetcher, DEFAULT_MAX_ASSET_BYTES, FetchedAsset, HttpAssetFetcher};
pub use input::{DescriptionInput, EnhancementInput, ImageInput, JobInput, StagingInput};
pub use poll::{PollPolicy, poll_until_terminal};
pub use provider::{
    PollStatus, PollingProvider, ProviderAdapter, ProviderRequest, ProviderRun, SubmissionHandle,
    SyncProvider,
};
pub use registry::ProviderRegistry;
pub use result::{ProviderError, ProviderPayload};
pub use templates::{DescriptionTone, EnhancementPreset, StagingStyle};
