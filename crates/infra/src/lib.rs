//! Infrastructure layer: job records, credit ledger, orchestration and the
//! public job service.

pub mod db;
pub mod dispatcher;
pub mod external;
pub mod jobs;
pub mod ledger;
pub mod orchestrator;
pub mod service;


pub use dispatcher::{Dispatcher, TokioDispatcher};
pub use orchestrator::{ExecutionOutcome, Orchestrator, OrchestratorError};
pub use service::{CreditPricing, JobService, ServiceError, SubmitJob};
