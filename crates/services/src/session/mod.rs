//! Session orchestration: working state, re-entrancy guards, and the
//! PLANNING → GENERATING → ACTIVE flow.

mod flow;
mod guard;
mod service;

pub use flow::{
    AdvanceResult, FinishedSession, PendingCacheChoice, SessionFlowService, SessionPhase,
    SessionRequest, SessionStart,
};
pub use guard::{FlowEpochs, FlowGuard};
pub use service::{AdvanceOutcome, TrainingSession};
