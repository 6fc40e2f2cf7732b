//! Typed client for the marketplace REST endpoints the AI search consumes.

pub mod client;
pub mod scrub;
pub mod types;

pub use client::{HttpMarketplaceClient, MarketplaceApi, build_http_client};
pub use types::{
    AiModeRequest, AiModeResponse, CandidateProfile, EvaluationCandidate, EvaluationReceipt,
    EvaluationRequest, EvaluationSession, HistoryEntry, StoredEvaluation,
};
