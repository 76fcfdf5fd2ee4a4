//! Service layer - orchestration separated from HTTP concerns.

pub mod ingest;

pub use ingest::{IngestError, IngestOutcome, IngestService, RouteDecision};
