//! PaperVault - study-material ingestion and catalog service.
//!
//! Accepts encrypted links to student study materials, downloads and
//! deduplicates them by content hash, rewards contributors with credits,
//! and hands the documents to a background worker for repair and upload
//! into the object store.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod fetch;
pub mod hashing;
pub mod metadata;
pub mod models;
pub mod pdf;
pub mod repair;
pub mod repository;
pub mod server;
pub mod services;
pub mod storage;
pub mod worker;
