//! HTTP endpoint handlers.

mod api;
mod files;

pub use api::{deduct_credits, get_credits, health, issue_download_url, upload_material};
pub use files::serve_file;
