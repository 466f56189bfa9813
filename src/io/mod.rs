pub mod export;
pub mod gitlab;

pub use export::{export_audit_sample, export_csv, export_jsonl};
pub use gitlab::GitLabClient;
