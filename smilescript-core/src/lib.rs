pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod summarizer;

pub use config::SmileConfig;
pub use error::SmileError;
pub use models::CommLog;
pub use summarizer::{
    fallback_summarize, OpenAiSummaryClient, Summarizer, SummaryBackend, SummaryError,
};
