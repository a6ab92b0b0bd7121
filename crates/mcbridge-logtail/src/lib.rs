//! Server log ingestion: tail the log file, classify each line, and deliver
//! rendered messages to the chat channel.

mod chat_pipeline;
mod event_classifier;
mod event_dispatcher;
mod log_tailer;
mod tail_service;

pub use chat_pipeline::*;
pub use event_classifier::*;
pub use event_dispatcher::*;
pub use log_tailer::*;
pub use tail_service::*;
