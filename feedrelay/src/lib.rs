// Library interface for feedrelay modules
// This allows tests and the binaries to import modules

pub mod channels;
pub mod chat;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod filter;
pub mod formatter;
pub mod ingestion;
pub mod scheduler;
