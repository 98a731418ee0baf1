//! Persistence Adapters - JSON/JSONL File Storage
//!
//! Implements the event, quote and report ports over plain files.
//! No database dependency: JSONL history in, atomic JSON reports out.

pub mod event_store;
pub mod quote_store;
pub mod report_writer;

pub use event_store::FileEventStore;
pub use quote_store::FileQuoteStore;
pub use report_writer::ReportWriter;
