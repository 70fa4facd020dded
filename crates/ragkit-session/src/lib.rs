//! Session-scoped conversational memory for the ragkit pipeline
//!
//! Sessions hold a bounded exchange window, a summary of evicted exchanges,
//! extracted user facts and topic tags. Expiry is TTL-driven, both lazily on
//! access and from a periodic sweep task.

mod context;
mod facts;
mod store;

pub use facts::{ExtractedFact, extract_facts};
pub use store::{ChatHistory, Exchange, HistoryMessage, Session, SessionStats, SessionStore};
