//! Per-session conversational memory
//!
//! Transcripts live in process memory only and are replayed into the
//! breakdown prompt in append order.

mod session;
mod store;

pub use session::{Session, Turn, render_transcript};
pub use store::{SessionHandle, SessionStore};
