//! Interactive REPL for Taskbreaker
//!
//! Multi-turn conversation over one session: each line goes through the
//! breakdown pipeline with the earlier turns as context.

mod session;

pub use session::{ReplSession, SlashCommand};

use eyre::Result;
use tracing::debug;

use crate::pipeline::Pipeline;

/// Run the interactive REPL
///
/// This is the main entry point for `tb repl`.
pub async fn run_interactive(pipeline: Pipeline, session_id: Option<String>) -> Result<()> {
    debug!(?session_id, "run_interactive: called");
    let session_id = session_id.unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
    let mut session = ReplSession::new(pipeline, session_id);
    session.run().await
}
