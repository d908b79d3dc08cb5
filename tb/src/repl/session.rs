//! REPL session management

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, warn};

use crate::display::{degraded_reason, print_degraded, print_outcome};
use crate::llm::Role;
use crate::pipeline::Pipeline;

/// Slash commands understood by the REPL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Quit,
    Clear,
    History,
    Unknown(String),
}

impl SlashCommand {
    /// Parse a line starting with `/`; None for ordinary input
    pub fn parse(input: &str) -> Option<Self> {
        if !input.starts_with('/') {
            return None;
        }
        let cmd = input.split_whitespace().next().unwrap_or("");
        Some(match cmd {
            "/help" | "/h" => Self::Help,
            "/quit" | "/q" | "/exit" => Self::Quit,
            "/clear" | "/c" => Self::Clear,
            "/history" => Self::History,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// Interactive REPL session bound to one session id
pub struct ReplSession {
    pipeline: Pipeline,
    session_id: String,
}

impl ReplSession {
    pub fn new(pipeline: Pipeline, session_id: String) -> Self {
        debug!(%session_id, "ReplSession::new: called");
        Self { pipeline, session_id }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match SlashCommand::parse(input) {
                        Some(SlashCommand::Quit) => break,
                        Some(cmd) => self.handle_slash_command(cmd).await,
                        None => self.process_user_input(input).await,
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - just show new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Taskbreaker".bright_cyan().bold());
        println!("Session: {}", self.session_id.dimmed());
        println!("Describe a task and how much time you have, e.g. \"Clean my room, 1 hour\"");
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    async fn handle_slash_command(&mut self, cmd: SlashCommand) {
        debug!(?cmd, "handle_slash_command: called");
        match cmd {
            SlashCommand::Help => self.print_help(),
            SlashCommand::Clear => {
                self.pipeline.clear_session(&self.session_id).await;
                println!("{}", "Conversation cleared.".dimmed());
            }
            SlashCommand::History => self.print_history().await,
            SlashCommand::Unknown(name) => {
                println!("{} Unknown command: {}", "?".yellow(), name);
                println!("Type {} for available commands", "/help".yellow());
            }
            SlashCommand::Quit => {}
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the REPL", "/quit".yellow());
        println!("  {:14} Clear conversation history", "/clear".yellow());
        println!("  {:14} Show conversation history", "/history".yellow());
        println!();
    }

    async fn print_history(&self) {
        let history = self.pipeline.history(&self.session_id).await;
        if history.is_empty() {
            println!("{}", "No conversation history.".dimmed());
            return;
        }

        println!();
        println!("{}", "Conversation History:".bright_cyan());
        for (i, turn) in history.iter().enumerate() {
            let role = match turn.role {
                Role::User => "User".bright_green(),
                Role::Assistant => "Assistant".bright_blue(),
            };
            let first_line = turn.text.lines().next().unwrap_or("");
            let preview: String = first_line.chars().take(60).collect();
            let preview = if turn.text.chars().count() > preview.chars().count() {
                format!("{}...", preview)
            } else {
                preview
            };
            println!("  {}. {} {}: {}", i + 1, turn.at.format("%H:%M:%S").to_string().dimmed(), role, preview);
        }
        println!();
    }

    /// Run one line through the pipeline and print the result
    ///
    /// Request failures are reported and the loop continues.
    async fn process_user_input(&mut self, input: &str) {
        debug!(session_id = %self.session_id, "process_user_input: called");
        println!("{}", "Thinking...".dimmed());
        match self.pipeline.breakdown_and_extract(&self.session_id, input).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => match e.breakdown() {
                Some(breakdown) => {
                    warn!(error = %e, "Showing raw breakdown after extraction failure");
                    print_degraded(breakdown, &degraded_reason(&e));
                }
                None => {
                    warn!(error = %e, "Request failed");
                    println!("{} {}", "Error:".red(), e);
                }
            },
        }
        println!();
    }
}
