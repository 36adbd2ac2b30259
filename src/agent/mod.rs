//! Paper analysis agent.
//!
//! This module provides the tools and the loop that drive a paper from
//! source to note, either as a fixed pipeline or under model control.

pub mod agent_loop;
pub mod tools;

pub use agent_loop::{AgentConfig, DistillAgent, RunOutcome, RunRequest};
pub use tools::ToolSettings;
