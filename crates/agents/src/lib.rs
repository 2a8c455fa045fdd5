//! The reasoning-loop controller.
//!
//! One [`runner::run_agent`] invocation serves one user request: it
//! repeatedly queries the remote model with the running conversation plus
//! the declared tool catalog, executes requested tools in order, feeds
//! observations back, and terminates on a final answer, the iteration cap,
//! cancellation, or a transport failure.

pub mod runner;
pub mod tool_registry;
pub mod validate;

pub use {
    runner::{AbortReason, AgentRunError, FinalResult, RunOptions, run_agent},
    tool_registry::{AgentTool, ToolCatalog},
};
