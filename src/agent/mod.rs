//! Agent Module
//!
//! The decision core: conversation state, the cycle controller state machine,
//! the run loop, and the system prompt builder.

pub mod controller;
pub mod conversation;
pub mod run_loop;
pub mod system_prompt;

pub use controller::{CycleController, CyclePolicy};
pub use conversation::ConversationState;
pub use run_loop::{run_trading_loop, RunLoopOptions, RunSummary};
