//! Recall for chat turns and inline completions.
//!
//! [`RecallOrchestrator`] runs three cancellable branches per chat turn:
//! symbol prediction and resolution, local semantic search, and remote
//! semantic search. It merges their references into one
//! [`lumen_core::RecallRecord`] whose stages only move forward.
//! [`InlineCompleter`] reuses the prediction and resolution steps to attach
//! context to completion requests.

pub mod completion;
pub mod llm;
mod orchestrator;
pub mod prompt;
pub mod references;
pub mod symbols;
pub mod task_group;

pub use completion::{CompletionTrigger, InlineCompleter, InlineRequest};
pub use llm::{ChatMessage, ChatProvider, Role};
pub use orchestrator::{RecallOrchestrator, RecallOutcome, TurnHandle};
pub use symbols::{Definition, SymbolQuery, SymbolResolver, WorkspaceSymbolResolver};
pub use task_group::{GroupTask, TaskGroup};
