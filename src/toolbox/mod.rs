//! Smart Toolbox: plans a CAD task and ranks the tools it needs.
//!
//! Submodules:
//! - `taxonomy`: The catalog of tools the application exposes
//! - `plan_parser`: Tool order and step extraction from free-form model answers
//! - `reconciler`: Taxonomy reconciliation and first-occurrence priority ranking
//! - `secondary`: Supplementary tool selection via a second model call
//! - `assembler`: End-to-end planning with deterministic fallbacks
//! - `types`: User context, task model and outcome types
//! - `errors`: Toolbox-level error types

pub mod assembler;
pub mod errors;
pub mod plan_parser;
pub mod reconciler;
pub mod secondary;
pub mod taxonomy;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use assembler::{build_task_model, plan_toolbox};
pub use errors::ToolboxError;
pub use plan_parser::{ExtractionTier, ParsedPlan};
pub use reconciler::{arrange, reconcile, PriorityMap, Reconciled};
pub use secondary::{select_secondary, SecondarySelection, SecondarySource};
pub use taxonomy::{Taxonomy, ToolDescriptor};
pub use types::{
    DegradeReason, GuidanceLevel, ParsedStep, PlanOutcome, SmartToolbox, TaskModel, UserContext,
};
