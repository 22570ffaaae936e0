//! Prompt template management for the compliance agent graph.
//!
//! - **Templates**: parameterised prompts with variable placeholders
//! - **Registry**: global and scoped registries nodes pull templates from
//! - **Builder**: chained API for composing multi-part prompts
//! - **Presets**: built-in templates for the PERCEIVE/PLAN/ACT/LEARN nodes

mod builder;
mod memory_store;
mod presets;
mod registry;
mod store;
mod template;

pub use builder::*;
pub use memory_store::*;
pub use presets::*;
pub use registry::*;
pub use store::*;
pub use template::*;

/// Convenience prelude.
pub mod prelude {
    pub use super::builder::PromptBuilder;
    pub use super::memory_store::InMemoryPromptStore;
    pub use super::presets::*;
    pub use super::registry::PromptRegistry;
    pub use super::store::{DynPromptStore, PromptEntity, PromptFilter, PromptStore};
    pub use super::template::{PromptTemplate, PromptVariable, VariableType};
}
