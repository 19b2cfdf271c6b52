//! Workflow engine driving tracker tickets through configured status lists.

mod description;
mod engine;

pub use description::{description_with_marker, identification_text};
pub use engine::{WorkflowEngine, FIXED_RESOLUTION, WONT_FIX_RESOLUTION};
