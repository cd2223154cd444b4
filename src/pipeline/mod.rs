//! The generation pipeline: collaborator call, scaffold defaults, tree
//! assembly, and publication to the display layer.

pub mod collaborator;
pub mod coordinator;
pub mod scaffold;

pub use collaborator::{Classification, Collaborator, CommandCollaborator, Generation};
pub use coordinator::{PipelineCoordinator, PipelineOutput, Publisher};
pub use scaffold::{SCAFFOLD_FILES, apply_scaffold};
