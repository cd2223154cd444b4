pub mod icons;
pub mod progress;

pub use progress::{ConsolePublisher, PreviewUi, render_steps, render_tree};
