pub mod cli;
pub mod window;

pub use window::{WindowDisplay, WindowInput};
