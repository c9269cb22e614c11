//! Capture process spawning and option translation.

mod options;
mod process;

pub use options::*;
pub use process::*;
