//! Compute module - Context, interpretation, evolution and the tick itself.

mod adaptation;
mod context;
mod interpreter;
mod population;

pub mod evolution;

pub use adaptation::*;
pub use context::*;
pub use interpreter::*;
pub use population::*;
