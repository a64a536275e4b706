//! Schema module - Configuration and data types for the cell field.

mod cell;
mod config;
mod descriptor;
mod observation;
mod signal;
mod snapshot;

pub use cell::*;
pub use config::*;
pub use descriptor::*;
pub use observation::*;
pub use signal::*;
pub use snapshot::*;
