//! Durable audit and replay store.
//!
//! Observations, fitness records, lineage records, adaptation signals and
//! their outcomes are appended to a JSON-lines file. On startup the tail of
//! the file can be replayed into a [`PopulationManager`](crate::compute::PopulationManager)
//! to seed the population and the meta-learner's history. A running tick never
//! depends on the store being available.
//!
//! # File Format
//!
//! One JSON object per line, tagged by `entry`:
//!
//! ```text
//! {"entry":"Observation","timestamp":"...","source":"user","payload":"...","affect":-0.2}
//! {"entry":"Fitness","tick":3,"cell_id":17,"descriptor":{"kind":"Recurrent",...},"score":{...}}
//! {"entry":"Signal","tick":3,"parameter":"vm.swappiness","value":10.0,...}
//! {"entry":"Outcome","tick":3,"parameter":"vm.swappiness","value":10.0,"success":true,"error":null}
//! {"entry":"Lineage","descriptor":{...},"survival_age":9,"mean_fitness":0.71,...}
//! ```

mod format;
mod player;
mod recorder;

pub use format::{AuditEntry, decode_entry, encode_entry};
pub use player::AuditPlayer;
pub use recorder::{AuditRecorder, AuditStats, RecorderConfig};
