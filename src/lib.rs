//! Cell Field - A self-adapting population of lightweight predictive cells.
//!
//! The field keeps a bounded population of cells, each defined by a closed
//! architecture descriptor. Every tick it condenses recent observations into
//! a context, scores every cell against it, kills weak cells, lets strong
//! ones reproduce with mutation (biased by a meta-learner's memory of
//! successful lineages), and turns aggregate metrics into adaptation signals
//! for the environment.
//!
//! # Architecture
//!
//! - `schema`: Configuration and data types
//! - `compute`: Context, interpreter, evolution and the tick itself
//! - `runtime`: Scheduled tick loop, queues, snapshot handle and signal sink
//! - `audit`: JSON-lines audit log and startup replay
//!
//! # Example
//!
//! ```rust
//! use cell_field::{
//!     compute::{AdaptationEmitter, PopulationManager},
//!     schema::{FieldConfig, ObservationEvent, ObservationFeed, FeedError},
//! };
//!
//! struct Once(Option<Vec<ObservationEvent>>);
//!
//! impl ObservationFeed for Once {
//!     fn poll_batch(&mut self, _max: usize) -> Result<Vec<ObservationEvent>, FeedError> {
//!         Ok(self.0.take().unwrap_or_default())
//!     }
//! }
//!
//! let config = FieldConfig { random_seed: Some(7), ..FieldConfig::default() };
//! let mut emitter = AdaptationEmitter::new(config.adaptation.clone());
//! let mut manager = PopulationManager::new(config).unwrap();
//!
//! let mut feed = Once(Some(vec![ObservationEvent::now("user", "disk is filling up", -0.6)]));
//! for _ in 0..5 {
//!     let report = manager.tick(&mut feed);
//!     for signal in emitter.evaluate(&report.snapshot.metrics, chrono::Utc::now()) {
//!         println!("{} -> {}", signal.parameter, signal.value);
//!     }
//! }
//!
//! println!("{}", manager.snapshot().status());
//! ```

pub mod audit;
pub mod compute;
pub mod runtime;
pub mod schema;

// Re-export commonly used types
pub use compute::{AdaptationEmitter, PopulationManager, TickReport};
pub use runtime::FieldRuntime;
pub use schema::{FieldConfig, FieldStatus, ObservationEvent};
