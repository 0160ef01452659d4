// Matching: similarity, role alignment, the domain gate and the hybrid engine.
// Everything here except the handlers is pure and CPU-bound; handlers run
// the engine inside tokio::task::spawn_blocking.

pub mod alignment;
pub mod banding;
pub mod engine;
pub mod gate;
pub mod handlers;
pub mod scoring_config;
pub mod similarity;
