//! Generation: prompt assembly, citation verification and the per-turn
//! pipeline

pub mod citation;
pub mod prompt;
pub mod turn;

pub use turn::ChatPipeline;
