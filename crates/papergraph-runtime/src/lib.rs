//! Query runtime: answers questions over the similarity index and concept
//! graph, and explains graph nodes.
//!
//! Retrieval picks chunks, their documents become stops on a traversal path
//! stitched through the concept graph, and an external generator (when
//! configured) synthesizes the answer. Every synthesis path has a
//! deterministic heuristic fallback.

pub mod orchestrator;
pub mod pipeline;
pub mod stitch;
pub mod types;

pub use orchestrator::{QueryOrchestrator, NO_CONTENT_MESSAGE};
pub use pipeline::{BuildReport, PaperGraph};
pub use stitch::stitch_path;
pub use types::*;
