//! PaperGraph Core: shared records, configuration, corpus snapshots.

pub mod config;
pub mod corpus;
pub mod error;
pub mod snapshot;
pub mod types;

pub use config::{DataPaths, PaperGraphConfig};
pub use corpus::{load_corpus, Corpus};
pub use error::{Error, Result};
pub use types::{Chunk, Document};
