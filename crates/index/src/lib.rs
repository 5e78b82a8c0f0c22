mod error;
mod metadata;
mod namespace;
mod vector;

pub use error::{IndexError, Result};
pub use metadata::{ChunkRecord, JsonlWriter, MetadataSequence};
pub use namespace::{Namespace, NamespaceKey, NamespaceStore, INDEX_FILE, METADATA_FILE};
pub use vector::{SearchHit, VectorIndex};
