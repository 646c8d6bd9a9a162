pub mod chunking;
pub mod ingest;
pub mod model;
pub mod pubmed;

pub use chunking::{reassemble, split, split_documents, split_text, ChunkSpan};
pub use ingest::{IngestOutcome, KnowledgeIngestor, TopicReport};
pub use model::{Chunk, KnowledgeDocument};
pub use pubmed::{LiteratureSource, PubMedClient, PubmedArticle};
