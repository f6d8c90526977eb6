//! postmill database layer
//!
//! Defines the article and publisher-profile documents, the partial field
//! sets used for find-and-modify writes, and the [`DocumentStore`] seam the
//! ingestion pipeline writes through. The query engine behind the store is
//! external; [`MemoryStore`] is the in-process implementation.
//!
//! # Example
//!
//! ```rust,no_run
//! use postmill_db::{ArticleFields, ArticleId, DocumentStore, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!     let id = ArticleId::new("Bz1", "Mid1", "2");
//!     let fields = ArticleFields { title: Some("hello".into()), ..Default::default() };
//!     store.set_article(&id, &fields, true).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod schema;
pub mod store;
pub mod memory;

pub use error::{DbError, Result};
pub use schema::{Article, ArticleFields, ArticleId, PublisherProfile, ProfileFields};
pub use store::DocumentStore;
pub use memory::{MemoryStore, StoreStats};
