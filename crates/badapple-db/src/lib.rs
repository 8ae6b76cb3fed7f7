//! Badapple Database Layer
//!
//! Abstract read/write interfaces over the compound, substance, activity and
//! scaffold tables, with two implementations:
//!
//! - [`PgStore`]: PostgreSQL via `tokio-postgres`, one connection per run
//! - [`MemoryStore`]: in-process tables for tests and dry runs
//!
//! # Example
//!
//! ```rust,no_run
//! use badapple_db::{ActivityReader, PgStore, StoreLayout};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PgStore::connect("host=localhost dbname=badapple2", StoreLayout::default()).await?;
//!     store.initialize().await?;
//!     let cids = store.compound_ids().await?;
//!     println!("{} compounds", cids.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod schema;
pub mod store;
pub mod postgres;
pub mod memory;

pub use error::{DbError, Result};
pub use schema::{Identifier, StoreLayout, DEFAULT_SCAFFOLD_TABLE};
pub use store::{ActivityReader, ActivityStore, ActivityWriter};
pub use postgres::PgStore;
pub use memory::MemoryStore;
