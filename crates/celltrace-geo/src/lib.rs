//! Tiered cell-location cache for Celltrace
//!
//! Lookup order is memory, then the durable local cache file, then the
//! remote geolocation provider; both file tiers are loaded into memory at
//! startup and remote successes are written through to memory and disk.

pub mod cache;
pub mod cache_file;
pub mod dataset;
pub mod provider;

pub use cache::LocationCache;
pub use cache_file::{load_cache_file, CacheFileWriter, CACHE_FILE_HEADER};
pub use dataset::load_reference_dataset;
pub use provider::{CellLocator, UnwiredClient};
