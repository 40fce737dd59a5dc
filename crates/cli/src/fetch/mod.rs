//! Registry acquisition: directory-index download with a local cache fallback.

mod common;
pub mod registry;

pub use registry::{acquire, first_csv_link, newest_cached_csv, RegistryOrigin, RegistrySource};
