// File I/O operations

pub mod archive;
pub mod corpus;
pub mod csv;
pub mod output;
pub mod staging;
pub mod xlsx;

pub use archive::{list_entries, pack, ArchiveEntry};
pub use corpus::{discover, SourceFile, SourceKind};
pub use output::{write_aggregate_file, write_detailed_file, WrittenDataset};
pub use staging::{read_consolidated_archive, ConsolidatedWriter};
