use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// Registry table has no column that can serve as the join key.
    MissingRegistryColumn { field: &'static str, headers: Vec<String> },
    /// Registry table has a header but no usable rows.
    EmptyRegistry,
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRegistryColumn { field, headers } => {
                write!(f, "registry: no {field} column among [{}]", headers.join(", "))
            }
            Self::EmptyRegistry => write!(f, "registry: no entries with a usable key"),
        }
    }
}

impl std::error::Error for ReconError {}
