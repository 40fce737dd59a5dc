//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `healthops` exit codes.
//! Exit codes are part of the shell contract; schedulers and scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                |
//! |---------|-----------|--------------------------------------------|
//! | 0       | Universal | Success                                    |
//! | 1       | Universal | General error (unspecified)                |
//! | 2       | Universal | CLI usage error (bad args)                 |
//! | 3-9     | local     | Configuration and filesystem               |
//! | 10-19   | pipeline  | Registry acquisition and run outcomes      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - the requested stages completed and produced their archives.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown flag values.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Local (3-9)
// =============================================================================

/// Config file unreadable, unparseable, or failing validation.
pub const EXIT_CONFIG: u8 = 3;

/// Filesystem failure: corpus directory missing, output not writable,
/// consolidated archive absent or corrupt.
pub const EXIT_IO: u8 = 4;

// =============================================================================
// Pipeline (10-19)
// =============================================================================

/// No registry could be obtained: download failed and the cache holds no
/// fallback. Fatal before reconciliation, no outputs are written.
pub const EXIT_REGISTRY_UNAVAILABLE: u8 = 10;

/// The corpus yielded zero accepted rows. Nothing is archived.
pub const EXIT_NO_ACCEPTED_ROWS: u8 = 11;

/// A registry file was obtained but has no key column or no usable rows.
pub const EXIT_REGISTRY_UNUSABLE: u8 = 12;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let mut codes = vec![
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_CONFIG,
            EXIT_IO,
            EXIT_REGISTRY_UNAVAILABLE,
            EXIT_NO_ACCEPTED_ROWS,
            EXIT_REGISTRY_UNUSABLE,
        ];
        let before = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), before);
    }
}
