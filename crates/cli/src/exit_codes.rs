//! CLI Exit Code Registry
//!
//! Single source of truth for `tally` exit codes. Schedulers and scripts
//! branch on these, so they are part of the shell contract.
//!
//! | Code | Meaning                                           |
//! |------|---------------------------------------------------|
//! | 0    | Success                                           |
//! | 1    | General error (unspecified)                       |
//! | 2    | Usage error (bad args, unreadable config path)    |
//! | 3    | Config failed to parse or validate                |
//! | 4    | Records could not be read; nothing was published  |
//! | 5    | Summary could not be published                    |
//! | 6    | `audit --fail-on-duplicates` found duplicates     |
//!
//! Adding a code: add the constant, document its trigger, update the table.

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing or unreadable files named on the
/// command line, malformed `--as-of`.
pub const EXIT_USAGE: u8 = 2;

/// Config parse or validation failure.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Record snapshot could not be read. Reads are not retried; the previous
/// summary stays live.
pub const EXIT_SOURCE: u8 = 4;

/// Summary write failed after every allowed attempt, or was rejected.
pub const EXIT_PUBLISH: u8 = 5;

/// Duplicate line items found and `--fail-on-duplicates` was given.
pub const EXIT_DUPLICATES: u8 = 6;

/// Map an engine error onto the registry.
pub fn engine_exit_code(err: &tally_rollup::EngineError) -> u8 {
    use tally_rollup::EngineError;
    match err {
        EngineError::ConfigParse(_) | EngineError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        EngineError::Source(_) => EXIT_SOURCE,
        EngineError::Publish { .. } | EngineError::Serialize(_) => EXIT_PUBLISH,
    }
}
