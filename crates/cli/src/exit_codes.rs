//! CLI Exit Code Registry
//!
//! Single source of truth for `compensa` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success, every item matched a rule                       |
//! | 1    | General error (unspecified)                              |
//! | 2    | CLI usage error (bad args, reported by clap)             |
//! | 6    | Batch ran, some items are unmatched                      |
//! | 7    | Batch payload rejected (not a list, empty)               |
//! | 8    | Config invalid (parse, validation, missing column)       |
//! | 9    | Runtime failure (file read/write, serialization)         |

use compensa_engine::CompensationError;

/// Success.
pub const EXIT_SUCCESS: u8 = 0;

/// The batch ran but at least one item ended up unmatched.
pub const EXIT_UNMATCHED: u8 = 6;

/// The batch payload itself was rejected.
pub const EXIT_INVALID_BATCH: u8 = 7;

/// The config could not be parsed or does not fit the rule files.
pub const EXIT_INVALID_CONFIG: u8 = 8;

/// IO or serialization failure.
pub const EXIT_RUNTIME: u8 = 9;

/// Map an engine error to its exit code.
pub fn engine_exit_code(err: &CompensationError) -> u8 {
    match err {
        CompensationError::InvalidBatch(_) => EXIT_INVALID_BATCH,
        CompensationError::ConfigParse(_)
        | CompensationError::ConfigValidation(_)
        | CompensationError::MissingColumn { .. } => EXIT_INVALID_CONFIG,
        CompensationError::Io(_) => EXIT_RUNTIME,
    }
}
