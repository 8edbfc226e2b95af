//! Core infrastructure shared by the encoder, the translator and the driver.
//!
//! Register identifiers, the error types and the per-block arena session.

pub mod error;
pub mod register_file;
pub mod session;
pub mod test_utils;

pub use error::{CompileError, CompileResult, ExecutionError, FetchError};
pub use register_file::{AsmReg, RegBank, RegBitSet, RegId, FP_BANK, GP_BANK};
pub use session::{SessionStats, TranslationSession};
