use thiserror::Error;

use crate::parse::ParseError;
use crate::store::StoreError;
use crate::{CompileError, EvalError};

/// Unified error type covering parsing, compilation, evaluation, storage and I/O.
///
/// Returned by convenience methods like [`RulesEngine::from_dsl()`](crate::RulesEngine::from_dsl)
/// and [`RulesEngine::from_file()`](crate::RulesEngine::from_file).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
