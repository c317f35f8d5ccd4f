//! Application configuration types

pub mod execution_params;

pub use execution_params::{
    ExecutionParams, ExecutionParamsError, ExecutionStrategy, SESSION_CLOSE_TIMEOUT,
    STRUCTURED_CONCURRENCY_ENV,
};
