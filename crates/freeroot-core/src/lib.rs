//! Bootstrap orchestration for freeroot.
//!
//! Ties the architecture resolver, the artifact fetcher, the workspace
//! manager and the runtime pieces together into a single run driven by a
//! validated stage machine: resolve, fetch, install, normalize, compose,
//! launch.

pub mod bootstrap;
pub mod lifecycle;

pub use bootstrap::{
    clean_workspace, error_chain, BootstrapOptions, BootstrapReporter, Bootstrapper, RunResult,
    SilentReporter,
};
pub use lifecycle::{validate_transition, Lifecycle, Stage};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Schema(#[from] freeroot_schema::SchemaError),
    #[error("workspace error: {0}")]
    Store(#[from] freeroot_store::StoreError),
    #[error("download error: {0}")]
    Fetch(#[from] freeroot_remote::FetchError),
    #[error("rootfs install error: {0}")]
    Archive(#[from] freeroot_runtime::ArchiveError),
    #[error("runtime error: {0}")]
    Runtime(#[from] freeroot_runtime::RuntimeError),
    #[error("invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
    #[error("interrupted")]
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_errors_keep_their_message() {
        let e: CoreError = freeroot_remote::FetchError::NotFound("http://x/a".to_owned()).into();
        assert!(e.to_string().contains("http://x/a"));
        assert!(e.to_string().starts_with("download error"));
    }

    #[test]
    fn transition_error_names_both_stages() {
        let e = validate_transition(Stage::Success, Stage::Init).unwrap_err();
        let msg = e.to_string();
        assert!(msg.contains("success"));
        assert!(msg.contains("init"));
    }
}
