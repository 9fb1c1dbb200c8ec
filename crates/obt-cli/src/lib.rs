//! OBT CLI - encrypt and decrypt off-chain transaction content fields
//!
//! This crate provides a command-line interface for:
//! - Importing and listing account keys
//! - Encrypting funds request and record payloads for a counterparty
//! - Decrypting content fields read from the ledger

pub mod cli;
pub mod config;
pub mod keystore;
pub mod output;

#[cfg(test)]
mod proptests;

pub use cli::Cli;
pub use config::{CliOverrides, Config};
pub use output::{JsonResponse, OutputFormat, OutputFormatter};

use obt_crypto::envelope::EnvelopeError;
use obt_crypto::schema::SchemaError;
use obt_crypto::{ContentError, KeyStoreError};

/// Exit codes for CLI operations
///
/// - 0: Success
/// - 1: General error
/// - 2: Authentication failed - MAC mismatch, tampered content or wrong keys
/// - 5: Invalid input - bad keys, bad base64, malformed arguments
/// - 6: Undecodable content - authentic, but no schema variant could read it
/// - 7: Account not found in the key store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    AuthenticationFailed = 2,
    InvalidInput = 5,
    UndecodableContent = 6,
    AccountNotFound = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::AuthenticationFailed => "AUTH_FAILED",
            ExitCode::InvalidInput => "INVALID_INPUT",
            ExitCode::UndecodableContent => "UNDECODABLE_CONTENT",
            ExitCode::AccountNotFound => "ACCOUNT_NOT_FOUND",
        }
    }

    /// Classify a content error for scripting.
    pub fn for_content_error(err: &ContentError) -> Self {
        if err.is_authentication_failure() {
            return ExitCode::AuthenticationFailed;
        }
        if err.is_decoding_exhausted() {
            return ExitCode::UndecodableContent;
        }
        match err {
            ContentError::KeyStore(KeyStoreError::AccountNotFound(_) | KeyStoreError::NoKeys(_)) => {
                ExitCode::AccountNotFound
            }
            ContentError::Key(_)
            | ContentError::InvalidEncoding(_)
            | ContentError::Envelope(
                EnvelopeError::MalformedEnvelope(_)
                | EnvelopeError::InvalidIvLength(_)
                | EnvelopeError::EmptyPlaintext,
            )
            | ContentError::Schema(
                SchemaError::MissingField(_)
                | SchemaError::InvalidFieldValue(_)
                | SchemaError::FieldTooLong(_)
                | SchemaError::UnknownContentType(_),
            ) => ExitCode::InvalidInput,
            _ => ExitCode::GeneralError,
        }
    }
}
