//! Output formatting for CLI results
//!
//! Three output formats:
//! - Table: Human-readable tables (default)
//! - JSON: Structured JSON for scripting and automation
//! - Quiet: Minimal output; the bare content string for `encrypt`, nothing
//!   otherwise

use std::str::FromStr;

use comfy_table::{presets::UTF8_FULL, Table};
use obt_crypto::schema::{schema_for, SchemaVariant};
use obt_crypto::{ContentPayload, ContentType};
use serde::Serialize;

use crate::keystore::AccountInfo;
use crate::ExitCode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Quiet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

/// Standard JSON response wrapper
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code_name: Option<&'static str>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn success_with_command(data: T, command: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: Some(command.to_string()),
            exit_code: None,
            exit_code_name: None,
        }
    }
}

impl JsonResponse<()> {
    pub fn error_with_code(message: &str, code: ExitCode) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
            exit_code: Some(code.into()),
            exit_code_name: Some(code.name()),
        }
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
    verbose: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn format_accounts(&self, accounts: &[AccountInfo]) -> String {
        match self.format {
            OutputFormat::Table => self.accounts_table(accounts),
            OutputFormat::Json => {
                let data: Vec<_> = accounts.iter().map(AccountOutput::from).collect();
                self.to_json_response(&data, "keys list")
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_account(&self, account: &AccountInfo, command: &str) -> String {
        match self.format {
            OutputFormat::Table => self.account_table(account),
            OutputFormat::Json => self.to_json_response(&AccountOutput::from(account), command),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_encrypted(&self, content_type: ContentType, content: &str) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Property", "Value"]);
                table.add_row(vec!["Content Type", content_type.schema_name()]);
                table.add_row(vec!["Content", content]);
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(
                &EncryptOutput {
                    content_type: content_type.schema_name(),
                    content,
                },
                "encrypt",
            ),
            OutputFormat::Quiet => content.to_string(),
        }
    }

    pub fn format_decrypted(&self, payload: &ContentPayload) -> String {
        match self.format {
            OutputFormat::Table => self.payload_table(payload),
            OutputFormat::Json => self.to_json_response(
                &DecryptOutput {
                    content_type: payload.content_type().schema_name(),
                    content: payload,
                },
                "decrypt",
            ),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format error with exit code context
    pub fn format_error_with_code(&self, error: &dyn std::error::Error, code: ExitCode) -> String {
        match self.format {
            OutputFormat::Table => format!("Error: {error}"),
            OutputFormat::Json => {
                self.to_json(&JsonResponse::<()>::error_with_code(&error.to_string(), code))
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Progress message, verbose table mode only
    pub fn progress(&self, message: &str) {
        if self.verbose && self.format == OutputFormat::Table {
            eprintln!("... {message}");
        }
    }

    pub fn success(&self, message: &str) {
        if self.format == OutputFormat::Table {
            println!("✓ {message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if self.format == OutputFormat::Table {
            eprintln!("⚠ {message}");
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    fn to_json_response<T: Serialize>(&self, value: &T, command: &str) -> String {
        self.to_json(&JsonResponse::success_with_command(value, command))
    }

    fn accounts_table(&self, accounts: &[AccountInfo]) -> String {
        if accounts.is_empty() {
            return "No accounts found.".to_string();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Account", "Public Key", "Keys"]);
        for info in accounts {
            table.add_row(vec![
                info.account.clone(),
                info.public_key.to_string(),
                info.key_count.to_string(),
            ]);
        }
        table.to_string()
    }

    fn account_table(&self, info: &AccountInfo) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Property", "Value"]);
        table.add_row(vec!["Account".to_string(), info.account.clone()]);
        table.add_row(vec!["Public Key".to_string(), info.public_key.to_string()]);
        table.add_row(vec!["Typed Public Key".to_string(), info.public_key.to_typed_string()]);
        table.add_row(vec!["Keys".to_string(), info.key_count.to_string()]);
        table.to_string()
    }

    /// One row per field, in schema order.
    fn payload_table(&self, payload: &ContentPayload) -> String {
        let values = match serde_json::to_value(payload) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return "Error: payload could not be rendered".to_string(),
        };
        let content_type = payload.content_type();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Field", "Value"]);
        table.add_row(vec!["content_type", content_type.schema_name()]);
        for name in schema_for(content_type, SchemaVariant::Strict).field_names() {
            let value = values.get(name).and_then(|v| v.as_str()).unwrap_or("");
            table.add_row(vec![name, value]);
        }
        table.to_string()
    }
}

#[derive(Serialize)]
struct AccountOutput {
    account: String,
    public_key: String,
    typed_public_key: String,
    key_count: usize,
}

impl From<&AccountInfo> for AccountOutput {
    fn from(info: &AccountInfo) -> Self {
        Self {
            account: info.account.clone(),
            public_key: info.public_key.to_string(),
            typed_public_key: info.public_key.to_typed_string(),
            key_count: info.key_count,
        }
    }
}

#[derive(Serialize)]
struct EncryptOutput<'a> {
    content_type: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct DecryptOutput<'a> {
    content_type: &'static str,
    content: &'a ContentPayload,
}
