//! CLI command definitions and argument parsing

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use obt_crypto::{
    decrypt_content_with_store, encrypt_content_with_store, ContentPayload, ContentType,
    FundsRequestContent, PrivateKey, RecordContent,
};

use crate::config::Config;
use crate::keystore::{FileKeyStore, KeyFileError};
use crate::output::{OutputFormat, OutputFormatter};
use crate::ExitCode;

/// OBT CLI - encrypt and decrypt off-chain transaction content
#[derive(Parser, Debug)]
#[command(name = "obt")]
#[command(version, about = "Encrypt and decrypt OBT request and record content")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: table, json, quiet
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Key store file path (overrides config)
    #[arg(long, global = true, env = "OBT_KEYSTORE")]
    pub keystore: Option<PathBuf>,
}

impl Cli {
    /// Execute the command with a resolved configuration
    pub fn execute_with_config(self, config: Config) -> anyhow::Result<ExitCode> {
        let format: OutputFormat = config
            .output
            .format
            .parse()
            .map_err(anyhow::Error::msg)?;
        let ctx = CommandContext {
            formatter: OutputFormatter::new(format, config.output.verbose),
            config,
        };

        match self.command {
            Commands::Keys(args) => args.execute(&ctx),
            Commands::Encrypt(args) => args.execute(&ctx),
            Commands::Decrypt(args) => args.execute(&ctx),
        }
    }
}

/// Shared state for one command run
pub struct CommandContext {
    pub config: Config,
    pub formatter: OutputFormatter,
}

impl CommandContext {
    fn open_store(&self) -> anyhow::Result<FileKeyStore> {
        let path = self
            .config
            .keystore
            .resolved_path()
            .ok_or(KeyFileError::NoPath)?;
        self.formatter.progress(&format!("Opening key store {}...", path.display()));
        FileKeyStore::open(&path).with_context(|| format!("opening key store {}", path.display()))
    }

    fn fail(&self, error: &dyn std::error::Error, code: ExitCode) -> ExitCode {
        let message = self.formatter.format_error_with_code(error, code);
        match self.formatter.format() {
            OutputFormat::Json => println!("{message}"),
            OutputFormat::Table => eprintln!("{message}"),
            OutputFormat::Quiet => {}
        }
        code
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage account keys
    Keys(KeysArgs),
    /// Encrypt a request or record payload
    Encrypt(EncryptArgs),
    /// Decrypt a content field
    Decrypt(DecryptArgs),
}

#[derive(Args, Debug)]
pub struct KeysArgs {
    #[command(subcommand)]
    pub action: KeysAction,
}

#[derive(Subcommand, Debug)]
pub enum KeysAction {
    /// Import a private key (WIF or PVT_K1_) for an account
    Import {
        #[arg(long)]
        account: String,
        #[arg(long, env = "OBT_PRIVATE_KEY", hide_env_values = true)]
        key: String,
    },
    /// Show an account's public key
    Show {
        #[arg(long)]
        account: String,
    },
    /// List accounts
    List,
}

impl KeysArgs {
    pub fn execute(self, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
        let formatter = &ctx.formatter;
        match self.action {
            KeysAction::Import { account, key } => {
                let key: PrivateKey = match key.trim().parse() {
                    Ok(key) => key,
                    Err(e) => return Ok(ctx.fail(&e, ExitCode::InvalidInput)),
                };
                let mut store = ctx.open_store()?;
                if !store.import(&account, key)? {
                    formatter.warning(&format!("Key already present for {account}"));
                }
                let info = store.account(&account)?;
                formatter.success(&format!("Imported key for {account}"));
                print_nonempty(&formatter.format_account(&info, "keys import"));
                Ok(ExitCode::Success)
            }
            KeysAction::Show { account } => {
                let store = ctx.open_store()?;
                match store.account(&account) {
                    Ok(info) => {
                        print_nonempty(&formatter.format_account(&info, "keys show"));
                        Ok(ExitCode::Success)
                    }
                    Err(e) => Ok(ctx.fail(&e, ExitCode::AccountNotFound)),
                }
            }
            KeysAction::List => {
                let store = ctx.open_store()?;
                print_nonempty(&formatter.format_accounts(&store.accounts()));
                Ok(ExitCode::Success)
            }
        }
    }
}

#[derive(Args, Debug)]
pub struct EncryptArgs {
    #[command(subcommand)]
    pub content: EncryptContent,
}

#[derive(Subcommand, Debug)]
pub enum EncryptContent {
    /// Encrypt new_funds_content for a funds request
    Request(RequestArgs),
    /// Encrypt record_send_content for an OBT record
    Record(RecordArgs),
}

/// Sender and recipient of an encrypted payload
#[derive(Args, Debug)]
pub struct Parties {
    /// Sending account in the key store
    #[arg(long)]
    pub account: String,

    /// Recipient public key (FIO…, EOS… or PUB_K1_…)
    #[arg(long)]
    pub to: String,
}

/// Fields shared by requests and records
#[derive(Args, Debug)]
pub struct CommonFields {
    #[arg(long)]
    pub payee_address: String,
    #[arg(long)]
    pub amount: String,
    #[arg(long)]
    pub chain_code: String,
    #[arg(long)]
    pub token_code: String,
    #[arg(long, default_value = "")]
    pub memo: String,
    #[arg(long, default_value = "")]
    pub hash: String,
    #[arg(long, default_value = "")]
    pub offline_url: String,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    #[command(flatten)]
    pub parties: Parties,
    #[command(flatten)]
    pub fields: CommonFields,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    #[command(flatten)]
    pub parties: Parties,
    #[arg(long)]
    pub payer_address: String,
    #[arg(long)]
    pub status: String,
    #[arg(long, default_value = "")]
    pub obt_id: String,
    #[command(flatten)]
    pub fields: CommonFields,
}

impl EncryptContent {
    fn into_parts(self) -> (Parties, ContentPayload) {
        match self {
            EncryptContent::Request(RequestArgs { parties, fields }) => (
                parties,
                ContentPayload::Request(FundsRequestContent {
                    payee_public_address: fields.payee_address,
                    amount: fields.amount,
                    chain_code: fields.chain_code,
                    token_code: fields.token_code,
                    memo: fields.memo,
                    hash: fields.hash,
                    offline_url: fields.offline_url,
                }),
            ),
            EncryptContent::Record(RecordArgs {
                parties,
                payer_address,
                status,
                obt_id,
                fields,
            }) => (
                parties,
                ContentPayload::Record(RecordContent {
                    payer_public_address: payer_address,
                    payee_public_address: fields.payee_address,
                    amount: fields.amount,
                    chain_code: fields.chain_code,
                    token_code: fields.token_code,
                    status,
                    obt_id,
                    memo: fields.memo,
                    hash: fields.hash,
                    offline_url: fields.offline_url,
                }),
            ),
        }
    }
}

impl EncryptArgs {
    pub fn execute(self, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
        let (parties, payload) = self.content.into_parts();
        let content_type = payload.content_type();
        let store = ctx.open_store()?;

        ctx.formatter.progress(&format!("Encrypting {content_type} for {}...", parties.to));
        match encrypt_content_with_store(&store, &parties.account, &parties.to, &payload) {
            Ok(content) => {
                println!("{}", ctx.formatter.format_encrypted(content_type, &content));
                Ok(ExitCode::Success)
            }
            Err(e) => Ok(ctx.fail(&e, ExitCode::for_content_error(&e))),
        }
    }
}

#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// Receiving account in the key store
    #[arg(long)]
    pub account: String,

    /// Sender public key (FIO…, EOS… or PUB_K1_…)
    #[arg(long)]
    pub from: String,

    /// Content type of the ledger action: request or record
    #[arg(long)]
    pub content_type: ContentType,

    /// Base64 content field
    pub content: String,
}

impl DecryptArgs {
    pub fn execute(self, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
        let store = ctx.open_store()?;

        ctx.formatter.progress(&format!("Decrypting {} from {}...", self.content_type, self.from));
        match decrypt_content_with_store(
            &store,
            &self.account,
            &self.from,
            &self.content,
            self.content_type,
        ) {
            Ok(payload) => {
                print_nonempty(&ctx.formatter.format_decrypted(&payload));
                Ok(ExitCode::Success)
            }
            Err(e) => Ok(ctx.fail(&e, ExitCode::for_content_error(&e))),
        }
    }
}

fn print_nonempty(text: &str) {
    if !text.is_empty() {
        println!("{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEV_WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";
    const DEV_PUB: &str = "FIO6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV";

    fn context(temp_dir: &TempDir) -> CommandContext {
        let mut config = Config::default();
        config.keystore.path = Some(temp_dir.path().join("keys.json"));
        CommandContext {
            config,
            formatter: OutputFormatter::new(OutputFormat::Quiet, false),
        }
    }

    fn run(ctx: &CommandContext, args: &[&str]) -> ExitCode {
        let cli = Cli::try_parse_from(std::iter::once("obt").chain(args.iter().copied())).unwrap();
        match cli.command {
            Commands::Keys(args) => args.execute(ctx),
            Commands::Encrypt(args) => args.execute(ctx),
            Commands::Decrypt(args) => args.execute(ctx),
        }
        .unwrap()
    }

    #[test]
    fn test_parse_decrypt() {
        let cli = Cli::try_parse_from([
            "obt", "decrypt", "--account", "bob", "--from", DEV_PUB, "--content-type", "record",
            "--output", "json", "abc=",
        ])
        .unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Json));
        match cli.command {
            Commands::Decrypt(args) => {
                assert_eq!(args.content_type, ContentType::Record);
                assert_eq!(args.content, "abc=");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_content_type() {
        let result = Cli::try_parse_from([
            "obt", "decrypt", "--account", "bob", "--from", DEV_PUB, "--content-type", "cancel", "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_encrypt_record_defaults() {
        let cli = Cli::try_parse_from([
            "obt", "encrypt", "record", "--account", "alice", "--to", DEV_PUB,
            "--payer-address", "0xpayer", "--payee-address", "0xpayee", "--amount", "1",
            "--chain-code", "ETH", "--token-code", "ETH", "--status", "sent_to_blockchain",
        ])
        .unwrap();
        let Commands::Encrypt(args) = cli.command else {
            panic!("expected encrypt");
        };
        let (parties, payload) = args.content.into_parts();
        assert_eq!(parties.account, "alice");
        let ContentPayload::Record(record) = payload else {
            panic!("expected record");
        };
        assert_eq!(record.payer_public_address, "0xpayer");
        assert_eq!(record.obt_id, "");
        assert_eq!(record.memo, "");
    }

    #[test]
    fn test_import_rejects_bad_key() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);
        let code = run(&ctx, &["keys", "import", "--account", "alice", "--key", "5Knotakey"]);
        assert_eq!(code, ExitCode::InvalidInput);
    }

    #[test]
    fn test_show_unknown_account() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);
        assert_eq!(run(&ctx, &["keys", "show", "--account", "nobody"]), ExitCode::AccountNotFound);
    }

    #[test]
    fn test_encrypt_from_unknown_account() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);
        let code = run(
            &ctx,
            &[
                "encrypt", "request", "--account", "ghost", "--to", DEV_PUB, "--payee-address",
                "addr1", "--amount", "1.0000", "--chain-code", "FIO", "--token-code", "FIO",
            ],
        );
        assert_eq!(code, ExitCode::AccountNotFound);
    }

    #[test]
    fn test_decrypt_exit_codes() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);
        assert_eq!(
            run(&ctx, &["keys", "import", "--account", "alice", "--key", DEV_WIF]),
            ExitCode::Success
        );
        let bob = PrivateKey::from_bytes(&[0x42; 32]).unwrap();
        let bob_text = bob.to_wif();
        assert_eq!(
            run(&ctx, &["keys", "import", "--account", "bob", "--key", &bob_text]),
            ExitCode::Success
        );

        let payload = ContentPayload::Request(FundsRequestContent {
            payee_public_address: "addr1".into(),
            amount: "1.0000".into(),
            chain_code: "FIO".into(),
            token_code: "FIO".into(),
            ..Default::default()
        });
        let store = ctx.open_store().unwrap();
        let content =
            encrypt_content_with_store(&store, "alice", &bob.public_key().to_string(), &payload)
                .unwrap();

        let decrypt = |account: &str, content: &str| {
            run(
                &ctx,
                &["decrypt", "--account", account, "--from", DEV_PUB, "--content-type", "request", content],
            )
        };
        assert_eq!(decrypt("bob", content.as_str()), ExitCode::Success);
        assert_eq!(decrypt("alice", content.as_str()), ExitCode::AuthenticationFailed);
        assert_eq!(decrypt("carol", content.as_str()), ExitCode::AccountNotFound);
        assert_eq!(decrypt("bob", "%%%"), ExitCode::InvalidInput);
    }
}
