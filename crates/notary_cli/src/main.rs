//! Registry operator CLI.
//!
//! # Responsibility
//! - Drive provisioning, directory and ledger operations against one store.
//! - Print one JSON document per command on stdout.
//!
//! # Invariants
//! - Failures print `{ok:false,error_code,message}` on stderr and exit non-zero.
//! - File contents are digested locally; only the digest reaches the registry.

use clap::{Args, Parser, Subcommand};
use notary_core::config::{ENV_DB_PATH, ENV_OWNER};
use notary_core::db::open_db;
use notary_core::{
    init_logging_with, provision_registry, provision_single_org, AdminChange, AdminPolicy,
    ConfigError, ContentDigest, DocumentId, Identity, LedgerListQuery, LoggingOptions,
    ModelValidationError, RegistryConfig, RegistryError, RegistryService, SystemClock,
};
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const DEFAULT_DB_FILE: &str = "notary.sqlite3";

#[derive(Parser)]
#[command(name = "notary")]
#[command(about = "Document notarization registry", version, long_about = None)]
struct Cli {
    /// JSON config file (`db_path`, `owner`, `admin_policy`, `log_level`, `log_dir`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Registry database file; takes precedence over the config file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check core linkage
    Ping,
    /// Record the registry owner and admin policy
    Provision {
        /// Owner identity; defaults to the configured owner
        #[arg(long)]
        owner: Option<String>,
        /// `exclusive` or `shared`; defaults to the configured policy
        #[arg(long)]
        policy: Option<String>,
    },
    /// Provision a registry that serves exactly one organization
    ProvisionSingleOrg {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        org: String,
    },
    /// Register an organization (owner only)
    RegisterOrg {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        org: String,
    },
    /// Add an admin to an organization
    AddAdmin {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        org: String,
        #[arg(long)]
        admin: String,
    },
    /// Bind a document id to a content digest
    Notarize {
        #[arg(long)]
        caller: String,
        /// Document id, used verbatim
        #[arg(long)]
        id: String,
        #[command(flatten)]
        content: ContentArgs,
    },
    /// Binding for a document id
    Show {
        #[arg(long)]
        id: String,
    },
    /// Notarization timestamp for a document id
    Timestamp {
        #[arg(long)]
        id: String,
    },
    /// Organization owning a document id
    OrgOf {
        #[arg(long)]
        id: String,
    },
    /// Check whether content was ever notarized
    Verify {
        #[command(flatten)]
        content: ContentArgs,
    },
    /// Print the SHA-256 digest of a file
    Digest {
        #[arg(long)]
        file: PathBuf,
    },
    /// List an organization's documents, newest first
    Documents {
        #[arg(long)]
        org: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Notarization statistics for an organization
    Stats {
        #[arg(long)]
        org: String,
    },
    /// List registered organizations
    Orgs,
    /// List an organization's admins
    Admins {
        #[arg(long)]
        org: String,
    },
    /// Home organization of an admin identity
    AdminOrg {
        #[arg(long)]
        identity: String,
    },
    /// Show the provisioning record
    Meta,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ContentArgs {
    /// Hex digest, optional `0x` prefix
    #[arg(long)]
    digest: Option<String>,
    /// File to digest with SHA-256
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(String),
    Io { path: PathBuf, source: std::io::Error },
    Usage(String),
    Registry(RegistryError),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Logging(_) => "logging_error",
            Self::Io { .. } => "io_error",
            Self::Usage(_) => "usage_error",
            Self::Registry(err) => err.code(),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "logging init failed: {message}"),
            Self::Io { path, source } => write!(f, "failed to read `{}`: {source}", path.display()),
            Self::Usage(message) => write!(f, "{message}"),
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<RegistryError> for CliError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<ModelValidationError> for CliError {
    fn from(value: ModelValidationError) -> Self {
        Self::Registry(value.into())
    }
}

impl From<notary_core::db::DbError> for CliError {
    fn from(value: notary_core::db::DbError) -> Self {
        Self::Registry(value.into())
    }
}

/// Resolves `NOTARY_*` variables; the binary reads the process environment.
type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Resolved runtime settings for one invocation.
#[derive(Debug)]
struct Settings {
    db_path: PathBuf,
    owner: Option<Identity>,
    admin_policy: AdminPolicy,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli, &|key| std::env::var(key).ok()) {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{:#}", error_output(&err));
            ExitCode::FAILURE
        }
    }
}

fn error_output(err: &CliError) -> Value {
    json!({ "ok": false, "error_code": err.code(), "message": err.to_string() })
}

fn run(cli: Cli, env: EnvLookup<'_>) -> Result<Value, CliError> {
    match &cli.command {
        Commands::Ping => {
            return Ok(json!({
                "ping": notary_core::ping(),
                "version": notary_core::core_version(),
            }))
        }
        Commands::Digest { file } => {
            return Ok(json!({ "digest": read_digest(file)?.to_hex() }));
        }
        _ => {}
    }

    let settings = load_settings(cli.config.as_deref(), cli.db, env)?;
    let conn = open_db(&settings.db_path)?;
    let service = RegistryService::new(&conn);

    match cli.command {
        Commands::Ping | Commands::Digest { .. } => Ok(Value::Null),
        Commands::Provision { owner, policy } => {
            let owner = resolve_owner(owner, &settings)?;
            let policy = match policy {
                Some(raw) => AdminPolicy::parse(&raw)
                    .ok_or(ModelValidationError::UnknownAdminPolicy(raw))?,
                None => settings.admin_policy,
            };
            let meta = provision_registry(&conn, &owner, policy, &SystemClock)?;
            Ok(json!({ "ok": true, "meta": meta }))
        }
        Commands::ProvisionSingleOrg { owner, org } => {
            let owner = resolve_owner(owner, &settings)?;
            let org = Identity::parse(&org)?;
            let meta = provision_single_org(&conn, &owner, &org, &SystemClock)?;
            Ok(json!({ "ok": true, "meta": meta, "org": org }))
        }
        Commands::RegisterOrg { caller, org } => {
            let org = Identity::parse(&org)?;
            service.register_org(&Identity::parse(&caller)?, &org)?;
            Ok(json!({ "ok": true, "org": org }))
        }
        Commands::AddAdmin { caller, org, admin } => {
            let change = service.add_org_admin(
                &Identity::parse(&caller)?,
                &Identity::parse(&org)?,
                &Identity::parse(&admin)?,
            )?;
            Ok(json!({ "ok": true, "added": change == AdminChange::Added }))
        }
        Commands::Notarize {
            caller,
            id,
            content,
        } => {
            let binding = service.store_document_hash(
                &Identity::parse(&caller)?,
                &DocumentId::parse(id)?,
                &content.resolve()?,
            )?;
            Ok(json!({ "ok": true, "binding": binding }))
        }
        Commands::Show { id } => {
            let binding = service.get_binding(&DocumentId::parse(id)?)?;
            Ok(json!({ "binding": binding }))
        }
        Commands::Timestamp { id } => {
            let timestamp = service.get_timestamp(&DocumentId::parse(id)?)?;
            Ok(json!({ "timestamp": timestamp }))
        }
        Commands::OrgOf { id } => {
            let org = service.get_doc_org(&DocumentId::parse(id)?)?;
            Ok(json!({ "org": org }))
        }
        Commands::Verify { content } => {
            let digest = content.resolve()?;
            let verification = service.verify_content(&digest)?;
            Ok(json!({
                "digest": digest.to_hex(),
                "verified": verification.verified,
                "timestamp": verification.timestamp,
            }))
        }
        Commands::Documents { org, limit, offset } => {
            let query = LedgerListQuery { limit, offset };
            let documents = service.list_documents(&Identity::parse(&org)?, &query)?;
            Ok(json!({
                "applied_limit": query.applied_limit(),
                "documents": documents,
            }))
        }
        Commands::Stats { org } => {
            let stats = service.org_stats(&Identity::parse(&org)?)?;
            Ok(json!(stats))
        }
        Commands::Orgs => Ok(json!({ "organizations": service.list_organizations()? })),
        Commands::Admins { org } => {
            let admins = service.list_org_admins(&Identity::parse(&org)?)?;
            Ok(json!({ "admins": admins }))
        }
        Commands::AdminOrg { identity } => {
            let org = service.admin_org(&Identity::parse(&identity)?)?;
            Ok(json!({ "org": org }))
        }
        Commands::Meta => Ok(json!({ "meta": service.registry_meta()? })),
    }
}

impl ContentArgs {
    fn resolve(&self) -> Result<ContentDigest, CliError> {
        match (&self.digest, &self.file) {
            (Some(digest), None) => Ok(ContentDigest::from_hex(digest)?),
            (None, Some(file)) => read_digest(file),
            _ => Err(CliError::Usage(
                "exactly one of --digest or --file is required".to_string(),
            )),
        }
    }
}

fn read_digest(path: &Path) -> Result<ContentDigest, CliError> {
    let content = std::fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ContentDigest::sha256(&content))
}

fn load_settings(
    config: Option<&Path>,
    db: Option<PathBuf>,
    env: EnvLookup<'_>,
) -> Result<Settings, CliError> {
    let read = |key: &str| {
        env(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let mut settings = match config {
        Some(path) => {
            let config = RegistryConfig::load_with(path, env)?;
            if let Some(log_dir) = &config.log_dir {
                init_logging_with(&LoggingOptions {
                    level: config.log_level.clone(),
                    log_dir: log_dir.clone(),
                    echo_stderr: true,
                })
                .map_err(CliError::Logging)?;
            }
            Settings {
                db_path: config.db_path,
                owner: Some(config.owner),
                admin_policy: config.admin_policy,
            }
        }
        None => Settings {
            db_path: read(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE)),
            owner: read(ENV_OWNER)
                .map(|owner| Identity::parse(&owner))
                .transpose()?,
            admin_policy: AdminPolicy::default(),
        },
    };
    if let Some(db) = db {
        settings.db_path = db;
    }
    log::debug!(
        "event=cli_settings module=cli status=ok db_path={} admin_policy={}",
        settings.db_path.display(),
        settings.admin_policy.as_str()
    );
    Ok(settings)
}

fn resolve_owner(owner: Option<String>, settings: &Settings) -> Result<Identity, CliError> {
    match owner {
        Some(raw) => Ok(Identity::parse(&raw)?),
        None => settings.owner.clone().ok_or_else(|| {
            CliError::Usage(format!(
                "owner required: pass --owner, set {ENV_OWNER} or use --config"
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{error_output, load_settings, resolve_owner, run, Cli, CliError, ContentArgs};
    use clap::Parser;
    use notary_core::config::{ENV_DB_PATH, ENV_OWNER};
    use notary_core::{AdminPolicy, ContentDigest, RegistryError};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("notary.json");
        std::fs::write(&path, body).expect("write config");
        path
    }

    fn run_args(args: &[&str]) -> Result<Value, CliError> {
        let cli = Cli::try_parse_from(args).expect("args should parse");
        run(cli, &no_env)
    }

    #[test]
    fn db_flag_overrides_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_config(
            dir.path(),
            r#"{"db_path": "from-config.db", "owner": "root", "admin_policy": "shared"}"#,
        );

        let settings = load_settings(Some(&config), None, &no_env).expect("config settings");
        assert_eq!(settings.db_path, PathBuf::from("from-config.db"));
        assert_eq!(settings.owner.as_ref().map(|owner| owner.as_str()), Some("root"));
        assert_eq!(settings.admin_policy, AdminPolicy::Shared);

        let settings = load_settings(Some(&config), Some(PathBuf::from("flag.db")), &no_env)
            .expect("flag settings");
        assert_eq!(settings.db_path, PathBuf::from("flag.db"));
        assert_eq!(settings.admin_policy, AdminPolicy::Shared);
    }

    #[test]
    fn env_fills_settings_without_config_and_flag_still_wins() {
        let env = HashMap::from([
            (ENV_DB_PATH.to_string(), " env.db ".to_string()),
            (ENV_OWNER.to_string(), "operator".to_string()),
        ]);
        let lookup = |key: &str| env.get(key).cloned();

        let settings = load_settings(None, None, &lookup).expect("env settings");
        assert_eq!(settings.db_path, PathBuf::from("env.db"));
        assert_eq!(settings.owner.as_ref().map(|owner| owner.as_str()), Some("operator"));
        assert_eq!(settings.admin_policy, AdminPolicy::Exclusive);

        let settings = load_settings(None, Some(PathBuf::from("flag.db")), &lookup)
            .expect("flag settings");
        assert_eq!(settings.db_path, PathBuf::from("flag.db"));

        let settings = load_settings(None, None, &no_env).expect("default settings");
        assert_eq!(settings.db_path, PathBuf::from(super::DEFAULT_DB_FILE));
        assert!(settings.owner.is_none());
    }

    #[test]
    fn env_overrides_config_file_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_config(dir.path(), r#"{"db_path": "from-config.db", "owner": "root"}"#);
        let lookup = |key: &str| (key == ENV_OWNER).then(|| "operator".to_string());

        let settings = load_settings(Some(&config), None, &lookup).expect("settings");
        assert_eq!(settings.db_path, PathBuf::from("from-config.db"));
        assert_eq!(settings.owner.as_ref().map(|owner| owner.as_str()), Some("operator"));
    }

    #[test]
    fn invalid_config_reports_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_config(dir.path(), r#"{"db_path": "a.db", "owner": "root", "log_level": "loud"}"#);

        let err = load_settings(Some(&config), None, &no_env).expect_err("bad level must fail");
        assert_eq!(err.code(), "config_error");

        let missing = dir.path().join("missing.json");
        let err = load_settings(Some(&missing), None, &no_env).expect_err("missing file");
        assert_eq!(err.code(), "config_error");
    }

    #[test]
    fn missing_owner_is_a_usage_error() {
        let settings = load_settings(None, Some(PathBuf::from("unused.db")), &no_env)
            .expect("settings");

        let err = resolve_owner(None, &settings).expect_err("owner is required");
        assert!(matches!(err, CliError::Usage(_)));
        assert_eq!(err.code(), "usage_error");

        let owner = resolve_owner(Some("root".to_string()), &settings).expect("explicit owner");
        assert_eq!(owner.as_str(), "root");
    }

    #[test]
    fn content_args_resolve_digest_or_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("contract.pdf");
        std::fs::write(&file, b"signed contract").expect("write file");
        let expected = ContentDigest::sha256(b"signed contract");

        let from_digest = ContentArgs {
            digest: Some(format!("0x{}", expected.to_hex())),
            file: None,
        };
        assert_eq!(from_digest.resolve().expect("digest"), expected);

        let from_file = ContentArgs {
            digest: None,
            file: Some(file),
        };
        assert_eq!(from_file.resolve().expect("file"), expected);

        let neither = ContentArgs {
            digest: None,
            file: None,
        };
        assert_eq!(neither.resolve().expect_err("needs input").code(), "usage_error");

        let bad_hex = ContentArgs {
            digest: Some("not-hex".to_string()),
            file: None,
        };
        assert_eq!(bad_hex.resolve().expect_err("bad digest").code(), "invalid_input");

        let missing = ContentArgs {
            digest: None,
            file: Some(dir.path().join("missing.bin")),
        };
        assert_eq!(missing.resolve().expect_err("missing file").code(), "io_error");
    }

    #[test]
    fn parser_requires_exactly_one_content_source() {
        assert!(Cli::try_parse_from(["notary", "verify", "--digest", "ab", "--file", "x"]).is_err());
        assert!(Cli::try_parse_from(["notary", "verify"]).is_err());
        assert!(Cli::try_parse_from(["notary", "verify", "--digest", "ab"]).is_ok());
    }

    #[test]
    fn notarize_and_verify_a_file_end_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("registry.sqlite3");
        let db = db.to_str().expect("utf-8 path");
        let file = dir.path().join("deed.txt");
        std::fs::write(&file, b"deed of sale").expect("write file");
        let file = file.to_str().expect("utf-8 path");

        let provisioned = run_args(&["notary", "--db", db, "provision", "--owner", "owner"])
            .expect("provision");
        assert_eq!(provisioned["ok"], true);
        run_args(&["notary", "--db", db, "register-org", "--caller", "owner", "--org", "org-a"])
            .expect("register org");
        let added = run_args(&[
            "notary", "--db", db, "add-admin", "--caller", "org-a", "--org", "org-a", "--admin",
            "a1",
        ])
        .expect("add admin");
        assert_eq!(added["added"], true);

        let notarized = run_args(&[
            "notary", "--db", db, "notarize", "--caller", "a1", "--id", "deed-1", "--file", file,
        ])
        .expect("notarize");
        assert_eq!(notarized["ok"], true);

        let verified = run_args(&["notary", "--db", db, "verify", "--file", file]).expect("verify");
        assert_eq!(verified["verified"], true);
        assert_eq!(
            verified["digest"],
            ContentDigest::sha256(b"deed of sale").to_hex()
        );

        let org = run_args(&["notary", "--db", db, "org-of", "--id", "deed-1"]).expect("org-of");
        assert_eq!(org["org"], "org-a");

        let unknown = run_args(&["notary", "--db", db, "verify", "--digest", &"00".repeat(32)])
            .expect("verify unknown");
        assert_eq!(unknown["verified"], false);
    }

    #[test]
    fn failures_render_as_error_envelope() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("registry.sqlite3");
        let db = db.to_str().expect("utf-8 path");

        let err = run_args(&["notary", "--db", db, "provision"]).expect_err("owner missing");
        let output = error_output(&err);
        assert_eq!(output["ok"], false);
        assert_eq!(output["error_code"], "usage_error");
        assert!(output["message"]
            .as_str()
            .is_some_and(|message| message.contains(ENV_OWNER)));

        run_args(&["notary", "--db", db, "provision", "--owner", "owner"]).expect("provision");
        let err = run_args(&["notary", "--db", db, "register-org", "--caller", "mallory", "--org", "org-x"])
            .expect_err("only the owner registers orgs");
        assert!(matches!(err, CliError::Registry(RegistryError::NotOwner { .. })));
        let output = error_output(&err);
        assert_eq!(output["ok"], false);
        assert_eq!(output["error_code"], "not_owner");
    }
}
