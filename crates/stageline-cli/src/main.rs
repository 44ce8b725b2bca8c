// crates/stageline-cli/src/main.rs
// ============================================================================
// Module: Stageline CLI Entry Point
// Description: Command dispatcher for procedure, sync, registry, and entry tasks.
// Purpose: Provide a safe, localized CLI over the Stageline registry and store.
// Dependencies: clap, serde, stageline-config, stageline-core, stageline-store-sqlite, thiserror.
// ============================================================================

//! ## Overview
//! The Stageline CLI applies procedure configurations to parts, re-syncs
//! registered parts against their stored schemas, and inspects the registry
//! and per-part entry tables. All user-facing strings are routed through the
//! i18n catalog to prepare for future localization. Security posture: inputs
//! are untrusted and must be validated.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use stageline_cli::i18n::Locale;
use stageline_cli::i18n::set_locale;
use stageline_cli::t;
use stageline_config::StagelineConfig;
use stageline_config::StoreBackend;
use stageline_config::config_toml_example;
use stageline_core::ApplyReport;
use stageline_core::CancelFlag;
use stageline_core::CanonicalName;
use stageline_core::DataEntry;
use stageline_core::EntryRepository;
use stageline_core::FieldName;
use stageline_core::FieldValue;
use stageline_core::ProcedureConfiguration;
use stageline_core::ProcedureCoordinator;
use stageline_core::RegistryPage;
use stageline_core::ResyncReport;
use stageline_core::ResyncRequest;
use stageline_core::SchemaRegistry;
use stageline_core::StorageProvisioner;
use stageline_core::synthesize;
use stageline_store_sqlite::SqlitePartStore;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of an entry values or filter JSON input.
const MAX_ENTRY_INPUT_BYTES: usize = 1024 * 1024;
/// Default page size for registry listings.
const DEFAULT_LIST_LIMIT: usize = 20;
/// Environment variable for CLI locale selection.
const LANG_ENV: &str = "STAGELINE_LANG";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "stageline", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Preferred output language (overrides `STAGELINE_LANG`).
    #[arg(long, value_enum, value_name = "LANG", global = true)]
    lang: Option<LangArg>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Procedure configuration validation and apply workflows.
    Procedure {
        /// Selected procedure subcommand.
        #[command(subcommand)]
        command: ProcedureCommand,
    },
    /// Re-syncs registered parts against their stored schemas.
    Sync(SyncCommand),
    /// Schema registry inspection utilities.
    Registry {
        /// Selected registry subcommand.
        #[command(subcommand)]
        command: RegistryCommand,
    },
    /// Entry creation and query utilities.
    Entry {
        /// Selected entry subcommand.
        #[command(subcommand)]
        command: EntryCommand,
    },
    /// Configuration management utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Procedure subcommands.
#[derive(Subcommand, Debug)]
enum ProcedureCommand {
    /// Applies a procedure configuration to a part.
    Apply(ProcedureApplyCommand),
    /// Validates a procedure configuration without touching storage.
    Validate(ProcedureValidateCommand),
}

/// Registry subcommands.
#[derive(Subcommand, Debug)]
enum RegistryCommand {
    /// Lists registered parts in canonical-name order.
    List(RegistryListCommand),
    /// Shows the registration record for one part.
    Show(RegistryShowCommand),
}

/// Entry subcommands.
#[derive(Subcommand, Debug)]
enum EntryCommand {
    /// Creates an entry for a provisioned part.
    Create(EntryCreateCommand),
    /// Queries entries for a provisioned part.
    Query(EntryQueryCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validates the configuration file without running anything.
    Validate(ConfigValidateCommand),
    /// Prints an example configuration file.
    Example,
}

/// Arguments for `procedure apply`.
#[derive(Args, Debug)]
struct ProcedureApplyCommand {
    /// Raw part name to apply the procedure to.
    #[arg(long, value_name = "PART")]
    part: String,
    /// Path to the procedure configuration JSON file.
    #[arg(long, value_name = "PATH")]
    procedure: PathBuf,
    /// Optional config file path (defaults to stageline.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output format for the apply report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `procedure validate`.
#[derive(Args, Debug)]
struct ProcedureValidateCommand {
    /// Path to the procedure configuration JSON file.
    #[arg(long, value_name = "PATH")]
    procedure: PathBuf,
    /// Optional config file path (defaults to stageline.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `sync`.
#[derive(Args, Debug)]
struct SyncCommand {
    /// Optional raw part name; when absent every registered part is synced.
    #[arg(long, value_name = "PART")]
    part: Option<String>,
    /// Destructively rebuild storage instead of additive repair.
    #[arg(long, action = ArgAction::SetTrue)]
    force: bool,
    /// Optional config file path (defaults to stageline.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output format for the sync report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `registry list`.
#[derive(Args, Debug)]
struct RegistryListCommand {
    /// Opaque continuation token from a previous page.
    #[arg(long, value_name = "TOKEN")]
    cursor: Option<String>,
    /// Maximum number of parts to return.
    #[arg(long, value_name = "COUNT", default_value_t = DEFAULT_LIST_LIMIT)]
    limit: usize,
    /// Optional config file path (defaults to stageline.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output format for registry listings.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `registry show`.
#[derive(Args, Debug)]
struct RegistryShowCommand {
    /// Raw part name to look up.
    #[arg(long, value_name = "PART")]
    part: String,
    /// Optional config file path (defaults to stageline.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `entry create`.
#[derive(Args, Debug)]
struct EntryCreateCommand {
    /// Raw part name to create the entry under.
    #[arg(long, value_name = "PART")]
    part: String,
    /// Path to a JSON object of field values.
    #[arg(long, value_name = "PATH")]
    values: PathBuf,
    /// Optional config file path (defaults to stageline.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `entry query`.
#[derive(Args, Debug)]
struct EntryQueryCommand {
    /// Raw part name to query entries for.
    #[arg(long, value_name = "PART")]
    part: String,
    /// Optional path to a JSON object of equality filters.
    #[arg(long, value_name = "PATH")]
    filter: Option<PathBuf>,
    /// Optional config file path (defaults to stageline.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output format for query results.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to stageline.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Output formats for structured command results.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum OutputFormat {
    /// Canonical JSON output.
    Json,
    /// Human-readable text output.
    Text,
}

/// Supported CLI language selections.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum LangArg {
    /// English.
    En,
    /// Spanish.
    Es,
}

impl From<LangArg> for Locale {
    fn from(value: LangArg) -> Self {
        match value {
            LangArg::En => Self::En,
            LangArg::Es => Self::Es,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for localized error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a localized message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let env_lang = std::env::var(LANG_ENV).ok();
    let locale = resolve_locale(cli.lang, env_lang.as_deref())?;
    set_locale(locale);
    if locale != Locale::En {
        write_stderr_line(&t!("i18n.disclaimer.machine_translated"))
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Procedure {
            command,
        } => command_procedure(&command),
        Commands::Sync(command) => command_sync(&command),
        Commands::Registry {
            command,
        } => command_registry(&command),
        Commands::Entry {
            command,
        } => command_entry(&command),
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Procedure Commands
// ============================================================================

/// Dispatches procedure subcommands.
fn command_procedure(command: &ProcedureCommand) -> CliResult<ExitCode> {
    match command {
        ProcedureCommand::Apply(command) => command_procedure_apply(command),
        ProcedureCommand::Validate(command) => command_procedure_validate(command),
    }
}

/// Executes `procedure apply`.
fn command_procedure_apply(command: &ProcedureApplyCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let procedure = read_procedure_input(&command.procedure, &config)?;
    let store = open_part_store(&config)?;
    let coordinator = coordinator_for(&store, &config);
    let report = coordinator.apply(&command.part, &procedure).map_err(|err| {
        CliError::new(t!("procedure.apply.failed", part = command.part, error = err))
    })?;
    let text = render_apply_text(&report);
    emit_output(&report, command.format, text)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `procedure validate`.
fn command_procedure_validate(command: &ProcedureValidateCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let procedure = read_procedure_input(&command.procedure, &config)?;
    let schema = synthesize(&procedure)
        .map_err(|err| CliError::new(t!("procedure.synthesis_failed", error = err)))?;
    let stages = procedure.stages.values().filter(|stage| stage.enabled).count();
    let fields = schema.fields.len();
    write_stdout_line(&t!("procedure.validate.ok", stages = stages, fields = fields))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Reads and parses a procedure configuration file under the configured limits.
fn read_procedure_input(
    path: &Path,
    config: &StagelineConfig,
) -> CliResult<ProcedureConfiguration> {
    let bytes =
        read_bytes_with_limit(path, config.limits.max_procedure_bytes).map_err(|err| match err {
            ReadLimitError::Io(err) => {
                CliError::new(t!("procedure.read_failed", path = path.display(), error = err))
            }
            ReadLimitError::TooLarge {
                size,
                limit,
            } => CliError::new(t!(
                "input.read_too_large",
                kind = t!("procedure.kind.input"),
                path = path.display(),
                size = size,
                limit = limit
            )),
        })?;
    let text = String::from_utf8(bytes).map_err(|err| {
        CliError::new(t!("procedure.read_failed", path = path.display(), error = err))
    })?;
    ProcedureConfiguration::from_json_str_with_limits(&text, config.limits.procedure_limits())
        .map_err(|err| {
            CliError::new(t!("procedure.parse_failed", path = path.display(), error = err))
        })
}

/// Renders a procedure apply report in text form.
fn render_apply_text(report: &ApplyReport) -> String {
    let mut buffer = String::new();
    buffer.push_str(&t!("procedure.apply.header"));
    buffer.push('\n');
    buffer.push_str(&t!(
        "procedure.apply.summary",
        part = report.canonical_name,
        storage = report.storage_name,
        created = report.created,
        changed = report.changed,
        columns = format_columns(&report.columns_added)
    ));
    buffer.push('\n');
    buffer
}

// ============================================================================
// SECTION: Sync Command
// ============================================================================

/// Executes the `sync` command.
fn command_sync(command: &SyncCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let store = open_part_store(&config)?;
    let coordinator = coordinator_for(&store, &config);
    let request = ResyncRequest {
        part: command.part.clone(),
        force: command.force,
    };
    let cancel = CancelFlag::new();
    let report = coordinator
        .resync(&request, &cancel)
        .map_err(|err| CliError::new(t!("sync.failed", error = err)))?;
    let text = render_resync_text(&report);
    emit_output(&report, command.format, text)?;
    if report.has_failures() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Renders a re-sync report in text form.
fn render_resync_text(report: &ResyncReport) -> String {
    let mut buffer = String::new();
    buffer.push_str(&t!("sync.header"));
    buffer.push('\n');
    if report.parts.is_empty() {
        buffer.push_str(&t!("sync.none"));
        buffer.push('\n');
    }
    for part in &report.parts {
        match &part.error {
            Some(error) => buffer.push_str(&t!(
                "sync.entry.failed",
                part = part.canonical_name,
                error = error
            )),
            None => buffer.push_str(&t!(
                "sync.entry",
                part = part.canonical_name,
                created = part.created,
                changed = part.changed,
                columns = format_columns(&part.columns_added)
            )),
        }
        buffer.push('\n');
    }
    if report.cancelled {
        buffer.push_str(&t!("sync.cancelled"));
        buffer.push('\n');
    }
    buffer
}

// ============================================================================
// SECTION: Registry Commands
// ============================================================================

/// Dispatches registry subcommands.
fn command_registry(command: &RegistryCommand) -> CliResult<ExitCode> {
    match command {
        RegistryCommand::List(command) => command_registry_list(command),
        RegistryCommand::Show(command) => command_registry_show(command),
    }
}

/// Executes `registry list`.
fn command_registry_list(command: &RegistryListCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let store = open_part_store(&config)?;
    let page = store
        .list(command.cursor.clone(), command.limit)
        .map_err(|err| CliError::new(t!("registry.list.failed", error = err)))?;
    let text = render_registry_list_text(&page);
    emit_output(&page, command.format, text)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `registry show`.
fn command_registry_show(command: &RegistryShowCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let store = open_part_store(&config)?;
    let name = parse_part_name(&command.part)?;
    let entry = store
        .lookup(&name)
        .map_err(|err| CliError::new(t!("registry.show.failed", error = err)))?;
    let Some(entry) = entry else {
        return Err(CliError::new(t!("registry.show.not_found", part = name)));
    };
    let bytes = canonical_output_bytes(&entry)?;
    write_stdout_bytes_with_newline(&bytes)?;
    Ok(ExitCode::SUCCESS)
}

/// Renders a registry page in text form.
fn render_registry_list_text(page: &RegistryPage) -> String {
    let mut buffer = String::new();
    buffer.push_str(&t!("registry.list.header"));
    buffer.push('\n');
    if page.items.is_empty() {
        buffer.push_str(&t!("registry.list.none"));
        buffer.push('\n');
    }
    for item in &page.items {
        buffer.push_str(&t!(
            "registry.list.entry",
            part = item.canonical_name,
            storage = item.storage_name,
            fields = item.schema.fields.len(),
            hash = item.content_hash.value
        ));
        buffer.push('\n');
    }
    if let Some(token) = &page.next_token {
        buffer.push_str(&t!("registry.list.more", token = token));
        buffer.push('\n');
    }
    buffer
}

// ============================================================================
// SECTION: Entry Commands
// ============================================================================

/// Dispatches entry subcommands.
fn command_entry(command: &EntryCommand) -> CliResult<ExitCode> {
    match command {
        EntryCommand::Create(command) => command_entry_create(command),
        EntryCommand::Query(command) => command_entry_query(command),
    }
}

/// Executes `entry create`.
fn command_entry_create(command: &EntryCreateCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let store = open_part_store(&config)?;
    let name = parse_part_name(&command.part)?;
    let values = read_field_map(&command.values, &t!("entry.kind.values"))?;
    let entry = store
        .create(&name, values)
        .map_err(|err| CliError::new(t!("entry.create.failed", part = name, error = err)))?;
    let bytes = canonical_output_bytes(&entry)?;
    write_stdout_bytes_with_newline(&bytes)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `entry query`.
fn command_entry_query(command: &EntryQueryCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let store = open_part_store(&config)?;
    let name = parse_part_name(&command.part)?;
    let filter = match &command.filter {
        Some(path) => read_field_map(path, &t!("entry.kind.filter"))?,
        None => BTreeMap::new(),
    };
    let entries = store
        .query(&name, filter)
        .map_err(|err| CliError::new(t!("entry.query.failed", part = name, error = err)))?;
    let output = EntryQueryOutput {
        entries,
    };
    let text = render_entries_text(&output.entries);
    emit_output(&output, command.format, text)?;
    Ok(ExitCode::SUCCESS)
}

/// Output for `entry query`.
#[derive(Serialize)]
struct EntryQueryOutput {
    /// Entries matching the filter in stable identifier order.
    entries: Vec<DataEntry>,
}

/// Reads a JSON object file into entry field values.
fn read_field_map(path: &Path, kind: &str) -> CliResult<BTreeMap<String, FieldValue>> {
    let bytes = read_bytes_with_limit(path, MAX_ENTRY_INPUT_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => CliError::new(t!(
            "entry.input.read_failed",
            kind = kind,
            path = path.display(),
            error = err
        )),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(t!(
            "input.read_too_large",
            kind = kind,
            path = path.display(),
            size = size,
            limit = limit
        )),
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        CliError::new(t!(
            "entry.input.parse_failed",
            kind = kind,
            path = path.display(),
            error = err
        ))
    })
}

/// Renders queried entries in text form.
fn render_entries_text(entries: &[DataEntry]) -> String {
    let mut buffer = String::new();
    buffer.push_str(&t!("entry.query.header"));
    buffer.push('\n');
    if entries.is_empty() {
        buffer.push_str(&t!("entry.query.none"));
        buffer.push('\n');
    }
    for entry in entries {
        buffer.push_str(&t!(
            "entry.query.entry",
            id = entry.entry_id,
            created_at = entry.created_at,
            updated_at = entry.updated_at,
            values = format_values(&entry.values)
        ));
        buffer.push('\n');
    }
    buffer
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(command),
        ConfigCommand::Example => command_config_example(),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = load_config(command.config.as_deref())?;
    write_stdout_line(&t!("config.validate.ok"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the config example command.
fn command_config_example() -> CliResult<ExitCode> {
    write_stdout_bytes(config_toml_example().as_bytes())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Backend Helpers
// ============================================================================

/// Loads the Stageline configuration for a command.
fn load_config(path: Option<&Path>) -> CliResult<StagelineConfig> {
    StagelineConfig::load(path).map_err(|err| CliError::new(t!("config.load_failed", error = err)))
}

/// Opens the configured `SQLite` part store for stateful commands.
fn open_part_store(config: &StagelineConfig) -> CliResult<SqlitePartStore> {
    if config.store.store_type != StoreBackend::Sqlite {
        return Err(CliError::new(t!("store.backend.unsupported")));
    }
    let store_config = config
        .store
        .sqlite_config()
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
    SqlitePartStore::new(store_config)
        .map_err(|err| CliError::new(t!("store.open_failed", error = err)))
}

/// Builds a coordinator over the part store with the configured retry policy.
fn coordinator_for(store: &SqlitePartStore, config: &StagelineConfig) -> ProcedureCoordinator {
    let registry: Arc<dyn SchemaRegistry + Send + Sync> = Arc::new(store.clone());
    let provisioner: Arc<dyn StorageProvisioner + Send + Sync> = Arc::new(store.clone());
    ProcedureCoordinator::with_retry_policy(registry, provisioner, config.sync.retry_policy())
}

/// Sanitizes a raw part name argument into its canonical form.
fn parse_part_name(raw: &str) -> CliResult<CanonicalName> {
    CanonicalName::from_raw(raw)
        .map_err(|err| CliError::new(t!("part.invalid", part = raw, error = err)))
}

// ============================================================================
// SECTION: Locale Helpers
// ============================================================================

/// Resolves the CLI locale from flags or environment.
fn resolve_locale(lang: Option<LangArg>, env_lang: Option<&str>) -> CliResult<Locale> {
    if let Some(lang) = lang {
        return Ok(lang.into());
    }
    if let Some(value) = env_lang {
        return Locale::parse(value).ok_or_else(|| {
            CliError::new(t!("i18n.lang.invalid_env", env = LANG_ENV, value = value))
        });
    }
    Ok(Locale::En)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let read_limit = limit.saturating_add(1);
    let mut limited = file.take(read_limit);
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes raw bytes to stdout with a trailing newline.
fn write_stdout_bytes_with_newline(bytes: &[u8]) -> CliResult<()> {
    let mut buffer = bytes.to_vec();
    buffer.push(b'\n');
    write_stdout_bytes(&buffer).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Computes canonical JSON bytes for output rendering.
fn canonical_output_bytes<T: Serialize>(value: &T) -> CliResult<Vec<u8>> {
    serde_jcs::to_vec(value).map_err(|err| CliError::new(t!("output.json_failed", error = err)))
}

/// Emits a structured result as canonical JSON or rendered text.
fn emit_output<T: Serialize>(value: &T, format: OutputFormat, text: String) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let bytes = canonical_output_bytes(value)?;
            write_stdout_bytes_with_newline(&bytes)?;
        }
        OutputFormat::Text => {
            let mut output = text;
            if !output.ends_with('\n') {
                output.push('\n');
            }
            write_stdout_bytes(output.as_bytes())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    Ok(())
}

/// Formats a column list for text output.
fn format_columns(columns: &[String]) -> String {
    if columns.is_empty() {
        return t!("report.columns.none");
    }
    columns.join(",")
}

/// Formats entry field values as space-separated name=value pairs.
fn format_values(values: &BTreeMap<FieldName, FieldValue>) -> String {
    let mut pairs = Vec::with_capacity(values.len());
    for (name, value) in values {
        let rendered = match value {
            FieldValue::Boolean(flag) => flag.to_string(),
            FieldValue::Text(text) => text.clone(),
        };
        pairs.push(format!("{name}={rendered}"));
    }
    pairs.join(" ")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats a localized output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
