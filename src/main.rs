//! ruledeck - iptables operator console
//!
//! # Usage
//!
//! ```bash
//! ruledeck list                              # All chains with their rules
//! ruledeck list --search tcp --by-target     # Matching rules grouped by target
//! ruledeck add INPUT -p tcp --dport 22 -j ACCEPT
//! ruledeck add INPUT --spec "-m state --state NEW -j ACCEPT" --position 1
//! ruledeck edit INPUT 3 -j DROP --dry-run    # Show the change without sending it
//! ruledeck delete INPUT 3
//! ruledeck compose -p udp --dport 53 -j ACCEPT
//! ruledeck options                           # Pick lists for the rule form
//! ruledeck history                           # Recent rule changes
//! ruledeck config init --ssh-host gw.lan --ssh-user admin
//! ```
//!
//! Commands run `iptables` locally (via run0/sudo/pkexec when not root) or
//! on the host configured under `ssh` in `config.json`.

use clap::{Args, Parser, Subcommand};
use ruledeck::audit::AuditLog;
use ruledeck::config::{
    AppConfig, SshConfig, default_config_path, init_config_at, load_config_from,
};
use ruledeck::console::Console;
use ruledeck::core::error::{Error, IptablesErrorPattern};
use ruledeck::core::index::ViewMode;
use ruledeck::core::session::Feedback;
use ruledeck::core::spec::{RuleFields, compose};
use ruledeck::core::store::IptablesStore;
use ruledeck::render;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

shadow_rs::shadow!(build);

#[derive(Parser)]
#[command(name = "ruledeck")]
#[command(version = build::PKG_VERSION)]
#[command(about = "Inspect and edit iptables chains", long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Structured rule attributes, one flag per field
#[derive(Args, Debug, Default)]
struct FieldArgs {
    /// Protocol (`all` matches any)
    #[arg(short = 'p', long)]
    protocol: Option<String>,
    /// Incoming interface
    #[arg(short = 'i', long = "in-interface")]
    in_interface: Option<String>,
    /// Outgoing interface
    #[arg(short = 'o', long = "out-interface")]
    out_interface: Option<String>,
    /// Source address or network
    #[arg(short = 's', long)]
    source: Option<String>,
    /// Destination address or network
    #[arg(short = 'd', long)]
    destination: Option<String>,
    /// Source port
    #[arg(long)]
    sport: Option<String>,
    /// Destination port
    #[arg(long)]
    dport: Option<String>,
    /// Extra match text placed before the target, e.g. "-m state --state NEW"
    #[arg(long, allow_hyphen_values = true)]
    extension: Option<String>,
    /// Target (ACCEPT, DROP, a user chain, ...)
    #[arg(short = 'j', long)]
    target: Option<String>,
}

impl FieldArgs {
    /// Overwrites every field that was given on the command line.
    fn apply(self, fields: &mut RuleFields) {
        let pairs = [
            (self.protocol, &mut fields.protocol),
            (self.in_interface, &mut fields.in_interface),
            (self.out_interface, &mut fields.out_interface),
            (self.source, &mut fields.source),
            (self.destination, &mut fields.destination),
            (self.sport, &mut fields.source_port),
            (self.dport, &mut fields.destination_port),
            (self.extension, &mut fields.extension),
            (self.target, &mut fields.target),
        ];
        for (value, field) in pairs {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show chains and rules
    List {
        /// Only rules containing this text (case-insensitive)
        #[arg(long, value_name = "KEYWORD")]
        search: Option<String>,
        /// Group rules by target instead of by chain
        #[arg(long)]
        by_target: bool,
        /// Group rules by chain (overrides the configured default view)
        #[arg(long, conflicts_with = "by_target")]
        by_chain: bool,
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Add a rule from flags, or from raw specification text with --spec
    Add {
        chain: String,
        #[command(flatten)]
        fields: FieldArgs,
        /// Raw specification text, sent as typed
        #[arg(long, allow_hyphen_values = true, conflicts_with_all = [
            "protocol", "in_interface", "out_interface", "source", "destination",
            "sport", "dport", "extension", "target",
        ])]
        spec: Option<String>,
        /// Insert at this 1-based position instead of appending
        #[arg(long)]
        position: Option<u32>,
    },
    /// Change fields of an existing rule
    Edit {
        chain: String,
        number: u32,
        #[command(flatten)]
        fields: FieldArgs,
        /// Print the change without sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete a rule
    Delete { chain: String, number: u32 },
    /// Print the specification text for a set of fields
    Compose {
        #[arg(long, default_value = "INPUT")]
        chain: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Show the values offered for each field of the rule form
    Options {
        /// Preselect this chain
        #[arg(long)]
        chain: Option<String>,
    },
    /// Show recent rule changes from the audit log
    History {
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
    /// Create or show the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a config file with defaults and the given SSH target
    Init {
        /// Run iptables on this host over ssh
        #[arg(long, requires = "ssh_user")]
        ssh_host: Option<String>,
        #[arg(long, requires = "ssh_host")]
        ssh_user: Option<String>,
        #[arg(long, requires = "ssh_host")]
        ssh_port: Option<u16>,
        /// Private key for ssh
        #[arg(long, requires = "ssh_host", value_name = "PATH")]
        identity_file: Option<PathBuf>,
        /// iptables binary to run (e.g. iptables-legacy)
        #[arg(long)]
        iptables_binary: Option<String>,
        /// Group `list` output by target by default
        #[arg(long)]
        by_target: bool,
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the path and the effective configuration
    Show,
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Set up logging to file
    if let Some(mut log_path) = ruledeck::utils::get_state_dir() {
        log_path.push("ruledeck.log");
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let _ = ruledeck::utils::ensure_dirs();
    let cli = Cli::parse();
    init_logging();
    tracing::info!(
        "ruledeck {} ({} built {})",
        build::PKG_VERSION,
        build::SHORT_COMMIT,
        build::BUILD_TIME
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(handle_cli(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

/// Prints the error verbatim, plus hints for well-known iptables failures.
fn report_error(error: &Error) {
    eprintln!("Error: {error}");
    let stderr = match error {
        Error::RuleStore {
            stderr: Some(stderr),
            ..
        } => stderr.as_str(),
        _ => return,
    };
    if let Some(translation) = IptablesErrorPattern::match_error(stderr) {
        eprintln!("  {}", translation.user_message);
        for suggestion in &translation.suggestions {
            eprintln!("  - {suggestion}");
        }
    }
}

async fn load_app_config(path: Option<&Path>) -> AppConfig {
    match path {
        Some(path) => load_config_from(path).await,
        None => AppConfig::default(),
    }
}

async fn handle_config(
    action: ConfigAction,
    path: Option<PathBuf>,
    current: &AppConfig,
) -> Result<(), Error> {
    let Some(path) = path else {
        return Err(Error::validation(
            "config",
            "No default config location on this platform; pass --config PATH",
        ));
    };

    match action {
        ConfigAction::Init {
            ssh_host,
            ssh_user,
            ssh_port,
            identity_file,
            iptables_binary,
            by_target,
            force,
        } => {
            let mut config = AppConfig::default();
            if let (Some(host), Some(user)) = (ssh_host, ssh_user) {
                let mut ssh = SshConfig::new(host, user);
                if let Some(port) = ssh_port {
                    ssh.port = port;
                }
                ssh.identity_file = identity_file;
                config.ssh = Some(ssh);
            }
            if let Some(binary) = iptables_binary {
                config.iptables_binary = binary;
            }
            if by_target {
                config.default_view = ViewMode::Target;
            }

            if init_config_at(&config, &path, force).await? {
                println!("✓ Config written to {}", path.display());
            } else {
                println!(
                    "{} already exists; use --force to replace it.",
                    path.display()
                );
            }
        }
        ConfigAction::Show => {
            println!("# {}", path.display());
            println!("{}", serde_json::to_string_pretty(current)?);
        }
    }
    Ok(())
}

fn open_console(config: AppConfig) -> Console<IptablesStore> {
    let view = config.default_view;
    let console = Console::new(IptablesStore::new(config), view);
    match AuditLog::new() {
        Ok(audit) => console.with_audit(audit),
        Err(e) => {
            tracing::warn!("Audit log unavailable: {}", e);
            console
        }
    }
}

/// Prints the unified diff of two specification texts, one argument per line.
fn print_spec_diff(old: &str, new: &str) {
    let old_text = old.split(' ').collect::<Vec<_>>().join("\n") + "\n";
    let new_text = new.split(' ').collect::<Vec<_>>().join("\n") + "\n";

    let diff = similar::TextDiff::from_lines(&old_text, &new_text);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            similar::ChangeTag::Delete => "- ",
            similar::ChangeTag::Insert => "+ ",
            similar::ChangeTag::Equal => "  ",
        };
        print!("{sign}{change}");
    }
}

/// Turns a rejected submit into the error to report, keeping the draft's feedback.
fn submit_error(console: &Console<IptablesStore>, error: Error) -> Error {
    match console.session().feedback() {
        Some(Feedback::Invalid { field, message }) => Error::validation(field, message),
        _ => error,
    }
}

async fn handle_cli(cli: Cli) -> Result<(), Error> {
    let config_path = cli.config.or_else(default_config_path);
    let config = load_app_config(config_path.as_deref()).await;

    match cli.command {
        Commands::List {
            search,
            by_target,
            by_chain,
            json,
        } => {
            let mut console = open_console(config);
            console.refresh().await?;
            if let Some(search) = search {
                console.set_keyword(search);
            }
            if by_target {
                console.set_view_mode(ViewMode::Target);
            } else if by_chain {
                console.set_view_mode(ViewMode::Chain);
            }

            let view = console.view();
            if json {
                println!("{}", render::render_json(&view)?);
            } else {
                print!("{}", render::render_text(&view));
            }
        }
        Commands::Add {
            chain,
            fields,
            spec,
            position,
        } => {
            let mut console = open_console(config);
            if let Some(spec) = spec {
                console.add_rule(&chain, &spec, position).await?;
                println!("✓ Rule added to {chain}.");
                return Ok(());
            }

            console.open_create(Some(&chain));
            if let Some(draft) = console.draft_mut() {
                fields.apply(&mut draft.fields);
                draft.position = position;
            }
            if let Err(e) = console.submit().await {
                return Err(submit_error(&console, e));
            }
            println!("✓ Rule added to {chain}.");
        }
        Commands::Edit {
            chain,
            number,
            fields,
            dry_run,
        } => {
            let mut console = open_console(config);
            console.refresh().await?;
            if !console.open_edit(&chain, number) {
                return Err(Error::validation(
                    "rule",
                    format!("Rule {number} not found in chain {chain}"),
                ));
            }

            let Some(draft) = console.draft_mut() else {
                return Err(Error::NoSession);
            };
            let before = draft.specification()?;
            fields.apply(&mut draft.fields);
            let after = draft.specification()?;

            if before == after {
                println!("No changes.");
                return Ok(());
            }
            print_spec_diff(&before, &after);
            if dry_run {
                return Ok(());
            }

            if let Err(e) = console.submit().await {
                return Err(submit_error(&console, e));
            }
            println!("✓ Rule {number} in {chain} updated.");
        }
        Commands::Delete { chain, number } => {
            let mut console = open_console(config);
            console.delete_rule(&chain, number).await?;
            println!("✓ Rule {number} deleted from {chain}.");
        }
        Commands::Compose { chain, fields } => {
            let mut rule = RuleFields::default();
            fields.apply(&mut rule);
            println!("{}", compose(&chain, &rule)?);
        }
        Commands::Options { chain } => {
            let mut console = open_console(config);
            console.refresh().await?;
            if let Some(chain) = chain {
                console.open_create(Some(&chain));
            }
            print!("{}", render::render_pick_lists(&console.pick_lists()));
        }
        Commands::History { count } => {
            let audit = AuditLog::new()?;
            let events = match audit.read_recent(count).await {
                Ok(events) => events,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            if events.is_empty() {
                println!("No rule changes recorded.");
            }
            for event in events {
                println!("{}", event.summary());
                if let Some(error) = event.error {
                    println!("    {error}");
                }
            }
        }
        Commands::Config { action } => handle_config(action, config_path, &config).await?,
    }
    Ok(())
}
