mod logging;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use groupwatch_client::RobloxClient;
use groupwatch_core::{ConfigManager, GroupId, RelationKind, Settings};
use groupwatch_scan::{RoleSelection, Scanner};
use output::{CommandOutput, OutputFormat};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "groupwatch")]
#[command(about = "GroupWatch - flag users and group members belonging to watched groups", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty, table)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Directory holding default.toml, {env}.toml and local.toml
    #[arg(long, global = true, env = "GROUPWATCH_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Configuration environment (overrides GROUPWATCH_ENV)
    #[arg(long, global = true)]
    env: Option<String>,

    /// .ROBLOSECURITY cookie sent with every request
    #[arg(long, global = true, env = "ROBLOSECURITY", hide_env_values = true)]
    cookie: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a user and their friends, followers and followings
    User {
        /// Username or numeric user id
        target: String,

        #[command(flatten)]
        scan: ScanArgs,

        /// Relation lists to walk (comma-separated)
        #[arg(short, long, value_enum, value_delimiter = ',')]
        relations: Vec<RelationArg>,

        /// Maximum identities per relation list
        #[arg(long, conflicts_with = "no_cap")]
        cap: Option<usize>,

        /// Walk every page of every relation list
        #[arg(long)]
        no_cap: bool,

        /// Skip checking the target's own memberships
        #[arg(long)]
        no_self: bool,
    },

    /// Scan the members of a group, optionally limited to a role range
    Group {
        /// Group id
        group_id: GroupId,

        #[command(flatten)]
        scan: ScanArgs,

        /// First role index (see `roles`)
        #[arg(long, requires = "to_role", conflicts_with_all = ["min_rank", "max_rank"])]
        from_role: Option<usize>,

        /// Last role index (see `roles`)
        #[arg(long, requires = "from_role")]
        to_role: Option<usize>,

        /// Lowest rank to scan
        #[arg(long)]
        min_rank: Option<u8>,

        /// Highest rank to scan
        #[arg(long)]
        max_rank: Option<u8>,

        /// Maximum members fetched per role
        #[arg(long)]
        cap: Option<usize>,
    },

    /// List a group's roles with the indices used by `group --from-role`
    Roles {
        /// Group id
        group_id: GroupId,
    },

    /// Resolve a username or id without scanning
    Resolve {
        /// Username or numeric user id
        input: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Watch-list group ids (comma-separated), replacing the configured list
    #[arg(short, long, value_delimiter = ',')]
    watch: Vec<GroupId>,

    /// Fetch profile and avatar details for flagged users
    #[arg(long)]
    profiles: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum RelationArg {
    Friends,
    Followers,
    Followings,
}

impl From<RelationArg> for RelationKind {
    fn from(arg: RelationArg) -> Self {
        match arg {
            RelationArg::Friends => RelationKind::Friends,
            RelationArg::Followers => RelationKind::Followers,
            RelationArg::Followings => RelationKind::Followings,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(output) => {
            output::print_output(&cli.output, &output)?;
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<CommandOutput> {
    let config = load_config(cli)?;
    logging::init(&config.settings().logging, cli.verbose);
    info!(
        "Configuration loaded from {:?} (env: {}, watch list: {} groups)",
        config.config_dir(),
        config.env(),
        config.settings().scan.watch_list.len()
    );

    let mut settings = config.into_settings();
    if let Some(cookie) = &cli.cookie {
        settings.api.session_cookie = Some(SecretString::from(cookie.clone()));
    }

    execute_command(cli, settings).await
}

fn load_config(cli: &Cli) -> Result<ConfigManager> {
    ConfigManager::load(cli.config_dir.clone(), cli.env.clone())
        .context("Failed to load configuration")
}

async fn execute_command(cli: &Cli, mut settings: Settings) -> Result<CommandOutput> {
    match &cli.command {
        Commands::User {
            target,
            scan,
            relations,
            cap,
            no_cap,
            no_self,
        } => {
            apply_scan_args(&mut settings, scan);
            if !relations.is_empty() {
                settings.scan.relations = relations.iter().map(|&r| r.into()).collect();
            }
            if let Some(cap) = cap {
                settings.scan.relation_cap = *cap;
                settings.scan.no_cap = false;
            }
            if *no_cap {
                settings.scan.no_cap = true;
            }
            if *no_self {
                settings.scan.include_target = false;
            }
            settings.validate().context("Invalid scan settings")?;

            let report = scanner(&settings)?
                .scan_user(target)
                .await
                .context("User scan failed")?;
            Ok(CommandOutput::Report(report))
        }
        Commands::Group {
            group_id,
            scan,
            from_role,
            to_role,
            min_rank,
            max_rank,
            cap,
        } => {
            apply_scan_args(&mut settings, scan);
            if cap.is_some() {
                settings.scan.member_cap = *cap;
            }
            settings.validate().context("Invalid scan settings")?;

            let selection = match (from_role, to_role, min_rank, max_rank) {
                (Some(from), Some(to), _, _) => RoleSelection::indices(*from, *to),
                (_, _, None, None) => RoleSelection::All,
                (_, _, min, max) => RoleSelection::ranks(min.unwrap_or(0), max.unwrap_or(u8::MAX)),
            };

            let report = scanner(&settings)?
                .scan_group(*group_id, selection)
                .await
                .with_context(|| format!("Scan of group {} failed", group_id))?;
            Ok(CommandOutput::Report(report))
        }
        Commands::Roles { group_id } => {
            let scanner = scanner(&settings)?;
            let group = scanner
                .group_info(*group_id)
                .await
                .context("Failed to look up group")?;
            let roles = scanner
                .list_roles(*group_id)
                .await
                .context("Failed to list roles")?;
            Ok(CommandOutput::Roles { group, roles })
        }
        Commands::Resolve { input } => {
            let identity = scanner(&settings)?.resolve(input).await;
            Ok(CommandOutput::Resolved {
                input: input.clone(),
                identity,
            })
        }
        Commands::Config => Ok(CommandOutput::Config(settings)),
    }
}

fn apply_scan_args(settings: &mut Settings, scan: &ScanArgs) {
    if !scan.watch.is_empty() {
        settings.scan.watch_list = scan.watch.clone();
    }
    if scan.profiles {
        settings.scan.enrich_profiles = true;
    }
}

fn scanner(settings: &Settings) -> Result<Scanner> {
    let client = RobloxClient::new(settings.api.clone())?;
    Ok(Scanner::from_settings(Arc::new(client), settings))
}
