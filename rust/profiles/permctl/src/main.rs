//! permctl - group permission checks against a directory fixture.
//!
//! ```text
//! permctl check --fixture dir.json --account 42 --group 7 --permission edit
//! permctl dump --fixture dir.json --account 42 --role editor --scope insider
//! ```
//!
//! `check` prints `granted` or `denied` and exits 0 / 1. Any error denies
//! and exits 2.

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use group_access::{
    group_calculator_chain, GroupPermissionCalculator, GroupPermissionChecker, GroupScope,
    InMemoryDirectory,
};
use permissions::cache::{CacheStore, MemoryCacheStore, NullCacheStore, RedbCacheStore};
use permissions::config::{parse_cache_config, CacheConfig};
use permissions::{Account, CalculatorChain, Identifier};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "permctl")]
#[command(about = "Check and inspect calculated group permissions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one permission in one group
    Check {
        #[command(flatten)]
        common: CommonArgs,

        /// Group ID
        #[arg(long)]
        group: String,

        /// Permission name
        #[arg(long)]
        permission: String,
    },
    /// Print calculated permissions as JSON
    Dump {
        #[command(flatten)]
        common: CommonArgs,

        /// Only this scope (outsider, insider, individual); default is all
        #[arg(long)]
        scope: Option<String>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Directory fixture (roles, groups, memberships)
    #[arg(long, env = "PERMCTL_FIXTURE")]
    fixture: PathBuf,

    /// redb file for the persistent cache tier
    #[arg(long, env = "PERMCTL_CACHE")]
    cache: Option<PathBuf>,

    /// Cache config (JSON)
    #[arg(long, env = "PERMCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Account ID; 0 is the anonymous account
    #[arg(long, default_value = "0")]
    account: String,

    /// Global role of the account (repeatable)
    #[arg(long = "role")]
    roles: Vec<String>,
}

impl CommonArgs {
    fn account(&self) -> Account {
        let id = Identifier::from(self.account.as_str());
        if id == Identifier::int(0) {
            let mut account = Account::anonymous();
            account.roles.extend(self.roles.iter().cloned());
            account
        } else {
            Account::authenticated(id, self.roles.iter().cloned())
        }
    }

    fn cache_config(&self) -> anyhow::Result<CacheConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                parse_cache_config(&json)
                    .with_context(|| format!("invalid cache config {}", path.display()))?
            }
            None => CacheConfig::default(),
        };
        if let Some(path) = &self.cache {
            config.persistent_path = Some(path.clone());
        }
        Ok(config)
    }
}

fn persistent_tier(path: Option<&Path>) -> Arc<dyn CacheStore> {
    let Some(path) = path else {
        return Arc::new(NullCacheStore);
    };
    match RedbCacheStore::open(path) {
        Ok(store) => {
            info!("persistent cache: {}", path.display());
            Arc::new(store)
        }
        Err(e) => {
            warn!(
                "failed to open persistent cache {}: {} (continuing without it)",
                path.display(),
                e
            );
            Arc::new(NullCacheStore)
        }
    }
}

fn setup(common: &CommonArgs) -> anyhow::Result<(Arc<InMemoryDirectory>, CalculatorChain)> {
    let directory = InMemoryDirectory::load(&common.fixture)
        .with_context(|| format!("failed to load fixture {}", common.fixture.display()))?;
    let directory = Arc::new(directory);

    let config = common.cache_config()?;
    let chain = group_calculator_chain(directory.clone(), directory.clone())
        .fast_cache(Arc::new(MemoryCacheStore::new(config.fast_capacity)))
        .persistent_cache(persistent_tier(config.persistent_path.as_deref()))
        .build();
    Ok((directory, chain))
}

fn check(common: &CommonArgs, group: &str, permission: &str) -> anyhow::Result<ExitCode> {
    let (directory, chain) = setup(common)?;
    let group = directory
        .group(&Identifier::from(group))
        .ok_or_else(|| anyhow!("unknown group {group}"))?;
    let account = common.account();

    let checker = GroupPermissionChecker::new(
        GroupPermissionCalculator::new(Arc::new(chain)),
        directory.clone(),
    );
    match checker.has_permission_in_group(permission, &account, group) {
        Ok(true) => {
            println!("granted");
            Ok(ExitCode::SUCCESS)
        }
        Ok(false) => {
            println!("denied");
            Ok(ExitCode::from(1))
        }
        Err(e) => {
            error!("permission check failed: {}", e);
            println!("denied");
            Ok(ExitCode::from(2))
        }
    }
}

fn dump(common: &CommonArgs, scope: Option<&str>) -> anyhow::Result<ExitCode> {
    let (_, chain) = setup(common)?;
    let account = common.account();

    let json = match scope {
        Some(scope) => {
            let scope: GroupScope = scope.parse().map_err(|e: String| anyhow!(e))?;
            let set = chain.calculate(&account, scope.as_str())?;
            serde_json::to_string_pretty(&*set)?
        }
        None => {
            let calculator = GroupPermissionCalculator::new(Arc::new(chain));
            let set = calculator.calculate_full_permissions(&account)?;
            serde_json::to_string_pretty(&set)?
        }
    };
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Check {
            common,
            group,
            permission,
        } => check(common, group, permission),
        Commands::Dump { common, scope } => dump(common, scope.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}
