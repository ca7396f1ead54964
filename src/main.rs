use anyhow::Result;
use clap::Parser;
use mwpkg::client::InstallRequest;
use mwpkg::commands::{
    self,
    config::{Config, ConfigOverrides},
};
use mwpkg::registry::SearchFilter;
use std::path::PathBuf;

/// mwpkg - Microweber package client
///
/// Resolve modules and templates against package registries, stage them,
/// and install them once confirmed.
///
/// Examples:
///   mwpkg search --name acme/widget --version 1.0.0
///   mwpkg request-install acme/widget 1.0.0
///   mwpkg confirm composer-confirm-key-<...>
#[derive(Parser, Debug)]
#[command(author, version = env!("MWPKG_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Userfiles root holding modules/ and templates/ (also via MWPKG_USERFILES)
    #[arg(long, env = "MWPKG_USERFILES", value_name = "PATH", global = true)]
    userfiles: Option<PathBuf>,

    /// Cache root for staging and confirmation records (also via MWPKG_CACHE_DIR)
    #[arg(long = "cache-dir", env = "MWPKG_CACHE_DIR", value_name = "PATH", global = true)]
    cache_dir: Option<PathBuf>,

    /// Registry index URL; repeat for several, queried in order
    #[arg(
        long = "registry",
        env = "MWPKG_REGISTRIES",
        value_name = "URL",
        value_delimiter = ',',
        global = true
    )]
    registries: Vec<String>,

    /// JSON array of license records sent to registries (also via MWPKG_LICENSES)
    #[arg(long, env = "MWPKG_LICENSES", value_name = "PATH", global = true)]
    licenses: Option<PathBuf>,

    /// Seconds a staged install waits for confirmation
    #[arg(
        long = "confirm-ttl-secs",
        env = "MWPKG_CONFIRM_TTL_SECS",
        value_name = "SECS",
        global = true
    )]
    confirm_ttl_secs: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            userfiles: self.userfiles.clone(),
            cache_dir: self.cache_dir.clone(),
            registries: self.registries.clone(),
            licenses: self.licenses.clone(),
            confirm_ttl_secs: self.confirm_ttl_secs,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show the registry index, or the exact matches of a name and version
    Search(SearchArgs),

    /// Stage a package and print its confirmation key
    RequestInstall(RequestInstallArgs),

    /// Install a staged package
    Confirm(ConfirmArgs),
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    /// Package name, e.g. "acme/widget"
    #[arg(long, requires = "version")]
    name: Option<String>,

    /// Exact package version
    #[arg(long, requires = "name")]
    version: Option<String>,
}

impl SearchArgs {
    fn filter(self) -> SearchFilter {
        match (self.name, self.version) {
            (Some(name), Some(version)) => SearchFilter::exact(name, version),
            _ => SearchFilter::All,
        }
    }
}

#[derive(clap::Args, Debug)]
struct RequestInstallArgs {
    /// Package name, e.g. "acme/widget"
    name: String,

    /// Exact package version
    version: String,

    /// Install the package staged under this key instead of staging it again
    #[arg(long = "confirm-key", value_name = "KEY")]
    confirm_key: Option<String>,
}

impl RequestInstallArgs {
    fn into_request(self) -> InstallRequest {
        let request = InstallRequest::new(self.name, self.version);
        match self.confirm_key {
            Some(key) => request.with_confirm_key(key),
            None => request,
        }
    }
}

#[derive(clap::Args, Debug)]
struct ConfirmArgs {
    /// Confirmation key printed by request-install
    key: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = mwpkg::runtime::RealRuntime;
    let config = Config::load(&runtime, cli.overrides())?;

    let succeeded = match cli.command {
        Commands::Search(args) => {
            commands::search(runtime, &config, args.filter()).await?;
            true
        }
        Commands::RequestInstall(args) => {
            !commands::request_install(runtime, &config, args.into_request())
                .await?
                .is_error()
        }
        Commands::Confirm(args) => !commands::confirm(runtime, &config, &args.key).await?.is_error(),
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
