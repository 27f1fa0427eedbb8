//! credential-stager CLI
//!
//! Stages local AWS credential files onto benchmark VMs over SSH

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use credential_stager::{
    ConfigLayer, ConfigLoadOptions, ConfigLoader, CredentialInstaller, CredentialLocator,
    InstallOutcome, LocalIdentity, SafeCommandExecutor, SecretMasker, SshHost, SshMachine,
    StageError, StagerConfig, looks_like_access_key_id,
};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Stage AWS credential files onto benchmark VMs
#[derive(Parser)]
#[command(name = "credential-stager")]
#[command(version)]
#[command(about = "Stage AWS credential files onto benchmark VMs", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SettingsArgs {
    /// Directory holding .credential-stager.yaml (defaults to current directory)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Path where the AWS credential files can be found on the local machine
    #[arg(long)]
    local_path: Option<String>,

    /// Path where the AWS credential files will be written on the VM
    #[arg(long)]
    remote_path: Option<String>,

    /// Overwrite existing credential files on the VM
    #[arg(long)]
    overwrite: bool,

    /// Push with rsync directory-sync semantics instead of scp
    #[arg(long)]
    rsync: bool,

    /// Region for the S3 bucket
    #[arg(long)]
    region: Option<String>,

    /// Home directory of the remote user (defaults to /home/<user>)
    #[arg(long)]
    remote_home: Option<String>,

    /// Credentials file name inside the local path
    #[arg(long)]
    credentials_file: Option<String>,
}

impl SettingsArgs {
    fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            local_path: self.local_path.clone(),
            remote_path: self.remote_path.clone(),
            overwrite: self.overwrite.then_some(true),
            region: self.region.clone(),
            rsync: self.rsync.then_some(true),
            credentials_file: self.credentials_file.clone(),
            remote_home: self.remote_home.clone(),
        }
    }
}

#[derive(Args)]
struct MachineArgs {
    /// VM hostname or IP address
    #[arg(long)]
    host: String,

    /// SSH user on the VM
    #[arg(short, long)]
    user: String,

    /// SSH port
    #[arg(short, long, default_value = "22")]
    port: u16,

    /// SSH private key
    #[arg(short, long)]
    identity_file: Option<String>,

    /// Name used for the VM in logs (defaults to the host)
    #[arg(long)]
    name: Option<String>,

    /// Timeout in seconds for each ssh/scp/rsync invocation
    #[arg(long, default_value = "120")]
    timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy the credential files to a VM
    Install(MachineArgs),

    /// Delete the credential files from a VM
    Uninstall(MachineArgs),

    /// Report whether the credential files are present on a VM
    Status(MachineArgs),

    /// Validate configuration and the local credential files
    Check,

    /// Print the resolved configuration
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{}", e);
            if let Some(stage_error) = e.downcast_ref::<StageError>() {
                eprintln!("\nCode: {}", stage_error.code());
                for action in stage_error.suggested_actions() {
                    eprintln!("  - {}", action);
                }
            }
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli.settings).await?;

    let validation = ConfigLoader::validate(&config);
    if !validation.valid {
        eprintln!("{}", ConfigLoader::format_validation_result(&validation));
        return Ok(1);
    }
    for warning in &validation.warnings {
        tracing::warn!(field = %warning.field, "{}", warning.message);
    }

    match cli.command {
        Commands::Install(machine) => install_command(config, machine).await,
        Commands::Uninstall(machine) => uninstall_command(config, machine).await,
        Commands::Status(machine) => status_command(config, machine).await,
        Commands::Check => check_command(config).await,
        Commands::Show { json } => show_command(config, json).await,
    }
}

async fn load_config(settings: &SettingsArgs) -> Result<StagerConfig> {
    let options = ConfigLoadOptions {
        project_path: settings
            .config_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".")),
        home_dir: std::env::var_os("HOME").map(PathBuf::from),
        cli_args: Some(settings.to_layer()),
        env: std::env::vars().collect(),
    };

    Ok(ConfigLoader::load(options).await?)
}

fn executor_for(machine: &MachineArgs) -> Result<SafeCommandExecutor> {
    let mut executor = SafeCommandExecutor::new(std::env::temp_dir())?;
    executor.set_timeout(Duration::from_secs(machine.timeout));
    Ok(executor)
}

fn machine_for(args: &MachineArgs, executor: SafeCommandExecutor) -> SshMachine {
    let mut host = SshHost::new(&args.host, &args.user).with_port(args.port);
    if let Some(name) = &args.name {
        host = host.with_name(name);
    }
    if let Some(key) = &args.identity_file {
        host = host.with_identity_file(key);
    }
    SshMachine::new(host, executor)
}

async fn install_command(config: StagerConfig, args: MachineArgs) -> Result<i32> {
    let executor = executor_for(&args)?;
    let identity = LocalIdentity::discover(&executor).await;
    let installer = CredentialInstaller::new(config, identity);

    installer.check_prerequisites()?;

    let machine = machine_for(&args, executor);
    match installer.install(&machine).await? {
        InstallOutcome::Pushed {
            source,
            destination,
            mode,
        } => {
            println!(
                "✅ Copied {} to {}:{} ({})",
                source,
                machine.host().name,
                destination,
                mode
            );
        }
        InstallOutcome::SkippedSameLocation => {
            println!("✅ Credentials already in place on {}", machine.host().name);
        }
    }
    Ok(0)
}

async fn uninstall_command(config: StagerConfig, args: MachineArgs) -> Result<i32> {
    let executor = executor_for(&args)?;
    let machine = machine_for(&args, executor);
    let installer = CredentialInstaller::new(config, LocalIdentity::default());

    installer.uninstall(&machine).await?;
    println!(
        "🗑️  Removed {} from {}",
        installer.config().remote_path,
        machine.host().name
    );
    Ok(0)
}

async fn status_command(config: StagerConfig, args: MachineArgs) -> Result<i32> {
    let executor = executor_for(&args)?;
    let machine = machine_for(&args, executor);
    let installer = CredentialInstaller::new(config, LocalIdentity::default());

    if installer.is_installed(&machine).await {
        println!("installed");
        Ok(0)
    } else {
        println!("not installed");
        Ok(1)
    }
}

async fn check_command(config: StagerConfig) -> Result<i32> {
    println!("\n🔍 Credential Check\n");

    let validation = ConfigLoader::validate(&config);
    println!("{}", ConfigLoader::format_validation_result(&validation));

    let installer = CredentialInstaller::new(config, LocalIdentity::default());
    let locator = installer.locator();

    if let Err(e) = installer.check_prerequisites() {
        println!("\n❌ {}", e);
        return Ok(1);
    }
    println!("\n✅ Found {}", locator.resolve_local_path()?.display());

    match locator.credentials().await {
        Ok(credentials) => {
            let masker = SecretMasker::new();
            println!(
                "✅ aws_access_key_id = {}",
                masker.mask(&credentials.access_key_id)
            );
            println!(
                "✅ aws_secret_access_key = {}",
                masker.mask_secret(&credentials.secret_access_key)
            );
            if !looks_like_access_key_id(&credentials.access_key_id) {
                println!("⚠️  Access key id does not look like an AWS key (AKIA.../ASIA...)");
            }
            Ok(0)
        }
        Err(e) => {
            println!("❌ {}", e);
            Ok(1)
        }
    }
}

async fn show_command(config: StagerConfig, json: bool) -> Result<i32> {
    let access_key_id = CredentialLocator::new(&config)
        .credentials()
        .await
        .ok()
        .map(|c| SecretMasker::new().mask(&c.access_key_id));

    if json {
        let mut value = serde_json::to_value(&config)?;
        value["access_key_id"] = serde_json::json!(access_key_id);
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(0);
    }

    println!("local_path        {}", config.local_path);
    println!("remote_path       {}", config.remote_path);
    println!("overwrite         {}", config.overwrite);
    println!("rsync             {}", config.rsync);
    println!("credentials_file  {}", config.credentials_file);
    println!(
        "region            {}",
        config.region.as_deref().unwrap_or("-")
    );
    println!(
        "remote_home       {}",
        config.remote_home.as_deref().unwrap_or("-")
    );
    println!(
        "access_key_id     {}",
        access_key_id.as_deref().unwrap_or("-")
    );
    Ok(0)
}
