//! Script Signer CLI
//!
//! Signs and verifies PowerShell-family scripts with software keys,
//! RFC 3161 timestamp servers and configuration file support.

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use script_signer::{
    all_styles, resolve_style, ConfigManager, ExportFormat, HashAlgorithm, NoTimestampAuthority,
    OpenSslKeySigner, SignWorkflow, SigningConfiguration, SigningError, Style, TimestampFlavor,
    TimestampHttpClient, TimestampHttpConfig, TimestampPolicy, TimestampUrl, TrustRoots,
    VerifyOptions, VerifyWorkflow,
};

#[derive(Parser)]
#[command(name = "script-signer")]
#[command(about = "Authenticode signing for PowerShell scripts")]
#[command(long_about = "
Script Signer - Authenticode signatures for PowerShell-family scripts

EXAMPLES:
    # Sign with a PEM chain and key, timestamping through the configured servers
    script-signer sign deploy.ps1 --cert chain.pem --key key.pem

    # Sign a formatting file without a timestamp
    script-signer sign types.ps1xml --cert chain.pem --key key.pem --no-timestamp

    # Verify and validate against trusted roots
    script-signer verify deploy.ps1 --roots roots.pem

    # List supported comment styles
    script-signer styles

ENVIRONMENT VARIABLES:
    RUST_LOG        Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a script
    Sign {
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// Output file path (defaults to overwriting input file)
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: Option<PathBuf>,

        /// PEM certificate chain, signing certificate first
        #[arg(long, value_name = "PEM")]
        cert: PathBuf,

        /// PEM private key matching the signing certificate
        #[arg(long, value_name = "PEM")]
        key: PathBuf,

        /// Comment style (overrides extension lookup)
        #[arg(long, value_enum)]
        style: Option<StyleArg>,

        /// Hash algorithm (overrides config)
        #[arg(long, value_enum)]
        hash: Option<HashAlgorithmArg>,

        /// Timestamp server URL (overrides config)
        #[arg(short, long, value_name = "URL")]
        timestamp_url: Option<String>,

        /// Do not timestamp the signature
        #[arg(long, conflicts_with = "timestamp_url")]
        no_timestamp: bool,

        /// Fail when no timestamp can be obtained
        #[arg(long)]
        require_timestamp: bool,

        /// Attribute the timestamp token is stored under (overrides config)
        #[arg(long, value_enum)]
        timestamp_flavor: Option<TimestampFlavorArg>,

        /// Dry run - validate configuration without signing
        #[arg(long)]
        dry_run: bool,
    },

    /// Verify the signature embedded in a script
    Verify {
        #[arg(value_name = "SIGNED_FILE")]
        file: PathBuf,

        /// PEM bundle of trusted roots (overrides config); chain validation
        /// is skipped when no roots are available
        #[arg(long, value_name = "PEM")]
        roots: Option<PathBuf>,

        /// Comment style (overrides extension lookup)
        #[arg(long, value_enum)]
        style: Option<StyleArg>,

        /// Check signatures only, not the script digest
        #[arg(long)]
        skip_digests: bool,

        /// Show detailed signature information
        #[arg(short, long)]
        verbose: bool,
    },

    /// List supported comment styles
    Styles,

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration
    Export {
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import configuration
    Import {
        file: PathBuf,
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum HashAlgorithmArg {
    Sha256,
    Sha384,
    Sha512,
}

impl From<HashAlgorithmArg> for HashAlgorithm {
    fn from(arg: HashAlgorithmArg) -> Self {
        match arg {
            HashAlgorithmArg::Sha256 => HashAlgorithm::Sha256,
            HashAlgorithmArg::Sha384 => HashAlgorithm::Sha384,
            HashAlgorithmArg::Sha512 => HashAlgorithm::Sha512,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum StyleArg {
    Hash,
    Xml,
    C,
}

impl From<StyleArg> for Style {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Hash => Style::Hash,
            StyleArg::Xml => Style::Xml,
            StyleArg::C => Style::C,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum TimestampFlavorArg {
    Rfc3161,
    Authenticode,
}

impl From<TimestampFlavorArg> for TimestampFlavor {
    fn from(arg: TimestampFlavorArg) -> Self {
        match arg {
            TimestampFlavorArg::Rfc3161 => TimestampFlavor::Rfc3161,
            TimestampFlavorArg::Authenticode => TimestampFlavor::Authenticode,
        }
    }
}

#[derive(ValueEnum, Clone)]
enum ExportFormatArg {
    Toml,
    Json,
    Yaml,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Yaml => ExportFormat::Yaml,
        }
    }
}

/// Parameters for the sign command
struct SignCommandArgs {
    input_file: PathBuf,
    output: Option<PathBuf>,
    cert: PathBuf,
    key: PathBuf,
    style: Option<StyleArg>,
    hash: Option<HashAlgorithmArg>,
    timestamp_url: Option<String>,
    no_timestamp: bool,
    require_timestamp: bool,
    timestamp_flavor: Option<TimestampFlavorArg>,
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sign {
            input_file,
            output,
            cert,
            key,
            style,
            hash,
            timestamp_url,
            no_timestamp,
            require_timestamp,
            timestamp_flavor,
            dry_run,
        } => {
            let args = SignCommandArgs {
                input_file,
                output,
                cert,
                key,
                style,
                hash,
                timestamp_url,
                no_timestamp,
                require_timestamp,
                timestamp_flavor,
                dry_run,
            };
            handle_sign_command(args).await?;
        }

        Commands::Verify {
            file,
            roots,
            style,
            skip_digests,
            verbose,
        } => {
            handle_verify_command(&file, roots, style, skip_digests, verbose).await?;
        }

        Commands::Styles => handle_styles_command(),

        Commands::Config(config_cmd) => {
            handle_config_command(config_cmd)?;
        }
    }

    Ok(())
}

/// Stored configuration, or defaults when no file exists yet.
fn load_configuration() -> Result<SigningConfiguration> {
    let manager = ConfigManager::new().into_diagnostic()?;
    if manager.config_path().exists() {
        manager
            .load()
            .into_diagnostic()
            .context("Failed to load configuration")
    } else {
        Ok(SigningConfiguration::default())
    }
}

async fn handle_sign_command(args: SignCommandArgs) -> Result<()> {
    let config = load_configuration()?;
    let output_path = args.output.unwrap_or_else(|| args.input_file.clone());

    let hash = match args.hash {
        Some(hash) => hash.into(),
        None => config.hash_algorithm().into_diagnostic()?,
    };

    let mut policy: TimestampPolicy = config.timestamp_policy();
    policy.required |= args.require_timestamp;
    if let Some(flavor) = args.timestamp_flavor {
        policy.flavor = flavor.into();
    }

    let http_config = if args.no_timestamp {
        None
    } else if let Some(url) = &args.timestamp_url {
        let mut cfg = TimestampHttpConfig::new(TimestampUrl::new(url).into_diagnostic()?);
        cfg.timeout = Duration::from_secs(config.network_timeout_seconds);
        cfg.retries_per_server = config.retry_attempts;
        Some(cfg)
    } else {
        config.timestamp_http_config().into_diagnostic()?
    };
    if policy.required && http_config.is_none() {
        return Err(SigningError::ConfigurationError(
            "a timestamp is required but no timestamp server is configured".to_string(),
        )
        .into());
    }

    let mut workflow = SignWorkflow::new(hash).with_timestamp_policy(policy.clone());
    if let Some(style) = args.style {
        workflow = workflow.with_style(style.into());
    }
    if let Some(style) = config.default_style.as_deref().and_then(resolve_style) {
        workflow = workflow.with_fallback_style(style);
    }
    let resolved = workflow
        .resolve(&args.input_file.to_string_lossy())
        .into_diagnostic()?;

    if args.dry_run {
        println!("🔍 Dry run mode - validating configuration");
        println!("  Input file: {}", args.input_file.display());
        println!("  Output file: {}", output_path.display());
        println!("  Style: {resolved}");
        println!("  Hash algorithm: {hash}");
        match &http_config {
            Some(cfg) => {
                for server in cfg.servers() {
                    println!("  Timestamp server: {server}");
                }
                println!(
                    "  Timestamp: {:?}{}",
                    policy.flavor,
                    if policy.required { " (required)" } else { "" }
                );
            }
            None => println!("  Timestamp: disabled"),
        }
        println!("✅ Configuration is valid");
        return Ok(());
    }

    let signer = OpenSslKeySigner::from_pem_files(&args.cert, &args.key)
        .into_diagnostic()
        .context("Failed to load signing key")?;

    let started = SystemTime::now();
    let result = match http_config {
        Some(cfg) => {
            let client = TimestampHttpClient::new(cfg).into_diagnostic()?;
            workflow
                .sign_file(&args.input_file, &output_path, &signer, Some(&client))
                .await
        }
        None => {
            workflow
                .sign_file(
                    &args.input_file,
                    &output_path,
                    &signer,
                    None::<&NoTimestampAuthority>,
                )
                .await
        }
    };
    result.into_diagnostic().context("Signing failed")?;

    println!("✅ File signed successfully!");
    println!("  Output: {}", output_path.display());
    if let Ok(elapsed) = started.elapsed() {
        println!("  Duration: {:.2}s", elapsed.as_secs_f64());
    }
    Ok(())
}

async fn handle_verify_command(
    file: &Path,
    roots: Option<PathBuf>,
    style: Option<StyleArg>,
    skip_digests: bool,
    verbose: bool,
) -> Result<()> {
    let config = load_configuration()?;
    let mut workflow = VerifyWorkflow::new(VerifyOptions { skip_digests });
    if let Some(style) = style {
        workflow = workflow.with_style(style.into());
    }
    if let Some(style) = config.default_style.as_deref().and_then(resolve_style) {
        workflow = workflow.with_fallback_style(style);
    }

    let verified = workflow
        .verify_file(file)
        .await
        .into_diagnostic()
        .context("Verification failed")?;
    let signature = verified.signature();

    println!("✅ Signature is valid");
    println!(
        "  Signer: {}",
        signature.signature().certificate().tbs_certificate.subject
    );
    println!("  Hash algorithm: {}", verified.hash());
    match signature.counter_signature() {
        Some(counter) => {
            match der::DateTime::from_system_time(counter.signing_time()) {
                Ok(when) => println!("  Timestamp: {when} ({:?})", counter.kind()),
                Err(_) => println!("  Timestamp: ({:?})", counter.kind()),
            }
            if verbose {
                println!(
                    "  Timestamp signer: {}",
                    counter.signature().certificate().tbs_certificate.subject
                );
                println!("  Timestamp hash: {}", counter.hash());
            }
        }
        None => println!("  Timestamp: none"),
    }
    if verbose {
        println!(
            "  Embedded intermediates: {}",
            signature.signature().intermediates().len()
        );
    }

    match roots.or(config.trust_roots) {
        Some(path) => {
            let pem = std::fs::read(&path)
                .into_diagnostic()
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let roots = TrustRoots::from_pem(&pem).into_diagnostic()?;
            verified
                .verify_chain(&roots, &[])
                .into_diagnostic()
                .context("Chain validation failed")?;
            println!("✅ Certificate chain is trusted ({} roots)", roots.len());
        }
        None => println!("ℹ️  No trust roots configured, chain validation skipped"),
    }
    Ok(())
}

fn handle_styles_command() {
    println!("📋 Supported styles:");
    for name in all_styles() {
        if let Some(style) = resolve_style(name) {
            let (start, end) = style.delimiters();
            println!("  {name:<6} {start}SIG # Begin signature block{end}");
        }
    }
}

fn handle_config_command(config_cmd: ConfigCommands) -> Result<()> {
    let config_manager = ConfigManager::new().into_diagnostic()?;

    match config_cmd {
        ConfigCommands::Show => match config_manager.load() {
            Ok(config) => {
                println!("📋 Current Configuration:");
                println!("  Hash algorithm: {}", config.default_hash_algorithm);
                println!(
                    "  Default style: {}",
                    config.default_style.as_deref().unwrap_or("(by extension)")
                );
                println!(
                    "  Primary timestamp server: {}",
                    config
                        .primary_timestamp_server
                        .as_deref()
                        .unwrap_or("(disabled)")
                );
                println!(
                    "  Fallback servers: {}",
                    config.fallback_timestamp_servers.len()
                );
                println!("  Timestamp required: {}", config.timestamp_required);
                println!("  Timestamp flavor: {:?}", config.timestamp_flavor);
                if let Some(roots) = &config.trust_roots {
                    println!("  Trust roots: {}", roots.display());
                }
                println!(
                    "  Configuration file: {}",
                    config_manager.config_path().display()
                );
            }
            Err(_) => {
                println!("📋 No configuration file found. Use 'config init' to create one.");
            }
        },

        ConfigCommands::Init => {
            config_manager.load_or_create_default().into_diagnostic()?;
            println!(
                "✅ Configuration initialized: {}",
                config_manager.config_path().display()
            );
        }

        ConfigCommands::Set { key, value } => {
            config_manager
                .update_value(&key, &value)
                .into_diagnostic()?;
            println!("✅ Configuration updated: {key} = {value}");
        }

        ConfigCommands::Export { format, output } => {
            let content = config_manager
                .export_config(format.into())
                .into_diagnostic()?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, content).into_diagnostic()?;
                println!("✅ Configuration exported to: {}", output_path.display());
            } else {
                println!("{content}");
            }
        }

        ConfigCommands::Import { file, format } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            config_manager
                .import_config(&content, format.into())
                .into_diagnostic()?;
            println!("✅ Configuration imported from: {}", file.display());
        }
    }

    Ok(())
}
