//! # Brixsport Resilience Configuration Validator
//!
//! Loads the layered configuration (defaults, `config/brixsport.toml`, an
//! optional explicit file, `BRIXSPORT__*` environment variables), validates it
//! and prints the effective settings. Exits non-zero when loading or
//! validation fails, so it can gate deployments.

use brixsport_resilience::config::loader::detect_environment;
use brixsport_resilience::config::{ConfigLoader, ResilienceConfig};
use brixsport_resilience::constants::components;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate Brixsport resilience configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file layered over config/brixsport.toml
    #[arg(short, long, env = "BRIXSPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Skip the default config/brixsport.toml
    #[arg(long)]
    no_default_file: bool,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the configuration and print every section
    Validate,

    /// Print the effective circuit breaker settings per component
    Breakers {
        /// Extra component names to resolve besides the built-in ones
        #[arg(short, long)]
        component: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = load(&cli).and_then(|config| match &cli.command {
        Some(Commands::Breakers { component }) => show_breakers(&cli, &config, component),
        Some(Commands::Validate) | None => show_config(&cli, &config),
    });

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("❌ {e}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> Result<ResilienceConfig, Box<dyn std::error::Error>> {
    let mut loader = ConfigLoader::new();
    if cli.no_default_file {
        loader = loader.without_default_file();
    }
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }

    Ok(loader.load()?)
}

fn show_config(cli: &Cli, config: &ResilienceConfig) -> Result<(), Box<dyn std::error::Error>> {
    if cli.format == OutputFormat::Json {
        let report = serde_json::json!({
            "valid": true,
            "environment": detect_environment(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("🔧 Validating Brixsport Resilience Configuration");
    println!("Environment: {}", detect_environment());
    if let Some(path) = &cli.config {
        println!("Config File: {}", path.display());
    }
    println!();
    println!("✅ Configuration loaded and validated");
    println!();

    let cache = &config.cache;
    println!("📦 Cache");
    println!("   L1 enabled:        {}", cache.l1_enabled);
    println!("   L1 max size:       {}", cache.l1_max_size);
    println!("   L1 TTL:            {}ms", cache.l1_ttl_ms);
    println!("   L2 TTL:            {}s", cache.l2_ttl_seconds);
    println!("   Key prefix:        {}", cache.key_prefix);
    println!("   Sweep interval:    {}s", cache.sweep_interval_seconds);

    let limit = &config.rate_limit;
    println!("🚦 Rate limit");
    println!("   Max requests:      {}", limit.max_requests);
    println!("   Window:            {}ms", limit.window_ms);
    println!("   Key prefix:        {}", limit.key_prefix);
    println!("   Cleanup interval:  {}s", limit.cleanup_interval_seconds);

    let metrics = &config.metrics;
    println!("📊 Metrics");
    println!("   Operation history: {}", metrics.operation_history);
    println!(
        "   Latency sample:    {} (trimmed to {})",
        metrics.latency_sample_limit, metrics.latency_sample_retain
    );

    let warmer = &config.warmer;
    println!("🔥 Warmer");
    println!("   Auto warm:         {}", warmer.auto_warm);
    println!("   Interval:          {}s", warmer.interval_seconds);

    println!("📝 Logging");
    println!(
        "   Level:             {}",
        config.logging.level.as_deref().unwrap_or("(environment default)")
    );
    println!("   Format:            {:?}", config.logging.format);

    println!();
    show_breakers(cli, config, &[])
}

fn show_breakers(
    cli: &Cli,
    config: &ResilienceConfig,
    extra: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = &config.circuit_breakers;

    let mut names: Vec<String> = vec![
        components::REMOTE_CACHE.to_string(),
        components::RATE_LIMITER.to_string(),
    ];
    names.extend(settings.components.keys().cloned());
    names.extend(extra.iter().cloned());
    names.sort();
    names.dedup();

    if cli.format == OutputFormat::Json {
        let resolved: serde_json::Map<String, serde_json::Value> = names
            .iter()
            .map(|name| {
                serde_json::to_value(settings.config_for_component(name))
                    .map(|value| (name.clone(), value))
            })
            .collect::<Result<_, _>>()?;
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    println!(
        "🔌 Circuit breakers (max {})",
        settings.max_circuit_breakers
    );
    println!(
        "   {:<16} {:>8} {:>8} {:>10} {:>10} {:>8}",
        "component", "failures", "successes", "timeout", "window", "volume"
    );
    for name in &names {
        let component = settings.config_for_component(name);
        let source = if settings.components.contains_key(name) {
            ""
        } else {
            " (default)"
        };
        println!(
            "   {:<16} {:>8} {:>8} {:>8}ms {:>8}ms {:>8}{}",
            name,
            component.failure_threshold,
            component.success_threshold,
            component.timeout_ms,
            component.monitoring_period_ms,
            component.volume_threshold,
            source
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_format_and_subcommand() {
        let cli = Cli::parse_from([
            "config-validator",
            "--format",
            "json",
            "--no-default-file",
            "breakers",
            "-c",
            "notifications",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.no_default_file);
        assert!(matches!(
            cli.command,
            Some(Commands::Breakers { ref component }) if component == &vec!["notifications".to_string()]
        ));
    }
}
