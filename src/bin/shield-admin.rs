//! CLI administration tool for storefront-shield.
//!
//! Inspects the compiled-in limiter and validation catalogs and checks how the
//! configured IP lists and input filters treat a given value, without starting
//! the server.
//!
//! # Usage
//!
//! ```bash
//! # List limiter policies and validation rule sets
//! cargo run --bin shield-admin -- policies
//!
//! # Classify an IP against TRUSTED_IPS / BLOCKED_IPS
//! cargo run --bin shield-admin -- ip classify 203.0.113.7
//!
//! # Run the sanitizer and detectors over a string
//! cargo run --bin shield-admin -- scan "1 OR 1=1"
//!
//! # Validate environment configuration
//! cargo run --bin shield-admin -- config check
//! ```

use storefront_shield::application::services::{
    BypassPolicy, DetectorChain, RuleCatalog, sanitize_str,
};
use storefront_shield::config::{self, Config};
use storefront_shield::domain::entities::{Activation, LimiterPolicy};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::Value;
use std::net::IpAddr;

/// CLI tool for inspecting storefront-shield.
#[derive(Parser)]
#[command(name = "shield-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// List limiter policies and validation rule sets
    Policies,

    /// IP list operations
    Ip {
        #[command(subcommand)]
        action: IpAction,
    },

    /// Sanitize a string and run the injection detectors over it
    Scan {
        /// Text to inspect
        text: String,
    },

    /// Configuration operations
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum IpAction {
    /// Show how an address is treated by the configured lists
    Classify {
        /// IPv4 or IPv6 address
        ip: IpAddr,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load and validate configuration from the environment
    Check,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Policies => list_policies(),
        Commands::Ip {
            action: IpAction::Classify { ip },
        } => classify_ip(ip)?,
        Commands::Scan { text } => scan_text(&text),
        Commands::Config {
            action: ConfigAction::Check,
        } => check_config()?,
    }

    Ok(())
}

/// Prints the limiter catalog in priority order, then the rule sets and the routes
/// bound to them.
fn list_policies() {
    println!("{}", "Rate limit policies".bright_blue().bold());
    println!();
    println!(
        "  {:<10} {:<12} {:<6} {:<18} {:<10}",
        "Name".bright_white().bold(),
        "Window".bright_white().bold(),
        "Max".bright_white().bold(),
        "Key".bright_white().bold(),
        "Active".bright_white().bold()
    );
    println!("  {}", "-".repeat(60).bright_black());

    for policy in LimiterPolicy::catalog() {
        let active = match policy.activation {
            Activation::Always => "always".green(),
            Activation::SuspiciousOnly => "suspects".yellow(),
        };
        println!(
            "  {:<10} {:<12} {:<6} {:<18} {}",
            policy.name.cyan(),
            policy.window_label,
            policy.max_requests.to_string().bright_green(),
            format!("{:?}", policy.key_strategy).bright_black(),
            active
        );
    }

    let catalog = RuleCatalog::storefront();

    println!();
    println!("{}", "Validation rule sets".bright_blue().bold());
    println!();
    for name in catalog.names() {
        let fields = catalog.get(name).map(|set| set.rules().len()).unwrap_or(0);
        println!("  {:<18} {} fields", name.cyan(), fields);
    }

    println!();
    println!("{}", "Route bindings".bright_blue().bold());
    println!();
    for binding in catalog.bindings() {
        println!(
            "  {:<7} {:<32} {}",
            binding.method.as_str().bright_white(),
            binding.pattern,
            binding.rule_sets.join(", ").bright_black()
        );
    }
    println!();
}

/// Reports whether `ip` is blocked, trusted, or subject to the limiters.
fn classify_ip(ip: IpAddr) -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let bypass = BypassPolicy::new(config.trusted_ips.clone());

    println!("{}", "IP classification".bright_blue().bold());
    println!();
    println!("  Address: {}", ip.to_string().cyan());

    let verdict = if config.blocked_ips.contains(ip) {
        "BLOCKED (403 on every request)".red().bold()
    } else if bypass.is_trusted(ip) {
        "TRUSTED (rate limits skipped)".green().bold()
    } else {
        "LIMITED (all applicable policies)".yellow().bold()
    };
    println!("  Verdict: {}", verdict);
    println!();

    Ok(())
}

/// Shows the sanitized form of `text` and the first detector it trips, if any.
fn scan_text(text: &str) {
    let sanitized = sanitize_str(text);
    let chain = DetectorChain::default();

    println!("{}", "Input scan".bright_blue().bold());
    println!();
    println!("  Input:     {}", text.bright_black());
    println!("  Sanitized: {}", sanitized.cyan());

    match chain.scan("input", &Value::String(sanitized)) {
        Some(hit) => println!(
            "  Result:    {} ({})",
            "SUSPICIOUS".red().bold(),
            hit.detector
        ),
        None => println!("  Result:    {}", "clean".green().bold()),
    }
    println!();
}

/// Loads configuration the same way the server does and prints the summary.
fn check_config() -> Result<()> {
    println!("{}", "Configuration check".bright_blue().bold());
    println!();

    match config::load_from_env() {
        Ok(config) => {
            println!("  Listen:        {}", config.listen_addr.cyan());
            println!(
                "  Environment:   {}",
                if config.production { "production" } else { "development" }.cyan()
            );
            match &config.redis_url {
                Some(url) => println!(
                    "  Counter store: {}",
                    config::mask_connection_string(url).cyan()
                ),
                None => println!("  Counter store: {}", "local memory".yellow()),
            }
            println!("  Trusted IPs:   {}", config.trusted_ips.len());
            println!("  Blocked IPs:   {}", config.blocked_ips.len());
            println!("  Origins:       {}", config.allowed_origins.join(", "));
            println!();
            println!("{}", "Configuration is valid".green().bold());
            println!();
            Ok(())
        }
        Err(e) => {
            println!("  {} {:#}", "Error:".red().bold(), e);
            println!();
            anyhow::bail!("configuration is invalid")
        }
    }
}
