//! itinera operator CLI
//!
//! Runs planner calls against the configured store and model, and inspects
//! the configuration.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use itinera::config::{Config, Secrets};
use itinera::{Itinera, PlanRequest};

/// Itinera operator CLI
#[derive(Parser)]
#[command(name = "itinera")]
#[command(version)]
#[command(about = "Trip planner cache, quota and configuration tool")]
struct Args {
    /// Config file (default: ~/.itinera/config.toml, then /etc/itinera/config.toml)
    #[arg(short, long, env = "ITINERA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract trip fields from free text
    Extract {
        /// Prompt (or omit to read from stdin)
        prompt: Option<String>,
    },

    /// Generate a day-by-day itinerary
    Plan {
        #[arg(long)]
        origin: String,
        #[arg(long)]
        destination: String,
        /// Budget class (cheap, mid, luxury)
        #[arg(long, default_value = "mid")]
        budget: String,
        #[arg(long, default_value_t = 1)]
        members: u32,
        #[arg(long)]
        days: u32,
        /// Specific request (or omit to read from stdin)
        prompt: Option<String>,
    },

    /// Show the global model quota counter
    Quota,

    /// Load and print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;

    // Commands that don't need the services
    if let Command::CheckConfig = args.command {
        let secrets = Secrets::load()?;
        print_config(&config, &secrets);
        return Ok(());
    }

    let secrets = Secrets::load()?;
    let app = Itinera::from_config(&config, &secrets).await?;

    match args.command {
        Command::Extract { prompt } => {
            let prompt = resolve_text(prompt, "extract")?;
            let fields = app.planner().search_field(&prompt).await?;
            eprintln!("source: {:?}", fields.source);
            println!("{}", serde_json::to_string_pretty(&fields.value)?);
        }

        Command::Plan {
            origin,
            destination,
            budget,
            members,
            days,
            prompt,
        } => {
            let prompt = resolve_text(prompt, "plan")?;
            let request = PlanRequest {
                origin,
                destination,
                budget,
                members,
                days,
                prompt,
            };
            let plan = app.planner().create_plan(&request).await?;
            eprintln!("source: {:?}", plan.source);
            println!("{}", serde_json::to_string_pretty(&plan.value)?);
        }

        Command::Quota => {
            let (count, remaining) = app.planner().quota_usage().await?;
            let limit = app.planner().config().quota;
            println!("calls:  {count}/{}", limit.max_attempts);
            match remaining {
                Some(ttl) => println!("resets: in {}s", ttl.as_secs()),
                None => println!("resets: no active window"),
            }
        }

        Command::CheckConfig => unreachable!("handled above"),
    }

    Ok(())
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}

fn print_config(config: &Config, secrets: &Secrets) {
    let key_state = |service: &str| {
        if secrets.api_key(service).is_some() {
            "set"
        } else {
            "missing"
        }
    };

    println!(
        "store:          {}",
        config.store.redis_url.as_deref().unwrap_or("in-process")
    );
    println!("gemini model:   {}", config.gemini.model);
    println!("gemini timeout: {}s", config.gemini.timeout_secs);
    println!("gemini key:     {}", key_state("gemini"));
    println!("brevo key:      {}", key_state("brevo"));
    println!("cache ttl:      {}s", config.cache.ttl_secs);
    for (name, policy) in [
        ("quota", config.limits.gemini),
        ("login", config.limits.login),
        ("forget", config.limits.forget_password),
        ("otp resend", config.limits.otp_resend),
    ] {
        println!(
            "{:<15} {} per {}s",
            format!("{name}:"),
            policy.max_attempts,
            policy.window_secs
        );
    }
    println!(
        "otp:            ttl {}s, cooldown {}s",
        config.otp.ttl_secs, config.otp.cooldown_secs
    );
    println!("retry attempts: {}", config.retry.max_attempts);
}
