//! AI Gateway CLI: 脱敏、JSON 修复、危机检测、健康检查与在线调用的命令行工具
//!
//! Usage:
//!   ai-gateway-cli redact <text>                   Mask emails, phones and URLs
//!   ai-gateway-cli repair <text>                   Repair near-JSON into a JSON object
//!   ai-gateway-cli crisis <text>                   Keyword crisis scan
//!   ai-gateway-cli health                          Gateway configuration and breaker state
//!   ai-gateway-cli insights <text> [--lang <l>]    Journal insights (calls the provider)
//!   ai-gateway-cli comic <situation> [--lang <l>]  Comic script (calls the provider)

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;
use wellness_ai_gateway::guardrails::CrisisDetector;
use wellness_ai_gateway::structured::repair;
use wellness_ai_gateway::{AiOperations, Gateway, GatewayConfig, Language, Redactor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "redact" => cmd_redact(&args[2..]),
        "repair" => cmd_repair(&args[2..]),
        "crisis" => cmd_crisis(&args[2..]),
        "health" => cmd_health(),
        "insights" => cmd_insights(&args[2..]).await,
        "comic" => cmd_comic(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("ai-gateway-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"ai-gateway-cli: wellness AI gateway 命令行工具

USAGE:
    ai-gateway-cli <COMMAND> [OPTIONS]

COMMANDS:
    redact <text>                   Mask emails, phone numbers and URLs
    repair <text>                   Repair near-JSON model output
    crisis <text>                   Keyword crisis scan
    health                          Show gateway configuration and breaker state
    insights <text> [--lang <l>]    Journal insights (en, hi, hinglish)
    comic <situation> [--lang <l>]  Comic script
    version                         Show version information
    help                            Show this help message

ENVIRONMENT:
    GEMINI_API_KEY                  Provider credentials (insights, comic)
    RUST_LOG                        Log filter (default: info)"#
    );
}

/// Positional text (everything except `--lang <l>`) and the language flag.
fn split_args(args: &[String]) -> (String, Language) {
    let mut words = Vec::new();
    let mut lang = Language::En;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--lang" {
            if let Some(value) = iter.next() {
                lang = Language::parse(value);
            }
        } else {
            words.push(arg.as_str());
        }
    }
    (words.join(" "), lang)
}

fn require_text(args: &[String], what: &str) -> anyhow::Result<(String, Language)> {
    let (text, lang) = split_args(args);
    if text.trim().is_empty() {
        bail!("missing <{}> argument", what);
    }
    Ok((text, lang))
}

fn load_config() -> anyhow::Result<GatewayConfig> {
    GatewayConfig::from_env().context("loading gateway configuration from the environment")
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_redact(args: &[String]) -> anyhow::Result<()> {
    let (text, _) = require_text(args, "text")?;
    let (masked, map) = Redactor::new().redact(&text);
    println!("{masked}");
    eprintln!("{} placeholder(s)", map.len());
    Ok(())
}

fn cmd_repair(args: &[String]) -> anyhow::Result<()> {
    let (text, _) = require_text(args, "text")?;
    let (value, step) = repair(&text)?;
    eprintln!("repaired via {}", step.name());
    print_json(&value)
}

fn cmd_crisis(args: &[String]) -> anyhow::Result<()> {
    let (text, _) = require_text(args, "text")?;
    let config = load_config()?;
    print_json(&CrisisDetector::new(&config.safety).detect(&text))
}

fn cmd_health() -> anyhow::Result<()> {
    let config = load_config()?;
    let gateway = Gateway::from_config(&config)?;
    print_json(&gateway.health())
}

async fn cmd_insights(args: &[String]) -> anyhow::Result<()> {
    let (text, lang) = require_text(args, "text")?;
    let ops = AiOperations::from_config(load_config()?)?;
    let insights = ops.journal_insights(&text, lang).await?;
    print_json(&insights)
}

async fn cmd_comic(args: &[String]) -> anyhow::Result<()> {
    let (situation, lang) = split_args(args);
    let ops = AiOperations::from_config(load_config()?)?;
    let script = ops.generate_comic_script(&situation, lang).await?;
    print_json(&script)
}
