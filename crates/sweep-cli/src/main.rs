//! AdSweep CLI
//!
//! Inspect and exercise the blocker's logic outside the browser: rule ids,
//! page eligibility, site list toggles against a file-backed state
//! directory, and the rule and selector sets the extension ships.

mod store;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sweep_core::{
    compute_rule_id, is_eligible, static_rules, toggle, DomainStore, EngineConfig, SelectorList,
    SiteGate, SiteList,
};

use crate::store::{FileRegistry, FileStore};

#[derive(Parser)]
#[command(name = "sweep-cli")]
#[command(about = "AdSweep rule and site list tools")]
struct Cli {
    /// Directory holding storage.json and dynamic_rules.json
    #[arg(long, global = true, default_value = ".adsweep")]
    state: PathBuf,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dynamic rule id for each domain
    RuleId {
        #[arg(required = true)]
        domains: Vec<String>,
    },

    /// Report whether the engine may start on each URL
    Eligible {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Flip a domain (or a URL's domain) in a site list
    Toggle {
        /// Domain or page URL
        target: String,

        /// Site list to toggle in
        #[arg(short, long, default_value = "paused")]
        list: SiteList,
    },

    /// Show which site list, if any, disables blocking for a domain
    Status {
        /// Domain or page URL
        target: String,
    },

    /// Print registered network rules as JSON
    Rules {
        /// Only the static ruleset shipped with the extension
        #[arg(long)]
        static_only: bool,
    },

    /// Print the effective selector list
    Selectors {
        /// Engine config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print one CSS selector group instead of one selector per line
        #[arg(long)]
        css: bool,
    },

    /// Validate an engine config file
    CheckConfig {
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::RuleId { domains } => cmd_rule_id(&domains),
        Commands::Eligible { urls } => cmd_eligible(&urls),
        Commands::Toggle { target, list } => cmd_toggle(&cli.state, &target, list),
        Commands::Status { target } => cmd_status(&cli.state, &target),
        Commands::Rules { static_only } => cmd_rules(&cli.state, static_only),
        Commands::Selectors { config, css } => cmd_selectors(config.as_deref(), css),
        Commands::CheckConfig { config } => cmd_check_config(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Accept either a bare domain or a page URL.
fn resolve_domain(target: &str) -> Result<String, String> {
    sweep_core::resolve_domain(target).ok_or_else(|| format!("No hostname in '{}'", target.trim()))
}

fn cmd_rule_id(domains: &[String]) -> Result<(), String> {
    for domain in domains {
        let domain = resolve_domain(domain)?;
        println!("{}\t{}", domain, compute_rule_id(&domain));
    }
    Ok(())
}

fn cmd_eligible(urls: &[String]) -> Result<(), String> {
    for url in urls {
        let verdict = if is_eligible(url) { "eligible" } else { "ineligible" };
        println!("{}\t{}", verdict, url);
    }
    Ok(())
}

fn cmd_toggle(state: &Path, target: &str, list: SiteList) -> Result<(), String> {
    let domain = resolve_domain(target)?;
    let mut store = FileStore::new(state);
    let mut registry = FileRegistry::new(state);

    let outcome = toggle(list, &domain, &mut store, &mut registry).map_err(|e| e.to_string())?;

    let (verb, preposition) = if outcome.listed { ("Added", "to") } else { ("Removed", "from") };
    match outcome.rule_id {
        Some(id) => println!("{} {} {} {} (rule {})", verb, outcome.domain, preposition, list, id),
        None => println!("{} {} {} {}", verb, outcome.domain, preposition, list),
    }
    if !outcome.rules_synced {
        println!("  Warning: network rules were not updated; run again to retry");
    }
    Ok(())
}

fn cmd_status(state: &Path, target: &str) -> Result<(), String> {
    let domain = resolve_domain(target)?;
    let lists = FileStore::new(state).load_all().map_err(|e| e.to_string())?;
    let gate = SiteGate::new(lists, SiteList::ALL.to_vec());

    match gate.excluded_by(&domain) {
        Some(list) => println!("{}: blocking disabled ({})", domain, list),
        None => println!("{}: blocking active", domain),
    }
    Ok(())
}

fn cmd_rules(state: &Path, static_only: bool) -> Result<(), String> {
    let mut rules = static_rules();
    if !static_only {
        rules.extend(FileRegistry::new(state).rules()?);
    }
    let json = serde_json::to_string_pretty(&rules).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn load_config(path: &Path) -> Result<EngineConfig, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    EngineConfig::from_json(&text).map_err(|e| format!("{}: {}", path.display(), e))
}

fn cmd_selectors(config: Option<&Path>, css: bool) -> Result<(), String> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    let selectors = SelectorList::from_config(&config);

    if css {
        println!("{}", selectors.to_css_group());
    } else {
        for entry in selectors.iter() {
            println!("{:?}\t{}", entry.group, entry.selector);
        }
    }
    Ok(())
}

fn cmd_check_config(path: &Path) -> Result<(), String> {
    let config = load_config(path)?;
    let selectors = SelectorList::from_config(&config);
    let gate_lists: Vec<&str> = config.gate_lists.iter().map(|list| list.storage_key()).collect();

    println!("Config '{}' is valid", path.display());
    println!("  Selectors:   {}", selectors.len());
    println!("  Collapse:    {}", config.collapse_before_remove);
    println!("  Intrusive:   {}", config.include_intrusive);
    println!("  Gate lists:  {}", gate_lists.join(", "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_domain() {
        assert_eq!(resolve_domain("Ads.Example.com").unwrap(), "ads.example.com");
        assert_eq!(resolve_domain("https://mail.google.com/inbox").unwrap(), "mail.google.com");
        assert!(resolve_domain("file:///tmp/x.html").is_err());
        assert!(resolve_domain("   ").is_err());
    }

    #[test]
    fn test_cli_parses_list() {
        let cli = Cli::try_parse_from(["sweep-cli", "toggle", "a.test", "--list", "whitelist"]).unwrap();
        match cli.command {
            Commands::Toggle { target, list } => {
                assert_eq!(target, "a.test");
                assert_eq!(list, SiteList::Whitelist);
            }
            _ => panic!("expected toggle"),
        }
        assert!(Cli::try_parse_from(["sweep-cli", "toggle", "a.test", "--list", "nope"]).is_err());
    }

    #[test]
    fn test_load_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"bogus": 1}"#).unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.contains("engine.json"));
    }
}
