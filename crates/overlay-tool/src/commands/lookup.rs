use crate::commands::sync::{select_artifact, start_engine};
use crate::println_pad;
use crate::utils::colored_state;
use crate::utils::config::ToolConfig;
use colored::Colorize;
use miette::Result;
use overlay_engine::Provision;
use std::time::Duration;

pub struct LookupArgs {
    pub artifact: String,
    pub key: String,
    pub field: Option<String>,
    pub host_dir: String,
    pub timeout_secs: u64,
}

/// Sync one artifact, then answer a lookup the way the host would see it.
pub fn lookup_entry(config: &ToolConfig, args: LookupArgs) -> Result<()> {
    let engine_config = select_artifact(&config.engine, Some(&args.artifact))?;
    let engine = start_engine(&engine_config, &args.host_dir, None)?;
    engine.wait_until_settled(Duration::from_secs(args.timeout_secs));

    if let Some(state) = engine.state(&args.artifact) {
        println_pad!("{} {}", "State:".bold(), colored_state(state));
    }

    let gate = engine.gate();
    match &args.field {
        Some(field) => match gate.provide_field(&args.artifact, &args.key, field) {
            Provision::Overlay(value) => println_pad!("{}", value.bright_white()),
            Provision::Passthrough => println_pad!("{}", "passthrough".dimmed()),
        },
        None => match gate.provide(&args.artifact, &args.key) {
            Provision::Overlay(entry) => {
                println_pad!("{}", entry.key.bright_cyan().bold());
                for field in &entry.fields {
                    println_pad!("  {} {}", format!("{}:", field.name).bold(), field.value);
                }
            }
            Provision::Passthrough => println_pad!("{}", "passthrough".dimmed()),
        },
    }
    Ok(())
}
