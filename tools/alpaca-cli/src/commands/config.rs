//! Configuration management commands.

use std::fs;

use anyhow::{bail, Context as _, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, ScopeReport};
use crate::context::Context;
use crate::output::mode_badge;

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Validate => validate_config(ctx),
        ConfigCommand::Init { force } => init_config(force, ctx),
        ConfigCommand::Resolve { uri } => resolve_uri(&uri, ctx),
    }
}

fn print_report(report: &ScopeReport, ctx: &Context) {
    for (key, value) in report.fields() {
        if key == "mode" {
            ctx.output.kv(key, &mode_badge(&value));
        } else {
            ctx.output.kv(key, &value);
        }
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let scopes = ctx.config()?.compile()?;

    let mut reports = vec![ScopeReport::new(None, scopes.root())];
    reports.extend(
        scopes
            .locations()
            .map(|(prefix, config)| ScopeReport::new(Some(prefix), config)),
    );

    if ctx.output.is_json() {
        ctx.output.json(&reports);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    if let Some(path) = &ctx.config_path {
        ctx.output.kv("file", &path.display().to_string());
    }

    for report in &reports {
        ctx.output.info("");
        match &report.location {
            None => ctx.output.info("[root]"),
            Some(prefix) => ctx.output.info(&format!("[locations.\"{}\"]", prefix)),
        }
        print_report(report, ctx);
    }

    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    let Some(path) = &ctx.config_path else {
        bail!("No config file found. Run `alpaca config init` to create one.");
    };

    let file = ctx.config()?;
    let errors = file.check();

    if ctx.output.is_json() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        ctx.output.json(&serde_json::json!({
            "file": path.display().to_string(),
            "valid": errors.is_empty(),
            "locations": file.locations.len(),
            "errors": messages,
        }));
    } else {
        ctx.output.header("Validating configuration");
        ctx.output.kv("file", &path.display().to_string());
        ctx.output.kv("locations", &file.locations.len().to_string());
        for error in &errors {
            ctx.output.error(&format!("Error: {}", error));
        }
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid");
    Ok(())
}

fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("alpaca.toml");

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, generate_default_config())
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    if ctx.output.is_json() {
        ctx.output
            .json(&serde_json::json!({ "created": config_path.display().to_string() }));
    }
    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

fn resolve_uri(uri: &str, ctx: &Context) -> Result<()> {
    let scopes = ctx.config()?.compile()?;

    let location = scopes
        .locations()
        .find(|(prefix, _)| uri.starts_with(prefix))
        .map(|(prefix, _)| prefix);
    let config = scopes.for_uri(uri);
    let report = ScopeReport::new(location, &config);

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "uri": uri, "scope": report }));
        return Ok(());
    }

    ctx.output.header(&format!("Settings for {}", uri));
    let scope = match location {
        Some(prefix) => format!("locations.\"{}\"", prefix),
        None => "root".to_string(),
    };
    ctx.output.kv("scope", &scope);
    print_report(&report, ctx);

    if !config.is_enabled() {
        ctx.output.info("Responses under this path are passed through unmodified.");
    }

    Ok(())
}
