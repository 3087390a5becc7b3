//! config command - Show the effective configuration

use std::process::ExitCode;

use anyhow::Result;

use super::Session;
use crate::cli::Context;
use crate::core::config::{Config, CONFIG_ENV};

/// List all configuration values, with defaults applied.
pub fn config(ctx: &Context) -> Result<ExitCode> {
    let session = Session::open(ctx)?;
    print!("{}", render(&session.config));
    Ok(ExitCode::SUCCESS)
}

fn render(config: &Config) -> String {
    let mut out = String::from("# Effective configuration\n");

    match config.repo_config_loaded_from() {
        Some(path) => out.push_str(&format!("# loaded from {}\n", path.display())),
        None => out.push_str(&format!(
            "# no config file found (set ${} to use one)\n",
            CONFIG_ENV
        )),
    }

    let exclude: Vec<String> = config
        .exclude()
        .iter()
        .map(|name| format!("{:?}", name))
        .collect();
    out.push_str(&format!("workspace_root = {:?}\n", config.workspace_root()));
    out.push_str(&format!("exclude = [{}]\n", exclude.join(", ")));
    out.push_str(&format!("manifest = {:?}\n", config.manifest()));
    out.push_str(&format!("indent = {}\n", config.indent()));
    out
}
