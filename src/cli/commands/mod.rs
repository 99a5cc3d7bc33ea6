//! CLI command implementations

pub mod config;
pub mod inspect;
pub mod run;

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Load input content from file or stdin
pub(crate) fn load_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read stdin")?;
        Ok(content)
    } else {
        let path = PathBuf::from(input);
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Print a value as JSON on stdout
pub(crate) fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}
