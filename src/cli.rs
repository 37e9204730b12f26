use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(subcommand_value_name = "SUBCOMMAND")]
#[command(subcommand_help_heading = "Subcommands")]
pub struct Cli {
    #[command(subcommand)]
    pub subcommand: Sub,
}

#[derive(Subcommand)]
pub enum Sub {
    /// Derive the monitor layout from a hardware snapshot and print it.
    Layout {
        /// Path to a JSON hardware snapshot file.
        #[arg(short, long)]
        snapshot: PathBuf,
        /// Path to config file (default: `$XDG_CONFIG_HOME/madori/config.kdl`).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Format output as JSON.
        #[arg(short, long)]
        json: bool,
    },
    /// Print the preferred scale and the supported scales for a mode size.
    Scales {
        /// Mode size, e.g. `3840x2160`.
        #[arg(value_parser = parse_size)]
        size: (i32, i32),
        /// Connector type the monitor is attached through, e.g. `HDMI`.
        #[arg(long)]
        connector: Option<String>,
        /// Physical size in millimeters, e.g. `600x340`.
        #[arg(long, value_parser = parse_size)]
        mm: Option<(i32, i32)>,
        /// Only offer integer scales.
        #[arg(long)]
        no_fractional: bool,
        /// Only offer scales that divide the mode into integer logical pixels.
        #[arg(long)]
        no_logical_remainder: bool,
    },
    /// Validate the config file.
    Validate {
        /// Path to config file (default: `$XDG_CONFIG_HOME/madori/config.kdl`).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn parse_size(s: &str) -> Result<(i32, i32), String> {
    let Some((w, h)) = s.split_once('x') else {
        return Err(format!(r#"invalid size "{s}", expected WIDTHxHEIGHT"#));
    };

    let w = w
        .parse()
        .map_err(|err| format!("invalid width: {err}"))?;
    let h = h
        .parse()
        .map_err(|err| format!("invalid height: {err}"))?;
    Ok((w, h))
}
