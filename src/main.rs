use std::env;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use madori::backend::headless::Headless;
use madori::backend::Backend as _;
use madori::cli::{Cli, Sub};
use madori::gpu::ConnectorType;
use madori::manager::MonitorManager;
use madori::scale::{self, ScaleConstraints};
use madori_config::{Config, ConfigPath};
use madori_state::{LayoutReport, Transform};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    env::set_var("RUST_BACKTRACE", "1");

    let directives = env::var("RUST_LOG").unwrap_or_else(|_| "madori=debug,info".to_owned());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .init();

    let cli = Cli::parse();

    match cli.subcommand {
        Sub::Layout {
            snapshot,
            config,
            json,
        } => {
            let config = load_config(config)?;
            let snapshot = Headless::new(snapshot).read_state()?;

            let mut manager = MonitorManager::new();
            manager.reload(&snapshot, &config);
            let report = manager.layout_report(&config);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Sub::Scales {
            size: (width, height),
            connector,
            mm,
            no_fractional,
            no_logical_remainder,
        } => {
            let (width_mm, height_mm) = mm.unwrap_or((0, 0));
            let connector_type = connector
                .map(|c| connector_type_from_arg(&c))
                .unwrap_or(ConnectorType::Unknown);

            let preferred = scale::calculate(
                width,
                height,
                width_mm,
                height_mm,
                connector_type.is_hdmi(),
            );

            let mut constraints = ScaleConstraints::empty();
            constraints.set(ScaleConstraints::NO_FRACTIONAL, no_fractional);
            constraints.set(ScaleConstraints::NO_LOGICAL_REMAINDER, no_logical_remainder);
            let scales = scale::supported_scales(width, height, constraints);

            println!("Preferred scale: {preferred}");
            println!("Supported scales:");
            for scale in scales {
                let w = (f64::from(width) / scale).round() as i32;
                let h = (f64::from(height) / scale).round() as i32;
                println!("  {scale:.4} ({w} x {h} logical)");
            }
        }
        Sub::Validate { config } => {
            config_path(config).load().map_err(|err| anyhow!("{err:?}"))?;
            println!("Config is valid.");
        }
    }

    Ok(())
}

fn config_path(explicit: Option<PathBuf>) -> ConfigPath {
    match explicit {
        Some(path) => ConfigPath::Explicit(path),
        None => {
            let user_dir = env::var_os("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .filter(|path| path.is_absolute())
                .or_else(|| {
                    let home = env::var_os("HOME").map(PathBuf::from)?;
                    Some(home.join(".config"))
                })
                .unwrap_or_default();

            ConfigPath::Regular {
                user_path: user_dir.join("madori/config.kdl"),
                system_path: PathBuf::from("/etc/madori/config.kdl"),
            }
        }
    }
}

fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<Config> {
    config_path(explicit)
        .load_or_default()
        .map_err(|err| anyhow!("{err:?}"))
}

fn connector_type_from_arg(value: &str) -> ConnectorType {
    match ConnectorType::from_property(value) {
        ConnectorType::Unknown => ConnectorType::from_connector_name(value),
        decoded => decoded,
    }
}

fn print_report(report: &LayoutReport) {
    for monitor in &report.monitors {
        println!(r#"Monitor "{}" ({})"#, monitor.connector, monitor.display_name);
        println!(
            "  {} {} {}",
            monitor.vendor, monitor.product, monitor.serial
        );
        if monitor.is_builtin {
            println!("  Built-in panel");
        }
        if !monitor.is_active {
            println!("  Disabled");
        }

        println!("  Modes:");
        for mode in &monitor.modes {
            let mut line = format!("    {}", mode.id);
            if mode.is_current {
                line.push_str(" (current)");
            }
            if mode.is_preferred {
                line.push_str(" (preferred)");
            }
            println!("{line}");
            let scales: Vec<String> = mode
                .supported_scales
                .iter()
                .map(|s| format!("{s:.2}"))
                .collect();
            println!(
                "      preferred scale {}, supported [{}]",
                mode.preferred_scale,
                scales.join(", ")
            );
        }
        println!();
    }

    for logical in &report.logical_monitors {
        println!(
            "Logical monitor at {}, {} ({} x {})",
            logical.x, logical.y, logical.width, logical.height
        );
        println!("  Scale: {}", logical.scale);
        println!("  Transform: {}", transform_name(logical.transform));
        if logical.is_primary {
            println!("  Primary");
        }
        if logical.is_presentation {
            println!("  Presentation");
        }
        println!("  Monitors: {}", logical.monitors.join(", "));
        println!();
    }
}

fn transform_name(transform: Transform) -> &'static str {
    match transform {
        Transform::Normal => "normal",
        Transform::_90 => "90",
        Transform::_180 => "180",
        Transform::_270 => "270",
        Transform::Flipped => "flipped",
        Transform::Flipped90 => "flipped-90",
        Transform::Flipped180 => "flipped-180",
        Transform::Flipped270 => "flipped-270",
    }
}
