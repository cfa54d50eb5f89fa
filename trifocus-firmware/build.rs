//! Build script for trifocus-firmware
//!
//! - Sets up linker search paths and scripts for memory.x
//! - Validates stage.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    if env::var_os("CARGO_FEATURE_DEFMT").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Expected type of a stage.toml value
#[derive(Clone, Copy)]
enum Kind {
    Int,
    Number,
    Bool,
    Sequence,
    Coefficients,
}

/// Keys the firmware understands, per section
const SCHEMA: &[(&str, &[(&str, Kind)])] = &[
    (
        "geometry",
        &[
            ("coefficients", Kind::Coefficients),
            ("steps_per_micron", Kind::Number),
            ("max_tip_rad", Kind::Number),
            ("max_tilt_rad", Kind::Number),
            ("stroke_min_steps", Kind::Int),
            ("stroke_max_steps", Kind::Int),
        ],
    ),
    (
        "motion",
        &[
            ("max_speed_steps_per_sec", Kind::Number),
            ("tick_period_us", Kind::Int),
            ("require_complete_target", Kind::Bool),
        ],
    ),
    (
        "homing",
        &[
            ("sequence", Kind::Sequence),
            ("timeout_ms", Kind::Int),
            ("settle_ms", Kind::Int),
            ("resettle_ms", Kind::Int),
            ("backoff_steps", Kind::Int),
            ("slow_seek_ratio", Kind::Number),
            ("home_position_steps", Kind::Int),
            ("default_speed_steps_per_sec", Kind::Number),
        ],
    ),
    ("persistence", &[("reset_on_boot", Kind::Bool)]),
];

/// Validate stage.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=stage.toml");

    let config_path = Path::new("stage.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: stage.toml not found!                                    ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds stage.toml as its default configuration.    ║\n\
            ║  Please create one in the trifocus-firmware directory.           ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read stage.toml                                ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in stage.toml                        ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let errors = check_schema(&config);
    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid stage configuration                              ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=stage.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check sections, key names and value types
fn check_schema(config: &toml::Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(root) = config.as_table() else {
        errors.push("top level must be a table".to_string());
        return errors;
    };

    for (section, value) in root {
        let Some((_, keys)) = SCHEMA.iter().find(|(name, _)| name == section) else {
            errors.push(format!("unknown section [{}]", section));
            continue;
        };
        let Some(table) = value.as_table() else {
            errors.push(format!("[{}] must be a table", section));
            continue;
        };

        for (key, value) in table {
            let Some((_, kind)) = keys.iter().find(|(name, _)| name == key) else {
                // The firmware ignores these too, with a warning
                println!("cargo:warning=stage.toml: unknown key {}.{}", section, key);
                continue;
            };
            if !kind_matches(*kind, value) {
                errors.push(format!("[{}] {} has the wrong type", section, key));
            }
        }
    }

    if let Some(homing) = config.get("homing") {
        if let Some(ratio) = homing.get("slow_seek_ratio").and_then(as_number) {
            if ratio <= 0.0 || ratio > 1.0 {
                errors.push("[homing] slow_seek_ratio must be in (0, 1]".to_string());
            }
        }
    }

    errors
}

fn as_number(value: &toml::Value) -> Option<f64> {
    match value {
        toml::Value::Integer(i) => Some(*i as f64),
        toml::Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn kind_matches(kind: Kind, value: &toml::Value) -> bool {
    match kind {
        Kind::Int => value.is_integer(),
        Kind::Number => as_number(value).is_some(),
        Kind::Bool => value.is_bool(),
        Kind::Sequence => matches!(value.as_str(), Some("sequential" | "simultaneous")),
        Kind::Coefficients => value
            .as_array()
            .is_some_and(|items| items.len() == 3 && items.iter().all(|v| as_number(v).is_some())),
    }
}
