//! Minimal TOML parser for the stage configuration
//!
//! Handles the subset `stage.toml` needs, without allocation:
//!
//! - `[section]` headers (`geometry`, `motion`, `homing`, `persistence`)
//! - `key = value` pairs with integer, float, boolean and string values
//! - Small numeric arrays: `coefficients = [281.3, -140.6, 243.6]`
//! - Comments (`# ...`), whole-line or trailing
//! - Underscores in numbers (`53_333`)
//!
//! Keys are applied on top of [`StageConfig::default`], so a file only
//! needs the values it changes. Unknown keys are reported through a
//! callback and otherwise ignored.
//!
//! NOT supported: multi-line strings, inline tables, dotted keys, dates.

use super::stage::{HomingOrder, StageConfig};

/// Longest numeric literal accepted
const MAX_NUMBER_LEN: usize = 32;

/// Parse error, with the 1-based line it was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TomlError {
    /// Unknown or malformed `[section]` header
    InvalidSection { line: u32 },
    /// Line is neither a header nor `key = value`
    InvalidLine { line: u32 },
    /// Value has the wrong type or is out of range for its key
    InvalidValue { line: u32 },
    /// Values are individually valid but contradict each other
    Inconsistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Geometry,
    Motion,
    Homing,
    Persistence,
}

/// Parse a stage configuration
///
/// `on_unknown` is called with each key the parser does not recognize.
pub fn parse_stage_config(
    input: &str,
    mut on_unknown: impl FnMut(&str),
) -> Result<StageConfig, TomlError> {
    let mut config = StageConfig::default();
    let mut section = Section::Root;

    for (index, line) in input.lines().enumerate() {
        let line_no = index as u32 + 1;
        let line = strip_comment(line).trim();

        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let name = header
                .strip_suffix(']')
                .ok_or(TomlError::InvalidSection { line: line_no })?;
            section = parse_section_header(name)
                .ok_or(TomlError::InvalidSection { line: line_no })?;
            continue;
        }

        let (key, value) =
            parse_key_value(line).ok_or(TomlError::InvalidLine { line: line_no })?;
        let known = apply_value(&mut config, section, key, value)
            .map_err(|()| TomlError::InvalidValue { line: line_no })?;
        if !known {
            on_unknown(key);
        }
    }

    validate(&config)?;
    Ok(config)
}

fn parse_section_header(name: &str) -> Option<Section> {
    match name.trim() {
        "geometry" => Some(Section::Geometry),
        "motion" => Some(Section::Motion),
        "homing" => Some(Section::Homing),
        "persistence" => Some(Section::Persistence),
        _ => None,
    }
}

/// Drop a trailing `# comment` that is not inside a string
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Split "key = value"
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Apply one value; `Ok(false)` for an unknown key
fn apply_value(
    config: &mut StageConfig,
    section: Section,
    key: &str,
    value: &str,
) -> Result<bool, ()> {
    match section {
        Section::Geometry => {
            let g = &mut config.geometry;
            match key {
                "coefficients" => g.coefficients = parse_f64_array(value)?,
                "steps_per_micron" => g.steps_per_micron = positive(parse_f64(value)?)?,
                "max_tip_rad" => g.max_tip_rad = positive(parse_f64(value)?)?,
                "max_tilt_rad" => g.max_tilt_rad = positive(parse_f64(value)?)?,
                "stroke_min_steps" => g.stroke_min_steps = parse_int(value)?,
                "stroke_max_steps" => g.stroke_max_steps = parse_int(value)?,
                _ => return Ok(false),
            }
        }
        Section::Motion => {
            let m = &mut config.motion;
            match key {
                "max_speed_steps_per_sec" => {
                    m.max_speed_steps_per_sec = positive(parse_f64(value)?)? as f32
                }
                "tick_period_us" => m.tick_period_us = nonzero(parse_int(value)?)?,
                "require_complete_target" => m.require_complete_target = parse_bool(value)?,
                _ => return Ok(false),
            }
        }
        Section::Homing => {
            let h = &mut config.homing;
            match key {
                "sequence" => h.sequence = parse_order(value)?,
                "timeout_ms" => h.timeout_ms = nonzero(parse_int(value)?)?,
                "settle_ms" => h.settle_ms = parse_int(value)?,
                "resettle_ms" => h.resettle_ms = parse_int(value)?,
                "backoff_steps" => h.backoff_steps = nonzero(parse_int::<u32>(value)?)? as i32,
                "slow_seek_ratio" => {
                    let ratio = positive(parse_f64(value)?)?;
                    if ratio > 1.0 {
                        return Err(());
                    }
                    h.slow_seek_ratio = ratio as f32;
                }
                "home_position_steps" => h.home_position_steps = parse_int(value)?,
                "default_speed_steps_per_sec" => {
                    h.default_speed_steps_per_sec = positive(parse_f64(value)?)? as f32
                }
                _ => return Ok(false),
            }
        }
        Section::Persistence => match key {
            "reset_on_boot" => config.persistence.reset_on_boot = parse_bool(value)?,
            _ => return Ok(false),
        },
        Section::Root => return Ok(false),
    }
    Ok(true)
}

fn validate(config: &StageConfig) -> Result<(), TomlError> {
    let g = &config.geometry;
    let home = config.homing.home_position_steps;
    if g.stroke_min_steps >= g.stroke_max_steps || !g.in_stroke(home) {
        return Err(TomlError::Inconsistent);
    }
    Ok(())
}

fn positive(value: f64) -> Result<f64, ()> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(())
    }
}

fn nonzero(value: u32) -> Result<u32, ()> {
    if value > 0 {
        Ok(value)
    } else {
        Err(())
    }
}

/// Copy a numeric literal without its `_` separators
fn number_text<'a>(value: &str, buffer: &'a mut [u8; MAX_NUMBER_LEN]) -> Result<&'a str, ()> {
    let mut len = 0;
    for byte in value.bytes().filter(|&b| b != b'_') {
        *buffer.get_mut(len).ok_or(())? = byte;
        len += 1;
    }
    core::str::from_utf8(&buffer[..len]).map_err(|_| ())
}

fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ()> {
    let mut buffer = [0u8; MAX_NUMBER_LEN];
    number_text(value, &mut buffer)?.parse().map_err(|_| ())
}

fn parse_f64(value: &str) -> Result<f64, ()> {
    let mut buffer = [0u8; MAX_NUMBER_LEN];
    let parsed: f64 = number_text(value, &mut buffer)?.parse().map_err(|_| ())?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(())
    }
}

fn parse_bool(value: &str) -> Result<bool, ()> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(()),
    }
}

fn parse_string(value: &str) -> Result<&str, ()> {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or(())
}

fn parse_order(value: &str) -> Result<HomingOrder, ()> {
    match parse_string(value)? {
        "sequential" => Ok(HomingOrder::Sequential),
        "simultaneous" => Ok(HomingOrder::Simultaneous),
        _ => Err(()),
    }
}

/// Parse `[a, b, c]`; the element count must match exactly
fn parse_f64_array<const N: usize>(value: &str) -> Result<[f64; N], ()> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or(())?;

    let mut out = [0.0; N];
    let mut count = 0;
    for item in inner.split(',').map(str::trim) {
        // Trailing comma
        if item.is_empty() && count == N {
            continue;
        }
        *out.get_mut(count).ok_or(())? = parse_f64(item)?;
        count += 1;
    }
    if count == N {
        Ok(out)
    } else {
        Err(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<StageConfig, TomlError> {
        parse_stage_config(input, |_| {})
    }

    #[test]
    fn test_empty_input_gives_defaults() {
        assert_eq!(parse("").unwrap(), StageConfig::default());
        assert_eq!(parse("# nothing here\n\n").unwrap(), StageConfig::default());
    }

    #[test]
    fn test_full_config() {
        let input = r#"
# Reference cell
[geometry]
coefficients = [281.3, -140.6, 243.6]
steps_per_micron = 5.3333333
max_tip_rad = 0.04
max_tilt_rad = 0.03
stroke_min_steps = -40_000
stroke_max_steps = 40_000

[motion]
max_speed_steps_per_sec = 1500.0   # slower for the big cell
tick_period_us = 500
require_complete_target = true

[homing]
sequence = "simultaneous"
timeout_ms = 30000
settle_ms = 500
resettle_ms = 200
backoff_steps = 2000
slow_seek_ratio = 0.2
home_position_steps = -100
default_speed_steps_per_sec = 800

[persistence]
reset_on_boot = true
"#;
        let config = parse(input).unwrap();

        assert_eq!(config.geometry.coefficients, [281.3, -140.6, 243.6]);
        assert_eq!(config.geometry.max_tilt_rad, 0.03);
        assert_eq!(config.geometry.stroke_min_steps, -40_000);
        assert_eq!(config.motion.max_speed_steps_per_sec, 1500.0);
        assert_eq!(config.motion.tick_period_us, 500);
        assert!(config.motion.require_complete_target);
        assert_eq!(config.homing.sequence, HomingOrder::Simultaneous);
        assert_eq!(config.homing.backoff_steps, 2000);
        assert_eq!(config.homing.slow_seek_ratio, 0.2);
        assert_eq!(config.homing.home_position_steps, -100);
        assert_eq!(config.homing.default_speed_steps_per_sec, 800.0);
        assert!(config.persistence.reset_on_boot);
    }

    #[test]
    fn test_unknown_keys_are_reported() {
        let mut unknown = 0;
        let config = parse_stage_config(
            "board = \"pico\"\n[motion]\nacceleration = 5\ntick_period_us = 2000\n",
            |_| unknown += 1,
        )
        .unwrap();

        assert_eq!(unknown, 2);
        assert_eq!(config.motion.tick_period_us, 2000);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        assert_eq!(
            parse("[motion]\n\ntick_period_us = fast\n"),
            Err(TomlError::InvalidValue { line: 3 })
        );
        assert_eq!(parse("[gantry]\n"), Err(TomlError::InvalidSection { line: 1 }));
        assert_eq!(parse("[homing\n"), Err(TomlError::InvalidSection { line: 1 }));
        assert_eq!(parse("[homing]\njust words\n"), Err(TomlError::InvalidLine { line: 2 }));
    }

    #[test]
    fn test_value_ranges() {
        assert!(parse("[homing]\nslow_seek_ratio = 1.5\n").is_err());
        assert!(parse("[homing]\nbackoff_steps = 0\n").is_err());
        assert!(parse("[homing]\nsequence = \"random\"\n").is_err());
        assert!(parse("[motion]\ntick_period_us = 0\n").is_err());
        assert!(parse("[geometry]\nsteps_per_micron = -1.0\n").is_err());
        assert!(parse("[geometry]\ncoefficients = [1.0, 2.0]\n").is_err());
        assert!(parse("[geometry]\ncoefficients = [1.0, 2.0, 3.0, 4.0]\n").is_err());
    }

    #[test]
    fn test_inconsistent_stroke() {
        assert_eq!(
            parse("[geometry]\nstroke_min_steps = 100\nstroke_max_steps = -100\n"),
            Err(TomlError::Inconsistent)
        );
        assert_eq!(
            parse("[homing]\nhome_position_steps = 60000\n"),
            Err(TomlError::Inconsistent)
        );
    }

    #[test]
    fn test_hash_inside_string_is_kept() {
        assert_eq!(strip_comment("name = \"a#b\" # note"), "name = \"a#b\" ");
    }
}
