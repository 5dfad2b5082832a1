//! Validation helpers for free-text admin input.

use validator::ValidationError;

/// Longest map name kept; extra characters are dropped.
pub const MAP_NAME_MAX_CHARS: usize = 100;
/// Shortest accepted map name after trimming.
pub const MAP_NAME_MIN_CHARS: usize = 3;

/// MVP line split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MvpLine {
    pub name: String,
    pub kills: u32,
    pub deaths: u32,
}

/// Parse `<name> <kills>/<deaths>`: the name is ASCII letters, digits or `_`, kills and deaths
/// are one to three digits.
///
/// ```ignore
/// parse_mvp_line("KSCERATO 23/10") // Ok
/// parse_mvp_line("KSCERATO 23-10") // Err - separator
/// parse_mvp_line("KSCERATO 2300/1") // Err - too many digits
/// ```
pub fn parse_mvp_line(text: &str) -> Result<MvpLine, ValidationError> {
    let invalid = || {
        let mut err = ValidationError::new("mvp_format");
        err.message = Some("MVP must look like `<name> <kills>/<deaths>`, e.g. `KSCERATO 23/10`".into());
        err
    };

    let mut parts = text.split_whitespace();
    let (Some(name), Some(kd), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(invalid());
    }

    let (kills, deaths) = kd.split_once('/').ok_or_else(invalid)?;
    Ok(MvpLine {
        name: name.to_owned(),
        kills: parse_stat(kills).ok_or_else(invalid)?,
        deaths: parse_stat(deaths).ok_or_else(invalid)?,
    })
}

fn parse_stat(value: &str) -> Option<u32> {
    if value.is_empty() || value.len() > 3 || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Trim a map name and cut it to [`MAP_NAME_MAX_CHARS`]; shorter than [`MAP_NAME_MIN_CHARS`] is rejected.
pub fn sanitize_map_name(raw: &str) -> Result<String, ValidationError> {
    let name: String = raw.trim().chars().take(MAP_NAME_MAX_CHARS).collect();
    let name = name.trim_end().to_owned();
    if name.chars().count() < MAP_NAME_MIN_CHARS {
        let mut err = ValidationError::new("map_name_length");
        err.message = Some(
            format!("Map name must have at least {MAP_NAME_MIN_CHARS} characters").into(),
        );
        return Err(err);
    }
    Ok(name)
}

/// Human-readable message of a validation error.
pub fn describe(err: &ValidationError) -> String {
    err.message
        .as_ref()
        .map(|message| message.to_string())
        .unwrap_or_else(|| err.code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mvp_line_valid() {
        assert_eq!(
            parse_mvp_line("KSCERATO 23/10").unwrap(),
            MvpLine {
                name: "KSCERATO".into(),
                kills: 23,
                deaths: 10
            }
        );
        assert_eq!(parse_mvp_line("  yuurih   9/0 ").unwrap().deaths, 0);
        assert_eq!(parse_mvp_line("fallen_2 100/999").unwrap().kills, 100);
    }

    #[test]
    fn test_parse_mvp_line_invalid() {
        assert!(parse_mvp_line("").is_err());
        assert!(parse_mvp_line("KSCERATO").is_err()); // no stats
        assert!(parse_mvp_line("KSCERATO 23-10").is_err()); // separator
        assert!(parse_mvp_line("KSCERATO 1000/1").is_err()); // four digits
        assert!(parse_mvp_line("KSC ERATO 23/10").is_err()); // space in name
        assert!(parse_mvp_line("KSC-ERATO 23/10").is_err()); // dash in name
        assert!(parse_mvp_line("KSCERATO +2/10").is_err()); // sign
        assert!(parse_mvp_line("KSCERATO 23/").is_err());
    }

    #[test]
    fn test_sanitize_map_name() {
        assert_eq!(sanitize_map_name("  Mirage ").unwrap(), "Mirage");
        assert!(sanitize_map_name(" ab ").is_err());
        assert!(sanitize_map_name("   ").is_err());

        let long = "x".repeat(150);
        assert_eq!(sanitize_map_name(&long).unwrap().len(), MAP_NAME_MAX_CHARS);
    }
}
