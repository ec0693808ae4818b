use std::sync::OnceLock;

use flexi_logger::{Logger, LoggerHandle};

static LOGGER: OnceLock<LoggerHandle> = OnceLock::new();

/// Start logging to stderr. Only the first call per process takes effect.
pub fn init_logging(level: &str) -> Result<(), String> {
    let level = normalize_level(level)?;
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let handle = Logger::try_with_str(level)
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;
    let _ = LOGGER.set(handle);
    log::debug!("logging started at level {}", level);
    Ok(())
}

pub fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => Ok("off"),
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected off|trace|debug|info|warn|error"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("WARNING"), Ok("warn"));
        assert_eq!(normalize_level(" debug "), Ok("debug"));
        assert!(normalize_level("loud").is_err());
    }
}
