use std::sync::Once;

/// Used when neither the config nor `RUST_LOG` names a filter. wgpu and naga
/// stay at warnings.
const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// How `init_logging` sets up `env_logger`.
///
/// `env_filter` overrides both `RUST_LOG` and the default. Set it to
/// `"kernelrun_engine=trace"` to see per-buffer work.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Installs `env_logger` for the process. Only the first call has an effect.
///
/// Session open and device selection log at info. Builds and dispatches log
/// at debug. Per-buffer work and host waits log at trace.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let env = std::env::var("RUST_LOG").ok();
        let filter = effective_filter(config.env_filter.as_deref(), env.as_deref());

        let mut builder = env_logger::Builder::new();
        builder.parse_filters(filter);
        builder.write_style(config.write_style);

        // A test harness may have installed its own logger.
        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized with `{filter}`");
    });
}

fn effective_filter<'a>(configured: Option<&'a str>, env: Option<&'a str>) -> &'a str {
    configured.or(env).unwrap_or(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_filter_wins_over_environment() {
        assert_eq!(effective_filter(Some("debug"), Some("error")), "debug");
    }

    #[test]
    fn environment_is_used_without_configured_filter() {
        assert_eq!(effective_filter(None, Some("kernelrun_engine=trace")), "kernelrun_engine=trace");
    }

    #[test]
    fn default_quiets_wgpu_internals() {
        let filter = effective_filter(None, None);
        assert!(filter.starts_with("info,"));
        for module in ["wgpu_core=warn", "wgpu_hal=warn", "naga=warn"] {
            assert!(filter.contains(module), "{module} missing from {filter}");
        }
    }
}
