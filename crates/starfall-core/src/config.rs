use crate::logging::DEFAULT_FILTER;

/// Process-level configuration read by the bootstrap code.
#[derive(Debug, Clone)]
pub struct Config {
    pub profiling: ProfilingMode,
    /// `tracing-subscriber` filter directive.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            profiling: ProfilingMode::Off,
            log_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn with_profiling(mut self, mode: ProfilingMode) -> Self {
        self.profiling = mode;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Install logging and, if requested, start the profiler.
    pub fn apply(&self) {
        crate::logging::init_with_filter(&self.log_filter);
        match self.profiling {
            ProfilingMode::Off => {}
            ProfilingMode::Scopes => crate::profiling::set_scopes_on(true),
            ProfilingMode::WithWebserver => {
                crate::profiling::init_profiling(crate::profiling::ProfilingBackend::PuffinHttp)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingMode {
    /// Profiling scopes are compiled in but not recorded
    Off,
    /// Scopes are recorded in-process
    Scopes,
    /// Scopes are recorded and served to `puffin_viewer` over HTTP
    WithWebserver,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.profiling, ProfilingMode::Off);
        assert_eq!(config.log_filter, DEFAULT_FILTER);
    }

    #[test]
    fn test_builder() {
        let config = Config::default()
            .with_profiling(ProfilingMode::Scopes)
            .with_log_filter("warn");
        assert_eq!(config.profiling, ProfilingMode::Scopes);
        assert_eq!(config.log_filter, "warn");
    }
}
