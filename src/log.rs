//! Logging configuration.
//!
//! Library code logs through the `log` facade macros re-exported here. Logging
//! is off until a level is set, either with the runner's `--log-level` option
//! or programmatically:
//!
//! ```rust
//! use contact_exposure::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! // Everything at `info` and above...
//! set_log_level(LevelFilter::Info);
//! // ...plus each sampled exposure.
//! set_module_filter("contact_exposure::exposure", LevelFilter::Trace);
//! ```
//!
//! With the `logging` feature the messages go to stdout through `log4rs`;
//! without it the configuration is kept but nothing is emitted.
pub use ::log::{debug, error, info, trace, warn, LevelFilter};

use std::sync::{LazyLock, Mutex, MutexGuard};

#[cfg(feature = "logging")]
use log4rs::Handle;

use crate::HashMap;

#[cfg(feature = "logging")]
const DEFAULT_LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// The global level plus per-module overrides, and the handle of the
/// installed logger. Only the singleton in `LOG_CONFIGURATION` exists.
struct LogConfiguration {
    global_log_level: LevelFilter,
    module_levels: HashMap<String, LevelFilter>,
    #[cfg(feature = "logging")]
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        LogConfiguration {
            global_log_level: LevelFilter::Off,
            module_levels: HashMap::default(),
            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    /// Installs the current levels, or replaces the config of the logger
    /// installed earlier.
    #[cfg(feature = "logging")]
    fn apply(&mut self) -> Result<(), String> {
        use log4rs::append::console::ConsoleAppender;
        use log4rs::config::{Appender, Logger, Root};
        use log4rs::encode::pattern::PatternEncoder;
        use log4rs::Config;

        let stdout = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
            .build();
        let mut builder =
            Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));
        for (module, level) in &self.module_levels {
            builder = builder.logger(Logger::builder().build(module.clone(), *level));
        }
        let root = Root::builder()
            .appender("stdout")
            .build(self.global_log_level);
        let config = builder
            .build(root)
            .map_err(|error| format!("failed to build logging config: {error}"))?;

        match self.root_handle {
            Some(ref handle) => handle.set_config(config),
            None => match log4rs::init_config(config) {
                Ok(handle) => self.root_handle = Some(handle),
                // Another logger was installed first; leave it alone.
                Err(error) => eprintln!("logging not initialized: {error}"),
            },
        }
        Ok(())
    }

    #[cfg(not(feature = "logging"))]
    #[allow(clippy::unnecessary_wraps)]
    fn apply(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn apply_or_report(&mut self) {
        if let Err(error) = self.apply() {
            eprintln!("{error}");
        }
    }

    /// Returns true if the level changed.
    fn insert_module_level(&mut self, module: &str, level: LevelFilter) -> bool {
        self.module_levels.insert(module.to_string(), level) != Some(level)
    }
}

fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    LOG_CONFIGURATION.lock().expect("Mutex poisoned")
}

/// Equivalent to `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Equivalent to `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the level for modules without their own filter.
pub fn set_log_level(level: LevelFilter) {
    let mut configuration = get_log_configuration();
    configuration.global_log_level = level;
    configuration.apply_or_report();
}

/// Checks that `module_path` names a module: one or more non-empty segments
/// separated by `::`.
///
/// # Errors
///
/// Returns a message naming the malformed path.
pub fn validate_module_path(module_path: &str) -> Result<(), String> {
    if module_path.split("::").any(|segment| segment.trim().is_empty()) {
        Err(format!("invalid module path: {module_path:?}"))
    } else {
        Ok(())
    }
}

/// Sets the level for `module_path` and everything below it. Malformed paths
/// are reported on stderr and ignored.
pub fn set_module_filter(module_path: &str, level: LevelFilter) {
    set_module_filters(&[(module_path, level)]);
}

/// Sets several module filters at once. Malformed paths are reported on
/// stderr and ignored.
pub fn set_module_filters(module_filters: &[(&str, LevelFilter)]) {
    let mut configuration = get_log_configuration();
    let mut changed = false;
    for (module, level) in module_filters {
        match validate_module_path(module) {
            Ok(()) => changed |= configuration.insert_module_level(module, *level),
            Err(error) => eprintln!("{error}"),
        }
    }
    if changed {
        configuration.apply_or_report();
    }
}

/// Removes the filter for `module_path`; the global level applies again.
pub fn remove_module_filter(module_path: &str) {
    let mut configuration = get_log_configuration();
    if configuration.module_levels.remove(module_path).is_some() {
        configuration.apply_or_report();
    }
}

/// Parses a `--log-level` value: comma-separated entries that are either a
/// level (the global level) or `module=level`.
///
/// # Errors
///
/// Returns a message naming the first entry with an invalid level or module
/// path.
pub fn parse_log_levels(
    value: &str,
) -> Result<(Option<LevelFilter>, Vec<(String, LevelFilter)>), String> {
    let parse_level = |text: &str| {
        text.trim()
            .parse::<LevelFilter>()
            .map_err(|_| format!("invalid log level: {text}"))
    };
    let mut global = None;
    let mut modules = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        match entry.split_once('=') {
            Some((module, level)) => {
                let module = module.trim();
                validate_module_path(module)?;
                modules.push((module.to_string(), parse_level(level)?));
            }
            None => global = Some(parse_level(entry)?),
        }
    }
    Ok((global, modules))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Logging tests share the global configuration.
    static TEST_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

    #[test]
    fn set_log_level_updates_configuration() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        set_log_level(LevelFilter::Error);
        assert_eq!(get_log_configuration().global_log_level, LevelFilter::Error);
        error!("set_log_level_updates_configuration: global set to error");
        disable_logging();
        assert_eq!(get_log_configuration().global_log_level, LevelFilter::Off);
    }

    #[test]
    fn module_filters_are_added_and_removed() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        set_module_filters(&[
            ("contact_exposure::exposure", LevelFilter::Trace),
            ("contact_exposure::interaction", LevelFilter::Debug),
        ]);
        {
            let configuration = get_log_configuration();
            assert_eq!(
                configuration.module_levels.get("contact_exposure::exposure"),
                Some(&LevelFilter::Trace)
            );
            assert_eq!(
                configuration.module_levels.get("contact_exposure::interaction"),
                Some(&LevelFilter::Debug)
            );
        }
        set_module_filter("contact_exposure::exposure", LevelFilter::Warn);
        remove_module_filter("contact_exposure::interaction");
        let configuration = get_log_configuration();
        assert_eq!(
            configuration.module_levels.get("contact_exposure::exposure"),
            Some(&LevelFilter::Warn)
        );
        assert!(!configuration
            .module_levels
            .contains_key("contact_exposure::interaction"));
    }

    #[test]
    fn parse_levels() {
        let (global, modules) = parse_log_levels("info, contact_exposure::exposure=trace").unwrap();
        assert_eq!(global, Some(LevelFilter::Info));
        assert_eq!(
            modules,
            vec![("contact_exposure::exposure".to_string(), LevelFilter::Trace)]
        );

        let (global, modules) = parse_log_levels("DEBUG").unwrap();
        assert_eq!(global, Some(LevelFilter::Debug));
        assert!(modules.is_empty());

        assert!(parse_log_levels("loud").is_err());
        assert!(parse_log_levels("a=loud").is_err());
        assert!(parse_log_levels("contact_exposure::=debug").is_err());
        assert!(parse_log_levels("=trace").is_err());
        assert!(parse_log_levels("contact_exposure::::exposure=info").is_err());
    }

    #[test]
    fn malformed_module_filter_is_ignored() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        set_module_filter("contact_exposure::", LevelFilter::Debug);
        set_module_filters(&[
            ("", LevelFilter::Trace),
            ("contact_exposure::report", LevelFilter::Info),
        ]);
        {
            let configuration = get_log_configuration();
            assert!(!configuration.module_levels.contains_key("contact_exposure::"));
            assert!(!configuration.module_levels.contains_key(""));
            assert_eq!(
                configuration.module_levels.get("contact_exposure::report"),
                Some(&LevelFilter::Info)
            );
        }
        // The configuration is still usable afterwards.
        set_log_level(LevelFilter::Warn);
        assert_eq!(get_log_configuration().global_log_level, LevelFilter::Warn);
        remove_module_filter("contact_exposure::report");
        disable_logging();
    }
}
