use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Command, FromArgMatches as _};

use crate::context::Context;
use crate::error::ExposureError;
use crate::global_properties::ContextGlobalPropertiesExt;
use crate::log::{info, parse_log_levels, set_log_level, set_module_filters};
use crate::random::ContextRandomExt;
use crate::report::ContextReportExt;

/// Default cli arguments for the exposure runner
#[derive(Args, Debug)]
pub struct BaseArgs {
    /// Random seed
    #[arg(short, long, default_value = "0")]
    pub random_seed: u64,

    /// Optional path for a global properties config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Optional path for report output
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Enable logging: a level (`info`) and/or module filters
    /// (`contact_exposure::exposure=trace`), comma separated
    #[arg(short, long)]
    pub log_level: Option<String>,
}

#[derive(Args)]
pub struct PlaceholderCustom {}

fn create_cli() -> Command {
    let cli = Command::new("contact-exposure");
    BaseArgs::augment_args(cli)
}

/// Runs a simulation with custom cli arguments.
///
/// # Parameters
/// - `setup_fn`: called with the new `Context`, the parsed `BaseArgs` and the
///   parsed custom arguments `A` before the plan queue is executed
///
/// # Errors
/// Returns an error if argument parsing or the setup function fails
pub fn run_with_custom_args<A, F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    A: Args,
    F: Fn(&mut Context, BaseArgs, Option<A>) -> Result<(), ExposureError>,
{
    run_with_custom_args_from(std::env::args_os(), setup_fn)
}

/// As [`run_with_custom_args`], parsing `args` instead of the process
/// arguments. The first item is the program name.
///
/// # Errors
/// Returns an error if argument parsing or the setup function fails
pub fn run_with_custom_args_from<I, T, A, F>(
    args: I,
    setup_fn: F,
) -> Result<Context, Box<dyn std::error::Error>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    A: Args,
    F: Fn(&mut Context, BaseArgs, Option<A>) -> Result<(), ExposureError>,
{
    let cli = A::augment_args(create_cli());
    let matches = cli.try_get_matches_from(args)?;

    let base_args_matches = BaseArgs::from_arg_matches(&matches)?;
    let custom_matches = A::from_arg_matches(&matches)?;
    run_with_args_internal(base_args_matches, Some(custom_matches), setup_fn)
}

/// Runs a simulation with default cli arguments
///
/// # Errors
/// Returns an error if argument parsing or the setup function fails
pub fn run_with_args<F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, BaseArgs, Option<PlaceholderCustom>) -> Result<(), ExposureError>,
{
    let matches = create_cli().try_get_matches()?;

    let base_args_matches = BaseArgs::from_arg_matches(&matches)?;
    run_with_args_internal(base_args_matches, None, setup_fn)
}

fn configure_logging(log_level: &str) -> Result<(), ExposureError> {
    let (global, modules) = parse_log_levels(log_level)?;
    if let Some(level) = global {
        set_log_level(level);
        println!("Logging enabled at level {level}");
    }
    let filters: Vec<(&str, _)> = modules
        .iter()
        .map(|(module, level)| (module.as_str(), *level))
        .collect();
    set_module_filters(&filters);
    for (module, level) in filters {
        println!("Logging enabled for {module} at level {level}");
    }
    Ok(())
}

fn run_with_args_internal<A, F>(
    args: BaseArgs,
    custom_args: Option<A>,
    setup_fn: F,
) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, BaseArgs, Option<A>) -> Result<(), ExposureError>,
{
    let mut context = Context::new();

    if let Some(log_level) = &args.log_level {
        configure_logging(log_level)?;
    }

    if let Some(config) = &args.config {
        info!("Loading global properties from: {}", config.display());
        context.load_global_properties(config)?;
    }

    if let Some(output_dir) = &args.output_dir {
        context.report_options().directory(output_dir.clone());
    }

    context.init_random(args.random_seed);

    setup_fn(&mut context, args, custom_args)?;

    context.execute();
    Ok(context)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use serde::Deserialize;

    use super::*;
    use crate::{define_global_property, define_rng};

    #[derive(Args, Debug)]
    struct CustomArgs {
        #[arg(short, long, default_value = "0")]
        field: u32,
    }

    fn base_args() -> BaseArgs {
        BaseArgs {
            random_seed: 42,
            config: None,
            output_dir: None,
            log_level: None,
        }
    }

    #[test]
    fn parses_base_and_custom_args() {
        let result = run_with_custom_args_from(
            ["exposure", "--random-seed", "7", "--field", "3"],
            |_, args, custom: Option<CustomArgs>| {
                assert_eq!(args.random_seed, 7);
                assert!(args.config.is_none());
                assert_eq!(custom.unwrap().field, 3);
                Ok(())
            },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn unknown_argument_is_an_error() {
        let result = run_with_custom_args_from(
            ["exposure", "--no-such-flag"],
            |_, _, _: Option<CustomArgs>| Ok(()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn run_with_random_seed() {
        // Use a comparison context to verify the random seed was set
        let mut compare_ctx = Context::new();
        compare_ctx.init_random(42);
        define_rng!(TestRng);
        let result = run_with_args_internal(base_args(), None, |ctx, _, _: Option<()>| {
            assert_eq!(
                ctx.sample_range(TestRng, 0..100),
                compare_ctx.sample_range(TestRng, 0..100)
            );
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[derive(Deserialize, Debug, PartialEq)]
    pub struct RunnerPropertyType {
        field_int: u32,
    }
    define_global_property!(RunnerProperty, RunnerPropertyType);

    #[test]
    fn run_with_config_path() {
        let test_args = BaseArgs {
            config: Some(PathBuf::from("tests/data/global_properties_runner.json")),
            ..base_args()
        };
        let result = run_with_args_internal(test_args, None, |ctx, _, _: Option<()>| {
            let property = ctx.get_global_property_value(RunnerProperty).unwrap();
            assert_eq!(property.field_int, 0);
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn missing_config_is_an_error() {
        let test_args = BaseArgs {
            config: Some(PathBuf::from("tests/data/does_not_exist.json")),
            ..base_args()
        };
        let result = run_with_args_internal(test_args, None, |_, _, _: Option<()>| Ok(()));
        assert!(result.is_err());
    }

    #[test]
    fn run_with_output_dir() {
        let test_args = BaseArgs {
            output_dir: Some(PathBuf::from("data")),
            ..base_args()
        };
        let result = run_with_args_internal(test_args, None, |ctx, _, _: Option<()>| {
            let output_dir = &ctx.report_options().directory;
            assert_eq!(output_dir, &PathBuf::from("data"));
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn invalid_log_level_is_an_error() {
        let test_args = BaseArgs {
            log_level: Some("contact_exposure=chatty".to_string()),
            ..base_args()
        };
        let result = run_with_args_internal(test_args, None, |_, _, _: Option<()>| Ok(()));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_module_filter_is_an_error() {
        for log_level in ["contact_exposure::=debug", "=trace", "info,::exposure=warn"] {
            let test_args = BaseArgs {
                log_level: Some(log_level.to_string()),
                ..base_args()
            };
            let result =
                run_with_args_internal(test_args, None, |_, _, _: Option<()>| Ok(()));
            assert!(result.is_err(), "{log_level} was accepted");
        }
        // Logging can still be configured afterwards.
        crate::log::set_log_level(crate::log::LevelFilter::Off);
    }

    #[test]
    fn setup_error_is_returned() {
        let result = run_with_args_internal(base_args(), None, |_, _, _: Option<()>| {
            Err(ExposureError::ExposureError("setup failed".to_string()))
        });
        assert!(result.is_err());
    }

    #[test]
    fn plans_run_after_setup() {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let result = run_with_args_internal(base_args(), None, move |ctx, _, _: Option<()>| {
            let flag = Rc::clone(&flag);
            ctx.add_plan(1.0, move |_| flag.set(true));
            Ok(())
        });
        let context = result.unwrap();
        assert!(ran.get());
        assert_eq!(context.get_current_time(), 1.0);
    }

    #[test]
    fn run_with_custom() {
        let custom = CustomArgs { field: 42 };
        let result = run_with_args_internal(base_args(), Some(custom), |_, _, c| {
            assert_eq!(c.unwrap().field, 42);
            Ok(())
        });
        assert!(result.is_ok());
    }
}
