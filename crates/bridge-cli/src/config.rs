//! Configuration loading helpers for the `unity-bridge` CLI.
//!
//! Leading configuration flags are split off for `ortho_config`; everything
//! from the first other token onwards is parsed by the command-line grammar.

use std::ffi::{OsStr, OsString};

use bridge_config::Config;
use ortho_config::OrthoConfig;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration for the CLI.
    ///
    /// # Flag Ordering
    ///
    /// Configuration flags (listed in `CONFIG_CLI_FLAGS`) must appear before
    /// the command. Later occurrences are handed to the command parser, which
    /// rejects them.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

#[derive(Debug, Clone, Copy)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

impl OrthoConfigLoader {
    fn process_config_flag(argument: &OsStr) -> FlagAction {
        let argument_text = argument.to_string_lossy();
        if !argument_text.starts_with("--") {
            return FlagAction::Skip;
        }

        let (flag, has_inline_value) = match argument_text.split_once('=') {
            Some((flag, _)) => (flag, true),
            None => (&*argument_text, false),
        };

        if super::CONFIG_CLI_FLAGS.contains(&flag) {
            return FlagAction::Include {
                needs_value: !has_inline_value,
            };
        }

        FlagAction::Skip
    }
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_start: usize,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut filtered: Vec<OsString> = vec![program.clone()];
    let mut command_start = 1usize;
    let mut pending_values = 0usize;

    for argument in args.iter().skip(1) {
        if pending_values > 0 {
            filtered.push(argument.clone());
            pending_values -= 1;
            command_start += 1;
            continue;
        }

        match OrthoConfigLoader::process_config_flag(argument.as_os_str()) {
            FlagAction::Include { needs_value } => {
                filtered.push(argument.clone());
                command_start += 1;
                if needs_value {
                    pending_values = 1;
                }
            }
            FlagAction::Skip => break,
        }
    }

    ConfigArgumentSplit {
        config_arguments: filtered,
        command_start,
    }
}

/// Rebuilds the argument list seen by the command parser: the program name
/// followed by everything after the configuration flags.
pub(crate) fn command_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    args.first()
        .into_iter()
        .chain(args.iter().skip(split.command_start))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::ffi::OsStr;

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case("--log-filter=debug", false)]
    #[case("--status-dirs=/tmp/a", false)]
    #[case("--request-timeout-secs", true)]
    #[case("--config-path", true)]
    fn known_flags_are_included(#[case] argument: &str, #[case] expects_value: bool) {
        match OrthoConfigLoader::process_config_flag(OsStr::new(argument)) {
            FlagAction::Include { needs_value } => assert_eq!(needs_value, expects_value),
            FlagAction::Skip => panic!("expected include for {argument}"),
        }
    }

    #[rstest]
    #[case("ping")]
    #[case("--pretty")]
    #[case("--timeout")]
    #[case("-t")]
    fn other_arguments_signal_stop(#[case] argument: &str) {
        let result = OrthoConfigLoader::process_config_flag(OsStr::new(argument));
        assert!(matches!(result, FlagAction::Skip), "should skip {argument}");
    }

    #[test]
    fn splits_leading_configuration_flags() {
        let args = os_args(&[
            "unity-bridge",
            "--log-filter",
            "debug",
            "--request-timeout-secs=5",
            "rotate",
            "speed=45",
            "--log-format",
        ]);
        let split = split_config_arguments(&args);
        assert_eq!(
            split.config_arguments,
            os_args(&[
                "unity-bridge",
                "--log-filter",
                "debug",
                "--request-timeout-secs=5"
            ])
        );
        assert_eq!(
            command_arguments(&args, &split),
            os_args(&["unity-bridge", "rotate", "speed=45", "--log-format"])
        );
    }

    #[test]
    fn ortho_loader_applies_command_line_flags() {
        let config = OrthoConfigLoader
            .load(&os_args(&["unity-bridge", "--request-timeout-secs", "7"]))
            .expect("configuration loads");
        assert_eq!(config.request_timeout(), std::time::Duration::from_secs(7));
    }

    #[test]
    fn empty_arguments_split_to_nothing() {
        let split = split_config_arguments(&[]);
        assert!(split.config_arguments.is_empty());
        assert_eq!(split.command_start, 0);
    }
}
