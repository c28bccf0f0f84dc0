//! Process configuration from command line flags and `ISENGARD_*` variables
//!
//! Every setting has a default. A value that doesn't parse keeps the default
//! and is reported back as an [InvalidSetting] for the caller to log once
//! logging is up.

use clap::{App, Arg, ArgMatches};
use log::LevelFilter;
use regex::Regex;
use std::{fmt, path::PathBuf, time::Duration};

/// Container label that includes or excludes a container from updates
pub const ENABLE_LABEL: &str = "isengard.enable";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Time between update cycles
    pub interval: Duration,
    /// Exit after the first cycle
    pub run_once: bool,
    /// Remove the previous image after a container is updated
    pub cleanup: bool,
    /// Watch every container unless it opts out, rather than only the ones
    /// that opt in
    pub watch_all: bool,
    /// Allow the updater to replace its own container
    pub self_update: bool,
    /// How long a container gets to stop before it is killed
    pub stop_timeout: Duration,
    pub log_level: LevelFilter,
    /// Directory holding the `config.json` credential store
    pub docker_config: PathBuf,
}

/// A setting whose value didn't parse and was replaced by its default
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvalidSetting {
    pub name: &'static str,
    pub value: String,
}

impl fmt::Display for InvalidSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} {:?}", self.name, self.value)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            interval: Duration::from_secs(30 * 60),
            run_once: false,
            cleanup: true,
            watch_all: true,
            self_update: false,
            stop_timeout: Duration::from_secs(30),
            log_level: LevelFilter::Info,
            docker_config: PathBuf::from("/root/.docker"),
        }
    }
}

/// Command line definition, with environment variable fallbacks
pub fn app<'a, 'b>() -> App<'a, 'b> {
    App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about("Keeps running containers on the newest image their tag points at")
        .arg(
            Arg::with_name("interval")
                .long("interval")
                .env("ISENGARD_INTERVAL")
                .value_name("DURATION")
                .takes_value(true)
                .help("Time between update cycles, like 45s, 30m, 1h30m or plain seconds"),
        )
        .arg(bool_arg("run_once", "run-once", "ISENGARD_RUN_ONCE").help("Run one cycle and exit"))
        .arg(
            bool_arg("cleanup", "cleanup", "ISENGARD_CLEANUP")
                .help("Remove the previous image after updating a container"),
        )
        .arg(
            bool_arg("watch_all", "watch-all", "ISENGARD_WATCH_ALL")
                .help("Watch all containers, or only those labeled isengard.enable=true"),
        )
        .arg(
            bool_arg("self_update", "self-update", "ISENGARD_SELF_UPDATE")
                .help("Allow replacing the container this process runs in"),
        )
        .arg(
            Arg::with_name("stop_timeout")
                .long("stop-timeout")
                .env("ISENGARD_STOP_TIMEOUT")
                .value_name("SECONDS")
                .takes_value(true)
                .help("Grace period before a stopping container is killed"),
        )
        .arg(
            Arg::with_name("log_level")
                .long("log-level")
                .env("ISENGARD_LOG_LEVEL")
                .value_name("LEVEL")
                .takes_value(true)
                .help("One of debug, info, warn, error"),
        )
        .arg(
            Arg::with_name("docker_config")
                .long("docker-config")
                .env("DOCKER_CONFIG")
                .value_name("DIR")
                .takes_value(true)
                .help("Directory containing config.json with registry logins"),
        )
}

fn bool_arg<'a, 'b>(name: &'a str, long: &'a str, env: &'a str) -> Arg<'a, 'b> {
    Arg::with_name(name)
        .long(long)
        .env(env)
        .value_name("BOOL")
        .takes_value(true)
}

impl Config {
    /// Parse the process arguments and environment
    pub fn from_args() -> (Self, Vec<InvalidSetting>) {
        Config::from_matches(&app().get_matches())
    }

    pub fn from_matches(matches: &ArgMatches) -> (Self, Vec<InvalidSetting>) {
        let defaults = Config::default();
        let mut invalid = Vec::new();
        let config = Config {
            interval: setting(matches, "interval", parse_duration, defaults.interval, &mut invalid),
            run_once: setting(matches, "run_once", parse_bool, defaults.run_once, &mut invalid),
            cleanup: setting(matches, "cleanup", parse_bool, defaults.cleanup, &mut invalid),
            watch_all: setting(matches, "watch_all", parse_bool, defaults.watch_all, &mut invalid),
            self_update: setting(
                matches,
                "self_update",
                parse_bool,
                defaults.self_update,
                &mut invalid,
            ),
            stop_timeout: setting(
                matches,
                "stop_timeout",
                |s| parse_seconds(s).map(Duration::from_secs),
                defaults.stop_timeout,
                &mut invalid,
            ),
            log_level: setting(matches, "log_level", parse_level, defaults.log_level, &mut invalid),
            docker_config: matches
                .value_of("docker_config")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.docker_config),
        };
        (config, invalid)
    }
}

fn setting<T, F>(
    matches: &ArgMatches,
    name: &'static str,
    parse: F,
    default: T,
    invalid: &mut Vec<InvalidSetting>,
) -> T
where
    F: FnOnce(&str) -> Option<T>,
{
    match matches.value_of(name) {
        None => default,
        Some(value) => match parse(value.trim()) {
            Some(parsed) => parsed,
            None => {
                invalid.push(InvalidSetting {
                    name,
                    value: value.to_owned(),
                });
                default
            }
        },
    }
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_seconds(s: &str) -> Option<u64> {
    s.parse().ok().filter(|n| *n > 0)
}

/// Parse `90`, `45s`, `30m`, `2h` or combinations like `1h30m`
///
/// Zero is not a usable interval and parses as nothing.
pub fn parse_duration(s: &str) -> Option<Duration> {
    lazy_static! {
        static ref WHOLE: Regex = Regex::new(r"^(?:[0-9]+[hms])+$").unwrap();
        static ref PART: Regex = Regex::new(r"(?P<n>[0-9]+)(?P<unit>[hms])").unwrap();
    }

    let seconds = if let Some(seconds) = s.parse::<u64>().ok() {
        seconds
    } else if WHOLE.is_match(s) {
        let mut total: u64 = 0;
        for part in PART.captures_iter(s) {
            let n: u64 = part["n"].parse().ok()?;
            let scale = match &part["unit"] {
                "h" => 3600,
                "m" => 60,
                _ => 1,
            };
            total = total.checked_add(n.checked_mul(scale)?)?;
        }
        total
    } else {
        return None;
    };

    if seconds == 0 {
        None
    } else {
        Some(Duration::from_secs(seconds))
    }
}

fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.to_ascii_lowercase().as_str() {
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> (Config, Vec<InvalidSetting>) {
        let mut argv = vec!["isengard"];
        argv.extend_from_slice(args);
        Config::from_matches(&app().get_matches_from(argv))
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("0"), None);
        assert_eq!(parse_duration("0m"), None);
        assert_eq!(parse_duration("-5m"), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("5 m"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn levels() {
        assert_eq!(parse_level("DEBUG"), Some(LevelFilter::Debug));
        assert_eq!(parse_level("warn"), Some(LevelFilter::Warn));
        assert_eq!(parse_level("trace"), None);
    }

    // env fallbacks are left out here, tests share one process environment
    #[test]
    fn flags() {
        let (config, invalid) = parse(&[
            "--interval",
            "5m",
            "--run-once",
            "true",
            "--cleanup",
            "false",
            "--watch-all",
            "0",
            "--self-update",
            "1",
            "--stop-timeout",
            "10",
            "--log-level",
            "debug",
            "--docker-config",
            "/etc/docker",
        ]);
        assert_eq!(
            config,
            Config {
                interval: Duration::from_secs(300),
                run_once: true,
                cleanup: false,
                watch_all: false,
                self_update: true,
                stop_timeout: Duration::from_secs(10),
                log_level: LevelFilter::Debug,
                docker_config: PathBuf::from("/etc/docker"),
            }
        );
        assert!(invalid.is_empty());
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let (config, invalid) = parse(&[
            "--interval",
            "0",
            "--stop-timeout",
            "0",
            "--cleanup",
            "maybe",
            "--log-level",
            "loud",
        ]);
        let defaults = Config::default();
        assert_eq!(config.interval, defaults.interval);
        assert_eq!(config.stop_timeout, defaults.stop_timeout);
        assert_eq!(config.cleanup, defaults.cleanup);
        assert_eq!(config.log_level, defaults.log_level);

        let names: Vec<&str> = invalid.iter().map(|setting| setting.name).collect();
        assert_eq!(names, vec!["interval", "cleanup", "stop_timeout", "log_level"]);
        assert_eq!(invalid[1].to_string(), r#"invalid cleanup "maybe""#);
    }
}
