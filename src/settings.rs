use std::{
	env,
	path::{Path, PathBuf},
	time::Duration,
};

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use url::Url;

use crate::{
	alert_renderer::DetailSections,
	filter::FilterCriteria,
	sort::{SeverityRanks, SortKey},
};

/// alertmanager used when nothing else is configured
const DEFAULT_URL: &str = "https://cms-monitoring.cern.ch/alertmanager";
/// name of the config file in the home directory
const DEFAULT_CONFIG_FILE: &str = ".alertconfig.json";
/// environment variable pointing to the config file
const CONFIG_PATH_VAR: &str = "CONFIG_PATH";

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
	/// base url of alertmanager
	pub url: Url,
	/// header of the alert table
	pub columns: Vec<String>,
	/// headings of the detail view
	pub sections: DetailSections,
	/// labels listed in the detail view
	pub attributes: Vec<String>,
	#[serde_as(as = "DurationSeconds<u64>")]
	pub http_timeout: Duration,
	pub verbose: u8,
	/// rank of each severity, used when sorting by severity
	pub severity: SeverityRanks,
	/// bearer token sent to alertmanager
	#[serde(skip_serializing_if = "Option::is_none")]
	pub token: Option<String>,
	/// tera template replacing the built in detail view
	#[serde(skip_serializing_if = "Option::is_none")]
	pub detail_template: Option<PathBuf>,
}

impl Default for Settings {
	fn default() -> Self {
		#[allow(clippy::expect_used)]
		let url = Url::parse(DEFAULT_URL).expect("default alertmanager url is valid");

		Self {
			url,
			columns: ["NAME", "SERVICE", "TAG", "SEVERITY", "STARTS", "ENDS", "DURATION"]
				.map(String::from)
				.to_vec(),
			sections: DetailSections::default(),
			attributes: ["service", "tag", "severity"].map(String::from).to_vec(),
			http_timeout: Duration::from_secs(3),
			verbose: 0,
			severity: [
				("info", 0),
				("warning", 1),
				("medium", 2),
				("high", 3),
				("critical", 4),
				("urgent", 5),
			]
			.into_iter()
			.collect(),
			token: None,
			detail_template: None,
		}
	}
}

/// where the settings were loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
	/// read from this file
	File(PathBuf),
	/// the file doesn't exist, defaults were used
	Missing(PathBuf),
	/// no config file location could be determined
	Defaults,
}

impl Settings {
	/// Loads settings for a run: defaults, overridden by the config file, the
	/// `ALERT_*` environment variables and finally the command line.
	pub fn load(opts: &Opts) -> Result<(Self, ConfigOrigin)> {
		let path = opts.config.clone().or_else(default_config_path);

		let origin = match path {
			Some(path) if path.exists() => ConfigOrigin::File(path),
			Some(path) => ConfigOrigin::Missing(path),
			None => ConfigOrigin::Defaults,
		};

		let file = match &origin {
			ConfigOrigin::File(path) => Some(path.as_path()),
			_ => None,
		};

		let mut settings = Self::from_file(file)
			.with_context(|| format!("can't load config from {origin:?}"))?;

		if opts.verbose > 0 {
			settings.verbose = opts.verbose;
		}

		if let Some(token) = &opts.token {
			settings.token = Some(token.clone());
		}

		Ok((settings, origin))
	}

	/// settings from the config file at `path` (if any) and the environment
	pub fn from_file(path: Option<&Path>) -> Result<Self> {
		let mut conf = config::Config::builder();

		if let Some(path) = path {
			conf = conf.add_source(config::File::from(path));
		}

		conf = conf.add_source(
			config::Environment::with_prefix("ALERT")
				.prefix_separator("_")
				.separator("__")
				.try_parsing(true),
		);

		conf.build()
			.context("can't load config")?
			.try_deserialize()
			.context("can't parse config")
	}

	/// writes the default settings as json to `path`
	pub fn generate(path: &Path) -> Result<()> {
		let config = serde_json::to_string_pretty(&Self::default())
			.context("default config can't be serialized")?;

		std::fs::write(path, config)
			.with_context(|| format!("failed to generate config file {}", path.display()))
	}
}

/// `$CONFIG_PATH`, otherwise `~/.alertconfig.json`
pub fn default_config_path() -> Option<PathBuf> {
	match env::var_os(CONFIG_PATH_VAR) {
		Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
		_ => dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE)),
	}
}

/// which alerts to show and how
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
	/// show details of this alert instead of the listing
	pub name: Option<String>,
	pub criteria: FilterCriteria,
	pub sort: SortKey,
	pub json: bool,
}

/// what the command line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
	/// write the default config to the path and exit
	GenerateConfig(PathBuf),
	/// fetch and print alerts
	Show(Query),
}

/// parsed command line arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
	pub config: Option<PathBuf>,
	pub verbose: u8,
	pub token: Option<String>,
	pub action: Action,
}

impl Opts {
	/// parse the arguments of the process, exits on `--help` or invalid usage
	pub fn parse() -> Result<Self> {
		Self::from_matches(&command().get_matches())
	}

	fn from_matches(opts: &ArgMatches) -> Result<Self> {
		let text = |id: &str| opts.value_of(id).filter(|value| !value.is_empty()).map(str::to_owned);

		let verbose = opts
			.value_of("verbose")
			.map(str::parse::<u8>)
			.transpose()
			.context("verbosity level has to be a number between 0 and 255")?
			.unwrap_or_default();

		let action = if opts.is_present("generate-config") {
			let path = match opts.value_of("path") {
				Some(path) => PathBuf::from(path),
				None => dirs::home_dir()
					.map(|home| home.join(DEFAULT_CONFIG_FILE))
					.context("no home directory to write the config to, pass a path")?,
			};

			Action::GenerateConfig(path)
		} else {
			let sort = match opts.value_of("sort") {
				Some(key) => key.parse()?,
				None => SortKey::None,
			};

			Action::Show(Query {
				name: text("name"),
				criteria: FilterCriteria {
					service: text("service").unwrap_or_default(),
					severity: text("severity").unwrap_or_default(),
					tag: text("tag").unwrap_or_default(),
				},
				sort,
				json: opts.is_present("json"),
			})
		};

		Ok(Self {
			config: opts.value_of("config").map(PathBuf::from),
			verbose,
			token: text("token"),
			action,
		})
	}
}

fn command() -> Command<'static> {
	Command::new(clap::crate_name!())
		.version(clap::crate_version!())
		.about(clap::crate_description!())
		.author(clap::crate_authors!())
		.after_help(
			"ENVIRONMENT:\n    CONFIG_PATH    config file to use, defaults to ~/.alertconfig.json\n\n\
			 EXAMPLES:\n    alert --service=GGUS --severity=high --sort=duration\n    \
			 alert --name=ssb-OTG0058113\n    alert --json --sort=severity",
		)
		.args(&[
			Arg::new("name")
				.help("show details of the alert with this name")
				.long("name")
				.takes_value(true),
			Arg::new("service")
				.help("only show alerts of this service, e.g. GGUS, SSB, dbs")
				.long("service")
				.takes_value(true),
			Arg::new("severity")
				.help("only show alerts of this severity, e.g. info, medium, high, urgent")
				.long("severity")
				.takes_value(true),
			Arg::new("tag")
				.help("only show alerts with this tag, e.g. cmsweb, cms, monitoring")
				.long("tag")
				.takes_value(true),
			Arg::new("sort")
				.help("sort alerts by severity, starts, ends or duration")
				.long("sort")
				.takes_value(true),
			Arg::new("json").help("output in json format").long("json"),
			Arg::new("generate-config")
				.help("write the default config to PATH (default ~/.alertconfig.json) and exit")
				.long("generate-config"),
			Arg::new("path").help("target of --generate-config").value_name("PATH").index(1),
			Arg::new("config")
				.help("path of config file, overrides $CONFIG_PATH")
				.short('c')
				.long("config")
				.takes_value(true),
			Arg::new("verbose")
				.help("verbosity level, overrides the config")
				.short('v')
				.long("verbose")
				.takes_value(true),
			Arg::new("token")
				.help("authentication token, overrides the config")
				.long("token")
				.takes_value(true),
		])
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	impl Opts {
		fn try_parse_from<I, T>(args: I) -> Result<Self>
		where
			I: IntoIterator<Item = T>,
			T: Into<std::ffi::OsString> + Clone,
		{
			Self::from_matches(&command().try_get_matches_from(args)?)
		}
	}

	fn show(args: &[&str]) -> Query {
		let opts = Opts::try_parse_from(["alert"].iter().chain(args)).unwrap();

		match opts.action {
			Action::Show(query) => query,
			other => panic!("unexpected action {other:?}"),
		}
	}

	#[test]
	fn parses_selection_flags() {
		let query = show(&["--service=GGUS", "--severity", "high", "--tag=cms", "--sort=Duration", "--json"]);

		assert_eq!(query.name, None);
		assert_eq!(query.criteria.service, "GGUS");
		assert_eq!(query.criteria.severity, "high");
		assert_eq!(query.criteria.tag, "cms");
		assert_eq!(query.sort, SortKey::Duration);
		assert!(query.json);
	}

	#[test]
	fn defaults_to_unsorted_unfiltered_table() {
		assert_eq!(show(&[]), Query::default());
		assert_eq!(show(&["--name="]).name, None);
		assert_eq!(show(&["--sort=bogus"]).sort, SortKey::None);
		assert_eq!(show(&["--name=ssb-OTG0058113"]).name.as_deref(), Some("ssb-OTG0058113"));
	}

	#[test]
	fn parses_global_flags() {
		let opts = Opts::try_parse_from(["alert", "-c", "/tmp/conf.json", "--verbose=2", "--token=abc"]).unwrap();

		assert_eq!(opts.config, Some(PathBuf::from("/tmp/conf.json")));
		assert_eq!(opts.verbose, 2);
		assert_eq!(opts.token.as_deref(), Some("abc"));
		assert!(Opts::try_parse_from(["alert", "--verbose=loud"]).is_err());
	}

	#[test]
	fn parses_generate_config() {
		let opts = Opts::try_parse_from(["alert", "--generate-config", "/tmp/alert.json"]).unwrap();

		assert_eq!(opts.action, Action::GenerateConfig(PathBuf::from("/tmp/alert.json")));
	}

	#[test]
	fn generated_config_loads_as_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("alertconfig.json");

		Settings::generate(&path).unwrap();

		assert_eq!(Settings::from_file(Some(&path)).unwrap(), Settings::default());
	}

	#[test]
	fn config_file_overrides_defaults() {
		let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
		write!(
			file,
			r#"{{
				"url": "http://localhost:9093",
				"http_timeout": 10,
				"severity": {{ "low": 0, "page": 9 }},
				"sections": {{ "labels": "ATTRIBUTES" }}
			}}"#
		)
		.unwrap();

		let settings = Settings::from_file(Some(file.path())).unwrap();

		assert_eq!(settings.url.as_str(), "http://localhost:9093/");
		assert_eq!(settings.http_timeout, Duration::from_secs(10));
		assert_eq!(settings.severity.rank("page"), 9);
		assert_eq!(settings.severity.rank("urgent"), 0);
		assert_eq!(settings.sections.labels, "ATTRIBUTES");
		assert_eq!(settings.sections.annotations, DetailSections::default().annotations);
		assert_eq!(settings.columns, Settings::default().columns);
	}

	#[test]
	fn missing_config_file_uses_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("absent.json");
		let opts = Opts {
			config: Some(path.clone()),
			verbose: 3,
			token: Some("cli-token".to_owned()),
			action: Action::Show(Query::default()),
		};

		let (settings, origin) = Settings::load(&opts).unwrap();

		assert_eq!(origin, ConfigOrigin::Missing(path));
		assert_eq!(settings.verbose, 3);
		assert_eq!(settings.token.as_deref(), Some("cli-token"));
		assert_eq!(settings.url, Settings::default().url);
	}

	#[test]
	fn malformed_config_is_an_error() {
		let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
		write!(file, "{{ not json").unwrap();

		assert!(Settings::from_file(Some(file.path())).is_err());
	}
}
