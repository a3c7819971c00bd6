//! Renders alerts for the terminal.
//!
//! Listings are printed as an aligned table or as json, single alerts as a
//! detail view produced by a tera template.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{presets::NOTHING, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use tera::Tera;

use crate::{
	alert::{self, NormalizedAlert, RawAlert, ALERTNAME},
	filter::Membership,
	pipeline::Pipeline,
	rendered_alert::RenderedAlert,
	settings::{Query, Settings},
};

/// name the detail template is registered under
const DETAIL_TEMPLATE: &str = "detail.plain";

/// built in detail view
const DEFAULT_DETAIL_TEMPLATE: &str = "{{ sections.name }}: {{ name }}\n\
	{{ sections.labels }}\n\
	{% for label in labels %}\t{{ label.key }}: {{ label.value }}\n{% endfor %}\
	{{ sections.annotations }}\n\
	{% for annotation in annotations %}\t{{ annotation.key }}: {{ annotation.value }}\n{% endfor %}";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
/// headings of the detail view
pub struct DetailSections {
	/// prefix of the alert name line
	pub name: String,
	/// heading above the labels
	pub labels: String,
	/// heading above the annotations
	pub annotations: String,
}

impl Default for DetailSections {
	fn default() -> Self {
		Self {
			name: String::from("NAMES"),
			labels: String::from("LABELS"),
			annotations: String::from("ANNOTATIONS"),
		}
	}
}

/// key/value line of the detail view
#[derive(Debug, Serialize)]
struct Entry {
	key: String,
	value: String,
}

/// everything the detail template can refer to
#[derive(Debug, Serialize)]
struct DetailContext<'a> {
	sections: &'a DetailSections,
	name: &'a str,
	labels: Vec<Entry>,
	annotations: Vec<Entry>,
}

/// Alert renderer
pub struct AlertRenderer {
	tera: Tera,
	columns: Vec<String>,
	sections: DetailSections,
	attributes: Vec<String>,
}

impl AlertRenderer {
	/// Return new renderer, fails if a configured detail template can't be
	/// loaded
	pub fn new(settings: &Settings) -> Result<Self> {
		let mut tera = Tera::default();

		match &settings.detail_template {
			Some(path) => tera
				.add_template_file(path, Some(DETAIL_TEMPLATE))
				.with_context(|| format!("could not load detail template {}", path.display()))?,
			None => tera
				.add_raw_template(DETAIL_TEMPLATE, DEFAULT_DETAIL_TEMPLATE)
				.context("could not load default detail template")?,
		}

		Ok(Self {
			tera,
			columns: settings.columns.clone(),
			sections: settings.sections.clone(),
			attributes: settings.attributes.clone(),
		})
	}

	/// Renders the output `query` asks for.
	///
	/// # Arguments
	///
	/// * `pipeline` - the sorted alerts of this run
	///
	/// * `query` - selects detail or listing, json or plain text and the filter
	///
	/// * `now` - reference point of relative times
	pub fn render(&self, pipeline: &Pipeline, query: &Query, now: &DateTime<Utc>) -> Result<String> {
		match (&query.name, query.json) {
			(Some(name), false) => self.detail(name, pipeline.lookup(name)),
			(Some(name), true) => self.detail_json(name, pipeline.lookup(name)),
			(None, false) => Ok(self.table(pipeline.alerts(), &pipeline.filter(&query.criteria), now)),
			(None, true) => self.json(pipeline.alerts(), &pipeline.filter(&query.criteria), now),
		}
	}

	/// aligned table of all `alerts` in `membership`, in list order
	pub fn table(&self, alerts: &[NormalizedAlert], membership: &Membership, now: &DateTime<Utc>) -> String {
		let mut table = Table::new();
		table
			.load_preset(NOTHING)
			.set_content_arrangement(ContentArrangement::Disabled)
			.set_header(&self.columns);

		for alert in alerts.iter().filter(|alert| membership.contains(alert)) {
			table.add_row(RenderedAlert::new(alert, now).cells());
		}

		format!("{table}\n")
	}

	/// json array of all `alerts` in `membership`, in list order
	pub fn json(&self, alerts: &[NormalizedAlert], membership: &Membership, now: &DateTime<Utc>) -> Result<String> {
		let rendered: Vec<RenderedAlert> = alerts
			.iter()
			.filter(|alert| membership.contains(alert))
			.map(|alert| RenderedAlert::new(alert, now))
			.collect();

		let json = serde_json::to_string(&rendered).context("unable to convert filtered alerts to json")?;

		Ok(json + "\n")
	}

	/// Detail view of `alert`: its name, the configured attributes among its
	/// labels (sorted by key) and all annotations.
	pub fn detail(&self, name: &str, alert: Option<&RawAlert>) -> Result<String> {
		let alert = match alert {
			Some(alert) => alert,
			None => return Ok(not_found(name)),
		};

		let mut labels: Vec<Entry> = alert
			.labels
			.iter()
			.filter(|(key, _)| key.as_str() != ALERTNAME && self.attributes.contains(key))
			.map(|(key, value)| Entry { key: key.clone(), value: alert::value_text(value) })
			.collect();
		labels.sort_by(|a, b| a.key.cmp(&b.key));

		let annotations = alert
			.annotations
			.iter()
			.map(|(key, value)| Entry { key: key.clone(), value: alert::value_text(value) })
			.collect();

		let context = DetailContext { sections: &self.sections, name, labels, annotations };

		let context = tera::Context::from_serialize(&context).context("could not build detail context")?;

		self.tera
			.render(DETAIL_TEMPLATE, &context)
			.with_context(|| format!("failed to render details of {name}"))
	}

	/// `alert` as received from alertmanager, in json
	pub fn detail_json(&self, name: &str, alert: Option<&RawAlert>) -> Result<String> {
		match alert {
			Some(alert) => {
				let json = serde_json::to_string(alert)
					.with_context(|| format!("unable to convert details of {name} to json"))?;

				Ok(json + "\n")
			}
			None => Ok(not_found(name)),
		}
	}
}

/// message shown if no alert is named `name`
fn not_found(name: &str) -> String {
	format!("{name} alert not found\n")
}
