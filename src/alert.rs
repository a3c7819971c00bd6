//! data structures for deserializing fetched alerts and projecting them into
//! fixed-shape records
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// label key carrying the alert name
pub const ALERTNAME: &str = "alertname";

/// unix timestamp alertmanager clients use as `endsAt` for alerts without a
/// defined end (Saturday, May 24, 3000 3:43:26 PM UTC)
pub const OPEN_ENDED_TIMESTAMP: i64 = 32_516_091_806;

/// returns true if `at` is exactly the open ended sentinel
pub fn is_open_ended(at: &DateTime<Utc>) -> bool {
	at.timestamp() == OPEN_ENDED_TIMESTAMP && at.timestamp_subsec_nanos() == 0
}

/// textual form of a label or annotation value, strings are printed without
/// quotes
pub fn value_text(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		other => other.to_string(),
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// one alert as returned by the alertmanager alerts api
pub struct RawAlert {
	/// classifying attributes, e.g. `alertname`, `severity`
	#[serde(default)]
	pub labels: IndexMap<String, Value>,
	/// free form metadata, only shown in the detail view
	#[serde(default)]
	pub annotations: IndexMap<String, Value>,
	pub starts_at: DateTime<Utc>,
	pub ends_at: DateTime<Utc>,
}

impl RawAlert {
	/// string value of label `key`. Labels holding something other than a
	/// string are treated as absent.
	pub fn label_str(&self, key: &str) -> Option<&str> {
		match self.labels.get(key) {
			Some(Value::String(value)) => Some(value.as_str()),
			Some(other) => {
				tracing::debug!(key, value = %other, "ignoring non string label");
				None
			}
			None => None,
		}
	}

	/// name of the alert, empty if the `alertname` label is missing
	pub fn name(&self) -> &str {
		self.label_str(ALERTNAME).unwrap_or_default()
	}
}

/// labels projected into [NormalizedAlert] fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelField {
	Name,
	Severity,
	Service,
	Tag,
}

impl LabelField {
	const ALL: [LabelField; 4] = [Self::Name, Self::Severity, Self::Service, Self::Tag];

	fn key(self) -> &'static str {
		match self {
			Self::Name => ALERTNAME,
			Self::Severity => "severity",
			Self::Service => "service",
			Self::Tag => "tag",
		}
	}

	fn slot(self, alert: &mut NormalizedAlert) -> &mut String {
		match self {
			Self::Name => &mut alert.name,
			Self::Severity => &mut alert.severity,
			Self::Service => &mut alert.service,
			Self::Tag => &mut alert.tag,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// fixed-shape record derived from exactly one [RawAlert]
pub struct NormalizedAlert {
	pub name: String,
	pub service: String,
	pub tag: String,
	pub severity: String,
	pub starts_at: DateTime<Utc>,
	pub ends_at: DateTime<Utc>,
}

impl NormalizedAlert {
	/// lifetime of the alert. Open ended alerts yield the distance to the
	/// sentinel.
	pub fn duration(&self) -> Duration {
		self.ends_at.signed_duration_since(self.starts_at)
	}

	/// true if the alert has no defined end
	pub fn is_open_ended(&self) -> bool {
		is_open_ended(&self.ends_at)
	}
}

impl From<&RawAlert> for NormalizedAlert {
	fn from(raw: &RawAlert) -> Self {
		let mut alert = Self {
			name: String::new(),
			service: String::new(),
			tag: String::new(),
			severity: String::new(),
			starts_at: raw.starts_at,
			ends_at: raw.ends_at,
		};

		for field in LabelField::ALL {
			if let Some(value) = raw.label_str(field.key()) {
				field.slot(&mut alert).push_str(value);
			}
		}

		alert
	}
}
