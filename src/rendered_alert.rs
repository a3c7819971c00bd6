//! Alerts prepared for output: the time columns are turned into relative
//! phrases once, table and json output share the result.
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{alert::NormalizedAlert, time_delta};

/// placeholder for the end and duration of alerts without a defined end
pub const UNDEFINED: &str = "Undefined";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
/// one row of the alert listing
pub struct RenderedAlert {
	pub name: String,
	pub service: String,
	pub tag: String,
	pub severity: String,
	/// start relative to the time of rendering
	pub starts: String,
	/// end relative to the time of rendering
	pub ends: String,
	/// lifetime of the alert
	pub duration: String,
}

impl RenderedAlert {
	/// render `alert` as seen at `now`
	pub fn new(alert: &NormalizedAlert, now: &DateTime<Utc>) -> Self {
		let (ends, duration) = if alert.is_open_ended() {
			(UNDEFINED.to_owned(), UNDEFINED.to_owned())
		} else {
			(
				time_delta::relative(now, &alert.ends_at),
				time_delta::duration(&alert.starts_at, &alert.ends_at),
			)
		};

		Self {
			name: alert.name.clone(),
			service: alert.service.clone(),
			tag: alert.tag.clone(),
			severity: alert.severity.clone(),
			starts: time_delta::relative(now, &alert.starts_at),
			ends,
			duration,
		}
	}

	/// table cells in column order
	pub fn cells(&self) -> [&str; 7] {
		[
			&self.name,
			&self.service,
			&self.tag,
			&self.severity,
			&self.starts,
			&self.ends,
			&self.duration,
		]
	}
}
