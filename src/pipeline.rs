//! Aggregation of the fetched alerts.
//!
//! [Pipeline] owns everything derived from one fetch: the normalized alerts in
//! arrival (later sorted) order and the index used for detail lookups.
use futures::{Stream, StreamExt};
use hashbrown::HashMap;

use crate::{
	alert::{NormalizedAlert, RawAlert},
	filter::{self, FilterCriteria, Membership},
	sort::{self, SeverityRanks, SortKey},
};

#[derive(Debug, Default)]
pub struct Pipeline {
	/// one normalized record per received alert
	alerts: Vec<NormalizedAlert>,
	/// Raw alerts by name. Alerts sharing a name overwrite each other, the
	/// last one received wins.
	index: HashMap<String, RawAlert>,
}

impl Pipeline {
	/// drain `stream` into a new pipeline
	pub async fn collect<S>(mut stream: S) -> Self
	where
		S: Stream<Item = RawAlert> + Unpin,
	{
		let mut pipeline = Self::default();

		while let Some(alert) = stream.next().await {
			pipeline.push(alert);
		}

		tracing::debug!(alerts = pipeline.alerts.len(), names = pipeline.index.len(), "collected alerts");

		pipeline
	}

	/// normalize `raw`, append it to the alert list and index it by name
	pub fn push(&mut self, raw: RawAlert) {
		let alert = NormalizedAlert::from(&raw);

		if self.index.insert(alert.name.clone(), raw).is_some() {
			tracing::debug!(alert = alert.name.as_str(), "duplicate alert name, detail view shows the latest");
		}

		self.alerts.push(alert);
	}

	pub fn alerts(&self) -> &[NormalizedAlert] {
		&self.alerts
	}

	/// raw alert named `name`, for detail views
	pub fn lookup(&self, name: &str) -> Option<&RawAlert> {
		self.index.get(name)
	}

	/// reorder all alerts by `key`
	pub fn sort(&mut self, key: SortKey, ranks: &SeverityRanks) {
		sort::sort(&mut self.alerts, key, ranks);
	}

	/// names of the alerts matching `criteria`
	pub fn filter(&self, criteria: &FilterCriteria) -> Membership {
		let membership = filter::filter(&self.alerts, criteria);

		tracing::debug!(
			matching = membership.len(),
			unfiltered = criteria.is_wildcard(),
			"filtered alerts"
		);

		membership
	}
}

impl Extend<RawAlert> for Pipeline {
	fn extend<T: IntoIterator<Item = RawAlert>>(&mut self, iter: T) {
		for alert in iter {
			self.push(alert);
		}
	}
}
