//! ordering of normalized alerts
use std::{cmp::Ordering, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::alert::NormalizedAlert;

/// Rank of each severity level. Severities missing from the table rank 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SeverityRanks(IndexMap<String, i64>);

impl SeverityRanks {
	pub fn rank(&self, severity: &str) -> i64 {
		self.0.get(severity).copied().unwrap_or_default()
	}
}

impl<S: Into<String>> FromIterator<(S, i64)> for SeverityRanks {
	fn from_iter<T: IntoIterator<Item = (S, i64)>>(iter: T) -> Self {
		Self(iter.into_iter().map(|(severity, rank)| (severity.into(), rank)).collect())
	}
}

/// key to order alerts by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
	/// keep arrival order
	#[default]
	None,
	/// ascending severity rank
	Severity,
	/// earliest start first
	Starts,
	/// earliest end first
	Ends,
	/// shortest lifetime first
	Duration,
}

impl FromStr for SortKey {
	type Err = std::convert::Infallible;

	/// Case insensitive. Unknown keys don't sort.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let key = match s.to_lowercase().as_str() {
			"severity" => Self::Severity,
			"starts" => Self::Starts,
			"ends" => Self::Ends,
			"duration" => Self::Duration,
			"" => Self::None,
			unknown => {
				tracing::warn!(key = unknown, "unknown sort key, keeping alertmanager order");
				Self::None
			}
		};

		Ok(key)
	}
}

type Comparator = fn(&NormalizedAlert, &NormalizedAlert, &SeverityRanks) -> Ordering;

impl SortKey {
	/// ordering function for this key, `None` keeps the current order
	fn comparator(self) -> Option<Comparator> {
		match self {
			Self::None => None,
			Self::Severity => Some(|a, b, ranks| ranks.rank(&a.severity).cmp(&ranks.rank(&b.severity))),
			Self::Starts => Some(|a, b, _| a.starts_at.cmp(&b.starts_at)),
			Self::Ends => Some(|a, b, _| a.ends_at.cmp(&b.ends_at)),
			Self::Duration => Some(|a, b, _| a.duration().cmp(&b.duration())),
		}
	}
}

/// Stable sort of `alerts` by `key`, alerts comparing equal keep their
/// relative order.
pub fn sort(alerts: &mut [NormalizedAlert], key: SortKey, ranks: &SeverityRanks) {
	if let Some(compare) = key.comparator() {
		alerts.sort_by(|a, b| compare(a, b, ranks));
	}
}
