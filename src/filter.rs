//! exact match filtering of normalized alerts
use hashbrown::HashSet;

use crate::alert::NormalizedAlert;

/// Optional exact match criteria. An empty criterion matches every alert, all
/// non empty criteria have to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
	pub service: String,
	pub severity: String,
	pub tag: String,
}

impl FilterCriteria {
	/// true if every non empty criterion equals the corresponding field of
	/// `alert` (case sensitive)
	pub fn matches(&self, alert: &NormalizedAlert) -> bool {
		[
			(&self.service, &alert.service),
			(&self.severity, &alert.severity),
			(&self.tag, &alert.tag),
		]
		.into_iter()
		.all(|(wanted, actual)| wanted.is_empty() || wanted == actual)
	}

	/// true if no criterion is set
	pub fn is_wildcard(&self) -> bool {
		self.service.is_empty() && self.severity.is_empty() && self.tag.is_empty()
	}
}

/// Names of the alerts passing a filter. Renderers walk the (possibly sorted)
/// alert list and check membership, so the order of the list is kept.
///
/// Membership is keyed by name: alerts sharing a name are shown together as
/// soon as one of them passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership(HashSet<String>);

impl Membership {
	pub fn contains(&self, alert: &NormalizedAlert) -> bool {
		self.0.contains(alert.name.as_str())
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}
}

/// collect the names of all `alerts` matching `criteria`
pub fn filter(alerts: &[NormalizedAlert], criteria: &FilterCriteria) -> Membership {
	let members = alerts
		.iter()
		.filter(|alert| criteria.matches(alert))
		.map(|alert| alert.name.clone())
		.collect();

	Membership(members)
}
