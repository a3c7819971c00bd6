//! calendar aware differences between two instants, rendered as human
//! readable phrases like `3h 12m AGO` or `IN 2Y 1M `
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};

/// difference between two instants decomposed into calendar units
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::missing_docs_in_private_items)]
pub struct Delta {
	pub years: i32,
	pub months: i32,
	pub days: i32,
	pub hours: i32,
	pub minutes: i32,
	pub seconds: i32,
}

impl Delta {
	/// Decomposes the distance between `a` and `b`. The order of the arguments
	/// doesn't matter.
	///
	/// Date and clock fields of the earlier instant are subtracted from the
	/// later one, negative fields borrow from the next larger unit. A borrowed
	/// month is worth the number of days in the month of the earlier instant.
	pub fn between(a: &DateTime<Utc>, b: &DateTime<Utc>) -> Self {
		let (earlier, later) = if a > b { (b, a) } else { (a, b) };

		let mut delta = Self {
			years: later.year() - earlier.year(),
			months: later.month() as i32 - earlier.month() as i32,
			days: later.day() as i32 - earlier.day() as i32,
			hours: later.hour() as i32 - earlier.hour() as i32,
			minutes: later.minute() as i32 - earlier.minute() as i32,
			seconds: later.second() as i32 - earlier.second() as i32,
		};

		if delta.seconds < 0 {
			delta.seconds += 60;
			delta.minutes -= 1;
		}
		if delta.minutes < 0 {
			delta.minutes += 60;
			delta.hours -= 1;
		}
		if delta.hours < 0 {
			delta.hours += 24;
			delta.days -= 1;
		}
		if delta.days < 0 {
			delta.days += days_in_month(earlier.year(), earlier.month());
			delta.months -= 1;
		}
		if delta.months < 0 {
			delta.months += 12;
			delta.years -= 1;
		}

		delta
	}
}

impl fmt::Display for Delta {
	/// only strictly positive units are written, each followed by a space
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let units = [
			(self.years, 'Y'),
			(self.months, 'M'),
			(self.days, 'D'),
			(self.hours, 'h'),
			(self.minutes, 'm'),
			(self.seconds, 's'),
		];

		for (value, unit) in units.into_iter().filter(|(value, _)| *value > 0) {
			write!(f, "{value}{unit} ")?;
		}

		Ok(())
	}
}

/// Number of days in `month` of `year`: the 32nd day of the month overflows
/// into the next one, the overflow tells how many days are missing.
fn days_in_month(year: i32, month: u32) -> i32 {
	NaiveDate::from_ymd_opt(year, month, 1)
		.map(|first| 32 - (first + Duration::days(31)).day() as i32)
		.unwrap_or(31)
}

/// Phrase describing when `event` happens as seen from `reference`.
///
/// Events before the reference yield `<units>AGO`, all others `IN <units>`.
pub fn relative(reference: &DateTime<Utc>, event: &DateTime<Utc>) -> String {
	let delta = Delta::between(reference, event);

	if reference > event {
		format!("{delta}AGO")
	} else {
		format!("IN {delta}")
	}
}

/// Phrase describing the lifetime from `start` to `end`. Without direction
/// marker unless `start` lies after `end`.
pub fn duration(start: &DateTime<Utc>, end: &DateTime<Utc>) -> String {
	let delta = Delta::between(start, end);

	if start > end {
		format!("{delta}AGO")
	} else {
		delta.to_string()
	}
}
