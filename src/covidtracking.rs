use std::collections::HashMap;
use std::io;

use chrono::NaiveDate;

use log::warn;

use serde::{de, Deserialize, Deserializer};

use smartstring::alias::{String as SmartString};

use super::error::Error;
use super::geo::{state_name_of_abbr, StateName, NATION};
use super::stats::trailing_mean;
use super::timeseries::Counters;


fn compact_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
	where D: Deserializer<'de>
{
	let s = String::deserialize(deserializer)?;
	if s.contains('-') {
		// plain ISO date
		s.parse::<NaiveDate>().map_err(de::Error::custom)
	} else {
		// the feed's native YYYYMMDD form
		NaiveDate::parse_from_str(&s, "%Y%m%d").map_err(de::Error::custom)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingRecord {
	#[serde(deserialize_with = "compact_date")]
	pub date: NaiveDate,
	/// postal abbreviation, joined against full state names on load
	pub state: SmartString,
	#[serde(default)]
	pub positive: Option<u64>,
	#[serde(default)]
	pub negative: Option<u64>,
}


/// Cumulative test counts keyed by full state name, on the tracking feed's
/// own date axis. Kept separate from the case table; the two sources update
/// on different cadences and are only joined at output time.
#[derive(Debug, Clone)]
pub struct TestCounts {
	pub positive: Counters<StateName>,
	pub negative: Counters<StateName>,
}

impl TestCounts {
	pub fn start(&self) -> NaiveDate {
		self.positive.start()
	}

	pub fn len(&self) -> usize {
		self.positive.len()
	}

	/// National test counts: both cumulative series summed over all states.
	/// The national positive rate is derived from these sums afterwards,
	/// never averaged from state-level rates.
	pub fn nation(&self) -> TestCounts {
		TestCounts{
			positive: self.positive.rekeyed(|_| Some(StateName::from(NATION))),
			negative: self.negative.rekeyed(|_| Some(StateName::from(NATION))),
		}
	}
}


/// Load the long-format test count table. Rows with unparseable dates or
/// unknown state abbreviations are dropped with a warning; missing counts
/// read as zero. The date axis is taken from the data itself.
pub fn load_tracking_csv<R: io::Read>(r: &mut R) -> super::error::Result<TestCounts> {
	let mut r = csv::Reader::from_reader(r);
	let mut records: Vec<(StateName, NaiveDate, u64, u64)> = Vec::new();
	let mut min_date: Option<NaiveDate> = None;
	let mut max_date: Option<NaiveDate> = None;
	for row in r.deserialize() {
		let rec: TrackingRecord = match row {
			Ok(rec) => rec,
			Err(e) => {
				warn!("skipping malformed test count row: {}", e);
				continue
			},
		};
		let name = match state_name_of_abbr(&rec.state[..]) {
			Some(name) => name,
			None => {
				warn!("skipping test count row for unknown state {:?}", rec.state);
				continue
			},
		};
		min_date = Some(min_date.map_or(rec.date, |d: NaiveDate| d.min(rec.date)));
		max_date = Some(max_date.map_or(rec.date, |d: NaiveDate| d.max(rec.date)));
		records.push((
			name.into(),
			rec.date,
			rec.positive.unwrap_or(0),
			rec.negative.unwrap_or(0),
		));
	}
	let (start, last) = match (min_date, max_date) {
		(Some(a), Some(b)) => (a, b),
		_ => return Err(Error::NoData("test count table")),
	};
	let len = (last - start).num_days() as usize + 1;
	let mut positive = Counters::new(start, len);
	let mut negative = Counters::new(start, len);
	for (name, date, p, n) in records {
		let i = positive.date_index(date).expect("date outside computed axis");
		positive.get_or_create(name.clone())[i] = p;
		negative.get_or_create(name)[i] = n;
	}
	Ok(TestCounts{positive, negative})
}


fn deltas_from_zero(cum: &[u64]) -> Vec<i64> {
	// unlike the case-count first difference, the value before the first
	// observation counts as zero, so day one carries the full cumulative
	let mut out = Vec::with_capacity(cum.len());
	let mut prev: u64 = 0;
	for &v in cum {
		out.push(v as i64 - prev as i64);
		prev = v;
	}
	out
}

fn trailing_sum(v: &[i64], window: usize) -> Vec<i64> {
	assert!(window >= 1);
	let mut out = Vec::with_capacity(v.len());
	let mut sum: i64 = 0;
	for i in 0..v.len() {
		sum += v[i];
		if i >= window {
			sum -= v[i - window];
		}
		out.push(sum);
	}
	out
}


/// Derived test columns for one state.
#[derive(Debug, Clone)]
pub struct TestSeries {
	pub positive: Vec<u64>,
	pub negative: Vec<u64>,
	pub daily_positive: Vec<i64>,
	pub daily_negative: Vec<i64>,
	/// trailing average of tests administered per day, positive and negative
	/// combined
	pub daily_tests_avg: Vec<f64>,
	/// trailing-window positive share; NaN where no tests were reported
	pub positive_rate: Vec<f64>,
	/// positive share of all tests ever administered; NaN before the first
	/// report
	pub cumulative_positive_rate: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct TestStatsTable {
	start: NaiveDate,
	len: usize,
	window: usize,
	series: HashMap<StateName, TestSeries>,
}

impl TestStatsTable {
	#[inline(always)]
	pub fn start(&self) -> NaiveDate {
		self.start
	}

	#[inline(always)]
	pub fn len(&self) -> usize {
		self.len
	}

	pub fn window(&self) -> usize {
		self.window
	}

	pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
		let days = (date - self.start).num_days();
		if days < 0 || days as usize >= self.len {
			return None
		}
		Some(days as usize)
	}

	pub fn get(&self, state: &str) -> Option<&TestSeries> {
		self.series.get(state)
	}

	pub fn keys(&self) -> std::collections::hash_map::Keys<'_, StateName, TestSeries> {
		self.series.keys()
	}
}


/// Blend statistics over the test counts: daily deltas, trailing sums, and
/// the rolling positive rate `p / (p + n)`. A window with neither positive
/// nor negative tests yields NaN, which is preserved into the output.
pub fn derive_test_stats(counts: &TestCounts, window: usize) -> TestStatsTable {
	assert!(window >= 1);
	let len = counts.len();
	let mut series = HashMap::new();
	for k in counts.positive.keys() {
		let pos = counts.positive.get(k).expect("key vanished during derivation");
		let neg_vec;
		let neg = match counts.negative.get(k) {
			Some(v) => v,
			None => {
				neg_vec = vec![0; len];
				&neg_vec[..]
			},
		};
		let daily_positive = deltas_from_zero(pos);
		let daily_negative = deltas_from_zero(neg);
		let daily_total: Vec<i64> = daily_positive.iter()
			.zip(daily_negative.iter())
			.map(|(&p, &n)| p + n)
			.collect();
		let daily_tests_avg = trailing_mean(&daily_total, window);
		let sum_p = trailing_sum(&daily_positive, window);
		let sum_n = trailing_sum(&daily_negative, window);
		let positive_rate = sum_p.iter().zip(sum_n.iter()).map(|(&p, &n)| {
			p as f64 / (p + n) as f64
		}).collect();
		let cumulative_positive_rate = pos.iter().zip(neg.iter()).map(|(&p, &n)| {
			p as f64 / (p + n) as f64
		}).collect();
		series.insert(k.clone(), TestSeries{
			positive: pos.to_vec(),
			negative: neg.to_vec(),
			daily_positive,
			daily_negative,
			daily_tests_avg,
			positive_rate,
			cumulative_positive_rate,
		});
	}
	TestStatsTable{
		start: counts.start(),
		len,
		window,
		series,
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	static SAMPLE: &str = "\
date,state,positive,negative,pending
20200301,OR,5,40,
20200302,OR,9,76,
2020-03-03,OR,14,120,
20200302,WA,100,900,
20200303,WA,150,1350,
20200303,XX,1,1,
";

	fn load() -> TestCounts {
		load_tracking_csv(&mut SAMPLE.as_bytes()).unwrap()
	}

	#[test]
	fn axis_and_keys_come_from_the_data() {
		let counts = load();
		assert_eq!(counts.start(), NaiveDate::from_ymd(2020, 3, 1));
		assert_eq!(counts.len(), 3);
		// unknown abbreviation dropped, known ones joined to full names
		assert_eq!(counts.positive.num_keys(), 2);
		assert_eq!(
			counts.positive.get(&StateName::from("Oregon")).unwrap(),
			&[5, 9, 14]
		);
		// a state appearing late reads zero before its first report
		assert_eq!(
			counts.positive.get(&StateName::from("Washington")).unwrap(),
			&[0, 100, 150]
		);
	}

	#[test]
	fn daily_deltas_fill_missing_as_zero() {
		let stats = derive_test_stats(&load(), 7);
		let or = stats.get("Oregon").unwrap();
		// the first observation carries its full cumulative value
		assert_eq!(or.daily_positive, vec![5, 4, 5]);
		assert_eq!(or.daily_negative, vec![40, 36, 44]);
	}

	#[test]
	fn positive_rate_blends_sums_not_rates() {
		let stats = derive_test_stats(&load(), 7);
		let or = stats.get("Oregon").unwrap();
		// day 3: 14 positives out of 14+120 tests in the window
		assert!((or.positive_rate[2] - 14.0 / 134.0).abs() < 1e-12);
	}

	#[test]
	fn zero_over_zero_is_nan_not_zero() {
		let csv = "date,state,positive,negative\n20200301,OR,,\n";
		let counts = load_tracking_csv(&mut csv.as_bytes()).unwrap();
		let stats = derive_test_stats(&counts, 7);
		let or = stats.get("Oregon").unwrap();
		assert!(or.positive_rate[0].is_nan());
		assert!(or.cumulative_positive_rate[0].is_nan());
	}

	#[test]
	fn daily_tests_average_combines_both_outcomes() {
		let stats = derive_test_stats(&load(), 7);
		let or = stats.get("Oregon").unwrap();
		// daily totals 45, 40, 49 with a shrinking window
		assert!((or.daily_tests_avg[0] - 45.0).abs() < 1e-12);
		assert!((or.daily_tests_avg[2] - 134.0 / 3.0).abs() < 1e-12);
	}

	#[test]
	fn cumulative_rate_tracks_totals_not_the_window() {
		let stats = derive_test_stats(&load(), 1);
		let or = stats.get("Oregon").unwrap();
		// with a one day window the rolling rate sees only day 3
		assert!((or.positive_rate[2] - 5.0 / 49.0).abs() < 1e-12);
		assert!((or.cumulative_positive_rate[2] - 14.0 / 134.0).abs() < 1e-12);
	}

	#[test]
	fn national_rate_derives_from_summed_counts() {
		let counts = load();
		let nation = counts.nation();
		assert_eq!(
			nation.positive.get(&StateName::from(NATION)).unwrap(),
			&[5, 109, 164]
		);
		let stats = derive_test_stats(&nation, 7);
		let us = stats.get(NATION).unwrap();
		// 164 positives of 164 + 1470 tests; NOT the average of the two
		// state-level rates
		assert!((us.positive_rate[2] - 164.0 / (164.0 + 1470.0)).abs() < 1e-12);
	}

	#[test]
	fn empty_input_is_fatal() {
		let csv = "date,state,positive,negative\n";
		match load_tracking_csv(&mut csv.as_bytes()) {
			Err(Error::NoData(_)) => (),
			other => panic!("unexpected result: {:?}", other.map(|c| c.len())),
		}
	}
}
