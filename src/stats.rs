use std::collections::HashMap;

use chrono::NaiveDate;

use super::progress::ProgressSink;
use super::timeseries::{Counters, TimeSeriesKey};


/// Scale factor for per-capita rates: cases per `avg_days` per 100K
/// residents.
pub const POPULATION_SCALE: f64 = 100000.0;


/// Window sizes for the derived statistics. The derived columns are fixed
/// struct fields; the windows only control how far back they look.
#[derive(Debug, Clone, Copy)]
pub struct StatWindows {
	/// trailing window of the new-case average (and the test-rate sums)
	pub avg_days: usize,
	/// trailing window of the trend slope and direction count
	pub trend_days: usize,
}

impl Default for StatWindows {
	fn default() -> Self {
		Self{
			avg_days: 7,
			trend_days: 14,
		}
	}
}


/// First difference of a cumulative series. The first observation has no
/// predecessor and is defined as zero; a downward correction in the source
/// yields a negative value and is passed through untouched.
pub fn new_cases(cum: &[u64]) -> Vec<i64> {
	let mut out = Vec::with_capacity(cum.len());
	let mut prev: Option<u64> = None;
	for &v in cum {
		match prev {
			None => out.push(0),
			Some(p) => out.push(v as i64 - p as i64),
		}
		prev = Some(v);
	}
	out
}

/// Trailing mean over `window` observations, shrinking at the start: day `i`
/// averages over `min(window, i + 1)` values.
pub fn trailing_mean(v: &[i64], window: usize) -> Vec<f64> {
	assert!(window >= 1);
	let mut out = Vec::with_capacity(v.len());
	let mut sum: i64 = 0;
	for i in 0..v.len() {
		sum += v[i];
		if i >= window {
			sum -= v[i - window];
		}
		let n = (i + 1).min(window);
		out.push(sum as f64 / n as f64);
	}
	out
}

fn ols_slope(w: &[i64]) -> f64 {
	// least-squares slope against x = 0..n-1; a single point has no slope
	let n = w.len();
	if n < 2 {
		return 0.0
	}
	let nf = n as f64;
	let mut sx = 0.0;
	let mut sy = 0.0;
	let mut sxy = 0.0;
	let mut sxx = 0.0;
	for (x, &y) in w.iter().enumerate() {
		let xf = x as f64;
		let yf = y as f64;
		sx += xf;
		sy += yf;
		sxy += xf * yf;
		sxx += xf * xf;
	}
	(nf * sxy - sx * sy) / (nf * sxx - sx * sx)
}

/// Trend slope per day: the least-squares slope of the trailing `window`
/// new-case values, shrinking at the start. This refits per day and is the
/// expensive statistic at county granularity.
pub fn trailing_slope(v: &[i64], window: usize) -> Vec<f64> {
	assert!(window >= 1);
	let mut out = Vec::with_capacity(v.len());
	for i in 0..v.len() {
		let lo = (i + 1).saturating_sub(window);
		out.push(ols_slope(&v[lo..=i]));
	}
	out
}

/// Count of non-negative slopes within a FULL trailing window. Unlike the
/// averages this does not shrink: days before the window fills are NaN.
pub fn trend_counts(slopes: &[f64], window: usize) -> Vec<f64> {
	assert!(window >= 1);
	let mut out = Vec::with_capacity(slopes.len());
	for i in 0..slopes.len() {
		if i + 1 < window {
			out.push(f64::NAN);
			continue
		}
		let count = slopes[(i + 1 - window)..=i].iter().filter(|s| **s >= 0.0).count();
		out.push(count as f64);
	}
	out
}

/// New cases per `window` days per 100K residents. A NaN population
/// propagates NaN, never zero.
pub fn per_capita(day_avg: &[f64], population: f64, window: usize) -> Vec<f64> {
	day_avg.iter().map(|a| a * POPULATION_SCALE / population * window as f64).collect()
}

/// Index of the first nonzero cumulative value, i.e. how many leading rows a
/// per-locality display should skip. Row-scoped, in contrast to the global
/// prefix trim on the wide table.
pub fn clip_leading_zeroes(cum: &[u64]) -> usize {
	cum.iter().position(|v| *v > 0).unwrap_or(cum.len())
}


/// All derived columns for one grouping key.
#[derive(Debug, Clone)]
pub struct StatSeries {
	pub confirmed: Vec<u64>,
	pub population: f64,
	pub new_cases: Vec<i64>,
	pub day_avg: Vec<f64>,
	pub percap: Vec<f64>,
	/// absent when trend derivation was skipped for this granularity
	pub slope: Option<Vec<f64>>,
	pub trend: Option<Vec<f64>>,
}


/// Derived table at one aggregation level: per-key statistic series over a
/// shared date axis.
#[derive(Debug, Clone)]
pub struct StatsTable<K: TimeSeriesKey> {
	start: NaiveDate,
	len: usize,
	windows: StatWindows,
	series: HashMap<K, StatSeries>,
}

impl<K: TimeSeriesKey> StatsTable<K> {
	#[inline(always)]
	pub fn start(&self) -> NaiveDate {
		self.start
	}

	#[inline(always)]
	pub fn len(&self) -> usize {
		self.len
	}

	pub fn windows(&self) -> StatWindows {
		self.windows
	}

	pub fn index_date(&self, i: i64) -> Option<NaiveDate> {
		if i < 0 || i as usize >= self.len {
			return None
		}
		Some(self.start + chrono::Duration::days(i))
	}

	pub fn get(&self, k: &K) -> Option<&StatSeries> {
		self.series.get(k)
	}

	pub fn keys(&self) -> std::collections::hash_map::Keys<'_, K, StatSeries> {
		self.series.keys()
	}

	pub fn num_keys(&self) -> usize {
		self.series.len()
	}

	/// Insert or replace a key's series wholesale. Only meant for
	/// post-derivation fixups such as the merged-county backfill; series
	/// length must match the table axis.
	pub fn insert(&mut self, k: K, series: StatSeries) {
		assert_eq!(series.confirmed.len(), self.len);
		self.series.insert(k, series);
	}
}


/// Run the full derivation for every key of a raw cumulative table.
///
/// Each key's statistics depend only on that key's own history up to the row
/// date, so the result is deterministic for a given input. `with_trends`
/// controls the expensive slope refit; callers skip it at county granularity
/// and always enable it for coarser levels.
pub fn derive<K: TimeSeriesKey, P: Fn(&K) -> f64>(
	counters: &Counters<K>,
	population: P,
	windows: StatWindows,
	with_trends: bool,
	mut progress: Option<&mut dyn ProgressSink>,
) -> StatsTable<K> {
	assert!(windows.avg_days >= 1 && windows.trend_days >= 1);
	let mut series = HashMap::with_capacity(counters.num_keys());
	for (done, k) in counters.keys().enumerate() {
		let cum = counters.get(k).expect("key vanished during derivation");
		let population = population(k);
		let new = new_cases(cum);
		let day_avg = trailing_mean(&new, windows.avg_days);
		let percap = per_capita(&day_avg, population, windows.avg_days);
		let (slope, trend) = if with_trends {
			let s = trailing_slope(&new, windows.trend_days);
			let t = trend_counts(&s, windows.trend_days);
			(Some(s), Some(t))
		} else {
			(None, None)
		};
		series.insert(k.clone(), StatSeries{
			confirmed: cum.to_vec(),
			population,
			new_cases: new,
			day_avg,
			percap,
			slope,
			trend,
		});
		if let Some(p) = progress.as_deref_mut() {
			if done % 128 == 127 {
				p.update(done + 1);
			}
		}
	}
	StatsTable{
		start: counters.start(),
		len: counters.len(),
		windows,
		series,
	}
}
