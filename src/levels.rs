use std::collections::HashMap;

use super::error::{Error, Result};
use super::geo::{CountyKey, RegionKey, StateName, NATION};
use super::progress::ProgressSink;
use super::refdata::{PopulationMap, RegionMap};
use super::stats::{derive, StatSeries, StatsTable, StatWindows};
use super::timeseries::{Counters, TimeSeriesKey};


// Reporting units that merged several counties. For map output their series
// is copied onto each constituent, so every canonical county has a value.
static MERGED_COUNTIES: [(&str, &str, &[&str]); 7] = [
	("Utah", "Bear River", &["Box Elder", "Cache", "Rich"]),
	("Utah", "Central Utah", &["Juab", "Millard", "Piute", "Sanpete", "Wayne"]),
	("Utah", "Southeast Utah", &["Carbon", "Emery", "Grand", "Sevier"]),
	("Utah", "Southwest Utah", &["Beaver", "Garfield", "Iron", "Kane", "Washington"]),
	("Utah", "TriCounty", &["Daggett", "Duchesne", "Uintah"]),
	("Utah", "Weber-Morgan", &["Weber", "Morgan"]),
	("Massachusetts", "Dukes and Nantucket", &["Dukes", "Nantucket"]),
];


/// Sum county populations under a coarser key, skipping units with unknown
/// population so they do not poison the total. A target with no known
/// population at all stays absent and reads back as NaN.
fn summed_populations<U: TimeSeriesKey, F: Fn(&CountyKey) -> Option<U>>(
	counters: &Counters<CountyKey>,
	pop: &PopulationMap,
	f: F,
) -> HashMap<U, f64> {
	let mut result: HashMap<U, f64> = HashMap::new();
	for k in counters.keys() {
		let target = match f(k) {
			Some(t) => t,
			None => continue,
		};
		let p = pop.population_of(k);
		if p.is_nan() {
			continue
		}
		*result.entry(target).or_insert(0.0) += p;
	}
	result
}


/// County-level derivation. Trend slopes are optional here: refitting a
/// regression per county and day is by far the most expensive pass.
pub fn county_stats(
	counters: &Counters<CountyKey>,
	pop: &PopulationMap,
	windows: StatWindows,
	with_trends: bool,
	progress: Option<&mut dyn ProgressSink>,
) -> StatsTable<CountyKey> {
	derive(counters, |k| pop.population_of(k), windows, with_trends, progress)
}

/// Region-level derivation: county counts are re-summed per configured
/// region, then the full engine runs on the sums. Counties without a region
/// do not contribute.
pub fn region_stats(
	counters: &Counters<CountyKey>,
	pop: &PopulationMap,
	regions: &RegionMap,
	windows: StatWindows,
) -> StatsTable<RegionKey> {
	let rekey = |k: &CountyKey| {
		regions.region_of(k).map(|r| RegionKey{
			state: k.state.clone(),
			region: r.clone(),
		})
	};
	let regional = counters.rekeyed(&rekey);
	let pops = summed_populations(counters, pop, &rekey);
	derive(&regional, |k| pops.get(k).copied().unwrap_or(f64::NAN), windows, true, None)
}

/// State-level derivation from re-summed county counts.
pub fn state_stats(
	counters: &Counters<CountyKey>,
	pop: &PopulationMap,
	windows: StatWindows,
) -> StatsTable<StateName> {
	let rekey = |k: &CountyKey| Some(k.state.clone());
	let by_state = counters.rekeyed(&rekey);
	let pops = summed_populations(counters, pop, &rekey);
	derive(&by_state, |k| pops.get(k).copied().unwrap_or(f64::NAN), windows, true, None)
}

/// National derivation: everything summed into one key, statistics recomputed
/// from the national sums.
pub fn nation_stats(
	counters: &Counters<CountyKey>,
	pop: &PopulationMap,
	windows: StatWindows,
) -> StatsTable<StateName> {
	let rekey = |_: &CountyKey| Some(StateName::from(NATION));
	let national = counters.rekeyed(&rekey);
	let pops = summed_populations(counters, pop, &rekey);
	derive(&national, |k| pops.get(k).copied().unwrap_or(f64::NAN), windows, true, None)
}


/// Copy the derived series of each merged reporting unit onto its
/// constituent counties. Strictly a post-derivation fixup for map output:
/// running it earlier would double-count the merged cases in every
/// aggregation above county level.
pub fn merged_county_backfill(table: &mut StatsTable<CountyKey>) -> usize {
	let mut copied = 0;
	for (state, merged, parts) in MERGED_COUNTIES.iter() {
		let src = match table.get(&CountyKey::new(*state, *merged)) {
			Some(s) => s.clone(),
			None => continue,
		};
		for part in parts.iter() {
			table.insert(CountyKey::new(*state, *part), src.clone());
			copied += 1;
		}
	}
	copied
}


/// Fetch the one series a state-keyed table must contain for `state`.
/// Finding no row is a caller contract violation, not missing reference
/// data.
pub fn require_state<'t>(table: &'t StatsTable<StateName>, state: &str) -> Result<&'t StatSeries> {
	match table.get(&StateName::from(state)) {
		Some(s) => Ok(s),
		None => Err(Error::AmbiguousAggregation{
			key: state.to_string(),
			found: 0,
		}),
	}
}


#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;

	fn day0() -> NaiveDate {
		NaiveDate::from_ymd(2020, 3, 1)
	}

	fn pop_map() -> PopulationMap {
		let csv = "\
Province_State,Admin2,Population
Oregon,Washington,100000
Oregon,Yamhill,100000
";
		super::super::refdata::load_population(&mut csv.as_bytes()).unwrap()
	}

	fn county_counters() -> Counters<CountyKey> {
		let mut c = Counters::new(day0(), 4);
		// daily new cases 10, 20, 30 after a zero first day
		c.get_or_create(CountyKey::new("Oregon", "Washington"))
			.copy_from_slice(&[0, 10, 30, 60]);
		// daily new cases 5, 5, 5
		c.get_or_create(CountyKey::new("Oregon", "Yamhill"))
			.copy_from_slice(&[0, 5, 10, 15]);
		c
	}

	#[test]
	fn state_statistics_recompute_from_summed_counts() {
		let counters = county_counters();
		let pop = pop_map();
		let windows = StatWindows{avg_days: 3, trend_days: 14};
		let counties = county_stats(&counters, &pop, windows, false, None);
		let states = state_stats(&counters, &pop, windows);

		let a = counties.get(&CountyKey::new("Oregon", "Washington")).unwrap();
		let b = counties.get(&CountyKey::new("Oregon", "Yamhill")).unwrap();
		let s = require_state(&states, "Oregon").unwrap();

		// raw counts sum
		assert_eq!(s.confirmed, vec![0, 15, 40, 75]);
		assert_eq!(s.new_cases, vec![0, 15, 25, 35]);
		// the 3-day average is linear, so it happens to equal the county sum
		assert_eq!(s.day_avg[3], 25.0);
		assert_eq!(a.day_avg[3] + b.day_avg[3], 25.0);
		// but per-capita must use the summed population of 200000, not the
		// sum of the county rates
		assert_eq!(s.population, 200000.0);
		let expected = 25.0 / 200000.0 * 100000.0 * 3.0;
		assert!((s.percap[3] - expected).abs() < 1e-9);
		assert!((a.percap[3] + b.percap[3] - 2.0 * expected).abs() < 1e-9);
	}

	#[test]
	fn region_aggregation_skips_unmapped_counties() {
		let counters = county_counters();
		let pop = pop_map();
		let regions_csv = "\
Province_State,Admin2,Region
Oregon,Washington,Portland Metro
";
		let regions = super::super::refdata::load_regions(&mut regions_csv.as_bytes()).unwrap();
		let table = region_stats(&counters, &pop, &regions, StatWindows::default());
		assert_eq!(table.num_keys(), 1);
		let metro = table.get(&RegionKey::new("Oregon", "Portland Metro")).unwrap();
		assert_eq!(metro.confirmed, vec![0, 10, 30, 60]);
		assert_eq!(metro.population, 100000.0);
	}

	#[test]
	fn nation_sums_everything() {
		let counters = county_counters();
		let table = nation_stats(&counters, &pop_map(), StatWindows::default());
		assert_eq!(table.num_keys(), 1);
		let us = table.get(&StateName::from(NATION)).unwrap();
		assert_eq!(us.confirmed, vec![0, 15, 40, 75]);
		assert_eq!(us.population, 200000.0);
	}

	#[test]
	fn missing_state_is_an_aggregation_error() {
		let states = state_stats(&county_counters(), &pop_map(), StatWindows::default());
		match require_state(&states, "Atlantis") {
			Err(Error::AmbiguousAggregation{found: 0, ..}) => (),
			other => panic!("unexpected result: {:?}", other.map(|s| s.population)),
		}
	}

	#[test]
	fn backfill_copies_merged_series_onto_parts() {
		let mut c = Counters::new(day0(), 2);
		c.get_or_create(CountyKey::new("Massachusetts", "Dukes and Nantucket"))
			.copy_from_slice(&[3, 9]);
		let pop = pop_map();
		let mut table = county_stats(&c, &pop, StatWindows::default(), false, None);
		let copied = merged_county_backfill(&mut table);
		assert_eq!(copied, 2);
		let dukes = table.get(&CountyKey::new("Massachusetts", "Dukes")).unwrap();
		assert_eq!(dukes.confirmed, vec![3, 9]);
		assert_eq!(dukes.new_cases, vec![0, 6]);
	}
}
