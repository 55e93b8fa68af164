use std::collections::HashMap;
use std::io;

use super::covidtracking::TestStatsTable;
use super::error::Result;
use super::geo::{CountyKey, MaybeFips, RegionKey, StateName};
use super::refdata::RegionMap;
use super::stats::{clip_leading_zeroes, StatsTable};
use super::timeseries::TimeSeriesKey;


/// How a grouping key renders into the identity columns of the long output
/// table. Region-keyed rows carry their region in the key itself; county
/// rows look theirs up in the configured region map.
pub trait KeyColumns {
	fn state(&self) -> &str;

	fn county(&self) -> Option<&str> {
		None
	}

	fn region<'a>(&'a self, _regions: Option<&'a RegionMap>) -> Option<&'a str> {
		None
	}
}

impl KeyColumns for CountyKey {
	fn state(&self) -> &str {
		&self.state[..]
	}

	fn county(&self) -> Option<&str> {
		Some(&self.county[..])
	}

	fn region<'a>(&'a self, regions: Option<&'a RegionMap>) -> Option<&'a str> {
		regions.and_then(|m| m.region_of(self)).map(|r| &r[..])
	}
}

impl KeyColumns for RegionKey {
	fn state(&self) -> &str {
		&self.state[..]
	}

	fn region<'a>(&'a self, _regions: Option<&'a RegionMap>) -> Option<&'a str> {
		Some(&self.region[..])
	}
}

impl KeyColumns for StateName {
	fn state(&self) -> &str {
		&self[..]
	}
}


fn fmt_f64(v: f64) -> String {
	if v.is_nan() {
		String::new()
	} else {
		format!("{}", v)
	}
}


/// Write a derived table as long-format CSV, ordered by `(state, county,
/// date)`. NaN and skipped statistics become empty fields. Test-count
/// columns appear only when a test table is supplied, and only carry values
/// on dates the test axis covers; the feed may lag the case table and its
/// trailing rows must not be faked. With `clip` set, each unit's leading
/// zero-case rows are skipped (row-scoped, for per-locality display).
pub fn write_stats<K, W>(
	w: W,
	table: &StatsTable<K>,
	fips: Option<&HashMap<K, MaybeFips>>,
	regions: Option<&RegionMap>,
	tests: Option<&TestStatsTable>,
	clip: bool,
) -> Result<()>
	where K: TimeSeriesKey + KeyColumns + Ord, W: io::Write
{
	let mut w = csv::Writer::from_writer(w);
	let windows = table.windows();

	let mut header: Vec<String> = vec![
		"Province_State".into(),
		"Admin2".into(),
		"Region".into(),
		"FIPS".into(),
		"Last_Update".into(),
		"Confirmed".into(),
		"Population".into(),
		"New_Cases".into(),
		format!("day_avg_{}", windows.avg_days),
		format!("percap_{}", windows.avg_days),
		format!("slope_{}", windows.trend_days),
		format!("trend_{}", windows.trend_days),
	];
	if let Some(tests) = tests {
		header.push("positive".into());
		header.push("negative".into());
		header.push(format!("daily_positive_rate_{}", tests.window()));
	}
	w.write_record(&header)?;

	let mut keys: Vec<&K> = table.keys().collect();
	keys.sort();

	for k in keys {
		let series = table.get(k).expect("key vanished while writing");
		let skip = if clip {
			clip_leading_zeroes(&series.confirmed)
		} else {
			0
		};
		for i in skip..table.len() {
			let date = table.index_date(i as i64).expect("row index outside table axis");
			let mut fields: Vec<String> = Vec::with_capacity(header.len());
			fields.push(k.state().into());
			fields.push(k.county().unwrap_or("").into());
			fields.push(k.region(regions).unwrap_or("").into());
			fields.push(match fips.and_then(|m| m.get(k)) {
				Some(f) => f.to_string(),
				None => String::new(),
			});
			fields.push(date.format("%Y-%m-%d").to_string());
			fields.push(series.confirmed[i].to_string());
			fields.push(fmt_f64(series.population));
			fields.push(series.new_cases[i].to_string());
			fields.push(fmt_f64(series.day_avg[i]));
			fields.push(fmt_f64(series.percap[i]));
			fields.push(match &series.slope {
				Some(s) => fmt_f64(s[i]),
				None => String::new(),
			});
			fields.push(match &series.trend {
				Some(t) if !t[i].is_nan() => format!("{:.0}", t[i]),
				_ => String::new(),
			});
			if let Some(tests) = tests {
				let joined = tests.date_index(date).and_then(|j| {
					let ts = tests.get(k.state())?;
					Some((ts.positive[j], ts.negative[j], ts.positive_rate[j]))
				});
				match joined {
					Some((p, n, rate)) => {
						fields.push(p.to_string());
						fields.push(n.to_string());
						fields.push(fmt_f64(rate));
					},
					None => {
						fields.push(String::new());
						fields.push(String::new());
						fields.push(String::new());
					},
				}
			}
			w.write_record(&fields)?;
		}
	}
	w.flush().map_err(super::error::Error::Io)?;
	Ok(())
}


#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;

	use super::super::covidtracking::{derive_test_stats, load_tracking_csv};
	use super::super::stats::{derive, StatWindows};
	use super::super::timeseries::Counters;

	fn day0() -> NaiveDate {
		NaiveDate::from_ymd(2020, 3, 1)
	}

	fn county_table() -> StatsTable<CountyKey> {
		let mut c = Counters::new(day0(), 3);
		c.get_or_create(CountyKey::new("Oregon", "Yamhill")).copy_from_slice(&[0, 2, 5]);
		derive(&c, |_| f64::NAN, StatWindows::default(), false, None)
	}

	fn rendered<K>(
		table: &StatsTable<K>,
		fips: Option<&HashMap<K, MaybeFips>>,
		regions: Option<&RegionMap>,
		tests: Option<&TestStatsTable>,
		clip: bool,
	) -> String
		where K: TimeSeriesKey + KeyColumns + Ord
	{
		let mut buf = Vec::new();
		write_stats(&mut buf, table, fips, regions, tests, clip).unwrap();
		String::from_utf8(buf).unwrap()
	}

	#[test]
	fn header_and_row_shape() {
		let out = rendered(&county_table(), None, None, None, false);
		let mut lines = out.lines();
		assert_eq!(
			lines.next().unwrap(),
			"Province_State,Admin2,Region,FIPS,Last_Update,Confirmed,Population,New_Cases,day_avg_7,percap_7,slope_14,trend_14"
		);
		// NaN population and skipped trends render as empty fields
		assert_eq!(
			lines.next().unwrap(),
			"Oregon,Yamhill,,,2020-03-01,0,,0,0,,,"
		);
		assert_eq!(lines.count(), 2);
	}

	#[test]
	fn fips_column_renders_padded() {
		let table = county_table();
		let mut fips = HashMap::new();
		fips.insert(CountyKey::new("Oregon", "Yamhill"), MaybeFips(Some(41071)));
		let out = rendered(&table, Some(&fips), None, None, false);
		assert!(out.lines().nth(1).unwrap().contains(",41071,"));
	}

	#[test]
	fn clip_skips_leading_zero_rows_per_unit() {
		let out = rendered(&county_table(), None, None, None, true);
		// the zero-case first day is gone, the table starts at the first case
		assert_eq!(out.lines().count(), 3);
		assert!(out.lines().nth(1).unwrap().starts_with("Oregon,Yamhill,,,2020-03-02,2"));
	}

	#[test]
	fn county_rows_carry_their_region() {
		let table = county_table();
		let csv = "Province_State,Admin2,Region\nOregon,Yamhill,Willamette Valley\n";
		let regions = super::super::refdata::load_regions(&mut csv.as_bytes()).unwrap();
		let out = rendered(&table, None, Some(&regions), None, false);
		assert!(out.lines().nth(1).unwrap().starts_with("Oregon,Yamhill,Willamette Valley,"));
		// an unmapped county still renders an empty region field
		let out = rendered(&table, None, None, None, false);
		assert!(out.lines().nth(1).unwrap().starts_with("Oregon,Yamhill,,"));
	}

	#[test]
	fn test_columns_join_by_state_and_date() {
		let mut c = Counters::new(day0(), 3);
		c.get_or_create(StateName::from("Oregon")).copy_from_slice(&[1, 2, 3]);
		let states = derive(&c, |_| 100000.0, StatWindows::default(), true, None);
		// tracking lags the case table by one day
		let tracking = "date,state,positive,negative\n20200301,OR,5,40\n20200302,OR,9,76\n";
		let counts = load_tracking_csv(&mut tracking.as_bytes()).unwrap();
		let tests = derive_test_stats(&counts, 7);
		let out = rendered(&states, None, None, Some(&tests), false);
		let lines: Vec<&str> = out.lines().collect();
		assert!(lines[0].ends_with("positive,negative,daily_positive_rate_7"));
		assert!(lines[1].ends_with(&format!(",5,40,{}", 5.0 / 45.0)));
		// the uncovered trailing date carries empty test fields
		assert!(lines[3].ends_with(",,,"));
	}
}
