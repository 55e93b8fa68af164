use std::collections::HashMap;
use std::io;

use chrono::NaiveDate;

use log::warn;

use super::error::{Error, Result};
use super::geo::{CountyKey, CountyName, MaybeFips, StateName};
use super::timeseries::Counters;


// Territories with legitimately zero reported cases; never treated as a
// folded-away county.
static PROTECTED_STATES: [&str; 1] = ["American Samoa"];


/// One geographic unit of the wide source: identity columns plus one
/// cumulative count per date column.
#[derive(Debug, Clone)]
pub struct WideRow {
	pub fips: MaybeFips,
	pub state: StateName,
	pub county: Option<CountyName>,
	pub confirmed: Vec<u64>,
}

impl WideRow {
	/// Grouping key for this row. A row without a county name is a
	/// state-level aggregate and is keyed with the state name in the county
	/// slot.
	pub fn county_key(&self) -> CountyKey {
		CountyKey{
			state: self.state.clone(),
			county: self.county.clone().unwrap_or_else(|| self.state.clone()),
		}
	}
}


/// Wide-format case table: N geographic rows, one column per calendar date.
#[derive(Debug, Clone)]
pub struct WideTable {
	pub dates: Vec<NaiveDate>,
	pub rows: Vec<WideRow>,
}

impl WideTable {
	pub fn start(&self) -> Option<NaiveDate> {
		self.dates.first().copied()
	}
}


/// Recognize a date-like column header. The upstream table historically used
/// `M/D/YY`; some snapshots carry ISO dates instead.
pub fn parse_date_header(s: &str) -> Option<NaiveDate> {
	NaiveDate::parse_from_str(s, "%m/%d/%y")
		.or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
		.ok()
}


/// Load the wide cumulative-count table.
///
/// A missing identity column or a broken date axis aborts the load; a row
/// with an unparseable count is dropped with a warning and the load
/// continues.
pub fn load_wide_csv<R: io::Read>(r: &mut R) -> Result<WideTable> {
	let mut r = csv::Reader::from_reader(r);
	let headers = r.headers()?.clone();

	let mut fips_col = None;
	let mut county_col = None;
	let mut state_col = None;
	let mut date_cols: Vec<(usize, NaiveDate)> = Vec::new();
	for (i, name) in headers.iter().enumerate() {
		match name {
			"FIPS" => fips_col = Some(i),
			"Admin2" => county_col = Some(i),
			"Province_State" => state_col = Some(i),
			_ => if let Some(d) = parse_date_header(name) {
				date_cols.push((i, d));
			},
		}
	}
	let fips_col = fips_col.ok_or(Error::MissingColumn("FIPS"))?;
	let county_col = county_col.ok_or(Error::MissingColumn("Admin2"))?;
	let state_col = state_col.ok_or(Error::MissingColumn("Province_State"))?;
	if date_cols.is_empty() {
		return Err(Error::BadDateAxis("no date columns in header".into()))
	}
	for w in date_cols.windows(2) {
		if w[1].1 != w[0].1 + chrono::Duration::days(1) {
			return Err(Error::BadDateAxis(
				format!("date columns not contiguous ascending at {}", w[1].1)
			))
		}
	}
	let dates: Vec<NaiveDate> = date_cols.iter().map(|(_, d)| *d).collect();

	let mut rows = Vec::new();
	for rec in r.records() {
		let rec = match rec {
			Ok(rec) => rec,
			Err(e) => {
				warn!("skipping malformed case row: {}", e);
				continue
			},
		};
		let state = rec.get(state_col).unwrap_or("");
		if state.is_empty() {
			warn!("skipping case row without Province_State");
			continue
		}
		let fips = match rec.get(fips_col).unwrap_or("").parse::<MaybeFips>() {
			Ok(fips) => fips,
			Err(e) => {
				warn!("skipping case row for {:?}: bad FIPS: {}", state, e);
				continue
			},
		};
		let county_s = rec.get(county_col).unwrap_or("");
		let county: Option<CountyName> = if county_s.is_empty() {
			None
		} else {
			Some(county_s.into())
		};
		let mut confirmed = Vec::with_capacity(date_cols.len());
		let mut bad_count = false;
		for (i, _) in date_cols.iter() {
			let field = rec.get(*i).unwrap_or("");
			match field.parse::<u64>() {
				Ok(v) => confirmed.push(v),
				Err(_) => {
					warn!(
						"skipping case row for {:?}, {:?}: unparseable count {:?} in column {:?}",
						county_s, state, field, headers.get(*i).unwrap_or("?")
					);
					bad_count = true;
					break
				},
			}
		}
		if bad_count {
			continue
		}
		rows.push(WideRow{
			fips,
			state: state.into(),
			county,
			confirmed,
		});
	}
	Ok(WideTable{dates, rows})
}


/// Drop the leading date columns whose sum over ALL rows is zero, stopping at
/// the first column with any case. This is a global prefix trim on the table,
/// not a per-row clip; an all-zero table is left untouched. Returns the
/// number of columns removed.
pub fn trim_zero_prefix(table: &mut WideTable) -> usize {
	let mut lead = 0;
	for i in 0..table.dates.len() {
		let sum: u64 = table.rows.iter().map(|r| r.confirmed[i]).sum();
		if sum > 0 {
			break
		}
		lead += 1;
	}
	if lead == table.dates.len() {
		return 0
	}
	table.dates.drain(..lead);
	for row in table.rows.iter_mut() {
		row.confirmed.drain(..lead);
	}
	lead
}


/// Remove counties whose cumulative count is still zero on the most recent
/// date. These were folded into a neighboring reporting unit upstream and
/// would otherwise linger as phantom rows. State-level rows (no county name)
/// and protected territories are always kept. Returns the number of rows
/// removed.
pub fn drop_zero_counties(table: &mut WideTable) -> usize {
	let last = match table.dates.len().checked_sub(1) {
		Some(v) => v,
		None => return 0,
	};
	let before = table.rows.len();
	table.rows.retain(|row| {
		row.county.is_none()
			|| row.confirmed[last] > 0
			|| PROTECTED_STATES.iter().any(|s| *s == &row.state[..])
	});
	before - table.rows.len()
}


/// Reshape the wide table into the dense keyed form consumed by the
/// derivation engine: one cumulative series per `(state, county)` key.
/// Duplicate keys are summed, consistent with grouped aggregation.
pub fn unroll(table: &WideTable) -> Result<Counters<CountyKey>> {
	let start = table.start().ok_or(Error::NoData("wide case table"))?;
	let mut counters = Counters::new(start, table.dates.len());
	for row in table.rows.iter() {
		let ts = counters.get_or_create(row.county_key());
		for (i, v) in row.confirmed.iter().enumerate() {
			ts[i] += *v;
		}
	}
	Ok(counters)
}


/// FIPS codes by county key, for consumers that render canonical county
/// identifiers.
pub fn fips_by_county(table: &WideTable) -> HashMap<CountyKey, MaybeFips> {
	let mut result = HashMap::new();
	for row in table.rows.iter() {
		result.insert(row.county_key(), row.fips);
	}
	result
}
