use std::collections::HashMap;
use std::io;

use log::warn;

use serde::Deserialize;

use smartstring::alias::{String as SmartString};

use super::geo::{CountyKey, CountyName, RegionName, StateName};


#[derive(Debug, Clone, Deserialize)]
pub struct PopulationRecord {
	#[serde(rename = "Province_State")]
	pub state: StateName,
	#[serde(rename = "Admin2")]
	pub county: Option<CountyName>,
	#[serde(rename = "Population")]
	pub population: Option<f64>,
	#[serde(rename = "Country_Region", default)]
	pub country: Option<SmartString>,
}


#[derive(Debug, Clone, Deserialize)]
pub struct RegionRecord {
	#[serde(rename = "Province_State")]
	pub state: StateName,
	#[serde(rename = "Admin2")]
	pub county: CountyName,
	#[serde(rename = "Region")]
	pub region: RegionName,
}


// Combined reporting units whose parts lack their own population row. The
// missing part is synthesized as combined minus the listed part.
static SPLIT_UNITS: [(&str, &str, &str, &str); 1] = [
	("Alaska", "Yakutat plus Hoonah-Angoon", "Hoonah-Angoon", "Yakutat"),
];


/// Population lookup keyed by `(state, county)`.
///
/// Lookups never fail: a unit without a configured population yields NaN,
/// which then flows through every statistic derived from it.
#[derive(Debug, Clone)]
pub struct PopulationMap {
	map: HashMap<CountyKey, f64>,
}

impl PopulationMap {
	pub fn population_of(&self, k: &CountyKey) -> f64 {
		self.map.get(k).copied().unwrap_or(f64::NAN)
	}

	pub fn len(&self) -> usize {
		self.map.len()
	}

	fn fix_split_units(&mut self) {
		for (state, combined, part, missing) in SPLIT_UNITS.iter() {
			let k_missing = CountyKey::new(*state, *missing);
			if self.map.contains_key(&k_missing) {
				continue
			}
			let combined_pop = match self.map.get(&CountyKey::new(*state, *combined)) {
				Some(v) => *v,
				None => continue,
			};
			let part_pop = match self.map.get(&CountyKey::new(*state, *part)) {
				Some(v) => *v,
				None => continue,
			};
			self.map.insert(k_missing, combined_pop - part_pop);
		}
	}
}

pub fn load_population<R: io::Read>(r: &mut R) -> super::error::Result<PopulationMap> {
	let mut map = HashMap::new();
	let mut r = csv::Reader::from_reader(r);
	for row in r.deserialize() {
		let rec: PopulationRecord = match row {
			Ok(rec) => rec,
			Err(e) => {
				warn!("skipping malformed population row: {}", e);
				continue
			},
		};
		match rec.country {
			Some(ref c) if &c[..] != "US" => continue,
			_ => (),
		};
		// a state-level row carries no county name and is keyed with the
		// state name, mirroring the case table normalization
		let county = match rec.county {
			Some(c) => c,
			None => rec.state.clone(),
		};
		let key = CountyKey{state: rec.state, county};
		map.insert(key, rec.population.unwrap_or(f64::NAN));
	}
	let mut result = PopulationMap{map};
	result.fix_split_units();
	Ok(result)
}


/// Region membership keyed by `(state, county)`. Only a handful of states
/// configure regions; everything else yields `None`.
#[derive(Debug, Clone)]
pub struct RegionMap {
	map: HashMap<CountyKey, RegionName>,
}

impl RegionMap {
	pub fn region_of(&self, k: &CountyKey) -> Option<&RegionName> {
		self.map.get(k)
	}

	pub fn len(&self) -> usize {
		self.map.len()
	}
}

pub fn load_regions<R: io::Read>(r: &mut R) -> super::error::Result<RegionMap> {
	let mut map = HashMap::new();
	let mut r = csv::Reader::from_reader(r);
	for row in r.deserialize() {
		let rec: RegionRecord = match row {
			Ok(rec) => rec,
			Err(e) => {
				warn!("skipping malformed region row: {}", e);
				continue
			},
		};
		map.insert(CountyKey{state: rec.state, county: rec.county}, rec.region);
	}
	Ok(RegionMap{map})
}
