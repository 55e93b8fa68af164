use std::fmt;
use std::num::{ParseFloatError, ParseIntError};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer};

use smartstring::alias::{String as SmartString};

pub type StateName = SmartString;
pub type CountyName = SmartString;
pub type RegionName = SmartString;

/// Key for the national aggregate, kept alongside the state names so that
/// state-keyed and nation-keyed tables share one key type.
pub const NATION: &str = "United States";


/// Composite grouping key for a single county.
///
/// State-level aggregate rows in the wide source carry no county name; they
/// are keyed with the state name in the county slot so they stay distinct
/// from every real county of that state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountyKey {
	pub state: StateName,
	pub county: CountyName,
}

impl CountyKey {
	pub fn new<S: Into<StateName>, C: Into<CountyName>>(state: S, county: C) -> Self {
		Self{
			state: state.into(),
			county: county.into(),
		}
	}
}

impl fmt::Display for CountyKey {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}, {}", self.county, self.state)
	}
}


#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey {
	pub state: StateName,
	pub region: RegionName,
}

impl RegionKey {
	pub fn new<S: Into<StateName>, R: Into<RegionName>>(state: S, region: R) -> Self {
		Self{
			state: state.into(),
			region: region.into(),
		}
	}
}

impl fmt::Display for RegionKey {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		write!(f, "{} Region, {}", self.region, self.state)
	}
}


#[derive(Debug, Clone)]
pub enum ParseFipsError {
	InvalidInteger(ParseIntError),
	InvalidNumber(ParseFloatError),
	OutOfRange(f64),
}

impl fmt::Display for ParseFipsError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::InvalidInteger(e) => fmt::Display::fmt(e, f),
			Self::InvalidNumber(e) => fmt::Display::fmt(e, f),
			Self::OutOfRange(v) => write!(f, "{} is not a valid FIPS code", v),
		}
	}
}


/// FIPS county code. Always renders as the canonical five digit, zero padded
/// form; a unit without a code stays empty.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaybeFips(pub Option<u32>);

impl Deref for MaybeFips {
	type Target = Option<u32>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl DerefMut for MaybeFips {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

impl From<MaybeFips> for Option<u32> {
	fn from(other: MaybeFips) -> Self {
		other.0
	}
}

impl From<Option<u32>> for MaybeFips {
	fn from(other: Option<u32>) -> Self {
		Self(other)
	}
}

impl FromStr for MaybeFips {
	type Err = ParseFipsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() || s == "NaN" {
			return Ok(MaybeFips(None))
		}
		match s.parse::<u32>() {
			Ok(v) if v < 100000 => Ok(MaybeFips(Some(v))),
			Ok(v) => Err(ParseFipsError::OutOfRange(v as f64)),
			Err(int_err) => {
				if !s.contains('.') {
					return Err(ParseFipsError::InvalidInteger(int_err))
				}
				// some revisions of the upstream table write codes as floats
				let v = s.parse::<f64>().map_err(ParseFipsError::InvalidNumber)?;
				if v < 0.0 || v.fract() != 0.0 || v >= 100000.0 {
					return Err(ParseFipsError::OutOfRange(v))
				}
				Ok(MaybeFips(Some(v as u32)))
			},
		}
	}
}

impl fmt::Display for MaybeFips {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self.0 {
			Some(v) => write!(f, "{:05}", v),
			None => Ok(()),
		}
	}
}

impl<'de> Deserialize<'de> for MaybeFips {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where D: Deserializer<'de>
	{
		let s = String::deserialize(deserializer)?;
		FromStr::from_str(&s).map_err(de::Error::custom)
	}
}


/// The 50 states plus DC, paired with their postal abbreviations.
static STATES: [(&str, &str); 51] = [
	("AL", "Alabama"), ("AK", "Alaska"), ("AZ", "Arizona"), ("AR", "Arkansas"),
	("CA", "California"), ("CO", "Colorado"), ("CT", "Connecticut"), ("DE", "Delaware"),
	("DC", "District of Columbia"), ("FL", "Florida"), ("GA", "Georgia"), ("HI", "Hawaii"),
	("ID", "Idaho"), ("IL", "Illinois"), ("IN", "Indiana"), ("IA", "Iowa"),
	("KS", "Kansas"), ("KY", "Kentucky"), ("LA", "Louisiana"), ("ME", "Maine"),
	("MD", "Maryland"), ("MA", "Massachusetts"), ("MI", "Michigan"), ("MN", "Minnesota"),
	("MS", "Mississippi"), ("MO", "Missouri"), ("MT", "Montana"), ("NE", "Nebraska"),
	("NV", "Nevada"), ("NH", "New Hampshire"), ("NJ", "New Jersey"), ("NM", "New Mexico"),
	("NY", "New York"), ("NC", "North Carolina"), ("ND", "North Dakota"), ("OH", "Ohio"),
	("OK", "Oklahoma"), ("OR", "Oregon"), ("PA", "Pennsylvania"), ("RI", "Rhode Island"),
	("SC", "South Carolina"), ("SD", "South Dakota"), ("TN", "Tennessee"), ("TX", "Texas"),
	("UT", "Utah"), ("VT", "Vermont"), ("VA", "Virginia"), ("WA", "Washington"),
	("WV", "West Virginia"), ("WI", "Wisconsin"), ("WY", "Wyoming"),
];

/// Territories present in the case data but absent from most state tables.
static TERRITORIES: [(&str, &str); 5] = [
	("AS", "American Samoa"), ("GU", "Guam"), ("MP", "Northern Mariana Islands"),
	("PR", "Puerto Rico"), ("VI", "Virgin Islands"),
];

pub fn state_name_of_abbr(abbr: &str) -> Option<&'static str> {
	for (a, name) in STATES.iter().chain(TERRITORIES.iter()) {
		if *a == abbr {
			return Some(name)
		}
	}
	None
}

pub fn abbr_of_state_name(name: &str) -> Option<&'static str> {
	for (a, n) in STATES.iter().chain(TERRITORIES.iter()) {
		if *n == name {
			return Some(a)
		}
	}
	None
}
