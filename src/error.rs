use std::fmt;
use std::io;


#[derive(Debug)]
pub enum Error {
	Io(io::Error),
	Csv(csv::Error),
	MissingColumn(&'static str),
	BadDateAxis(String),
	NoData(&'static str),
	AmbiguousAggregation{
		key: String,
		found: usize,
	},
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Io(e) => fmt::Display::fmt(e, f),
			Self::Csv(e) => fmt::Display::fmt(e, f),
			Self::MissingColumn(name) => write!(f, "required column {:?} not found in input", name),
			Self::BadDateAxis(msg) => write!(f, "unusable date axis: {}", msg),
			Self::NoData(what) => write!(f, "no usable rows in {}", what),
			Self::AmbiguousAggregation{key, found} => write!(f, "aggregation target {:?} matched {} units, expected exactly one", key, found),
		}
	}
}

impl From<io::Error> for Error {
	fn from(err: io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<csv::Error> for Error {
	fn from(err: csv::Error) -> Self {
		Self::Csv(err)
	}
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
