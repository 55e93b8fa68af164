mod covidtracking;
mod error;
mod geo;
mod ioutil;
mod jhu;
mod levels;
mod output;
mod progress;
mod refdata;
mod stats;
mod timeseries;

pub use covidtracking::*;
pub use error::*;
pub use geo::*;
pub use ioutil::*;
pub use jhu::*;
pub use levels::*;
pub use output::*;
pub use progress::*;
pub use refdata::*;
pub use stats::*;
pub use timeseries::*;
