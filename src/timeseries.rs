use std::collections::HashMap;
use std::hash::Hash;
use std::ops::AddAssign;

use num_traits::Zero;

use chrono::NaiveDate;


pub trait TimeSeriesKey: Hash + Eq + Clone + std::fmt::Debug {}
impl<T: Hash + Eq + Clone + std::fmt::Debug> TimeSeriesKey for T {}


/// Dense keyed time series over a contiguous daily date axis.
///
/// Every key owns one `Vec<V>` spanning `[start, start + len)`; a day with no
/// observation holds `V::zero()`. Row identity `(key, date)` is therefore
/// unique by construction.
#[derive(Debug, Clone)]
pub struct TimeSeries<K: Hash + Eq, V: Copy> {
	start: NaiveDate,
	keys: HashMap<K, usize>,
	series: Vec<Vec<V>>,
	len: usize,
}

impl<K: Hash + Eq, V: Copy> TimeSeries<K, V> {
	pub fn new(start: NaiveDate, days: usize) -> Self {
		Self{
			start,
			len: days,
			keys: HashMap::new(),
			series: Vec::new(),
		}
	}

	#[inline(always)]
	pub fn date_index(&self, other: NaiveDate) -> Option<usize> {
		let days = (other - self.start).num_days();
		if days < 0 || days as usize >= self.len {
			return None
		}
		Some(days as usize)
	}

	#[inline(always)]
	pub fn index_date(&self, i: i64) -> Option<NaiveDate> {
		if i < 0 || i as usize >= self.len {
			return None
		}
		Some(self.start + chrono::Duration::days(i))
	}

	#[inline(always)]
	pub fn start(&self) -> NaiveDate {
		self.start
	}

	#[inline(always)]
	pub fn len(&self) -> usize {
		self.len
	}

	pub fn last_date(&self) -> Option<NaiveDate> {
		self.index_date(self.len as i64 - 1)
	}
}

impl<K: TimeSeriesKey, V: Copy + Zero> TimeSeries<K, V> {
	pub fn get_or_create(&mut self, k: K) -> &mut [V] {
		let index = match self.keys.get(&k) {
			Some(v) => *v,
			None => {
				let v = self.series.len();
				let mut vec = Vec::with_capacity(self.len);
				vec.resize(self.len, V::zero());
				self.series.push(vec);
				self.keys.insert(k, v);
				v
			},
		};
		&mut self.series[index][..]
	}

	pub fn get(&self, k: &K) -> Option<&[V]> {
		let index = *self.keys.get(k)?;
		Some(&self.series[index][..])
	}

	pub fn get_value(&self, k: &K, i: usize) -> Option<V> {
		if i >= self.len {
			return None
		}
		self.get(k).map(|v| v[i])
	}

	pub fn keys(&self) -> std::collections::hash_map::Keys<'_, K, usize> {
		self.keys.keys()
	}

	pub fn contains_key(&self, k: &K) -> bool {
		self.keys.contains_key(k)
	}

	pub fn num_keys(&self) -> usize {
		self.keys.len()
	}
}

impl<K: TimeSeriesKey, V: Copy + Zero + AddAssign> TimeSeries<K, V> {
	/// Aggregate under a coarser key by summing the raw per-day values of all
	/// source keys which map to the same target. Keys mapped to `None` are
	/// excluded from the result.
	///
	/// This is the only way tables move up a geographic level: derived
	/// statistics are never summed, they are recomputed from the re-aggregated
	/// counts afterwards.
	pub fn rekeyed<U: TimeSeriesKey, F: Fn(&K) -> Option<U>>(&self, f: F) -> TimeSeries<U, V> {
		let mut result = TimeSeries::<U, V>::new(self.start, self.len);
		for (k_old, index_old) in self.keys.iter() {
			let k_new = match f(k_old) {
				Some(k) => k,
				None => continue,
			};
			let ts_new = result.get_or_create(k_new);
			let ts_old = &self.series[*index_old][..];
			assert_eq!(ts_new.len(), ts_old.len());
			for i in 0..ts_new.len() {
				// This is safe because we asserted that both slices have the
				// same length and the loop is only going up to that length
				// minus one.
				unsafe {
					*ts_new.get_unchecked_mut(i) += *ts_old.get_unchecked(i);
				}
			}
		}
		result
	}
}


pub type Counters<K> = TimeSeries<K, u64>;


#[cfg(test)]
mod tests {
	use super::*;

	fn day0() -> NaiveDate {
		NaiveDate::from_ymd(2020, 1, 22)
	}

	#[test]
	fn date_index_round_trip() {
		let ts = Counters::<u32>::new(day0(), 10);
		assert_eq!(ts.date_index(day0()), Some(0));
		assert_eq!(ts.date_index(day0() + chrono::Duration::days(9)), Some(9));
		assert_eq!(ts.date_index(day0() + chrono::Duration::days(10)), None);
		assert_eq!(ts.date_index(day0() - chrono::Duration::days(1)), None);
		assert_eq!(ts.index_date(3), Some(day0() + chrono::Duration::days(3)));
		assert_eq!(ts.last_date(), Some(day0() + chrono::Duration::days(9)));
	}

	#[test]
	fn unobserved_days_are_zero() {
		let mut ts = Counters::<u32>::new(day0(), 4);
		ts.get_or_create(1)[2] = 7;
		assert_eq!(ts.get(&1).unwrap(), &[0, 0, 7, 0]);
		assert_eq!(ts.get_value(&1, 0), Some(0));
		assert_eq!(ts.get_value(&2, 0), None);
	}

	#[test]
	fn rekeyed_sums_and_filters() {
		let mut ts = Counters::<(u32, u32)>::new(day0(), 3);
		ts.get_or_create((1, 10)).copy_from_slice(&[1, 2, 3]);
		ts.get_or_create((1, 11)).copy_from_slice(&[10, 10, 10]);
		ts.get_or_create((2, 20)).copy_from_slice(&[5, 5, 5]);
		let by_state = ts.rekeyed(|k| if k.0 == 1 { Some(k.0) } else { None });
		assert_eq!(by_state.num_keys(), 1);
		assert_eq!(by_state.get(&1).unwrap(), &[11, 12, 13]);
		assert_eq!(by_state.get(&2), None);
	}
}
