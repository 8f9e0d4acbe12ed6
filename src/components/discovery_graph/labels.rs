//! Relationship labels: a bounded cache keyed by unordered species pair, and a
//! debounced queue that coalesces pending pairs into batched requests.

use std::collections::HashMap;

use indexmap::IndexMap;
use leptos::prelude::TimeoutHandle;

use super::types::ConnectionId;

/// Unordered species pair, stored sorted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
	first: String,
	second: String,
}

impl PairKey {
	pub fn new(a: &str, b: &str) -> Self {
		let (first, second) = if a <= b { (a, b) } else { (b, a) };
		Self {
			first: first.to_owned(),
			second: second.to_owned(),
		}
	}

	pub fn names(&self) -> (&str, &str) {
		(&self.first, &self.second)
	}
}

#[derive(Clone, Debug)]
pub struct LabelCache {
	entries: IndexMap<PairKey, String>,
	capacity: usize,
}

impl LabelCache {
	pub fn new(capacity: usize) -> Self {
		Self {
			entries: IndexMap::new(),
			capacity: capacity.max(1),
		}
	}

	pub fn get(&self, pair: &PairKey) -> Option<&str> {
		self.entries.get(pair).map(String::as_str)
	}

	/// Oldest entries are evicted first once over capacity.
	pub fn insert(&mut self, pair: PairKey, label: String) {
		self.entries.insert(pair, label);
		while self.entries.len() > self.capacity {
			self.entries.shift_remove_index(0);
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelRequest {
	/// Already known; apply immediately.
	Cached(String),
	/// First request for this pair; a flush must be scheduled.
	Queued,
	/// Pair already pending or in flight; the connection rides along.
	Joined,
}

/// A settled label for one waiting connection.
pub type LabelUpdate = (ConnectionId, String);

/// Debounced batch queue. Owns the pending set, the in-flight set and the
/// single outstanding debounce timer handle.
#[derive(Debug)]
pub struct LabelBatcher {
	cache: LabelCache,
	pending: IndexMap<PairKey, Vec<ConnectionId>>,
	in_flight: HashMap<PairKey, Vec<ConnectionId>>,
	max_batch: usize,
	timer: Option<TimeoutHandle>,
}

impl LabelBatcher {
	pub fn new(cache: LabelCache, max_batch: usize) -> Self {
		Self {
			cache,
			pending: IndexMap::new(),
			in_flight: HashMap::new(),
			max_batch: max_batch.max(1),
			timer: None,
		}
	}

	/// Gives the cache back for reuse by the next graph; pending work is dropped.
	pub fn into_cache(self) -> LabelCache {
		self.cache
	}

	pub fn enqueue(&mut self, pair: PairKey, connection: ConnectionId) -> LabelRequest {
		if let Some(label) = self.cache.get(&pair) {
			return LabelRequest::Cached(label.to_owned());
		}
		if let Some(waiting) = self.in_flight.get_mut(&pair) {
			waiting.push(connection);
			return LabelRequest::Joined;
		}
		match self.pending.get_mut(&pair) {
			Some(waiting) => {
				waiting.push(connection);
				LabelRequest::Joined
			}
			None => {
				self.pending.insert(pair, vec![connection]);
				LabelRequest::Queued
			}
		}
	}

	/// Stores the new debounce timer, returning the one it replaces so the
	/// caller can cancel it.
	pub fn replace_timer(&mut self, handle: Option<TimeoutHandle>) -> Option<TimeoutHandle> {
		std::mem::replace(&mut self.timer, handle)
	}

	/// Moves every pending pair in flight, split into request-sized batches.
	pub fn flush(&mut self) -> Vec<Vec<PairKey>> {
		self.timer = None;
		let pairs: Vec<PairKey> = self
			.pending
			.drain(..)
			.map(|(pair, waiting)| {
				self.in_flight.entry(pair.clone()).or_default().extend(waiting);
				pair
			})
			.collect();
		pairs
			.chunks(self.max_batch)
			.map(<[PairKey]>::to_vec)
			.collect()
	}

	/// Settles a batch. Pairs the service answered are cached; pairs it
	/// did not resolve get an empty label and stay uncached.
	pub fn complete(
		&mut self,
		batch: &[PairKey],
		results: &HashMap<PairKey, String>,
	) -> Vec<LabelUpdate> {
		let mut updates = Vec::new();
		for pair in batch {
			let label = results.get(pair).cloned();
			if let Some(label) = &label {
				self.cache.insert(pair.clone(), label.clone());
			}
			let label = label.unwrap_or_default();
			for connection in self.in_flight.remove(pair).unwrap_or_default() {
				updates.push((connection, label.clone()));
			}
		}
		updates
	}

	/// The whole batch failed: every waiting connection settles unlabeled, no retry.
	pub fn fail(&mut self, batch: &[PairKey]) -> Vec<LabelUpdate> {
		self.complete(batch, &HashMap::new())
	}
}

#[cfg(test)]
impl LabelCache {
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
impl LabelBatcher {
	pub fn cache(&self) -> &LabelCache {
		&self.cache
	}

	pub fn has_pending(&self) -> bool {
		!self.pending.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn batcher() -> LabelBatcher {
		LabelBatcher::new(LabelCache::new(64), 10)
	}

	fn answered(pair: &PairKey, label: &str) -> HashMap<PairKey, String> {
		HashMap::from([(pair.clone(), label.to_owned())])
	}

	#[test]
	fn pair_key_is_unordered() {
		assert_eq!(PairKey::new("Robin", "Crow"), PairKey::new("Crow", "Robin"));
		assert_eq!(PairKey::new("Robin", "Crow").names(), ("Crow", "Robin"));
	}

	#[test]
	fn same_pair_twice_is_fetched_once() {
		let mut labels = batcher();
		let pair = PairKey::new("Robin", "Worm");
		assert_eq!(labels.enqueue(pair.clone(), ConnectionId(1)), LabelRequest::Queued);
		assert_eq!(
			labels.enqueue(PairKey::new("Worm", "Robin"), ConnectionId(2)),
			LabelRequest::Joined
		);
		let batches = labels.flush();
		assert_eq!(batches, vec![vec![pair.clone()]]);

		let updates = labels.complete(&batches[0], &answered(&pair, "eats"));
		assert_eq!(
			updates,
			vec![(ConnectionId(1), "eats".to_owned()), (ConnectionId(2), "eats".to_owned())]
		);
		assert_eq!(
			labels.enqueue(pair, ConnectionId(3)),
			LabelRequest::Cached("eats".into())
		);
		assert!(labels.flush().is_empty());
	}

	#[test]
	fn requests_while_in_flight_join_the_outstanding_batch() {
		let mut labels = batcher();
		let pair = PairKey::new("Bee", "Clover");
		labels.enqueue(pair.clone(), ConnectionId(1));
		let batches = labels.flush();
		assert_eq!(labels.enqueue(pair.clone(), ConnectionId(2)), LabelRequest::Joined);
		assert!(labels.flush().is_empty());
		let updates = labels.complete(&batches[0], &answered(&pair, "pollinates"));
		assert_eq!(updates.len(), 2);
	}

	#[test]
	fn failure_settles_empty_and_does_not_cache() {
		let mut labels = batcher();
		let pair = PairKey::new("Fox", "Vole");
		labels.enqueue(pair.clone(), ConnectionId(7));
		let batch = labels.flush().remove(0);
		assert_eq!(labels.fail(&batch), vec![(ConnectionId(7), String::new())]);
		assert!(labels.cache().is_empty());
		assert!(!labels.has_pending());
	}

	#[test]
	fn unanswered_pairs_settle_empty() {
		let mut labels = batcher();
		let (a, b) = (PairKey::new("A", "B"), PairKey::new("C", "D"));
		labels.enqueue(a.clone(), ConnectionId(1));
		labels.enqueue(b.clone(), ConnectionId(2));
		let batch = labels.flush().remove(0);
		let updates = labels.complete(&batch, &answered(&a, "shares habitat"));
		assert_eq!(
			updates,
			vec![
				(ConnectionId(1), "shares habitat".to_owned()),
				(ConnectionId(2), String::new())
			]
		);
		assert_eq!(labels.cache().len(), 1);
	}

	#[test]
	fn flush_splits_into_request_sized_batches() {
		let mut labels = LabelBatcher::new(LabelCache::new(64), 10);
		for i in 0..23 {
			labels.enqueue(PairKey::new("Root", &format!("S{i:02}")), ConnectionId(i));
		}
		let sizes: Vec<usize> = labels.flush().iter().map(Vec::len).collect();
		assert_eq!(sizes, vec![10, 10, 3]);
	}

	#[test]
	fn timer_handle_is_replaced_not_stacked() {
		let mut labels = batcher();
		assert_eq!(labels.replace_timer(Some(TimeoutHandle(1))), None);
		assert_eq!(labels.replace_timer(Some(TimeoutHandle(2))), Some(TimeoutHandle(1)));
		labels.flush();
		assert_eq!(labels.replace_timer(None), None);
	}

	#[test]
	fn cache_evicts_oldest() {
		let mut cache = LabelCache::new(2);
		cache.insert(PairKey::new("a", "b"), "1".into());
		cache.insert(PairKey::new("c", "d"), "2".into());
		cache.insert(PairKey::new("e", "f"), "3".into());
		assert_eq!(cache.len(), 2);
		assert_eq!(cache.get(&PairKey::new("a", "b")), None);
		assert_eq!(cache.get(&PairKey::new("f", "e")), Some("3"));
	}
}
