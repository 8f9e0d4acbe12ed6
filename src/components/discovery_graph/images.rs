use indexmap::IndexMap;

/// Decoded images are shared by (quest, filename).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageKey {
	pub quest_id: String,
	pub filename: String,
}

impl ImageKey {
	pub fn new(quest_id: &str, filename: &str) -> Option<Self> {
		(!filename.is_empty()).then(|| Self {
			quest_id: quest_id.to_owned(),
			filename: filename.to_owned(),
		})
	}
}

#[derive(Debug)]
pub enum ImageSlot<T> {
	Loading,
	Ready(T),
	Failed,
}

/// FIFO-bounded cache of decoded images. `T` is the platform image handle
/// (`HtmlImageElement` in the browser).
#[derive(Debug)]
pub struct ImageCache<T> {
	slots: IndexMap<ImageKey, ImageSlot<T>>,
	capacity: usize,
}

impl<T> ImageCache<T> {
	pub fn new(capacity: usize) -> Self {
		Self {
			slots: IndexMap::new(),
			capacity: capacity.max(1),
		}
	}

	/// Marks `key` as loading and returns true when the caller should start a decode.
	pub fn request(&mut self, key: &ImageKey) -> bool {
		if self.slots.contains_key(key) {
			return false;
		}
		self.slots.insert(key.clone(), ImageSlot::Loading);
		self.evict();
		true
	}

	pub fn finish(&mut self, key: &ImageKey, image: T) {
		if let Some(slot) = self.slots.get_mut(key) {
			*slot = ImageSlot::Ready(image);
		}
	}

	pub fn fail(&mut self, key: &ImageKey) {
		if let Some(slot) = self.slots.get_mut(key) {
			*slot = ImageSlot::Failed;
		}
	}

	pub fn ready(&self, key: &ImageKey) -> Option<&T> {
		match self.slots.get(key) {
			Some(ImageSlot::Ready(image)) => Some(image),
			_ => None,
		}
	}

	fn evict(&mut self) {
		while self.slots.len() > self.capacity {
			// in-flight decodes keep their slot so their callback still lands
			let Some(idx) = self
				.slots
				.values()
				.position(|slot| !matches!(slot, ImageSlot::Loading))
			else {
				break;
			};
			self.slots.shift_remove_index(idx);
		}
	}
}

#[cfg(test)]
impl<T> ImageCache<T> {
	pub fn is_loading(&self, key: &ImageKey) -> bool {
		matches!(self.slots.get(key), Some(ImageSlot::Loading))
	}

	pub fn len(&self) -> usize {
		self.slots.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn key(name: &str) -> ImageKey {
		ImageKey::new("q1", name).unwrap()
	}

	#[test]
	fn repeated_requests_decode_once() {
		let mut cache = ImageCache::<u8>::new(8);
		assert!(cache.request(&key("a.jpg")));
		assert!(!cache.request(&key("a.jpg")));
		assert!(cache.is_loading(&key("a.jpg")));
		cache.finish(&key("a.jpg"), 7);
		assert_eq!(cache.ready(&key("a.jpg")), Some(&7));
		assert!(!cache.request(&key("a.jpg")));
	}

	#[test]
	fn same_filename_in_other_quest_is_distinct() {
		let mut cache = ImageCache::<u8>::new(8);
		assert!(cache.request(&key("a.jpg")));
		assert!(cache.request(&ImageKey::new("q2", "a.jpg").unwrap()));
	}

	#[test]
	fn failed_decode_is_not_ready() {
		let mut cache = ImageCache::<u8>::new(8);
		cache.request(&key("a.jpg"));
		cache.fail(&key("a.jpg"));
		assert_eq!(cache.ready(&key("a.jpg")), None);
		assert!(!cache.request(&key("a.jpg")));
	}

	#[test]
	fn evicts_oldest_settled_entry() {
		let mut cache = ImageCache::<u8>::new(2);
		cache.request(&key("a"));
		cache.finish(&key("a"), 1);
		cache.request(&key("b"));
		cache.request(&key("c"));
		assert_eq!(cache.len(), 2);
		assert_eq!(cache.ready(&key("a")), None);
		assert!(cache.is_loading(&key("b")));
		assert!(cache.is_loading(&key("c")));
	}

	#[test]
	fn empty_filename_has_no_key() {
		assert_eq!(ImageKey::new("q1", ""), None);
	}
}
