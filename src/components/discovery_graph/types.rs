use serde::{Deserialize, Serialize};

use super::images::ImageKey;

/// A point in either screen (canvas-relative) or graph space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn distance(self, other: Point) -> f64 {
		let (dx, dy) = (other.x - self.x, other.y - self.y);
		(dx * dx + dy * dy).sqrt()
	}

	pub fn midpoint(self, other: Point) -> Point {
		Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u32);

/// One parsed sighting row, as produced by the quest CSV layer.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SightingRecord {
	pub taxonomic_group: String,
	pub scientific_name: String,
	pub common_name: String,
	pub image_name: String,
	pub quest_id: String,
	pub user_id: String,
	/// Seconds since the epoch.
	pub discovery_timestamp: f64,
}

impl SightingRecord {
	/// Common name, falling back to the scientific name, then "Unknown".
	pub fn display_name(&self) -> &str {
		[self.common_name.trim(), self.scientific_name.trim()]
			.into_iter()
			.find(|name| !name.is_empty())
			.unwrap_or("Unknown")
	}

	/// The image name without any leading path segments.
	pub fn image_filename(&self) -> &str {
		self.image_name
			.rsplit('/')
			.next()
			.unwrap_or_default()
	}
}

/// Descriptive text shown in the host's detail panel.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SpeciesInfo {
	pub name: String,
	pub what_is_it: String,
	pub information: String,
	pub image_filename: String,
	pub image_src: String,
}

impl SpeciesInfo {
	pub fn placeholder(name: &str, image_filename: &str, image_src: &str) -> Self {
		Self {
			name: name.to_owned(),
			image_filename: image_filename.to_owned(),
			image_src: image_src.to_owned(),
			..Default::default()
		}
	}

	pub fn is_placeholder(&self) -> bool {
		self.what_is_it.is_empty() && self.information.is_empty()
	}
}

/// A distinct species as currently known in the graph.
#[derive(Clone, Debug)]
pub struct Node {
	pub id: NodeId,
	pub x: f64,
	pub y: f64,
	pub vx: f64,
	pub vy: f64,
	pub size: f64,
	pub name: String,
	pub scientific_name: String,
	pub taxonomic_group: String,
	pub image: Option<ImageKey>,
	pub image_src: String,
	pub quest_id: String,
	/// User of the sighting that created this node.
	pub user_id: String,
	/// Every user that has sighted this species, in first-sighting order.
	pub contributors: Vec<String>,
	pub species_info: SpeciesInfo,
	pub timestamp: f64,
	pub selected: bool,
	pub connections: Vec<ConnectionId>,
}

impl Node {
	pub fn position(&self) -> Point {
		Point::new(self.x, self.y)
	}

	/// Explicit Euler step followed by velocity damping.
	pub fn integrate(&mut self, damping: f64) {
		self.x += self.vx;
		self.y += self.vy;
		self.vx *= damping;
		self.vy *= damping;
	}

	pub fn contains(&self, x: f64, y: f64) -> bool {
		let (dx, dy) = (self.x - x, self.y - y);
		dx * dx + dy * dy <= self.size * self.size
	}

	pub fn has_contributor(&self, user_id: &str) -> bool {
		self.contributors.iter().any(|u| u == user_id)
	}
}

/// Logically undirected edge; `source`/`target` only record creation order.
#[derive(Clone, Debug)]
pub struct Connection {
	pub id: ConnectionId,
	pub source: NodeId,
	pub target: NodeId,
	pub label: Option<String>,
	pub color: Option<String>,
	pub label_loading: bool,
}

impl Connection {
	pub fn joins(&self, a: NodeId, b: NodeId) -> bool {
		(self.source == a && self.target == b) || (self.source == b && self.target == a)
	}

	pub fn other(&self, node: NodeId) -> Option<NodeId> {
		if self.source == node {
			Some(self.target)
		} else if self.target == node {
			Some(self.source)
		} else {
			None
		}
	}

	/// Text to draw at the edge midpoint, if any.
	pub fn display_label(&self) -> Option<&str> {
		match self.label.as_deref() {
			Some(text) if !text.is_empty() => Some(text),
			_ if self.label_loading => Some("..."),
			_ => None,
		}
	}
}
