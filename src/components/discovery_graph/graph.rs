use std::collections::HashMap;

use indexmap::IndexMap;
use log::warn;

use super::types::{Connection, ConnectionId, Node, NodeId, Point};

/// Arena of live nodes and connections. Both maps keep insertion order, which
/// is also draw order (later nodes are drawn on top).
#[derive(Clone, Debug, Default)]
pub struct DiscoveryGraph {
	nodes: IndexMap<NodeId, Node>,
	connections: IndexMap<ConnectionId, Connection>,
	by_name: HashMap<String, NodeId>,
	next_node: u32,
	next_connection: u32,
}

impl DiscoveryGraph {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> {
		self.nodes.values()
	}

	pub fn connections(&self) -> impl Iterator<Item = &Connection> {
		self.connections.values()
	}

	pub fn node(&self, id: NodeId) -> Option<&Node> {
		self.nodes.get(&id)
	}

	pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
		self.nodes.get_mut(&id)
	}

	pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
		self.connections.get(&id)
	}

	pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
		self.connections.get_mut(&id)
	}

	pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
		self.by_name.get(name).copied()
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Appends `node`, assigning its id. A node whose name is already live is
	/// not inserted; the existing id is returned instead.
	pub fn insert_node(&mut self, mut node: Node) -> NodeId {
		if let Some(existing) = self.node_by_name(&node.name) {
			warn!("node '{}' already present, not inserting a duplicate", node.name);
			return existing;
		}
		let id = NodeId(self.next_node);
		self.next_node += 1;
		node.id = id;
		node.connections.clear();
		self.by_name.insert(node.name.clone(), id);
		self.nodes.insert(id, node);
		id
	}

	pub fn connection_between(&self, a: NodeId, b: NodeId) -> Option<ConnectionId> {
		let node = self.nodes.get(&a)?;
		node.connections
			.iter()
			.copied()
			.find(|cid| self.connections.get(cid).is_some_and(|c| c.joins(a, b)))
	}

	/// Appends an edge between two distinct live nodes that are not yet connected.
	pub fn connect(
		&mut self,
		source: NodeId,
		target: NodeId,
		color: Option<String>,
	) -> Option<ConnectionId> {
		if source == target
			|| !self.nodes.contains_key(&source)
			|| !self.nodes.contains_key(&target)
			|| self.connection_between(source, target).is_some()
		{
			return None;
		}
		let id = ConnectionId(self.next_connection);
		self.next_connection += 1;
		self.connections.insert(
			id,
			Connection {
				id,
				source,
				target,
				label: None,
				color,
				label_loading: false,
			},
		);
		for end in [source, target] {
			if let Some(node) = self.nodes.get_mut(&end) {
				node.connections.push(id);
			}
		}
		Some(id)
	}

	/// Detaches every incident connection, then removes the node.
	pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
		let incident = self.nodes.get(&id)?.connections.clone();
		for cid in incident {
			let Some(conn) = self.connections.shift_remove(&cid) else {
				continue;
			};
			if let Some(other) = conn.other(id).and_then(|o| self.nodes.get_mut(&o)) {
				other.connections.retain(|c| *c != cid);
			}
		}
		let mut node = self.nodes.shift_remove(&id)?;
		node.connections.clear();
		self.by_name.remove(&node.name);
		Some(node)
	}

	/// Topmost (most recently added) node containing the graph-space point.
	pub fn node_at(&self, at: Point) -> Option<NodeId> {
		self.nodes
			.values()
			.rev()
			.find(|node| node.contains(at.x, at.y))
			.map(|node| node.id)
	}

	pub fn set_selected(&mut self, id: NodeId, selected: bool) {
		if let Some(node) = self.nodes.get_mut(&id) {
			node.selected = selected;
		}
	}

	pub fn clear(&mut self) {
		self.nodes.clear();
		self.connections.clear();
		self.by_name.clear();
	}

	pub(super) fn parts_mut(
		&mut self,
	) -> (&mut IndexMap<NodeId, Node>, &IndexMap<ConnectionId, Connection>) {
		(&mut self.nodes, &self.connections)
	}
}

#[cfg(test)]
impl DiscoveryGraph {
	pub fn connection_count(&self) -> usize {
		self.connections.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
		self.nodes
			.get(&id)
			.into_iter()
			.flat_map(|node| node.connections.iter())
			.filter_map(move |cid| self.connections.get(cid)?.other(id))
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::components::discovery_graph::types::SpeciesInfo;

	pub(crate) fn species(name: &str, x: f64, y: f64) -> Node {
		Node {
			id: NodeId(u32::MAX),
			x,
			y,
			vx: 0.0,
			vy: 0.0,
			size: 50.0,
			name: name.into(),
			scientific_name: String::new(),
			taxonomic_group: String::new(),
			image: None,
			image_src: String::new(),
			quest_id: "q1".into(),
			user_id: "u1".into(),
			contributors: vec!["u1".into()],
			species_info: SpeciesInfo::default(),
			timestamp: 0.0,
			selected: false,
			connections: Vec::new(),
		}
	}

	#[test]
	fn names_are_unique() {
		let mut graph = DiscoveryGraph::new();
		let a = graph.insert_node(species("Robin", 0.0, 0.0));
		let again = graph.insert_node(species("Robin", 10.0, 0.0));
		assert_eq!(a, again);
		assert_eq!(graph.node_count(), 1);
		assert_eq!(graph.node_by_name("Robin"), Some(a));
	}

	#[test]
	fn connect_rejects_self_and_duplicates() {
		let mut graph = DiscoveryGraph::new();
		let a = graph.insert_node(species("Robin", 0.0, 0.0));
		let b = graph.insert_node(species("Crow", 0.0, 0.0));
		assert!(graph.connect(a, a, None).is_none());
		let ab = graph.connect(a, b, None).unwrap();
		assert!(graph.connect(b, a, None).is_none());
		assert_eq!(graph.connection_between(b, a), Some(ab));
		assert_eq!(graph.neighbors(a).collect::<Vec<_>>(), vec![b]);
		assert_eq!(graph.neighbors(b).collect::<Vec<_>>(), vec![a]);
	}

	#[test]
	fn removing_a_node_detaches_its_edges() {
		let mut graph = DiscoveryGraph::new();
		let a = graph.insert_node(species("Robin", 0.0, 0.0));
		let b = graph.insert_node(species("Crow", 0.0, 0.0));
		let c = graph.insert_node(species("Wren", 0.0, 0.0));
		graph.connect(a, b, None).unwrap();
		let bc = graph.connect(b, c, None).unwrap();
		graph.remove_node(a).unwrap();
		assert_eq!(graph.connection_count(), 1);
		assert_eq!(graph.node(b).unwrap().connections, vec![bc]);
		assert_eq!(graph.node_by_name("Robin"), None);
		// the name is free again
		let a2 = graph.insert_node(species("Robin", 0.0, 0.0));
		assert_ne!(a, a2);
	}

	#[test]
	fn topmost_node_wins_hit_test() {
		let mut graph = DiscoveryGraph::new();
		let _below = graph.insert_node(species("Robin", 0.0, 0.0));
		let above = graph.insert_node(species("Crow", 20.0, 0.0));
		assert_eq!(graph.node_at(Point::new(10.0, 0.0)), Some(above));
		assert_eq!(graph.node_at(Point::new(500.0, 0.0)), None);
	}
}
