//! The merge step: a revealed candidate either grows an existing species node
//! or becomes a new node wired in by the configured strategy.

use std::collections::HashMap;
use std::f64::consts::TAU;

use log::debug;
use rand::Rng;

use super::colors::{GROUP_EDGE_COLOR, UserColors};
use super::config::{ConnectionStrategy, GraphConfig};
use super::graph::DiscoveryGraph;
use super::ingest::Candidate;
use super::types::{ConnectionId, Node, NodeId};

/// Per-user history of the nodes each user most recently contributed to.
#[derive(Clone, Debug, Default)]
pub struct UserTrails {
	trails: HashMap<String, Vec<NodeId>>,
}

impl UserTrails {
	pub fn record(&mut self, user_id: &str, node: NodeId) {
		let trail = self.trails.entry(user_id.to_owned()).or_default();
		trail.retain(|n| *n != node);
		trail.push(node);
	}

	pub fn latest(&self, user_id: &str) -> Option<NodeId> {
		self.trails.get(user_id)?.last().copied()
	}

	pub fn latest_other(&self, user_id: &str, exclude: NodeId) -> Option<NodeId> {
		self.trails
			.get(user_id)?
			.iter()
			.rev()
			.copied()
			.find(|n| *n != exclude)
	}

	pub fn forget(&mut self, node: NodeId) {
		for trail in self.trails.values_mut() {
			trail.retain(|n| *n != node);
		}
	}

	pub fn clear(&mut self) {
		self.trails.clear();
	}
}

/// What a duplicate sighting did about edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeLink {
	/// Linked to the user's most recent other node.
	Linked(ConnectionId),
	/// The user already sighted this species.
	SameContributor,
	/// The user has no other node yet, so there is nothing to link to.
	NoPriorNode,
	/// The two nodes were already connected.
	AlreadyConnected,
	/// Edges on merge only exist for the by-user strategy.
	NotApplicable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Revealed {
	Created {
		node: NodeId,
		connections: Vec<ConnectionId>,
	},
	Merged {
		node: NodeId,
		link: MergeLink,
	},
}

impl Revealed {
	pub fn node(&self) -> NodeId {
		match self {
			Revealed::Created { node, .. } | Revealed::Merged { node, .. } => *node,
		}
	}

	pub fn new_connections(&self) -> Vec<ConnectionId> {
		match self {
			Revealed::Created { connections, .. } => connections.clone(),
			Revealed::Merged {
				link: MergeLink::Linked(cid),
				..
			} => vec![*cid],
			Revealed::Merged { .. } => Vec::new(),
		}
	}
}

/// Shared mutable context the merge step writes into.
pub struct MergeContext<'a, R> {
	pub graph: &'a mut DiscoveryGraph,
	pub trails: &'a mut UserTrails,
	pub colors: &'a mut UserColors,
	pub config: &'a GraphConfig,
	pub rng: &'a mut R,
}

impl<R: Rng> MergeContext<'_, R> {
	pub fn reveal(&mut self, candidate: &Candidate) -> Revealed {
		match self.graph.node_by_name(&candidate.name) {
			Some(existing) => self.merge(existing, candidate),
			None => self.create(candidate),
		}
	}

	fn merge(&mut self, id: NodeId, candidate: &Candidate) -> Revealed {
		let user = candidate.record.user_id.as_str();
		let Some(node) = self.graph.node_mut(id) else {
			return self.create(candidate);
		};
		if candidate.image.is_some() {
			node.image = candidate.image.clone();
			node.image_src = candidate.image_src.clone();
		}
		if !candidate.species_info.is_placeholder() {
			node.species_info = candidate.species_info.clone();
		}
		node.size = self.config.grow(node.size);
		let known_contributor = node.has_contributor(user);
		if !known_contributor {
			node.contributors.push(user.to_owned());
		}

		let link = if self.config.connection_strategy != ConnectionStrategy::ByUser {
			MergeLink::NotApplicable
		} else if known_contributor {
			MergeLink::SameContributor
		} else {
			match self.trails.latest_other(user, id) {
				None => {
					debug!(
						"'{}' sighted by new user {user} with no other nodes, no link",
						candidate.name
					);
					MergeLink::NoPriorNode
				}
				Some(prior) => {
					let color = self.colors.color_for(user);
					match self.graph.connect(id, prior, Some(color)) {
						Some(cid) => MergeLink::Linked(cid),
						None => MergeLink::AlreadyConnected,
					}
				}
			}
		};
		self.trails.record(user, id);
		Revealed::Merged { node: id, link }
	}

	fn create(&mut self, candidate: &Candidate) -> Revealed {
		let record = &candidate.record;
		let node = Node {
			id: NodeId(0),
			x: candidate.x,
			y: candidate.y,
			vx: 0.0,
			vy: 0.0,
			size: self.config.node_size_min,
			name: candidate.name.clone(),
			scientific_name: record.scientific_name.clone(),
			taxonomic_group: record.taxonomic_group.clone(),
			image: candidate.image.clone(),
			image_src: candidate.image_src.clone(),
			quest_id: record.quest_id.clone(),
			user_id: record.user_id.clone(),
			contributors: vec![record.user_id.clone()],
			species_info: candidate.species_info.clone(),
			timestamp: record.discovery_timestamp,
			selected: false,
			connections: Vec::new(),
		};
		let id = self.graph.insert_node(node);
		let connections = match self.config.connection_strategy {
			ConnectionStrategy::ByUser => self.link_by_user(id, &record.user_id),
			ConnectionStrategy::ByTaxonomicGroup => {
				self.link_by_group(id, &record.taxonomic_group)
			}
		};
		self.trails.record(&record.user_id, id);
		Revealed::Created {
			node: id,
			connections,
		}
	}

	fn link_by_user(&mut self, id: NodeId, user: &str) -> Vec<ConnectionId> {
		let Some(prior) = self.trails.latest(user) else {
			return Vec::new();
		};
		let Some((px, py)) = self.graph.node(prior).map(|n| (n.x, n.y)) else {
			return Vec::new();
		};
		let color = self.colors.color_for(user);
		let Some(cid) = self.graph.connect(prior, id, Some(color)) else {
			return Vec::new();
		};
		let angle = self.rng.gen_range(0.0..TAU);
		if let Some(node) = self.graph.node_mut(id) {
			node.x = px + node.size * angle.cos();
			node.y = py + node.size * angle.sin();
		}
		vec![cid]
	}

	fn link_by_group(&mut self, id: NodeId, group: &str) -> Vec<ConnectionId> {
		if group.is_empty() {
			return Vec::new();
		}
		let targets: Vec<(NodeId, f64, f64)> = self
			.graph
			.nodes()
			.filter(|n| n.id != id && n.taxonomic_group == group)
			.take(self.config.max_group_links)
			.map(|n| (n.id, n.x, n.y))
			.collect();

		let mut connections = Vec::with_capacity(targets.len());
		for (i, (target, tx, ty)) in targets.into_iter().enumerate() {
			if i == 0 {
				let angle = self.rng.gen_range(0.0..TAU);
				let distance = self.config.ideal_node_distance * 0.8;
				if let Some(node) = self.graph.node_mut(id) {
					node.x = tx + distance * angle.cos();
					node.y = ty + distance * angle.sin();
				}
			}
			if let Some(cid) = self.graph.connect(id, target, Some(GROUP_EDGE_COLOR.to_owned())) {
				connections.push(cid);
			}
		}
		connections
	}
}

#[cfg(test)]
mod tests {
	use rand::SeedableRng;
	use rand::rngs::SmallRng;

	use super::*;
	use crate::components::discovery_graph::images::ImageKey;
	use crate::components::discovery_graph::ingest::tests::sighting;
	use crate::components::discovery_graph::types::SpeciesInfo;

	struct Harness {
		graph: DiscoveryGraph,
		trails: UserTrails,
		colors: UserColors,
		config: GraphConfig,
		rng: SmallRng,
	}

	impl Harness {
		fn new(strategy: ConnectionStrategy) -> Self {
			Self {
				graph: DiscoveryGraph::new(),
				trails: UserTrails::default(),
				colors: UserColors::new(),
				config: GraphConfig {
					connection_strategy: strategy,
					..Default::default()
				},
				rng: SmallRng::seed_from_u64(3),
			}
		}

		fn reveal(&mut self, candidate: Candidate) -> Revealed {
			MergeContext {
				graph: &mut self.graph,
				trails: &mut self.trails,
				colors: &mut self.colors,
				config: &self.config,
				rng: &mut self.rng,
			}
			.reveal(&candidate)
		}
	}

	fn candidate(name: &str, user: &str, ts: f64) -> Candidate {
		let record = sighting(name, user, ts);
		Candidate {
			name: record.display_name().to_owned(),
			image: ImageKey::new("q1", &record.image_name),
			image_src: format!("src/{}", record.image_name),
			species_info: SpeciesInfo::placeholder(name, "", ""),
			x: 0.0,
			y: 0.0,
			record,
		}
	}

	fn grouped(name: &str, group: &str, ts: f64) -> Candidate {
		let mut c = candidate(name, "u", ts);
		c.record.taxonomic_group = group.into();
		c
	}

	#[test]
	fn duplicate_species_grows_single_node() {
		let mut h = Harness::new(ConnectionStrategy::ByUser);
		let first = h.reveal(candidate("Robin", "A", 1.0)).node();
		let size_after_first = h.graph.node(first).unwrap().size;
		let second = h.reveal(candidate("Robin", "A", 2.0)).node();
		assert_eq!(first, second);
		assert_eq!(h.graph.node_count(), 1);
		let node = h.graph.node(first).unwrap();
		assert!(node.size > size_after_first);
		assert_eq!(node.image, ImageKey::new("q1", "robin_2.jpg"));
	}

	#[test]
	fn robin_by_two_users_without_prior_nodes_has_no_edge() {
		let mut h = Harness::new(ConnectionStrategy::ByUser);
		h.reveal(candidate("Robin", "A", 1.0));
		let merged = h.reveal(candidate("Robin", "B", 2.0));
		let robin = h.graph.node_by_name("Robin").unwrap();
		assert_eq!(
			merged,
			Revealed::Merged {
				node: robin,
				link: MergeLink::NoPriorNode
			}
		);
		assert_eq!(h.graph.node_count(), 1);
		assert_eq!(h.graph.connection_count(), 0);
		assert_eq!(h.graph.node(robin).unwrap().contributors, vec!["A", "B"]);
		// B's next species chains from Robin
		let crow = h.reveal(candidate("Crow", "B", 3.0));
		let crow_id = crow.node();
		assert_eq!(crow.new_connections().len(), 1);
		assert!(h.graph.connection_between(robin, crow_id).is_some());
	}

	#[test]
	fn duplicate_from_new_user_links_to_their_latest_other_node() {
		let mut h = Harness::new(ConnectionStrategy::ByUser);
		let robin = h.reveal(candidate("Robin", "A", 1.0)).node();
		let wren = h.reveal(candidate("Wren", "B", 2.0)).node();
		let merged = h.reveal(candidate("Robin", "B", 3.0));
		let Revealed::Merged {
			link: MergeLink::Linked(cid),
			..
		} = merged
		else {
			panic!("expected a link, got {merged:?}");
		};
		let conn = h.graph.connection(cid).unwrap();
		assert!(conn.joins(robin, wren));
		assert_eq!(conn.color, Some(h.colors.color_for("B")));
	}

	#[test]
	fn same_user_resighting_adds_no_edge() {
		let mut h = Harness::new(ConnectionStrategy::ByUser);
		h.reveal(candidate("Robin", "A", 1.0));
		h.reveal(candidate("Wren", "A", 2.0));
		let merged = h.reveal(candidate("Robin", "A", 3.0));
		assert!(matches!(
			merged,
			Revealed::Merged {
				link: MergeLink::SameContributor,
				..
			}
		));
		assert_eq!(h.graph.connection_count(), 1);
	}

	#[test]
	fn same_user_distinct_species_form_a_path() {
		let mut h = Harness::new(ConnectionStrategy::ByUser);
		let u1 = h.reveal(candidate("Robin", "U", 1.0)).node();
		let u2 = h.reveal(candidate("Wren", "U", 2.0)).node();
		let u3 = h.reveal(candidate("Crow", "U", 3.0)).node();
		assert_eq!(h.graph.connection_count(), 2);
		assert!(h.graph.connection_between(u1, u2).is_some());
		assert!(h.graph.connection_between(u2, u3).is_some());
		assert!(h.graph.connection_between(u1, u3).is_none());
	}

	#[test]
	fn by_user_places_new_node_on_circle_around_previous() {
		let mut h = Harness::new(ConnectionStrategy::ByUser);
		let a = h.reveal(candidate("Robin", "U", 1.0)).node();
		h.graph.node_mut(a).unwrap().x = 300.0;
		let b = h.reveal(candidate("Wren", "U", 2.0)).node();
		let (na, nb) = (h.graph.node(a).unwrap(), h.graph.node(b).unwrap());
		let d = na.position().distance(nb.position());
		assert!((d - nb.size).abs() < 1e-9);
	}

	#[test]
	fn other_users_do_not_chain() {
		let mut h = Harness::new(ConnectionStrategy::ByUser);
		h.reveal(candidate("Robin", "A", 1.0));
		h.reveal(candidate("Wren", "B", 2.0));
		assert_eq!(h.graph.connection_count(), 0);
	}

	#[test]
	fn by_group_links_a_bounded_number_of_same_group_nodes() {
		let mut h = Harness::new(ConnectionStrategy::ByTaxonomicGroup);
		for (i, name) in ["Robin", "Wren", "Crow", "Jay"].into_iter().enumerate() {
			h.reveal(grouped(name, "Aves", i as f64));
		}
		h.reveal(grouped("Oak", "Plantae", 10.0));
		let finch = h.reveal(grouped("Finch", "Aves", 11.0));
		// Wren: 1, Crow: 2, Jay: 3, Finch: capped at 3
		assert_eq!(finch.new_connections().len(), 3);
		assert_eq!(h.graph.connection_count(), 1 + 2 + 3 + 3);
		let oak = h.graph.node_by_name("Oak").unwrap();
		assert_eq!(h.graph.node(oak).unwrap().connections.len(), 0);
		for cid in finch.new_connections() {
			assert_eq!(
				h.graph.connection(cid).unwrap().color.as_deref(),
				Some(GROUP_EDGE_COLOR)
			);
		}
	}

	#[test]
	fn by_group_ignores_empty_groups_and_merges_without_edges() {
		let mut h = Harness::new(ConnectionStrategy::ByTaxonomicGroup);
		h.reveal(grouped("Robin", "", 1.0));
		h.reveal(grouped("Wren", "", 2.0));
		assert_eq!(h.graph.connection_count(), 0);
		let merged = h.reveal(grouped("Robin", "", 3.0));
		assert!(matches!(
			merged,
			Revealed::Merged {
				link: MergeLink::NotApplicable,
				..
			}
		));
	}

	#[test]
	fn trails_track_most_recent_contribution() {
		let mut trails = UserTrails::default();
		trails.record("u", NodeId(1));
		trails.record("u", NodeId(2));
		trails.record("u", NodeId(1));
		assert_eq!(trails.latest("u"), Some(NodeId(1)));
		assert_eq!(trails.latest_other("u", NodeId(1)), Some(NodeId(2)));
		trails.forget(NodeId(2));
		assert_eq!(trails.latest_other("u", NodeId(1)), None);
	}
}
