use std::collections::HashMap;

use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

use super::api::LabelError;
use super::colors::UserColors;
use super::config::{GraphConfig, RevealMode};
use super::graph::DiscoveryGraph;
use super::images::{ImageCache, ImageKey};
use super::ingest::{Candidate, QuestBatch, build_candidates};
use super::interaction::Interaction;
use super::labels::{LabelBatcher, LabelCache, LabelRequest, PairKey};
use super::merge::{MergeContext, Revealed, UserTrails};
use super::physics;
use super::render::{self, Scene};
use super::scheduler::{RevealAction, RevealScheduler};
use super::types::{ConnectionId, Node, NodeId, Point, SpeciesInfo};
use super::viewport::Viewport;

/// Caches that outlive a single graph and are handed in by the host.
pub struct GraphCaches<I> {
	pub labels: LabelCache,
	pub images: ImageCache<I>,
}

impl<I> GraphCaches<I> {
	pub fn from_config(config: &GraphConfig) -> Self {
		Self {
			labels: LabelCache::new(config.label_cache_capacity),
			images: ImageCache::new(config.image_cache_capacity),
		}
	}
}

/// Payload delivered to the host when a node is clicked.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeClick {
	pub node: NodeId,
	pub name: String,
	pub scientific_name: String,
	/// Discovery time of the sighting that created the node, in seconds.
	pub timestamp: f64,
	pub species: SpeciesInfo,
	pub quest_id: String,
	pub user_id: String,
	pub image_src: String,
}

impl NodeClick {
	fn from_node(node: &Node) -> Self {
		Self {
			node: node.id,
			name: node.name.clone(),
			scientific_name: node.scientific_name.clone(),
			timestamp: node.timestamp,
			species: node.species_info.clone(),
			quest_id: node.quest_id.clone(),
			user_id: node.user_id.clone(),
			image_src: node.image_src.clone(),
		}
	}
}

/// An image the host should start decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRequest {
	pub key: ImageKey,
	pub src: String,
}

pub struct DiscoveryGraphState<I> {
	pub graph: DiscoveryGraph,
	pub interaction: Interaction,
	pub config: GraphConfig,
	pub labels: LabelBatcher,
	pub images: ImageCache<I>,
	pub width: f64,
	pub height: f64,
	colors: UserColors,
	trails: UserTrails,
	scheduler: RevealScheduler,
	/// Created nodes in reveal order; hidden from the back.
	revealed: Vec<NodeId>,
	rng: SmallRng,
	image_requests: Vec<ImageRequest>,
	clicks: Vec<NodeClick>,
	labels_queued: bool,
}

impl<I> DiscoveryGraphState<I> {
	pub fn new(
		batches: &[QuestBatch],
		config: GraphConfig,
		caches: GraphCaches<I>,
		seed: u64,
		width: f64,
		height: f64,
	) -> Self {
		let mut rng = SmallRng::seed_from_u64(seed);
		let candidates = build_candidates(batches, &config, &mut rng, width, height);
		info!(
			"discovery graph: {} sightings, mode {:?}, strategy {:?}",
			candidates.len(),
			config.reveal_mode,
			config.connection_strategy
		);
		Self {
			graph: DiscoveryGraph::new(),
			interaction: Interaction::new(
				Viewport::for_canvas(&config, width, height),
				config.click_tolerance_px,
			),
			labels: LabelBatcher::new(caches.labels, config.label_batch_max),
			images: caches.images,
			width,
			height,
			colors: UserColors::new(),
			trails: UserTrails::default(),
			scheduler: RevealScheduler::new(candidates, &config),
			revealed: Vec::new(),
			rng,
			image_requests: Vec::new(),
			clicks: Vec::new(),
			labels_queued: false,
			config,
		}
	}

	/// Hands the caches back so a rebuilt graph keeps what was already fetched.
	pub fn into_caches(self) -> GraphCaches<I> {
		GraphCaches {
			labels: self.labels.into_cache(),
			images: self.images,
		}
	}

	/// Kicks off the reveal. In final mode the whole graph is built here and
	/// `None` is returned; otherwise returns the delay before the first [`Self::step`].
	pub fn start(&mut self) -> Option<f64> {
		if self.scheduler.mode() == RevealMode::Final {
			while self.step().is_some() {}
			debug!("revealed {} nodes at once", self.graph.node_count());
			return None;
		}
		self.step()
	}

	/// Performs one scheduled action; returns the delay before the next one.
	pub fn step(&mut self) -> Option<f64> {
		let (action, delay) = self.scheduler.advance(self.revealed.len())?;
		match action {
			RevealAction::Wait => {}
			RevealAction::Reveal(candidate) => self.reveal(&candidate),
			RevealAction::Hide => self.hide_latest(),
			RevealAction::Restart => self.restart(),
		}
		Some(delay)
	}

	fn reveal(&mut self, candidate: &Candidate) {
		let revealed = MergeContext {
			graph: &mut self.graph,
			trails: &mut self.trails,
			colors: &mut self.colors,
			config: &self.config,
			rng: &mut self.rng,
		}
		.reveal(candidate);
		let node = revealed.node();
		for connection in revealed.new_connections() {
			self.request_label(connection);
		}
		self.request_image(node);
		if let Revealed::Created { .. } = revealed {
			self.revealed.push(node);
			if self.scheduler.mode() == RevealMode::Auto {
				if let Some(n) = self.graph.node(node) {
					self.clicks.push(NodeClick::from_node(n));
				}
			}
		}
	}

	fn hide_latest(&mut self) {
		let Some(id) = self.revealed.pop() else {
			return;
		};
		if self.interaction.dragged_node() == Some(id) {
			self.interaction.pointer_leave(&mut self.graph);
		}
		self.graph.remove_node(id);
		self.trails.forget(id);
	}

	fn restart(&mut self) {
		debug!("restarting reveal cycle");
		self.interaction.pointer_leave(&mut self.graph);
		self.graph.clear();
		self.trails.clear();
		self.revealed.clear();
	}

	fn request_label(&mut self, id: ConnectionId) {
		if !self.config.show_labels {
			return;
		}
		let Some(pair) = self.graph.connection(id).and_then(|c| {
			let (a, b) = (self.graph.node(c.source)?, self.graph.node(c.target)?);
			(a.name != b.name).then(|| PairKey::new(&a.name, &b.name))
		}) else {
			return;
		};
		let request = self.labels.enqueue(pair, id);
		let Some(connection) = self.graph.connection_mut(id) else {
			return;
		};
		match request {
			LabelRequest::Cached(label) => {
				connection.label = (!label.is_empty()).then_some(label);
				connection.label_loading = false;
			}
			LabelRequest::Queued => {
				connection.label_loading = true;
				self.labels_queued = true;
			}
			LabelRequest::Joined => connection.label_loading = true,
		}
	}

	fn request_image(&mut self, id: NodeId) {
		let Some(node) = self.graph.node(id) else {
			return;
		};
		let Some(key) = node.image.clone() else {
			return;
		};
		if self.images.request(&key) {
			self.image_requests.push(ImageRequest {
				key,
				src: node.image_src.clone(),
			});
		}
	}

	/// True once after any new pair was queued; the host then restarts its debounce.
	pub fn take_labels_queued(&mut self) -> bool {
		std::mem::take(&mut self.labels_queued)
	}

	pub fn flush_labels(&mut self) -> Vec<Vec<PairKey>> {
		self.labels.flush()
	}

	pub fn complete_label_batch(
		&mut self,
		batch: &[PairKey],
		result: Result<HashMap<PairKey, String>, LabelError>,
	) {
		let updates = match result {
			Ok(labels) => self.labels.complete(batch, &labels),
			Err(err) => {
				warn!("label batch of {} pairs failed: {err}", batch.len());
				self.labels.fail(batch)
			}
		};
		for (id, label) in updates {
			// the connection may have been removed while the request was out
			if let Some(connection) = self.graph.connection_mut(id) {
				connection.label = (!label.is_empty()).then_some(label);
				connection.label_loading = false;
			}
		}
	}

	pub fn take_image_requests(&mut self) -> Vec<ImageRequest> {
		std::mem::take(&mut self.image_requests)
	}

	pub fn image_loaded(&mut self, key: &ImageKey, image: I) {
		self.images.finish(key, image);
	}

	pub fn image_failed(&mut self, key: &ImageKey) {
		debug!("image {}/{} failed to load", key.quest_id, key.filename);
		self.images.fail(key);
	}

	/// Clicks produced by the reveal itself (auto mode).
	pub fn take_clicks(&mut self) -> Vec<NodeClick> {
		std::mem::take(&mut self.clicks)
	}

	pub fn tick(&mut self) {
		physics::apply_forces(&mut self.graph, &self.config, self.interaction.dragged_node());
	}

	fn click(&self, id: NodeId) -> Option<NodeClick> {
		self.graph.node(id).map(NodeClick::from_node)
	}

	pub fn pointer_down(&mut self, at: Point) {
		self.interaction.pointer_down(at, &mut self.graph);
	}

	pub fn pointer_move(&mut self, at: Point) {
		self.interaction.pointer_move(at, &mut self.graph);
	}

	pub fn pointer_up(&mut self) -> Option<NodeClick> {
		let id = self.interaction.pointer_up(&mut self.graph)?;
		self.click(id)
	}

	pub fn pointer_leave(&mut self) {
		self.interaction.pointer_leave(&mut self.graph);
	}

	pub fn touch_start(&mut self, touches: &[Point]) {
		self.interaction.touch_start(touches, &mut self.graph);
	}

	pub fn touch_move(&mut self, touches: &[Point]) {
		self.interaction.touch_move(touches, &mut self.graph);
	}

	pub fn touch_end(&mut self, remaining: &[Point]) -> Option<NodeClick> {
		let id = self.interaction.touch_end(remaining, &mut self.graph)?;
		self.click(id)
	}

	pub fn touch_cancel(&mut self) {
		self.interaction.touch_cancel(&mut self.graph);
	}

	pub fn wheel(&mut self, cursor: Point, delta_y: f64) {
		self.interaction.wheel(cursor, delta_y, self.config.zoom_factor);
	}

	fn center(&self) -> Point {
		Point::new(self.width / 2.0, self.height / 2.0)
	}

	pub fn zoom_in(&mut self) {
		let center = self.center();
		self.interaction.viewport.zoom_in(center);
	}

	pub fn zoom_out(&mut self) {
		let center = self.center();
		self.interaction
			.viewport
			.zoom_out(center, self.config.zoom_out_floor);
	}

	pub fn reset_view(&mut self) {
		self.interaction.viewport.reset();
	}

	pub fn zoom(&self) -> f64 {
		self.interaction.viewport.zoom
	}

	pub fn zoom_percent(&self) -> u32 {
		self.interaction.viewport.zoom_percent()
	}

	pub fn pan_offset(&self) -> Point {
		self.interaction.viewport.pan
	}

	pub fn is_grabbing(&self) -> bool {
		self.interaction.is_grabbing()
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

impl DiscoveryGraphState<HtmlImageElement> {
	/// Advances physics one tick and draws the frame.
	pub fn render_frame(&mut self, ctx: &CanvasRenderingContext2d) {
		self.tick();
		let scene = Scene {
			graph: &self.graph,
			viewport: &self.interaction.viewport,
			images: &self.images,
			config: &self.config,
			width: self.width,
			height: self.height,
		};
		render::render(&scene, ctx);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::discovery_graph::config::ConnectionStrategy;
	use crate::components::discovery_graph::ingest::tests::sighting;

	fn quest(sightings: &[(&str, &str, f64)]) -> Vec<QuestBatch> {
		vec![QuestBatch {
			quest_id: "q1".into(),
			user_id: "owner".into(),
			sightings: sightings
				.iter()
				.map(|(name, user, ts)| sighting(name, user, *ts))
				.collect(),
			history: HashMap::new(),
		}]
	}

	fn state(batches: &[QuestBatch], mode: RevealMode) -> DiscoveryGraphState<()> {
		let config = GraphConfig {
			reveal_mode: mode,
			connection_strategy: ConnectionStrategy::ByUser,
			..Default::default()
		};
		let caches = GraphCaches::from_config(&config);
		DiscoveryGraphState::new(batches, config, caches, 42, 800.0, 600.0)
	}

	fn steps_until_graph_has(s: &mut DiscoveryGraphState<()>, nodes: usize) {
		while s.graph.node_count() < nodes {
			assert!(s.step().is_some(), "schedule ended early");
		}
	}

	fn answer_all(batch: &[PairKey]) -> HashMap<PairKey, String> {
		batch
			.iter()
			.map(|pair| {
				let (a, b) = pair.names();
				(pair.clone(), format!("{a}~{b}"))
			})
			.collect()
	}

	#[test]
	fn final_mode_builds_everything_on_start() {
		let batches = quest(&[("Robin", "A", 1.0), ("Wren", "A", 5.0), ("Robin", "A", 9.0)]);
		let mut s = state(&batches, RevealMode::Final);
		assert_eq!(s.start(), None);
		assert_eq!(s.graph.node_count(), 2);
		let robin = s.graph.node_by_name("Robin").unwrap();
		assert!(s.graph.node(robin).unwrap().size > s.config.node_size_min);
		assert!(s.take_clicks().is_empty());
	}

	#[test]
	fn path_labels_are_fetched_once_per_pair() {
		let batches = quest(&[("Robin", "U", 1.0), ("Wren", "U", 2.0), ("Crow", "U", 3.0)]);
		let mut s = state(&batches, RevealMode::Auto);
		s.start();
		steps_until_graph_has(&mut s, 3);
		assert_eq!(s.graph.connection_count(), 2);
		assert!(s.take_labels_queued());
		assert!(s.graph.connections().all(|c| c.display_label() == Some("...")));

		let batches = s.flush_labels();
		assert_eq!(batches.len(), 1);
		assert_eq!(batches[0].len(), 2);
		s.complete_label_batch(&batches[0], Ok(answer_all(&batches[0])));
		assert!(s.graph.connections().all(|c| !c.label_loading && c.label.is_some()));

		// run the hide phase to empty and go round again
		while s.step().is_some() && !s.graph.is_empty() {}
		steps_until_graph_has(&mut s, 3);
		assert!(!s.take_labels_queued());
		assert!(s.flush_labels().is_empty());
		let labels: Vec<_> = s.graph.connections().map(|c| c.label.clone()).collect();
		assert_eq!(
			labels,
			vec![Some("Robin~Wren".to_owned()), Some("Crow~Wren".to_owned())]
		);
	}

	#[test]
	fn auto_removal_detaches_connections_first() {
		let batches = quest(&[("Robin", "U", 1.0), ("Wren", "U", 2.0), ("Crow", "U", 3.0)]);
		let mut s = state(&batches, RevealMode::Auto);
		s.start();
		steps_until_graph_has(&mut s, 3);
		assert_eq!(s.take_clicks().len(), 3);

		s.step(); // pause before removal
		s.step();
		assert_eq!(s.graph.node_count(), 2);
		assert!(s.graph.node_by_name("Crow").is_none());
		assert_eq!(s.graph.connection_count(), 1);
		let wren = s.graph.node_by_name("Wren").unwrap();
		assert_eq!(s.graph.node(wren).unwrap().connections.len(), 1);

		s.step();
		s.step();
		assert!(s.graph.is_empty());
		assert_eq!(s.graph.connection_count(), 0);
	}

	#[test]
	fn hidden_nodes_come_back_fresh_next_cycle() {
		let batches = quest(&[("Robin", "U", 1.0), ("Wren", "U", 2.0), ("Robin", "V", 3.0)]);
		let mut s = state(&batches, RevealMode::Auto);
		s.start();
		steps_until_graph_has(&mut s, 2);
		s.step();
		let robin = s.graph.node_by_name("Robin").unwrap();
		assert!(s.graph.node(robin).unwrap().size > s.config.node_size_min);

		while s.step().is_some() && !s.graph.is_empty() {}
		steps_until_graph_has(&mut s, 1);
		let robin = s.graph.node_by_name("Robin").unwrap();
		let node = s.graph.node(robin).unwrap();
		assert_eq!(node.size, s.config.node_size_min);
		assert_eq!(node.contributors.len(), 1);
	}

	#[test]
	fn failed_batch_leaves_edges_unlabeled() {
		let batches = quest(&[("Robin", "U", 1.0), ("Wren", "U", 2.0)]);
		let mut s = state(&batches, RevealMode::Final);
		s.start();
		let batch = s.flush_labels().remove(0);
		s.complete_label_batch(&batch, Err(LabelError::Rejected("busy".into())));
		let connection = s.graph.connections().next().unwrap();
		assert_eq!(connection.display_label(), None);
		assert!(s.labels.cache().is_empty());
	}

	#[test]
	fn images_are_requested_once_per_key() {
		let batches = quest(&[("Robin", "U", 1.0), ("Wren", "U", 2.0)]);
		let mut s = state(&batches, RevealMode::Final);
		s.start();
		let requests = s.take_image_requests();
		assert_eq!(requests.len(), 2);
		assert!(s.take_image_requests().is_empty());
		s.image_loaded(&requests[0].key, ());
		s.image_failed(&requests[1].key);
		assert!(s.images.ready(&requests[0].key).is_some());
		assert!(s.images.ready(&requests[1].key).is_none());
	}

	#[test]
	fn clicking_a_node_reports_its_species() {
		let mut batches = quest(&[("Robin", "A", 1.0)]);
		batches[0].sightings[0].scientific_name = "Erithacus rubecula".into();
		let mut s = state(&batches, RevealMode::Final);
		s.start();
		let robin = s.graph.node_by_name("Robin").unwrap();
		let at = s
			.interaction
			.viewport
			.graph_to_screen(s.graph.node(robin).unwrap().position());
		s.pointer_down(at);
		s.tick();
		let click = s.pointer_up().unwrap();
		assert_eq!(click.node, robin);
		assert_eq!(click.name, "Robin");
		assert_eq!(click.quest_id, "q1");
		assert_eq!(click.user_id, "A");
		assert_eq!(click.scientific_name, "Erithacus rubecula");
		assert_eq!(click.timestamp, 1.0);
	}

	#[test]
	fn panning_grabs_and_moves_the_view() {
		let mut s = state(&[], RevealMode::Final);
		assert!(!s.is_grabbing());
		s.pointer_down(Point::new(10.0, 10.0));
		assert!(s.is_grabbing());
		s.pointer_move(Point::new(40.0, 30.0));
		assert_eq!(s.pan_offset(), Point::new(430.0, 320.0));
		assert_eq!(s.pointer_up(), None);
		assert!(!s.is_grabbing());

		s.wheel(Point::new(430.0, 320.0), -100.0);
		assert!((s.zoom() - 0.6).abs() < 1e-9);
		assert_eq!(s.pan_offset(), Point::new(430.0, 320.0));
	}

	#[test]
	fn zoom_controls_work_about_the_centre() {
		let mut s = state(&[], RevealMode::Final);
		assert_eq!(s.zoom_percent(), 50);
		assert_eq!(s.pan_offset(), Point::new(400.0, 300.0));
		s.zoom_in();
		assert!((s.zoom() - 0.6).abs() < 1e-9);
		s.zoom_out();
		s.zoom_out();
		assert_eq!(s.zoom(), 0.5);
		s.reset_view();
		assert_eq!((s.zoom(), s.pan_offset()), (1.0, Point::default()));
	}
}
