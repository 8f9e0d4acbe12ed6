//! Mouse and touch input folded into one gesture state machine.

use super::graph::DiscoveryGraph;
use super::types::{NodeId, Point};
use super::viewport::Viewport;

#[derive(Clone, Debug, PartialEq)]
pub enum Gesture {
	Idle,
	Panning {
		last: Point,
	},
	DraggingNode {
		node: NodeId,
		/// Node position minus pointer position, in graph space.
		offset: Point,
		pressed_at: Point,
		moved: bool,
	},
	PinchZooming {
		distance: f64,
		center: Point,
	},
}

#[derive(Clone, Debug)]
pub struct Interaction {
	gesture: Gesture,
	pub viewport: Viewport,
	click_tolerance: f64,
}

impl Interaction {
	pub fn new(viewport: Viewport, click_tolerance: f64) -> Self {
		Self {
			gesture: Gesture::Idle,
			viewport,
			click_tolerance,
		}
	}

	/// The node whose position is currently pointer-driven.
	pub fn dragged_node(&self) -> Option<NodeId> {
		match self.gesture {
			Gesture::DraggingNode { node, .. } => Some(node),
			_ => None,
		}
	}

	pub fn is_grabbing(&self) -> bool {
		!matches!(self.gesture, Gesture::Idle)
	}

	pub fn pointer_down(&mut self, at: Point, graph: &mut DiscoveryGraph) {
		self.release(graph);
		let in_graph = self.viewport.screen_to_graph(at);
		self.gesture = match graph.node_at(in_graph) {
			Some(node) => {
				graph.set_selected(node, true);
				let position = graph.node(node).map(|n| n.position()).unwrap_or(in_graph);
				Gesture::DraggingNode {
					node,
					offset: Point::new(position.x - in_graph.x, position.y - in_graph.y),
					pressed_at: at,
					moved: false,
				}
			}
			None => Gesture::Panning { last: at },
		};
	}

	pub fn pointer_move(&mut self, at: Point, graph: &mut DiscoveryGraph) {
		match &mut self.gesture {
			Gesture::Panning { last } => {
				self.viewport.pan_by(at.x - last.x, at.y - last.y);
				*last = at;
			}
			Gesture::DraggingNode {
				node,
				offset,
				pressed_at,
				moved,
			} => {
				if at.distance(*pressed_at) > self.click_tolerance {
					*moved = true;
				}
				let in_graph = self.viewport.screen_to_graph(at);
				if let Some(n) = graph.node_mut(*node) {
					n.x = in_graph.x + offset.x;
					n.y = in_graph.y + offset.y;
					n.vx = 0.0;
					n.vy = 0.0;
				}
			}
			Gesture::Idle | Gesture::PinchZooming { .. } => {}
		}
	}

	/// Ends the gesture; returns the clicked node if a node was pressed and
	/// the pointer stayed within the click tolerance.
	pub fn pointer_up(&mut self, graph: &mut DiscoveryGraph) -> Option<NodeId> {
		let clicked = match self.gesture {
			Gesture::DraggingNode {
				node, moved: false, ..
			} => Some(node),
			_ => None,
		};
		self.release(graph);
		clicked
	}

	/// Pointer left the canvas: end the gesture without a click.
	pub fn pointer_leave(&mut self, graph: &mut DiscoveryGraph) {
		self.release(graph);
	}

	pub fn touch_start(&mut self, touches: &[Point], graph: &mut DiscoveryGraph) {
		match touches {
			[] => {}
			[single] => self.pointer_down(*single, graph),
			[first, second, ..] => self.start_pinch(*first, *second, graph),
		}
	}

	pub fn touch_move(&mut self, touches: &[Point], graph: &mut DiscoveryGraph) {
		match touches {
			[] => {}
			[single] => self.pointer_move(*single, graph),
			[first, second, ..] => {
				let Gesture::PinchZooming { distance, center } = self.gesture else {
					self.start_pinch(*first, *second, graph);
					return;
				};
				let (new_distance, new_center) = (first.distance(*second), first.midpoint(*second));
				if distance > 0.0 {
					let zoom = self.viewport.zoom * (new_distance / distance);
					self.viewport.zoom_about(center, zoom);
				}
				self.viewport
					.pan_by(new_center.x - center.x, new_center.y - center.y);
				self.gesture = Gesture::PinchZooming {
					distance: new_distance,
					center: new_center,
				};
			}
		}
	}

	/// `remaining` are the touches still on the surface.
	pub fn touch_end(&mut self, remaining: &[Point], graph: &mut DiscoveryGraph) -> Option<NodeId> {
		let pinching = matches!(self.gesture, Gesture::PinchZooming { .. });
		match remaining {
			[] => self.pointer_up(graph),
			[single] if pinching => {
				self.gesture = Gesture::Panning { last: *single };
				None
			}
			[first, second, ..] => {
				self.start_pinch(*first, *second, graph);
				None
			}
			_ => None,
		}
	}

	pub fn touch_cancel(&mut self, graph: &mut DiscoveryGraph) {
		self.release(graph);
	}

	pub fn wheel(&mut self, cursor: Point, delta_y: f64, zoom_factor: f64) {
		self.viewport.wheel(cursor, delta_y, zoom_factor);
	}

	fn start_pinch(&mut self, first: Point, second: Point, graph: &mut DiscoveryGraph) {
		self.release(graph);
		self.gesture = Gesture::PinchZooming {
			distance: first.distance(second),
			center: first.midpoint(second),
		};
	}

	fn release(&mut self, graph: &mut DiscoveryGraph) {
		if let Gesture::DraggingNode { node, .. } = self.gesture {
			graph.set_selected(node, false);
		}
		self.gesture = Gesture::Idle;
	}
}

#[cfg(test)]
impl Interaction {
	pub fn gesture(&self) -> &Gesture {
		&self.gesture
	}
}
