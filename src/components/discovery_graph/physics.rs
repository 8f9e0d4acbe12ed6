use super::config::GraphConfig;
use super::graph::DiscoveryGraph;
use super::types::NodeId;

/// Direction used when two nodes sit exactly on top of each other.
const COINCIDENT_DIRECTION: (f64, f64) = (0.05, 0.05);

/// One simulation tick: pairwise repulsion, edge attraction, then integration.
/// `pinned` (the node under the pointer) still pushes and pulls its
/// neighbours but does not move on its own.
pub fn apply_forces(graph: &mut DiscoveryGraph, config: &GraphConfig, pinned: Option<NodeId>) {
	let (nodes, connections) = graph.parts_mut();
	let count = nodes.len();
	if count == 0 {
		return;
	}

	let bodies: Vec<(f64, f64, f64)> = nodes.values().map(|n| (n.x, n.y, n.size)).collect();
	let mut dv = vec![(0.0f64, 0.0f64); count];

	for i in 0..count {
		let (ax, ay, ar) = bodies[i];
		for j in (i + 1)..count {
			let (bx, by, br) = bodies[j];
			let (dx, dy) = (bx - ax, by - ay);
			let dist_sq = dx * dx + dy * dy;
			let min_distance = ar + br + config.repulsion_margin;
			if dist_sq >= min_distance * min_distance {
				continue;
			}
			let distance = dist_sq.sqrt();
			let (ux, uy) = if distance > 0.0 {
				(dx / distance, dy / distance)
			} else {
				COINCIDENT_DIRECTION
			};
			let force = config.repulsion_strength * (min_distance - distance);
			dv[j].0 += ux * force;
			dv[j].1 += uy * force;
			dv[i].0 -= ux * force;
			dv[i].1 -= uy * force;
		}
	}

	for conn in connections.values() {
		let (Some(i), Some(j)) = (
			nodes.get_index_of(&conn.source),
			nodes.get_index_of(&conn.target),
		) else {
			continue;
		};
		let ((ax, ay, ar), (bx, by, br)) = (bodies[i], bodies[j]);
		let (dx, dy) = (bx - ax, by - ay);
		let distance = (dx * dx + dy * dy).sqrt();
		let diff = distance - (ar + br + config.ideal_node_distance);
		if diff.abs() <= config.attraction_threshold || distance == 0.0 {
			continue;
		}
		let (ux, uy) = (dx / distance, dy / distance);
		let force = config.attraction_strength * diff;
		dv[j].0 -= ux * force;
		dv[j].1 -= uy * force;
		dv[i].0 += ux * force;
		dv[i].1 += uy * force;
	}

	for (node, (dvx, dvy)) in nodes.values_mut().zip(dv) {
		if Some(node.id) == pinned {
			node.vx = 0.0;
			node.vy = 0.0;
			continue;
		}
		node.vx += dvx;
		node.vy += dvy;
		node.integrate(config.damping);
	}
}
