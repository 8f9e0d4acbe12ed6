use serde::{Deserialize, Serialize};

/// How nodes are released into the live graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevealMode {
	/// Everything at once, no removal.
	#[default]
	Final,
	/// Timestamp-paced reveal, no removal.
	Explore,
	/// Timestamp-paced reveal, pause, timed removal, repeat.
	Auto,
}

/// How edges are wired when a new species appears.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStrategy {
	/// Chain each user's successive distinct species.
	#[default]
	ByUser,
	/// Link to a few existing species of the same taxonomic group.
	ByTaxonomicGroup,
}

/// Server-side image resolution requested for node thumbnails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
	Icon,
	#[default]
	Thumb,
	Medium,
	Large,
	Full,
}

impl ImageQuality {
	pub fn as_str(self) -> &'static str {
		match self {
			ImageQuality::Icon => "icon",
			ImageQuality::Thumb => "thumb",
			ImageQuality::Medium => "medium",
			ImageQuality::Large => "large",
			ImageQuality::Full => "full",
		}
	}
}

/// Tunables supplied at construction. Distances are graph-space pixels,
/// delays are milliseconds.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
	pub api_url: String,
	pub reveal_mode: RevealMode,
	pub connection_strategy: ConnectionStrategy,
	pub image_quality: ImageQuality,
	/// Sightings at or after this timestamp (seconds) are ignored.
	pub cutoff_time: Option<f64>,

	// reveal pacing
	pub real_time_scaling: f64,
	pub delay_add_min_ms: f64,
	pub delay_add_max_ms: f64,
	pub delay_rem_ms: f64,
	pub delay_wait_for_add_ms: f64,
	pub delay_wait_for_rem_ms: f64,

	// physics
	pub repulsion_strength: f64,
	pub repulsion_margin: f64,
	pub attraction_strength: f64,
	pub attraction_threshold: f64,
	pub ideal_node_distance: f64,
	pub damping: f64,

	// nodes and edges
	pub spawn_radius_factor: f64,
	pub node_size_min: f64,
	pub node_size_max: f64,
	pub node_scaling_factor: f64,
	pub max_group_links: usize,
	pub border_px: f64,
	pub selected_border_px: f64,
	pub connection_width: f64,

	// labels
	pub show_labels: bool,
	pub label_debounce_ms: f64,
	pub label_batch_max: usize,
	pub label_cache_capacity: usize,
	pub image_cache_capacity: usize,

	// viewport
	pub zoom_factor: f64,
	pub min_zoom: f64,
	pub max_zoom: f64,
	pub initial_zoom: f64,
	pub zoom_out_floor: f64,
	pub click_tolerance_px: f64,
}

impl Default for GraphConfig {
	fn default() -> Self {
		Self {
			api_url: String::new(),
			reveal_mode: RevealMode::Final,
			connection_strategy: ConnectionStrategy::ByUser,
			image_quality: ImageQuality::Thumb,
			cutoff_time: None,

			real_time_scaling: 250.0,
			delay_add_min_ms: 2.0,
			delay_add_max_ms: 20.0,
			delay_rem_ms: 50.0,
			delay_wait_for_add_ms: 0.0,
			delay_wait_for_rem_ms: 120_000.0,

			repulsion_strength: 0.02,
			repulsion_margin: 50.0,
			attraction_strength: 0.005,
			attraction_threshold: 1.0,
			ideal_node_distance: 400.0,
			damping: 0.95,

			spawn_radius_factor: 0.3,
			node_size_min: 50.0,
			node_size_max: 999_999_999.0,
			node_scaling_factor: 1.08,
			max_group_links: 3,
			border_px: 2.0,
			selected_border_px: 10.0,
			connection_width: 2.0,

			show_labels: true,
			label_debounce_ms: 100.0,
			label_batch_max: 10,
			label_cache_capacity: 4096,
			image_cache_capacity: 512,

			zoom_factor: 0.001,
			min_zoom: 0.1,
			max_zoom: 4.0,
			initial_zoom: 0.5,
			zoom_out_floor: 0.5,
			click_tolerance_px: 10.0,
		}
	}
}

impl GraphConfig {
	/// Grown radius after one more sighting of the same species.
	pub fn grow(&self, size: f64) -> f64 {
		(size * self.node_scaling_factor).min(self.node_size_max)
	}

	/// Delay before the next reveal, given two consecutive sighting timestamps in seconds.
	pub fn reveal_delay_ms(&self, current: f64, next: f64) -> f64 {
		let gap_ms = (next - current).max(0.0) * 1000.0;
		(gap_ms / self.real_time_scaling.max(f64::EPSILON))
			.clamp(self.delay_add_min_ms, self.delay_add_max_ms.max(self.delay_add_min_ms))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_json_keeps_defaults() {
		let config: GraphConfig = serde_json::from_str(
			r#"{"reveal_mode": "auto", "connection_strategy": "by_taxonomic_group", "max_zoom": 3.0}"#,
		)
		.unwrap();
		assert_eq!(config.reveal_mode, RevealMode::Auto);
		assert_eq!(config.connection_strategy, ConnectionStrategy::ByTaxonomicGroup);
		assert_eq!(config.max_zoom, 3.0);
		assert_eq!(config.damping, 0.95);
	}

	#[test]
	fn growth_is_capped() {
		let config = GraphConfig {
			node_size_max: 60.0,
			..Default::default()
		};
		assert!((config.grow(50.0) - 54.0).abs() < 1e-9);
		assert_eq!(config.grow(58.0), 60.0);
	}

	#[test]
	fn reveal_delay_scales_and_clamps() {
		let config = GraphConfig::default();
		// one second at 250x is 4ms
		assert!((config.reveal_delay_ms(10.0, 11.0) - 4.0).abs() < 1e-9);
		assert_eq!(config.reveal_delay_ms(10.0, 10.0), config.delay_add_min_ms);
		assert_eq!(config.reveal_delay_ms(0.0, 3600.0), config.delay_add_max_ms);
	}
}
