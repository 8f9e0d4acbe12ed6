//! Turns per-quest sighting batches into one time-ordered list of candidates.

use std::collections::HashMap;
use std::f64::consts::TAU;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::{GraphConfig, ImageQuality};
use super::images::ImageKey;
use super::types::{SightingRecord, SpeciesInfo};

/// One quest's parsed sightings plus its assistant history, keyed by image filename.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuestBatch {
	pub quest_id: String,
	pub user_id: String,
	pub sightings: Vec<SightingRecord>,
	pub history: HashMap<String, String>,
}

impl QuestBatch {
	pub fn history_text(&self, image_filename: &str) -> Option<&str> {
		if image_filename.is_empty() {
			return None;
		}
		self.history.get(image_filename).map(String::as_str)
	}
}

/// A sighting waiting to be revealed: either becomes a node or merges into one.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
	pub record: SightingRecord,
	pub name: String,
	pub image: Option<ImageKey>,
	pub image_src: String,
	pub species_info: SpeciesInfo,
	pub x: f64,
	pub y: f64,
}

impl Candidate {
	pub fn timestamp(&self) -> f64 {
		self.record.discovery_timestamp
	}
}

pub fn image_url(api_url: &str, quest_id: &str, image_name: &str, quality: ImageQuality) -> String {
	if image_name.is_empty() {
		return String::new();
	}
	format!(
		"{}/explore/images/{}/{}?res={}",
		api_url.trim_end_matches('/'),
		quest_id,
		image_name,
		quality.as_str()
	)
}

#[derive(Deserialize)]
struct AssistantReply {
	species_identification: Option<Identification>,
}

#[derive(Deserialize)]
struct Identification {
	#[serde(default)]
	name: String,
	#[serde(default, alias = "description")]
	what_is_it: String,
	#[serde(default)]
	information: String,
}

/// Assistant replies are often python-style dicts, so they are read as JSON5.
fn parse_reply(text: &str) -> Result<AssistantReply, json5::Error> {
	json5::from_str(text)
}

/// Resolves descriptive text for one sighting, degrading to a placeholder
/// when the history entry is missing or unreadable.
pub fn resolve_species_info(
	text: Option<&str>,
	name: &str,
	image_filename: &str,
	image_src: &str,
) -> SpeciesInfo {
	let placeholder = || SpeciesInfo::placeholder(name, image_filename, image_src);
	let Some(text) = text else {
		debug!("no history entry for image '{image_filename}'");
		return placeholder();
	};
	match parse_reply(text) {
		Ok(AssistantReply {
			species_identification: Some(id),
		}) => SpeciesInfo {
			name: if id.name.is_empty() { name.to_owned() } else { id.name },
			what_is_it: id.what_is_it,
			information: id.information,
			image_filename: image_filename.to_owned(),
			image_src: image_src.to_owned(),
		},
		Ok(_) => {
			debug!("no species_identification for image '{image_filename}'");
			placeholder()
		}
		Err(err) => {
			debug!("unreadable assistant text for image '{image_filename}': {err}");
			placeholder()
		}
	}
}

/// Maps every sighting of every batch to a candidate on the spawn ring, drops
/// anything past the cutoff and sorts by timestamp (stable, so batch order
/// breaks ties).
pub fn build_candidates<R: Rng>(
	batches: &[QuestBatch],
	config: &GraphConfig,
	rng: &mut R,
	width: f64,
	height: f64,
) -> Vec<Candidate> {
	let ring = width.min(height) * config.spawn_radius_factor;
	let (cx, cy) = (width / 2.0, height / 2.0);

	let mut candidates: Vec<Candidate> = batches
		.iter()
		.flat_map(|batch| batch.sightings.iter().map(move |record| (batch, record)))
		.filter(|(_, record)| {
			config
				.cutoff_time
				.is_none_or(|cutoff| record.discovery_timestamp < cutoff)
		})
		.map(|(batch, record)| {
			let mut record = record.clone();
			if record.quest_id.is_empty() {
				record.quest_id = batch.quest_id.clone();
			}
			if record.user_id.is_empty() {
				record.user_id = batch.user_id.clone();
			}
			let name = record.display_name().to_owned();
			let filename = record.image_filename().to_owned();
			let image_src = image_url(
				&config.api_url,
				&record.quest_id,
				&record.image_name,
				config.image_quality,
			);
			let species_info =
				resolve_species_info(batch.history_text(&filename), &name, &filename, &image_src);
			let angle = rng.gen_range(0.0..TAU);
			Candidate {
				image: ImageKey::new(&record.quest_id, &filename),
				x: cx + ring * angle.cos(),
				y: cy + ring * angle.sin(),
				record,
				name,
				image_src,
				species_info,
			}
		})
		.collect();

	candidates.sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));
	debug!(
		"built {} candidates from {} quests",
		candidates.len(),
		batches.len()
	);
	candidates
}
