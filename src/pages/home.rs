use std::collections::HashMap;

use leptos::prelude::*;

use crate::components::discovery_graph::{
	DiscoveryGraphCanvas, GraphConfig, NodeClick, Point, QuestBatch, RevealMode, SightingRecord,
};

const API_URL: &str = "http://localhost:8000";

fn sighting(group: &str, scientific: &str, common: &str, user: &str, ts: f64) -> SightingRecord {
	SightingRecord {
		taxonomic_group: group.into(),
		scientific_name: scientific.into(),
		common_name: common.into(),
		image_name: format!("{}_{}.jpg", common.to_lowercase().replace(' ', "_"), ts as u64),
		user_id: user.into(),
		discovery_timestamp: ts,
		..Default::default()
	}
}

/// A small neighbourhood survey: two walkers, a few overlapping species.
fn sample_batches() -> Vec<QuestBatch> {
	let robin = sighting("Aves", "Erithacus rubecula", "European Robin", "ana", 1_700_000_000.0);
	let history = HashMap::from([(
		robin.image_name.clone(),
		"{'species_identification': {'name': 'European Robin', 'what_is_it': 'A small insectivorous passerine bird.', 'information': 'Often follows gardeners to catch worms turned up by digging.'}}".to_owned(),
	)]);
	vec![
		QuestBatch {
			quest_id: "park-walk".into(),
			user_id: "ana".into(),
			sightings: vec![
				robin,
				sighting("Insecta", "Bombus terrestris", "Buff-tailed Bumblebee", "ana", 1_700_000_040.0),
				sighting("Plantae", "Trifolium repens", "White Clover", "ana", 1_700_000_090.0),
				sighting("Aves", "Turdus merula", "Common Blackbird", "ana", 1_700_000_200.0),
			],
			history,
		},
		QuestBatch {
			quest_id: "river-bank".into(),
			user_id: "ben".into(),
			sightings: vec![
				sighting("Annelida", "Lumbricus terrestris", "Common Earthworm", "ben", 1_700_000_020.0),
				sighting("Aves", "Erithacus rubecula", "European Robin", "ben", 1_700_000_060.0),
				sighting("Plantae", "Urtica dioica", "Stinging Nettle", "ben", 1_700_000_150.0),
				sighting("Insecta", "Bombus terrestris", "Buff-tailed Bumblebee", "ben", 1_700_000_260.0),
			],
			history: HashMap::new(),
		},
	]
}

#[component]
fn SpeciesPanel(selected: RwSignal<Option<NodeClick>>) -> impl IntoView {
	move || {
		selected.get().map(|click| {
			let info = click.species;
			let name = if info.name.is_empty() { click.name } else { info.name };
			let description = if info.what_is_it.is_empty() {
				"No description available.".to_owned()
			} else {
				info.what_is_it
			};
			let information = if info.information.is_empty() {
				"No additional information available.".to_owned()
			} else {
				info.information
			};
			let image = (!click.image_src.is_empty())
				.then(|| view! { <img src=click.image_src.clone() alt=name.clone() /> });
			let scientific = (!click.scientific_name.is_empty())
				.then(|| view! { <p class="scientific"><em>{click.scientific_name.clone()}</em></p> });
			let seen_on =
				String::from(js_sys::Date::new(&(click.timestamp * 1000.0).into()).to_date_string());
			view! {
				<aside class="species-panel">
					<button class="close" on:click=move |_| selected.set(None)>"×"</button>
					<h2>{name.clone()}</h2>
					{scientific}
					{image}
					<h3>"Description"</h3>
					<p>{description}</p>
					<h3>"Additional Information"</h3>
					<p>{information}</p>
					<p class="meta">
						{format!("Quest {} · seen by {} on {}", click.quest_id, click.user_id, seen_on)}
					</p>
				</aside>
			}
		})
	}
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let batches = Signal::derive(sample_batches);
	let selected = RwSignal::new(None::<NodeClick>);
	let zoom = RwSignal::new(1.0);
	let pan = RwSignal::new(Point::default());
	let config = GraphConfig {
		api_url: API_URL.into(),
		reveal_mode: RevealMode::Explore,
		..Default::default()
	};

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<DiscoveryGraphCanvas
					batches=batches
					config=config
					fullscreen=true
					on_node_click=move |click: NodeClick| selected.set(Some(click))
					zoom_level=zoom
					pan_offset=pan
				/>
				<div class="graph-overlay">
					<h1>"Discoveries"</h1>
					<p class="subtitle">"Tap a species for details. Drag to move, pinch or scroll to zoom."</p>
					<p class="view-state">
						{move || {
							let at = pan.get();
							format!("{:.2}× at ({:.0}, {:.0})", zoom.get(), at.x, at.y)
						}}
					</p>
				</div>
				<SpeciesPanel selected=selected />
			</div>
		</ErrorBoundary>
	}
}
