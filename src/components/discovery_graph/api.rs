use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::labels::PairKey;

#[derive(Debug, Error)]
pub enum LabelError {
	#[error("label request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("label service rejected the batch: {0}")]
	Rejected(String),
}

#[derive(Serialize)]
struct BatchRequest<'a> {
	species_pairs: Vec<[&'a str; 2]>,
}

impl<'a> BatchRequest<'a> {
	fn new(pairs: &'a [PairKey]) -> Self {
		Self {
			species_pairs: pairs
				.iter()
				.map(|p| {
					let (a, b) = p.names();
					[a, b]
				})
				.collect(),
		}
	}
}

#[derive(Debug, Default, Deserialize)]
struct BatchResponse {
	#[serde(default)]
	results: Vec<PairResult>,
	#[serde(default)]
	error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PairResult {
	#[serde(default)]
	pair: Vec<String>,
	#[serde(default)]
	link: Option<String>,
	#[serde(default)]
	error: Option<String>,
}

/// Client for the `link_species_batch` endpoint.
#[derive(Clone, Debug)]
pub struct LabelClient {
	http: reqwest::Client,
	endpoint: String,
}

impl LabelClient {
	pub fn new(api_url: &str) -> Self {
		Self {
			http: reqwest::Client::new(),
			endpoint: format!("{}/link_species_batch", api_url.trim_end_matches('/')),
		}
	}

	pub async fn fetch(&self, pairs: &[PairKey]) -> Result<HashMap<PairKey, String>, LabelError> {
		let body = BatchRequest::new(pairs);
		debug!("fetching labels for {} species pairs", pairs.len());
		let response: BatchResponse = self
			.http
			.post(&self.endpoint)
			.json(&body)
			.send()
			.await?
			.error_for_status()?
			.json()
			.await?;
		decode_results(response)
	}
}

fn decode_results(response: BatchResponse) -> Result<HashMap<PairKey, String>, LabelError> {
	if let Some(err) = response.error {
		return Err(LabelError::Rejected(err));
	}
	let mut labels = HashMap::with_capacity(response.results.len());
	for result in response.results {
		let [a, b] = result.pair.as_slice() else {
			warn!("label result with malformed pair {:?}", result.pair);
			continue;
		};
		let pair = PairKey::new(a, b);
		if let Some(err) = result.error {
			warn!("no label for {a} / {b}: {err}");
			continue;
		}
		labels.insert(pair, result.link.unwrap_or_default().trim().to_owned());
	}
	Ok(labels)
}
