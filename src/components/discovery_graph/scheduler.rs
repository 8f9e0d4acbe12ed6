use super::config::{GraphConfig, RevealMode};
use super::ingest::Candidate;

#[derive(Clone, Debug, PartialEq)]
pub enum RevealAction {
	/// Nothing to do now; call again after the delay.
	Wait,
	Reveal(Candidate),
	/// Remove the most recently revealed node.
	Hide,
	/// The graph has been emptied; start a fresh cycle.
	Restart,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
	Start,
	Adding(usize),
	Removing,
	Done,
}

/// Decides what happens next and how long to wait before asking again. The
/// clock belongs to the caller; this only sequences actions.
#[derive(Clone, Debug)]
pub struct RevealScheduler {
	candidates: Vec<Candidate>,
	mode: RevealMode,
	phase: Phase,
	config: GraphConfig,
}

impl RevealScheduler {
	/// `candidates` must already be sorted by timestamp.
	pub fn new(candidates: Vec<Candidate>, config: &GraphConfig) -> Self {
		Self {
			candidates,
			mode: config.reveal_mode,
			phase: Phase::Start,
			config: config.clone(),
		}
	}

	pub fn mode(&self) -> RevealMode {
		self.mode
	}

	/// Returns the action to perform now plus the delay in milliseconds
	/// before the next call, or `None` once the schedule is finished.
	/// `live_nodes` is the current size of the graph.
	pub fn advance(&mut self, live_nodes: usize) -> Option<(RevealAction, f64)> {
		match self.phase {
			Phase::Start => {
				self.phase = Phase::Adding(0);
				match self.mode {
					RevealMode::Final => self.advance(live_nodes),
					RevealMode::Explore | RevealMode::Auto => {
						Some((RevealAction::Wait, self.config.delay_wait_for_add_ms))
					}
				}
			}
			Phase::Adding(i) if i < self.candidates.len() => {
				self.phase = Phase::Adding(i + 1);
				let delay = match (self.mode, self.candidates.get(i + 1)) {
					(RevealMode::Final, _) => 0.0,
					(_, Some(next)) => self
						.config
						.reveal_delay_ms(self.candidates[i].timestamp(), next.timestamp()),
					(_, None) => self.config.delay_add_min_ms,
				};
				Some((RevealAction::Reveal(self.candidates[i].clone()), delay))
			}
			Phase::Adding(_) => match self.mode {
				RevealMode::Auto => {
					self.phase = Phase::Removing;
					Some((RevealAction::Wait, self.config.delay_wait_for_rem_ms))
				}
				RevealMode::Final | RevealMode::Explore => {
					self.phase = Phase::Done;
					None
				}
			},
			Phase::Removing if live_nodes > 0 => Some((RevealAction::Hide, self.config.delay_rem_ms)),
			Phase::Removing => {
				self.phase = Phase::Adding(0);
				Some((RevealAction::Restart, self.config.delay_wait_for_add_ms))
			}
			Phase::Done => None,
		}
	}
}

#[cfg(test)]
impl RevealScheduler {
	pub fn is_done(&self) -> bool {
		self.phase == Phase::Done
	}

	pub fn len(&self) -> usize {
		self.candidates.len()
	}
}
