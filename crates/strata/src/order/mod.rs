//! Relative priority among stratum names.
//!
//! Priority is installed once, at setup, through a [`StratumOrderBuilder`] and
//! then frozen. Names fall into four bands; within a band a name registered
//! later outranks one registered earlier.
//!
//! # Common order (top to bottom)
//!
//! 1. `override`, `user` ([`StratumBand::User`])
//! 2. `definition` ([`StratumBand::Definition`])
//! 3. loaded strata, then `underride` ([`StratumBand::Load`])
//! 4. `defaults` and other built-in strata ([`StratumBand::Default`])

use std::cmp::Ordering;

use rustc_hash::FxHashMap as HashMap;

use crate::common::CommonStrata;
use crate::error::OrderError;

#[cfg(test)]
mod tests;

/// Coarse priority class of a stratum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StratumBand {
	Default,
	Load,
	Definition,
	User,
}

/// Position of a stratum in the total order. Higher compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority {
	pub band: StratumBand,
	pub seq: u32,
}

/// Collects stratum registrations and validates them.
#[derive(Debug, Default, Clone)]
pub struct StratumOrderBuilder {
	entries: Vec<(Box<str>, StratumBand)>,
}

impl StratumOrderBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a builder pre-populated with the [`CommonStrata`].
	pub fn common() -> Self {
		let mut builder = Self::new();
		for (name, band) in [
			(CommonStrata::DEFAULTS, StratumBand::Default),
			(CommonStrata::UNDERRIDE, StratumBand::Load),
			(CommonStrata::DEFINITION, StratumBand::Definition),
			(CommonStrata::USER, StratumBand::User),
			(CommonStrata::OVERRIDE, StratumBand::User),
		] {
			builder.entries.push((Box::from(name), band));
		}
		builder
	}

	/// Registers `name` at the top of `band`.
	///
	/// Registering the same name into the same band again is a no-op and keeps
	/// its original position.
	pub fn register(&mut self, name: &str, band: StratumBand) -> Result<&mut Self, OrderError> {
		if let Some((_, existing)) = self.entries.iter().find(|(n, _)| &**n == name) {
			if *existing == band {
				return Ok(self);
			}
			return Err(OrderError::DuplicateStratum {
				name: name.to_string(),
				existing: *existing,
				requested: band,
			});
		}
		self.entries.push((Box::from(name), band));
		Ok(self)
	}

	pub fn add_default(&mut self, name: &str) -> Result<&mut Self, OrderError> {
		self.register(name, StratumBand::Default)
	}

	pub fn add_load(&mut self, name: &str) -> Result<&mut Self, OrderError> {
		self.register(name, StratumBand::Load)
	}

	pub fn add_definition(&mut self, name: &str) -> Result<&mut Self, OrderError> {
		self.register(name, StratumBand::Definition)
	}

	pub fn add_user(&mut self, name: &str) -> Result<&mut Self, OrderError> {
		self.register(name, StratumBand::User)
	}

	/// Freezes the registrations.
	pub fn build(&self) -> StratumOrder {
		let mut next_seq: HashMap<StratumBand, u32> = HashMap::default();
		let mut priorities = HashMap::default();
		for (name, band) in &self.entries {
			let seq = next_seq.entry(*band).or_insert(0);
			priorities.insert(name.clone(), Priority { band: *band, seq: *seq });
			*seq += 1;
		}

		let mut top_to_bottom: Vec<Box<str>> = self.entries.iter().map(|(n, _)| n.clone()).collect();
		top_to_bottom.sort_by(|a, b| priorities[b].cmp(&priorities[a]));

		StratumOrder { priorities, top_to_bottom }
	}
}

/// Frozen, total order over stratum names.
#[derive(Debug, Clone)]
pub struct StratumOrder {
	priorities: HashMap<Box<str>, Priority>,
	top_to_bottom: Vec<Box<str>>,
}

impl StratumOrder {
	/// The [`CommonStrata`] and nothing else.
	pub fn common() -> Self {
		StratumOrderBuilder::common().build()
	}

	pub fn priority(&self, name: &str) -> Option<Priority> {
		self.priorities.get(name).copied()
	}

	pub fn band(&self, name: &str) -> Option<StratumBand> {
		self.priority(name).map(|p| p.band)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.priorities.contains_key(name)
	}

	/// All registered names, highest priority first.
	pub fn priority_order(&self) -> &[Box<str>] {
		&self.top_to_bottom
	}

	/// Compares two registered names; unregistered names sort below everything.
	pub fn compare(&self, a: &str, b: &str) -> Ordering {
		self.priority(a).cmp(&self.priority(b))
	}

	/// Sorts `names` from highest to lowest priority.
	pub fn sort_top_to_bottom<T: AsRef<str>>(&self, names: &mut [T]) {
		names.sort_by(|a, b| self.compare(b.as_ref(), a.as_ref()));
	}
}
