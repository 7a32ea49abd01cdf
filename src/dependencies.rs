use std::collections::BTreeMap;
use std::rc::Rc;

use crate::addr::RcAddr;
use crate::Source;

struct DepState {
	/// Version observed when the dependency was last read.
	version: u64,
	/// Live change-hook id, when the owner is awake.
	hook: Option<u64>,
}

/// The dependency set of one derived cell: every source read during
/// its latest evaluation, keyed by pointer identity.
pub struct Dependencies {
	based_on: BTreeMap<RcAddr<dyn Source>, DepState>,
}

impl Default for Dependencies {
	fn default() -> Self {
		Dependencies {
			based_on: BTreeMap::new(),
		}
	}
}

impl Dependencies {
	pub fn new() -> Self {
		Self {
			based_on: BTreeMap::new(),
		}
	}

	pub fn len(&self) -> usize {
		self.based_on.len()
	}

	pub fn is_empty(&self) -> bool {
		self.based_on.is_empty()
	}

	pub(crate) fn remove(&mut self, source: &Rc<dyn Source>) {
		self.based_on.remove(&RcAddr::new(source.clone()));
	}

	pub(crate) fn based_on(&mut self, source: Rc<dyn Source>, version: u64) {
		self.based_on
			.entry(RcAddr::new(source))
			.or_insert(DepState {
				version,
				hook: None,
			})
			.version = version;
	}

	/// Snapshot for pull-validation. Returned by value so the caller
	/// can release its own borrows before walking upstream.
	pub(crate) fn sources(&self) -> Vec<(Rc<dyn Source>, u64)> {
		self.based_on
			.iter()
			.map(|(addr, state)| ((**addr).clone(), state.version))
			.collect()
	}

	/// Replace this set with `next`. Dependencies that disappeared are
	/// detached, dependencies present in both keep their existing hook
	/// untouched, and (when `awake`) fresh dependencies get a new hook.
	pub(crate) fn swap(
		&mut self,
		next: Dependencies,
		attach: &dyn Fn(&Rc<dyn Source>) -> u64,
		awake: bool,
	) {
		let prev = std::mem::replace(&mut self.based_on, next.based_on);

		for (addr, state) in prev {
			match self.based_on.get_mut(&addr) {
				Some(kept) => kept.hook = state.hook,
				None => {
					if let Some(hook) = state.hook {
						addr.detach(hook);
					}
				}
			}
		}

		if awake {
			self.attach_all(attach);
		}
	}

	pub(crate) fn attach_all(&mut self, attach: &dyn Fn(&Rc<dyn Source>) -> u64) {
		for (addr, state) in self.based_on.iter_mut() {
			if state.hook.is_none() {
				state.hook = Some(attach(addr));
			}
		}
	}

	pub(crate) fn detach_all(&mut self) {
		for (addr, state) in self.based_on.iter_mut() {
			if let Some(hook) = state.hook.take() {
				addr.detach(hook);
			}
		}
	}
}
