use std::cell::Cell;
use std::rc::Rc;

use crate::schedule;

/// How a rate-limited cell maps change attempts onto deliveries.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RateLimitMethod {
	/// Deliver once `timeout` elapses with no further changes.
	NotifyWhenChangesStop,
	/// Deliver on a fixed cadence from the first change of a window,
	/// suppressing intermediate values.
	NotifyAtFixedRate,
}

/// Notification shaping applied to a cell with `extend`.
#[derive(Clone, Copy, Debug)]
pub enum Extender {
	/// Buffer notifications behind a timer.
	RateLimit {
		timeout: u64,
		method: RateLimitMethod,
	},
	/// Coalesce all notifications of one turn into a single delivery
	/// at the turn boundary (`batch` close or `tick`).
	Deferred,
	/// Treat every write as a change, bypassing the equality comparer.
	NotifyAlways,
}

impl Extender {
	pub(crate) fn policy(&self) -> Option<Rc<dyn NotificationPolicy>> {
		match self {
			Extender::RateLimit {
				timeout,
				method: RateLimitMethod::NotifyWhenChangesStop,
			} => Some(Rc::new(Debounce {
				timeout: *timeout,
				timer: Rc::new(Cell::new(None)),
			})),
			Extender::RateLimit {
				timeout,
				method: RateLimitMethod::NotifyAtFixedRate,
			} => Some(Rc::new(Throttle {
				timeout: *timeout,
				timer: Rc::new(Cell::new(None)),
			})),
			Extender::Deferred => Some(Rc::new(Deferred {
				pending: Rc::new(Cell::new(false)),
			})),
			Extender::NotifyAlways => None,
		}
	}
}

/// One buffering strategy for outward notifications. The cell hands
/// `schedule` a flush closure that reads the value current at delivery
/// time; the policy decides when (and whether) that flush runs.
pub trait NotificationPolicy: 'static {
	/// Accept one change attempt.
	fn schedule(&self, flush: Rc<dyn Fn()>);

	/// A delivery is scheduled and has not flushed yet.
	fn has_pending(&self) -> bool;

	/// Drop any scheduled delivery.
	fn cancel(&self);
}

struct Deferred {
	pending: Rc<Cell<bool>>,
}

impl NotificationPolicy for Deferred {
	fn schedule(&self, flush: Rc<dyn Fn()>) {
		if self.pending.replace(true) {
			return;
		}
		let pending = self.pending.clone();
		schedule::enqueue(Rc::new(move || {
			if pending.replace(false) {
				flush();
			}
		}));
	}

	fn has_pending(&self) -> bool {
		self.pending.get()
	}

	fn cancel(&self) {
		self.pending.set(false);
	}
}

struct Debounce {
	timeout: u64,
	timer: Rc<Cell<Option<u64>>>,
}

impl NotificationPolicy for Debounce {
	fn schedule(&self, flush: Rc<dyn Fn()>) {
		if let Some(id) = self.timer.take() {
			schedule::clear_timeout(id);
		}
		let timer = self.timer.clone();
		let id = schedule::set_timeout(
			self.timeout,
			Rc::new(move || {
				timer.set(None);
				flush();
			}),
		);
		self.timer.set(Some(id));
	}

	fn has_pending(&self) -> bool {
		self.timer.get().is_some()
	}

	fn cancel(&self) {
		if let Some(id) = self.timer.take() {
			schedule::clear_timeout(id);
		}
	}
}

struct Throttle {
	timeout: u64,
	timer: Rc<Cell<Option<u64>>>,
}

impl NotificationPolicy for Throttle {
	fn schedule(&self, flush: Rc<dyn Fn()>) {
		if self.timer.get().is_some() {
			return;
		}
		let timer = self.timer.clone();
		let id = schedule::set_timeout(
			self.timeout,
			Rc::new(move || {
				timer.set(None);
				flush();
			}),
		);
		self.timer.set(Some(id));
	}

	fn has_pending(&self) -> bool {
		self.timer.get().is_some()
	}

	fn cancel(&self) {
		if let Some(id) = self.timer.take() {
			schedule::clear_timeout(id);
		}
	}
}
