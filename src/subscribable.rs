use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::limit::{Extender, NotificationPolicy};

/// Notification channels carried by every reactive cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Event {
	/// Fires after a value change has been stored.
	Change,
	/// Fires with the outgoing value before it is replaced.
	BeforeChange,
}

pub(crate) type Callback<T> = Rc<dyn Fn(&T)>;

struct Entry<T> {
	id: u64,
	event: Event,
	callback: Callback<T>,
}

/// Ordered, event-keyed subscriber list. Ids are unique for the
/// lifetime of the list and handed out in subscription order.
pub(crate) struct Subscribers<T> {
	entries: Vec<Entry<T>>,
	next_id: u64,
}

impl<T> Subscribers<T> {
	pub fn new() -> Self {
		Subscribers {
			entries: Vec::new(),
			next_id: 1,
		}
	}

	pub fn add(&mut self, event: Event, callback: Callback<T>) -> u64 {
		let id = self.next_id;
		self.next_id += 1;
		self.entries.push(Entry {
			id,
			event,
			callback,
		});
		id
	}

	/// Removing an unknown id is a no-op, which makes disposal
	/// idempotent all the way down.
	pub fn remove(&mut self, id: u64) {
		self.entries.retain(|entry| entry.id != id);
	}

	pub fn count(&self, event: Option<Event>) -> usize {
		match event {
			None => self.entries.len(),
			Some(event) => self
				.entries
				.iter()
				.filter(|entry| entry.event == event)
				.count(),
		}
	}

	/// Snapshot the callbacks for one event. Dispatch always runs over
	/// a snapshot so that subscriptions added or removed by a callback
	/// cannot skip or double-invoke unrelated entries mid-round.
	pub fn snapshot(&self, event: Event) -> SmallVec<[Callback<T>; 4]> {
		self.entries
			.iter()
			.filter(|entry| entry.event == event)
			.map(|entry| entry.callback.clone())
			.collect()
	}
}

pub(crate) trait Unsubscribe {
	fn unsubscribe(&self, id: u64);
}

/// Disposable handle for one subscription.
///
/// Dropping the handle keeps the subscription alive; only `dispose`
/// removes it. Disposing twice, or after the owner itself is gone, is
/// a no-op.
pub struct Subscription {
	target: Weak<dyn Unsubscribe>,
	id: u64,
	disposed: Cell<bool>,
}

impl Subscription {
	pub(crate) fn new(target: Weak<dyn Unsubscribe>, id: u64) -> Self {
		Subscription {
			target,
			id,
			disposed: Cell::new(false),
		}
	}

	pub fn dispose(&self) {
		if self.disposed.replace(true) {
			return;
		}
		if let Some(target) = self.target.upgrade() {
			target.unsubscribe(self.id);
		}
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.get()
	}
}

/// A standalone typed event source.
///
/// `Observable` and `Computed` embed the same subscriber machinery;
/// this type is for consumers that want the notification surface
/// without a value cell attached.
pub struct Subscribable<T> {
	body: Rc<SubscribableBody<T>>,
}

impl<T> Clone for Subscribable<T> {
	fn clone(&self) -> Self {
		Subscribable {
			body: self.body.clone(),
		}
	}
}

struct SubscribableBody<T> {
	subs: RefCell<Subscribers<T>>,
	limit: RefCell<Option<Rc<dyn NotificationPolicy>>>,
	pending: RefCell<Option<T>>,
	this: Weak<SubscribableBody<T>>,
}

impl<T: 'static> Subscribable<T> {
	pub fn new() -> Self {
		Subscribable {
			body: Rc::new_cyclic(|this| SubscribableBody {
				subs: RefCell::new(Subscribers::new()),
				limit: RefCell::new(None),
				pending: RefCell::new(None),
				this: this.clone(),
			}),
		}
	}

	pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
		self.subscribe_event(Event::Change, callback)
	}

	pub fn subscribe_event(&self, event: Event, callback: impl Fn(&T) + 'static) -> Subscription {
		let id = self.body.subs.borrow_mut().add(event, Rc::new(callback));
		Subscription::new(self.body.this.clone() as Weak<dyn Unsubscribe>, id)
	}

	pub fn subscriptions_count(&self, event: Option<Event>) -> usize {
		self.body.subs.borrow().count(event)
	}

	pub fn extend(&self, extender: Extender) {
		if let Some(policy) = extender.policy() {
			*self.body.limit.borrow_mut() = Some(policy);
		}
	}
}

impl<T: Clone + 'static> Subscribable<T> {
	pub fn notify_subscribers(&self, value: &T) {
		self.notify_subscribers_event(value, Event::Change);
	}

	pub fn notify_subscribers_event(&self, value: &T, event: Event) {
		if event == Event::Change {
			let policy = self.body.limit.borrow().clone();
			if let Some(policy) = policy {
				// keep the latest value; the flush delivers it once
				*self.body.pending.borrow_mut() = Some(value.clone());
				let weak = self.body.this.clone();
				policy.schedule(Rc::new(move || {
					if let Some(body) = weak.upgrade() {
						let pending = body.pending.borrow_mut().take();
						if let Some(value) = pending {
							body.deliver(&value, Event::Change);
						}
					}
				}));
				return;
			}
		}
		self.body.deliver(value, event);
	}
}

impl<T: 'static> Default for Subscribable<T> {
	fn default() -> Self {
		Subscribable::new()
	}
}

impl<T> SubscribableBody<T> {
	fn deliver(&self, value: &T, event: Event) {
		let snapshot = self.subs.borrow().snapshot(event);
		for callback in snapshot {
			callback(value);
		}
	}
}

impl<T> Unsubscribe for SubscribableBody<T> {
	fn unsubscribe(&self, id: u64) {
		self.subs.borrow_mut().remove(id);
	}
}
