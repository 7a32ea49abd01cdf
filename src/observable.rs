use std::cell::{Cell, Ref, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::detection;
use crate::equality::Equality;
use crate::limit::{Extender, NotificationPolicy};
use crate::subscribable::{Event, Subscribers, Subscription, Unsubscribe};
use crate::value::{Access, Value, ValueKind};
use crate::{Error, Source};

/// A mutable reactive cell. Reading it under an active evaluation
/// registers it as a dependency; writing it notifies subscribers when
/// the equality comparer judges the value changed.
pub struct Observable<T> {
	body: Rc<ObservableBody<T>>,
}

impl<T> Clone for Observable<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for Observable<T>
where
	T: Default + Hash + 'static,
{
	fn default() -> Self {
		Observable::new(Default::default())
	}
}

pub trait Toggle {
	fn toggle(&mut self);
}

impl Toggle for bool {
	fn toggle(&mut self) {
		*self = !*self
	}
}

pub(crate) struct ObservableBody<T> {
	value: RefCell<T>,
	version: Cell<u64>,
	equality: RefCell<Equality<T>>,
	subs: RefCell<Subscribers<T>>,
	limit: RefCell<Option<Rc<dyn NotificationPolicy>>>,
	window_base: Cell<Option<u64>>,
	this: Weak<ObservableBody<T>>,
}

impl<T> Observable<T>
where
	T: 'static,
{
	pub fn new(value: T) -> Self
	where
		T: Hash,
	{
		Self::build(value, Equality::hashed())
	}

	/// A cell with a caller-supplied equality comparer in place of the
	/// default content hash.
	pub fn with_comparer(value: T, eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
		Self::build(value, Equality::with(eq))
	}

	fn build(value: T, equality: Equality<T>) -> Self {
		Observable {
			body: Rc::new_cyclic(|this| ObservableBody {
				value: RefCell::new(value),
				version: Cell::new(1),
				equality: RefCell::new(equality),
				subs: RefCell::new(Subscribers::new()),
				limit: RefCell::new(None),
				window_base: Cell::new(None),
				this: this.clone(),
			}),
		}
	}

	/// Tracked read.
	#[inline]
	pub fn get(&self) -> Ref<'_, T> {
		self.body.get()
	}

	/// Untracked read: never registers a dependency.
	#[inline]
	pub fn get_once(&self) -> Ref<'_, T> {
		self.body.value.borrow()
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
		match extender {
			Extender::NotifyAlways => *self.body.equality.borrow_mut() = Equality::Always,
			other => {
				if let Some(policy) = other.policy() {
					*self.body.limit.borrow_mut() = Some(policy);
				}
			}
		}
	}
}

impl<T> Observable<T>
where
	T: Clone + 'static,
{
	#[inline]
	pub fn set(&self, value: T) {
		let _ = self.body.exchange(value, false);
	}

	/// Assign and notify even when the comparer judges the value
	/// unchanged. For cells wrapping mutable containers whose identity
	/// survives a content change.
	#[inline]
	pub fn force_set(&self, value: T) {
		let _ = self.body.exchange(value, true);
	}

	#[inline]
	pub fn replace(&self, value: T) -> T {
		self.body.exchange(value, false)
	}

	/// Mutate in place; change detection compares the content hash
	/// from before and after, like `set` does for replacement writes.
	/// Only `Change` fires: an in-place mutation cannot present the
	/// outgoing value to `BeforeChange` subscribers.
	pub fn modify(&self, func: impl FnOnce(&mut T))
	where
		T: Hash,
	{
		let changed = {
			let mut value = self.body.value.borrow_mut();
			let before = fxhash::hash64(&*value);
			func(&mut value);
			fxhash::hash64(&*value) != before
		};

		if changed {
			self.body.version.set(self.body.version.get() + 1);
			self.body.after_change(None);
		}
	}

	#[inline]
	pub fn toggle(&self)
	where
		T: Toggle + Hash,
	{
		self.modify(T::toggle)
	}
}

impl<T> ObservableBody<T>
where
	T: 'static,
{
	fn get(&self) -> Ref<'_, T> {
		self.track();
		self.value.borrow()
	}

	fn track(&self) {
		if let Some(this) = self.this.upgrade() {
			detection::register(this, self.version.get());
		}
	}

	fn dispatch(&self, event: Event, value: &T) {
		let snapshot = self.subs.borrow().snapshot(event);
		for callback in snapshot {
			callback(value);
		}
	}
}

impl<T> ObservableBody<T>
where
	T: Clone + 'static,
{
	/// Store `value`, returning the previous one. Notification only
	/// happens when the comparer judges the values different (or on
	/// `force`); an equal value is still stored, silently.
	fn exchange(&self, value: T, force: bool) -> T {
		let differs =
			force || self.equality.borrow().differs(&self.value.borrow(), &value);

		if !differs {
			return self.value.replace(value);
		}

		let old = self.value.borrow().clone();
		self.dispatch(Event::BeforeChange, &old);

		*self.value.borrow_mut() = value;
		self.version.set(self.version.get() + 1);
		self.after_change(Some(&old));

		old
	}

	fn after_change(&self, old: Option<&T>) {
		let policy = self.limit.borrow().clone();
		match policy {
			Some(policy) => {
				if !policy.has_pending() {
					self.window_base
						.set(old.and_then(|old| self.equality.borrow().window_base(old)));
				}
				if let Some(this) = self.this.upgrade() {
					let weak = Rc::downgrade(&this);
					policy.schedule(Rc::new(move || {
						if let Some(body) = weak.upgrade() {
							body.flush_limited();
						}
					}));
				}
			}
			None => self.dispatch_current(),
		}
	}

	fn flush_limited(&self) {
		if let Some(base) = self.window_base.take() {
			let returned = self
				.equality
				.borrow()
				.matches_base(base, &self.value.borrow());
			if returned {
				// the value came back to what was last delivered
				tracing::trace!("limited notification suppressed");
				return;
			}
		}
		self.dispatch_current();
	}

	fn dispatch_current(&self) {
		let value = self.value.borrow().clone();
		self.dispatch(Event::Change, &value);
	}
}

impl<T: 'static> Unsubscribe for ObservableBody<T> {
	fn unsubscribe(&self, id: u64) {
		self.subs.borrow_mut().remove(id);
	}
}

impl<T: 'static> Source for ObservableBody<T> {
	fn update(&self) -> u64 {
		self.version.get()
	}

	fn version(&self) -> u64 {
		self.version.get()
	}

	fn attach(&self, hook: Rc<dyn Fn()>) -> u64 {
		self.subs
			.borrow_mut()
			.add(Event::Change, Rc::new(move |_| hook()))
	}

	fn detach(&self, hook: u64) {
		self.subs.borrow_mut().remove(hook);
	}
}

impl<T> Access<T> for ObservableBody<T>
where
	T: Clone + 'static,
{
	fn get(&self) -> crate::value::Ref<'_, T> {
		crate::value::Ref::Cell(ObservableBody::get(self))
	}

	fn get_once(&self) -> crate::value::Ref<'_, T> {
		crate::value::Ref::Cell(self.value.borrow())
	}

	fn kind(&self) -> ValueKind {
		ValueKind::Observable
	}

	fn writable(&self) -> bool {
		true
	}

	fn try_set(&self, value: T) -> Result<(), Error> {
		let _ = self.exchange(value, false);
		Ok(())
	}
}

impl<T> From<Observable<T>> for Value<T>
where
	T: Clone + 'static,
{
	fn from(observable: Observable<T>) -> Self {
		Value::new(observable.body)
	}
}

impl<T> Debug for Observable<T>
where
	T: 'static + Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.get_once().fmt(f)
	}
}
