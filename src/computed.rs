use std::cell::{Cell, Ref, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::dependencies::Dependencies;
use crate::detection;
use crate::equality::Equality;
use crate::limit::{Extender, NotificationPolicy};
use crate::subscribable::{Event, Subscribers, Subscription, Unsubscribe};
use crate::value::{Access, Value, ValueKind};
use crate::{Error, Source};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
	Uninitialized,
	Evaluating,
	Idle,
	Disposed,
}

/// A value derived by a read function over other reactive cells.
///
/// Every evaluation runs under a fresh tracking frame; afterwards the
/// dependency set is swapped against the previous one, so exactly the
/// sources read by the latest evaluation are subscribed. A dependency
/// change re-evaluates synchronously; the outward notification fires
/// only when the computed value itself changed.
pub struct Computed<T> {
	body: Rc<ComputedBody<T>>,
}

impl<T> Clone for Computed<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

pub(crate) struct ComputedBody<T> {
	read: Box<dyn Fn() -> T>,
	write: Option<Box<dyn Fn(T)>>,
	pure: bool,
	value: RefCell<Option<T>>,
	version: Cell<u64>,
	state: Cell<State>,
	equality: RefCell<Equality<T>>,
	subs: RefCell<Subscribers<T>>,
	limit: RefCell<Option<Rc<dyn NotificationPolicy>>>,
	window_base: Cell<Option<u64>>,
	hook: Rc<dyn Fn()>,
	inner: RefCell<Inner>,
	this: Weak<ComputedBody<T>>,
}

struct Inner {
	dependencies: Dependencies,
}

impl Drop for Inner {
	fn drop(&mut self) {
		self.dependencies.detach_all();
	}
}

struct StateGuard<'a>(&'a Cell<State>);

impl Drop for StateGuard<'_> {
	fn drop(&mut self) {
		// a callback may have disposed us mid-evaluation
		if self.0.get() == State::Evaluating {
			self.0.set(State::Idle);
		}
	}
}

impl<T> Computed<T>
where
	T: Clone + 'static,
{
	/// Eagerly evaluated computed: subscribed to its dependencies from
	/// construction on.
	pub fn new(read: impl Fn() -> T + 'static) -> Self
	where
		T: Hash,
	{
		let computed = Self::build(Box::new(read), None, false, Equality::hashed());
		computed.body.ensure_current();
		computed
	}

	/// Skip the eager first evaluation; evaluate on first read instead.
	pub fn deferred(read: impl Fn() -> T + 'static) -> Self
	where
		T: Hash,
	{
		Self::build(Box::new(read), None, false, Equality::hashed())
	}

	/// Lazy memoizing computed: holds no upstream subscriptions while
	/// nothing subscribes to it, recomputing on read only when a
	/// recorded dependency version moved. The first subscriber wakes
	/// it into the eager mode, the last disposal puts it back to sleep.
	pub fn pure(read: impl Fn() -> T + 'static) -> Self
	where
		T: Hash,
	{
		Self::build(Box::new(read), None, true, Equality::hashed())
	}

	/// Eager computed with a write function invoked when the computed
	/// is used as a setter.
	pub fn writable(read: impl Fn() -> T + 'static, write: impl Fn(T) + 'static) -> Self
	where
		T: Hash,
	{
		let computed = Self::build(
			Box::new(read),
			Some(Box::new(write)),
			false,
			Equality::hashed(),
		);
		computed.body.ensure_current();
		computed
	}

	/// Eager computed with a caller-supplied equality comparer.
	pub fn with_comparer(
		read: impl Fn() -> T + 'static,
		eq: impl Fn(&T, &T) -> bool + 'static,
	) -> Self {
		let computed = Self::build(Box::new(read), None, false, Equality::with(eq));
		computed.body.ensure_current();
		computed
	}

	fn build(
		read: Box<dyn Fn() -> T>,
		write: Option<Box<dyn Fn(T)>>,
		pure: bool,
		equality: Equality<T>,
	) -> Self {
		Computed {
			body: Rc::new_cyclic(|this: &Weak<ComputedBody<T>>| ComputedBody {
				read,
				write,
				pure,
				value: RefCell::new(None),
				version: Cell::new(0),
				state: Cell::new(State::Uninitialized),
				equality: RefCell::new(equality),
				subs: RefCell::new(Subscribers::new()),
				limit: RefCell::new(None),
				window_base: Cell::new(None),
				hook: Rc::new({
					let this = this.clone();
					move || {
						if let Some(body) = this.upgrade() {
							body.dependency_changed();
						}
					}
				}),
				inner: RefCell::new(Inner {
					dependencies: Dependencies::new(),
				}),
				this: this.clone(),
			}),
		}
	}

	/// Tracked read. While this computed is itself evaluating, a
	/// re-entrant read short-circuits to the cached value.
	#[inline]
	pub fn get(&self) -> Ref<'_, T> {
		self.body.tracked_get()
	}

	/// Untracked read: brings the value current but never registers a
	/// dependency.
	#[inline]
	pub fn get_once(&self) -> Ref<'_, T> {
		self.body.untracked_get()
	}

	/// Invoke the write function. Writes to a disposed computed are
	/// dropped silently.
	pub fn set(&self, value: T) -> Result<(), Error> {
		if self.body.state.get() == State::Disposed {
			return Ok(());
		}
		match &self.body.write {
			Some(write) => {
				write(value);
				Ok(())
			}
			None => Err(Error::NotWritable),
		}
	}

	pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
		self.subscribe_event(Event::Change, callback)
	}

	pub fn subscribe_event(&self, event: Event, callback: impl Fn(&T) + 'static) -> Subscription {
		if event == Event::Change
			&& self.body.pure
			&& self.body.state.get() != State::Disposed
			&& !self.body.awake()
		{
			self.body.awaken();
		}
		let id = self.body.subs.borrow_mut().add(event, Rc::new(callback));
		Subscription::new(self.body.this.clone() as Weak<dyn Unsubscribe>, id)
	}

	pub fn subscriptions_count(&self, event: Option<Event>) -> usize {
		self.body.subs.borrow().count(event)
	}

	/// Sources the latest evaluation read.
	pub fn dependencies_count(&self) -> usize {
		self.body.inner.borrow().dependencies.len()
	}

	/// True while at least one upstream dependency is recorded: a
	/// computed that read nothing reactive is static and will never
	/// re-evaluate.
	pub fn is_active(&self) -> bool {
		self.body.state.get() != State::Disposed
			&& !self.body.inner.borrow().dependencies.is_empty()
	}

	pub fn is_disposed(&self) -> bool {
		self.body.state.get() == State::Disposed
	}

	/// Sever all upstream subscriptions and freeze the cached value.
	/// Idempotent; later reads return the frozen value, later writes
	/// are dropped.
	pub fn dispose(&self) {
		self.body.dispose();
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

impl<T> ComputedBody<T>
where
	T: Clone + 'static,
{
	fn tracked_get(&self) -> Ref<'_, T> {
		self.ensure_current();
		if let Some(this) = self.this.upgrade() {
			detection::register(this, self.version.get());
		}
		self.cached()
	}

	fn untracked_get(&self) -> Ref<'_, T> {
		self.ensure_current();
		self.cached()
	}

	fn cached(&self) -> Ref<'_, T> {
		Ref::map(self.value.borrow(), |slot| {
			slot.as_ref()
				.expect("computed read before its first evaluation completed")
		})
	}

	/// A pure computed is awake while anything subscribes to its
	/// changes (plain subscribers and downstream hooks alike); other
	/// computeds are always awake.
	fn awake(&self) -> bool {
		!self.pure || self.subs.borrow().count(Some(Event::Change)) > 0
	}

	fn ensure_current(&self) {
		match self.state.get() {
			State::Evaluating | State::Disposed => {}
			State::Uninitialized => self.evaluate(),
			State::Idle => {
				// awake computeds are kept current by their hooks; a
				// sleeping one pull-validates its recorded versions
				if !self.awake() && self.stale() {
					self.evaluate();
				}
			}
		}
	}

	fn stale(&self) -> bool {
		let sources = self.inner.borrow().dependencies.sources();
		sources
			.into_iter()
			.any(|(source, version)| source.update() != version)
	}

	fn dependency_changed(&self) {
		self.evaluate();
	}

	fn evaluate(&self) {
		if matches!(self.state.get(), State::Evaluating | State::Disposed) {
			return;
		}
		let first = self.state.get() == State::Uninitialized;
		self.state.set(State::Evaluating);
		let state = StateGuard(&self.state);

		tracing::trace!(first, "computed evaluation");

		let frame = detection::begin();
		let next_value = (self.read)();
		let mut next_deps = frame.take();

		// a re-entrant self-read must not become a subscription, or
		// every own change notification would re-trigger evaluation
		if let Some(this) = self.this.upgrade() {
			next_deps.remove(&(this as Rc<dyn Source>));
		}

		{
			let mut inner = self.inner.borrow_mut();
			let awake = self.awake();
			let hook = self.hook.clone();
			inner
				.dependencies
				.swap(next_deps, &move |source| source.attach(hook.clone()), awake);
		}

		let changed = match &*self.value.borrow() {
			Some(old) => self.equality.borrow().differs(old, &next_value),
			None => true,
		};

		if !changed {
			// equal but possibly a distinct instance; keep the latest
			*self.value.borrow_mut() = Some(next_value);
			return;
		}

		let previous = self.value.borrow().clone();
		if let Some(ref previous) = previous {
			// readers during this dispatch still see the old cache
			self.dispatch(Event::BeforeChange, previous);
		}

		*self.value.borrow_mut() = Some(next_value);
		drop(state);

		self.version.set(self.version.get() + 1);
		if let Some(previous) = previous {
			self.notify_change(Some(&previous));
		}
	}

	fn notify_change(&self, previous: Option<&T>) {
		let policy = self.limit.borrow().clone();
		match policy {
			Some(policy) => {
				if !policy.has_pending() {
					self.window_base.set(
						previous
							.and_then(|previous| self.equality.borrow().window_base(previous)),
					);
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
		if self.state.get() == State::Disposed {
			return;
		}
		if let Some(base) = self.window_base.take() {
			let returned = match &*self.value.borrow() {
				Some(value) => self.equality.borrow().matches_base(base, value),
				None => false,
			};
			if returned {
				tracing::trace!("limited notification suppressed");
				return;
			}
		}
		self.dispatch_current();
	}

	fn dispatch_current(&self) {
		let value = match &*self.value.borrow() {
			Some(value) => value.clone(),
			None => return,
		};
		self.dispatch(Event::Change, &value);
	}

	fn dispatch(&self, event: Event, value: &T) {
		let snapshot = self.subs.borrow().snapshot(event);
		for callback in snapshot {
			callback(value);
		}
	}

	fn awaken(&self) {
		tracing::trace!("pure computed wakes");
		self.ensure_current();
		let hook = self.hook.clone();
		self.inner
			.borrow_mut()
			.dependencies
			.attach_all(&move |source| source.attach(hook.clone()));
	}

	fn sleep_if_unobserved(&self) {
		if self.pure && self.state.get() == State::Idle && !self.awake() {
			tracing::trace!("pure computed sleeps");
			self.inner.borrow_mut().dependencies.detach_all();
		}
	}

	fn dispose(&self) {
		if self.state.get() == State::Disposed {
			return;
		}
		tracing::trace!("computed disposed");
		self.state.set(State::Disposed);
		self.inner.borrow_mut().dependencies.detach_all();
		if let Some(policy) = self.limit.borrow().clone() {
			policy.cancel();
		}
	}
}

impl<T> Unsubscribe for ComputedBody<T>
where
	T: Clone + 'static,
{
	fn unsubscribe(&self, id: u64) {
		self.subs.borrow_mut().remove(id);
		self.sleep_if_unobserved();
	}
}

impl<T> Source for ComputedBody<T>
where
	T: Clone + 'static,
{
	fn update(&self) -> u64 {
		self.ensure_current();
		self.version.get()
	}

	fn version(&self) -> u64 {
		self.version.get()
	}

	fn attach(&self, hook: Rc<dyn Fn()>) -> u64 {
		if self.pure && self.state.get() != State::Disposed && !self.awake() {
			self.awaken();
		}
		self.subs
			.borrow_mut()
			.add(Event::Change, Rc::new(move |_| hook()))
	}

	fn detach(&self, hook: u64) {
		self.unsubscribe(hook);
	}
}

impl<T> Access<T> for ComputedBody<T>
where
	T: Clone + 'static,
{
	fn get(&self) -> crate::value::Ref<'_, T> {
		crate::value::Ref::Cell(self.tracked_get())
	}

	fn get_once(&self) -> crate::value::Ref<'_, T> {
		crate::value::Ref::Cell(self.untracked_get())
	}

	fn kind(&self) -> ValueKind {
		ValueKind::Computed
	}

	fn writable(&self) -> bool {
		self.write.is_some() && self.state.get() != State::Disposed
	}

	fn try_set(&self, value: T) -> Result<(), Error> {
		if self.state.get() == State::Disposed {
			return Ok(());
		}
		match &self.write {
			Some(write) => {
				write(value);
				Ok(())
			}
			None => Err(Error::NotWritable),
		}
	}
}

impl<T> From<Computed<T>> for Value<T>
where
	T: Clone + 'static,
{
	fn from(computed: Computed<T>) -> Self {
		Value::new(computed.body)
	}
}

impl<T> Debug for Computed<T>
where
	T: Clone + 'static + Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match &*self.body.value.borrow() {
			Some(value) => value.fmt(f),
			None => f.write_str("<uninitialized>"),
		}
	}
}
