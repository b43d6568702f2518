use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::future::FutureExt;
use futures::task::{waker, ArcWake};

use crate::base::error::JoinError;
use crate::dns::{HookCapabilities, HookReply, ResolveHook, Resolver};
use crate::fiber::handle::{FiberHandle, ResultSlot};

/// Scheduler-assigned fiber identifier. Ids are unique within a scheduler
/// and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiberId(u64);

impl FiberId {
    /// Marks a handle whose scheduler was already gone when it was created.
    /// Real ids start at 1.
    pub(crate) const DETACHED: FiberId = FiberId(0);
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a fiber inside the scheduler.
///
/// Finished fibers are retired from the scheduler immediately; their outcome
/// lives on in the [`FiberHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberState {
    /// Queued and runnable.
    Ready,
    /// Being polled right now. At most one fiber is running at any time.
    Running,
    /// Parked until a waker fires or a resolution reply arrives.
    Suspended,
}

/// Correlates a resolution reply with the fiber that is waiting for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ResumeToken(u64);

impl ResumeToken {
    #[cfg(test)]
    pub(crate) const fn from_raw(value: u64) -> Self {
        ResumeToken(value)
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events delivered to the carrier thread through the mailbox.
///
/// Senders may live on foreign threads (hook worker pools, timers); the
/// channel is the only synchronization between them and the scheduler.
#[derive(Debug)]
pub(crate) enum LoopEvent {
    /// A waker fired for the fiber.
    Woken(FiberId),
    /// A hook answered (or declined) the resolution identified by `token`.
    Resumed { token: ResumeToken, reply: HookReply },
}

type LocalFuture = Pin<Box<dyn Future<Output = ()>>>;

struct Fiber {
    state: FiberState,
    /// Taken out of the table while the fiber is being polled, so polling
    /// never holds a borrow of the core.
    future: Option<LocalFuture>,
}

struct Waiter {
    fiber: FiberId,
    reply: Option<HookReply>,
    waker: Option<Waker>,
}

/// Shared scheduler state. Single-threaded; reached from the scheduler, from
/// [`Spawner`]s, and from resolution futures via `Rc<RefCell<_>>`.
pub(crate) struct Core {
    fibers: HashMap<FiberId, Fiber>,
    ready: VecDeque<FiberId>,
    waiters: HashMap<ResumeToken, Waiter>,
    hook: Option<Arc<dyn ResolveHook>>,
    capabilities: HookCapabilities,
    current: Option<FiberId>,
    next_fiber: u64,
    next_token: u64,
}

impl Core {
    fn new(hook: Option<Arc<dyn ResolveHook>>) -> Self {
        let capabilities = hook
            .as_ref()
            .map(|hook| hook.capabilities())
            .unwrap_or_else(HookCapabilities::empty);
        Core {
            fibers: HashMap::new(),
            ready: VecDeque::new(),
            waiters: HashMap::new(),
            hook,
            capabilities,
            current: None,
            next_fiber: 0,
            next_token: 0,
        }
    }

    fn install_hook(&mut self, hook: Arc<dyn ResolveHook>) {
        // Capabilities are probed once here, never per lookup.
        self.capabilities = hook.capabilities();
        tracing::debug!(capabilities = %self.capabilities, "resolver hook installed");
        self.hook = Some(hook);
    }

    fn alloc_fiber(&mut self) -> FiberId {
        self.next_fiber += 1;
        FiberId(self.next_fiber)
    }

    fn alloc_token(&mut self) -> ResumeToken {
        self.next_token += 1;
        ResumeToken(self.next_token)
    }

    /// Registers a resolution waiter for the currently running fiber.
    ///
    /// Returns the installed hook, the token its reply must carry, and the
    /// future the fiber awaits. `None` means delegation is impossible: no
    /// fiber is running, no hook is installed, or the hook lacks `wanted`.
    pub(crate) fn register_waiter(
        core: &Rc<RefCell<Core>>,
        wanted: HookCapabilities,
    ) -> Option<(Arc<dyn ResolveHook>, ResumeToken, HookReplyFuture)> {
        let mut inner = core.borrow_mut();
        let fiber = inner.current?;
        let hook = inner.hook.clone()?;
        if !inner.capabilities.contains(wanted) {
            return None;
        }
        debug_assert!(
            inner.waiters.values().all(|waiter| waiter.fiber != fiber),
            "fiber {fiber} already has a resolution in flight"
        );
        let token = inner.alloc_token();
        inner.waiters.insert(
            token,
            Waiter {
                fiber,
                reply: None,
                waker: None,
            },
        );
        tracing::debug!(fiber = %fiber, token = %token, "resolution delegated to hook");
        Some((
            hook,
            token,
            HookReplyFuture {
                core: Rc::downgrade(core),
                token,
                finished: false,
            },
        ))
    }
}

/// Resolves to the hook's reply for one delegated request.
///
/// Created by [`Core::register_waiter`] before the hook is invoked, so that
/// an unwinding hook call still deregisters the waiter on drop.
pub(crate) struct HookReplyFuture {
    core: Weak<RefCell<Core>>,
    token: ResumeToken,
    finished: bool,
}

impl Future for HookReplyFuture {
    type Output = HookReply;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(core) = self.core.upgrade() else {
            self.finished = true;
            return Poll::Ready(HookReply::Declined);
        };
        let mut inner = core.borrow_mut();
        let Some(waiter) = inner.waiters.get_mut(&self.token) else {
            // The scheduler no longer tracks the token; treat as declined.
            drop(inner);
            self.finished = true;
            return Poll::Ready(HookReply::Declined);
        };
        match waiter.reply.take() {
            Some(reply) => {
                inner.waiters.remove(&self.token);
                drop(inner);
                self.finished = true;
                Poll::Ready(reply)
            }
            None => {
                waiter.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl Drop for HookReplyFuture {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Dropped before a reply was consumed (the hook panicked, or the
        // fiber was abandoned mid-wait). Deregister so a late reply is
        // discarded instead of resuming a stranger.
        if let Some(core) = self.core.upgrade() {
            core.borrow_mut().waiters.remove(&self.token);
        }
    }
}

struct FiberWaker {
    fiber: FiberId,
    sender: Sender<LoopEvent>,
}

impl ArcWake for FiberWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        // The receiver outlives every fiber; a send error just means the
        // scheduler is already gone.
        let _ = arc_self.sender.send(LoopEvent::Woken(arc_self.fiber));
    }
}

/// Cooperative scheduler: many fibers, one carrier thread.
///
/// Fibers are scheduled with [`schedule`](Self::schedule) and driven by
/// [`run`](Self::run), which returns once every fiber has finished. An
/// optional [`ResolveHook`] receives address and name lookups made through
/// [`Resolver`]s obtained from [`resolver`](Self::resolver); while one fiber
/// waits for a hook reply, the others keep running.
pub struct FiberScheduler {
    core: Rc<RefCell<Core>>,
    events: Receiver<LoopEvent>,
    sender: Sender<LoopEvent>,
}

impl FiberScheduler {
    /// Creates a scheduler with no resolver hook. Resolutions use the
    /// blocking system calls.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a scheduler with `hook` installed. The hook's capabilities
    /// are probed once, up front.
    pub fn with_hook(hook: Arc<dyn ResolveHook>) -> Self {
        Self::build(Some(hook))
    }

    fn build(hook: Option<Arc<dyn ResolveHook>>) -> Self {
        let (sender, events) = unbounded();
        FiberScheduler {
            core: Rc::new(RefCell::new(Core::new(hook))),
            events,
            sender,
        }
    }

    /// Installs (or replaces) the resolver hook and re-probes capabilities.
    ///
    /// Replacing the hook while scheduled fibers have lookups in flight is
    /// not supported; install before the first [`run`](Self::run).
    pub fn set_hook(&mut self, hook: Arc<dyn ResolveHook>) {
        self.core.borrow_mut().install_hook(hook);
    }

    /// The capabilities probed from the installed hook, empty when none is.
    pub fn hook_capabilities(&self) -> HookCapabilities {
        self.core.borrow().capabilities
    }

    /// Schedules a future as a new fiber.
    ///
    /// Scheduling never starts execution; the fiber first runs inside
    /// [`run`](Self::run). Fibers are started in schedule order, but
    /// completion order depends on who suspends.
    pub fn schedule<F>(&mut self, future: F) -> FiberHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        schedule_on(&self.core, future)
    }

    /// A handle for scheduling fibers from inside other fibers.
    pub fn spawner(&self) -> Spawner {
        Spawner {
            core: Rc::downgrade(&self.core),
        }
    }

    /// A resolution facade bound to this scheduler.
    ///
    /// The resolver may outlive the scheduler; once the scheduler is gone
    /// its operations simply take the blocking path.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(Rc::downgrade(&self.core), self.sender.clone())
    }

    /// Current state of a fiber, or `None` once it has finished and been
    /// retired (or was never known).
    pub fn state(&self, fiber: FiberId) -> Option<FiberState> {
        self.core.borrow().fibers.get(&fiber).map(|f| f.state)
    }

    /// Runs fibers until none remain.
    ///
    /// When every live fiber is suspended, the carrier thread blocks on the
    /// mailbox until a hook completion or waker arrives; it never spins.
    pub fn run(&mut self) {
        loop {
            while let Ok(event) = self.events.try_recv() {
                self.dispatch(event);
            }

            if let Some((id, mut future)) = self.take_ready() {
                let fiber_waker = waker(Arc::new(FiberWaker {
                    fiber: id,
                    sender: self.sender.clone(),
                }));
                let mut cx = Context::from_waker(&fiber_waker);
                let poll = future.as_mut().poll(&mut cx);
                self.reinstall(id, future, poll);
                continue;
            }

            if self.core.borrow().fibers.is_empty() {
                break;
            }

            // Nothing runnable but fibers remain: block until an event lands.
            match self.events.recv() {
                Ok(event) => self.dispatch(event),
                Err(_) => break,
            }
        }
    }

    fn dispatch(&self, event: LoopEvent) {
        match event {
            LoopEvent::Woken(id) => {
                let mut core = self.core.borrow_mut();
                if let Some(fiber) = core.fibers.get_mut(&id) {
                    if fiber.state == FiberState::Suspended {
                        fiber.state = FiberState::Ready;
                        core.ready.push_back(id);
                    }
                }
            }
            LoopEvent::Resumed { token, reply } => {
                let pending_waker = {
                    let mut core = self.core.borrow_mut();
                    let Some(waiter) = core.waiters.get_mut(&token) else {
                        // Late reply for a deregistered wait (fiber already
                        // resumed by fallback or retired).
                        tracing::debug!(token = %token, "discarding reply for unknown resume token");
                        return;
                    };
                    waiter.reply = Some(reply);
                    let fiber = waiter.fiber;
                    match waiter.waker.take() {
                        Some(waker) => Some(waker),
                        None => {
                            // Reply landed before the fiber's first poll of
                            // the wait; ready it directly if it is parked.
                            if let Some(entry) = core.fibers.get_mut(&fiber) {
                                if entry.state == FiberState::Suspended {
                                    entry.state = FiberState::Ready;
                                    core.ready.push_back(fiber);
                                }
                            }
                            None
                        }
                    }
                };
                if let Some(waker) = pending_waker {
                    // Outside the borrow: waking sends into the mailbox.
                    waker.wake();
                }
            }
        }
    }

    fn take_ready(&self) -> Option<(FiberId, LocalFuture)> {
        let mut core = self.core.borrow_mut();
        while let Some(id) = core.ready.pop_front() {
            let Some(fiber) = core.fibers.get_mut(&id) else {
                continue;
            };
            if fiber.state != FiberState::Ready {
                continue;
            }
            if let Some(future) = fiber.future.take() {
                fiber.state = FiberState::Running;
                core.current = Some(id);
                return Some((id, future));
            }
        }
        None
    }

    fn reinstall(&self, id: FiberId, future: LocalFuture, poll: Poll<()>) {
        let mut core = self.core.borrow_mut();
        core.current = None;
        match poll {
            Poll::Ready(()) => {
                core.fibers.remove(&id);
                tracing::debug!(fiber = %id, "fiber finished");
                // Dropping the future can deregister waiters, which
                // reborrows the core; end the borrow first.
                drop(core);
                drop(future);
            }
            Poll::Pending => {
                if let Some(fiber) = core.fibers.get_mut(&id) {
                    fiber.state = FiberState::Suspended;
                    fiber.future = Some(future);
                }
            }
        }
    }
}

impl Default for FiberScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FiberScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.borrow();
        f.debug_struct("FiberScheduler")
            .field("fibers", &core.fibers.len())
            .field("ready", &core.ready.len())
            .field("waiters", &core.waiters.len())
            .finish_non_exhaustive()
    }
}

/// Schedules fibers from inside other fibers.
///
/// Holds only a weak reference; scheduling after the scheduler is gone
/// yields a handle that joins as [`JoinError::Incomplete`].
#[derive(Clone)]
pub struct Spawner {
    core: Weak<RefCell<Core>>,
}

impl Spawner {
    pub fn schedule<F>(&self, future: F) -> FiberHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        match self.core.upgrade() {
            Some(core) => schedule_on(&core, future),
            None => FiberHandle::detached(),
        }
    }
}

fn schedule_on<F>(core: &Rc<RefCell<Core>>, future: F) -> FiberHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    let id = core.borrow_mut().alloc_fiber();
    let slot: ResultSlot<F::Output> = Rc::new(RefCell::new(None));
    let result_slot = Rc::clone(&slot);
    let wrapped = async move {
        // Capture panics so one fiber cannot take down its siblings.
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(value) => {
                *result_slot.borrow_mut() = Some(Ok(value));
            }
            Err(payload) => {
                let message = panic_message(payload);
                tracing::warn!(fiber = %id, message = %message, "fiber terminated by panic");
                *result_slot.borrow_mut() = Some(Err(JoinError::Panicked(message)));
            }
        }
    };
    let mut inner = core.borrow_mut();
    inner.fibers.insert(
        id,
        Fiber {
            state: FiberState::Ready,
            future: Some(Box::pin(wrapped)),
        },
    );
    inner.ready.push_back(id);
    tracing::debug!(fiber = %id, "fiber scheduled");
    FiberHandle::new(id, slot)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
