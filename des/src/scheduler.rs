use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, trace};

use crate::Time;
use crate::error::{Result, SimError};
use crate::event::{AnyOfResult, EventId, EventKind, EventSlot, EventState, Outcome, Waiter};
use crate::process::{Process, ProcessId, Step, Wake};
use crate::resource::{Abandoned, Resource, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    /// Timed firing: timeouts and `schedule`
    Fire(EventId, Outcome),
    /// Deliver an event that was fired with `fire`
    Notify(EventId),
    Resume(ProcessId, Wake),
}

struct Entry {
    t: Time,
    seq: u64,
    action: Action,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

// Reversed so the max-heap pops the earliest time, then the earliest insertion.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .t
            .total_cmp(&self.t)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Summary returned by `Environment::run`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub end_time: Time,
    pub steps: usize,
    pub processes_finished: usize,
}

/// The scheduler: virtual clock, event queue, and everything living on them.
///
/// One environment is one closed simulation. Processes, events and resources
/// are owned here and addressed through the ids handed out on creation, so
/// several environments can run side by side without sharing anything.
///
/// Firing semantics:
/// - `fire` records the outcome at once and queues the notification of the
///   waiters at the current instant.
/// - Timeouts and `schedule`d events stay pending until their time is popped,
///   then fire and notify in the same step.
/// - Entries with equal times are processed in insertion order.
pub struct Environment<S> {
    now: Time,
    queue: BinaryHeap<Entry>,
    next_seq: u64,
    events: Vec<EventSlot>,
    resources: Vec<Resource>,
    processes: Vec<Option<Box<dyn Process<S>>>>,
    steps: usize,
    finished: usize,
    state: S,
}

impl<S> Environment<S> {
    pub fn new(state: S) -> Environment<S> {
        Environment {
            now: 0.0,
            queue: BinaryHeap::new(),
            next_seq: 0,
            events: Vec::new(),
            resources: Vec::new(),
            processes: Vec::new(),
            steps: 0,
            finished: 0,
            state,
        }
    }

    pub fn now(&self) -> Time {
        self.now
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    /// Time of the next queued entry
    pub fn peek(&self) -> Option<Time> {
        self.queue.peek().map(|entry| entry.t)
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// New pending event. It fires only through `fire` or `schedule`.
    pub fn event(&mut self) -> EventId {
        self.insert(EventKind::Plain)
    }

    /// New event firing successfully at `now + delay`.
    pub fn timeout(&mut self, delay: Time) -> Result<EventId> {
        let due = self.now + delay;
        self.check_time(due)?;
        let id = self.insert(EventKind::Timeout { due });
        self.push(due, Action::Fire(id, Outcome::Success));
        trace!(t = self.now, %id, due, "timeout scheduled");
        Ok(id)
    }

    /// Fire `event` successfully at the absolute time `at`.
    pub fn schedule(&mut self, event: EventId, at: Time) -> Result<()> {
        self.schedule_with(event, at, Outcome::Success)
    }

    pub fn schedule_with(&mut self, event: EventId, at: Time, outcome: Outcome) -> Result<()> {
        if self.slot(event)?.state.is_fired() {
            return Err(SimError::DoubleFire(event));
        }
        self.check_time(at)?;
        self.push(at, Action::Fire(event, outcome));
        trace!(t = self.now, %event, at, "event scheduled");
        Ok(())
    }

    /// Fire `event` now. Its waiters are notified, in registration order,
    /// once the scheduler reaches the notification queued here.
    pub fn fire(&mut self, event: EventId, outcome: Outcome) -> Result<()> {
        self.mark_fired(event, outcome)?;
        self.push(self.now, Action::Notify(event));
        Ok(())
    }

    /// Composite event firing as soon as any of `events` fires.
    ///
    /// The result records every constituent already fired at that moment.
    /// Constituents are never cancelled and keep firing on their own
    /// schedule afterwards.
    pub fn any_of(&mut self, events: &[EventId]) -> Result<EventId> {
        if events.len() < 2 {
            return Err(SimError::InvalidCondition(events.len()));
        }
        for event in events {
            self.slot(*event)?;
        }
        let id = self.insert(EventKind::AnyOf {
            constituents: events.to_vec(),
            result: None,
        });
        for event in events {
            let slot = &mut self.events[event.0];
            if !slot.notified {
                slot.waiters.push(Waiter::AnyOf(id));
            }
        }
        self.check_any_of(id)?;
        Ok(id)
    }

    pub fn event_state(&self, event: EventId) -> Result<EventState> {
        Ok(self.slot(event)?.state)
    }

    /// Result of a fired any-of; `None` while pending or for other events.
    pub fn any_of_result(&self, event: EventId) -> Option<&AnyOfResult> {
        match &self.events.get(event.0)?.kind {
            EventKind::AnyOf { result, .. } => result.as_ref(),
            _ => None,
        }
    }

    /// Due time of a timeout
    pub fn due(&self, event: EventId) -> Option<Time> {
        match self.events.get(event.0)?.kind {
            EventKind::Timeout { due } => Some(due),
            _ => None,
        }
    }

    // ---------------------------------------------------------------------
    // Processes
    // ---------------------------------------------------------------------

    /// Start a process. Its first resumption is queued at the current time.
    pub fn spawn<P>(&mut self, process: P) -> ProcessId
    where
        P: Process<S> + 'static,
    {
        let id = ProcessId(self.processes.len());
        debug!(t = self.now, process = process.name(), "process spawned");
        self.processes.push(Some(Box::new(process)));
        self.push(self.now, Action::Resume(id, Wake::Start));
        id
    }

    pub fn is_alive(&self, process: ProcessId) -> bool {
        matches!(self.processes.get(process.0), Some(Some(_)))
    }

    // ---------------------------------------------------------------------
    // Resources
    // ---------------------------------------------------------------------

    pub fn add_resource(&mut self, capacity: usize) -> Result<ResourceId> {
        let resource = Resource::new(capacity)?;
        self.resources.push(resource);
        Ok(ResourceId(self.resources.len() - 1))
    }

    pub fn resource(&self, id: ResourceId) -> Result<&Resource> {
        self.resources
            .get(id.0)
            .ok_or(SimError::UnknownResource(id))
    }

    /// Queue a request; it fires once the resource grants it.
    pub fn request(&mut self, resource: ResourceId) -> Result<EventId> {
        self.resource(resource)?;
        let id = self.insert(EventKind::Request { resource });
        let granted = self.resources[resource.0].enqueue(id);
        trace!(t = self.now, %resource, request = %id, "resource requested");
        self.grant(granted)?;
        Ok(id)
    }

    pub fn release(&mut self, request: EventId) -> Result<()> {
        let resource = self.owner(request)?;
        let granted = self.resources[resource.0].release(request)?;
        trace!(t = self.now, %resource, %request, "resource released");
        self.grant(granted)
    }

    /// Give up on a request. A still-queued request leaves the queue; one
    /// that got granted in the meantime is released.
    pub fn abandon(&mut self, request: EventId) -> Result<()> {
        let resource = self.owner(request)?;
        match self.resources[resource.0].abandon(request) {
            Abandoned::Released(granted) => self.grant(granted),
            Abandoned::Withdrawn => {
                trace!(t = self.now, %resource, %request, "request withdrawn");
                Ok(())
            }
            Abandoned::Unknown => Ok(()),
        }
    }

    // ---------------------------------------------------------------------
    // Running
    // ---------------------------------------------------------------------

    /// Process the next queued entry. Returns `false` once nothing is left.
    pub fn step(&mut self) -> Result<bool> {
        let Some(entry) = self.queue.pop() else {
            return Ok(false);
        };
        self.now = entry.t;
        self.steps += 1;
        match entry.action {
            Action::Fire(event, outcome) => {
                self.mark_fired(event, outcome)?;
                self.notify(event)?;
            }
            Action::Notify(event) => self.notify(event)?,
            Action::Resume(process, wake) => self.resume(process, wake)?,
        }
        Ok(true)
    }

    /// Run until no entries remain.
    pub fn run(&mut self) -> Result<RunSummary> {
        while self.step()? {}
        debug!(t = self.now, steps = self.steps, "simulation drained");
        Ok(self.summary())
    }

    /// Process every entry due before `until`, then move the clock to it.
    pub fn run_until(&mut self, until: Time) -> Result<RunSummary> {
        self.check_time(until)?;
        while self.peek().is_some_and(|t| t < until) {
            self.step()?;
        }
        self.now = until;
        Ok(self.summary())
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            end_time: self.now,
            steps: self.steps,
            processes_finished: self.finished,
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn insert(&mut self, kind: EventKind) -> EventId {
        self.events.push(EventSlot::new(kind));
        EventId(self.events.len() - 1)
    }

    fn push(&mut self, t: Time, action: Action) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry { t, seq, action });
    }

    fn check_time(&self, at: Time) -> Result<()> {
        // Negated so NaN is rejected too.
        if !(at >= self.now) {
            return Err(SimError::InvalidTime { at, now: self.now });
        }
        Ok(())
    }

    fn slot(&self, event: EventId) -> Result<&EventSlot> {
        self.events.get(event.0).ok_or(SimError::UnknownEvent(event))
    }

    fn owner(&self, request: EventId) -> Result<ResourceId> {
        match self.slot(request)?.kind {
            EventKind::Request { resource } => Ok(resource),
            _ => Err(SimError::NotARequest(request)),
        }
    }

    fn mark_fired(&mut self, event: EventId, outcome: Outcome) -> Result<()> {
        let now = self.now;
        let slot = self
            .events
            .get_mut(event.0)
            .ok_or(SimError::UnknownEvent(event))?;
        if slot.state.is_fired() {
            return Err(SimError::DoubleFire(event));
        }
        slot.state = EventState::Fired(outcome);
        debug!(t = now, %event, ?outcome, "event fired");
        Ok(())
    }

    fn grant(&mut self, granted: Vec<EventId>) -> Result<()> {
        for request in granted {
            self.fire(request, Outcome::Success)?;
        }
        Ok(())
    }

    fn notify(&mut self, event: EventId) -> Result<()> {
        let slot = &mut self.events[event.0];
        slot.notified = true;
        let waiters = std::mem::take(&mut slot.waiters);
        for waiter in waiters {
            match waiter {
                Waiter::Process(process) => self.resume(process, Wake::Fired(event))?,
                Waiter::AnyOf(composite) => self.check_any_of(composite)?,
            }
        }
        Ok(())
    }

    fn check_any_of(&mut self, composite: EventId) -> Result<()> {
        let slot = self.slot(composite)?;
        if slot.state.is_fired() {
            return Ok(());
        }
        let EventKind::AnyOf { constituents, .. } = &slot.kind else {
            return Ok(());
        };
        let fired: Vec<(EventId, Outcome)> = constituents
            .iter()
            .filter_map(|id| match self.events[id.0].state {
                EventState::Fired(outcome) => Some((*id, outcome)),
                EventState::Pending => None,
            })
            .collect();
        if fired.is_empty() {
            return Ok(());
        }
        if let EventKind::AnyOf { result, .. } = &mut self.events[composite.0].kind {
            *result = Some(AnyOfResult::new(fired));
        }
        self.fire(composite, Outcome::Success)
    }

    fn resume(&mut self, process: ProcessId, wake: Wake) -> Result<()> {
        let Some(mut running) = self.processes.get_mut(process.0).and_then(Option::take) else {
            return Ok(());
        };
        trace!(t = self.now, process = running.name(), ?wake, "process resumed");
        match running.resume(self, wake)? {
            Step::Wait(event) => {
                self.processes[process.0] = Some(running);
                self.wait(process, event)
            }
            Step::Done => {
                self.finished += 1;
                debug!(t = self.now, process = running.name(), "process finished");
                Ok(())
            }
        }
    }

    fn wait(&mut self, process: ProcessId, event: EventId) -> Result<()> {
        if self.slot(event)?.notified {
            self.push(self.now, Action::Resume(process, Wake::Fired(event)));
        } else {
            self.events[event.0].waiters.push(Waiter::Process(process));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    type Log = Vec<(Time, String)>;

    /// Waits on one event and logs when it wakes
    struct Waiting {
        name: String,
        event: EventId,
        started: bool,
    }

    impl Waiting {
        fn new(name: &str, event: EventId) -> Self {
            Waiting {
                name: name.to_string(),
                event,
                started: false,
            }
        }
    }

    impl Process<Log> for Waiting {
        fn name(&self) -> &str {
            &self.name
        }

        fn resume(&mut self, env: &mut Environment<Log>, _wake: Wake) -> Result<Step> {
            if !self.started {
                self.started = true;
                return Ok(Step::Wait(self.event));
            }
            let now = env.now();
            env.state_mut().push((now, self.name.clone()));
            Ok(Step::Done)
        }
    }

    fn names(log: &Log) -> Vec<&str> {
        log.iter().map(|(_, name)| name.as_str()).collect()
    }

    #[test]
    fn min_queue() {
        let mut queue = BinaryHeap::new();
        queue.push(Entry { t: 2.0, seq: 0, action: Action::Notify(EventId(0)) });
        queue.push(Entry { t: 1.0, seq: 1, action: Action::Notify(EventId(1)) });
        queue.push(Entry { t: 1.0, seq: 2, action: Action::Notify(EventId(2)) });
        assert_eq!(queue.pop().map(|e| e.seq), Some(1));
        assert_eq!(queue.pop().map(|e| e.seq), Some(2));
        assert_eq!(queue.pop().map(|e| e.seq), Some(0));
    }

    #[test]
    fn empty_environment_runs_to_zero() {
        let mut env = Environment::new(Log::new());
        let summary = env.run().unwrap();
        assert_eq!(summary.steps, 0);
        assert_eq!(summary.end_time, 0.0);
    }

    #[test]
    fn timeout_advances_clock() {
        let mut env = Environment::new(Log::new());
        let timeout = env.timeout(2.5).unwrap();
        assert_eq!(env.event_state(timeout).unwrap(), EventState::Pending);
        assert_eq!(env.due(timeout), Some(2.5));

        env.run().unwrap();

        assert_relative_eq!(env.now(), 2.5);
        assert_eq!(env.event_state(timeout).unwrap(), EventState::Fired(Outcome::Success));
    }

    #[test]
    fn schedule_in_the_past_fails() {
        let mut env = Environment::new(Log::new());
        env.timeout(5.0).unwrap();
        env.run().unwrap();

        let event = env.event();
        assert_eq!(
            env.schedule(event, 4.0),
            Err(SimError::InvalidTime { at: 4.0, now: 5.0 })
        );
        assert!(matches!(env.timeout(-1.0), Err(SimError::InvalidTime { .. })));
        assert!(matches!(env.schedule(event, f64::NAN), Err(SimError::InvalidTime { .. })));
    }

    #[test]
    fn second_fire_fails() {
        let mut env = Environment::new(Log::new());
        let event = env.event();
        env.fire(event, Outcome::Failure).unwrap();
        assert_eq!(env.fire(event, Outcome::Success), Err(SimError::DoubleFire(event)));
        assert_eq!(env.schedule(event, 1.0), Err(SimError::DoubleFire(event)));
        assert_eq!(env.event_state(event).unwrap(), EventState::Fired(Outcome::Failure));
    }

    #[test]
    fn scheduled_event_fired_early_aborts_run() {
        let mut env = Environment::new(Log::new());
        let event = env.event();
        env.schedule(event, 3.0).unwrap();
        env.fire(event, Outcome::Success).unwrap();
        assert_eq!(env.run(), Err(SimError::DoubleFire(event)));
    }

    #[test]
    fn equal_times_resolve_in_insertion_order() {
        let mut env = Environment::new(Log::new());
        let events: Vec<EventId> = (0..4).map(|_| env.event()).collect();
        for (i, event) in events.iter().enumerate() {
            env.spawn(Waiting::new(&format!("p{i}"), *event));
        }
        // Scheduled in reverse to make sure insertion order of the firing
        // decides, not event creation order.
        for event in events.iter().rev() {
            env.schedule(*event, 1.0).unwrap();
        }

        env.run().unwrap();

        assert_eq!(names(env.state()), vec!["p3", "p2", "p1", "p0"]);
    }

    #[test]
    fn waiters_resume_in_registration_order() {
        let mut env = Environment::new(Log::new());
        let event = env.timeout(1.0).unwrap();
        env.spawn(Waiting::new("first", event));
        env.spawn(Waiting::new("second", event));

        let summary = env.run().unwrap();

        assert_eq!(names(env.state()), vec!["first", "second"]);
        assert_eq!(summary.processes_finished, 2);
    }

    #[test]
    fn waiting_on_delivered_event_resumes_immediately() {
        let mut env = Environment::new(Log::new());
        let event = env.event();
        env.fire(event, Outcome::Success).unwrap();
        env.run().unwrap();

        let process = env.spawn(Waiting::new("late", event));
        env.run().unwrap();

        assert_eq!(names(env.state()), vec!["late"]);
        assert!(!env.is_alive(process));
    }

    #[test]
    fn any_of_needs_two_events() {
        let mut env = Environment::new(Log::new());
        let event = env.event();
        assert_eq!(env.any_of(&[event]), Err(SimError::InvalidCondition(1)));
        assert_eq!(
            env.any_of(&[event, EventId(99)]),
            Err(SimError::UnknownEvent(EventId(99)))
        );
    }

    #[test]
    fn any_of_fires_with_first_constituent_only() {
        let mut env = Environment::new(Log::new());
        let early = env.timeout(1.0).unwrap();
        let late = env.timeout(4.0).unwrap();
        let race = env.any_of(&[early, late]).unwrap();

        env.run_until(2.0).unwrap();

        let result = env.any_of_result(race).unwrap();
        assert!(result.contains(early));
        assert!(!result.contains(late));
        assert_eq!(result.len(), 1);
        assert_eq!(env.event_state(late).unwrap(), EventState::Pending);

        env.run().unwrap();
        assert_eq!(env.event_state(late).unwrap(), EventState::Fired(Outcome::Success));
        assert_relative_eq!(env.now(), 4.0);
        assert_eq!(env.any_of_result(race).unwrap().len(), 1);
    }

    #[test]
    fn any_of_captures_simultaneous_constituents() {
        let mut env = Environment::new(Log::new());
        let a = env.event();
        let b = env.event();
        let c = env.timeout(2.0).unwrap();
        let race = env.any_of(&[c, b, a]).unwrap();
        env.fire(a, Outcome::Success).unwrap();
        env.fire(b, Outcome::Failure).unwrap();

        env.run().unwrap();

        let result = env.any_of_result(race).unwrap();
        let fired: Vec<EventId> = result.iter().map(|(id, _)| *id).collect();
        // Both had fired by the time a's delivery reached the composite.
        assert_eq!(fired, vec![b, a]);
        assert_eq!(result.outcome(b), Some(Outcome::Failure));
        assert_eq!(env.event_state(c).unwrap(), EventState::Fired(Outcome::Success));
    }

    #[test]
    fn any_of_over_fired_event_fires_at_once() {
        let mut env = Environment::new(Log::new());
        let done = env.event();
        env.fire(done, Outcome::Success).unwrap();
        let never = env.event();

        let race = env.any_of(&[done, never]).unwrap();

        assert!(env.event_state(race).unwrap().is_fired());
        assert!(env.any_of_result(race).unwrap().contains(done));
    }

    #[test]
    fn run_until_stops_before_boundary() {
        let mut env = Environment::new(Log::new());
        let early = env.timeout(1.0).unwrap();
        let boundary = env.timeout(3.0).unwrap();

        let summary = env.run_until(3.0).unwrap();

        assert_eq!(summary.end_time, 3.0);
        assert!(env.event_state(early).unwrap().is_fired());
        assert!(env.event_state(boundary).unwrap().is_pending());
        assert_eq!(env.peek(), Some(3.0));
        assert!(matches!(env.run_until(1.0), Err(SimError::InvalidTime { .. })));
    }

    #[test]
    fn release_of_plain_event_is_rejected() {
        let mut env = Environment::new(Log::new());
        let event = env.event();
        assert_eq!(env.release(event), Err(SimError::NotARequest(event)));
    }

    #[test]
    fn release_of_unheld_request_fails() {
        let mut env = Environment::new(Log::new());
        let counter = env.add_resource(1).unwrap();
        let first = env.request(counter).unwrap();
        let second = env.request(counter).unwrap();

        assert_eq!(env.release(second), Err(SimError::NotHeld(second)));
        env.release(first).unwrap();
        assert_eq!(env.release(first), Err(SimError::NotHeld(first)));
    }

    #[test]
    fn independent_environments_do_not_interfere() {
        let mut left = Environment::new(Log::new());
        let mut right = Environment::new(Log::new());
        let a = left.timeout(1.0).unwrap();
        left.spawn(Waiting::new("left", a));
        let b = right.timeout(7.0).unwrap();
        right.spawn(Waiting::new("right", b));

        left.run().unwrap();

        assert_relative_eq!(left.now(), 1.0);
        assert_eq!(right.now(), 0.0);
        right.run().unwrap();
        assert_eq!(right.state()[0], (7.0, "right".to_string()));
    }
}
