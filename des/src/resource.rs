use std::collections::VecDeque;
use std::fmt;

use crate::error::{Result, SimError};
use crate::event::EventId;

/// Handle to a resource owned by an `Environment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub(crate) usize);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource #{}", self.0)
    }
}

/// Running totals kept by a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    pub requests: usize,
    pub grants: usize,
    pub releases: usize,
    pub abandoned: usize,
}

/// What `Resource::abandon` did with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Abandoned {
    /// Removed from the wait queue before it was granted
    Withdrawn,
    /// Had already been granted, so it was released; carries any requests
    /// granted as a result
    Released(Vec<EventId>),
    /// Neither queued nor held (already released or abandoned)
    Unknown,
}

/// Fixed-capacity resource granting requests strictly in arrival order.
///
/// The resource only keeps the ledger. Every method that can grant capacity
/// returns the requests it granted so the environment can fire them.
#[derive(Debug, Clone)]
pub struct Resource {
    capacity: usize,
    users: Vec<EventId>,
    queue: VecDeque<EventId>,
    stats: ResourceStats,
}

impl Resource {
    pub fn new(capacity: usize) -> Result<Resource> {
        if capacity == 0 {
            return Err(SimError::InvalidCapacity(capacity));
        }
        Ok(Resource {
            capacity,
            users: Vec::new(),
            queue: VecDeque::new(),
            stats: ResourceStats::default(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of granted, unreleased requests
    pub fn usage(&self) -> usize {
        self.users.len()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Requests still waiting, head first
    pub fn queued(&self) -> impl Iterator<Item = &EventId> {
        self.queue.iter()
    }

    pub fn is_held(&self, request: EventId) -> bool {
        self.users.contains(&request)
    }

    pub fn is_queued(&self, request: EventId) -> bool {
        self.queue.contains(&request)
    }

    pub fn is_at_capacity(&self) -> bool {
        self.users.len() == self.capacity
    }

    pub fn stats(&self) -> ResourceStats {
        self.stats
    }

    /// Append a request to the queue and run a grant pass.
    pub fn enqueue(&mut self, request: EventId) -> Vec<EventId> {
        self.stats.requests += 1;
        self.queue.push_back(request);
        self.grant()
    }

    /// Give back the capacity held by `request` and run a grant pass.
    pub fn release(&mut self, request: EventId) -> Result<Vec<EventId>> {
        let position = self
            .users
            .iter()
            .position(|user| *user == request)
            .ok_or(SimError::NotHeld(request))?;
        self.users.remove(position);
        self.stats.releases += 1;
        Ok(self.grant())
    }

    /// Drop a request the caller no longer wants.
    ///
    /// A queued request is withdrawn without touching usage or the order of
    /// the rest of the queue. A request that was granted before the caller
    /// got round to abandoning it is released instead.
    pub fn abandon(&mut self, request: EventId) -> Abandoned {
        if let Some(position) = self.queue.iter().position(|queued| *queued == request) {
            self.queue.remove(position);
            self.stats.abandoned += 1;
            return Abandoned::Withdrawn;
        }
        match self.release(request) {
            Ok(granted) => Abandoned::Released(granted),
            Err(_) => Abandoned::Unknown,
        }
    }

    fn grant(&mut self) -> Vec<EventId> {
        let mut granted = Vec::new();
        while self.users.len() < self.capacity {
            match self.queue.pop_front() {
                Some(request) => {
                    self.users.push(request);
                    self.stats.grants += 1;
                    granted.push(request);
                }
                None => break,
            }
        }
        granted
    }
}
