use des::{Environment, EventId, Process, ResourceId, SimError, Step, Time, Wake};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use tracing::info;

use crate::journal::{Journal, Label};

/// State shared by every process of one bank simulation.
///
/// All draws come from the single seeded `rng`, so the order in which the
/// processes draw is part of what makes a run reproducible.
pub struct BankState {
    rng: StdRng,
    journal: Journal,
}

impl BankState {
    pub fn new(seed: u64) -> Self {
        BankState {
            rng: StdRng::seed_from_u64(seed),
            journal: Journal::new(),
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn into_journal(self) -> Journal {
        self.journal
    }

    fn record(&mut self, time: Time, customer: &str, label: Label) {
        info!(t = time, customer, %label, "transition");
        self.journal.push(time, customer, label);
    }

    fn draw_exp(&mut self, distribution: &Exp<f64>) -> Time {
        distribution.sample(&mut self.rng)
    }

    fn draw_patience(&mut self, min: Time, max: Time) -> Time {
        if max > min {
            self.rng.random_range(min..max)
        } else {
            min
        }
    }
}

/// Behaviour shared by every customer of a run
#[derive(Debug, Clone, Copy)]
pub struct CustomerProfile {
    pub min_patience: Time,
    pub max_patience: Time,
    pub service: Exp<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    WaitingForCounter { request: EventId, race: EventId },
    BeingServed { request: EventId },
    Finished,
}

/// One customer: arrives, races the counter against its patience, and is
/// either served or reneges.
///
/// When the counter is granted in the same instant the patience runs out,
/// the customer is served: the race result is checked for the request first.
pub struct Customer {
    name: String,
    counter: ResourceId,
    profile: CustomerProfile,
    arrived: Time,
    phase: Phase,
}

impl Customer {
    pub fn new(name: String, counter: ResourceId, profile: CustomerProfile) -> Self {
        Customer {
            name,
            counter,
            profile,
            arrived: 0.0,
            phase: Phase::Created,
        }
    }

    fn arrive(&mut self, env: &mut Environment<BankState>) -> des::Result<Step> {
        self.arrived = env.now();
        env.state_mut().record(self.arrived, &self.name, Label::Arrived);

        let request = env.request(self.counter)?;
        let patience = env
            .state_mut()
            .draw_patience(self.profile.min_patience, self.profile.max_patience);
        let timeout = env.timeout(patience)?;
        let race = env.any_of(&[request, timeout])?;

        self.phase = Phase::WaitingForCounter { request, race };
        Ok(Step::Wait(race))
    }

    fn settle(
        &mut self,
        env: &mut Environment<BankState>,
        request: EventId,
        race: EventId,
    ) -> des::Result<Step> {
        let now = env.now();
        let wait = now - self.arrived;
        let served = env
            .any_of_result(race)
            .is_some_and(|result| result.contains(request));

        if served {
            env.state_mut().record(now, &self.name, Label::Waited(wait));
            let service = env.state_mut().draw_exp(&self.profile.service);
            let done = env.timeout(service)?;
            self.phase = Phase::BeingServed { request };
            Ok(Step::Wait(done))
        } else {
            env.state_mut().record(now, &self.name, Label::Reneged(wait));
            env.abandon(request)?;
            self.phase = Phase::Finished;
            Ok(Step::Done)
        }
    }

    fn leave(&mut self, env: &mut Environment<BankState>, request: EventId) -> des::Result<Step> {
        env.release(request)?;
        let now = env.now();
        env.state_mut().record(now, &self.name, Label::Finished);
        self.phase = Phase::Finished;
        Ok(Step::Done)
    }
}

impl Process<BankState> for Customer {
    fn name(&self) -> &str {
        &self.name
    }

    fn resume(&mut self, env: &mut Environment<BankState>, wake: Wake) -> des::Result<Step> {
        match (self.phase, wake) {
            (Phase::Created, Wake::Start) => self.arrive(env),
            (Phase::WaitingForCounter { request, race }, Wake::Fired(event)) if event == race => {
                self.settle(env, request, race)
            }
            (Phase::BeingServed { request }, Wake::Fired(_)) => self.leave(env, request),
            (phase, wake) => Err(SimError::Process {
                name: self.name.clone(),
                message: format!("unexpected {:?} while {:?}", wake, phase),
            }),
        }
    }
}

/// Spawns `count` customers, spaced by exponential inter-arrival times.
pub struct Source {
    count: usize,
    spawned: usize,
    counter: ResourceId,
    interval: Exp<f64>,
    profile: CustomerProfile,
}

impl Source {
    pub fn new(count: usize, counter: ResourceId, interval: Exp<f64>, profile: CustomerProfile) -> Self {
        Source {
            count,
            spawned: 0,
            counter,
            interval,
            profile,
        }
    }
}

impl Process<BankState> for Source {
    fn name(&self) -> &str {
        "source"
    }

    fn resume(&mut self, env: &mut Environment<BankState>, _wake: Wake) -> des::Result<Step> {
        if self.spawned == self.count {
            return Ok(Step::Done);
        }
        self.spawned += 1;
        let name = format!("Customer #{}", self.spawned);
        env.spawn(Customer::new(name, self.counter, self.profile));

        let gap = env.state_mut().draw_exp(&self.interval);
        Ok(Step::Wait(env.timeout(gap)?))
    }
}
