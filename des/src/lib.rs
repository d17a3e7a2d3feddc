//! Process-oriented discrete-event simulation.
//!
//! An [`Environment`] owns a virtual clock and a queue of timed entries.
//! [`Process`]es are explicit state machines that run until they suspend on
//! an event and are resumed by the environment when it fires. Events can be
//! plain, timeouts, [`Resource`] requests, or any-of composites that race
//! several events against each other.
//!
//! ```rust
//! use des::{Environment, Process, Result, Step, Wake};
//!
//! /// Takes the counter for two time units, then leaves.
//! struct Clerk {
//!     counter: des::ResourceId,
//!     request: Option<des::EventId>,
//! }
//!
//! impl Process<Vec<f64>> for Clerk {
//!     fn name(&self) -> &str {
//!         "clerk"
//!     }
//!
//!     fn resume(&mut self, env: &mut Environment<Vec<f64>>, wake: Wake) -> Result<Step> {
//!         match (wake, self.request) {
//!             (Wake::Start, _) => {
//!                 let request = env.request(self.counter)?;
//!                 self.request = Some(request);
//!                 Ok(Step::Wait(request))
//!             }
//!             (Wake::Fired(event), Some(request)) if event == request => {
//!                 Ok(Step::Wait(env.timeout(2.0)?))
//!             }
//!             (Wake::Fired(_), Some(request)) => {
//!                 env.release(request)?;
//!                 let now = env.now();
//!                 env.state_mut().push(now);
//!                 Ok(Step::Done)
//!             }
//!             (Wake::Fired(_), None) => Ok(Step::Done),
//!         }
//!     }
//! }
//!
//! let mut env = Environment::new(Vec::new());
//! let counter = env.add_resource(1)?;
//! env.spawn(Clerk { counter, request: None });
//! env.spawn(Clerk { counter, request: None });
//! env.run()?;
//!
//! assert_eq!(env.state(), &vec![2.0, 4.0]);
//! # Ok::<(), des::SimError>(())
//! ```

pub mod error;
pub mod event;
pub mod parallel;
pub mod process;
pub mod resource;
pub mod scheduler;

/// Virtual time
pub type Time = f64;

pub use error::{Result, SimError};
pub use event::{AnyOfResult, EventId, EventState, Outcome};
pub use process::{Process, ProcessId, Step, Wake};
pub use resource::{Resource, ResourceId, ResourceStats};
pub use scheduler::{Environment, RunSummary};
