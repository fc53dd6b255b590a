//! Wall-clock limits for simulation requests.

use std::time::{Duration, Instant};

use revm::interpreter::{InstructionResult, Interpreter};
use revm::{Database, EvmContext, Inspector};

/// Opcodes executed between clock reads.
pub(crate) const CHECK_INTERVAL: u64 = 1024;

/// Point in time after which a request must stop. A zero budget means no limit.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Option<Instant>,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        if budget.is_zero() {
            return Self::none();
        }
        Self { at: Instant::now().checked_add(budget), budget }
    }

    pub fn none() -> Self {
        Self { at: None, budget: Duration::ZERO }
    }

    pub fn is_bounded(&self) -> bool {
        self.at.is_some()
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

/// Reverts every running frame once the deadline has passed.
///
/// The engine has no external cancellation hook, so the check runs inside
/// the interpreter loop and flags the run as aborted.
#[derive(Debug)]
pub struct DeadlineInspector {
    deadline: Deadline,
    steps: u64,
    fired: bool,
}

impl DeadlineInspector {
    pub fn new(deadline: Deadline) -> Self {
        Self { deadline, steps: 0, fired: false }
    }

    /// Whether execution was cut short by the deadline.
    pub fn fired(&self) -> bool {
        self.fired
    }
}

impl<DB: Database> Inspector<DB> for DeadlineInspector {
    fn step(&mut self, interp: &mut Interpreter, _context: &mut EvmContext<DB>) {
        if self.fired {
            interp.instruction_result = InstructionResult::Revert;
            return;
        }
        if !self.deadline.is_bounded() {
            return;
        }
        self.steps += 1;
        if self.steps % CHECK_INTERVAL == 0 && self.deadline.expired() {
            self.fired = true;
            interp.instruction_result = InstructionResult::Revert;
        }
    }
}
