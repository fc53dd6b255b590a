//! Value-transfer tracer.
//!
//! Records every movement of native currency during one transaction: the
//! outer call, nested calls and creations that carry value, and
//! self-destruct payouts. Frame 0 is always the outer call, even when it
//! moves nothing.
//!
//! A [`TracerHandle`] can stop the tracer from another thread. After a stop
//! no further frames are recorded, the next nested frame is cancelled and
//! execution unwinds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use parking_lot::Mutex;
use revm::interpreter::{
    CallInputs, CallOutcome, CallScheme, CreateInputs, CreateOutcome, Gas, InstructionResult, Interpreter,
    InterpreterResult,
};
use revm::primitives::CreateScheme;
use revm::{Database, EvmContext, Inspector};
use serde::{Deserialize, Serialize};

use crate::deadline::{Deadline, CHECK_INTERVAL};

/// Name under which the tracer is registered.
pub const TRANSFER_TRACER: &str = "transferTracer";

/// Reason recorded when the deadline stops a trace.
pub const TIMEOUT_REASON: &str = "execution timeout";

/// One native-currency movement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFrame {
    /// `CALL`, `CALLCODE`, `DELEGATECALL`, `STATICCALL`, `CREATE`, `CREATE2` or `SELFDESTRUCT`.
    #[serde(rename = "type")]
    pub kind: String,
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// JSON document produced by the tracer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTrace {
    pub transfers: Vec<TransferFrame>,
}

/// Output of a finished or stopped trace.
#[derive(Clone, Debug, PartialEq)]
pub struct TracerResult {
    pub output: serde_json::Value,
    /// Stop reason when the trace was interrupted.
    pub error: Option<String>,
}

/// Thread-safe stop switch for a running [`TransferTracer`].
#[derive(Clone, Debug, Default)]
pub struct TracerHandle {
    interrupted: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl TracerHandle {
    /// Requests the tracer to stop. The latest reason wins.
    pub fn stop(&self, reason: impl Into<String>) {
        *self.reason.lock() = Some(reason.into());
        self.interrupted.store(true, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    fn reason(&self) -> Option<String> {
        if !self.is_interrupted() {
            return None;
        }
        Some(self.reason.lock().clone().unwrap_or_else(|| "interrupted".to_string()))
    }
}

#[derive(Debug)]
pub struct TransferTracer {
    frames: Vec<TransferFrame>,
    handle: TracerHandle,
    deadline: Deadline,
    steps: u64,
    cancel_requested: bool,
}

impl Default for TransferTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferTracer {
    pub fn new() -> Self {
        Self {
            frames: vec![TransferFrame::default()],
            handle: TracerHandle::default(),
            deadline: Deadline::none(),
            steps: 0,
            cancel_requested: false,
        }
    }

    /// Stops the trace with [`TIMEOUT_REASON`] once `deadline` passes,
    /// checked at frame boundaries and periodically between opcodes.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn handle(&self) -> TracerHandle {
        self.handle.clone()
    }

    pub fn frames(&self) -> &[TransferFrame] {
        &self.frames
    }

    /// Serializes the recorded frames as `{"transfers": [...]}`.
    pub fn get_result(&self) -> Result<TracerResult, serde_json::Error> {
        #[derive(Serialize)]
        struct Output<'a> {
            transfers: &'a [TransferFrame],
        }

        let output = serde_json::to_value(Output { transfers: &self.frames })?;
        Ok(TracerResult { output, error: self.handle.reason() })
    }

    fn start(&mut self, from: Address, to: Address, value: U256) {
        self.frames[0] = TransferFrame { kind: "CALL".to_string(), from, to, value };
    }

    fn check_deadline(&mut self) {
        if self.deadline.expired() && !self.handle.is_interrupted() {
            self.handle.stop(TIMEOUT_REASON);
        }
    }

    /// Returns `false` if the frame must be cancelled instead of traced.
    fn enter(&mut self, kind: &str, from: Address, to: Address, value: U256) -> bool {
        self.check_deadline();
        if self.handle.is_interrupted() {
            self.cancel_requested = true;
            return false;
        }
        if !value.is_zero() {
            self.frames.push(TransferFrame { kind: kind.to_string(), from, to, value });
        }
        true
    }
}

fn call_kind(scheme: CallScheme) -> &'static str {
    match scheme {
        CallScheme::Call | CallScheme::ExtCall => "CALL",
        CallScheme::CallCode => "CALLCODE",
        CallScheme::DelegateCall | CallScheme::ExtDelegateCall => "DELEGATECALL",
        CallScheme::StaticCall | CallScheme::ExtStaticCall => "STATICCALL",
    }
}

fn create_kind(scheme: CreateScheme) -> &'static str {
    match scheme {
        CreateScheme::Create => "CREATE",
        CreateScheme::Create2 { .. } => "CREATE2",
    }
}

fn cancelled(gas_limit: u64) -> InterpreterResult {
    InterpreterResult::new(InstructionResult::Revert, Bytes::new(), Gas::new(gas_limit))
}

impl<DB: Database> Inspector<DB> for TransferTracer {
    fn step(&mut self, interp: &mut Interpreter, _context: &mut EvmContext<DB>) {
        if !self.cancel_requested && self.deadline.is_bounded() {
            self.steps += 1;
            if self.steps % CHECK_INTERVAL == 0 && self.deadline.expired() {
                self.check_deadline();
                self.cancel_requested = true;
            }
        }
        if self.cancel_requested {
            interp.instruction_result = InstructionResult::Revert;
        }
    }

    fn call(&mut self, context: &mut EvmContext<DB>, inputs: &mut CallInputs) -> Option<CallOutcome> {
        if context.journaled_state.depth == 0 {
            self.start(inputs.caller, inputs.target_address, inputs.call_value());
            return None;
        }
        // Delegated and static frames move no value of their own.
        let value = inputs.transfer_value().unwrap_or_default();
        // CALLCODE runs in the caller's context; report the code account.
        let to = match inputs.scheme {
            CallScheme::CallCode => inputs.bytecode_address,
            _ => inputs.target_address,
        };
        if self.enter(call_kind(inputs.scheme), inputs.caller, to, value) {
            return None;
        }
        Some(CallOutcome::new(cancelled(inputs.gas_limit), inputs.return_memory_offset.clone()))
    }

    fn create(&mut self, context: &mut EvmContext<DB>, inputs: &mut CreateInputs) -> Option<CreateOutcome> {
        let nonce = context
            .journaled_state
            .state
            .get(&inputs.caller)
            .map(|account| account.info.nonce)
            .unwrap_or_default();
        let created = inputs.created_address(nonce);

        if context.journaled_state.depth == 0 {
            self.frames[0] = TransferFrame { kind: "CREATE".to_string(), from: inputs.caller, to: created, value: inputs.value };
            return None;
        }
        if self.enter(create_kind(inputs.scheme), inputs.caller, created, inputs.value) {
            return None;
        }
        Some(CreateOutcome::new(cancelled(inputs.gas_limit), None))
    }

    fn selfdestruct(&mut self, contract: Address, target: Address, value: U256) {
        self.enter("SELFDESTRUCT", contract, target, value);
    }
}
