#![deny(missing_docs)]
#![doc = "Measurement sequencing for circular weighings: balance variants, cancellation, monotonic time and the per-run state machine."]

/// Balance trait, collaborator traits and balance variants.
pub mod balance;
/// Cooperative abort flag.
pub mod cancel;
/// Monotonic clocks.
pub mod clock;
pub mod sequencer;

pub use balance::{
    AutoLoadingBalance, Balance, ComputerBalance, Instrument, ManualBalance, MassHandler,
    Operator, SimulatedBalance,
};
pub use cancel::CancellationToken;
pub use clock::{elapsed_minutes, Clock, SteppedClock, SystemClock};
pub use sequencer::{
    NoopObserver, NotStartedReason, SequenceObserver, SequenceOutcome, SequenceRequest,
    SequenceState, WeighingSequencer,
};
