mod executor;
mod ops;

pub use executor::{
    settling_elapsed, OpStatus, SequenceFailure, SequenceProgress, SequenceState, Sequencer,
};
pub use ops::{
    build_sequence, CommitmentTier, LaunchParams, LedgerOperation, OperationSequence,
    PlannedOperation,
};
