//! Transaction pipeline: sequencing, assembly, and broadcast

pub mod assembler;
pub mod broadcaster;
pub mod sequencer;

pub use assembler::{AssemblerConfig, Fee, SignedTx, TxAssembler, TxEnvelope, TxSigner};
pub use broadcaster::Broadcaster;
pub use sequencer::Sequencer;
