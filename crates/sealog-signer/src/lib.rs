//! Batch signing coordinator.
//!
//! Signing requests are grouped by signing certificate: one sequential
//! worker per certificate collects concurrent requests into a batch, builds
//! an intra-batch hash chain, invokes the signing backend once for the
//! chain root, and fans a per-request chain fragment plus the shared
//! signature out to every waiting caller. Across different certificates
//! workers run in parallel.

mod backend;
mod batch;
mod error;
mod hashchain;
mod request;
mod signer;
mod worker;

#[cfg(test)]
mod tests;

pub use backend::SignerBackend;
pub use error::SignError;
pub use hashchain::{ChainFragment, ChainLink, HashChainBuilder};
pub use request::{MessagePart, SignatureData, SigningRequest};
pub use signer::BatchSigner;
