//! Signing request and response data.

use bytes::Bytes;
use sealog_types::{HashAlg, to_hex};

use crate::hashchain::ChainFragment;

/// One part of a message to be covered by a signature (the message itself
/// or an attachment).
#[derive(Debug, Clone)]
pub struct MessagePart {
    /// Part name, e.g. `message` or `attachment1`.
    pub name: String,
    /// Raw part content.
    pub data: Bytes,
}

impl MessagePart {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Digest of the part content under `alg`, lowercase hex.
    pub fn digest_hex(&self, alg: HashAlg) -> String {
        to_hex(&alg.digest(&self.data))
    }
}

/// A request to sign one message (with optional attachments) using a
/// specific signing certificate.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    /// DER encoding of the signing certificate; requests are grouped into
    /// batches by this certificate.
    pub signing_cert: Bytes,
    /// Key id addressing the private key in the signing backend.
    pub key_id: String,
    /// Signature algorithm identifier passed through to the backend.
    pub signature_algorithm: String,
    /// Digest algorithm for the hash chain.
    pub digest_alg: HashAlg,
    /// Message parts covered by the signature.
    pub parts: Vec<MessagePart>,
}

impl SigningRequest {
    /// True when the request consists of a single message part; such a
    /// request signed alone needs no hash chain.
    pub fn is_single_message(&self) -> bool {
        self.parts.len() == 1
    }
}

/// Signature response fanned out to a caller.
///
/// For batch signatures the signature covers the chain root and the caller
/// verifies its own parts through the fragment; for a plain signature both
/// chain fields are `None`.
#[derive(Debug, Clone)]
pub struct SignatureData {
    /// Raw signature bytes from the backend.
    pub signature: Vec<u8>,
    /// Lowercase-hex root of the intra-batch hash chain, if one was built.
    pub chain_root: Option<String>,
    /// This caller's fragment of the hash chain, if one was built.
    pub chain_fragment: Option<ChainFragment>,
}

impl SignatureData {
    /// True when this signature was produced over a hash chain.
    pub fn is_batch_signature(&self) -> bool {
        self.chain_root.is_some()
    }
}
