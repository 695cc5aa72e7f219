//! Tests for the batch signing crate.


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use sealog_types::HashAlg;

use crate::backend::SignerBackend;
use crate::error::SignError;
use crate::request::{MessagePart, SigningRequest};

/// Scriptable in-memory signing backend.
pub(crate) struct MockBackend {
    pub batch_enabled: bool,
    pub probe_fails: bool,
    pub sign_fails: AtomicBool,
    pub sign_delay_ms: AtomicU64,
    pub sign_calls: AtomicUsize,
}

impl MockBackend {
    pub(crate) fn new(batch_enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            batch_enabled,
            probe_fails: false,
            sign_fails: AtomicBool::new(false),
            sign_delay_ms: AtomicU64::new(0),
            sign_calls: AtomicUsize::new(0),
        })
    }

    /// A backend whose batch capability cannot be determined.
    pub(crate) fn probe_failing() -> Arc<Self> {
        Arc::new(Self {
            batch_enabled: true,
            probe_fails: true,
            sign_fails: AtomicBool::new(false),
            sign_delay_ms: AtomicU64::new(0),
            sign_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl SignerBackend for MockBackend {
    async fn batch_signing_enabled(&self, _key_id: &str) -> Result<bool, SignError> {
        if self.probe_fails {
            return Err(SignError::backend("probe unavailable"));
        }
        Ok(self.batch_enabled)
    }

    async fn sign(
        &self,
        key_id: &str,
        _signature_algorithm: &str,
        digest: &[u8],
    ) -> Result<Vec<u8>, SignError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.sign_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.sign_fails.load(Ordering::SeqCst) {
            return Err(SignError::backend("token says no"));
        }
        // "Signature": key id prefix + the digest, good enough to assert
        // which digest got signed.
        let mut sig = key_id.as_bytes().to_vec();
        sig.extend_from_slice(digest);
        Ok(sig)
    }
}

pub(crate) fn request(cert: &[u8], parts: &[&[u8]]) -> SigningRequest {
    SigningRequest {
        signing_cert: Bytes::copy_from_slice(cert),
        key_id: "key-1".to_string(),
        signature_algorithm: "SHA256withRSA".to_string(),
        digest_alg: HashAlg::Sha256,
        parts: parts
            .iter()
            .enumerate()
            .map(|(i, data)| MessagePart::new(format!("part{i}"), data.to_vec()))
            .collect(),
    }
}

/// Leaf digest of a request, as the chain builder computes it.
pub(crate) fn leaf_digest(req: &SigningRequest) -> String {
    let mut concat = Vec::new();
    for part in &req.parts {
        concat.extend_from_slice(&req.digest_alg.digest(&part.data));
    }
    req.digest_alg.digest_hex(&concat)
}
