//! Worker registry: routes sign requests to per-certificate workers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sealog_types::{HashAlg, to_hex};
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::backend::SignerBackend;
use crate::error::SignError;
use crate::request::{SignatureData, SigningRequest};
use crate::worker::{SignJob, spawn_worker};

/// Time bound for one signing round.
const SIGN_TIMEOUT: Duration = Duration::from_secs(10);

/// Batch signing front end.
///
/// Requests for the same signing certificate are serialized through one
/// worker (addressed by certificate hash) and sealed in batches; requests
/// for different certificates sign in parallel.
pub struct BatchSigner {
    backend: Arc<dyn SignerBackend>,
    timeout: Duration,
    workers: Mutex<HashMap<String, mpsc::UnboundedSender<SignJob>>>,
}

impl BatchSigner {
    pub fn new(backend: Arc<dyn SignerBackend>) -> Self {
        Self::with_timeout(backend, SIGN_TIMEOUT)
    }

    /// Override the signing time bound (tests use short bounds).
    pub fn with_timeout(backend: Arc<dyn SignerBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Submit a signing request and await its batch's outcome.
    ///
    /// Suspends until the owning worker's current round completes. Every
    /// caller of one batch receives the shared signature with its own chain
    /// fragment, or all receive the same error.
    pub async fn sign(&self, request: SigningRequest) -> Result<SignatureData, SignError> {
        let cert_hash = to_hex(&HashAlg::Sha256.digest(&request.signing_cert));
        let (tx, rx) = oneshot::channel();
        let job = SignJob {
            request,
            responder: tx,
            created: Instant::now(),
        };

        self.mailbox_for(&cert_hash)
            .send(job)
            .map_err(|_| SignError::WorkerStopped)?;

        rx.await.map_err(|_| SignError::WorkerStopped)?
    }

    /// Drop all worker mailboxes; workers finish their in-flight round and
    /// stop.
    pub fn shutdown(&self) {
        self.workers.lock().expect("worker registry poisoned").clear();
    }

    /// Find the worker for a certificate, creating it on first use or after
    /// a previous worker stopped.
    fn mailbox_for(&self, cert_hash: &str) -> mpsc::UnboundedSender<SignJob> {
        let mut workers = self.workers.lock().expect("worker registry poisoned");
        match workers.get(cert_hash) {
            Some(tx) if !tx.is_closed() => tx.clone(),
            _ => {
                trace!(cert = %cert_hash, "creating signing worker");
                let tx = spawn_worker(cert_hash.to_string(), self.backend.clone(), self.timeout);
                workers.insert(cert_hash.to_string(), tx.clone());
                tx
            }
        }
    }
}
