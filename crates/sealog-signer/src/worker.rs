//! Per-certificate signing worker: a sequential task owning a mailbox.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::backend::SignerBackend;
use crate::batch::BatchSignatureCtx;
use crate::error::SignError;
use crate::request::{SignatureData, SigningRequest};

/// One queued sign request with its waiting caller.
pub(crate) struct SignJob {
    pub(crate) request: SigningRequest,
    pub(crate) responder: oneshot::Sender<Result<SignatureData, SignError>>,
    pub(crate) created: Instant,
}

/// Spawn the sequential worker for one certificate hash. All requests for
/// the certificate flow through the returned mailbox; the worker stops once
/// every sender is dropped.
pub(crate) fn spawn_worker(
    cert_hash: String,
    backend: Arc<dyn SignerBackend>,
    timeout: Duration,
) -> mpsc::UnboundedSender<SignJob> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(cert_hash, backend, timeout, rx));
    tx
}

async fn run(
    cert_hash: String,
    backend: Arc<dyn SignerBackend>,
    timeout: Duration,
    mut rx: mpsc::UnboundedReceiver<SignJob>,
) {
    debug!(cert = %cert_hash, "signing worker started");
    // Probed once, on the first request.
    let mut batch_enabled: Option<bool> = None;

    while let Some(first) = rx.recv().await {
        let Some(first) = reject_unusable(first, timeout) else {
            continue;
        };

        let enabled = match batch_enabled {
            Some(enabled) => enabled,
            None => {
                // Fail safe: an unprobeable token signs one request at a
                // time rather than not at all.
                let enabled = match backend.batch_signing_enabled(&first.request.key_id).await {
                    Ok(enabled) => enabled,
                    Err(e) => {
                        warn!(cert = %cert_hash, error = %e,
                            "batch signing probe failed, falling back to single signing");
                        false
                    }
                };
                batch_enabled = Some(enabled);
                enabled
            }
        };

        let mut ctx = BatchSignatureCtx::new(&first.request);
        ctx.add(first.request, first.responder);

        if enabled {
            // Collect everything already queued into this batch; requests
            // arriving later wait for the next round.
            while let Ok(job) = rx.try_recv() {
                if let Some(job) = reject_unusable(job, timeout) {
                    ctx.add(job.request, job.responder);
                }
            }
        }

        trace!(cert = %cert_hash, requests = ctx.len(), "processing signing round");
        sign_round(&*backend, ctx, timeout).await;
    }
    debug!(cert = %cert_hash, "signing worker stopped");
}

/// Drop jobs that already exceeded the time bound or carry nothing to sign.
fn reject_unusable(job: SignJob, timeout: Duration) -> Option<SignJob> {
    if job.created.elapsed() >= timeout {
        let _ = job.responder.send(Err(SignError::Timeout));
        return None;
    }
    if job.request.parts.is_empty() {
        let _ = job.responder.send(Err(SignError::EmptyRequest));
        return None;
    }
    Some(job)
}

/// Run one signing round: digest, backend call under the time bound, fan
/// out. All callers of the round receive the signature or all receive the
/// same error.
async fn sign_round(backend: &dyn SignerBackend, mut ctx: BatchSignatureCtx, timeout: Duration) {
    let digest = match ctx.data_to_be_signed() {
        Ok(digest) => digest,
        Err(e) => {
            ctx.send_error(e);
            return;
        }
    };

    let signed = tokio::time::timeout(
        timeout,
        backend.sign(ctx.key_id(), ctx.signature_algorithm(), &digest),
    )
    .await;

    match signed {
        Ok(Ok(signature)) => ctx.send_response(signature),
        Ok(Err(e)) => ctx.send_error(e),
        Err(_elapsed) => ctx.send_error(SignError::Timeout),
    }
}
