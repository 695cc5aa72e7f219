//! Per-batch signature context: accumulated requests and waiting callers.

use sealog_types::HashAlg;
use tokio::sync::oneshot;

use crate::error::SignError;
use crate::hashchain::{ChainFragment, HashChainBuilder};
use crate::request::{SignatureData, SigningRequest};

/// Ephemeral aggregate of one signing round: the requests being sealed
/// under a single backend signature and the callers waiting for it.
/// Created when a worker starts a round, destroyed once the response has
/// fanned out.
pub(crate) struct BatchSignatureCtx {
    key_id: String,
    signature_algorithm: String,
    digest_alg: HashAlg,
    requests: Vec<SigningRequest>,
    clients: Vec<oneshot::Sender<Result<SignatureData, SignError>>>,
    chain: Option<(String, Vec<ChainFragment>)>,
}

impl BatchSignatureCtx {
    pub(crate) fn new(first: &SigningRequest) -> Self {
        Self {
            key_id: first.key_id.clone(),
            signature_algorithm: first.signature_algorithm.clone(),
            digest_alg: first.digest_alg,
            requests: Vec::new(),
            clients: Vec::new(),
            chain: None,
        }
    }

    pub(crate) fn add(
        &mut self,
        request: SigningRequest,
        client: oneshot::Sender<Result<SignatureData, SignError>>,
    ) {
        self.requests.push(request);
        self.clients.push(client);
    }

    pub(crate) fn key_id(&self) -> &str {
        &self.key_id
    }

    pub(crate) fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }

    /// Digest handed to the signing backend.
    ///
    /// A lone request with a single message part is signed directly, no
    /// chain. Anything else builds the batch hash chain and signs its root.
    pub(crate) fn data_to_be_signed(&mut self) -> Result<Vec<u8>, SignError> {
        let [only] = self.requests.as_slice() else {
            return Ok(self.build_chain());
        };
        if only.is_single_message() {
            return Ok(self.digest_alg.digest(&only.parts[0].data));
        }
        Ok(self.build_chain())
    }

    fn build_chain(&mut self) -> Vec<u8> {
        let mut builder = HashChainBuilder::new(self.digest_alg);
        for request in &self.requests {
            let inputs: Vec<Vec<u8>> = request
                .parts
                .iter()
                .map(|part| self.digest_alg.digest(&part.data))
                .collect();
            builder.add_inputs(&inputs);
        }
        let (root, fragments) = builder.finish();
        let digest = self.digest_alg.digest(root.as_bytes());
        self.chain = Some((root, fragments));
        digest
    }

    /// Fan a successful signature out to every waiting caller, each with
    /// its own chain fragment.
    pub(crate) fn send_response(self, signature: Vec<u8>) {
        let chain = self.chain;
        for (index, client) in self.clients.into_iter().enumerate() {
            let data = SignatureData {
                signature: signature.clone(),
                chain_root: chain.as_ref().map(|(root, _)| root.clone()),
                chain_fragment: chain
                    .as_ref()
                    .map(|(_, fragments)| fragments[index].clone()),
            };
            // A caller that gave up waiting is fine to drop.
            let _ = client.send(Ok(data));
        }
    }

    /// Fan the same error out to every waiting caller; no partial fan-out.
    pub(crate) fn send_error(self, error: SignError) {
        for client in self.clients {
            let _ = client.send(Err(error.clone()));
        }
    }
}
