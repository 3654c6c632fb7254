//! Local VRF randomness oracle
//!
//! Signs `luckysix:round:<id>:<handle>` with a schnorrkel keypair and derives
//! the seed as SHA-256 of the signature. Fulfillments are sent on an mpsc
//! channel after the configured delay, which keeps delivery asynchronous with
//! respect to `close`. Each request spends one prepaid credit.

use crate::common::traits::RandomnessPort;
use crate::config::OracleConfig;
use crate::errors::{LotteryError, LotteryResult};
use crate::lottery::controller::RoundController;
use crate::lottery::pending_requests::PendingRequests;
use crate::lottery::types::{RequestHandle, Seed};
use async_trait::async_trait;
use schnorrkel::context::SigningContext;
use schnorrkel::{Keypair, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const VRF_SIGNING_CONTEXT: &[u8] = b"luckysix";

/// Seed plus the proof that it came from the oracle key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub round_id: u64,
    pub handle: RequestHandle,
    pub seed: Seed,
    /// Hex-encoded schnorrkel signature over `input_message`
    pub proof: String,
    pub public_key: String,
    pub input_message: String,
}

pub struct VrfOracle {
    keypair: Arc<Keypair>,
    credits: AtomicU64,
    delay: Duration,
    pending: PendingRequests,
    deliveries: mpsc::UnboundedSender<Fulfillment>,
}

impl VrfOracle {
    /// Create an oracle and the receiving end of its fulfillment channel
    pub fn new(keypair: Keypair, config: &OracleConfig) -> (Self, mpsc::UnboundedReceiver<Fulfillment>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let oracle = Self {
            keypair: Arc::new(keypair),
            credits: AtomicU64::new(config.prepaid_requests),
            delay: config.fulfillment_delay(),
            pending: PendingRequests::new(),
            deliveries: tx,
        };
        (oracle, rx)
    }

    /// Oracle with a fresh random keypair
    pub fn new_random(config: &OracleConfig) -> (Self, mpsc::UnboundedReceiver<Fulfillment>) {
        use rand_core::OsRng;
        Self::new(Keypair::generate_with(OsRng), config)
    }

    /// Prepay `requests` more fulfillments
    pub fn fund(&self, requests: u64) {
        let _ = self
            .credits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some(c.saturating_add(requests)));
    }

    pub fn credits(&self) -> u64 {
        self.credits.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    /// Withdraw a request; its fulfillment will never be sent
    pub fn cancel(&self, handle: &RequestHandle) -> bool {
        self.pending.remove_pending(handle)
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public.to_bytes())
    }

    fn fulfill(&self, round_id: u64, handle: RequestHandle) -> Fulfillment {
        let input_message = input_message(round_id, &handle);
        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        let signature = self.keypair.sign(ctx.bytes(input_message.as_bytes()));
        let signature_bytes = signature.to_bytes();

        Fulfillment {
            round_id,
            handle,
            seed: seed_from_signature(&signature_bytes),
            proof: hex::encode(signature_bytes),
            public_key: self.public_key_hex(),
            input_message,
        }
    }
}

#[async_trait]
impl RandomnessPort for VrfOracle {
    async fn request(&self, round_id: u64) -> LotteryResult<RequestHandle> {
        self.credits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1))
            .map_err(|_| {
                LotteryError::OracleUnavailable("no prepaid requests remaining".to_string())
            })?;

        let handle = RequestHandle::generate();
        let fulfillment = self.fulfill(round_id, handle.clone());
        self.pending.add_pending(handle.clone(), round_id);
        debug!("randomness requested for round {} as {}", round_id, handle);

        let pending = self.pending.clone();
        let deliveries = self.deliveries.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if pending.complete(&fulfillment.handle).is_none() {
                debug!("request {} cancelled before fulfillment", fulfillment.handle);
                return;
            }
            if deliveries.send(fulfillment).is_err() {
                warn!("fulfillment channel closed; randomness dropped");
            }
        });

        Ok(handle)
    }
}

fn input_message(round_id: u64, handle: &RequestHandle) -> String {
    format!("luckysix:round:{}:{}", round_id, handle)
}

fn seed_from_signature(signature: &[u8]) -> Seed {
    let mut hasher = Sha256::new();
    hasher.update(signature);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    Seed::new(bytes)
}

/// Check that a fulfillment was produced by its public key for its request
pub fn verify_fulfillment(fulfillment: &Fulfillment) -> Result<bool, String> {
    if fulfillment.input_message != input_message(fulfillment.round_id, &fulfillment.handle) {
        return Ok(false);
    }

    let public_key_bytes = hex::decode(&fulfillment.public_key)
        .map_err(|e| format!("invalid public key hex: {}", e))?;
    let public_key = PublicKey::from_bytes(&public_key_bytes)
        .map_err(|e| format!("invalid public key: {:?}", e))?;

    let proof = hex::decode(&fulfillment.proof).map_err(|e| format!("invalid proof hex: {}", e))?;
    let signature =
        Signature::from_bytes(&proof).map_err(|e| format!("invalid signature: {:?}", e))?;

    let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
    if public_key
        .verify(ctx.bytes(fulfillment.input_message.as_bytes()), &signature)
        .is_err()
    {
        return Ok(false);
    }

    Ok(seed_from_signature(&proof) == fulfillment.seed)
}

/// Forward verified fulfillments to the controller until the channel closes
pub fn spawn_delivery_loop(
    controller: Arc<RoundController>,
    mut fulfillments: mpsc::UnboundedReceiver<Fulfillment>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(fulfillment) = fulfillments.recv().await {
            match verify_fulfillment(&fulfillment) {
                Ok(true) => {}
                Ok(false) => {
                    warn!("discarding unverifiable fulfillment {}", fulfillment.handle);
                    continue;
                }
                Err(e) => {
                    warn!("malformed fulfillment {}: {}", fulfillment.handle, e);
                    continue;
                }
            }

            match controller
                .on_randomness_ready(&fulfillment.handle, fulfillment.seed)
                .await
            {
                Ok(Some(report)) => info!(
                    "round {} settled on delivery, paid {}",
                    report.round_id, report.total_paid
                ),
                Ok(None) => debug!("round {} drawn", fulfillment.round_id),
                Err(e) => warn!("delivery for round {} ignored: {}", fulfillment.round_id, e),
            }
        }
        debug!("fulfillment channel closed");
    })
}
