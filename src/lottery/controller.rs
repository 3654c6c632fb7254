//! Round state machine
//!
//! `RoundController` is the single owner of the active round and its ticket
//! ledger. Every mutating operation takes the round lock, so entries, closing,
//! randomness delivery, settlement and resets are serialized against each other.
//!
//! ```text
//! IDLE --start--> OPEN --close--> CALCULATING --settle--> IDLE
//!                                    |  ^
//!              on_randomness_ready --+--+ (draws; settles too with auto_settle)
//! reset: any state --> IDLE, stakes forfeited
//! ```

use crate::common::traits::{FundsTransfer, OperatorCheck, RandomnessPort};
use crate::config::LotteryConfig;
use crate::errors::{LotteryError, LotteryResult, TicketError};
use crate::lottery::draw_engine::DrawEngine;
use crate::lottery::ledger::TicketLedger;
use crate::lottery::payout::PayoutCalculator;
use crate::lottery::settlement::{self, PlayerPayout, SettlementReport};
use crate::lottery::types::{
    PlayerId, RequestHandle, RoundEvent, RoundSnapshot, RoundState, Seed, Ticket,
};
use crate::metrics::LotteryMetrics;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1_024;

#[derive(Debug)]
struct Round {
    id: u64,
    state: RoundState,
    ledger: TicketLedger,
    pending_request: Option<RequestHandle>,
    seed: Option<Seed>,
    drawn_sequence: Option<Vec<u32>>,
    last_report: Option<SettlementReport>,
}

impl Round {
    fn new() -> Self {
        Self {
            id: 0,
            state: RoundState::Idle,
            ledger: TicketLedger::new(),
            pending_request: None,
            seed: None,
            drawn_sequence: None,
            last_report: None,
        }
    }

    fn expect_state(&self, expected: RoundState, operation: &'static str) -> LotteryResult<()> {
        if self.state != expected {
            return Err(LotteryError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            round_id: self.id,
            state: self.state,
            players: self.ledger.players().to_vec(),
            ticket_count: self.ledger.ticket_count(),
            pot: self.ledger.total_staked(),
            pending_request: self.pending_request.clone(),
            seed: self.seed,
            drawn_sequence: self.drawn_sequence.clone(),
        }
    }
}

pub struct RoundController {
    config: LotteryConfig,
    engine: DrawEngine,
    calculator: PayoutCalculator,
    oracle: Arc<dyn RandomnessPort>,
    funds: Arc<dyn FundsTransfer>,
    operator: Arc<dyn OperatorCheck>,
    metrics: Arc<LotteryMetrics>,
    events: broadcast::Sender<RoundEvent>,
    round: Mutex<Round>,
}

impl RoundController {
    /// Build a controller in the IDLE state; the configuration is validated here
    pub fn new(
        config: LotteryConfig,
        oracle: Arc<dyn RandomnessPort>,
        funds: Arc<dyn FundsTransfer>,
        operator: Arc<dyn OperatorCheck>,
    ) -> LotteryResult<Self> {
        config.validate()?;
        let engine = DrawEngine::from_config(&config.draw)?;
        let calculator = PayoutCalculator::new(config.settlement.payout_table.clone());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            engine,
            calculator,
            oracle,
            funds,
            operator,
            metrics: Arc::new(LotteryMetrics::new()),
            events,
            round: Mutex::new(Round::new()),
        })
    }

    pub fn config(&self) -> &LotteryConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<LotteryMetrics> {
        self.metrics.clone()
    }

    /// Receive every round transition from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: RoundEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn authorize(&self, caller: &PlayerId) -> LotteryResult<()> {
        if !self.operator.is_operator(caller) {
            warn!("rejected operator action from {}", caller);
            return Err(LotteryError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    /// Open a new round for entries
    pub async fn start(&self, caller: &PlayerId) -> LotteryResult<u64> {
        self.authorize(caller)?;
        let mut round = self.round.lock().await;
        round.expect_state(RoundState::Idle, "start")?;

        round.id += 1;
        round.state = RoundState::Open;
        round.seed = None;
        round.drawn_sequence = None;
        round.pending_request = None;

        info!("round {} opened", round.id);
        self.metrics.record_round_started();
        self.publish(RoundEvent::Started { round_id: round.id });
        Ok(round.id)
    }

    /// Submit a ticket for `player`
    pub async fn enter(
        &self,
        player: &PlayerId,
        numbers: Vec<u32>,
        stake: u64,
    ) -> LotteryResult<Ticket> {
        let mut round = self.round.lock().await;
        round.expect_state(RoundState::Open, "enter")?;

        if let Err(e) = self.validate_ticket(&round.ledger, player, &numbers, stake) {
            debug!("ticket from {} rejected: {}", player, e);
            self.metrics.record_rejected_ticket();
            return Err(e.into());
        }

        let ticket = Ticket {
            player: player.clone(),
            numbers,
            stake,
        };
        round.ledger.append(ticket.clone());

        debug!("round {}: {} entered {:?} for {}", round.id, player, ticket.numbers, stake);
        self.metrics.record_ticket();
        self.publish(RoundEvent::TicketEntered {
            round_id: round.id,
            player: player.clone(),
        });
        Ok(ticket)
    }

    fn validate_ticket(
        &self,
        ledger: &TicketLedger,
        player: &PlayerId,
        numbers: &[u32],
        stake: u64,
    ) -> Result<(), TicketError> {
        let draw = &self.config.draw;
        if numbers.len() != draw.pick_count {
            return Err(TicketError::WrongCount {
                expected: draw.pick_count,
                actual: numbers.len(),
            });
        }

        let mut seen = HashSet::with_capacity(numbers.len());
        for &number in numbers {
            if number < draw.pool_min || number > draw.pool_max {
                return Err(TicketError::OutOfRange {
                    number,
                    min: draw.pool_min,
                    max: draw.pool_max,
                });
            }
            if !seen.insert(number) {
                return Err(TicketError::DuplicateNumber(number));
            }
        }

        if stake == 0 {
            return Err(TicketError::ZeroStake);
        }
        if let Some(price) = self.config.entry.ticket_price {
            if stake != price {
                return Err(TicketError::StakeMismatch {
                    expected: price,
                    actual: stake,
                });
            }
        }
        if let Some(limit) = self.config.entry.max_tickets_per_player {
            if ledger.tickets_of(player).len() >= limit {
                return Err(TicketError::TooManyTickets { limit });
            }
        }

        Ok(())
    }

    /// Stop entries and request the round seed
    ///
    /// Returns once the request is issued; the seed arrives later through
    /// [`RoundController::on_randomness_ready`]. If the oracle refuses the
    /// request the round stays OPEN.
    pub async fn close(&self, caller: &PlayerId) -> LotteryResult<RequestHandle> {
        self.authorize(caller)?;
        let mut round = self.round.lock().await;
        round.expect_state(RoundState::Open, "close")?;

        let handle = match self.oracle.request(round.id).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("round {}: randomness request failed: {}", round.id, e);
                return Err(e);
            }
        };

        round.pending_request = Some(handle.clone());
        round.state = RoundState::Calculating;

        info!(
            "round {} closed with {} tickets; awaiting randomness {}",
            round.id,
            round.ledger.ticket_count(),
            handle
        );
        self.publish(RoundEvent::Closed {
            round_id: round.id,
            handle: handle.clone(),
        });
        Ok(handle)
    }

    /// Oracle callback carrying the seed for `handle`
    ///
    /// Anything other than the outstanding request of a CALCULATING round is
    /// rejected with `StaleOrUnknownRequest` and leaves the round untouched. The
    /// handle is consumed on acceptance, so a replayed delivery is stale too.
    /// Returns the settlement report when `auto_settle` is configured.
    pub async fn on_randomness_ready(
        &self,
        handle: &RequestHandle,
        seed: Seed,
    ) -> LotteryResult<Option<SettlementReport>> {
        let mut round = self.round.lock().await;

        let outstanding = round.state == RoundState::Calculating
            && round.pending_request.as_ref() == Some(handle);
        if !outstanding {
            warn!(
                "ignoring randomness for {} (round {} is {})",
                handle, round.id, round.state
            );
            self.metrics.record_stale_delivery();
            return Err(LotteryError::StaleOrUnknownRequest {
                handle: handle.clone(),
            });
        }

        round.pending_request = None;
        round.seed = Some(seed);
        let drawn = self.engine.derive(&seed);
        round.drawn_sequence = Some(drawn.clone());

        info!("round {} drawn from seed {}: {:?}", round.id, seed, drawn);
        self.publish(RoundEvent::Drawn { round_id: round.id });

        if self.config.settlement.auto_settle {
            let report = self.settle_round(&mut round, drawn).await;
            return Ok(Some(report));
        }
        Ok(None)
    }

    /// Pay out every ticket of the drawn round and return to IDLE
    ///
    /// Repeating the call for a round that is already settled returns the
    /// stored report without paying anyone again.
    pub async fn settle(&self, caller: &PlayerId) -> LotteryResult<SettlementReport> {
        self.authorize(caller)?;
        let mut round = self.round.lock().await;

        if round.state == RoundState::Idle && round.drawn_sequence.is_some() {
            if let Some(report) = round.last_report.as_ref().filter(|r| r.round_id == round.id) {
                debug!("round {} already settled", round.id);
                return Ok(report.clone());
            }
        }

        let drawn = match (round.state, round.drawn_sequence.clone()) {
            (RoundState::Calculating, Some(drawn)) => drawn,
            (state, _) => {
                return Err(LotteryError::InvalidState {
                    operation: "settle",
                    state,
                })
            }
        };

        Ok(self.settle_round(&mut round, drawn).await)
    }

    async fn settle_round(&self, round: &mut Round, drawn: Vec<u32>) -> SettlementReport {
        let payouts = settlement::compute_payouts(&self.calculator, &round.ledger, &drawn);

        // Ledger is emptied before the first transfer is attempted.
        let settled = round.ledger.take();
        let total_staked = settled.total_staked();

        let (receipts, failures) = settlement::disburse(self.funds.as_ref(), &payouts).await;
        let total_paid = receipts
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.amount));

        let report = SettlementReport {
            round_id: round.id,
            drawn_sequence: drawn,
            payouts,
            receipts,
            failures,
            total_staked,
            total_paid,
            settled_at: Utc::now(),
        };

        round.state = RoundState::Idle;
        round.last_report = Some(report.clone());

        info!(
            "round {} settled: {} players, {} tickets, staked {}, paid {}, {} failed transfers",
            round.id,
            settled.players().len(),
            settled.ticket_count(),
            total_staked,
            total_paid,
            report.failures.len()
        );
        self.metrics
            .record_settlement(total_paid, report.failures.len());
        self.publish(RoundEvent::Settled {
            round_id: round.id,
            total_paid,
            failures: report.failures.len(),
        });
        report
    }

    /// Abandon the round without paying out
    ///
    /// Clears every ticket, the outstanding request, the seed and the drawn
    /// sequence from any state. Stakes are forfeited; returns their total.
    pub async fn reset(&self, caller: &PlayerId) -> LotteryResult<u64> {
        self.authorize(caller)?;
        let mut round = self.round.lock().await;

        let forfeited = round.ledger.take();
        let forfeited_stake = forfeited.total_staked();
        round.pending_request = None;
        round.seed = None;
        round.drawn_sequence = None;
        round.state = RoundState::Idle;

        warn!(
            "round {} reset: {} tickets and {} staked forfeited",
            round.id,
            forfeited.ticket_count(),
            forfeited_stake
        );
        self.metrics.record_round_reset();
        self.publish(RoundEvent::Reset { round_id: round.id });
        Ok(forfeited_stake)
    }

    pub async fn state(&self) -> RoundState {
        self.round.lock().await.state
    }

    pub async fn round_id(&self) -> u64 {
        self.round.lock().await.id
    }

    pub async fn snapshot(&self) -> RoundSnapshot {
        self.round.lock().await.snapshot()
    }

    pub async fn tickets_of(&self, player: &PlayerId) -> Vec<Ticket> {
        self.round.lock().await.ledger.tickets_of(player).to_vec()
    }

    pub async fn players(&self) -> Vec<PlayerId> {
        self.round.lock().await.ledger.players().to_vec()
    }

    pub async fn drawn_sequence(&self) -> Option<Vec<u32>> {
        self.round.lock().await.drawn_sequence.clone()
    }

    pub async fn seed(&self) -> Option<Seed> {
        self.round.lock().await.seed
    }

    /// Stakes accepted in the active round
    pub async fn pot(&self) -> u64 {
        self.round.lock().await.ledger.total_staked()
    }

    pub async fn last_settlement(&self) -> Option<SettlementReport> {
        self.round.lock().await.last_report.clone()
    }

    /// What `player` would receive if the drawn round were settled now
    pub async fn preview_payout(&self, player: &PlayerId) -> LotteryResult<PlayerPayout> {
        let round = self.round.lock().await;
        let drawn = match round.drawn_sequence.as_ref() {
            Some(drawn) if round.state == RoundState::Calculating => drawn,
            _ => {
                return Err(LotteryError::InvalidState {
                    operation: "preview payout",
                    state: round.state,
                })
            }
        };

        let tickets: Vec<_> = round
            .ledger
            .tickets_of(player)
            .iter()
            .map(|t| self.calculator.evaluate(&t.numbers, t.stake, drawn))
            .collect();
        let total = tickets.iter().fold(0u64, |acc, t| acc.saturating_add(t.amount));

        Ok(PlayerPayout {
            player: player.clone(),
            tickets,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::SingleOperator;
    use crate::lottery::settlement::InMemoryTreasury;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    const OPERATOR: &str = "operator";

    /// Records requests; tests deliver seeds by hand
    #[derive(Default)]
    struct ManualOracle {
        requests: std::sync::Mutex<Vec<(u64, RequestHandle)>>,
        unavailable: AtomicBool,
    }

    impl ManualOracle {
        fn last_handle(&self) -> RequestHandle {
            self.requests.lock().unwrap().last().unwrap().1.clone()
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RandomnessPort for ManualOracle {
        async fn request(&self, round_id: u64) -> LotteryResult<RequestHandle> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(LotteryError::OracleUnavailable("no prepaid fee".to_string()));
            }
            let handle = RequestHandle::generate();
            self.requests.lock().unwrap().push((round_id, handle.clone()));
            Ok(handle)
        }
    }

    struct Harness {
        controller: Arc<RoundController>,
        oracle: Arc<ManualOracle>,
        treasury: Arc<InMemoryTreasury>,
        operator: PlayerId,
    }

    fn harness(config: LotteryConfig) -> Harness {
        let oracle = Arc::new(ManualOracle::default());
        let treasury = Arc::new(InMemoryTreasury::new(1_000_000));
        let controller = RoundController::new(
            config,
            oracle.clone(),
            treasury.clone(),
            Arc::new(SingleOperator::new(OPERATOR)),
        )
        .unwrap();
        Harness {
            controller: Arc::new(controller),
            oracle,
            treasury,
            operator: PlayerId::from(OPERATOR),
        }
    }

    fn player(name: &str) -> PlayerId {
        PlayerId::from(name)
    }

    /// Open a quick-draw round with one ticket each for alice, bob and carol
    async fn open_round_with_three_players(h: &Harness) {
        h.controller.start(&h.operator).await.unwrap();
        h.controller.enter(&player("alice"), vec![1, 2, 3], 10).await.unwrap();
        h.controller.enter(&player("bob"), vec![4, 5, 6], 20).await.unwrap();
        h.controller.enter(&player("carol"), vec![7, 8, 9], 30).await.unwrap();
    }

    async fn close_and_deliver(h: &Harness, seed: u64) -> Option<SettlementReport> {
        let handle = h.controller.close(&h.operator).await.unwrap();
        h.controller
            .on_randomness_ready(&handle, Seed::from_u64(seed))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_non_operator_cannot_start_or_close() {
        let h = harness(LotteryConfig::quick_draw());
        let mallory = player("mallory");

        let err = h.controller.start(&mallory).await.unwrap_err();
        assert!(matches!(err, LotteryError::Unauthorized { .. }));
        assert_eq!(h.controller.state().await, RoundState::Idle);
        assert_eq!(h.controller.round_id().await, 0);

        h.controller.start(&h.operator).await.unwrap();
        let err = h.controller.close(&mallory).await.unwrap_err();
        assert!(matches!(err, LotteryError::Unauthorized { .. }));
        assert_eq!(h.controller.state().await, RoundState::Open);
        assert_eq!(h.oracle.request_count(), 0);

        assert!(matches!(
            h.controller.settle(&mallory).await,
            Err(LotteryError::Unauthorized { .. })
        ));
        assert!(matches!(
            h.controller.reset(&mallory).await,
            Err(LotteryError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_only_from_idle() {
        let h = harness(LotteryConfig::quick_draw());
        assert_eq!(h.controller.start(&h.operator).await.unwrap(), 1);

        let err = h.controller.start(&h.operator).await.unwrap_err();
        assert!(matches!(
            err,
            LotteryError::InvalidState { state: RoundState::Open, .. }
        ));
    }

    #[tokio::test]
    async fn test_enter_requires_open_round() {
        let h = harness(LotteryConfig::quick_draw());
        let alice = player("alice");

        let err = h.controller.enter(&alice, vec![1, 2, 3], 10).await.unwrap_err();
        assert!(matches!(
            err,
            LotteryError::InvalidState { state: RoundState::Idle, .. }
        ));

        h.controller.start(&h.operator).await.unwrap();
        h.controller.enter(&alice, vec![1, 2, 3], 10).await.unwrap();
        assert_eq!(h.controller.tickets_of(&alice).await.len(), 1);
        assert_eq!(h.controller.players().await, vec![alice.clone()]);
        assert_eq!(h.controller.pot().await, 10);

        h.controller.close(&h.operator).await.unwrap();
        let err = h.controller.enter(&alice, vec![4, 5, 6], 10).await.unwrap_err();
        assert!(matches!(
            err,
            LotteryError::InvalidState { state: RoundState::Calculating, .. }
        ));
        assert_eq!(h.controller.tickets_of(&alice).await.len(), 1);
    }

    #[tokio::test]
    async fn test_ticket_validation() {
        let mut config = LotteryConfig::quick_draw();
        config.entry.max_tickets_per_player = Some(2);
        let h = harness(config);
        h.controller.start(&h.operator).await.unwrap();
        let alice = player("alice");

        let cases = vec![
            (vec![1, 2], 10, TicketError::WrongCount { expected: 3, actual: 2 }),
            (vec![1, 2, 2], 10, TicketError::DuplicateNumber(2)),
            (vec![0, 2, 3], 10, TicketError::OutOfRange { number: 0, min: 1, max: 10 }),
            (vec![1, 2, 11], 10, TicketError::OutOfRange { number: 11, min: 1, max: 10 }),
            (vec![1, 2, 3], 0, TicketError::ZeroStake),
        ];
        for (numbers, stake, expected) in cases {
            match h.controller.enter(&alice, numbers, stake).await {
                Err(LotteryError::InvalidTicket(actual)) => assert_eq!(actual, expected),
                other => panic!("expected {:?}, got {:?}", expected, other),
            }
        }
        assert!(h.controller.tickets_of(&alice).await.is_empty());

        h.controller.enter(&alice, vec![1, 2, 3], 10).await.unwrap();
        h.controller.enter(&alice, vec![4, 5, 6], 10).await.unwrap();
        let err = h.controller.enter(&alice, vec![7, 8, 9], 10).await.unwrap_err();
        assert!(matches!(
            err,
            LotteryError::InvalidTicket(TicketError::TooManyTickets { limit: 2 })
        ));
        assert_eq!(h.controller.metrics().snapshot().tickets_rejected, 6);
    }

    #[tokio::test]
    async fn test_fixed_ticket_price() {
        let mut config = LotteryConfig::quick_draw();
        config.entry.ticket_price = Some(100);
        let h = harness(config);
        h.controller.start(&h.operator).await.unwrap();

        let err = h
            .controller
            .enter(&player("alice"), vec![1, 2, 3], 50)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LotteryError::InvalidTicket(TicketError::StakeMismatch { expected: 100, actual: 50 })
        ));
        assert!(h.controller.enter(&player("alice"), vec![1, 2, 3], 100).await.is_ok());
    }

    #[tokio::test]
    async fn test_full_round_with_manual_settlement() {
        let h = harness(LotteryConfig::quick_draw());
        open_round_with_three_players(&h).await;

        let handle = h.controller.close(&h.operator).await.unwrap();
        assert_eq!(h.controller.state().await, RoundState::Calculating);
        assert_eq!(h.controller.snapshot().await.pending_request, Some(handle.clone()));
        assert!(h.controller.drawn_sequence().await.is_none());

        let auto = h
            .controller
            .on_randomness_ready(&handle, Seed::from_u64(99))
            .await
            .unwrap();
        assert!(auto.is_none());
        assert_eq!(h.controller.state().await, RoundState::Calculating);

        let drawn = h.controller.drawn_sequence().await.unwrap();
        assert_eq!(drawn, DrawEngine::new(1, 10, 10).unwrap().derive(&Seed::from_u64(99)));

        let report = h.controller.settle(&h.operator).await.unwrap();
        assert_eq!(report.round_id, 1);
        assert_eq!(report.payouts.len(), 3);
        assert!(report.is_complete());
        assert_eq!(report.receipts.len(), 3);
        assert_eq!(report.total_staked, 60);
        assert_eq!(h.treasury.bankroll(), 1_000_000 - report.total_paid);
        for name in ["alice", "bob", "carol"] {
            let payout = report.payout_for(&player(name)).unwrap();
            assert!(payout.total > 0);
            assert_eq!(h.treasury.balance_of(&player(name)), payout.total);
        }

        assert_eq!(h.controller.state().await, RoundState::Idle);
        assert!(h.controller.players().await.is_empty());
        assert!(h.controller.tickets_of(&player("alice")).await.is_empty());
        assert_eq!(h.controller.pot().await, 0);
        // Drawn numbers stay readable until the next round starts.
        assert_eq!(h.controller.drawn_sequence().await, Some(drawn));

        h.controller.start(&h.operator).await.unwrap();
        assert!(h.controller.drawn_sequence().await.is_none());
        assert_eq!(h.controller.round_id().await, 2);
    }

    #[tokio::test]
    async fn test_settlement_survives_failed_transfer() {
        let h = harness(LotteryConfig::quick_draw());
        h.treasury.reject("bob");
        open_round_with_three_players(&h).await;
        close_and_deliver(&h, 7).await;

        let report = h.controller.settle(&h.operator).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].player, player("bob"));
        assert_eq!(report.receipts.len(), 2);
        assert!(h.treasury.balance_of(&player("alice")) > 0);
        assert!(h.treasury.balance_of(&player("carol")) > 0);
        assert_eq!(h.treasury.balance_of(&player("bob")), 0);

        assert_eq!(h.controller.state().await, RoundState::Idle);
        assert!(h.controller.players().await.is_empty());
        assert_eq!(h.controller.metrics().snapshot().transfer_failures, 1);
    }

    #[tokio::test]
    async fn test_settle_is_idempotent() {
        let h = harness(LotteryConfig::quick_draw());
        open_round_with_three_players(&h).await;
        close_and_deliver(&h, 3).await;

        let first = h.controller.settle(&h.operator).await.unwrap();
        let bankroll = h.treasury.bankroll();

        let second = h.controller.settle(&h.operator).await.unwrap();
        assert_eq!(second.round_id, first.round_id);
        assert_eq!(second.total_paid, first.total_paid);
        assert_eq!(h.treasury.bankroll(), bankroll);
        assert_eq!(h.controller.metrics().snapshot().rounds_settled, 1);
    }

    #[tokio::test]
    async fn test_settle_requires_drawn_sequence() {
        let h = harness(LotteryConfig::quick_draw());
        assert!(matches!(
            h.controller.settle(&h.operator).await,
            Err(LotteryError::InvalidState { state: RoundState::Idle, .. })
        ));

        open_round_with_three_players(&h).await;
        assert!(matches!(
            h.controller.settle(&h.operator).await,
            Err(LotteryError::InvalidState { state: RoundState::Open, .. })
        ));

        h.controller.close(&h.operator).await.unwrap();
        assert!(matches!(
            h.controller.settle(&h.operator).await,
            Err(LotteryError::InvalidState { state: RoundState::Calculating, .. })
        ));
        assert_eq!(h.controller.players().await.len(), 3);
    }

    #[tokio::test]
    async fn test_stale_and_replayed_deliveries_are_ignored() {
        let h = harness(LotteryConfig::quick_draw());
        open_round_with_three_players(&h).await;

        // Nothing outstanding while the round is open.
        let err = h
            .controller
            .on_randomness_ready(&RequestHandle::from("forged"), Seed::from_u64(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LotteryError::StaleOrUnknownRequest { .. }));
        assert_eq!(h.controller.state().await, RoundState::Open);

        let handle = h.controller.close(&h.operator).await.unwrap();
        let err = h
            .controller
            .on_randomness_ready(&RequestHandle::from("forged"), Seed::from_u64(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LotteryError::StaleOrUnknownRequest { .. }));
        assert!(h.controller.drawn_sequence().await.is_none());
        assert!(h.controller.seed().await.is_none());

        h.controller
            .on_randomness_ready(&handle, Seed::from_u64(2))
            .await
            .unwrap();
        let drawn = h.controller.drawn_sequence().await;

        // Replaying the accepted handle must not redraw.
        let err = h
            .controller
            .on_randomness_ready(&handle, Seed::from_u64(3))
            .await
            .unwrap_err();
        assert!(matches!(err, LotteryError::StaleOrUnknownRequest { .. }));
        assert_eq!(h.controller.drawn_sequence().await, drawn);
        assert_eq!(h.controller.seed().await, Some(Seed::from_u64(2)));
        assert_eq!(h.controller.metrics().snapshot().stale_deliveries, 3);
    }

    #[tokio::test]
    async fn test_auto_settle_on_delivery() {
        let mut config = LotteryConfig::quick_draw();
        config.settlement.auto_settle = true;
        let h = harness(config);
        open_round_with_three_players(&h).await;

        let report = close_and_deliver(&h, 11).await.expect("auto settlement report");
        assert_eq!(report.payouts.len(), 3);
        assert_eq!(h.controller.state().await, RoundState::Idle);
        assert!(h.controller.players().await.is_empty());
        assert_eq!(h.controller.last_settlement().await.unwrap().round_id, 1);
    }

    #[tokio::test]
    async fn test_reset_forfeits_stakes() {
        let h = harness(LotteryConfig::quick_draw());
        open_round_with_three_players(&h).await;
        let handle = h.controller.close(&h.operator).await.unwrap();

        let forfeited = h.controller.reset(&h.operator).await.unwrap();
        assert_eq!(forfeited, 60);
        assert_eq!(h.controller.state().await, RoundState::Idle);
        assert!(h.controller.players().await.is_empty());
        assert_eq!(h.treasury.bankroll(), 1_000_000);

        // A late delivery for the abandoned request changes nothing.
        let err = h
            .controller
            .on_randomness_ready(&handle, Seed::from_u64(5))
            .await
            .unwrap_err();
        assert!(matches!(err, LotteryError::StaleOrUnknownRequest { .. }));
        assert!(matches!(
            h.controller.settle(&h.operator).await,
            Err(LotteryError::InvalidState { .. })
        ));
        assert!(h.controller.last_settlement().await.is_none());
    }

    #[tokio::test]
    async fn test_oracle_unavailable_keeps_round_open() {
        let h = harness(LotteryConfig::quick_draw());
        open_round_with_three_players(&h).await;
        h.oracle.unavailable.store(true, Ordering::SeqCst);

        let err = h.controller.close(&h.operator).await.unwrap_err();
        assert!(matches!(err, LotteryError::OracleUnavailable(_)));
        assert_eq!(h.controller.state().await, RoundState::Open);

        h.oracle.unavailable.store(false, Ordering::SeqCst);
        let handle = h.controller.close(&h.operator).await.unwrap();
        assert_eq!(h.oracle.last_handle(), handle);
    }

    #[tokio::test]
    async fn test_concurrent_entries_are_all_recorded() {
        let h = harness(LotteryConfig::quick_draw());
        h.controller.start(&h.operator).await.unwrap();

        let mut tasks = Vec::new();
        for p in 0..20 {
            let controller = h.controller.clone();
            tasks.push(tokio::spawn(async move {
                let who = PlayerId::new(format!("player-{}", p));
                for stake in 1..=5u64 {
                    controller.enter(&who, vec![1, 2, 3], stake).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.ticket_count, 100);
        assert_eq!(snapshot.players.len(), 20);
        assert_eq!(snapshot.pot, 20 * 15);
        for p in 0..20 {
            let stakes: Vec<u64> = h
                .controller
                .tickets_of(&PlayerId::new(format!("player-{}", p)))
                .await
                .iter()
                .map(|t| t.stake)
                .collect();
            assert_eq!(stakes, vec![1, 2, 3, 4, 5]);
        }
    }

    #[tokio::test]
    async fn test_lucky_six_ticket_scenario() {
        let h = harness(LotteryConfig::lucky_six());
        let alice = player("alice");
        h.controller.start(&h.operator).await.unwrap();
        h.controller
            .enter(&alice, vec![6, 9, 10, 16, 20, 23], 50)
            .await
            .unwrap();

        let seed = Seed::from_hex("9f2c1e7a44d0b5c3").unwrap();
        let handle = h.controller.close(&h.operator).await.unwrap();
        h.controller.on_randomness_ready(&handle, seed).await.unwrap();

        let drawn = h.controller.drawn_sequence().await.unwrap();
        assert_eq!(drawn.len(), 35);

        let preview = h.controller.preview_payout(&alice).await.unwrap();
        let outcome = &preview.tickets[0];
        match outcome.position {
            Some(position) => {
                assert!(position <= 34);
                assert!(outcome.amount > 0);
            }
            None => assert_eq!(outcome.amount, 0),
        }

        let report = h.controller.settle(&h.operator).await.unwrap();
        assert_eq!(report.payout_for(&alice).unwrap().total, preview.total);
        assert!(matches!(
            h.controller.preview_payout(&alice).await,
            Err(LotteryError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_events_follow_transitions() {
        let h = harness(LotteryConfig::quick_draw());
        let mut events = h.controller.subscribe();

        open_round_with_three_players(&h).await;
        let handle = h.controller.close(&h.operator).await.unwrap();

        assert_eq!(events.recv().await.unwrap(), RoundEvent::Started { round_id: 1 });
        for _ in 0..3 {
            assert!(matches!(
                events.recv().await.unwrap(),
                RoundEvent::TicketEntered { round_id: 1, .. }
            ));
        }
        assert_eq!(
            events.recv().await.unwrap(),
            RoundEvent::Closed { round_id: 1, handle }
        );
    }
}
