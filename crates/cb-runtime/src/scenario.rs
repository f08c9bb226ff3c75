//! # Big-Block Compact Relay Scenario
//!
//! Scripted run against one node:
//!
//! 1. raise the node's excessive block size;
//! 2. build and submit a block plus `maturity_depth - 1` more so their
//!    coinbases mature, saving each as a spendable output;
//! 3. connect an observer peer and negotiate high-bandwidth compact relay;
//! 4. submit a large block and an excessive-size block, each of which must
//!    be accepted and announced to the observer as a `cmpctblock`;
//! 5. push every non-coinbase transaction of a third big block into the
//!    mempool, then send that block as a hand-built `cmpctblock` and check
//!    the node adopts it as its tip.

use std::thread;
use std::time::Instant;

use cb_01_block_synthesis::{ChainContext, PreviousSpendableOutput, SlotId};
use cb_02_compact_relay::{
    HeaderAndShortIds, NodeRpc, RelayConfig, RelayError, RelayPeer,
};
use shared_types::{hash_to_hex, Block, Script};

use crate::config::{HarnessConfig, NoncePolicy};
use crate::error::Result;
use crate::report::{Outcome, ScenarioReport};

/// First slot of the maturity run.
const MATURITY_SLOT_BASE: SlotId = 5000;

/// Compact relay version negotiated with the node.
const COMPACT_RELAY_VERSION: u64 = 1;

pub struct BigBlockScenario<R: NodeRpc> {
    config: HarnessConfig,
    relay: RelayConfig,
    rpc: R,
    ctx: ChainContext,
    report: ScenarioReport,
}

impl<R: NodeRpc> BigBlockScenario<R> {
    /// Anchor a new scenario on the node's current best block.
    pub fn new(config: HarnessConfig, rpc: R) -> Result<Self> {
        let relay = config.relay_config()?;
        let genesis = rpc.best_block_hash()?;
        tracing::info!("[cb-runtime] Building on node tip {}", hash_to_hex(&genesis));
        let ctx = ChainContext::new(genesis, config.synthesis.clone());
        Ok(Self {
            config,
            relay,
            rpc,
            ctx,
            report: ScenarioReport::new(),
        })
    }

    pub fn report(&self) -> &ScenarioReport {
        &self.report
    }

    pub fn into_report(self) -> ScenarioReport {
        self.report
    }

    pub fn context(&self) -> &ChainContext {
        &self.ctx
    }

    /// Run every step, stopping at the first failure.
    pub fn run(&mut self) -> Result<()> {
        let excessive = self.config.scenario.excessive_block_size;
        self.rpc.set_excessive_block(excessive)?;
        tracing::info!("[cb-runtime] Excessive block size set to {}", excessive);

        let addr = self.config.node.p2p_addr.clone();
        let submitter = RelayPeer::connect(addr.as_str(), "submitter", self.relay.clone())?;
        submitter.wait_for_verack()?;

        self.mature_chain(&submitter)?;
        let mut outputs = self.take_outputs()?.into_iter();

        let observer = RelayPeer::connect(addr.as_str(), "observer", self.relay.clone())?;
        self.negotiate_compact_relay(&observer)?;

        let large = self.config.scenario.large_block_size;
        self.relay_big_block(&submitter, &observer, "b1", 1, next_output(&mut outputs)?, large)?;
        let excessive = usize::try_from(excessive).map_err(|_| {
            cb_01_block_synthesis::SynthesisError::InvalidRequest(format!(
                "excessive block size {excessive} does not fit in memory"
            ))
        })?;
        self.relay_big_block(&submitter, &observer, "b2", 2, next_output(&mut outputs)?, excessive)?;

        let compact = self.config.scenario.compact_block_size;
        self.send_manual_compact_block(&observer, "b3", 3, next_output(&mut outputs)?, compact)?;

        tracing::info!(
            "[cb-runtime] Scenario passed ({} steps)",
            self.report.steps.len()
        );
        Ok(())
    }

    // =========================================================================
    // Steps
    // =========================================================================

    /// Block 0 plus the maturity run, each expected accepted.
    #[tracing::instrument(skip(self, submitter))]
    fn mature_chain(&mut self, submitter: &RelayPeer) -> Result<()> {
        let b0 = self.ctx.next_block(0, None, None, 0, 0)?;
        self.ctx.save_spendable_output()?;
        self.submit_and_expect_accepted(submitter, "b0", &b0)?;

        let depth = self.config.scenario.maturity_depth;
        for i in 1..depth {
            let slot = MATURITY_SLOT_BASE + i - 1;
            let block = self.ctx.next_block(slot, None, None, 0, 0)?;
            self.ctx.save_spendable_output()?;
            submitter.send_block(&block)?;
            if i + 1 == depth {
                let verdict = self.await_verdict(submitter, &block)?;
                self.report
                    .check(&format!("b{slot}"), accepted(&block), verdict)?;
            }
        }
        tracing::info!("[cb-runtime] Chain matured to height {}", depth);
        Ok(())
    }

    fn take_outputs(&mut self) -> Result<Vec<PreviousSpendableOutput>> {
        let count = self.ctx.ledger().len();
        let mut outputs = Vec::with_capacity(count);
        for _ in 0..count {
            outputs.push(self.ctx.get_spendable_output()?);
        }
        Ok(outputs)
    }

    /// Handshake, relay preference and header exchange on the observer.
    #[tracing::instrument(skip_all, fields(peer = %observer.name()))]
    fn negotiate_compact_relay(&self, observer: &RelayPeer) -> Result<()> {
        observer.wait_for_verack()?;
        let theirs = observer.wait_for_sendcmpct()?;
        tracing::debug!(
            "[cb-runtime] Node prefers compact relay v{} (announce={})",
            theirs.version,
            theirs.announce
        );
        observer.announce_compact_mode(true, COMPACT_RELAY_VERSION)?;
        observer.exchange_headers()?;
        Ok(())
    }

    /// Submit a block of `size` bytes; it must be accepted and announced to
    /// the observer as a `cmpctblock` carrying its header.
    #[tracing::instrument(skip(self, submitter, observer, spend))]
    fn relay_big_block(
        &mut self,
        submitter: &RelayPeer,
        observer: &RelayPeer,
        step: &str,
        slot: SlotId,
        spend: PreviousSpendableOutput,
        size: usize,
    ) -> Result<()> {
        observer.clear_block_data()?;
        let block = self
            .ctx
            .next_block(slot, Some(spend), Some(Script::op_true()), size, 0)?;
        self.submit_and_expect_accepted(submitter, step, &block)?;

        let expected = block.hash();
        let observed = match observer.wait_for_compact_block(&expected) {
            Ok(header) => hash_to_hex(&header.hash()),
            Err(RelayError::HeaderMismatch { actual, .. }) => actual,
            Err(e) => return Err(e.into()),
        };
        self.report.check(
            &format!("{step} cmpctblock"),
            Outcome::HeaderObserved {
                header: hash_to_hex(&expected),
            },
            Outcome::HeaderObserved { header: observed },
        )
    }

    /// Fill the mempool with a block's transactions, then announce the block
    /// ourselves as a compact block.
    #[tracing::instrument(skip(self, observer, spend))]
    fn send_manual_compact_block(
        &mut self,
        observer: &RelayPeer,
        step: &str,
        slot: SlotId,
        spend: PreviousSpendableOutput,
        size: usize,
    ) -> Result<()> {
        let block = self
            .ctx
            .next_block(slot, Some(spend), Some(Script::op_true()), size, 0)?;
        for tx in block.transactions.iter().skip(1) {
            self.rpc.send_raw_transaction(tx, true)?;
        }
        tracing::info!(
            "[cb-runtime] {} transactions of {} in the mempool",
            block.transactions.len() - 1,
            step
        );

        let compact = HeaderAndShortIds::from_block(&block, self.compact_nonce());
        observer.send_compact_block(&compact)?;
        let verdict = self.await_verdict(observer, &block)?;
        self.report.check(step, accepted(&block), verdict)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn submit_and_expect_accepted(&mut self, submitter: &RelayPeer, step: &str, block: &Block) -> Result<()> {
        submitter.send_block(block)?;
        let verdict = self.await_verdict(submitter, block)?;
        self.report.check(step, accepted(block), verdict)
    }

    /// Poll until the node either adopts `block` as its tip or rejects it
    /// over `peer`.
    fn await_verdict(&self, peer: &RelayPeer, block: &Block) -> Result<Outcome> {
        let id = block.hash();
        let timeout = self.config.wait_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(reject) = peer.reject_for(&id) {
                return Ok(Outcome::Rejected {
                    tip: hash_to_hex(&id),
                    reason: reject.reason,
                    code: reject.code,
                });
            }
            if self.rpc.best_block_hash()? == id {
                return Ok(accepted(block));
            }
            if peer.with_inbox(|inbox| inbox.is_disconnected()) {
                return Err(RelayError::Disconnected.into());
            }
            if Instant::now() >= deadline {
                return Err(RelayError::ProtocolTimeout {
                    waiting_for: format!("verdict on block {}", hash_to_hex(&id)),
                    timeout,
                }
                .into());
            }
            thread::sleep(self.config.poll_interval());
        }
    }

    fn compact_nonce(&self) -> u64 {
        match self.config.scenario.compact_nonce {
            NoncePolicy::Zero => 0,
            NoncePolicy::Random => rand::random(),
        }
    }
}

fn accepted(block: &Block) -> Outcome {
    Outcome::Accepted {
        tip: hash_to_hex(&block.hash()),
    }
}

fn next_output(outputs: &mut impl Iterator<Item = PreviousSpendableOutput>) -> Result<PreviousSpendableOutput> {
    outputs
        .next()
        .ok_or_else(|| cb_01_block_synthesis::SynthesisError::LedgerEmpty.into())
}
