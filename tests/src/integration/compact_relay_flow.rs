//! # Compact Relay Flow
//!
//! Drives [`RelayPeer`]s by hand against the mock node:
//!
//! 1. **Announcement**: a submitted block reaches the observer as `cmpctblock`
//! 2. **Rejection**: oversized blocks come back as `reject`
//! 3. **Manual compact block**: accepted with a full mempool, rejected without

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cb_01_block_synthesis::{ChainContext, SynthesisConfig};
    use cb_02_compact_relay::{
        HeaderAndShortIds, NodeRpc, PeerState, RelayConfig, RelayError, RelayPeer,
    };
    use shared_types::{Block, Encodable, Script};

    use crate::integration::mock_node::{MockNode, MOCK_GENESIS, REJECT_INVALID};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn relay_config() -> RelayConfig {
        RelayConfig {
            wait_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn context() -> ChainContext {
        ChainContext::with_genesis_time(MOCK_GENESIS, 1_600_000_000, SynthesisConfig::seeded(42))
    }

    fn submitter(node: &MockNode) -> RelayPeer {
        let peer = RelayPeer::connect(node.addr(), "submitter", relay_config()).unwrap();
        peer.wait_for_verack().unwrap();
        peer
    }

    fn observer(node: &MockNode) -> RelayPeer {
        let peer = RelayPeer::connect(node.addr(), "observer", relay_config()).unwrap();
        peer.wait_for_verack().unwrap();
        peer.wait_for_sendcmpct().unwrap();
        peer.announce_compact_mode(true, 1).unwrap();
        peer.exchange_headers().unwrap();
        peer
    }

    /// Submit `count` coinbase-only blocks, saving each as spendable.
    fn mature(ctx: &mut ChainContext, peer: &RelayPeer, count: u32) {
        for slot in 0..count {
            let block = ctx.next_block(100 + slot, None, None, 0, 0).unwrap();
            ctx.save_spendable_output().unwrap();
            peer.send_block(&block).unwrap();
        }
        peer.sync_with_ping().unwrap();
    }

    fn sized_block(ctx: &mut ChainContext, slot: u32, size: usize) -> Block {
        let spend = ctx.get_spendable_output().unwrap();
        ctx.next_block(slot, Some(spend), Some(Script::op_true()), size, 0)
            .unwrap()
    }

    // =========================================================================
    // ANNOUNCEMENT
    // =========================================================================

    #[test]
    fn test_submitted_block_announced_to_observer() {
        let node = MockNode::start();
        let submitter = submitter(&node);
        let mut ctx = context();
        mature(&mut ctx, &submitter, 3);

        let observer = observer(&node);
        assert_eq!(observer.state(), PeerState::HeadersExchanged);
        observer.clear_block_data().unwrap();

        let block = sized_block(&mut ctx, 1, 12_345);
        assert_eq!(block.encoded_len(), 12_345);
        submitter.send_block(&block).unwrap();

        let header = observer.wait_for_compact_block(&block.hash()).unwrap();
        assert_eq!(header.hash(), block.hash());
        assert_eq!(observer.state(), PeerState::CompactBlockObserved);
        assert_eq!(node.tip(), block.hash());
        assert_eq!(node.accepted().len(), 4);
    }

    #[test]
    fn test_announcement_for_other_block_is_header_mismatch() {
        let node = MockNode::start();
        let submitter = submitter(&node);
        let mut ctx = context();
        mature(&mut ctx, &submitter, 2);

        let observer = observer(&node);
        observer.clear_block_data().unwrap();
        let block = sized_block(&mut ctx, 1, 5_000);
        submitter.send_block(&block).unwrap();

        let wrong = ctx.block(100).unwrap().hash();
        assert!(matches!(
            observer.wait_for_compact_block(&wrong),
            Err(RelayError::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn test_submitter_gets_no_announcement() {
        let node = MockNode::start();
        let submitter = submitter(&node);
        let mut ctx = context();
        mature(&mut ctx, &submitter, 1);
        submitter.announce_compact_mode(true, 1).unwrap();

        let block = ctx.next_block(1, None, None, 0, 0).unwrap();
        submitter.send_block(&block).unwrap();
        submitter.sync_with_ping().unwrap();
        assert_eq!(node.tip(), block.hash());
        assert!(submitter.with_inbox(|inbox| inbox.last_cmpctblock().is_none()));
    }

    // =========================================================================
    // REJECTION
    // =========================================================================

    #[test]
    fn test_block_above_excessive_size_rejected() {
        let node = MockNode::start();
        node.rpc().set_excessive_block(8_000).unwrap();
        let submitter = submitter(&node);
        let mut ctx = context();
        mature(&mut ctx, &submitter, 2);
        let tip = node.tip();

        let block = sized_block(&mut ctx, 1, 8_001);
        submitter.send_block(&block).unwrap();
        submitter.sync_with_ping().unwrap();

        let reject = submitter.reject_for(&block.hash()).unwrap();
        assert_eq!(reject.reason, "bad-blk-length");
        assert_eq!(reject.code, REJECT_INVALID);
        assert_eq!(node.tip(), tip);
    }

    #[test]
    fn test_block_at_excessive_size_accepted() {
        let node = MockNode::start();
        node.rpc().set_excessive_block(8_000).unwrap();
        let submitter = submitter(&node);
        let mut ctx = context();
        mature(&mut ctx, &submitter, 2);

        let block = sized_block(&mut ctx, 1, 8_000);
        submitter.send_block(&block).unwrap();
        submitter.sync_with_ping().unwrap();
        assert!(submitter.reject_for(&block.hash()).is_none());
        assert_eq!(node.tip(), block.hash());
    }

    // =========================================================================
    // MANUAL COMPACT BLOCK
    // =========================================================================

    #[test]
    fn test_compact_block_reconstructed_from_mempool() {
        let node = MockNode::start();
        let rpc = node.rpc();
        let submitter = submitter(&node);
        let mut ctx = context();
        mature(&mut ctx, &submitter, 2);
        let observer = observer(&node);

        let block = sized_block(&mut ctx, 3, 30_000);
        assert!(block.transactions.len() > 2);
        for tx in block.transactions.iter().skip(1) {
            assert_eq!(rpc.send_raw_transaction(tx, true).unwrap(), tx.txid());
        }
        assert_eq!(node.mempool_len(), block.transactions.len() - 1);

        observer
            .send_compact_block(&HeaderAndShortIds::from_block(&block, 0))
            .unwrap();
        assert_eq!(rpc.best_block_hash().unwrap(), block.hash());
        assert_eq!(node.mempool_len(), 0);
    }

    #[test]
    fn test_compact_block_with_nonzero_nonce() {
        let node = MockNode::start();
        let rpc = node.rpc();
        let submitter = submitter(&node);
        let mut ctx = context();
        mature(&mut ctx, &submitter, 2);
        let observer = observer(&node);

        let block = sized_block(&mut ctx, 3, 9_000);
        for tx in block.transactions.iter().skip(1) {
            rpc.send_raw_transaction(tx, true).unwrap();
        }
        observer
            .send_compact_block(&HeaderAndShortIds::from_block(&block, 0xdead_beef))
            .unwrap();
        assert_eq!(node.tip(), block.hash());
    }

    #[test]
    fn test_compact_block_without_mempool_rejected() {
        let node = MockNode::start();
        let submitter = submitter(&node);
        let mut ctx = context();
        mature(&mut ctx, &submitter, 2);
        let observer = observer(&node);
        let tip = node.tip();

        let block = sized_block(&mut ctx, 3, 9_000);
        observer
            .send_compact_block(&HeaderAndShortIds::from_block(&block, 0))
            .unwrap();

        let reject = observer.reject_for(&block.hash()).unwrap();
        assert_eq!(reject.reason, "missing-transactions");
        assert_eq!(node.tip(), tip);
    }
}
