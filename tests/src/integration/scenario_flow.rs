//! # Scenario Flow
//!
//! Runs [`BigBlockScenario`] end to end against the mock node with block
//! sizes scaled down so the whole run takes well under a second.

#[cfg(test)]
mod tests {
    use cb_02_compact_relay::RelayError;
    use cb_runtime::{BigBlockScenario, HarnessConfig, Outcome, ScenarioError};
    use shared_types::hash_to_hex;

    use crate::integration::mock_node::{MockBehaviour, MockNode};

    fn config(node: &MockNode) -> HarnessConfig {
        let toml = format!(
            r#"
            [node]
            p2p_addr = "{}"

            [scenario]
            excessive_block_size = 60000
            large_block_size = 20001
            compact_block_size = 40000
            maturity_depth = 5
            wait_timeout_secs = 5
            poll_interval_ms = 5

            [synthesis]
            rng_seed = 3
            "#,
            node.addr()
        );
        HarnessConfig::parse(&toml).unwrap()
    }

    #[test]
    fn test_scenario_passes_against_mock_node() {
        let node = MockNode::start();
        let mut scenario = BigBlockScenario::new(config(&node), node.rpc()).unwrap();
        scenario.run().unwrap();

        assert_eq!(node.excessive_block_size(), 60_000);
        let b3 = scenario.context().block(3).unwrap().hash();
        assert_eq!(node.tip(), b3);
        // b0, four maturity blocks, b1, b2, b3
        assert_eq!(node.accepted().len(), 8);
        assert_eq!(node.mempool_len(), 0);

        let report = scenario.into_report();
        assert!(report.passed());
        let steps: Vec<&str> = report.steps.iter().map(|s| s.step.as_str()).collect();
        assert_eq!(
            steps,
            ["b0", "b5003", "b1", "b1 cmpctblock", "b2", "b2 cmpctblock", "b3"]
        );
        assert_eq!(
            report.steps[6].actual,
            Outcome::Accepted {
                tip: hash_to_hex(&b3)
            }
        );
    }

    #[test]
    fn test_scenario_blocks_have_configured_sizes() {
        use shared_types::Encodable;

        let node = MockNode::start();
        let mut scenario = BigBlockScenario::new(config(&node), node.rpc()).unwrap();
        scenario.run().unwrap();

        let ctx = scenario.context();
        assert_eq!(ctx.block(1).unwrap().encoded_len(), 20_001);
        assert_eq!(ctx.block(2).unwrap().encoded_len(), 60_000);
        assert_eq!(ctx.block(3).unwrap().encoded_len(), 40_000);
        assert_eq!(ctx.ledger().len(), 0);
    }

    #[test]
    fn test_scenario_with_random_compact_nonce() {
        let node = MockNode::start();
        let mut config = config(&node);
        config.scenario.compact_nonce = cb_runtime::NoncePolicy::Random;
        let mut scenario = BigBlockScenario::new(config, node.rpc()).unwrap();
        scenario.run().unwrap();
        assert!(scenario.report().passed());
    }

    #[test]
    fn test_node_refusing_big_blocks_fails_the_step() {
        let node = MockNode::with_behaviour(MockBehaviour {
            size_cap: Some(10_000),
            ..Default::default()
        });
        let mut scenario = BigBlockScenario::new(config(&node), node.rpc()).unwrap();

        match scenario.run() {
            Err(ScenarioError::OutcomeMismatch { step, .. }) => assert_eq!(step, "b1"),
            other => panic!("expected outcome mismatch, got {other:?}"),
        }
        let report = scenario.report();
        assert!(!report.passed());
        let last = report.steps.last().unwrap();
        assert!(matches!(
            &last.actual,
            Outcome::Rejected { reason, code: 0x10, .. } if reason == "bad-blk-length"
        ));
    }

    #[test]
    fn test_missing_getheaders_times_out() {
        let node = MockNode::with_behaviour(MockBehaviour {
            send_getheaders: false,
            ..Default::default()
        });
        let mut config = config(&node);
        config.scenario.wait_timeout_secs = 1;
        config.scenario.maturity_depth = 3;
        let mut scenario = BigBlockScenario::new(config, node.rpc()).unwrap();

        match scenario.run() {
            Err(ScenarioError::Relay(RelayError::ProtocolTimeout { waiting_for, .. })) => {
                assert_eq!(waiting_for, "getheaders")
            }
            other => panic!("expected getheaders timeout, got {other:?}"),
        }
        // Maturity finished before the observer connected.
        assert!(scenario.report().passed());
        assert_eq!(node.accepted().len(), 3);
    }

    #[test]
    fn test_missing_sendcmpct_times_out() {
        let node = MockNode::with_behaviour(MockBehaviour {
            send_sendcmpct: false,
            ..Default::default()
        });
        let mut config = config(&node);
        config.scenario.wait_timeout_secs = 1;
        config.scenario.maturity_depth = 3;
        let mut scenario = BigBlockScenario::new(config, node.rpc()).unwrap();

        assert!(matches!(
            scenario.run(),
            Err(ScenarioError::Relay(RelayError::ProtocolTimeout { .. }))
        ));
    }
}
