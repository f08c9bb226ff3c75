//! Transaction and block templates used by the engine and the scenario.

use std::sync::Arc;

use shared_types::opcodes::OP_RETURN;
use shared_types::{
    encode_script_num, Amount, Block, BlockHeader, Encodable, OutPoint, Script, ScriptBuilder,
    Transaction, TxIn, TxOut, COIN,
};

use super::entities::PreviousSpendableOutput;
use crate::{COINBASE_MIN_SIZE, SPENDABLE_OUTPUTS_PER_TX, SUBSIDY_HALVING_INTERVAL};

/// Block reward at `height`: 50 coins halving every 150 blocks.
pub fn subsidy(height: u32) -> Amount {
    let halvings = height / SUBSIDY_HALVING_INTERVAL;
    if halvings >= 63 {
        return 0;
    }
    (50 * COIN) >> halvings
}

/// Coinbase for `height` paying the subsidy to `OP_TRUE`.
///
/// The scriptSig pushes the height and is padded with `'x'` bytes until the
/// serialized transaction reaches the 100-byte minimum.
pub fn create_coinbase(height: u32) -> Transaction {
    let height_push = ScriptBuilder::new()
        .push_slice(&encode_script_num(i64::from(height)))
        .into_script();
    let mut coinbase = Transaction::new(
        1,
        vec![TxIn {
            prevout: OutPoint::null(),
            script_sig: height_push,
            sequence: u32::MAX,
        }],
        vec![TxOut::new(subsidy(height), Script::op_true())],
        0,
    );

    let size = coinbase.encoded_len();
    if size < COINBASE_MIN_SIZE {
        let input = &mut coinbase.inputs_mut()[0];
        let mut script = std::mem::take(&mut input.script_sig).into_bytes();
        script.resize(script.len() + (COINBASE_MIN_SIZE - size), b'x');
        input.script_sig = Script::from_bytes(script);
    }
    coinbase
}

/// Single-output transaction spending output `n` of `spend_tx`.
pub fn create_tx(spend_tx: &Transaction, n: u32, value: Amount, script: Script) -> Transaction {
    Transaction::new(
        1,
        vec![TxIn {
            prevout: OutPoint::new(spend_tx.txid(), n),
            script_sig: Script::new(),
            sequence: u32::MAX,
        }],
        vec![TxOut::new(value, script)],
        0,
    )
}

/// Unsolved block with the merkle root of `transactions`.
pub fn create_block(
    version: i32,
    prev_block: [u8; 32],
    time: u32,
    bits: u32,
    transactions: Vec<Arc<Transaction>>,
) -> Block {
    let mut block = Block::new(
        BlockHeader::new(version, prev_block, [0u8; 32], time, bits, 0),
        transactions,
    );
    block.update_merkle_root();
    block
}

/// Transaction spending `spend` with the standard run of zero-value
/// `OP_TRUE` outputs that later padding transactions spend.
pub fn spendable_outputs_tx(spend: &PreviousSpendableOutput) -> Transaction {
    Transaction::new(
        1,
        vec![TxIn::spending(spend.outpoint())],
        vec![TxOut::new(0, Script::op_true()); SPENDABLE_OUTPUTS_PER_TX as usize],
        0,
    )
}

/// `<8 random bytes> OP_RETURN`, a fixed-size unspendable output.
pub fn random_data_script(nonce: u64) -> Script {
    ScriptBuilder::new()
        .push_slice(&nonce.to_le_bytes())
        .push_opcode(OP_RETURN)
        .into_script()
}
