//! # Block Synthesis Benchmarks
//!
//! | Operation | Sizes |
//! |-----------|-------|
//! | Exact-size block synthesis (padding, merkle root, PoW) | 1 MB, 8 MB |
//! | Compact block construction | 1 MB, 8 MB |
//! | Compact block reconstruction from a full pool | 1 MB, 8 MB |

use std::time::Duration;

use cb_01_block_synthesis::{
    BlockSynthesizer, ChainContext, ParentTip, PreviousSpendableOutput, SynthesisConfig,
    ONE_MEGABYTE,
};
use cb_02_compact_relay::HeaderAndShortIds;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shared_types::{Block, Script};

const SIZES: [usize; 2] = [ONE_MEGABYTE, 8 * ONE_MEGABYTE];

/// A parent tip plus a mature output to spend on top of it.
fn spend_source() -> (ParentTip, PreviousSpendableOutput) {
    let mut ctx = ChainContext::with_genesis_time([0x42; 32], 1_600_000_000, SynthesisConfig::seeded(1));
    ctx.next_block(0, None, None, 0, 0).unwrap();
    ctx.save_spendable_output().unwrap();
    let spend = ctx.get_spendable_output().unwrap();
    (ctx.chain().tip().unwrap(), spend)
}

fn build(size: usize) -> Block {
    let (parent, spend) = spend_source();
    BlockSynthesizer::new(SynthesisConfig::seeded(2))
        .build_block(&parent, Some(spend), Some(Script::op_true()), size, 0)
        .unwrap()
}

fn bench_build_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("cb-01-block-synthesis");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    let (parent, spend) = spend_source();
    let mut engine = BlockSynthesizer::new(SynthesisConfig::seeded(7));
    for size in SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("build_block", size), &size, |b, &size| {
            b.iter(|| {
                black_box(
                    engine
                        .build_block(&parent, Some(spend.clone()), Some(Script::op_true()), size, 0)
                        .unwrap(),
                )
            })
        });
    }
    group.finish();
}

fn bench_compact_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("cb-02-compact-relay");
    group.sample_size(20);

    for size in SIZES {
        let block = build(size);
        group.throughput(Throughput::Elements(block.transactions.len() as u64));

        group.bench_with_input(BenchmarkId::new("from_block", size), &block, |b, block| {
            b.iter(|| black_box(HeaderAndShortIds::from_block(block, 0)))
        });

        let compact = HeaderAndShortIds::from_block(&block, 0);
        let pool = compact.index_pool(block.transactions.iter());
        group.bench_with_input(BenchmarkId::new("reconstruct", size), &compact, |b, compact| {
            b.iter(|| black_box(compact.reconstruct(|id| pool.get(id).cloned()).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build_block, bench_compact_block);
criterion_main!(benches);
