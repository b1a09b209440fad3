//! End-to-end workloads with known answers.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};

use seqpipe_lib::grouper::RunGrouper;
use seqpipe_lib::pipeline::{PipelineConfig, run_grouped, run_ordered, run_unordered};
use seqpipe_lib::source::{infallible, push_source};

use crate::helpers::THREAD_COUNTS;

/// Sum of square roots over `1..=100_000` is the same for every worker count.
#[test]
fn test_sqrt_sum() {
    for threads in THREAD_COUNTS {
        let mut sum = 0.0_f64;
        run_ordered(
            &PipelineConfig::new(threads),
            infallible(1..=100_000_u32),
            |x, _, _| Ok::<_, Infallible>(f64::from(x).sqrt()),
            |root| {
                sum += root;
                Ok::<_, Infallible>(())
            },
        )
        .unwrap();
        assert_eq!(sum.round(), 21_082_009.0, "threads={threads}");
    }
}

/// Per-worker accumulators indexed by worker id add up to the total of the inputs.
#[test]
fn test_per_worker_accumulators() {
    for threads in THREAD_COUNTS {
        let accumulators: Vec<AtomicU64> = (0..threads).map(|_| AtomicU64::new(0)).collect();
        run_ordered(
            &PipelineConfig::new(threads),
            infallible(1..=100_u64),
            |x, _, worker| {
                accumulators[worker].fetch_add(x, Ordering::Relaxed);
                Ok::<_, Infallible>(0_u64)
            },
            |_| Ok::<_, Infallible>(()),
        )
        .unwrap();

        let total: u64 = accumulators.iter().map(|a| a.load(Ordering::Relaxed)).sum();
        assert_eq!(total, 5050, "threads={threads}");
    }
}

fn parity_groups(threads: usize) -> Vec<Vec<i32>> {
    let config = PipelineConfig::new(threads);
    let source = push_source(config.push_capacity(), |pusher| {
        for x in [1, 4, 2, 6, 9, 4, 5, 7] {
            if !pusher.push(x) {
                break;
            }
        }
        Ok::<_, Infallible>(())
    });

    let mut groups = Vec::new();
    run_grouped(
        &config,
        source,
        RunGrouper::new(|x: &i32| x % 2 == 0),
        |group: Vec<i32>, _, _, emitter| {
            emitter.emit(group);
            Ok::<_, Infallible>(())
        },
        |group| {
            groups.push(group);
            Ok::<_, Infallible>(())
        },
    )
    .unwrap();
    groups
}

/// Consecutive same-parity values from a push source form the expected groups.
#[test]
fn test_parity_grouping() {
    let expected = vec![vec![1], vec![4, 2, 6], vec![9], vec![4], vec![5, 7]];
    assert_eq!(parity_groups(1), expected);

    for threads in THREAD_COUNTS {
        let mut groups = parity_groups(threads);
        groups.sort();
        let mut sorted = expected.clone();
        sorted.sort();
        assert_eq!(groups, sorted, "threads={threads}");
    }
}

/// Unordered fan-out: each input emits one result per character.
#[test]
fn test_unordered_fan_out_word_characters() {
    let words = ["pipeline", "reorder", "worker", "sink"];
    let expected: usize = words.iter().map(|w| w.len()).sum();
    for threads in THREAD_COUNTS {
        let mut chars = Vec::new();
        run_unordered(
            &PipelineConfig::new(threads),
            infallible(words),
            |word, _, _, emitter| {
                for c in word.chars() {
                    if !emitter.emit(c) {
                        break;
                    }
                }
                Ok::<_, Infallible>(())
            },
            |c| {
                chars.push(c);
                Ok::<_, Infallible>(())
            },
        )
        .unwrap();
        assert_eq!(chars.len(), expected, "threads={threads}");
    }
}
