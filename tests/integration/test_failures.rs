//! Error propagation, fail-fast shutdown, and cancellation.

use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use seqpipe_lib::cancel::CancellationToken;
use seqpipe_lib::errors::PipelineError;
use seqpipe_lib::pipeline::{PipelineConfig, run_ordered, run_unordered};
use seqpipe_lib::source::{infallible, push_source};

use crate::helpers::{THREAD_COUNTS, run_with_timeout};

const FAIL_AT: u64 = 137;

/// A single failing transform stops the run, and nothing at or after it reaches the sink.
#[test]
fn test_transform_error_fails_fast() {
    for threads in THREAD_COUNTS {
        let result = run_with_timeout(Duration::from_secs(30), move || {
            let mut delivered = Vec::new();
            let outcome = run_ordered(
                &PipelineConfig::new(threads),
                infallible(0..10_000_u64),
                |x, _, _| {
                    if x == FAIL_AT {
                        return Err(io::Error::other("designated failure"));
                    }
                    Ok(x)
                },
                |x| {
                    delivered.push(x);
                    Ok::<_, Infallible>(())
                },
            );
            (outcome, delivered)
        });

        let (outcome, delivered) = result.expect("pipeline hung after a transform error");
        match outcome {
            Err(PipelineError::Transform { sequence, source, .. }) => {
                assert_eq!(sequence, FAIL_AT);
                assert!(source.to_string().contains("designated failure"));
            }
            other => panic!("threads={threads}: expected transform error, got {other:?}"),
        }
        assert!(delivered.len() as u64 <= FAIL_AT, "threads={threads}");
        let prefix: Vec<u64> = (0..delivered.len() as u64).collect();
        assert_eq!(delivered, prefix, "threads={threads}: delivered results must be a prefix");
    }
}

/// Workers stop pulling soon after an error instead of draining the whole source.
#[test]
fn test_error_stops_pulling() {
    for threads in THREAD_COUNTS {
        let pulled = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&pulled);
        let inputs = (0..1_000_000_u64).map(move |x| {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok::<_, Infallible>(x)
        });

        let error = run_unordered(
            &PipelineConfig::new(threads),
            inputs,
            |x, _, _, emitter| {
                if x == 10 {
                    return Err("stop here");
                }
                emitter.emit(x);
                Ok(())
            },
            |_: u64| Ok::<_, Infallible>(()),
        )
        .unwrap_err();

        assert_eq!(error.sequence(), Some(10));
        assert!(pulled.load(Ordering::Relaxed) < 1_000, "threads={threads}");
    }
}

/// A source that fails immediately invokes neither transform nor sink.
#[test]
fn test_source_error_before_first_item() {
    for threads in THREAD_COUNTS {
        let transformed = AtomicU64::new(0);
        let mut sunk = 0;
        let error = run_ordered(
            &PipelineConfig::new(threads),
            std::iter::once(Err::<u32, _>(io::Error::other("unreadable"))),
            |x, _, _| {
                transformed.fetch_add(1, Ordering::Relaxed);
                Ok::<_, Infallible>(x)
            },
            |_| {
                sunk += 1;
                Ok::<_, Infallible>(())
            },
        )
        .unwrap_err();

        assert!(matches!(error, PipelineError::Source { sequence: 0, .. }));
        assert_eq!(transformed.load(Ordering::Relaxed), 0);
        assert_eq!(sunk, 0);
    }
}

/// A mid-stream source error is returned, and whatever reached the sink is an in-order
/// prefix of the items before it. With one thread that prefix is complete.
#[test]
fn test_source_error_mid_stream() {
    for threads in THREAD_COUNTS {
        let inputs = (0..100_u32).map(|x| if x == 60 { Err("corrupt record") } else { Ok(x) });
        let mut out = Vec::new();
        let error = run_ordered(
            &PipelineConfig::new(threads),
            inputs,
            |x, _, _| Ok::<_, Infallible>(x),
            |x| {
                out.push(x);
                Ok::<_, Infallible>(())
            },
        )
        .unwrap_err();

        assert!(matches!(error, PipelineError::Source { sequence: 60, .. }), "{error:?}");
        assert_eq!(out, (0..out.len() as u32).collect::<Vec<_>>(), "threads={threads}");
        if threads == 1 {
            assert_eq!(out.len(), 60);
        }
    }
}

/// A sink error stops the run even though the item transformed successfully.
#[test]
fn test_sink_error() {
    for threads in THREAD_COUNTS {
        let mut accepted = 0_u32;
        let error = run_ordered(
            &PipelineConfig::new(threads),
            infallible(0..500_u32),
            |x, _, _| Ok::<_, Infallible>(x),
            |x| {
                if x == 42 {
                    return Err(io::Error::other("sink closed"));
                }
                accepted += 1;
                Ok(())
            },
        )
        .unwrap_err();

        assert!(matches!(error, PipelineError::Sink { sequence: 42, .. }));
        assert_eq!(accepted, 42, "threads={threads}");
    }
}

/// When many items fail, exactly one error comes back.
#[test]
fn test_first_error_wins_under_contention() {
    for threads in THREAD_COUNTS {
        let error = run_unordered(
            &PipelineConfig::new(threads),
            infallible(0..1000_u32),
            |x, _, _, _emitter: &mut seqpipe_lib::Emitter<'_, u32>| {
                if x >= 100 {
                    return Err(format!("failure {x}"));
                }
                Ok(())
            },
            |_| Ok::<_, Infallible>(()),
        )
        .unwrap_err();

        let sequence = error.sequence().expect("transform errors carry a sequence");
        assert!(sequence >= 100);
        assert!(error.to_string().contains(&format!("failure {sequence}")));
    }
}

/// A panicking transform is reported as an error rather than tearing down the caller.
#[test]
fn test_worker_panic_reported() {
    for threads in [2, 4] {
        let error = run_ordered(
            &PipelineConfig::new(threads),
            infallible(0..100_u32),
            |x, _, _| {
                assert!(x != 33, "transform exploded on {x}");
                Ok::<_, Infallible>(x)
            },
            |_| Ok::<_, Infallible>(()),
        )
        .unwrap_err();

        match error {
            PipelineError::WorkerPanicked { message, .. } => {
                assert!(message.contains("exploded on 33"));
            }
            other => panic!("expected worker panic, got {other:?}"),
        }
    }
}

/// A sink that panics stops ordered delivery before any other worker can hand over the
/// next result, even when that result is already waiting on the delivery lock.
#[test]
fn test_sink_panic_blocks_later_results() {
    for round in 0..20 {
        let mut seen = Vec::new();
        let error = run_ordered(
            &PipelineConfig::new(2),
            infallible(0..4_u32),
            |x, _, _| {
                if x == 1 {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Ok::<_, Infallible>(x)
            },
            |x| {
                if x == 0 {
                    std::thread::sleep(Duration::from_millis(20));
                    panic!("sink exploded on {x}");
                }
                seen.push(x);
                Ok::<_, Infallible>(())
            },
        )
        .unwrap_err();

        match error {
            PipelineError::WorkerPanicked { message, .. } => {
                assert!(message.contains("sink exploded on 0"), "round {round}: {message}");
            }
            other => panic!("round {round}: expected worker panic, got {other:?}"),
        }
        assert!(seen.is_empty(), "round {round}: sink received {seen:?} after panicking");
    }
}

/// An input iterator that panics fails the run as a source error at the item it was
/// producing, on every thread count.
#[test]
fn test_source_panic_reported() {
    for threads in THREAD_COUNTS {
        let result = run_with_timeout(Duration::from_secs(30), move || {
            let inputs = (0..100_u32).map(|x| {
                assert!(x != 5, "reader crashed at {x}");
                Ok::<_, io::Error>(x)
            });
            let mut out = Vec::new();
            let outcome = run_ordered(
                &PipelineConfig::new(threads),
                inputs,
                |x, _, _| Ok::<_, Infallible>(x),
                |x| {
                    out.push(x);
                    Ok::<_, Infallible>(())
                },
            );
            (outcome, out)
        });

        let (outcome, out) = result.expect("pipeline hung after a source panic");
        match outcome {
            Err(PipelineError::Source { sequence, source }) => {
                assert_eq!(sequence, 5, "threads={threads}");
                assert!(source.to_string().contains("reader crashed at 5"));
            }
            other => panic!("threads={threads}: expected source error, got {other:?}"),
        }
        assert_eq!(out, (0..out.len() as u32).collect::<Vec<_>>(), "threads={threads}");
        assert!(out.len() <= 5, "threads={threads}");
    }
}

/// External cancellation stops the run and reports how much was delivered.
#[test]
fn test_external_cancellation() {
    for threads in THREAD_COUNTS {
        let token = CancellationToken::new();
        let config = PipelineConfig::new(threads).with_cancellation(token.clone());
        let mut delivered = 0_u64;

        let error = run_ordered(
            &config,
            infallible(0..100_000_u64),
            |x, _, _| Ok::<_, Infallible>(x),
            |_| {
                delivered += 1;
                if delivered == 10 {
                    token.cancel();
                }
                Ok::<_, Infallible>(())
            },
        )
        .unwrap_err();

        assert!(error.is_cancelled(), "threads={threads}: {error:?}");
        assert!(matches!(error, PipelineError::Cancelled { delivered: 10 }));
        assert_eq!(delivered, 10);
    }
}

/// A token cancelled before the run starts means nothing is pulled.
#[test]
fn test_cancelled_before_start() {
    for threads in THREAD_COUNTS {
        let token = CancellationToken::new();
        token.cancel();
        let config = PipelineConfig::new(threads).with_cancellation(token);
        let error = run_ordered(
            &config,
            infallible(0..10_u8),
            |x, _, _| Ok::<_, Infallible>(x),
            |_| Ok::<_, Infallible>(()),
        )
        .unwrap_err();
        assert!(matches!(error, PipelineError::Cancelled { delivered: 0 }));
    }
}

/// Empty input succeeds without invoking the transform or sink.
#[test]
fn test_empty_input() {
    for threads in THREAD_COUNTS {
        let stats = run_ordered(
            &PipelineConfig::new(threads),
            infallible(Vec::<u32>::new()),
            |_, _, _| -> Result<u32, Infallible> { panic!("transform called on empty input") },
            |_| -> Result<(), Infallible> { panic!("sink called on empty input") },
        )
        .unwrap();
        assert_eq!(stats.items_pulled, 0);
        assert_eq!(stats.results_delivered, 0);
    }
}

/// A push source whose consumer stops early does not leave its producer blocked.
#[test]
fn test_push_source_shutdown_on_error() {
    for threads in THREAD_COUNTS {
        let result = run_with_timeout(Duration::from_secs(30), move || {
            let config = PipelineConfig::new(threads);
            let source = push_source(config.push_capacity(), |pusher| {
                let mut i = 0_u64;
                while pusher.push(i) {
                    i += 1;
                }
                Ok::<_, Infallible>(())
            });
            run_ordered(
                &config,
                source,
                |x, _, _| if x == 500 { Err("bad value") } else { Ok(x) },
                |_| Ok::<_, Infallible>(()),
            )
        });

        let outcome = result.expect("push source producer hung");
        assert!(matches!(outcome, Err(PipelineError::Transform { sequence: 500, .. })));
    }
}

/// A push-source generator error surfaces as a source error after the pushed items.
#[test]
fn test_push_source_generator_error() {
    for threads in THREAD_COUNTS {
        let source = push_source(4, |pusher| {
            for i in 0..20_u32 {
                pusher.push(i);
            }
            Err(io::Error::other("upstream closed"))
        });
        let mut out = Vec::new();
        let error = run_ordered(
            &PipelineConfig::new(threads),
            source,
            |x, _, _| Ok::<_, Infallible>(x),
            |x| {
                out.push(x);
                Ok::<_, Infallible>(())
            },
        )
        .unwrap_err();

        assert!(matches!(error, PipelineError::Source { sequence: 20, .. }), "{error:?}");
        assert_eq!(out, (0..out.len() as u32).collect::<Vec<_>>());
        if threads == 1 {
            assert_eq!(out.len(), 20);
        }
    }
}
