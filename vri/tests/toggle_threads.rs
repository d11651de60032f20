use std::fs;
use std::thread;

use vri::config::{Config, CovmapOutput, ToggleOutput};
use vri::toggle::{self, Counting};
use vri::Session;

const THREADS: u64 = 8;
const ASSIGNMENTS: u64 = 10_000;

fn expected_thread_total(seed: u64) -> u64 {
    let mut previous = 0u64;
    let mut total = 0;
    for i in 0..ASSIGNMENTS {
        let next = seed.wrapping_mul(0x9e37_79b9_7f4a_7c15).rotate_left(i as u32) ^ i;
        total += u64::from((previous ^ next).count_ones());
        previous = next;
    }
    total
}

/// The flushed total is the sum over all threads, whatever order they finish in.
#[test]
fn test_threads_fold_into_flushed_total() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::new(Config {
        covmap: CovmapOutput {
            path: dir.path().join("covmap"),
            compressed: false,
        },
        toggles: ToggleOutput::Binary {
            path: dir.path().join("bitflips"),
        },
    });

    let handles: Vec<_> = (0..THREADS)
        .map(|seed| {
            thread::spawn(move || {
                let mut register = Counting::new(0u64);
                for i in 0..ASSIGNMENTS {
                    register.set(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15).rotate_left(i as u32) ^ i);
                }

                // finish in reverse order of creation
                thread::sleep(std::time::Duration::from_millis((THREADS - seed) * 10));
                toggle::thread_total()
            })
        })
        .collect();

    let per_thread: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let expected: u64 = (0..THREADS).map(expected_thread_total).sum();

    assert_eq!(per_thread.iter().sum::<u64>(), expected);
    assert_eq!(toggle::global_total(), expected);

    let report = session.shutdown().unwrap();
    assert_eq!(report.toggles, expected);
    assert_eq!(
        fs::read(dir.path().join("bitflips")).unwrap(),
        expected.to_be_bytes().to_vec()
    );
}
