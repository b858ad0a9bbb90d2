use core::time::Duration;
use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    thread::scope,
};

use crate::{
    AtomicSnowflakeGenerator, ClockDriftPolicy, Error, FlakeId, GeneratorOptions, IdGenStatus,
    IdGenerator, LockSnowflakeGenerator, MonotonicClock, SnowflakeGenerator, SystemClock,
    TimeSource, WorkerId,
};

struct MockTime {
    millis: u64,
}

impl TimeSource for MockTime {
    fn current_millis(&self) -> u64 {
        self.millis
    }
}

/// A clock the test moves by hand.
#[derive(Clone, Default)]
struct SharedClock {
    now: Arc<AtomicU64>,
}

impl SharedClock {
    fn at(millis: u64) -> Self {
        let clock = Self::default();
        clock.set(millis);
        clock
    }

    fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for SharedClock {
    fn current_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Returns the next scripted value on every read, then sticks to the last.
struct ScriptedClock {
    values: Vec<u64>,
    index: AtomicUsize,
}

impl ScriptedClock {
    fn new(values: impl Into<Vec<u64>>) -> Self {
        Self {
            values: values.into(),
            index: AtomicUsize::new(0),
        }
    }
}

impl TimeSource for ScriptedClock {
    fn current_millis(&self) -> u64 {
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        self.values[i.min(self.values.len() - 1)]
    }
}

/// Reports `base` for the first `frozen_reads` reads, then `base + 1`.
struct FreezingClock {
    base: u64,
    frozen_reads: u64,
    reads: AtomicU64,
}

impl TimeSource for FreezingClock {
    fn current_millis(&self) -> u64 {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if n < self.frozen_reads {
            self.base
        } else {
            self.base + 1
        }
    }
}

trait IdGenStatusExt {
    fn unwrap_ready(self) -> FlakeId;
    fn unwrap_pending(self) -> u64;
    fn unwrap_clock_behind(self) -> u64;
}

impl IdGenStatusExt for IdGenStatus {
    fn unwrap_ready(self) -> FlakeId {
        match self {
            Self::Ready { id } => id,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn unwrap_pending(self) -> u64 {
        match self {
            Self::Pending { yield_for } => yield_for,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn unwrap_clock_behind(self) -> u64 {
        match self {
            Self::ClockBehind { drift } => drift,
            other => panic!("unexpected {other:?}"),
        }
    }
}

fn worker(id: u64) -> WorkerId {
    WorkerId::new(id).unwrap()
}

fn patient() -> GeneratorOptions {
    GeneratorOptions::default().with_max_wait(Duration::from_secs(5))
}

fn run_id_sequence_increments_within_same_tick<G: SnowflakeGenerator>(generator: &G) {
    let id1 = generator.try_next_id().unwrap().unwrap_ready();
    let id2 = generator.try_next_id().unwrap().unwrap_ready();
    let id3 = generator.try_next_id().unwrap().unwrap_ready();

    assert_eq!(id1.timestamp(), 42);
    assert_eq!(id2.timestamp(), 42);
    assert_eq!(id3.timestamp(), 42);
    assert_eq!(id1.sequence(), 0);
    assert_eq!(id2.sequence(), 1);
    assert_eq!(id3.sequence(), 2);
    assert!(id1 < id2 && id2 < id3);
}

fn run_generator_returns_pending_when_sequence_exhausted<G: SnowflakeGenerator>(generator: &G) {
    assert_eq!(generator.try_next_id().unwrap().unwrap_pending(), 1);
}

fn run_generator_handles_rollover<G: SnowflakeGenerator>(generator: &G, clock: &SharedClock) {
    for i in 0..=FlakeId::max_sequence() {
        let id = generator.try_next_id().unwrap().unwrap_ready();
        assert_eq!(id.sequence(), i);
        assert_eq!(id.timestamp(), 42);
    }

    assert_eq!(generator.try_next_id().unwrap().unwrap_pending(), 1);

    clock.set(43);

    let id = generator.try_next_id().unwrap().unwrap_ready();
    assert_eq!(id.timestamp(), 43);
    assert_eq!(id.sequence(), 0);
}

fn run_generator_reports_clock_behind<G: SnowflakeGenerator>(generator: &G, clock: &SharedClock) {
    let before = generator.try_next_id().unwrap().unwrap_ready();
    clock.set(95);
    assert_eq!(generator.try_next_id().unwrap().unwrap_clock_behind(), 5);
    // Nothing was issued, so catching up continues right after `before`.
    clock.set(100);
    let after = generator.try_next_id().unwrap().unwrap_ready();
    assert_eq!(after.timestamp(), before.timestamp());
    assert_eq!(after.sequence(), before.sequence() + 1);
}

fn run_generator_rejects_timestamp_overflow<G: SnowflakeGenerator>(generator: &G) {
    assert_eq!(
        generator.try_next_id(),
        Err(Error::TimestampOverflow {
            timestamp: FlakeId::max_timestamp() + 1
        })
    );
}

fn run_generator_monotonic<G: SnowflakeGenerator>(generator: IdGenerator<G>) {
    const TOTAL_IDS: usize = 4096 * 64;

    let mut last: Option<FlakeId> = None;
    for _ in 0..TOTAL_IDS {
        let id = generator.generate().unwrap();
        assert_eq!(id.worker_id(), 1);
        if let Some(prev) = last {
            assert!(
                (prev.timestamp(), prev.sequence()) < (id.timestamp(), id.sequence()),
                "{prev:?} then {id:?}"
            );
            if prev.timestamp() == id.timestamp() {
                assert_eq!(id.sequence(), prev.sequence() + 1);
            } else {
                assert_eq!(id.sequence(), 0);
            }
        }
        last = Some(id);
    }
}

fn run_generator_unique_threaded<G>(generator: IdGenerator<G>)
where
    G: SnowflakeGenerator + Sync,
{
    const THREADS: usize = 8;
    const TOTAL_IDS: usize = 4096 * 64;
    const IDS_PER_THREAD: usize = TOTAL_IDS / THREADS;

    let seen_ids = Mutex::new(HashSet::with_capacity(TOTAL_IDS));

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let mut local = Vec::with_capacity(IDS_PER_THREAD);
                for _ in 0..IDS_PER_THREAD {
                    local.push(generator.generate().unwrap());
                }
                // Each thread's own view is strictly increasing.
                assert!(local.windows(2).all(|w| w[0] < w[1]));
                let mut seen = seen_ids.lock().unwrap();
                for id in local {
                    assert!(seen.insert(id), "duplicate {id:?}");
                }
            });
        }
    });

    let final_count = seen_ids.lock().unwrap().len();
    assert_eq!(final_count, TOTAL_IDS, "Expected {TOTAL_IDS} unique IDs");
}

#[test]
fn atomic_generator_sequence_test() {
    let generator = AtomicSnowflakeGenerator::new(worker(0), MockTime { millis: 42 });
    run_id_sequence_increments_within_same_tick(&generator);
}

#[test]
fn lock_generator_sequence_test() {
    let generator = LockSnowflakeGenerator::new(worker(0), MockTime { millis: 42 });
    run_id_sequence_increments_within_same_tick(&generator);
}

#[test]
fn atomic_generator_pending_test() {
    let generator = AtomicSnowflakeGenerator::from_components(
        0,
        worker(0),
        FlakeId::max_sequence(),
        MockTime { millis: 0 },
    );
    run_generator_returns_pending_when_sequence_exhausted(&generator);
}

#[test]
fn lock_generator_pending_test() {
    let generator = LockSnowflakeGenerator::from_components(
        0,
        worker(0),
        FlakeId::max_sequence(),
        MockTime { millis: 0 },
    );
    run_generator_returns_pending_when_sequence_exhausted(&generator);
}

#[test]
fn atomic_generator_rollover_test() {
    let clock = SharedClock::at(42);
    let generator = AtomicSnowflakeGenerator::new(worker(1), clock.clone());
    run_generator_handles_rollover(&generator, &clock);
}

#[test]
fn lock_generator_rollover_test() {
    let clock = SharedClock::at(42);
    let generator = LockSnowflakeGenerator::new(worker(1), clock.clone());
    run_generator_handles_rollover(&generator, &clock);
}

#[test]
fn atomic_generator_clock_behind_test() {
    let clock = SharedClock::at(100);
    let generator = AtomicSnowflakeGenerator::new(worker(1), clock.clone());
    run_generator_reports_clock_behind(&generator, &clock);
}

#[test]
fn lock_generator_clock_behind_test() {
    let clock = SharedClock::at(100);
    let generator = LockSnowflakeGenerator::new(worker(1), clock.clone());
    run_generator_reports_clock_behind(&generator, &clock);
}

#[test]
fn atomic_generator_timestamp_overflow_test() {
    let time = MockTime {
        millis: FlakeId::max_timestamp() + 1,
    };
    run_generator_rejects_timestamp_overflow(&AtomicSnowflakeGenerator::new(worker(0), time));
}

#[test]
fn lock_generator_timestamp_overflow_test() {
    let time = MockTime {
        millis: FlakeId::max_timestamp() + 1,
    };
    run_generator_rejects_timestamp_overflow(&LockSnowflakeGenerator::new(worker(0), time));
}

#[test]
fn worker_id_is_validated_at_construction() {
    assert!(matches!(
        IdGenerator::new(1024),
        Err(Error::InvalidWorkerId {
            value: 1024,
            max: 1023
        })
    ));
    assert_eq!(IdGenerator::new(0).unwrap().worker_id().get(), 0);
    assert_eq!(IdGenerator::new(1023).unwrap().worker_id().get(), 1023);
}

#[test]
fn generator_from_source() {
    let generator = IdGenerator::from_source(&worker(12)).unwrap();
    assert_eq!(generator.generate().unwrap().worker_id(), 12);
    assert!(generator.generate_i64().unwrap() > 0);
}

#[test]
fn first_ids_after_the_epoch() {
    // Clock at epoch + 1ms, worker 7, fresh state.
    let generator = IdGenerator::with_options(
        AtomicSnowflakeGenerator::new(worker(7), MockTime { millis: 1 }),
        GeneratorOptions::default(),
    );
    let first = generator.generate().unwrap();
    let second = generator.generate().unwrap();
    assert_eq!((first.timestamp(), first.worker_id(), first.sequence()), (1, 7, 0));
    assert_eq!((second.timestamp(), second.worker_id(), second.sequence()), (1, 7, 1));
}

fn run_frozen_millisecond<G: SnowflakeGenerator>(generator: IdGenerator<G>) {
    let mut sequences = HashSet::new();
    for expected in 0..=FlakeId::max_sequence() {
        let id = generator.generate().unwrap();
        assert_eq!(id.timestamp(), 500);
        assert_eq!(id.sequence(), expected);
        sequences.insert(id.sequence());
    }
    assert_eq!(sequences.len(), 4096);

    // The 4097th call waits out the frozen millisecond.
    let id = generator.generate().unwrap();
    assert_eq!(id.timestamp(), 501);
    assert_eq!(id.sequence(), 0);
}

#[test]
fn atomic_generator_waits_out_exhausted_millisecond() {
    let clock = FreezingClock {
        base: 500,
        frozen_reads: 5000,
        reads: AtomicU64::new(0),
    };
    let generator = IdGenerator::with_options(AtomicSnowflakeGenerator::new(worker(3), clock), patient());
    run_frozen_millisecond(generator);
}

#[test]
fn lock_generator_waits_out_exhausted_millisecond() {
    let clock = FreezingClock {
        base: 500,
        frozen_reads: 5000,
        reads: AtomicU64::new(0),
    };
    let generator = IdGenerator::with_options(LockSnowflakeGenerator::new(worker(3), clock), patient());
    run_frozen_millisecond(generator);
}

#[test]
fn exhausted_millisecond_times_out_when_clock_stalls() {
    let generator = IdGenerator::with_options(
        AtomicSnowflakeGenerator::from_components(
            9,
            worker(0),
            FlakeId::max_sequence(),
            MockTime { millis: 9 },
        ),
        GeneratorOptions::default().with_max_wait(Duration::from_millis(5)),
    );
    assert!(matches!(
        generator.generate(),
        Err(Error::GenerationTimeout { waited }) if waited >= Duration::from_millis(5)
    ));
    // Still consistent: nothing was issued for the stalled millisecond.
    assert_eq!(
        generator.inner().try_next_id().unwrap(),
        IdGenStatus::Pending { yield_for: 1 }
    );
}

#[test]
fn backward_clock_fails_under_fail_policy() {
    let clock = SharedClock::at(100);
    let generator = IdGenerator::with_options(
        AtomicSnowflakeGenerator::new(worker(2), clock.clone()),
        GeneratorOptions::default(),
    );
    let before = generator.generate().unwrap();

    clock.set(95);
    assert_eq!(
        generator.generate(),
        Err(Error::ClockMovedBackward { drift_ms: 5 })
    );
    // Retrying while the clock is still behind keeps failing.
    assert_eq!(
        generator.generate(),
        Err(Error::ClockMovedBackward { drift_ms: 5 })
    );

    clock.set(100);
    let after = generator.generate().unwrap();
    assert!(after > before);
}

#[test]
fn backward_clock_is_waited_out_under_wait_policy() {
    let clock = ScriptedClock::new([100, 95, 96, 97, 98, 99, 100, 101]);
    let options = patient().with_drift_policy(ClockDriftPolicy::Wait {
        max_drift: Duration::from_millis(10),
    });
    let generator = IdGenerator::with_options(LockSnowflakeGenerator::new(worker(2), clock), options);

    let before = generator.generate().unwrap();
    let after = generator.generate().unwrap();
    assert_eq!(before.timestamp(), 100);
    assert_eq!(after.timestamp(), 100);
    assert_eq!(after.sequence(), before.sequence() + 1);
}

#[test]
fn backward_clock_beyond_tolerance_fails_under_wait_policy() {
    let clock = ScriptedClock::new([100, 50]);
    let options = patient().with_drift_policy(ClockDriftPolicy::Wait {
        max_drift: Duration::from_millis(10),
    });
    let generator =
        IdGenerator::with_options(AtomicSnowflakeGenerator::new(worker(2), clock), options);

    generator.generate().unwrap();
    assert_eq!(
        generator.generate(),
        Err(Error::ClockMovedBackward { drift_ms: 50 })
    );
}

#[test]
fn backward_clock_wait_is_bounded_by_max_wait() {
    let clock = SharedClock::at(100);
    let options = GeneratorOptions::default()
        .with_drift_policy(ClockDriftPolicy::Wait {
            max_drift: Duration::from_secs(60),
        })
        .with_max_wait(Duration::from_millis(10));
    let generator =
        IdGenerator::with_options(AtomicSnowflakeGenerator::new(worker(2), clock.clone()), options);

    generator.generate().unwrap();
    clock.set(40);
    assert!(matches!(
        generator.generate(),
        Err(Error::GenerationTimeout { .. })
    ));
}

#[test]
fn atomic_generator_monotonic_clock_sequence_increments() {
    let generator = IdGenerator::with_options(
        AtomicSnowflakeGenerator::new(worker(1), MonotonicClock::default()),
        patient(),
    );
    run_generator_monotonic(generator);
}

#[test]
fn lock_generator_monotonic_clock_sequence_increments() {
    let generator = IdGenerator::with_options(
        LockSnowflakeGenerator::new(worker(1), MonotonicClock::default()),
        patient(),
    );
    run_generator_monotonic(generator);
}

#[test]
fn atomic_generator_threaded_unique() {
    run_generator_unique_threaded(IdGenerator::with_options(
        AtomicSnowflakeGenerator::new(worker(0), MonotonicClock::default()),
        patient(),
    ));
}

#[test]
fn lock_generator_threaded_unique() {
    run_generator_unique_threaded(IdGenerator::with_options(
        LockSnowflakeGenerator::new(worker(0), MonotonicClock::default()),
        patient(),
    ));
}

#[test]
fn system_clock_threaded_unique() {
    let options = patient().with_drift_policy(ClockDriftPolicy::Wait {
        max_drift: Duration::from_secs(1),
    });
    run_generator_unique_threaded(IdGenerator::with_options(
        AtomicSnowflakeGenerator::new(worker(5), SystemClock::default()),
        options,
    ));
}

#[test]
fn distinct_workers_never_collide() {
    let clock = Arc::new(MockTime { millis: 77 });
    let a = AtomicSnowflakeGenerator::new(worker(1), Arc::clone(&clock));
    let b = AtomicSnowflakeGenerator::new(worker(2), Arc::clone(&clock));
    let mut seen = HashSet::new();
    for _ in 0..100 {
        assert!(seen.insert(a.try_next_id().unwrap().unwrap_ready()));
        assert!(seen.insert(b.try_next_id().unwrap().unwrap_ready()));
    }
}
