//! Integration Tests for Reactive System
//!
//! These tests verify that signals, memos, and effects work together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_core::config::{EffectScheduling, ReactiveConfig};
use trellis_core::error::ReactiveError;
use trellis_core::reactive::{batch, flush_effects, untrack, Effect, Memo, Owner, Runtime, Signal};

/// `count` updated three times, `doubled` reads 6.
#[test]
fn doubled_follows_three_increments() {
    let count = Signal::new(0);
    let count_c = count.clone();
    let doubled = Memo::new(move || count_c.get() * 2);

    for _ in 0..3 {
        count.update(|c| c + 1);
    }

    assert_eq!(doubled.get(), 6);
}

/// Test that memos cache values correctly.
#[test]
fn memo_caches_between_writes() {
    let compute_count = Arc::new(AtomicI32::new(0));
    let compute_clone = compute_count.clone();
    let input = Signal::new(21);
    let input_c = input.clone();

    let memo = Memo::new(move || {
        compute_clone.fetch_add(1, Ordering::SeqCst);
        input_c.get() * 2
    });

    // Nothing runs before the first read
    assert_eq!(compute_count.load(Ordering::SeqCst), 0);

    assert_eq!(memo.get(), 42);
    assert_eq!(memo.get(), 42);
    assert_eq!(memo.get(), 42);
    assert_eq!(compute_count.load(Ordering::SeqCst), 1);

    input.set(5);
    input.set(6);
    assert_eq!(memo.get(), 12);
    assert_eq!(compute_count.load(Ordering::SeqCst), 2);
}

/// Test that memos can depend on other memos.
#[test]
fn memo_chain() {
    let base = Signal::new(2);
    let base_c = base.clone();
    let squared = Memo::new(move || base_c.get() * base_c.get());
    let squared_c = squared.clone();
    let plus_one = Memo::new(move || squared_c.get() + 1);

    assert_eq!(plus_one.get(), 5);

    base.set(3);
    assert_eq!(plus_one.get(), 10);
    assert_eq!(squared.dependent_count(), 1);
}

/// An effect runs once per settled batch that touches it.
#[test]
fn effect_runs_once_per_settled_batch() {
    let a = Signal::new(0);
    let b = Signal::new(0);
    let runs = Arc::new(AtomicI32::new(0));

    let (a_c, b_c, runs_c) = (a.clone(), b.clone(), runs.clone());
    let _effect = Effect::new(move || {
        let _ = a_c.get() + b_c.get();
        runs_c.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    batch(|| {
        a.set(1);
        b.set(1);
        a.set(2);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    // Each write outside a batch settles by itself.
    a.set(3);
    b.set(3);
    assert_eq!(runs.load(Ordering::SeqCst), 4);
}

/// Switching the branch changes which signal triggers recomputation.
#[test]
fn dynamic_dependencies_follow_the_branch() {
    let use_left = Signal::new(true);
    let left = Signal::new(1);
    let right = Signal::new(100);
    let computes = Arc::new(AtomicI32::new(0));

    let (flag, l, r, computes_c) = (use_left.clone(), left.clone(), right.clone(), computes.clone());
    let picked = Memo::new(move || {
        computes_c.fetch_add(1, Ordering::SeqCst);
        if flag.get() {
            l.get()
        } else {
            r.get()
        }
    });

    assert_eq!(picked.get(), 1);
    assert_eq!(picked.dependency_count(), 2);

    // `right` is not a dependency yet
    right.set(200);
    assert_eq!(picked.get(), 1);
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    use_left.set(false);
    assert_eq!(picked.get(), 200);
    assert_eq!(computes.load(Ordering::SeqCst), 2);

    // and now `left` no longer is
    left.set(2);
    assert_eq!(picked.get(), 200);
    assert_eq!(computes.load(Ordering::SeqCst), 2);
    assert_eq!(left.dependent_count(), 0);
}

/// Both sides of a diamond settle before the effect sees them.
#[test]
fn diamond_is_glitch_free() {
    let source = Signal::new(1);
    let (s1, s2) = (source.clone(), source.clone());
    let plus = Memo::new(move || s1.get() + 1);
    let times = Memo::new(move || s2.get() * 10);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (plus_c, times_c, seen_c) = (plus.clone(), times.clone(), seen.clone());
    let effect = Effect::new(move || {
        seen_c.lock().push((plus_c.get(), times_c.get()));
    });

    source.set(2);
    source.set(3);

    assert_eq!(*seen.lock(), vec![(2, 10), (3, 20), (4, 30)]);
    assert_eq!(effect.run_count(), 3);
}

/// A memo that recomputes to the same value does not wake its effects.
#[test]
fn equal_memo_value_stops_propagation() {
    let n = Signal::new(4);
    let n_c = n.clone();
    let parity = Memo::new(move || n_c.get() % 2);

    let runs = Arc::new(AtomicI32::new(0));
    let (parity_c, runs_c) = (parity.clone(), runs.clone());
    let _effect = Effect::new(move || {
        let _ = parity_c.get();
        runs_c.fetch_add(1, Ordering::SeqCst);
    });

    n.set(6);
    n.set(8);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    n.set(9);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn untracked_reads_are_not_dependencies() {
    let tracked = Signal::new(1);
    let ignored = Signal::new(10);
    let (t, i) = (tracked.clone(), ignored.clone());
    let sum = Memo::new(move || t.get() + untrack(|| i.get()));

    assert_eq!(sum.get(), 11);
    ignored.set(20);
    assert_eq!(sum.get(), 11);
    tracked.set(2);
    assert_eq!(sum.get(), 22);
}

#[test]
fn writing_from_a_memo_is_rejected() {
    let target = Signal::new(0);
    let target_c = target.clone();
    let bad = Memo::new(move || target_c.try_set(1).map_err(|err| err.to_string()));

    let outcome = bad.get();
    assert!(matches!(outcome, Err(ref msg) if msg.contains("written while memo")));
    assert_eq!(target.get(), 0);

    let t = target.clone();
    let direct = Memo::new(move || matches!(t.try_set(2), Err(ReactiveError::WriteDuringDerivation { .. })));
    assert!(direct.get());
    assert_eq!(target.version(), 0);
}

/// Test manual scheduling: effects wait for `flush_effects`.
#[test]
fn manual_scheduling_defers_effects() {
    Runtime::configure(ReactiveConfig {
        scheduling: EffectScheduling::Manual,
        ..ReactiveConfig::default()
    });

    let signal = Signal::new(0);
    let observed = Arc::new(AtomicI32::new(-1));
    let (signal_c, observed_c) = (signal.clone(), observed.clone());
    let _effect = Effect::new(move || observed_c.store(signal_c.get(), Ordering::SeqCst));
    assert_eq!(observed.load(Ordering::SeqCst), 0);

    signal.set(1);
    signal.set(2);
    assert_eq!(observed.load(Ordering::SeqCst), 0);
    assert_eq!(Runtime::pending_effects(), 1);

    assert_eq!(flush_effects(), 1);
    assert_eq!(observed.load(Ordering::SeqCst), 2);

    Runtime::configure(ReactiveConfig::default());
}

/// An effect feeding itself is stopped by the run limit.
#[test]
fn runaway_effect_is_cut_off() {
    Runtime::configure(ReactiveConfig {
        max_effect_runs: 50,
        ..ReactiveConfig::default()
    });

    let counter = Signal::new(0);
    let counter_c = counter.clone();
    let effect = Effect::new(move || {
        let next = counter_c.get() + 1;
        counter_c.set(next);
    });

    counter.set(100);
    assert!(effect.run_count() <= 52);
    assert_eq!(Runtime::pending_effects(), 0);

    Runtime::configure(ReactiveConfig::default());
}

#[test]
fn owner_disposal_stops_its_effects() {
    let signal = Signal::new(0);
    let runs = Arc::new(AtomicI32::new(0));
    let cleaned = Arc::new(AtomicI32::new(0));

    let owner = Owner::new("signals-page");
    let (signal_c, runs_c) = (signal.clone(), runs.clone());
    let effect = owner.effect(move || {
        signal_c.get();
        runs_c.fetch_add(1, Ordering::SeqCst);
    });
    let cleaned_c = cleaned.clone();
    owner.on_cleanup(move || {
        cleaned_c.fetch_add(1, Ordering::SeqCst);
    });

    signal.set(1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    drop(owner);
    assert!(effect.is_disposed());
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);

    signal.set(2);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(signal.dependent_count(), 0);
}
