//! Benchmarks for notification dispatch and sink fan-out.
//!
//! Run with: `cargo bench --package bindchain-core --bench dispatch_bench`
//!
//! Dispatch cost is linear in the number of registry entries (every entry's
//! name is compared against the notification) plus one field read and one
//! publish per matching entry. The groups below isolate those terms.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::OnceLock;

use bindchain_core::{
    AsChangeChain, ChainError, ChangeHandler, ChangeListeners, ChangeNotification, ChangeSource,
    FieldSet, FieldTable, NotifyChanged, Publisher, StreamExt, SubscriptionHandle, Unsubscribe,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

// ============================================================================
// Fixture
// ============================================================================

#[derive(Default)]
struct Gauge {
    a: Cell<i64>,
    b: Cell<i64>,
    listeners: ChangeListeners,
}

impl ChangeSource for Gauge {
    fn subscribe_to_changes(&self, handler: ChangeHandler) -> Result<Unsubscribe, ChainError> {
        self.listeners.add(handler)
    }
}

impl NotifyChanged for Gauge {
    fn change_listeners(&self) -> Option<&ChangeListeners> {
        Some(&self.listeners)
    }
}

impl FieldSet for Gauge {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Gauge>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::builder()
                .read_write("A", |g: &Gauge| g.a.get(), |g: &Gauge, v: i64| g.a.set(v))
                .read_write("B", |g: &Gauge| g.b.get(), |g: &Gauge, v: i64| g.b.set(v))
                .build()
        })
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// `entries` streams on "A" plus the same number on "B"; only "A" is raised.
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let notification = ChangeNotification::new("A");

    for entries in [1usize, 8, 64] {
        let source = Rc::new(Gauge::default());
        let chain = source.change_chain().expect("open source");
        let mut subs: Vec<SubscriptionHandle> = Vec::new();
        for _ in 0..entries {
            for field in ["A", "B"] {
                let stream = chain
                    .request_field_stream::<i64>(field)
                    .expect("declared field");
                subs.push(stream.subscribe(|v| {
                    black_box(*v);
                }));
            }
        }

        group.bench_with_input(
            BenchmarkId::new("matching_entries", entries),
            &entries,
            |b, _| {
                b.iter(|| {
                    source.a.set(source.a.get() + 1);
                    source.listeners.raise(black_box(&notification));
                });
            },
        );
        drop(subs);
    }

    group.finish();
}

// ============================================================================
// Publish
// ============================================================================

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");

    for subscribers in [1usize, 16, 256] {
        let publisher = Publisher::<i64>::new();
        let subs: Vec<SubscriptionHandle> = (0..subscribers)
            .map(|_| {
                publisher.subscribe(|v| {
                    black_box(*v);
                })
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, _| {
                let mut n = 0i64;
                b.iter(|| {
                    n += 1;
                    publisher.publish(black_box(n));
                });
            },
        );
        drop(subs);
    }

    group.finish();
}

// ============================================================================
// Sinks
// ============================================================================

/// One source field written into `targets` objects, with and without the
/// follow-up notification.
fn bench_sinks(c: &mut Criterion) {
    let mut group = c.benchmark_group("sinks");

    for targets in [1usize, 16] {
        for raise in [false, true] {
            let source = Rc::new(Gauge::default());
            let chain = source.change_chain().expect("open source");
            let stream = chain.request_field_stream::<i64>("A").expect("declared field");
            let sinks: Vec<Rc<Gauge>> = (0..targets).map(|_| Rc::new(Gauge::default())).collect();
            let subs: Vec<SubscriptionHandle> = sinks
                .iter()
                .map(|target| {
                    let wired = if raise {
                        stream.assign_and_raise_changed(target, "B")
                    } else {
                        stream.assign_to(target, "B")
                    };
                    wired.expect("writable field")
                })
                .collect();

            let name = if raise { "assign_and_raise" } else { "assign" };
            group.bench_with_input(BenchmarkId::new(name, targets), &targets, |b, _| {
                b.iter(|| {
                    source.a.set(source.a.get() + 1);
                    source.listeners.raise_field("A");
                });
            });
            drop(subs);
        }
    }

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_dispatch, bench_publish, bench_sinks);

criterion_main!(benches);
