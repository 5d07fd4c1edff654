//! Render and notification throughput.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use lattice_observer::{observer_with, ComponentType, Node, ObserverConfig, Props, Root, Signal};

fn list(config: &ObserverConfig, items: &Signal<Vec<i64>>) -> ComponentType {
    let items = items.clone();
    observer_with(
        &ComponentType::function("List", move |_| {
            let rows = items
                .get()
                .into_iter()
                .map(|item| Node::tag("li", [Node::text(item.to_string())]));
            Ok(Node::tag("ul", rows))
        }),
        config,
    )
    .unwrap()
}

fn bench_mount(c: &mut Criterion) {
    let config = ObserverConfig::new();
    let items = Signal::new((0..100).collect::<Vec<i64>>());
    let ty = list(&config, &items);

    c.bench_function("mount_list_100", |b| {
        b.iter_batched(
            Root::new,
            |root| {
                root.render(ty.element(Props::new())).unwrap();
                black_box(root)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_reactive_update(c: &mut Criterion) {
    let config = ObserverConfig::new();
    let items = Signal::new((0..100).collect::<Vec<i64>>());
    let ty = list(&config, &items);
    let root = Root::new();
    root.render(ty.element(Props::new())).unwrap();

    let mut next = 0;
    c.bench_function("signal_update_rerender", |b| {
        b.iter(|| {
            next += 1;
            root.act(|| {
                items.update(|current| {
                    let mut updated = current.clone();
                    updated[0] = next;
                    updated
                })
            })
            .unwrap();
        })
    });
}

fn bench_coalesced_updates(c: &mut Criterion) {
    let config = ObserverConfig::new();
    let counter = Signal::new(0i64);
    let ty = {
        let counter = counter.clone();
        observer_with(
            &ComponentType::function("Counter", move |_| Ok(Node::text(counter.get().to_string()))),
            &config,
        )
        .unwrap()
    };
    let root = Root::new();
    root.render(ty.element(Props::new())).unwrap();

    c.bench_function("ten_writes_one_render", |b| {
        b.iter(|| {
            root.act(|| {
                for _ in 0..10 {
                    counter.update(|n| n + 1);
                }
            })
            .unwrap();
        })
    });
}

criterion_group!(benches, bench_mount, bench_reactive_update, bench_coalesced_updates);
criterion_main!(benches);
