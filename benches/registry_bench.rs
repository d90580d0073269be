//! Benchmarks for registry lookups and server fan-out
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mocksocket::{listener, ConnectionRegistry, EmitOptions, Server, SocketIoClient};
use tokio::runtime::Runtime;

fn connected_server(rt: &Runtime, url: &str, clients: usize) -> (ConnectionRegistry, Server, Vec<SocketIoClient>) {
    let guard = rt.enter();
    let registry = ConnectionRegistry::new();
    let server = Server::new(&registry, url).unwrap();
    let sockets: Vec<_> = (0..clients)
        .map(|i| {
            let socket = SocketIoClient::new(&registry, url).unwrap();
            socket.on("tick", listener(|d| {
                black_box(d.args());
            }));
            if i % 2 == 0 {
                socket.join("even");
            }
            socket
        })
        .collect();
    drop(guard);
    rt.block_on(registry.settle());
    (registry, server, sockets)
}

fn bench_lookup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("lookup");

    let _guard = rt.enter();
    let registry = ConnectionRegistry::new();
    let servers: Vec<_> = (0..100)
        .map(|i| Server::new(&registry, &format!("ws://host{}:8080", i)).unwrap())
        .collect();

    group.bench_function("exact_100", |b| {
        b.iter(|| registry.lookup_server(black_box("ws://host99:8080/")))
    });

    group.bench_function("prefix_100", |b| {
        b.iter(|| registry.lookup_server(black_box("ws://host99:8080/chat/room")))
    });

    group.finish();
    for server in servers {
        server.stop();
    }
}

fn bench_fan_out(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("fan_out");

    for size in [10, 100, 1000] {
        let (_registry, server, _sockets) = connected_server(&rt, "ws://localhost:8080", size);

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("emit_all_{}", size), |b| {
            b.iter(|| server.emit("tick", black_box(1), EmitOptions::default()))
        });

        group.bench_function(format!("emit_room_{}", size), |b| {
            b.iter(|| server.to("even").emit("tick", black_box(1)))
        });

        server.stop();
    }

    group.finish();
}

criterion_group!(benches, bench_lookup, bench_fan_out);
criterion_main!(benches);
