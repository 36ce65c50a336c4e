// benches/publish_fanout.rs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rpubsub::{Broker, BrokerOptions, Client, IdentityPolicy, IpcServer, SubscriberId};
use tokio::runtime::Runtime;

const PAYLOAD: &[u8] = b"benchmark payload of a realistic size, forty-eight";
const PUBLISHER: SubscriberId = SubscriberId::new(u32::MAX as u64);

fn bench_in_memory_fanout(c: &mut Criterion) {
  let mut group = c.benchmark_group("publish_fanout");
  group.throughput(Throughput::Elements(1));

  for &subscribers in &[1u64, 16, 256] {
    // Bounded so the mailboxes stay small over millions of iterations.
    let broker = Broker::with_options(BrokerOptions::default().with_mailbox_depth(64));
    let dispatcher = broker.dispatcher();
    for id in 0..subscribers {
      dispatcher.subscribe("bench", SubscriberId::new(id)).unwrap();
    }
    group.bench_with_input(BenchmarkId::new("in_memory", subscribers), &subscribers, |b, _| {
      b.iter(|| dispatcher.publish("bench", PUBLISHER, black_box(PAYLOAD)).unwrap());
    });
  }
  group.finish();
}

fn bench_ipc_roundtrip(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let path = std::env::temp_dir().join(format!("rpubsub_bench_{}.sock", std::process::id()));
  let broker = Broker::with_options(BrokerOptions::default().with_mailbox_depth(64));
  let (mut server, mut subscriber, mut publisher) = rt.block_on(async {
    let server = IpcServer::bind_with_policy(&path, broker, IdentityPolicy::PerConnection).unwrap();
    let mut subscriber = Client::connect(&path).await.unwrap();
    let publisher = Client::connect(&path).await.unwrap();
    subscriber.subscribe("bench").await.unwrap();
    (server, subscriber, publisher)
  });

  let mut group = c.benchmark_group("ipc");
  group.throughput(Throughput::Elements(1));
  group.bench_function("publish_then_fetch", |b| {
    b.iter(|| {
      rt.block_on(async {
        publisher.publish("bench", PAYLOAD).await.unwrap();
        black_box(subscriber.fetch("bench").await.unwrap());
      })
    });
  });
  group.finish();

  rt.block_on(server.shutdown()).unwrap();
}

criterion_group!(benches, bench_in_memory_fanout, bench_ipc_roundtrip);
criterion_main!(benches);
