// tests/broker_concurrency.rs

use rpubsub::{Broker, BrokerOptions, SubscriberId};
use std::thread;

const PUBLISHERS: u64 = 4;
const SUBSCRIBERS: u64 = 8;
const MESSAGES_PER_PUBLISHER: usize = 500;

#[test]
fn test_concurrent_publishers_reach_every_subscriber() {
  let broker = Broker::new();
  let dispatcher = broker.dispatcher();
  for id in 0..SUBSCRIBERS {
    dispatcher.subscribe("load", SubscriberId::new(id)).unwrap();
  }

  let handles: Vec<_> = (0..PUBLISHERS)
    .map(|p| {
      let dispatcher = dispatcher.clone();
      thread::spawn(move || {
        let publisher = SubscriberId::new(1_000 + p);
        for n in 0..MESSAGES_PER_PUBLISHER {
          let payload = format!("{}:{}", p, n);
          let delivery = dispatcher.publish("load", publisher, payload.as_bytes()).unwrap();
          assert_eq!(delivery.delivered, SUBSCRIBERS as usize);
        }
      })
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }

  for id in 0..SUBSCRIBERS {
    let subscriber = SubscriberId::new(id);
    // Messages from one publisher stay in publish order in every mailbox.
    let mut last_seen = vec![None::<usize>; PUBLISHERS as usize];
    let mut total = 0;
    while let Some(message) = dispatcher.fetch("load", subscriber).unwrap() {
      let text = std::str::from_utf8(message.data()).unwrap();
      let (p, n) = text.split_once(':').unwrap();
      let (p, n): (usize, usize) = (p.parse().unwrap(), n.parse().unwrap());
      assert!(last_seen[p].map_or(true, |prev| prev < n), "out of order for publisher {}", p);
      last_seen[p] = Some(n);
      total += 1;
    }
    assert_eq!(total, PUBLISHERS as usize * MESSAGES_PER_PUBLISHER);
  }
  assert_eq!(dispatcher.stats().publishers, PUBLISHERS as usize);
}

#[test]
fn test_bounded_mailboxes_never_exceed_depth_under_load() {
  let depth = 16;
  let broker = Broker::with_options(BrokerOptions::default().with_mailbox_depth(depth));
  let dispatcher = broker.dispatcher();
  let reader = SubscriberId::new(1);
  dispatcher.subscribe("hot", reader).unwrap();

  let writer = {
    let dispatcher = dispatcher.clone();
    thread::spawn(move || {
      for n in 0..2_000u32 {
        dispatcher.publish("hot", SubscriberId::new(2), &n.to_be_bytes()).unwrap();
      }
    })
  };
  let mut last = None;
  while !writer.is_finished() && last != Some(1_999) {
    if let Some(message) = dispatcher.fetch("hot", reader).unwrap() {
      let n = u32::from_be_bytes(message.data().try_into().unwrap());
      assert!(last.map_or(true, |prev| prev < n));
      last = Some(n);
    }
    let topic = dispatcher.registry().find("hot").unwrap();
    assert!(topic.queued_messages() <= depth);
  }
  writer.join().unwrap();

  // What remains is a run of the newest messages, oldest first. The reader
  // may already have taken the last one.
  let mut remaining = Vec::new();
  while let Some(message) = dispatcher.fetch("hot", reader).unwrap() {
    remaining.push(u32::from_be_bytes(message.data().try_into().unwrap()));
  }
  assert!(remaining.len() <= depth);
  assert!(remaining.windows(2).all(|w| w[0] + 1 == w[1]));
  if let (Some(prev), Some(first)) = (last, remaining.first()) {
    assert!(prev < *first);
  }
  assert_eq!(remaining.last().copied().or(last), Some(1_999));
}

#[test]
fn test_subscribe_and_unsubscribe_race_with_publish() {
  let broker = Broker::new();
  let dispatcher = broker.dispatcher();
  dispatcher.subscribe("churn", SubscriberId::new(0)).unwrap();

  let churner = {
    let dispatcher = dispatcher.clone();
    thread::spawn(move || {
      let id = SubscriberId::new(7);
      for _ in 0..500 {
        dispatcher.subscribe("churn", id).unwrap();
        dispatcher.unsubscribe("churn", id).unwrap();
      }
    })
  };
  for n in 0..500u32 {
    let delivery = dispatcher.publish("churn", SubscriberId::new(9), &n.to_le_bytes()).unwrap();
    assert!(delivery.delivered == 1 || delivery.delivered == 2);
  }
  churner.join().unwrap();

  let topic = dispatcher.registry().find("churn").unwrap();
  assert_eq!(topic.subscribers(), vec![SubscriberId::new(0)]);
  assert_eq!(topic.queued_messages(), 500);

  let released = broker.shutdown();
  assert_eq!(released.topics, 1);
  assert_eq!(released.messages, 500);
}
