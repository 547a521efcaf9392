//! End-to-end tests driving the Engine facade with `FakeKv` standing in for
//! etcd: each test corresponds to one of the announce/discover scenarios the
//! engine is expected to support.

extern crate env_logger;
extern crate uuid;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use uuid::Uuid;

use pubsub_discovery::endpoint::{self, Endpoint};
use pubsub_discovery::kv::fake::FakeKv;
use pubsub_discovery::{Config, DiscoveredEndpointListener, Engine};

fn init_logging() {
    let _ = env_logger::init();
}

fn config(framework_uuid: &str, ttl: u64) -> Config {
    let mut props = HashMap::new();
    props.insert("framework.uuid".to_owned(), framework_uuid.to_owned());
    props.insert("discovery.etcd.ttl".to_owned(), ttl.to_string());
    Config::from_properties(&props).unwrap()
}

fn sample_endpoint(uuid: &str, framework_uuid: &str) -> Endpoint {
    let mut e = Endpoint::new();
    e.insert(endpoint::UUID.to_owned(), uuid.to_owned());
    e.insert(endpoint::FRAMEWORK_UUID.to_owned(), framework_uuid.to_owned());
    e.insert(endpoint::ADMIN_TYPE.to_owned(), "tcp".to_owned());
    e.insert(endpoint::SERIALIZER_TYPE.to_owned(), "json".to_owned());
    e.insert(endpoint::TOPIC_SCOPE.to_owned(), "s".to_owned());
    e.insert(endpoint::TOPIC_NAME.to_owned(), "t".to_owned());
    e.insert(endpoint::ENDPOINT_TYPE.to_owned(), "publisher".to_owned());
    e.insert("tcp.url".to_owned(), "tcp://1.2.3.4:5555".to_owned());
    e
}

#[derive(Default)]
struct RecordingListener {
    added: Mutex<Vec<Endpoint>>,
    removed: Mutex<Vec<Endpoint>>,
}

impl DiscoveredEndpointListener for RecordingListener {
    fn add_discovered(&self, endpoint: &Endpoint) {
        self.added.lock().unwrap().push(endpoint.clone());
    }
    fn remove_discovered(&self, endpoint: &Endpoint) {
        self.removed.lock().unwrap().push(endpoint.clone());
    }
}

/// Poll `predicate` until it's true or `timeout` elapses, sleeping briefly
/// between checks. `FakeKv`'s watch is condvar-driven rather than polled, but
/// the assertions here need to wait for a background thread to react to it.
fn wait_for<F: Fn() -> bool>(timeout: Duration, predicate: F) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    predicate()
}

#[test]
fn single_publisher_single_subscriber() {
    init_logging();
    let uuid = Uuid::new_v4().to_simple_string();
    let kv = Arc::new(FakeKv::new());

    let mut publisher = Engine::create(config("P", 10), kv.clone());
    publisher.start();
    publisher.announce_endpoint(sample_endpoint(&uuid, "P")).unwrap();

    let mut subscriber = Engine::create(config("S", 10), kv.clone());
    let listener = Arc::new(RecordingListener::default());
    subscriber.attach_listener(1, listener.clone());
    subscriber.start();

    assert!(wait_for(Duration::from_secs(2), || !listener.added.lock().unwrap().is_empty()));
    assert_eq!(listener.added.lock().unwrap()[0][endpoint::UUID], uuid);

    publisher.remove_endpoint(&sample_endpoint(&uuid, "P")).unwrap();
    assert!(wait_for(Duration::from_secs(2), || !listener.removed.lock().unwrap().is_empty()));

    publisher.stop();
    subscriber.stop();
}

#[test]
fn ttl_expiry_retracts_the_endpoint() {
    init_logging();
    let kv = Arc::new(FakeKv::new());
    kv.remote_set("/pubsub/tcp/s/t/u1", &pubsub_discovery::codec::encode(&sample_endpoint("u1", "P")));

    let mut subscriber = Engine::create(config("S", 10), kv.clone());
    let listener = Arc::new(RecordingListener::default());
    subscriber.attach_listener(1, listener.clone());
    subscriber.start();

    assert!(wait_for(Duration::from_secs(2), || !listener.added.lock().unwrap().is_empty()));

    kv.remote_expire("/pubsub/tcp/s/t/u1");
    assert!(wait_for(Duration::from_secs(2), || !listener.removed.lock().unwrap().is_empty()));

    subscriber.stop();
}

#[test]
fn reconnect_purges_then_restores() {
    init_logging();
    let kv = Arc::new(FakeKv::new());
    kv.remote_set("/pubsub/tcp/s/t/u1", &pubsub_discovery::codec::encode(&sample_endpoint("u1", "P")));
    kv.remote_set("/pubsub/tcp/s/t/u2", &pubsub_discovery::codec::encode(&sample_endpoint("u2", "P")));

    let mut subscriber = Engine::create(config("S", 10), kv.clone());
    let listener = Arc::new(RecordingListener::default());
    subscriber.attach_listener(1, listener.clone());
    subscriber.start();

    assert!(wait_for(Duration::from_secs(2), || listener.added.lock().unwrap().len() == 2));

    kv.disconnect();
    assert!(wait_for(Duration::from_secs(2), || listener.removed.lock().unwrap().len() == 2));

    kv.reconnect();
    assert!(wait_for(Duration::from_secs(2), || listener.added.lock().unwrap().len() == 4));

    subscriber.stop();
}

#[test]
fn self_suppression() {
    init_logging();
    let kv = Arc::new(FakeKv::new());

    let mut engine = Engine::create(config("F", 10), kv.clone());
    let listener = Arc::new(RecordingListener::default());
    engine.attach_listener(1, listener.clone());
    engine.start();

    engine.announce_endpoint(sample_endpoint("u3", "F")).unwrap();

    // Give the watch loop a couple of cycles to observe its own write.
    thread::sleep(Duration::from_millis(300));
    assert!(listener.added.lock().unwrap().is_empty());

    engine.stop();
}

#[test]
fn refresh_does_not_wake_a_watcher() {
    init_logging();
    let kv = Arc::new(FakeKv::new());

    let mut publisher = Engine::create(config("P", 2), kv.clone());
    publisher.announce_endpoint(sample_endpoint("u1", "P")).unwrap();
    publisher.start();

    let mut subscriber = Engine::create(config("S", 2), kv.clone());
    let listener = Arc::new(RecordingListener::default());
    subscriber.attach_listener(1, listener.clone());
    subscriber.start();

    assert!(wait_for(Duration::from_secs(2), || !listener.added.lock().unwrap().is_empty()));

    // Several refresh intervals pass; the watcher must not see any further
    // add/remove beyond the original one, since a refresh never bumps the
    // store's revision.
    thread::sleep(Duration::from_secs(3));
    assert_eq!(listener.added.lock().unwrap().len(), 1);
    assert!(listener.removed.lock().unwrap().is_empty());

    publisher.stop();
    subscriber.stop();
}

#[test]
fn late_listener_gets_a_catch_up_replay() {
    init_logging();
    let kv = Arc::new(FakeKv::new());
    kv.remote_set("/pubsub/tcp/s/t/u1", &pubsub_discovery::codec::encode(&sample_endpoint("u1", "P")));

    let mut subscriber = Engine::create(config("S", 10), kv.clone());
    subscriber.start();

    // Let the watch loop's initial directory read ingest `u1` before the
    // listener attaches, so the replay path (rather than live fan-out) is
    // what's under test.
    thread::sleep(Duration::from_millis(200));

    let listener = Arc::new(RecordingListener::default());
    subscriber.attach_listener(2, listener.clone());
    assert_eq!(listener.added.lock().unwrap().len(), 1);

    subscriber.stop();
}
