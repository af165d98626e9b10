//! End-to-end scenarios against a live memcached server. Ignored by
//! default; run with `cargo test -- --ignored` against a local instance
//! on `127.0.0.1:11211`.

use memcache_meta::client::blocking::BlockingClient;
use memcache_meta::{ClientOptions, Endpoint, GetOptions};
use std::thread::sleep;
use std::time::Duration;

fn setup_client() -> BlockingClient {
    BlockingClient::new(vec![Endpoint::new("127.0.0.1", 11211)], ClientOptions::default())
}

#[ignore = "Relies on a running memcached server"]
#[test]
fn round_trip_set_and_get() {
    let client = setup_client();
    client.set("meta-client-it-round-trip", &b"bar".to_vec(), Some(10)).unwrap();
    let result = client
        .get::<Vec<u8>>("meta-client-it-round-trip", GetOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(result.value.unwrap(), b"bar".to_vec());
}

#[ignore = "Relies on a running memcached server"]
#[test]
fn expiry_evicts_after_delay() {
    let client = setup_client();
    client.set("meta-client-it-expiry", &b"bar".to_vec(), Some(1)).unwrap();
    sleep(Duration::from_millis(1500));
    let result = client.get::<Vec<u8>>("meta-client-it-expiry", GetOptions::default()).unwrap();
    assert!(result.is_none());
}

#[ignore = "Relies on a running memcached server"]
#[test]
fn delete_is_idempotent_false_on_second_call() {
    let client = setup_client();
    client.set("meta-client-it-delete", &b"bar".to_vec(), None).unwrap();
    assert!(client.delete("meta-client-it-delete", None).unwrap());
    assert!(!client.delete("meta-client-it-delete", None).unwrap());
}

#[ignore = "Relies on a running memcached server"]
#[test]
fn add_and_replace_duality() {
    let client = setup_client();
    let key = "meta-client-it-add-replace";
    client.delete(key, None).unwrap();
    assert!(client.add(key, &b"first".to_vec(), None).unwrap());
    assert!(!client.add(key, &b"second".to_vec(), None).unwrap());
    assert!(client.replace(key, &b"third".to_vec(), None).unwrap());

    let missing_key = "meta-client-it-add-replace-missing";
    client.delete(missing_key, None).unwrap();
    assert!(!client.replace(missing_key, &b"x".to_vec(), None).unwrap());
}

#[ignore = "Relies on a running memcached server"]
#[test]
fn cas_mismatch_leaves_value_unchanged() {
    let client = setup_client();
    let key = "meta-client-it-cas";
    client.set(key, &b"v1".to_vec(), None).unwrap();
    let opts = GetOptions {
        return_cas: true,
        ..Default::default()
    };
    let original = client.get::<Vec<u8>>(key, opts).unwrap().unwrap();
    let token = original.cas_token.unwrap();

    client.set(key, &b"v2".to_vec(), None).unwrap();
    let ok = client.cas(key, &b"v3".to_vec(), token, None).unwrap();
    assert!(!ok);

    let current = client.get::<Vec<u8>>(key, GetOptions::default()).unwrap().unwrap();
    assert_eq!(current.value.unwrap(), b"v2".to_vec());
}

#[ignore = "Relies on a running memcached server"]
#[test]
fn arithmetic_incr_then_decr() {
    let client = setup_client();
    let key = "meta-client-it-arithmetic";
    client.set(key, &b"10".to_vec(), None).unwrap();
    assert_eq!(client.incr(key, 3, None, None, None).unwrap(), 13);
    assert_eq!(client.decr(key, 5, None, None, None).unwrap(), 8);
}

#[ignore = "Relies on a running memcached server"]
#[test]
fn flush_all_clears_every_endpoint() {
    let client = setup_client();
    client.set("meta-client-it-flush", &b"bar".to_vec(), None).unwrap();
    client.flush_all(0).unwrap();
    let result = client.get::<Vec<u8>>("meta-client-it-flush", GetOptions::default()).unwrap();
    assert!(result.is_none());
}
