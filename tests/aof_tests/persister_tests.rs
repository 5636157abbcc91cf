//! Tests for the scheduled persister

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ringkv::aof::{Persister, MIN_PERSIST_INTERVAL};

use super::{open_aof, replay_all, set_batch, setup_temp_config, SMALL_SHIFT};

fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_persister_writes_on_schedule() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = Arc::new(open_aof(&config));
    let mut persister =
        Persister::start(Arc::clone(&aof), Duration::ZERO, Duration::from_millis(10)).unwrap();

    aof.append(set_batch("k", "v"));
    assert!(wait_for(|| aof.queue().is_empty(), Duration::from_secs(5)));
    assert!(aof.put_index() > 0);

    persister.shutdown(Duration::from_secs(5)).unwrap();
}

#[test]
fn test_zero_interval_is_clamped() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = Arc::new(open_aof(&config));
    let mut persister = Persister::start(Arc::clone(&aof), Duration::ZERO, Duration::ZERO).unwrap();
    assert_eq!(persister.interval(), MIN_PERSIST_INTERVAL);

    aof.append(set_batch("k", "v"));
    assert!(wait_for(|| aof.queue().is_empty(), Duration::from_secs(5)));
    persister.shutdown(Duration::from_secs(5)).unwrap();
}

#[test]
fn test_shutdown_drains_before_first_cycle() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = Arc::new(open_aof(&config));
    let mut persister =
        Persister::start(Arc::clone(&aof), Duration::from_secs(3600), Duration::from_secs(1))
            .unwrap();

    for i in 0..5 {
        aof.append(set_batch(&format!("k{}", i), "v"));
    }
    assert_eq!(aof.put_index(), 0);

    persister.shutdown(Duration::from_secs(5)).unwrap();
    assert!(aof.queue().is_empty());

    let reopened = open_aof(&config);
    let (seen, _) = replay_all(&reopened);
    assert_eq!(seen.len(), 5);
}

#[test]
fn test_shutdown_twice_is_harmless() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = Arc::new(open_aof(&config));
    let mut persister =
        Persister::start(Arc::clone(&aof), Duration::ZERO, Duration::from_millis(10)).unwrap();

    persister.shutdown(Duration::from_secs(5)).unwrap();
    persister.shutdown(Duration::from_secs(5)).unwrap();
}

#[test]
fn test_drop_stops_and_drains() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    {
        let aof = Arc::new(open_aof(&config));
        let _persister =
            Persister::start(Arc::clone(&aof), Duration::from_secs(3600), Duration::from_secs(1))
                .unwrap();
        aof.append(set_batch("dropped", "but-saved"));
    }

    let aof = open_aof(&config);
    let (seen, _) = replay_all(&aof);
    assert_eq!(seen, vec![set_batch("dropped", "but-saved")]);
}
