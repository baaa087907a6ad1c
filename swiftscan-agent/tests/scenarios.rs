//! End-to-end scenarios over synthesized Swift directory trees.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use swiftscan_agent::{Agent, Prospector, Publisher};
use swiftscan_core::{AgentConfig, Event, ResourceType, StateStore};

fn set_mtime(path: &Path, unix_secs: u64) {
    let file = std::fs::File::open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(unix_secs))
        .unwrap();
}

/// Serialize a two-replica, 64-partition ring over three devices; dev 0
/// is this node (`sdb` on loopback).
fn ring_bytes(tables: &[Vec<u16>]) -> Vec<u8> {
    let meta = serde_json::json!({
        "devs": [
            {"id": 0, "ip": "127.0.0.1", "port": 6000, "device": "sdb",
             "region": 1, "zone": 1, "weight": 100.0},
            {"id": 1, "ip": "10.255.0.2", "port": 6000, "device": "sdc",
             "region": 1, "zone": 2, "weight": 100.0},
            {"id": 2, "ip": "10.255.0.3", "port": 6000, "device": "sdd",
             "region": 1, "zone": 3, "weight": 100.0},
        ],
        "part_shift": 26,
        "replica_count": tables.len(),
        "byteorder": "little",
    });
    let json = serde_json::to_vec(&meta).unwrap();

    let mut raw = Vec::new();
    raw.extend_from_slice(b"R1NG");
    raw.extend_from_slice(&1u16.to_be_bytes());
    raw.extend_from_slice(&(json.len() as u32).to_be_bytes());
    raw.extend_from_slice(&json);
    for table in tables {
        for dev in table {
            raw.extend_from_slice(&dev.to_le_bytes());
        }
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();
    encoder.finish().unwrap()
}

struct Cluster {
    _tmp: tempfile::TempDir,
    device_root: PathBuf,
    config: AgentConfig,
}

fn cluster() -> Cluster {
    let tmp = tempfile::tempdir().unwrap();
    let ring_dir = tmp.path().join("etc");
    let device_dir = tmp.path().join("srv");
    let device_root = device_dir.join("sdb");
    std::fs::create_dir_all(&ring_dir).unwrap();
    std::fs::create_dir_all(device_root.join("objects")).unwrap();

    // Dev 0 is never a primary: everything on this node is a handoff.
    let tables = vec![vec![1u16; 64], vec![2u16; 64]];
    for resource_type in [
        ResourceType::Account,
        ResourceType::Container,
        ResourceType::Object,
    ] {
        let path = ring_dir.join(resource_type.ring_file_name());
        std::fs::write(&path, ring_bytes(&tables)).unwrap();
        set_mtime(&path, 1_699_000_000);
    }

    let swift_conf = ring_dir.join("swift.conf");
    std::fs::write(
        &swift_conf,
        "[swift-hash]\nswift_hash_path_prefix = t\nswift_hash_path_suffix = t\n",
    )
    .unwrap();

    let config = AgentConfig {
        device_dir,
        ring_dir,
        swift_conf,
        registry_file: tmp.path().join("registry.json"),
        scan_frequency: Duration::from_millis(300),
        idle_timeout: Duration::from_millis(100),
        ..AgentConfig::default()
    };

    Cluster {
        _tmp: tmp,
        device_root,
        config,
    }
}

fn object_file(cluster: &Cluster, part: &str, name: &str, size: usize, mtime: u64) {
    let dir = cluster
        .device_root
        .join("objects")
        .join(part)
        .join("abc")
        .join("a7c48bd56a8fe50ccb9a280bb9e552a1");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, vec![0u8; size]).unwrap();
    set_mtime(&path, mtime);
    set_mtime(&dir, mtime);
    set_mtime(&dir.parent().unwrap(), mtime);
    set_mtime(&dir.parent().unwrap().parent().unwrap(), mtime);
}

/// Run the prospector for `duration`, collecting everything that survives
/// the state filter.
async fn crawl_for(
    config: &AgentConfig,
    states: Arc<StateStore>,
    duration: Duration,
) -> Vec<Event> {
    let (spooler_tx, mut spooler_rx) = mpsc::channel(64);
    let token = CancellationToken::new();
    let prospector = Prospector::new(config, states, spooler_tx, token.clone()).unwrap();
    let run = tokio::spawn(prospector.run());

    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = spooler_rx.recv().await {
            events.push(event);
        }
        events
    });

    tokio::time::sleep(duration).await;
    token.cancel();
    run.await.unwrap();
    collector.await.unwrap()
}

fn partition_events(events: &[Event], part_id: i64) -> usize {
    events
        .iter()
        .filter(|e| match e {
            Event::ObjectPartition(info) => info.placement.partition == part_id,
            _ => false,
        })
        .count()
}

#[tokio::test]
async fn repeated_scans_of_an_unchanged_tree_emit_once() {
    let cluster = cluster();
    object_file(&cluster, "42", "1700000000.00000.data", 1_048_576, 1_700_000_000);

    let states = Arc::new(StateStore::new());
    // Roughly four ticks.
    let events = crawl_for(&cluster.config, states.clone(), Duration::from_millis(1100)).await;

    assert_eq!(partition_events(&events, 42), 1, "events: {events:?}");
    assert_eq!(states.count().await, 1);

    let Event::ObjectPartition(info) = &events[0] else {
        panic!("expected partition event");
    };
    assert!(info.placement.handoff);
    assert_eq!(info.num_datafiles, 1);
    assert_eq!(info.bytes_total_mb, 1);
}

#[tokio::test]
async fn ring_change_causes_re_emission() {
    let cluster = cluster();
    object_file(&cluster, "42", "1700000000.00000.data", 1_048_576, 1_700_000_000);

    let states = Arc::new(StateStore::new());

    let events = crawl_for(&cluster.config, states.clone(), Duration::from_millis(700)).await;
    assert_eq!(partition_events(&events, 42), 1);

    // New ring bytes, later mtime: the same partition must survive the
    // filter once more even though nothing on disk changed.
    let ring_path = cluster
        .config
        .ring_dir
        .join(ResourceType::Object.ring_file_name());
    let tables = vec![vec![2u16; 64], vec![1u16; 64]];
    std::fs::write(&ring_path, ring_bytes(&tables)).unwrap();
    set_mtime(&ring_path, 1_699_500_000);

    let events = crawl_for(&cluster.config, states, Duration::from_millis(700)).await;
    assert_eq!(partition_events(&events, 42), 1, "events: {events:?}");
}

#[tokio::test]
async fn partition_mtime_advance_causes_re_emission() {
    let cluster = cluster();
    object_file(&cluster, "42", "1700000000.00000.data", 1_048_576, 1_700_000_000);

    let states = Arc::new(StateStore::new());
    let events = crawl_for(&cluster.config, states.clone(), Duration::from_millis(700)).await;
    assert_eq!(partition_events(&events, 42), 1);

    // A second object lands in the partition.
    object_file(&cluster, "42", "1700000900.00000.data", 1_048_576, 1_700_000_900);

    let events = crawl_for(&cluster.config, states, Duration::from_millis(700)).await;
    assert_eq!(partition_events(&events, 42), 1, "events: {events:?}");
    let Event::ObjectPartition(info) = events
        .iter()
        .find(|e| matches!(e, Event::ObjectPartition(_)))
        .unwrap()
    else {
        unreachable!()
    };
    assert_eq!(info.num_datafiles, 2);
    assert_eq!(info.bytes_total_mb, 2);
}

#[tokio::test]
async fn rescan_older_stamps_a_ttl() {
    let mut cluster = cluster();
    cluster.config.rescan_older = Some(Duration::from_secs(3600));
    object_file(&cluster, "42", "1700000000.00000.data", 1_048_576, 1_700_000_000);

    let states = Arc::new(StateStore::new());
    let events = crawl_for(&cluster.config, states, Duration::from_millis(700)).await;

    let Event::ObjectPartition(info) = &events[0] else {
        panic!("expected partition event");
    };
    assert_eq!(info.ttl, Some(Duration::from_secs(3600)));
}

struct RecordingPublisher {
    events: Mutex<Vec<Event>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, batch: &[Event]) -> std::io::Result<()> {
        self.events.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }
}

#[tokio::test]
async fn agent_publishes_and_persists_state() {
    let cluster = cluster();
    object_file(&cluster, "42", "1700000000.00000.data", 1_048_576, 1_700_000_000);

    let publisher = Arc::new(RecordingPublisher {
        events: Mutex::new(Vec::new()),
    });
    let agent = Agent::new(cluster.config.clone())
        .unwrap()
        .with_publisher(publisher.clone());

    let shutdown = CancellationToken::new();
    let stopper = shutdown.clone();
    let run = tokio::spawn(agent.run(shutdown));
    tokio::time::sleep(Duration::from_millis(900)).await;
    stopper.cancel();
    run.await.unwrap().unwrap();

    let published = publisher.events.lock().unwrap();
    assert_eq!(
        published
            .iter()
            .filter(|e| matches!(e, Event::ObjectPartition(_)))
            .count(),
        1
    );

    // The registrar persisted the partition across the publish path.
    let registry = std::fs::read_to_string(&cluster.config.registry_file).unwrap();
    assert!(registry.contains("\"42\""), "registry: {registry}");
    assert!(registry.contains("\"sdb\""));
}
