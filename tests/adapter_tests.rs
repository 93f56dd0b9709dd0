use chrono::Utc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use waypoint_follower::adapters::outbound::{FileEventJournal, FileWaypointSource};
use waypoint_follower::common::{DomainEvent, EventEnvelope, EventJournal, EventMetadata};
use waypoint_follower::domains::waypoint_following::{
    Pose, SequenceState, WaypointFollowingEvent, WaypointSource, WaypointSpec,
};

#[test]
fn loads_a_toml_route_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("route.toml");
    std::fs::write(
        &path,
        r#"
        [[waypoints]]
        x = 1.0
        y = 0.5

        [[waypoints]]
        x = 2.0
        y = -1.0
        yaw = 3.141592653589793
        tolerance = 0.2
        "#,
    )
    .unwrap();

    let source = FileWaypointSource::new(&path);
    let route = source.load_waypoints().unwrap();
    assert_eq!(route.len(), 2);
    assert_eq!(route[0].pose, Pose::from_point(1.0, 0.5, 0.0));
    assert_eq!(route[1].tolerance, Some(0.2));
    assert!(source.describe().contains("route.toml"));
}

#[test]
fn saved_route_loads_back_in_order() {
    let dir = TempDir::new().unwrap();
    let route = vec![
        WaypointSpec::new(Pose::from_xy_yaw(1.0, 2.0, 0.5)),
        WaypointSpec::with_tolerance(Pose::from_point(3.0, 4.0, 0.0), 0.25),
    ];

    for name in ["saved.json", "saved.toml"] {
        let path = dir.path().join(name);
        assert_ok!(FileWaypointSource::save(&path, &route));
        let loaded = FileWaypointSource::new(&path).load_waypoints().unwrap();

        assert_eq!(loaded.len(), 2);
        assert!((loaded[0].pose.orientation.yaw() - 0.5).abs() < 1e-9);
        assert_eq!(loaded[1].pose.position.x, 3.0);
        assert_eq!(loaded[1].tolerance, Some(0.25));
    }
}

#[test]
fn missing_route_file_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    let source = FileWaypointSource::new(dir.path().join("absent.json"));
    let err = assert_err!(source.load_waypoints());
    assert!(err.to_string().contains("Configuration error"));
}

fn state_change(from: SequenceState, to: SequenceState) -> EventEnvelope {
    let event = WaypointFollowingEvent::StateChanged {
        controller_id: "follower-1".to_string(),
        from,
        to,
        timestamp: Utc::now(),
    };
    EventEnvelope::new(&event, "WaypointFollower", EventMetadata::from_source("test")).unwrap()
}

#[tokio::test]
async fn journal_appends_and_loads_json_lines() {
    let dir = TempDir::new().unwrap();
    let journal = FileEventJournal::new(dir.path().join("journal").join("events.jsonl"));

    assert!(journal.load().await.unwrap().is_empty());

    journal
        .append(vec![state_change(SequenceState::Idle, SequenceState::Dispatching)])
        .await
        .unwrap();
    journal
        .append(vec![
            state_change(SequenceState::Dispatching, SequenceState::Awaiting),
            state_change(SequenceState::Awaiting, SequenceState::Finished),
        ])
        .await
        .unwrap();

    let events = journal.load().await.unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.event_type == "StateChanged"));
    assert!(events.iter().all(|e| e.aggregate_id == "follower-1"));

    let last: WaypointFollowingEvent = serde_json::from_value(events[2].event_data.clone()).unwrap();
    assert_eq!(last.event_type(), "StateChanged");
    match last {
        WaypointFollowingEvent::StateChanged { to, .. } => assert_eq!(to, SequenceState::Finished),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn corrupt_journal_line_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.jsonl");
    tokio::fs::write(&path, "{not json}\n").await.unwrap();

    let err = FileEventJournal::new(&path).load().await.unwrap_err();
    assert!(err.contains("line 1"));
}
