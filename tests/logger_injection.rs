use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use waypoint_follower::adapters::outbound::{init_buffered_logger, init_noop_logger, MultiLogger};
use waypoint_follower::domains::logger::{DomainLogger, DynLogger};
use waypoint_follower::domains::waypoint_following::{
    ControllerSettings, GoalClient, GoalId, GoalRejected, GoalRequest, NavigationEventSink, Pose,
    SequenceController, SequenceState, WaypointSpec,
};

#[derive(Default)]
struct BridgeCapture {
    messages: Mutex<Vec<String>>,
}

impl BridgeCapture {
    fn contains(&self, needle: &str) -> bool {
        self.messages.lock().unwrap().iter().any(|m| m.contains(needle))
    }
}

impl DomainLogger for BridgeCapture {
    fn info(&self, msg: &str) {
        self.messages.lock().unwrap().push(format!("INFO:{}", msg));
    }
    fn warn(&self, msg: &str) {
        self.messages.lock().unwrap().push(format!("WARN:{}", msg));
    }
    fn error(&self, msg: &str) {
        self.messages.lock().unwrap().push(format!("ERR:{}", msg));
    }
    fn debug(&self, msg: &str) {
        self.messages.lock().unwrap().push(format!("DEBUG:{}", msg));
    }
}

/// Accepts every goal and succeeds it straight away.
struct InstantArrival;

#[async_trait]
impl GoalClient for InstantArrival {
    async fn submit(&self, _request: GoalRequest, events: NavigationEventSink) -> Result<(), GoalRejected> {
        tokio::spawn(async move { events.succeeded().await });
        Ok(())
    }

    async fn cancel(&self, _goal_id: GoalId) {}
}

#[tokio::test]
async fn test_buffered_and_noop_logger() {
    let capture = Arc::new(BridgeCapture::default());
    let buffered = init_buffered_logger(capture.clone(), 8);

    buffered.info("one");
    buffered.warn("two");
    buffered.error("three");
    buffered.debug("four");

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(capture.contains("INFO:one"));
    assert!(capture.contains("WARN:two"));
    assert!(capture.contains("ERR:three"));
    assert!(capture.contains("DEBUG:four"));
    assert_eq!(buffered.dropped(), 0);

    let noop = init_noop_logger();
    noop.info("ignored");
    noop.debug("ignored-debug");
}

#[tokio::test]
async fn buffered_logger_drops_when_full() {
    let capture = Arc::new(BridgeCapture::default());
    let buffered = init_buffered_logger(capture.clone(), 1);

    // The drain task cannot run until this test yields.
    for i in 0..10 {
        buffered.info(&format!("burst {}", i));
    }
    assert!(buffered.dropped() >= 9);
}

#[test]
fn multi_logger_fans_out() {
    let first = Arc::new(BridgeCapture::default());
    let second = Arc::new(BridgeCapture::default());
    let multi = MultiLogger::new(vec![first.clone() as DynLogger, second.clone() as DynLogger]);

    multi.warn("both");
    assert_eq!(multi.len(), 2);
    assert!(first.contains("WARN:both"));
    assert!(second.contains("WARN:both"));
}

#[tokio::test]
async fn controller_reports_progress_through_the_injected_logger() {
    let capture = Arc::new(BridgeCapture::default());
    let (controller, surface) = SequenceController::new(
        ControllerSettings::default(),
        Arc::new(InstantArrival),
        capture.clone(),
    );
    tokio::spawn(controller.run());

    surface
        .start(vec![
            WaypointSpec::new(Pose::from_point(1.0, 2.0, 0.0)),
            WaypointSpec::new(Pose::from_point(3.0, 4.0, 0.0)),
        ])
        .await
        .unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        surface.wait_for_state(SequenceState::Finished),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(capture.contains("INFO:Added new waypoint -> (1, 2) | # Waypoints: 1"));
    assert!(capture.contains("INFO:Added new waypoint -> (3, 4) | # Waypoints: 2"));
    assert!(capture.contains("INFO:Executing goal -> (1, 2)"));
    assert!(capture.contains("WARN:No more waypoints to follow."));

    surface.cancel().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), surface.wait_for_state(SequenceState::Idle))
        .await
        .unwrap()
        .unwrap();
    assert!(capture.contains("WARN:Issuing cancel command to navigation service"));
}
