//! Scenarios 2 and 3 from `spec.md` §8: a second `start-test` against an
//! already-running test, and any state-mutating action issued from a
//! non-leader unit.

mod support;

use chopsticks_coordinator::StartTestRequest;

fn request() -> StartTestRequest {
    StartTestRequest {
        users: "1".to_string(),
        spawn_rate: "0.5".to_string(),
        duration: "20s".to_string(),
        scenario_file: "scenario.py".to_string(),
        headless: true,
    }
}

#[tokio::test]
async fn second_start_test_fails_with_already_running_and_state_is_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let (_cluster, coordinators) = support::cluster(dir.path(), "/usr/bin/yes", 1);
    let leader = &coordinators[0];

    let first = leader.start_test(request()).await.unwrap();
    assert_eq!(first.status, "started");

    let err = leader.start_test(request()).await.unwrap_err();
    assert!(err.to_string().contains("already running"));

    let status = leader.test_status().await;
    assert_eq!(status.test_state, "running");
    assert_eq!(status.test_run_id, Some(first.test_run_id));

    leader.stop_test().await.unwrap();
}

#[tokio::test]
async fn actions_on_a_non_leader_report_the_leader_requirement() {
    let dir = tempfile::tempdir().unwrap();
    let (_cluster, coordinators) = support::cluster(dir.path(), "/usr/bin/yes", 2);
    let worker = &coordinators[1];

    let start_err = worker.start_test(request()).await.unwrap_err();
    assert!(start_err.to_string().contains("leader"));

    let stop_err = worker.stop_test().await.unwrap_err();
    assert!(stop_err.to_string().contains("leader"));

    let status = worker.test_status().await;
    assert!(!status.is_leader);
}
