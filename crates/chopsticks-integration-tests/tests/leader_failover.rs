//! Scenario 5 from `spec.md` §8: a leader change while a test is running
//! forces `test_state` to `failed` and stops the surviving workers until the
//! new leader re-publishes its address.

mod support;

use chopsticks_coordinator::workload_runner::{LeaderMode, Role, WorkloadRunner};
use chopsticks_coordinator::StartTestRequest;

#[tokio::test]
async fn leader_election_during_a_run_marks_the_test_failed() {
    let dir = tempfile::tempdir().unwrap();
    let (cluster, coordinators) = support::cluster(dir.path(), "/usr/bin/yes", 2);
    let leader = &coordinators[0];
    let new_leader = &coordinators[1];

    leader
        .start_test(StartTestRequest {
            users: "1".to_string(),
            spawn_rate: "0.5".to_string(),
            duration: "30s".to_string(),
            scenario_file: "scenario.py".to_string(),
            headless: true,
        })
        .await
        .unwrap();
    assert_eq!(leader.test_status().await.test_state, "running");

    let leader_unit = chopsticks_core::UnitId::new("chopsticks/1").unwrap();
    cluster.elect_leader(leader_unit);

    new_leader.handle_leader_elected().await.unwrap();

    assert_eq!(new_leader.test_status().await.test_state, "failed");
    assert!(new_leader.test_status().await.is_leader);

    let headless_name = WorkloadRunner::service_name(Role::Leader, Some(LeaderMode::Headless));
    leader.service_manager().stop(&headless_name).await.ok();
}
