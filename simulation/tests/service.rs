//! Tests for the tokio simulation service

use std::time::Duration;

use star_core::{IdentityError, NodeId, StarError};
use star_simulation::{
    AdHocNode, GraphBuilder, ServiceConfig, ServiceError, ServiceHandle, SimConfig, Simulation,
    SimulationService,
};
use tokio_test::assert_ok;

fn fast() -> ServiceConfig {
    ServiceConfig {
        tick_interval: Duration::from_millis(1),
        ticks_per_interval: 50,
    }
}

fn spawn_ring(nodes: u32) -> (ServiceHandle, tokio::task::JoinHandle<Result<Simulation, StarError>>) {
    let graph = GraphBuilder::new(nodes).ring(2).unwrap();
    let sim = Simulation::new(graph, SimConfig::default(), &AdHocNode).unwrap();
    SimulationService::spawn(sim, fast())
}

async fn wait_converged(handle: &ServiceHandle) {
    for _ in 0..500 {
        if handle.report().await.unwrap().converged {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("network did not converge");
}

#[tokio::test]
async fn test_queries_after_convergence() {
    let (handle, task) = spawn_ring(5);
    wait_converged(&handle).await;

    let table = assert_ok!(handle.routing_table(NodeId(0)).await);
    assert!(table.starts_with("Routing table of node 0"));
    assert_eq!(table.lines().count(), 6);

    let view = assert_ok!(handle.topology_view(NodeId(1), NodeId(3)).await);
    assert!(view.contains("known by node 1"));

    let tree = assert_ok!(handle.source_tree(NodeId(2), NodeId(4)).await);
    assert!(tree.starts_with("Source tree of 4 in node 2"));

    assert_ok!(handle.build_tree(NodeId(3)).await);
    assert!(handle.routing_tables().await.unwrap().contains("node 4"));

    handle.shutdown().await.unwrap();
    let sim = task.await.unwrap().unwrap();
    assert!(sim.is_converged());
}

#[tokio::test]
async fn test_send_through_service() {
    let (handle, task) = spawn_ring(4);
    wait_converged(&handle).await;

    assert_ok!(handle.send_message(NodeId(0), NodeId(2), "over the ring").await);
    let mut inbox = Vec::new();
    for _ in 0..500 {
        inbox = handle.inbox(NodeId(2)).await.unwrap();
        if !inbox.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].body_text(), "over the ring");

    drop(handle);
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_unknown_node_is_reported() {
    let (handle, _task) = spawn_ring(3);
    let err = handle.routing_table(NodeId(42)).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Star(StarError::Identity(IdentityError::NoSuchNode(NodeId(42))))
    ));
}

#[tokio::test]
async fn test_terminate_keeps_answering() {
    let (handle, task) = spawn_ring(4);
    handle.terminate().await.unwrap();

    let report = handle.report().await.unwrap();
    assert!(report.terminated);
    assert_eq!(report.pending, 0);
    assert!(handle.send_message(NodeId(0), NodeId(1), "late").await.is_err());
    assert!(handle.routing_table(NodeId(0)).await.is_ok());

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
    assert!(matches!(
        handle.report().await,
        Err(ServiceError::Closed)
    ));
}
