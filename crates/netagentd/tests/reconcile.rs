//! End-to-end reconciliation tests: controller-shaped goal states through
//! encode, decode, dispatch, and the UDP shell, against the mock transit
//! daemon.

use netagent_goalstate::{
    decode, encode, AllowAddressPair, EntityKind, ExtraDhcpOption, FixedIp, GoalState,
    OperationType, PortConfiguration, PortState, SecurityGroupId, SubnetConfiguration,
    SubnetState, TransitRouterIp, TransitSwitchIp, VpcConfiguration, VpcState,
};
use netagentd::rpc::{MockTransitClient, TransitCommand};
use netagentd::{AggregateStatus, ApplyStatus, GoalStateServer, ReconcileError, Reconciler};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The controller's canonical three-entity message: one VPC to create, the
/// subnet context shipped read-only, and one port endpoint to program.
fn controller_goal_state() -> GoalState {
    GoalState {
        vpc_states: vec![VpcState {
            operation_type: OperationType::Create as i32,
            configuration: Some(VpcConfiguration {
                id: "1".to_string(),
                version: 1,
                project_id: "dbf72700-5106-4a7a-918f-a016853911f8".to_string(),
                name: "SuperVpc".to_string(),
                cidr: "192.168.0.0/24".to_string(),
                tunnel_id: 11111,
                transit_router_ips: vec![TransitRouterIp {
                    vpc_id: "1".to_string(),
                    ip_address: "172.0.0.11".to_string(),
                }],
                ..Default::default()
            }),
        }],
        subnet_states: vec![SubnetState {
            operation_type: OperationType::Info as i32,
            configuration: Some(SubnetConfiguration {
                id: "2".to_string(),
                version: 1,
                project_id: "dbf72700-5106-4a7a-918f-111111111111".to_string(),
                vpc_id: "1".to_string(),
                name: "SuperSubnet".to_string(),
                cidr: "10.0.0.1/16".to_string(),
                tunnel_id: 22222,
                transit_switch_ips: vec![TransitSwitchIp {
                    ip_address: "172.0.0.1".to_string(),
                }],
            }),
        }],
        port_states: vec![PortState {
            operation_type: OperationType::Create as i32,
            configuration: Some(PortConfiguration {
                id: "dd12d1dadad2g4h".to_string(),
                version: 1,
                project_id: "dbf72700-5106-4a7a-918f-111111111111".to_string(),
                network_id: "2".to_string(),
                name: "Peer1".to_string(),
                admin_state_up: true,
                mac_address: "fa:16:3e:d7:f2:6c".to_string(),
                veth_name: "veth0".to_string(),
                host_ip: "172.0.0.2".to_string(),
                fixed_ips: vec![FixedIp {
                    ip_address: "10.0.0.2".to_string(),
                    subnet_id: "2".to_string(),
                }],
                security_group_ids: vec![SecurityGroupId {
                    id: "1".to_string(),
                }],
                allow_address_pairs: vec![AllowAddressPair {
                    ip_address: "10.0.0.5".to_string(),
                    mac_address: "fa:16:3e:d7:f2:9f".to_string(),
                }],
                extra_dhcp_options: vec![ExtraDhcpOption {
                    name: "opt_1".to_string(),
                    value: "12".to_string(),
                }],
            }),
        }],
    }
}

fn port_create(id: &str, subnet_id: &str, ip: &str) -> PortState {
    PortState {
        operation_type: OperationType::Create as i32,
        configuration: Some(PortConfiguration {
            id: id.to_string(),
            version: 1,
            admin_state_up: true,
            fixed_ips: vec![FixedIp {
                ip_address: ip.to_string(),
                subnet_id: subnet_id.to_string(),
            }],
            ..Default::default()
        }),
    }
}

#[tokio::test]
async fn test_controller_scenario_end_to_end() {
    let original = controller_goal_state();

    // The wire representation must reproduce the tree field for field.
    let decoded = decode(&encode(&original)).unwrap();
    assert_eq!(decoded, original);

    let mock = Arc::new(MockTransitClient::new());
    let mut reconciler = Reconciler::new(mock.clone());
    let result = reconciler.apply(&decoded).await;

    assert_eq!(result.status, AggregateStatus::Success);
    assert_eq!(result.outcomes.len(), 3);

    // Dispatch order walks the dependency chain down.
    assert_eq!(result.outcomes[0].kind, EntityKind::Vpc);
    assert_eq!(result.outcomes[0].id, "1");
    assert_eq!(result.outcomes[0].result, Ok(ApplyStatus::Programmed { commands: 1 }));
    assert_eq!(result.outcomes[1].kind, EntityKind::Subnet);
    assert_eq!(result.outcomes[1].id, "2");
    assert_eq!(result.outcomes[1].result, Ok(ApplyStatus::Fetched));
    assert_eq!(result.outcomes[2].kind, EntityKind::Port);
    assert_eq!(result.outcomes[2].id, "dd12d1dadad2g4h");
    assert_eq!(result.outcomes[2].result, Ok(ApplyStatus::Programmed { commands: 1 }));

    assert_eq!(
        mock.sent_names(),
        vec![
            "query_version",  // vpc 1 gate
            "update_vpc",     // vpc 1 programming
            "query_version",  // subnet 2 read-only info
            "query_version",  // port gate
            "update_endpoint" // port endpoint programming
        ]
    );

    // The endpoint command carries the subnet's overlay context.
    match &mock.sent()[4] {
        TransitCommand::UpdateEndpoint {
            port_id,
            version,
            tunnel_id,
            ip,
            mac,
            veth,
            host_ip,
            admin_state_up,
        } => {
            assert_eq!(port_id, "dd12d1dadad2g4h");
            assert_eq!(*version, 1);
            assert_eq!(tunnel_id.map(|t| t.as_u32()), Some(22222));
            assert_eq!(ip.to_string(), "10.0.0.2");
            assert_eq!(mac.map(|m| m.to_string()), Some("fa:16:3e:d7:f2:6c".to_string()));
            assert_eq!(veth.as_deref(), Some("veth0"));
            assert_eq!(host_ip.map(|h| h.to_string()), Some("172.0.0.2".to_string()));
            assert!(*admin_state_up);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[tokio::test]
async fn test_reapplying_same_goal_state_is_idempotent() {
    let gs = controller_goal_state();
    let mock = Arc::new(MockTransitClient::new());
    let mut reconciler = Reconciler::new(mock.clone());

    let first = reconciler.apply(&gs).await;
    let mutations_after_first = mock.mutation_count();
    let second = reconciler.apply(&gs).await;

    assert_eq!(first.status, AggregateStatus::Success);
    assert_eq!(second.status, AggregateStatus::Success);
    assert_eq!(second.outcomes[0].result, Ok(ApplyStatus::Unchanged));
    assert_eq!(second.outcomes[2].result, Ok(ApplyStatus::Unchanged));
    // The second pass issued version queries only, no reprogramming.
    assert_eq!(mock.mutation_count(), mutations_after_first);
}

#[tokio::test]
async fn test_stale_port_update_is_rejected_without_commands() {
    let mock = Arc::new(MockTransitClient::new());
    mock.set_version(EntityKind::Port, "p1", 7);
    let mut reconciler = Reconciler::new(mock.clone());

    let mut state = port_create("p1", "s1", "10.0.0.2");
    state.operation_type = OperationType::Update as i32;
    if let Some(cfg) = &mut state.configuration {
        cfg.version = 7; // not an advance
    }
    let gs = GoalState {
        subnet_states: vec![SubnetState {
            operation_type: OperationType::Info as i32,
            configuration: Some(SubnetConfiguration {
                id: "s1".to_string(),
                version: 1,
                cidr: "10.0.0.0/16".to_string(),
                ..Default::default()
            }),
        }],
        port_states: vec![state],
        ..Default::default()
    };

    let result = reconciler.apply(&gs).await;

    assert_eq!(result.status, AggregateStatus::PartialFailure);
    assert_eq!(
        result.outcomes[1].result,
        Err(ReconcileError::stale_version(7, 7))
    );
    assert_eq!(mock.mutation_count(), 0);
}

#[tokio::test]
async fn test_partial_failure_reports_every_port() {
    let mock = Arc::new(MockTransitClient::new());
    let mut reconciler = Reconciler::new(mock.clone());

    let gs = GoalState {
        subnet_states: vec![SubnetState {
            operation_type: OperationType::Create as i32,
            configuration: Some(SubnetConfiguration {
                id: "s1".to_string(),
                version: 1,
                cidr: "10.0.0.0/16".to_string(),
                tunnel_id: 22222,
                ..Default::default()
            }),
        }],
        port_states: vec![
            port_create("p1", "s1", "10.0.0.2"),
            port_create("p2", "nowhere", "10.0.0.3"),
            port_create("p3", "s1", "10.0.0.4"),
        ],
        ..Default::default()
    };

    let result = reconciler.apply(&gs).await;

    assert_eq!(result.status, AggregateStatus::PartialFailure);
    let port_outcomes: Vec<_> = result
        .outcomes
        .iter()
        .filter(|o| o.kind == EntityKind::Port)
        .collect();
    assert_eq!(port_outcomes.len(), 3);
    assert!(port_outcomes[0].is_success());
    assert!(matches!(
        port_outcomes[1].result,
        Err(ReconcileError::Validation { .. })
    ));
    assert!(port_outcomes[2].is_success());
    // Both healthy ports reached the dataplane despite the middle failure.
    assert_eq!(mock.version_of(EntityKind::Port, "p1"), Some(1));
    assert_eq!(mock.version_of(EntityKind::Port, "p3"), Some(1));
}

#[tokio::test]
async fn test_deleting_never_seen_port_succeeds() {
    let mock = Arc::new(MockTransitClient::new());
    let mut reconciler = Reconciler::new(mock.clone());

    let mut state = port_create("ghost", "s1", "10.0.0.2");
    state.operation_type = OperationType::Delete as i32;
    let gs = GoalState {
        port_states: vec![state],
        ..Default::default()
    };

    let result = reconciler.apply(&gs).await;

    assert_eq!(result.status, AggregateStatus::Success);
    assert_eq!(result.outcomes[0].result, Ok(ApplyStatus::Unchanged));
    assert_eq!(mock.sent_names(), vec!["delete_endpoint"]);
}

#[tokio::test]
async fn test_udp_shell_applies_goal_state_and_answers_summary() {
    let mock = Arc::new(MockTransitClient::new());
    let cancel = CancellationToken::new();
    let server = GoalStateServer::bind_with_rpc(
        "127.0.0.1:0".parse().unwrap(),
        mock.clone(),
        cancel.clone(),
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let server_task = tokio::spawn(async move {
        let mut server = server;
        server.run().await.unwrap();
    });

    let client = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(&encode(&controller_goal_state()), addr)
        .await
        .unwrap();
    let mut buf = vec![0u8; 64 * 1024];
    let (len, _) = client.recv_from(&mut buf).await.unwrap();
    let summary: serde_json::Value = serde_json::from_slice(&buf[..len]).unwrap();

    assert_eq!(summary["status"], "success");
    assert_eq!(summary["entities"].as_array().unwrap().len(), 3);
    assert_eq!(summary["entities"][0]["kind"], "vpc");
    assert_eq!(summary["entities"][1]["kind"], "subnet");
    assert_eq!(summary["entities"][1]["status"], "fetched");
    assert_eq!(summary["entities"][2]["id"], "dd12d1dadad2g4h");

    cancel.cancel();
    server_task.await.unwrap();
}
