//! Integration tests for the ACL configurator against the simulated engine.
//!
//! These tests drive whole configure/modify/resync/lifecycle flows and
//! check the engine calls they produce.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dpagent::acl::{AccessList, AclConfigurator, IpRule, L4Match, MacIpRule, PortRange, Rule};
use dpagent::config::AgentConfig;
use dpagent::watch_interfaces;
use dpagent_engine::sim::SimEngine;
use dpagent_engine::{AclEngine, AclHandle, Channel, EngineResult, Reply, Request};
use dpagent_idxmap::{AttachRole, InterfaceLifecycleHandler, PendingAttachment, Registry};
use dpagent_types::MacAddress;
use pretty_assertions::assert_eq;

/// An attach or detach call seen on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    is_add: bool,
    sw_if_index: u32,
    acl_index: u32,
    macip: bool,
}

/// Forwards to a [`SimEngine`] and records interface binding calls.
struct RecordingChannel {
    sim: Arc<SimEngine>,
    bindings: Mutex<Vec<Binding>>,
}

impl RecordingChannel {
    fn new(sim: Arc<SimEngine>) -> Self {
        Self {
            sim,
            bindings: Mutex::new(Vec::new()),
        }
    }

    fn bindings(&self) -> Vec<Binding> {
        self.bindings.lock().unwrap().clone()
    }

    fn attaches(&self) -> Vec<Binding> {
        self.bindings().into_iter().filter(|b| b.is_add).collect()
    }

    fn detaches(&self) -> Vec<Binding> {
        self.bindings().into_iter().filter(|b| !b.is_add).collect()
    }

    fn reset(&self) {
        self.bindings.lock().unwrap().clear();
    }

    fn record(&self, request: &Request) {
        let binding = match request {
            Request::AclInterfaceAddDel {
                is_add,
                sw_if_index,
                acl_index,
                ..
            } => Binding {
                is_add: *is_add,
                sw_if_index: *sw_if_index,
                acl_index: *acl_index,
                macip: false,
            },
            Request::MacipAclInterfaceAddDel {
                is_add,
                sw_if_index,
                acl_index,
            } => Binding {
                is_add: *is_add,
                sw_if_index: *sw_if_index,
                acl_index: *acl_index,
                macip: true,
            },
            _ => return,
        };
        self.bindings.lock().unwrap().push(binding);
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    async fn send_request(&self, request: Request) -> EngineResult<Reply> {
        self.record(&request);
        self.sim.send_request(request).await
    }

    async fn send_multi_request(&self, request: Request) -> EngineResult<Vec<Reply>> {
        self.record(&request);
        self.sim.send_multi_request(request).await
    }
}

struct TestAgent {
    sim: Arc<SimEngine>,
    channel: Arc<RecordingChannel>,
    interfaces: Arc<Registry<()>>,
    acls: Arc<AclConfigurator>,
}

fn setup() -> TestAgent {
    setup_with(AgentConfig::default())
}

fn setup_with(config: AgentConfig) -> TestAgent {
    let _ = env_logger::builder().is_test(true).try_init();

    let sim = Arc::new(SimEngine::new());
    let channel = Arc::new(RecordingChannel::new(sim.clone()));
    let interfaces = Arc::new(Registry::<()>::new("sw_if_indexes"));
    let acls = Arc::new(config.acl_configurator(AclEngine::new(channel.clone()), interfaces.clone()));
    TestAgent {
        sim,
        channel,
        interfaces,
        acls,
    }
}

fn web_acl(name: &str) -> AccessList {
    AccessList::new(name).with_rule(Rule::permit_ip(IpRule {
        source_network: Some("192.168.1.0/24".parse().unwrap()),
        destination_network: Some("10.0.0.1/32".parse().unwrap()),
        l4: Some(L4Match::Tcp {
            source_port_range: PortRange::ANY,
            destination_port_range: PortRange::port(443),
            flags_mask: 0,
            flags_value: 0,
        }),
    }))
}

fn macip_rule() -> Rule {
    Rule::permit_macip(MacIpRule {
        source_address: "192.168.1.10".parse().unwrap(),
        source_address_prefix: 32,
        source_mac_address: "02:00:00:00:00:0a".parse().unwrap(),
        source_mac_address_mask: MacAddress::FULL_MASK,
    })
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_attachment_waits_for_interface() {
    let agent = setup();

    agent
        .acls
        .configure(&web_acl("acl1").with_ingress(&["if1"]))
        .await
        .unwrap();
    assert!(agent.channel.bindings().is_empty());

    let (handle, _) = agent.acls.get_l3l4_index().lookup_handle("acl1").unwrap();
    assert_eq!(
        agent.acls.pending_attachments(),
        vec![PendingAttachment::new("if1", handle.raw(), AttachRole::Ingress)]
    );

    agent.acls.resolve_created_interface("if1", 7).await.unwrap();
    assert_eq!(
        agent.channel.attaches(),
        vec![Binding {
            is_add: true,
            sw_if_index: 7,
            acl_index: handle.raw(),
            macip: false,
        }]
    );
    assert!(agent.acls.pending_attachments().is_empty());

    // nothing is pending any more
    agent.acls.resolve_created_interface("if1", 7).await.unwrap();
    assert_eq!(agent.channel.attaches().len(), 1);
}

#[tokio::test]
async fn test_modify_applies_interface_delta() {
    let agent = setup();
    for (name, idx) in [("A", 1), ("B", 2), ("C", 3)] {
        agent.interfaces.register_name(name, idx, None);
    }

    let old = web_acl("acl1").with_ingress(&["A", "B"]);
    agent.acls.configure(&old).await.unwrap();
    agent.channel.reset();

    let new = web_acl("acl1").with_ingress(&["B", "C"]);
    agent.acls.modify(&old, &new).await.unwrap();

    let detaches = agent.channel.detaches();
    let attaches = agent.channel.attaches();
    assert_eq!(detaches.len(), 1);
    assert_eq!(detaches[0].sw_if_index, 1);
    assert_eq!(attaches.len(), 1);
    assert_eq!(attaches[0].sw_if_index, 3);

    let (handle, acl) = agent.acls.get_l3l4_index().lookup_handle("acl1").unwrap();
    assert_eq!(acl, Some(new));
    assert_eq!(agent.sim.ip_acl(handle).unwrap().ingress, vec![2, 3]);
}

#[tokio::test]
async fn test_mixed_rules_use_l3l4_only() {
    let agent = setup();
    let mut acl = web_acl("acl1");
    acl.rules.push(macip_rule());

    agent.acls.configure(&acl).await.unwrap();

    assert!(agent.acls.get_l2_index().is_empty());
    let (handle, _) = agent.acls.get_l3l4_index().lookup_handle("acl1").unwrap();
    assert_eq!(agent.sim.ip_acl(handle).unwrap().rules.len(), 1);
    assert_eq!(agent.sim.macip_acl_count(), 0);
}

#[tokio::test]
async fn test_handle_zero_is_usable() {
    let agent = setup();
    agent.acls.configure(&web_acl("acl1")).await.unwrap();

    let (raw, _) = agent.acls.get_l3l4_index().lookup_idx("acl1").unwrap();
    assert_eq!(raw, 1);
    let (handle, _) = agent.acls.get_l3l4_index().lookup_handle("acl1").unwrap();
    assert_eq!(handle, AclHandle::new(0));

    agent.acls.delete(&web_acl("acl1")).await.unwrap();
    assert_eq!(agent.sim.ip_acl_count(), 0);
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let agent = setup();
    agent.interfaces.register_name("if1", 1, None);
    agent.acls.configure(&web_acl("leftover")).await.unwrap();

    let desired = vec![
        web_acl("acl1").with_ingress(&["if1"]).with_egress(&["if2"]),
        AccessList::new("acl2").with_rule(macip_rule()).with_ingress(&["if1"]),
    ];
    agent.acls.resync(&desired).await.unwrap();
    let ip_first = agent.acls.dump_ip_acls().await.unwrap();
    let macip_first = agent.acls.dump_macip_acls().await.unwrap();
    let pending_first = agent.acls.pending_attachments();

    agent.acls.resync(&desired).await.unwrap();
    assert_eq!(agent.acls.dump_ip_acls().await.unwrap(), ip_first);
    assert_eq!(agent.acls.dump_macip_acls().await.unwrap(), macip_first);
    assert_eq!(agent.acls.pending_attachments(), pending_first);

    assert_eq!(ip_first.len(), 1);
    assert_eq!(ip_first[0].acl.name, "acl1");
    assert_eq!(ip_first[0].acl.ingress, vec!["if1".to_string()]);
    assert_eq!(macip_first[0].acl.ingress, vec!["if1".to_string()]);
    assert_eq!(pending_first.len(), 1);
}

#[tokio::test]
async fn test_deleted_interface_is_recached() {
    let agent = setup();
    agent.interfaces.register_name("if1", 5, None);
    agent
        .acls
        .configure(&web_acl("acl1").with_ingress(&["if1"]))
        .await
        .unwrap();
    assert!(agent.acls.pending_attachments().is_empty());

    agent.interfaces.unregister_name("if1");
    agent.sim.remove_interface(5);
    agent.acls.resolve_deleted_interface("if1", 5).await.unwrap();
    assert_eq!(agent.acls.pending_attachments().len(), 1);

    // the interface comes back under a new index
    agent.interfaces.register_name("if1", 9, None);
    agent.acls.resolve_created_interface("if1", 9).await.unwrap();

    let (handle, _) = agent.acls.get_l3l4_index().lookup_handle("acl1").unwrap();
    assert_eq!(agent.sim.ip_acl(handle).unwrap().ingress, vec![9]);
    assert!(agent.acls.pending_attachments().is_empty());
}

#[tokio::test]
async fn test_without_dedup_duplicates_are_kept() {
    let config = AgentConfig {
        dedup_pending_attachments: false,
        ..Default::default()
    };
    let agent = setup_with(config);
    agent
        .acls
        .configure(&web_acl("acl1").with_ingress(&["if1"]))
        .await
        .unwrap();

    agent.acls.resolve_deleted_interface("if1", 0).await.unwrap();
    assert_eq!(agent.acls.pending_attachments().len(), 2);
}

#[tokio::test]
async fn test_registry_feed_drives_configurator() {
    let agent = setup();
    let handler: Arc<dyn InterfaceLifecycleHandler> = agent.acls.clone();
    let task = watch_interfaces(&AgentConfig::default(), &agent.interfaces, "acl", vec![handler]).unwrap();

    agent
        .acls
        .configure(&web_acl("acl1").with_egress(&["if1"]))
        .await
        .unwrap();
    assert_eq!(agent.acls.pending_attachments().len(), 1);

    agent.interfaces.register_name("if1", 4, None);
    let acls = agent.acls.clone();
    wait_until(|| acls.pending_attachments().is_empty()).await;

    let (handle, _) = agent.acls.get_l3l4_index().lookup_handle("acl1").unwrap();
    assert_eq!(agent.sim.ip_acl(handle).unwrap().egress, vec![4]);

    agent.interfaces.unregister_name("if1");
    wait_until(|| acls.pending_attachments().len() == 1).await;

    agent.interfaces.unwatch("acl").unwrap();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
}
