//! In-memory engine for tests.
//!
//! [`SimEngine`] answers ACL plugin requests from a local table, the way
//! the real plugin would: handles are the lowest free index per family,
//! deleting an ACL drops its bindings, and unknown handles report
//! `NoSuchEntry`. Every request is recorded so tests can assert on the
//! exact call sequence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::acl::{AclRecord, MacipAclRecord};
use crate::channel::{Channel, Reply, Request};
use crate::error::{EngineError, EngineResult, EngineStatus};
use crate::types::{AclHandle, SwIfIndex};

#[derive(Debug, Default)]
struct State {
    ip_acls: BTreeMap<u32, AclRecord>,
    macip_acls: BTreeMap<u32, MacipAclRecord>,
    requests: Vec<Request>,
    failures: HashMap<&'static str, i32>,
    disconnected: bool,
}

/// A simulated engine reachable through [`Channel`].
#[derive(Debug, Default)]
pub struct SimEngine {
    state: Mutex<State>,
}

impl SimEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every request named `request` (see [`Request::name`]) fail
    /// with `retval` until [`SimEngine::clear_failures`] is called.
    pub fn fail_requests(&self, request: &'static str, retval: i32) {
        self.lock().failures.insert(request, retval);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failures.clear();
        state.disconnected = false;
    }

    /// Makes every request fail with a transport error.
    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    /// Returns every request received so far, including failed ones.
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    /// Returns the address/port ACL stored under `handle`.
    pub fn ip_acl(&self, handle: AclHandle) -> Option<AclRecord> {
        self.lock().ip_acls.get(&handle.raw()).cloned()
    }

    /// Returns the MAC+IP ACL stored under `handle`.
    pub fn macip_acl(&self, handle: AclHandle) -> Option<MacipAclRecord> {
        self.lock().macip_acls.get(&handle.raw()).cloned()
    }

    pub fn ip_acl_count(&self) -> usize {
        self.lock().ip_acls.len()
    }

    pub fn macip_acl_count(&self) -> usize {
        self.lock().macip_acls.len()
    }

    /// Simulates an interface disappearing: all its bindings are dropped.
    pub fn remove_interface(&self, sw_if_index: SwIfIndex) {
        let mut state = self.lock();
        for acl in state.ip_acls.values_mut() {
            acl.ingress.retain(|i| *i != sw_if_index);
            acl.egress.retain(|i| *i != sw_if_index);
        }
        for acl in state.macip_acls.values_mut() {
            acl.interfaces.retain(|i| *i != sw_if_index);
        }
    }

    fn admit(&self, request: &Request) -> EngineResult<()> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        if state.disconnected {
            return Err(EngineError::transport("engine disconnected"));
        }
        match state.failures.get(request.name()) {
            Some(retval) => Err(EngineError::from_retval(*retval)),
            None => Ok(()),
        }
    }

    fn handle(&self, request: Request) -> Vec<Reply> {
        let mut state = self.lock();
        match request {
            Request::AclAddReplace {
                acl_index,
                tag,
                rules,
            } => {
                if acl_index == AclHandle::NEW {
                    let index = lowest_free(state.ip_acls.keys());
                    state.ip_acls.insert(
                        index,
                        AclRecord {
                            acl_index: index,
                            tag,
                            rules,
                            ..Default::default()
                        },
                    );
                    vec![index_reply(index)]
                } else {
                    match state.ip_acls.get_mut(&acl_index) {
                        Some(acl) => {
                            acl.tag = tag;
                            acl.rules = rules;
                            vec![index_reply(acl_index)]
                        }
                        None => vec![Reply::AclIndex {
                            retval: EngineStatus::NoSuchEntry.retval(),
                            acl_index,
                        }],
                    }
                }
            }
            Request::AclDel { acl_index } => {
                vec![status_reply(state.ip_acls.remove(&acl_index).is_some())]
            }
            Request::MacipAclAdd { tag, rules } => {
                let index = lowest_free(state.macip_acls.keys());
                state.macip_acls.insert(
                    index,
                    MacipAclRecord {
                        acl_index: index,
                        tag,
                        rules,
                        interfaces: Vec::new(),
                    },
                );
                vec![index_reply(index)]
            }
            Request::MacipAclAddReplace {
                acl_index,
                tag,
                rules,
            } => match state.macip_acls.get_mut(&acl_index) {
                Some(acl) => {
                    acl.tag = tag;
                    acl.rules = rules;
                    vec![index_reply(acl_index)]
                }
                None => vec![Reply::AclIndex {
                    retval: EngineStatus::NoSuchEntry.retval(),
                    acl_index,
                }],
            },
            Request::MacipAclDel { acl_index } => {
                vec![status_reply(state.macip_acls.remove(&acl_index).is_some())]
            }
            Request::AclInterfaceAddDel {
                is_add,
                is_input,
                sw_if_index,
                acl_index,
            } => {
                let Some(acl) = state.ip_acls.get_mut(&acl_index) else {
                    return vec![status_reply(false)];
                };
                let bound = if is_input {
                    &mut acl.ingress
                } else {
                    &mut acl.egress
                };
                bind(bound, sw_if_index, is_add);
                vec![status_reply(true)]
            }
            Request::MacipAclInterfaceAddDel {
                is_add,
                sw_if_index,
                acl_index,
            } => {
                let Some(acl) = state.macip_acls.get_mut(&acl_index) else {
                    return vec![status_reply(false)];
                };
                bind(&mut acl.interfaces, sw_if_index, is_add);
                vec![status_reply(true)]
            }
            Request::AclDump => state
                .ip_acls
                .values()
                .cloned()
                .map(Reply::AclDetails)
                .collect(),
            Request::MacipAclDump => state
                .macip_acls
                .values()
                .cloned()
                .map(Reply::MacipAclDetails)
                .collect(),
        }
    }
}

fn lowest_free<'a>(used: impl Iterator<Item = &'a u32>) -> u32 {
    let mut next = 0;
    for index in used {
        if *index != next {
            break;
        }
        next += 1;
    }
    next
}

fn bind(bound: &mut Vec<SwIfIndex>, sw_if_index: SwIfIndex, is_add: bool) {
    if is_add {
        if !bound.contains(&sw_if_index) {
            bound.push(sw_if_index);
        }
    } else {
        bound.retain(|i| *i != sw_if_index);
    }
}

fn index_reply(acl_index: u32) -> Reply {
    Reply::AclIndex {
        retval: 0,
        acl_index,
    }
}

fn status_reply(found: bool) -> Reply {
    let retval = if found {
        0
    } else {
        EngineStatus::NoSuchEntry.retval()
    };
    Reply::Status { retval }
}

#[async_trait]
impl Channel for SimEngine {
    async fn send_request(&self, request: Request) -> EngineResult<Reply> {
        self.admit(&request)?;
        let name = request.name();
        self.handle(request)
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::UnexpectedReply {
                expected: "single reply",
                received: format!("empty stream for {}", name),
            })
    }

    async fn send_multi_request(&self, request: Request) -> EngineResult<Vec<Reply>> {
        self.admit(&request)?;
        Ok(self.handle(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{AclEngine, IpRuleRecord, MacipRuleRecord};
    use crate::types::Direction;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn engine() -> (Arc<SimEngine>, AclEngine) {
        let sim = Arc::new(SimEngine::new());
        let engine = AclEngine::new(sim.clone());
        (sim, engine)
    }

    #[tokio::test]
    async fn test_handles_fill_lowest_gap() {
        let (_sim, engine) = engine();
        let a = engine.add_ip_acl("a", Vec::new()).await.unwrap();
        let b = engine.add_ip_acl("b", Vec::new()).await.unwrap();
        let c = engine.add_ip_acl("c", Vec::new()).await.unwrap();
        assert_eq!((a.raw(), b.raw(), c.raw()), (0, 1, 2));

        engine.delete_ip_acl(b).await.unwrap();
        let d = engine.add_ip_acl("d", Vec::new()).await.unwrap();
        assert_eq!(d, b);
    }

    #[tokio::test]
    async fn test_families_use_separate_handles() {
        let (sim, engine) = engine();
        let ip = engine.add_ip_acl("ip", Vec::new()).await.unwrap();
        let macip = engine
            .add_macip_acl("macip", vec![MacipRuleRecord::default()])
            .await
            .unwrap();
        assert_eq!(ip.raw(), 0);
        assert_eq!(macip.raw(), 0);
        assert_eq!(sim.ip_acl_count(), 1);
        assert_eq!(sim.macip_acl_count(), 1);
    }

    #[tokio::test]
    async fn test_bindings_follow_attach_detach_and_delete() {
        let (sim, engine) = engine();
        let h = engine
            .add_ip_acl("acl1", vec![IpRuleRecord::default()])
            .await
            .unwrap();
        engine.attach_ip_acl(h, 1, Direction::Ingress).await.unwrap();
        engine.attach_ip_acl(h, 2, Direction::Egress).await.unwrap();
        engine.attach_ip_acl(h, 1, Direction::Ingress).await.unwrap();

        let dumped = engine.dump_ip_acls().await.unwrap();
        assert_eq!(dumped.len(), 1);
        assert_eq!(dumped[0].ingress, vec![1]);
        assert_eq!(dumped[0].egress, vec![2]);

        // detaching something not attached is accepted
        engine.detach_ip_acl(h, 7, Direction::Ingress).await.unwrap();
        sim.remove_interface(2);
        assert!(sim.ip_acl(h).unwrap().egress.is_empty());

        engine.delete_ip_acl(h).await.unwrap();
        assert!(engine.dump_ip_acls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let (_sim, engine) = engine();
        let err = engine.delete_macip_acl(AclHandle::new(3)).await.unwrap_err();
        assert_eq!(err.status(), Some(EngineStatus::NoSuchEntry));

        let err = engine
            .modify_ip_acl(AclHandle::new(0), "x", Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(EngineStatus::NoSuchEntry));
    }

    #[tokio::test]
    async fn test_failure_injection_and_recording() {
        let (sim, engine) = engine();
        sim.fail_requests("acl_dump", -1);
        assert!(engine.dump_ip_acls().await.is_err());

        sim.clear_failures();
        sim.disconnect();
        let err = engine.dump_macip_acls().await.unwrap_err();
        assert!(matches!(err, EngineError::Transport { .. }));

        assert_eq!(sim.requests(), vec![Request::AclDump, Request::MacipAclDump]);
        sim.clear_requests();
        assert!(sim.requests().is_empty());
    }
}
