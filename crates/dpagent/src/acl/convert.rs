//! Translation between [`Rule`]s and engine rule records.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use dpagent_engine::{IpRuleRecord, MacipRuleRecord};
use dpagent_types::{IpPrefix, MacAddress};
use log::warn;

use super::error::{AclError, Result};
use super::types::{AclAction, IcmpRange, IpRule, L4Match, MacIpRule, PortRange, Rule, RuleMatch};

const PROTO_ICMP: u8 = 1;
const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;
const PROTO_ICMPV6: u8 = 58;

fn invalid(acl_name: &str, reason: String) -> AclError {
    AclError::InvalidRule {
        name: acl_name.to_string(),
        reason,
    }
}

/// Encodes address/port rules. Rules of the other family are rejected.
pub fn encode_ip_rules(acl_name: &str, rules: &[Rule]) -> Result<Vec<IpRuleRecord>> {
    rules.iter().map(|rule| encode_ip_rule(acl_name, rule)).collect()
}

/// Encodes MAC+IP rules. Rules of the other family are rejected.
pub fn encode_macip_rules(acl_name: &str, rules: &[Rule]) -> Result<Vec<MacipRuleRecord>> {
    rules
        .iter()
        .map(|rule| encode_macip_rule(acl_name, rule))
        .collect()
}

fn encode_ip_rule(acl_name: &str, rule: &Rule) -> Result<IpRuleRecord> {
    let ip = rule
        .ip_rule()
        .ok_or_else(|| invalid(acl_name, "not an address/port rule".to_string()))?;

    let mut record = IpRuleRecord {
        is_permit: rule.action.to_engine(),
        ..Default::default()
    };

    let family = match (ip.source_network, ip.destination_network) {
        (Some(src), Some(dst)) if src.is_ipv6() != dst.is_ipv6() => {
            return Err(invalid(
                acl_name,
                format!(
                    "source {} and destination {} have different IP versions",
                    src, dst
                ),
            ));
        }
        (src, dst) => src.or(dst).map(|p| p.is_ipv6()),
    };
    record.is_ipv6 = family.unwrap_or(false);

    if let Some(src) = ip.source_network {
        record.src_ip_addr = src.octets();
        record.src_ip_prefix_len = src.prefix_len();
    }
    if let Some(dst) = ip.destination_network {
        record.dst_ip_addr = dst.octets();
        record.dst_ip_prefix_len = dst.prefix_len();
    }

    match ip.l4 {
        None => {}
        Some(L4Match::Tcp {
            source_port_range,
            destination_port_range,
            flags_mask,
            flags_value,
        }) => {
            record.proto = PROTO_TCP;
            set_ports(&mut record, source_port_range, destination_port_range);
            record.tcp_flags_mask = flags_mask;
            record.tcp_flags_value = flags_value;
        }
        Some(L4Match::Udp {
            source_port_range,
            destination_port_range,
        }) => {
            record.proto = PROTO_UDP;
            set_ports(&mut record, source_port_range, destination_port_range);
        }
        Some(L4Match::Icmp {
            icmpv6,
            type_range,
            code_range,
        }) => {
            if family.is_some_and(|v6| v6 != icmpv6) {
                return Err(invalid(
                    acl_name,
                    format!(
                        "ICMP{} match on {} addresses",
                        if icmpv6 { "v6" } else { "v4" },
                        if icmpv6 { "IPv4" } else { "IPv6" }
                    ),
                ));
            }
            record.is_ipv6 = icmpv6;
            record.proto = if icmpv6 { PROTO_ICMPV6 } else { PROTO_ICMP };
            record.srcport_or_icmptype_first = u16::from(type_range.first);
            record.srcport_or_icmptype_last = u16::from(type_range.last);
            record.dstport_or_icmpcode_first = u16::from(code_range.first);
            record.dstport_or_icmpcode_last = u16::from(code_range.last);
        }
    }

    Ok(record)
}

fn set_ports(record: &mut IpRuleRecord, source: PortRange, destination: PortRange) {
    record.srcport_or_icmptype_first = source.lower_port;
    record.srcport_or_icmptype_last = source.upper_port;
    record.dstport_or_icmpcode_first = destination.lower_port;
    record.dstport_or_icmpcode_last = destination.upper_port;
}

fn encode_macip_rule(acl_name: &str, rule: &Rule) -> Result<MacipRuleRecord> {
    let macip = rule
        .macip_rule()
        .ok_or_else(|| invalid(acl_name, "not a MAC+IP rule".to_string()))?;

    let prefix = IpPrefix::new(macip.source_address, macip.source_address_prefix)
        .map_err(|e| invalid(acl_name, e.to_string()))?;

    Ok(MacipRuleRecord {
        is_permit: rule.action.to_engine(),
        is_ipv6: prefix.is_ipv6(),
        src_mac: macip.source_mac_address.octets(),
        src_mac_mask: macip.source_mac_address_mask.octets(),
        src_ip_addr: prefix.octets(),
        src_ip_prefix_len: prefix.prefix_len(),
    })
}

/// Decodes an address/port rule reported by the engine.
///
/// Unspecified zero-length networks decode as absent unless the address
/// family would otherwise be lost. Returns `None` for records that do not
/// form a valid rule.
pub fn decode_ip_rule(record: &IpRuleRecord) -> Option<Rule> {
    let action = AclAction::from_engine(record.is_permit)?;
    let network = |octets: [u8; 16], prefix_len: u8| -> Option<Option<IpPrefix>> {
        let prefix = IpPrefix::from_octets(record.is_ipv6, octets, prefix_len).ok()?;
        if prefix_len == 0 && prefix.address().is_unspecified() {
            Some(None)
        } else {
            Some(Some(prefix))
        }
    };
    let mut source_network = network(record.src_ip_addr, record.src_ip_prefix_len)?;
    let destination_network = network(record.dst_ip_addr, record.dst_ip_prefix_len)?;
    // keep the address family when neither network nor ICMPv6 carries it
    let implied_v6 = record.proto == PROTO_ICMPV6;
    if source_network.is_none() && destination_network.is_none() && record.is_ipv6 != implied_v6 {
        source_network = Some(IpPrefix::any(record.is_ipv6));
    }

    let source_port_range = PortRange::new(
        record.srcport_or_icmptype_first,
        record.srcport_or_icmptype_last,
    );
    let destination_port_range = PortRange::new(
        record.dstport_or_icmpcode_first,
        record.dstport_or_icmpcode_last,
    );
    let l4 = match record.proto {
        0 => None,
        PROTO_TCP => Some(L4Match::Tcp {
            source_port_range,
            destination_port_range,
            flags_mask: record.tcp_flags_mask,
            flags_value: record.tcp_flags_value,
        }),
        PROTO_UDP => Some(L4Match::Udp {
            source_port_range,
            destination_port_range,
        }),
        PROTO_ICMP | PROTO_ICMPV6 => Some(L4Match::Icmp {
            icmpv6: record.proto == PROTO_ICMPV6,
            type_range: IcmpRange::new(
                icmp_value(record.srcport_or_icmptype_first),
                icmp_value(record.srcport_or_icmptype_last),
            ),
            code_range: IcmpRange::new(
                icmp_value(record.dstport_or_icmpcode_first),
                icmp_value(record.dstport_or_icmpcode_last),
            ),
        }),
        other => {
            warn!("AclConfigurator: IP protocol {} has no L4 match, ignoring it", other);
            None
        }
    };

    Some(Rule::new(
        action,
        RuleMatch::Ip(IpRule {
            source_network,
            destination_network,
            l4,
        }),
    ))
}

fn icmp_value(raw: u16) -> u8 {
    u8::try_from(raw).unwrap_or(u8::MAX)
}

/// Decodes a MAC+IP rule reported by the engine.
pub fn decode_macip_rule(record: &MacipRuleRecord) -> Option<Rule> {
    let action = AclAction::from_engine(record.is_permit)?;
    let octets = record.src_ip_addr;
    let source_address = if record.is_ipv6 {
        IpAddr::V6(Ipv6Addr::from(octets))
    } else {
        IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
    };

    Some(Rule::new(
        action,
        RuleMatch::MacIp(MacIpRule {
            source_address,
            source_address_prefix: record.src_ip_prefix_len,
            source_mac_address: MacAddress::new(record.src_mac),
            source_mac_address_mask: MacAddress::new(record.src_mac_mask),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_encode_tcp_rule() {
        let rule = Rule::permit_ip(IpRule {
            source_network: Some(prefix("192.168.1.1/32")),
            destination_network: Some(prefix("10.20.0.0/24")),
            l4: Some(L4Match::Tcp {
                source_port_range: PortRange::new(150, 1000),
                destination_port_range: PortRange::port(80),
                flags_mask: 0xff,
                flags_value: 9,
            }),
        });
        let records = encode_ip_rules("acl1", &[rule]).unwrap();
        let r = &records[0];
        assert_eq!(r.is_permit, 1);
        assert!(!r.is_ipv6);
        assert_eq!(&r.src_ip_addr[..4], &[192, 168, 1, 1]);
        assert_eq!(r.src_ip_prefix_len, 32);
        assert_eq!(&r.dst_ip_addr[..4], &[10, 20, 0, 0]);
        assert_eq!(r.dst_ip_prefix_len, 24);
        assert_eq!(r.proto, PROTO_TCP);
        assert_eq!((r.srcport_or_icmptype_first, r.srcport_or_icmptype_last), (150, 1000));
        assert_eq!((r.dstport_or_icmpcode_first, r.dstport_or_icmpcode_last), (80, 80));
        assert_eq!((r.tcp_flags_mask, r.tcp_flags_value), (0xff, 9));
    }

    #[test]
    fn test_mixed_address_families_rejected() {
        let rule = Rule::deny_ip(IpRule {
            source_network: Some(prefix("10.0.0.0/8")),
            destination_network: Some(prefix("2001:db8::/32")),
            l4: None,
        });
        let err = encode_ip_rules("acl1", &[rule]).unwrap_err();
        assert!(matches!(err, AclError::InvalidRule { ref name, .. } if name == "acl1"));
    }

    #[test]
    fn test_icmp_family_mismatch_rejected() {
        let rule = Rule::permit_ip(IpRule {
            source_network: Some(prefix("10.0.0.0/8")),
            destination_network: None,
            l4: Some(L4Match::Icmp {
                icmpv6: true,
                type_range: IcmpRange::ANY,
                code_range: IcmpRange::ANY,
            }),
        });
        assert!(encode_ip_rules("acl1", &[rule]).is_err());
    }

    #[test]
    fn test_icmpv6_without_addresses_round_trips() {
        let rule = Rule::new(
            AclAction::Reflect,
            RuleMatch::Ip(IpRule {
                source_network: None,
                destination_network: None,
                l4: Some(L4Match::Icmp {
                    icmpv6: true,
                    type_range: IcmpRange::new(128, 129),
                    code_range: IcmpRange::ANY,
                }),
            }),
        );
        let records = encode_ip_rules("acl1", std::slice::from_ref(&rule)).unwrap();
        assert!(records[0].is_ipv6);
        assert_eq!(records[0].proto, PROTO_ICMPV6);
        assert_eq!(decode_ip_rule(&records[0]), Some(rule));
    }

    #[test]
    fn test_udp_rule_round_trips() {
        let rule = Rule::permit_ip(IpRule {
            source_network: Some(prefix("2001:db8::/64")),
            destination_network: None,
            l4: Some(L4Match::Udp {
                source_port_range: PortRange::ANY,
                destination_port_range: PortRange::port(53),
            }),
        });
        let records = encode_ip_rules("acl1", std::slice::from_ref(&rule)).unwrap();
        assert_eq!(decode_ip_rule(&records[0]), Some(rule));
    }

    #[test]
    fn test_encode_macip_rule() {
        let rule = Rule::permit_macip(MacIpRule {
            source_address: "192.168.0.1".parse().unwrap(),
            source_address_prefix: 16,
            source_mac_address: "11:44:0A:B8:4A:35".parse().unwrap(),
            source_mac_address_mask: "ff:ff:ff:ff:00:00".parse().unwrap(),
        });
        let records = encode_macip_rules("acl2", std::slice::from_ref(&rule)).unwrap();
        let r = &records[0];
        assert!(!r.is_ipv6);
        assert_eq!(r.src_mac, [0x11, 0x44, 0x0a, 0xb8, 0x4a, 0x35]);
        assert_eq!(r.src_mac_mask, [0xff, 0xff, 0xff, 0xff, 0, 0]);
        assert_eq!(&r.src_ip_addr[..4], &[192, 168, 0, 1]);
        assert_eq!(r.src_ip_prefix_len, 16);

        assert_eq!(decode_macip_rule(r), Some(rule));
    }

    #[test]
    fn test_macip_prefix_too_long() {
        let rule = Rule::permit_macip(MacIpRule {
            source_address: "192.168.0.1".parse().unwrap(),
            source_address_prefix: 40,
            source_mac_address: MacAddress::ZERO,
            source_mac_address_mask: MacAddress::ZERO,
        });
        assert!(encode_macip_rules("acl2", &[rule]).is_err());
    }

    #[test]
    fn test_wrong_family_rejected() {
        let rule = Rule::permit_ip(IpRule::default());
        assert!(encode_macip_rules("acl2", &[rule]).is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_action() {
        let record = IpRuleRecord {
            is_permit: 7,
            ..Default::default()
        };
        assert_eq!(decode_ip_rule(&record), None);
    }
}
