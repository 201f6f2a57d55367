//! Rule family validation.

use log::warn;

use super::types::{Rule, RuleMatch};

/// The engine rule family an access list is configured as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleFamily {
    /// Address/port rules, attachable ingress and egress
    L3L4,
    /// MAC+IP rules, attachable ingress only
    L2,
}

impl std::fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleFamily::L3L4 => f.write_str("L3/L4"),
            RuleFamily::L2 => f.write_str("L2"),
        }
    }
}

/// Rules of a single family, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRules {
    pub family: RuleFamily,
    pub rules: Vec<Rule>,
}

/// Drops rules without a match and splits the rest by family.
///
/// A list mixing both families keeps only its address/port rules. The
/// result may be empty if no rule had a match.
pub fn validate_rules(acl_name: &str, rules: &[Rule]) -> ValidatedRules {
    let mut l3l4 = Vec::new();
    let mut l2 = Vec::new();

    for (index, rule) in rules.iter().enumerate() {
        match &rule.rule_match {
            None => warn!(
                "AclConfigurator: invalid ACL {}: rule {} does not contain match",
                acl_name, index
            ),
            Some(RuleMatch::Ip(_)) => l3l4.push(rule.clone()),
            Some(RuleMatch::MacIp(_)) => l2.push(rule.clone()),
        }
    }

    if !l3l4.is_empty() && !l2.is_empty() {
        warn!(
            "AclConfigurator: ACL {} mixes L2 and L3/L4 rules, only the {} L3/L4 rules are used",
            acl_name,
            l3l4.len()
        );
    }

    if !l3l4.is_empty() {
        ValidatedRules {
            family: RuleFamily::L3L4,
            rules: l3l4,
        }
    } else {
        ValidatedRules {
            family: RuleFamily::L2,
            rules: l2,
        }
    }
}
