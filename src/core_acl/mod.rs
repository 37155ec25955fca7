use std::net::IpAddr;

use crate::config::AclConfig;

/// Capability consulted by the listener before a connection is admitted.
pub trait IpAcl: Send + Sync {
    fn is_allowed(&self, ip: IpAddr) -> bool;
}

/// Prefix-matching allow/deny lists.
///
/// Deny entries are checked first. An empty allow list admits everyone not
/// denied; a non-empty one admits only matching peers, so an unconfigured
/// ACL lets everyone in.
pub struct ListAcl {
    allow: Vec<String>,
    deny: Vec<String>,
}

impl ListAcl {
    pub fn from_config(config: &AclConfig) -> Self {
        ListAcl {
            allow: config.allow.clone(),
            deny: config.deny.clone(),
        }
    }

    fn matches(prefixes: &[String], ip: &str) -> bool {
        prefixes.iter().any(|prefix| ip.starts_with(prefix.as_str()))
    }
}

impl IpAcl for ListAcl {
    fn is_allowed(&self, ip: IpAddr) -> bool {
        let text = ip.to_string();
        if Self::matches(&self.deny, &text) {
            return false;
        }
        self.allow.is_empty() || Self::matches(&self.allow, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acl(allow: &[&str], deny: &[&str]) -> ListAcl {
        ListAcl {
            allow: allow.iter().map(|s| s.to_string()).collect(),
            deny: deny.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn empty_lists_allow_everyone() {
        let acl = acl(&[], &[]);
        assert!(acl.is_allowed("10.1.2.3".parse().unwrap()));
        assert!(acl.is_allowed("::1".parse().unwrap()));
    }

    #[test]
    fn deny_wins_over_allow() {
        let acl = acl(&["10."], &["10.0.0."]);
        assert!(acl.is_allowed("10.1.2.3".parse().unwrap()));
        assert!(!acl.is_allowed("10.0.0.7".parse().unwrap()));
    }

    #[test]
    fn allow_list_restricts() {
        let acl = acl(&["192.168.1."], &[]);
        assert!(acl.is_allowed("192.168.1.50".parse().unwrap()));
        assert!(!acl.is_allowed("192.168.2.50".parse().unwrap()));
    }
}
