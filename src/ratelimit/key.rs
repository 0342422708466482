//! Rate limit key derivation.

use std::net::IpAddr;

use super::policy::Policy;

/// A key that uniquely identifies a counter in the store.
///
/// The key is the policy namespace and the subject joined by `:`. Policy
/// namespaces never contain `:`, so two different subjects under the same
/// policy can never produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    /// Compose the key for a subject under a policy.
    pub fn new(policy: &Policy, subject: &str) -> Self {
        Self(format!("{}:{}", policy.namespace(), subject))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the throttled subject is derived from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Throttle by the caller's network address. Used before identity is
    /// established (registration, login).
    ByAddress,
    /// Throttle by the authenticated principal, so callers sharing an
    /// address do not share a budget.
    BySubject,
}

impl KeyStrategy {
    /// Subject string for a caller address.
    pub fn address_subject(addr: IpAddr) -> String {
        // Map v4-in-v6 back so dual-stack listeners share one key per client.
        match addr {
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => v4.to_string(),
                None => v6.to_string(),
            },
            IpAddr::V4(v4) => v4.to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStrategy::ByAddress => "by-address",
            KeyStrategy::BySubject => "by-subject",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy(namespace: &str) -> Policy {
        Policy::new(namespace, 3, Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn test_key_composition() {
        let key = RateLimitKey::new(&policy("ip"), "203.0.113.5");
        assert_eq!(key.as_str(), "ip:203.0.113.5");
        assert_eq!(key.to_string(), "ip:203.0.113.5");
    }

    #[test]
    fn test_key_is_deterministic() {
        let p = policy("user");
        assert_eq!(RateLimitKey::new(&p, "abc"), RateLimitKey::new(&p, "abc"));
    }

    #[test]
    fn test_distinct_subjects_and_namespaces_do_not_collide() {
        let ip = policy("ip");
        let user = policy("user");

        assert_ne!(RateLimitKey::new(&ip, "a"), RateLimitKey::new(&ip, "b"));
        assert_ne!(RateLimitKey::new(&ip, "a"), RateLimitKey::new(&user, "a"));
    }

    #[test]
    fn test_address_subject_unmaps_ipv4_in_ipv6() {
        let mapped: IpAddr = "::ffff:203.0.113.5".parse().unwrap();
        let plain: IpAddr = "203.0.113.5".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();

        assert_eq!(KeyStrategy::address_subject(mapped), "203.0.113.5");
        assert_eq!(KeyStrategy::address_subject(plain), "203.0.113.5");
        assert_eq!(KeyStrategy::address_subject(v6), "2001:db8::1");
    }
}
