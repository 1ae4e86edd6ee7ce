use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::NameError;

// ════════════════════════════════════════════════════════════════
//  Topic domain
// ════════════════════════════════════════════════════════════════

/// Persistence qualifier в полном имени topic'а (`persistent://...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TopicDomain {
    #[default]
    Persistent,
    NonPersistent,
}

impl TopicDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicDomain::Persistent => "persistent",
            TopicDomain::NonPersistent => "non-persistent",
        }
    }
}

impl fmt::Display for TopicDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicDomain {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "persistent" => Ok(TopicDomain::Persistent),
            "non-persistent" => Ok(TopicDomain::NonPersistent),
            _ => Err(NameError::new(s, "unknown topic domain")),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Namespace
// ════════════════════════════════════════════════════════════════

/// `tenant/namespace` — административная группа topic'ов.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceName {
    tenant: String,
    namespace: String,
}

impl NamespaceName {
    pub fn new(tenant: &str, namespace: &str) -> Result<Self, NameError> {
        check_segment(tenant, "empty tenant")?;
        check_segment(namespace, "empty namespace")?;
        Ok(Self {
            tenant: tenant.to_string(),
            namespace: namespace.to_string(),
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Display for NamespaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.namespace)
    }
}

impl FromStr for NamespaceName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tenant, namespace) = s
            .split_once('/')
            .ok_or_else(|| NameError::new(s, "expected tenant/namespace"))?;
        if namespace.contains('/') {
            return Err(NameError::new(s, "expected tenant/namespace"));
        }
        NamespaceName::new(tenant, namespace).map_err(|e| NameError::new(s, e.reason))
    }
}

// ════════════════════════════════════════════════════════════════
//  Topic
// ════════════════════════════════════════════════════════════════

/// Полное имя topic'а: `{domain}://{tenant}/{namespace}/{local}`.
///
/// Admin API возвращает списки именно в этой форме, поэтому
/// сравнение существования идёт по `to_string()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicName {
    domain: TopicDomain,
    namespace: NamespaceName,
    local: String,
}

impl TopicName {
    pub fn new(domain: TopicDomain, namespace: NamespaceName, local: &str) -> Result<Self, NameError> {
        check_segment(local, "empty topic name")?;
        if local.contains('/') {
            return Err(NameError::new(local, "topic name must not contain '/'"));
        }
        Ok(Self {
            domain,
            namespace,
            local: local.to_string(),
        })
    }

    /// Свежее имя со случайным UUID v4 — не пересекается с прошлыми прогонами.
    pub fn random(domain: TopicDomain, namespace: NamespaceName) -> Self {
        Self {
            domain,
            namespace,
            local: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn domain(&self) -> TopicDomain {
        self.domain
    }

    pub fn namespace(&self) -> &NamespaceName {
        &self.namespace
    }

    pub fn local(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.domain, self.namespace, self.local)
    }
}

impl FromStr for TopicName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, rest) = s
            .split_once("://")
            .ok_or_else(|| NameError::new(s, "missing domain (persistent://)"))?;
        let domain: TopicDomain = domain.parse().map_err(|e: NameError| NameError::new(s, e.reason))?;

        let mut parts = rest.splitn(3, '/');
        let (Some(tenant), Some(namespace), Some(local)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(NameError::new(s, "expected domain://tenant/namespace/topic"));
        };
        let ns = NamespaceName::new(tenant, namespace).map_err(|e| NameError::new(s, e.reason))?;
        TopicName::new(domain, ns, local).map_err(|e| NameError::new(s, e.reason))
    }
}

fn check_segment(segment: &str, reason: &'static str) -> Result<(), NameError> {
    if segment.trim().is_empty() {
        return Err(NameError::new(segment, reason));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> NamespaceName {
        NamespaceName::new("localdev", "test").unwrap()
    }

    #[test]
    fn renders_fully_qualified_name() {
        let t = TopicName::new(TopicDomain::Persistent, ns(), "orders").unwrap();
        assert_eq!(t.to_string(), "persistent://localdev/test/orders");

        let t = TopicName::new(TopicDomain::NonPersistent, ns(), "orders").unwrap();
        assert_eq!(t.to_string(), "non-persistent://localdev/test/orders");
    }

    #[test]
    fn parses_what_it_renders() {
        let t: TopicName = "persistent://localdev/test/abc-1".parse().unwrap();
        assert_eq!(t.domain(), TopicDomain::Persistent);
        assert_eq!(t.namespace().tenant(), "localdev");
        assert_eq!(t.namespace().namespace(), "test");
        assert_eq!(t.local(), "abc-1");
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in [
            "localdev/test/x",
            "durable://localdev/test/x",
            "persistent://localdev/test",
            "persistent://localdev//x",
            "persistent://localdev/test/",
            "persistent://localdev/test/a/b",
        ] {
            assert!(bad.parse::<TopicName>().is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn namespace_parse() {
        let n: NamespaceName = "localdev/test".parse().unwrap();
        assert_eq!(n, ns());
        assert!("localdev".parse::<NamespaceName>().is_err());
        assert!("a/b/c".parse::<NamespaceName>().is_err());
        assert!("/b".parse::<NamespaceName>().is_err());
    }

    #[test]
    fn random_names_are_distinct() {
        let a = TopicName::random(TopicDomain::Persistent, ns());
        let b = TopicName::random(TopicDomain::Persistent, ns());
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("persistent://localdev/test/"));
        assert_eq!(a.local().len(), 36);
    }
}
