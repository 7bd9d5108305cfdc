use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// An address of the form `[node@]domain[/resource]`.
///
/// In a MUC, `room@conference.host/nick` addresses one occupant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    node: Option<String>,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    pub fn new(node: Option<&str>, domain: &str, resource: Option<&str>) -> Self {
        Self {
            node: node.map(str::to_lowercase),
            domain: domain.to_lowercase(),
            resource: resource.map(str::to_string),
        }
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Same address without the resource.
    #[must_use]
    pub fn bare(&self) -> Self {
        Self {
            node: self.node.clone(),
            domain: self.domain.clone(),
            resource: None,
        }
    }

    #[must_use]
    pub fn with_resource(&self, resource: &str) -> Self {
        Self {
            resource: Some(resource.to_string()),
            ..self.bare()
        }
    }

    /// Compare ignoring resources.
    #[must_use]
    pub fn same_bare(&self, other: &Self) -> bool {
        self.node == other.node && self.domain == other.domain
    }
}

impl FromStr for Jid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| Error::InvalidJid {
            jid: s.to_string(),
            reason,
        };
        let (rest, resource) = match s.split_once('/') {
            Some((_, "")) => return Err(invalid("empty resource")),
            Some((rest, res)) => (rest, Some(res)),
            None => (s, None),
        };
        let (node, domain) = match rest.split_once('@') {
            Some(("", _)) => return Err(invalid("empty node")),
            Some((node, domain)) => (Some(node), domain),
            None => (None, rest),
        };
        if domain.is_empty() {
            return Err(invalid("empty domain"));
        }
        if domain.contains('@') || domain.chars().any(char::is_whitespace) {
            return Err(invalid("malformed domain"));
        }
        Ok(Self::new(node, domain, resource))
    }
}

impl TryFrom<String> for Jid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(node) = &self.node {
            write!(f, "{node}@")?;
        }
        f.write_str(&self.domain)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn parses_muc_occupant() {
        let jid: Jid = "dmxchat@conference.weather.im/Daryl Herzmann".parse().unwrap();
        assert_eq!(jid.node(), Some("dmxchat"));
        assert_eq!(jid.domain(), "conference.weather.im");
        assert_eq!(jid.resource(), Some("Daryl Herzmann"));
        assert_eq!(jid.bare().to_string(), "dmxchat@conference.weather.im");
    }

    #[test]
    fn domain_only() {
        let jid: Jid = "weather.im".parse().unwrap();
        assert!(jid.node().is_none());
        assert_eq!(jid.to_string(), "weather.im");
    }

    #[test]
    fn node_and_domain_are_case_folded() {
        let a: Jid = "IEMBot@Weather.IM/Home".parse().unwrap();
        let b: Jid = "iembot@weather.im/other".parse().unwrap();
        assert!(a.same_bare(&b));
        assert_eq!(a.resource(), Some("Home"));
    }

    #[rstest]
    #[case("")]
    #[case("@weather.im")]
    #[case("user@")]
    #[case("user@weather.im/")]
    #[case("a@b@c")]
    fn rejects_malformed(#[case] raw: &str) {
        assert!(raw.parse::<Jid>().is_err());
    }
}
