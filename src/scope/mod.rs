//! Permission scopes
//!
//! A scope names a protected resource; a [`ScopeRequest`] pairs it with an
//! access level and travels as `"identifier.access"`, e.g.
//! `"sample_scope_1.read"`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Scope parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// The request string is not `identifier.access`
    #[error("Invalid scope: {0}")]
    InvalidRequest(String),

    /// The access component is neither `read` nor `write`
    #[error("Invalid access: {0}")]
    InvalidAccess(String),
}

/// Access level of a scope request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeAccess {
    /// Read access
    Read,
    /// Write access
    Write,
}

impl ScopeAccess {
    /// Wire form of the access level
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeAccess::Read => "read",
            ScopeAccess::Write => "write",
        }
    }
}

impl fmt::Display for ScopeAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeAccess {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(ScopeAccess::Read),
            "write" => Ok(ScopeAccess::Write),
            other => Err(ScopeError::InvalidAccess(other.to_string())),
        }
    }
}

/// A named protected resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Stable identifier used in scope requests
    pub identifier: String,
    /// Human-readable description shown on the consent screen
    pub description: String,
}

impl Scope {
    /// Create a scope
    pub fn new(identifier: impl Into<String>, description: impl Into<String>) -> Self {
        Scope {
            identifier: identifier.into(),
            description: description.into(),
        }
    }
}

/// A scope and access level the server is willing to grant a client
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AllowedScope {
    /// The scope
    pub scope: Scope,
    /// The access level
    pub access: ScopeAccess,
}

impl AllowedScope {
    /// Create an allowed scope
    pub fn new(scope: Scope, access: ScopeAccess) -> Self {
        AllowedScope { scope, access }
    }

    /// The request that this allowance satisfies
    pub fn to_scope_request(&self) -> ScopeRequest {
        ScopeRequest::new(self.scope.identifier.clone(), self.access)
    }
}

/// A request for one scope at one access level
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeRequest {
    /// Scope identifier
    pub identifier: String,
    /// Requested access
    pub access: ScopeAccess,
}

impl ScopeRequest {
    /// Create a scope request
    pub fn new(identifier: impl Into<String>, access: ScopeAccess) -> Self {
        ScopeRequest {
            identifier: identifier.into(),
            access,
        }
    }

    /// Parse several request strings, failing on the first bad one
    pub fn parse_all<I, S>(strings: I) -> Result<BTreeSet<ScopeRequest>, ScopeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        strings.into_iter().map(|s| s.as_ref().parse()).collect()
    }
}

impl fmt::Display for ScopeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.identifier, self.access)
    }
}

impl FromStr for ScopeRequest {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let components: Vec<&str> = s.split('.').collect();
        match components.as_slice() {
            [identifier, access] if !identifier.is_empty() => {
                Ok(ScopeRequest::new(*identifier, access.parse()?))
            }
            _ => Err(ScopeError::InvalidRequest(s.to_string())),
        }
    }
}

impl Serialize for ScopeRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScopeRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Whether `approved` covers every scope in `required`
///
/// Counts the intersection and compares it with the size of `required`.
pub fn check_permission(
    approved: &BTreeSet<ScopeRequest>,
    required: &BTreeSet<ScopeRequest>,
) -> bool {
    approved.intersection(required).count() == required.len()
}

/// Allowed scopes that were also requested, split for the consent screen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsentGroups {
    /// Read scopes, sorted by description
    pub read: Vec<AllowedScope>,
    /// Write scopes, sorted by description
    pub write: Vec<AllowedScope>,
}

impl ConsentGroups {
    /// Group the allowed scopes a client requested
    pub fn from_request<'a, I>(allowed: I, requested: &BTreeSet<ScopeRequest>) -> Self
    where
        I: IntoIterator<Item = &'a AllowedScope>,
    {
        let mut groups = ConsentGroups::default();
        for scope in allowed {
            if !requested.contains(&scope.to_scope_request()) {
                continue;
            }
            match scope.access {
                ScopeAccess::Read => groups.read.push(scope.clone()),
                ScopeAccess::Write => groups.write.push(scope.clone()),
            }
        }
        groups.read.sort_by(|a, b| a.scope.description.cmp(&b.scope.description));
        groups.write.sort_by(|a, b| a.scope.description.cmp(&b.scope.description));
        groups
    }

    /// Every offered scope as a request
    pub fn offered(&self) -> BTreeSet<ScopeRequest> {
        self.read
            .iter()
            .chain(self.write.iter())
            .map(AllowedScope::to_scope_request)
            .collect()
    }

    /// Nothing to consent to
    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}

/// Scopes the sample client is allowed
pub fn sample_allowed_scopes() -> BTreeSet<AllowedScope> {
    let scope_1 = Scope::new("sample_scope_1", "Sample Scope 1");
    let scope_2 = Scope::new("sample_scope_2", "Sample Scope 2");
    let scope_3 = Scope::new("sample_scope_3", "Sample Scope 3");

    [
        AllowedScope::new(scope_1.clone(), ScopeAccess::Read),
        AllowedScope::new(scope_1, ScopeAccess::Write),
        AllowedScope::new(scope_2, ScopeAccess::Read),
        AllowedScope::new(scope_3, ScopeAccess::Write),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(strings: &[&str]) -> BTreeSet<ScopeRequest> {
        ScopeRequest::parse_all(strings).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        for s in ["sample_scope_1.read", "sample_scope_3.write", "x.read"] {
            let request: ScopeRequest = s.parse().unwrap();
            assert_eq!(request.to_string(), s);
        }

        let request: ScopeRequest = "contacts.write".parse().unwrap();
        assert_eq!(request.identifier, "contacts");
        assert_eq!(request.access, ScopeAccess::Write);
    }

    #[test]
    fn test_wrong_separator_count_rejected() {
        for s in ["noseparator", "a.b.read", "a.read.", ".read", ""] {
            assert!(
                matches!(s.parse::<ScopeRequest>(), Err(ScopeError::InvalidRequest(_))),
                "{s:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_access_rejected() {
        assert_eq!(
            "a.admin".parse::<ScopeRequest>(),
            Err(ScopeError::InvalidAccess("admin".to_string()))
        );
        assert_eq!(
            "READ".parse::<ScopeAccess>(),
            Err(ScopeError::InvalidAccess("READ".to_string()))
        );
    }

    #[test]
    fn test_serde_as_string() {
        let request = ScopeRequest::new("sample_scope_2", ScopeAccess::Read);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, "\"sample_scope_2.read\"");

        let back: ScopeRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);

        assert!(serde_json::from_str::<ScopeRequest>("\"bad\"").is_err());
    }

    #[test]
    fn test_check_permission_subset() {
        let approved = set(&["a.read", "b.write"]);

        assert!(check_permission(&approved, &set(&["a.read"])));
        assert!(check_permission(&approved, &set(&["a.read", "b.write"])));
        assert!(!check_permission(&approved, &set(&["a.read", "c.read"])));
        assert!(!check_permission(&approved, &set(&["a.write"])));
        assert!(check_permission(&approved, &BTreeSet::new()));
        assert!(!check_permission(&BTreeSet::new(), &set(&["a.read"])));
    }

    #[test]
    fn test_consent_groups_filter_and_sort() {
        let allowed = sample_allowed_scopes();
        let requested = set(&["sample_scope_2.read", "sample_scope_1.read", "sample_scope_9.read"]);

        let groups = ConsentGroups::from_request(&allowed, &requested);
        let read: Vec<&str> = groups
            .read
            .iter()
            .map(|s| s.scope.description.as_str())
            .collect();

        assert_eq!(read, vec!["Sample Scope 1", "Sample Scope 2"]);
        assert!(groups.write.is_empty());
        assert_eq!(groups.offered(), set(&["sample_scope_1.read", "sample_scope_2.read"]));
    }

    #[test]
    fn test_consent_groups_empty_when_nothing_allowed() {
        let groups = ConsentGroups::from_request(&sample_allowed_scopes(), &set(&["other.read"]));
        assert!(groups.is_empty());
    }
}
