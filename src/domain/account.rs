use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity assigned by the originating messaging platform.
/// Always positive; construct through [`PlatformUserId::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct PlatformUserId(i64);

impl PlatformUserId {
    /// Returns `None` for zero or negative ids.
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for PlatformUserId {
    type Error = String;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or_else(|| format!("platform user id must be positive, got {}", raw))
    }
}

impl From<PlatformUserId> for i64 {
    fn from(id: PlatformUserId) -> Self {
        id.0
    }
}

impl fmt::Display for PlatformUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary authenticated identity a platform user has been merged into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkedIdentityId(String);

impl LinkedIdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkedIdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "identity")]
pub enum LinkStatus {
    Unlinked,
    Linked(LinkedIdentityId),
}

impl LinkStatus {
    pub fn is_linked(&self) -> bool {
        matches!(self, LinkStatus::Linked(_))
    }

    /// The balance record that is authoritative for `id` under this status.
    pub fn scope_for(&self, id: PlatformUserId) -> Scope {
        match self {
            LinkStatus::Unlinked => Scope::Unlinked(id),
            LinkStatus::Linked(identity) => Scope::Linked(identity.clone()),
        }
    }
}

/// Selects one of the two physical balance records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Unlinked(PlatformUserId),
    Linked(LinkedIdentityId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Unlinked(id) => write!(f, "unlinked:{}", id),
            Scope::Linked(identity) => write!(f, "linked:{}", identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_user_id_rejects_non_positive() {
        assert!(PlatformUserId::new(0).is_none());
        assert!(PlatformUserId::new(-7).is_none());
        assert_eq!(PlatformUserId::new(42).map(PlatformUserId::get), Some(42));
    }

    #[test]
    fn test_platform_user_id_deserialize_validates() {
        let ok: PlatformUserId = serde_json::from_str("12").unwrap();
        assert_eq!(ok.get(), 12);
        assert!(serde_json::from_str::<PlatformUserId>("-1").is_err());
    }

    #[test]
    fn test_scope_follows_link_status() {
        let id = PlatformUserId::new(5).unwrap();
        assert_eq!(LinkStatus::Unlinked.scope_for(id), Scope::Unlinked(id));

        let linked = LinkStatus::Linked(LinkedIdentityId::new("auth-123"));
        assert_eq!(
            linked.scope_for(id),
            Scope::Linked(LinkedIdentityId::new("auth-123"))
        );
        assert!(linked.is_linked());
    }

    #[test]
    fn test_link_status_json_shape() {
        let linked = LinkStatus::Linked(LinkedIdentityId::new("auth-1"));
        assert_eq!(
            serde_json::to_string(&linked).unwrap(),
            r#"{"status":"linked","identity":"auth-1"}"#
        );
        assert_eq!(
            serde_json::to_string(&LinkStatus::Unlinked).unwrap(),
            r#"{"status":"unlinked"}"#
        );
    }
}
