//! Consent collaborator
//!
//! The server asks the user before it records any scope. The provider is
//! whatever presents the question: a UI on a device, a script in tests.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::scope::{ConsentGroups, ScopeRequest};

/// What the user is asked to approve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    /// Client asking
    pub client_id: String,
    /// Client description
    pub description: String,
    /// Requested scopes the client is allowed, split into read and write
    pub groups: ConsentGroups,
    /// Whether the client also asked for a refresh token
    pub include_refresh_token: bool,
}

/// The user's answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentDecision {
    /// The user approved these scopes
    Approved(BTreeSet<ScopeRequest>),
    /// The user dismissed the request
    Canceled,
    /// The question could not be asked or answered
    Failed(String),
}

/// Presents consent requests to the user
#[async_trait]
pub trait ConsentProvider: Send + Sync {
    /// Ask the user and wait for the answer
    async fn request_consent(&self, request: ConsentRequest) -> ConsentDecision;
}

#[derive(Debug)]
enum Script {
    Fixed(ConsentDecision),
    ApproveOffered,
}

/// Consent provider that answers without asking anyone
#[derive(Debug)]
pub struct ScriptedConsent {
    script: Script,
    last_request: Mutex<Option<ConsentRequest>>,
}

impl ScriptedConsent {
    /// Always answer with `decision`
    pub fn new(decision: ConsentDecision) -> Self {
        Self::with_script(Script::Fixed(decision))
    }

    /// Approve whatever is offered
    pub fn approve_all() -> Self {
        Self::with_script(Script::ApproveOffered)
    }

    fn with_script(script: Script) -> Self {
        ScriptedConsent {
            script,
            last_request: Mutex::new(None),
        }
    }

    /// The most recent request, if any
    pub async fn last_request(&self) -> Option<ConsentRequest> {
        self.last_request.lock().await.clone()
    }
}

#[async_trait]
impl ConsentProvider for ScriptedConsent {
    async fn request_consent(&self, request: ConsentRequest) -> ConsentDecision {
        let decision = match &self.script {
            Script::Fixed(decision) => decision.clone(),
            Script::ApproveOffered => ConsentDecision::Approved(request.groups.offered()),
        };
        *self.last_request.lock().await = Some(request);
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::sample_allowed_scopes;

    fn request() -> ConsentRequest {
        let requested =
            ScopeRequest::parse_all(["sample_scope_1.read", "sample_scope_3.write"]).unwrap();
        ConsentRequest {
            client_id: "sample_client_id".to_string(),
            description: "Sample Client App".to_string(),
            groups: ConsentGroups::from_request(&sample_allowed_scopes(), &requested),
            include_refresh_token: false,
        }
    }

    #[tokio::test]
    async fn test_approve_all_returns_offered() {
        let consent = ScriptedConsent::approve_all();
        let decision = consent.request_consent(request()).await;

        assert_eq!(
            decision,
            ConsentDecision::Approved(
                ScopeRequest::parse_all(["sample_scope_1.read", "sample_scope_3.write"]).unwrap()
            )
        );
        assert_eq!(consent.last_request().await, Some(request()));
    }

    #[tokio::test]
    async fn test_fixed_answer() {
        let consent = ScriptedConsent::new(ConsentDecision::Canceled);
        assert_eq!(consent.request_consent(request()).await, ConsentDecision::Canceled);
    }
}
