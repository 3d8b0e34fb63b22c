//! Bearer credentials: issuance, validation, revocation, listing.
//!
//! A secret is shown exactly once, at issuance. Only a short plaintext prefix
//! (the lookup index) and a salted HMAC-SHA256 of the full secret are kept.
//! Validation loads every live record sharing the prefix and compares each in
//! constant time until one matches.

mod repository;
pub mod router;
mod secret;

pub use repository::{
    apply_touch, CredentialRepository, DirectLastUsed, InMemoryCredentials, LastUsedSink,
    LastUsedTouch,
};
pub use router::credential_router;
pub use secret::SECRET_PREFIX;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{CandidateId, CredentialId, EmployerId, Participant};
use super::repository::RepositoryError;
use crate::clock::Clock;

const DEFAULT_LABEL: &str = "Default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalRole {
    Candidate,
    Employer,
}

/// The account a credential acts for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: PrincipalRole,
}

impl Principal {
    pub fn candidate(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: PrincipalRole::Candidate,
        }
    }

    pub fn employer(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: PrincipalRole::Employer,
        }
    }

    pub fn participant(&self) -> Participant {
        match self.role {
            PrincipalRole::Candidate => Participant::Candidate(CandidateId(self.id.clone())),
            PrincipalRole::Employer => Participant::Employer(EmployerId(self.id.clone())),
        }
    }
}

/// Stored credential record.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub id: CredentialId,
    pub owner: Principal,
    pub label: String,
    pub prefix: String,
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.map_or(true, |expiry| expiry > now)
    }

    pub fn view(&self) -> CredentialView {
        CredentialView {
            id: self.id.clone(),
            owner_id: self.owner.id.clone(),
            label: self.label.clone(),
            prefix: self.prefix.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            last_used_at: self.last_used_at,
        }
    }
}

/// Listable metadata. Never carries the hash or the secret.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialView {
    pub id: CredentialId,
    pub owner_id: String,
    pub label: String,
    pub prefix: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Issuance result: the raw secret is only available here.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCredential {
    pub secret: String,
    pub credential: CredentialView,
}

/// A successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub principal: Principal,
    pub credential_id: CredentialId,
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("unable to derive credential hash")]
    Hashing,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct CredentialStore {
    repository: Arc<dyn CredentialRepository>,
    last_used: Arc<dyn LastUsedSink>,
    clock: Arc<dyn Clock>,
    prefix_len: usize,
}

impl CredentialStore {
    pub fn new(
        repository: Arc<dyn CredentialRepository>,
        last_used: Arc<dyn LastUsedSink>,
        clock: Arc<dyn Clock>,
        prefix_len: usize,
    ) -> Self {
        Self {
            repository,
            last_used,
            clock,
            prefix_len: prefix_len.clamp(4, 32),
        }
    }

    pub fn issue(
        &self,
        owner: Principal,
        label: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedCredential, CredentialError> {
        let secret = secret::generate_secret();
        let prefix =
            secret::lookup_prefix(&secret, self.prefix_len).ok_or(CredentialError::Hashing)?;
        let salt = secret::generate_salt();
        let hash = secret::hash_secret(&salt, &secret)?;
        let label = match label.trim() {
            "" => DEFAULT_LABEL.to_string(),
            trimmed => trimmed.to_string(),
        };

        let credential = Credential {
            id: CredentialId::generate(),
            owner,
            label,
            prefix,
            salt,
            hash,
            created_at: self.clock.now(),
            expires_at,
            revoked_at: None,
            last_used_at: None,
        };
        self.repository.insert(credential.clone())?;

        info!(
            credential_id = %credential.id,
            owner_id = %credential.owner.id,
            prefix = %credential.prefix,
            "issued credential"
        );
        Ok(IssuedCredential {
            secret,
            credential: credential.view(),
        })
    }

    /// Resolve a presented secret to its owner. Revoked, expired, malformed, and
    /// unknown secrets all yield `None`.
    pub fn validate(&self, presented: &str) -> Result<Option<Authenticated>, CredentialError> {
        let Some(prefix) = secret::lookup_prefix(presented, self.prefix_len) else {
            debug!("credential rejected: unrecognised format");
            return Ok(None);
        };

        let now = self.clock.now();
        let matched = self
            .repository
            .by_prefix(&prefix)?
            .into_iter()
            .filter(|candidate| candidate.is_live(now))
            .find(|candidate| secret::verify_secret(&candidate.salt, presented, &candidate.hash));

        match matched {
            Some(credential) => {
                self.last_used.record(credential.id.clone(), now);
                Ok(Some(Authenticated {
                    principal: credential.owner,
                    credential_id: credential.id,
                }))
            }
            None => {
                debug!(%prefix, "credential rejected: no live match");
                Ok(None)
            }
        }
    }

    /// Idempotent. `false` when the credential does not exist or belongs to
    /// someone else.
    pub fn revoke(&self, id: &CredentialId, owner_id: &str) -> Result<bool, CredentialError> {
        let Some(mut credential) = self.repository.fetch(id)? else {
            return Ok(false);
        };
        if credential.owner.id != owner_id {
            return Ok(false);
        }
        if credential.revoked_at.is_some() {
            return Ok(true);
        }

        credential.revoked_at = Some(self.clock.now());
        self.repository.update(credential)?;
        info!(credential_id = %id, owner_id, "revoked credential");
        Ok(true)
    }

    /// Newest first.
    pub fn list(&self, owner_id: &str) -> Result<Vec<CredentialView>, CredentialError> {
        let mut records = self.repository.for_owner(owner_id)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records.iter().map(Credential::view).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, TimeZone};

    struct Fixture {
        store: CredentialStore,
        repository: Arc<InMemoryCredentials>,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let repository = Arc::new(InMemoryCredentials::default());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        let store = CredentialStore::new(
            repository.clone(),
            Arc::new(DirectLastUsed::new(repository.clone())),
            clock.clone(),
            8,
        );
        Fixture {
            store,
            repository,
            clock,
        }
    }

    /// Seed a record that shares `prefix` but hashes a different secret.
    fn seed_collision(fixture: &Fixture, prefix: &str, owner: &str) {
        let salt = secret::generate_salt();
        let other_secret = format!("{prefix}ffffffffffffffffffffffff");
        fixture
            .repository
            .insert(Credential {
                id: CredentialId::generate(),
                owner: Principal::candidate(owner),
                label: "collision".to_string(),
                prefix: prefix.to_string(),
                hash: secret::hash_secret(&salt, &other_secret).expect("hash"),
                salt,
                created_at: fixture.clock.now(),
                expires_at: None,
                revoked_at: None,
                last_used_at: None,
            })
            .expect("insert collision");
    }

    #[test]
    fn issued_secret_validates_and_records_use() {
        let fixture = fixture();
        let issued = fixture
            .store
            .issue(Principal::candidate("seeker-1"), "laptop", None)
            .expect("issue");

        assert!(issued.secret.starts_with(&issued.credential.prefix));
        assert_eq!(issued.credential.prefix.len(), SECRET_PREFIX.len() + 8);

        let auth = fixture
            .store
            .validate(&issued.secret)
            .expect("validate")
            .expect("secret matches");
        assert_eq!(auth.principal, Principal::candidate("seeker-1"));
        assert_eq!(auth.credential_id, issued.credential.id);

        let stored = fixture
            .repository
            .fetch(&issued.credential.id)
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.last_used_at, Some(fixture.clock.now()));
    }

    #[test]
    fn revoked_credentials_never_validate_again() {
        let fixture = fixture();
        let issued = fixture
            .store
            .issue(Principal::employer("emp-1"), "", None)
            .expect("issue");
        assert_eq!(issued.credential.label, "Default");

        assert!(!fixture
            .store
            .revoke(&issued.credential.id, "someone-else")
            .expect("revoke"));
        assert!(fixture
            .store
            .revoke(&issued.credential.id, "emp-1")
            .expect("revoke"));
        let revoked_at = fixture.clock.now();
        fixture.clock.advance(Duration::minutes(5));
        assert!(fixture
            .store
            .revoke(&issued.credential.id, "emp-1")
            .expect("revoke twice"));

        assert!(fixture
            .store
            .validate(&issued.secret)
            .expect("validate")
            .is_none());
        let listed = fixture.store.list("emp-1").expect("list");
        assert_eq!(listed[0].revoked_at, Some(revoked_at));
    }

    #[test]
    fn expired_credentials_do_not_validate() {
        let fixture = fixture();
        let expiry = fixture.clock.now() + Duration::hours(1);
        let issued = fixture
            .store
            .issue(Principal::candidate("seeker-1"), "short", Some(expiry))
            .expect("issue");

        assert!(fixture.store.validate(&issued.secret).expect("ok").is_some());
        fixture.clock.advance(Duration::hours(1));
        assert!(fixture.store.validate(&issued.secret).expect("ok").is_none());
    }

    #[test]
    fn prefix_collisions_only_match_the_right_secret() {
        let fixture = fixture();
        let issued = fixture
            .store
            .issue(Principal::candidate("seeker-1"), "main", None)
            .expect("issue");
        seed_collision(&fixture, &issued.credential.prefix, "seeker-2");
        seed_collision(&fixture, &issued.credential.prefix, "seeker-3");

        let auth = fixture
            .store
            .validate(&issued.secret)
            .expect("validate")
            .expect("matches");
        assert_eq!(auth.principal.id, "seeker-1");

        let forged = format!("{}000000000000000000000000", issued.credential.prefix);
        assert!(fixture.store.validate(&forged).expect("validate").is_none());
    }

    #[test]
    fn malformed_secrets_are_rejected() {
        let fixture = fixture();
        for presented in ["", "Bearer abc", "aj_live_", "aj_live_xyz"] {
            assert!(fixture.store.validate(presented).expect("ok").is_none());
        }
    }

    #[test]
    fn listing_is_newest_first_per_owner() {
        let fixture = fixture();
        fixture
            .store
            .issue(Principal::candidate("seeker-1"), "first", None)
            .expect("issue");
        fixture.clock.advance(Duration::minutes(1));
        fixture
            .store
            .issue(Principal::candidate("seeker-1"), "second", None)
            .expect("issue");
        fixture
            .store
            .issue(Principal::candidate("seeker-2"), "other", None)
            .expect("issue");

        let labels: Vec<String> = fixture
            .store
            .list("seeker-1")
            .expect("list")
            .into_iter()
            .map(|view| view.label)
            .collect();
        assert_eq!(labels, vec!["second", "first"]);
    }

    #[test]
    fn failing_last_used_writes_do_not_fail_validation() {
        struct Unavailable;
        impl CredentialRepository for Unavailable {
            fn insert(&self, _: Credential) -> Result<(), RepositoryError> {
                Ok(())
            }
            fn update(&self, _: Credential) -> Result<(), RepositoryError> {
                Ok(())
            }
            fn fetch(&self, _: &CredentialId) -> Result<Option<Credential>, RepositoryError> {
                Ok(None)
            }
            fn by_prefix(&self, _: &str) -> Result<Vec<Credential>, RepositoryError> {
                Ok(Vec::new())
            }
            fn for_owner(&self, _: &str) -> Result<Vec<Credential>, RepositoryError> {
                Ok(Vec::new())
            }
            fn touch(&self, _: &CredentialId, _: DateTime<Utc>) -> Result<(), RepositoryError> {
                Err(RepositoryError::Unavailable("write timeout".to_string()))
            }
        }

        let fixture = fixture();
        let store = CredentialStore::new(
            fixture.repository.clone(),
            Arc::new(DirectLastUsed::new(Arc::new(Unavailable))),
            fixture.clock.clone(),
            8,
        );
        let issued = store
            .issue(Principal::candidate("seeker-1"), "main", None)
            .expect("issue");
        assert!(store.validate(&issued.secret).expect("validate").is_some());
    }
}
