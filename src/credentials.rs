//! Persisted account directory with guarded mutation.
//!
//! Accounts are stored as a JSON object `username → {password, role}`.
//! Passwords are kept as salted BLAKE3 digests (`blake3$<salt>$<digest>`);
//! a plaintext value found on load is hashed and written back.
//!
//! Deletion is checked in a fixed order:
//!
//! ```text
//! Pending ──self?──▶ SelfCheckFailed
//!    │
//!    └──last admin?──▶ LastAdminCheckFailed
//!         │
//!         └──▶ Applied
//! ```
//!
//! so an administrator trying to delete their own sole-admin account is
//! told about self-deletion, not about the last-admin rule.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use iotwatch_types::{Identity, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const HASH_SCHEME: &str = "blake3";
const SALT_LEN: usize = 16;

/// Errors reported by credential operations. The store is unchanged
/// whenever one of these is returned.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("You cannot delete your own account")]
    SelfDeletion,

    #[error("Cannot delete '{0}': at least one admin account must remain")]
    LastAdmin(String),

    #[error("Unknown user '{0}'")]
    UnknownUser(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Credential storage error: {0}")]
    Io(#[from] io::Error),

    #[error("Credential file is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A salted password digest.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash {
    salt: [u8; SALT_LEN],
    digest: blake3::Hash,
}

impl PasswordHash {
    /// Hash `password` with a fresh random salt.
    pub fn new(password: &str) -> Self {
        Self::with_salt(password, rand::random())
    }

    fn with_salt(password: &str, salt: [u8; SALT_LEN]) -> Self {
        let digest = blake3::Hasher::new()
            .update(&salt)
            .update(password.as_bytes())
            .finalize();
        Self { salt, digest }
    }

    /// Check `password` against this digest in constant time.
    pub fn verify(&self, password: &str) -> bool {
        Self::with_salt(password, self.salt).digest == self.digest
    }

    /// Parse the stored `blake3$<salt>$<digest>` form.
    pub fn parse(encoded: &str) -> Option<Self> {
        let mut parts = encoded.split('$');
        if parts.next()? != HASH_SCHEME {
            return None;
        }
        let salt: [u8; SALT_LEN] = hex::decode(parts.next()?).ok()?.try_into().ok()?;
        let digest = blake3::Hash::from_hex(parts.next()?).ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { salt, digest })
    }

    pub fn encode(&self) -> String {
        format!(
            "{}${}${}",
            HASH_SCHEME,
            hex::encode(self.salt),
            self.digest.to_hex()
        )
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

/// One account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub password: PasswordHash,
    pub role: Role,
}

/// On-disk shape of a record.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    password: String,
    role: Role,
}

/// Progress of a delete request through its checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteCheck {
    Pending,
    SelfCheckFailed,
    LastAdminCheckFailed,
    Applied,
}

/// Durable `username → record` map.
///
/// Every successful mutation is written to disk before it becomes
/// visible in memory; if the write fails the store keeps its old state.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    users: BTreeMap<String, CredentialRecord>,
}

impl CredentialStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CredentialError> {
        let path = path.as_ref().to_path_buf();

        let stored: BTreeMap<String, StoredRecord> = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        let mut migrated = 0;
        let users = stored
            .into_iter()
            .map(|(username, record)| {
                let password = PasswordHash::parse(&record.password).unwrap_or_else(|| {
                    migrated += 1;
                    PasswordHash::new(&record.password)
                });
                let record = CredentialRecord {
                    password,
                    role: record.role,
                };
                (username, record)
            })
            .collect();

        let store = Self { path, users };
        if migrated > 0 {
            warn!(count = migrated, path = %store.path.display(), "hashing plaintext passwords");
            save(&store.path, &store.users)?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every account, for display.
    pub fn list(&self) -> &BTreeMap<String, CredentialRecord> {
        &self.users
    }

    pub fn get(&self, username: &str) -> Option<&CredentialRecord> {
        self.users.get(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn admin_count(&self) -> usize {
        self.users.values().filter(|r| r.role == Role::Admin).count()
    }

    /// Create or overwrite the account for `username`.
    pub fn upsert(&mut self, username: &str, password: &str, role: Role) -> Result<(), CredentialError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(CredentialError::Validation("Username and password required."));
        }

        let mut next = self.users.clone();
        let replaced = next
            .insert(
                username.to_string(),
                CredentialRecord {
                    password: PasswordHash::new(password),
                    role,
                },
            )
            .is_some();
        save(&self.path, &next)?;
        self.users = next;

        info!(username, %role, replaced, "account saved");
        Ok(())
    }

    /// Run the delete checks for `username` without changing anything.
    ///
    /// Returns `Applied` when the delete would go through. A target that
    /// does not exist also reports `Applied`; [`delete`](Self::delete)
    /// rejects it separately.
    pub fn check_delete(&self, username: &str, requested_by: &Identity) -> DeleteCheck {
        let mut state = DeleteCheck::Pending;
        loop {
            state = match state {
                DeleteCheck::Pending if username == requested_by.username => {
                    DeleteCheck::SelfCheckFailed
                }
                DeleteCheck::Pending => {
                    let target_is_admin =
                        self.users.get(username).is_some_and(|r| r.role == Role::Admin);
                    if target_is_admin && self.admin_count() <= 1 {
                        DeleteCheck::LastAdminCheckFailed
                    } else {
                        DeleteCheck::Applied
                    }
                }
                done => return done,
            };
        }
    }

    /// Delete `username` on behalf of `requested_by`, returning the removed record.
    pub fn delete(
        &mut self,
        username: &str,
        requested_by: &Identity,
    ) -> Result<CredentialRecord, CredentialError> {
        match self.check_delete(username, requested_by) {
            DeleteCheck::SelfCheckFailed => return Err(CredentialError::SelfDeletion),
            DeleteCheck::LastAdminCheckFailed => {
                return Err(CredentialError::LastAdmin(username.to_string()))
            }
            DeleteCheck::Pending | DeleteCheck::Applied => {}
        }

        let mut next = self.users.clone();
        let removed = next
            .remove(username)
            .ok_or_else(|| CredentialError::UnknownUser(username.to_string()))?;
        save(&self.path, &next)?;
        self.users = next;

        info!(username, requested_by = %requested_by.username, "account deleted");
        Ok(removed)
    }

    /// Verify a login and produce the session identity.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Identity, CredentialError> {
        let record = self
            .users
            .get(username)
            .ok_or_else(|| CredentialError::UnknownUser(username.to_string()))?;

        if !record.password.verify(password) {
            return Err(CredentialError::InvalidPassword);
        }
        Ok(Identity::new(username, record.role))
    }
}

fn save(path: &Path, users: &BTreeMap<String, CredentialRecord>) -> Result<(), CredentialError> {
    let stored: BTreeMap<&str, StoredRecord> = users
        .iter()
        .map(|(username, record)| {
            let stored = StoredRecord {
                password: record.password.encode(),
                role: record.role,
            };
            (username.as_str(), stored)
        })
        .collect();

    let json = serde_json::to_string_pretty(&stored)?;

    // Write next to the target and rename so a crash never leaves half a file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
