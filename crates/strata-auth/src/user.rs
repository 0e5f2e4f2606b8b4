//! User lookup by credentials

use strata_common::{Error, Result, User};
use tracing::debug;

/// Resolves a username/password pair into a user
pub trait UserDriver: Send + Sync {
    fn get_by_credentials(&self, username: &str, password: &str) -> Result<User>;
}

struct StoredUser {
    user: User,
    password: String,
}

/// Users held in memory, parsed from a
/// `username:password:email:display name` comma-separated list.
pub struct MemUserDriver {
    users: Vec<StoredUser>,
}

impl MemUserDriver {
    /// Parse a user list; entries with fewer than four fields are skipped
    #[must_use]
    pub fn from_list(list: &str) -> Self {
        let users: Vec<StoredUser> = list
            .split(',')
            .filter_map(|entry| {
                let fields: Vec<&str> = entry.trim().splitn(4, ':').collect();
                match fields.as_slice() {
                    [username, password, email, display_name] if !username.is_empty() => {
                        Some(StoredUser {
                            user: User {
                                username: (*username).to_string(),
                                email: (*email).to_string(),
                                display_name: (*display_name).to_string(),
                            },
                            password: (*password).to_string(),
                        })
                    }
                    _ => None,
                }
            })
            .collect();
        debug!("loaded {} users", users.len());
        Self { users }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDriver for MemUserDriver {
    fn get_by_credentials(&self, username: &str, password: &str) -> Result<User> {
        self.users
            .iter()
            .find(|u| u.user.username == username && u.password == password)
            .map(|u| u.user.clone())
            .ok_or_else(|| {
                Error::user_not_found(format!(
                    "user with credentials {username}:xxxx not found"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::ErrorKind;

    #[test]
    fn test_parse_user_list() {
        let driver = MemUserDriver::from_list(
            "alice:secret:alice@example.com:Alice Liddell, bob:pw:bob@example.com:Bob, broken:entry",
        );
        assert_eq!(driver.len(), 2);

        let alice = driver.get_by_credentials("alice", "secret").unwrap();
        assert_eq!(alice.email, "alice@example.com");
        assert_eq!(alice.display_name, "Alice Liddell");
        assert_eq!(driver.get_by_credentials("bob", "pw").unwrap().username, "bob");
    }

    #[test]
    fn test_wrong_credentials() {
        let driver = MemUserDriver::from_list("alice:secret:a@x:Alice");
        let err = driver.get_by_credentials("alice", "nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserNotFound);
        assert!(!err.message().contains("nope"));
        assert!(MemUserDriver::from_list("").is_empty());
    }
}
