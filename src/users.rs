use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use log::warn;

use crate::config::{Config, UserConfig};

/// A single right a user may hold on the virtual filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Read,
    Write,
    Delete,
    List,
    Upload,
    Download,
    Append,
    Rename,
    Mkdir,
    Rmdir,
}

impl Permission {
    pub fn parse(name: &str) -> Option<Permission> {
        match name.to_ascii_lowercase().as_str() {
            "read" => Some(Permission::Read),
            "write" => Some(Permission::Write),
            "delete" => Some(Permission::Delete),
            "list" => Some(Permission::List),
            "upload" => Some(Permission::Upload),
            "download" => Some(Permission::Download),
            "append" => Some(Permission::Append),
            "rename" => Some(Permission::Rename),
            "mkdir" => Some(Permission::Mkdir),
            "rmdir" => Some(Permission::Rmdir),
            _ => None,
        }
    }
}

/// Either every permission or an explicit subset.
///
/// An empty grant list means "all permissions" for compatibility with the
/// configuration format this server inherited. Operators who want a
/// restricted account must grant an explicit list.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet(Option<HashSet<Permission>>);

impl PermissionSet {
    pub fn all() -> Self {
        PermissionSet(None)
    }

    pub fn from_names(names: &[String]) -> Self {
        if names.is_empty() {
            return PermissionSet::all();
        }
        let mut set = HashSet::new();
        for name in names {
            match Permission::parse(name) {
                Some(p) => {
                    set.insert(p);
                }
                None => warn!("Ignoring unknown permission name: {}", name),
            }
        }
        if set.is_empty() {
            // Every name was bogus; fall back to the permissive default.
            PermissionSet::all()
        } else {
            PermissionSet(Some(set))
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match &self.0 {
            None => true,
            Some(set) => set.contains(&permission),
        }
    }
}

/// Immutable account record handed to a session at login.
#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    pub home: PathBuf,
    pub permissions: PermissionSet,
    pub enabled: bool,
}

/// Capability the core uses to look up and verify accounts.
///
/// The server never persists users itself; whatever loaded them hands the
/// core an implementation of this trait.
pub trait UserDirectory: Send + Sync {
    fn lookup(&self, username: &str) -> Option<User>;
    fn verify(&self, username: &str, password: &str) -> bool;
}

struct StoredUser {
    user: User,
    password_hash: String,
}

/// In-memory directory built from the `[[users]]` configuration tables.
pub struct InMemoryUserDirectory {
    users: HashMap<String, StoredUser>,
    anonymous: Option<User>,
}

impl InMemoryUserDirectory {
    pub fn from_config(config: &Config) -> Self {
        let mut users = HashMap::new();
        for entry in &config.users {
            let user = Self::build_user(entry);
            users.insert(
                entry.username.clone(),
                StoredUser {
                    user,
                    password_hash: entry.password_hash.clone(),
                },
            );
        }

        let anonymous = if config.security.allow_anonymous {
            let home = config.security.anonymous_home.clone();
            if home.as_os_str().is_empty() {
                warn!("allow_anonymous is set but anonymous_home is empty; anonymous login disabled");
                None
            } else {
                Some(User {
                    username: "anonymous".to_string(),
                    home,
                    permissions: PermissionSet::from_names(&[
                        "list".to_string(),
                        "read".to_string(),
                        "download".to_string(),
                    ]),
                    enabled: true,
                })
            }
        } else {
            None
        };

        InMemoryUserDirectory { users, anonymous }
    }

    fn build_user(entry: &UserConfig) -> User {
        User {
            username: entry.username.clone(),
            home: entry.home.clone(),
            permissions: PermissionSet::from_names(&entry.permissions),
            enabled: entry.enabled,
        }
    }

    fn is_anonymous(username: &str) -> bool {
        username.eq_ignore_ascii_case("anonymous") || username.eq_ignore_ascii_case("ftp")
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn lookup(&self, username: &str) -> Option<User> {
        if Self::is_anonymous(username) {
            return self.anonymous.clone();
        }
        self.users.get(username).map(|stored| stored.user.clone())
    }

    fn verify(&self, username: &str, password: &str) -> bool {
        if Self::is_anonymous(username) {
            // Anonymous accounts accept any password (conventionally an
            // email address).
            return self.anonymous.is_some();
        }
        let Some(stored) = self.users.get(username) else {
            return false;
        };
        match bcrypt::verify(password, &stored.password_hash) {
            Ok(ok) => ok,
            Err(e) => {
                warn!("Malformed password hash for user {}: {}", username, e);
                false
            }
        }
    }
}
