use tracing::{debug, info, warn};

use crate::cache::{LocalCache, LocalStore};
use crate::error::AuthError;
use crate::models::User;

/// The signed-in identity, persisted under `ems_current_user`.
///
/// Credentials are checked against the User collection of the current
/// snapshot. There is no token: the identity, minus its password, is simply
/// remembered locally until logout.
pub struct Session<S> {
    cache: LocalCache<S>,
    current: Option<User>,
}

impl<S: LocalStore> Session<S> {
    pub fn new(store: S) -> Self {
        Self {
            cache: LocalCache::new(store),
            current: None,
        }
    }

    /// Restore the persisted identity. Returns whether one was found.
    pub fn load(&mut self) -> anyhow::Result<bool> {
        match self.cache.load_current_user()? {
            Some(cached) => {
                debug!(user_id = cached.data.user_id, signed_in = %cached.age_display(), "Session restored");
                self.current = Some(cached.data);
                Ok(true)
            }
            None => {
                debug!("No session data found");
                Ok(false)
            }
        }
    }

    /// Match `username` and `password` literally against `users`.
    pub fn login(&mut self, users: &[User], username: &str, password: &str) -> Result<User, AuthError> {
        let Some(user) = users
            .iter()
            .find(|u| u.name == username && u.password == password)
        else {
            warn!(username, "Login failed");
            return Err(AuthError::InvalidCredentials);
        };

        let user = user.without_password();
        self.cache.save_current_user(&user)?;
        info!(user_id = user.user_id, "Login successful");
        self.current = Some(user.clone());
        Ok(user)
    }

    pub fn logout(&mut self) -> Result<(), AuthError> {
        self.cache.clear_current_user()?;
        if let Some(user) = self.current.take() {
            info!(user_id = user.user_id, "Logged out");
        }
        Ok(())
    }

    pub fn current(&self) -> Option<&User> {
        self.current.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.current.as_ref().is_some_and(User::is_admin)
    }

    /// Re-read the signed-in user from a fresh user collection so renames
    /// and role changes take effect. A user that no longer exists is signed
    /// out. Returns whether a user is still signed in.
    pub fn refresh_identity(&mut self, users: &[User]) -> Result<bool, AuthError> {
        let Some(current) = &self.current else {
            return Ok(false);
        };

        match users
            .iter()
            .find(|u| u.user_id == current.user_id)
            .map(User::without_password)
        {
            Some(latest) if latest == *current => Ok(true),
            Some(latest) => {
                debug!(user_id = latest.user_id, "Signed-in user changed remotely");
                self.cache.save_current_user(&latest)?;
                self.current = Some(latest);
                Ok(true)
            }
            None => {
                warn!(user_id = current.user_id, "Signed-in user was removed");
                self.logout()?;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, CURRENT_USER_KEY};
    use crate::models::UserType;
    use std::sync::Arc;

    fn users() -> Vec<User> {
        vec![
            User {
                user_id: 1,
                name: "admin".to_string(),
                password: "secret".to_string(),
                user_type: UserType::Admin,
                ..User::default()
            },
            User {
                user_id: 2,
                name: "clerk".to_string(),
                password: "pass".to_string(),
                ..User::default()
            },
        ]
    }

    #[test]
    fn test_login_and_restore() {
        let store = Arc::new(MemoryStore::new());
        let mut session = Session::new(Arc::clone(&store));
        let user = session.login(&users(), "admin", "secret").expect("login");
        assert_eq!(user.user_id, 1);
        assert!(session.is_admin());

        let mut restored = Session::new(store);
        assert!(restored.load().expect("load"));
        assert_eq!(restored.current().map(|u| u.user_id), Some(1));
    }

    #[test]
    fn test_password_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let mut session = Session::new(Arc::clone(&store));
        let user = session.login(&users(), "admin", "secret").expect("login");
        assert!(user.password.is_empty());
        assert_eq!(session.current().map(|u| u.password.as_str()), Some(""));

        let persisted = || store.get(CURRENT_USER_KEY).expect("get").expect("present");
        assert!(!persisted().contains("secret"));

        let mut promoted = users();
        promoted[0].name = "root".to_string();
        assert!(session.refresh_identity(&promoted).expect("refresh"));
        assert_eq!(session.current().map(|u| u.name.as_str()), Some("root"));
        assert!(!persisted().contains("secret"));
    }

    #[test]
    fn test_login_is_literal() {
        let mut session = Session::new(MemoryStore::new());
        assert!(matches!(
            session.login(&users(), "admin", "SECRET"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            session.login(&users(), " clerk", "pass"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_logout_clears_persisted_identity() {
        let store = Arc::new(MemoryStore::new());
        let mut session = Session::new(Arc::clone(&store));
        session.login(&users(), "clerk", "pass").expect("login");
        assert!(!session.is_admin());

        session.logout().expect("logout");
        assert!(session.current().is_none());
        assert!(!Session::new(store).load().expect("load"));
    }

    #[test]
    fn test_refresh_identity() {
        let mut session = Session::new(MemoryStore::new());
        session.login(&users(), "clerk", "pass").expect("login");

        let mut promoted = users();
        promoted[1].user_type = UserType::Admin;
        assert!(session.refresh_identity(&promoted).expect("refresh"));
        assert!(session.is_admin());

        assert!(!session.refresh_identity(&promoted[..1]).expect("refresh"));
        assert!(!session.is_authenticated());
    }
}
