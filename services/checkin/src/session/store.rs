//! services/checkin/src/session/store.rs
//!
//! Role-namespaced credentials kept in device storage.
//!
//! Keys follow the layout the web dashboard already writes: `token_<role>`,
//! `refreshToken_<role>` and `user_<role>`, with the unprefixed `token`/`user`
//! pair read as a fallback for sessions created before roles were namespaced.
//! The active role belongs to one store instance (one tab) and is never persisted.

use async_trait::async_trait;
use attendance_core::ports::{KeyValueStore, PortError, PortResult, SessionStore};
use attendance_core::{AuthSession, Role, SessionUser};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

const LEGACY_TOKEN_KEY: &str = "token";
const LEGACY_USER_KEY: &str = "user";

fn token_key(role: Role) -> String {
    format!("token_{}", role)
}

fn refresh_key(role: Role) -> String {
    format!("refreshToken_{}", role)
}

fn user_key(role: Role) -> String {
    format!("user_{}", role)
}

/// A `SessionStore` over any `KeyValueStore`.
pub struct RoleSessionStore {
    storage: Arc<dyn KeyValueStore>,
    active_role: RwLock<Option<Role>>,
}

impl RoleSessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            active_role: RwLock::new(None),
        }
    }

    async fn read_user(&self, key: &str) -> PortResult<Option<SessionUser>> {
        match self.storage.get(key).await? {
            None => Ok(None),
            Some(raw) => match serde_json::from_str::<SessionUser>(&raw) {
                Ok(user) => Ok(Some(user)),
                Err(e) => {
                    warn!(key, "Ignoring unreadable stored user: {}", e);
                    Ok(None)
                }
            },
        }
    }
}

#[async_trait]
impl SessionStore for RoleSessionStore {
    fn active_role(&self) -> Option<Role> {
        *self.active_role.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_active_role(&self, role: Role) {
        *self.active_role.write().unwrap_or_else(|e| e.into_inner()) = Some(role);
    }

    async fn session(&self, role: Role) -> PortResult<Option<AuthSession>> {
        let Some(token) = self.token(role).await? else {
            return Ok(None);
        };
        let refresh_token = self.refresh_token(role).await?;
        let user = self.user(role).await?.unwrap_or_default();
        Ok(Some(AuthSession {
            token,
            refresh_token,
            user,
        }))
    }

    async fn token(&self, role: Role) -> PortResult<Option<String>> {
        if let Some(token) = self.storage.get(&token_key(role)).await? {
            return Ok(Some(token));
        }
        let legacy = self.storage.get(LEGACY_TOKEN_KEY).await?;
        if legacy.is_some() {
            debug!(%role, "using legacy unprefixed token");
        }
        Ok(legacy)
    }

    async fn refresh_token(&self, role: Role) -> PortResult<Option<String>> {
        self.storage.get(&refresh_key(role)).await
    }

    async fn user(&self, role: Role) -> PortResult<Option<SessionUser>> {
        if let Some(user) = self.read_user(&user_key(role)).await? {
            return Ok(Some(user));
        }
        self.read_user(LEGACY_USER_KEY).await
    }

    async fn save_session(&self, role: Role, session: &AuthSession) -> PortResult<()> {
        self.update_tokens(role, &session.token, session.refresh_token.as_deref())
            .await?;
        self.update_user(role, &session.user).await
    }

    async fn update_tokens(
        &self,
        role: Role,
        token: &str,
        refresh_token: Option<&str>,
    ) -> PortResult<()> {
        self.storage.set(&token_key(role), token).await?;
        // The backend only rotates the refresh token sometimes; keep the old one otherwise.
        if let Some(refresh) = refresh_token {
            self.storage.set(&refresh_key(role), refresh).await?;
        }
        Ok(())
    }

    async fn update_user(&self, role: Role, user: &SessionUser) -> PortResult<()> {
        let raw = serde_json::to_string(user)
            .map_err(|e| PortError::Unexpected(format!("Failed to encode user: {}", e)))?;
        self.storage.set(&user_key(role), &raw).await
    }

    async fn clear(&self, role: Role) -> PortResult<()> {
        self.storage.remove(&token_key(role)).await?;
        self.storage.remove(&refresh_key(role)).await?;
        self.storage.remove(&user_key(role)).await?;
        // Otherwise the fallback would resurrect the session on the next read.
        self.storage.remove(LEGACY_TOKEN_KEY).await?;
        self.storage.remove(LEGACY_USER_KEY).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;

    fn store() -> (Arc<MemoryStore>, RoleSessionStore) {
        let storage = Arc::new(MemoryStore::new());
        (storage.clone(), RoleSessionStore::new(storage))
    }

    fn student() -> AuthSession {
        AuthSession {
            token: "tok-s".into(),
            refresh_token: Some("ref-s".into()),
            user: SessionUser {
                id: "u1".into(),
                student_id: Some("S123".into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn roles_do_not_share_credentials() {
        let (_, store) = store();
        store.save_session(Role::Student, &student()).await.unwrap();

        assert_eq!(store.token(Role::Student).await.unwrap().as_deref(), Some("tok-s"));
        assert_eq!(store.token(Role::Lecturer).await.unwrap(), None);
        assert!(store.session(Role::Lecturer).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn legacy_keys_are_a_fallback() {
        let (storage, store) = store();
        storage.set("token", "legacy").await.unwrap();
        storage.set("user", r#"{"id":"old","studentId":"S9"}"#).await.unwrap();

        assert_eq!(store.token(Role::Lecturer).await.unwrap().as_deref(), Some("legacy"));
        let user = store.user(Role::Student).await.unwrap().unwrap();
        assert_eq!(user.student_id.as_deref(), Some("S9"));

        store.save_session(Role::Student, &student()).await.unwrap();
        assert_eq!(store.token(Role::Student).await.unwrap().as_deref(), Some("tok-s"));
    }

    #[tokio::test]
    async fn token_update_keeps_refresh_token_when_not_rotated() {
        let (_, store) = store();
        store.save_session(Role::Student, &student()).await.unwrap();
        store.update_tokens(Role::Student, "tok-2", None).await.unwrap();

        let session = store.session(Role::Student).await.unwrap().unwrap();
        assert_eq!(session.token, "tok-2");
        assert_eq!(session.refresh_token.as_deref(), Some("ref-s"));
    }

    #[tokio::test]
    async fn clear_removes_everything_for_the_role() {
        let (storage, store) = store();
        storage.set("token", "legacy").await.unwrap();
        store.save_session(Role::Student, &student()).await.unwrap();
        store.clear(Role::Student).await.unwrap();

        assert!(store.session(Role::Student).await.unwrap().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn active_role_is_per_instance() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let tab_a = RoleSessionStore::new(storage.clone());
        let tab_b = RoleSessionStore::new(storage);
        tab_a.set_active_role(Role::Lecturer);

        assert_eq!(tab_a.active_role(), Some(Role::Lecturer));
        assert_eq!(tab_b.active_role(), None);
    }
}
