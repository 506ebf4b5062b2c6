use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::users::{
    repo::{StoreError, UserStore},
    repo_types::{NewUser, PendingReset, ProfileChanges, Role, User},
};

/// In-process `UserStore` used by the unit tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.clone())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            user_id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
            password_hash: new.password_hash,
            role: Role::default(),
            reset: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn set_role(&self, email: &str, role: Role) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|u| u.email == email).map(|u| {
            u.role = role;
            u.clone()
        }))
    }

    async fn delete_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.email != email);
        Ok(users.len() != before)
    }

    async fn update_profile(
        &self,
        email: &str,
        changes: ProfileChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|u| u.email == email).map(|u| {
            if let Some(v) = changes.first_name {
                u.first_name = v;
            }
            if let Some(v) = changes.last_name {
                u.last_name = v;
            }
            if let Some(v) = changes.phone {
                u.phone = v;
            }
            if let Some(v) = changes.password_hash {
                u.password_hash = v;
            }
            u.clone()
        }))
    }

    async fn set_reset(
        &self,
        email: &str,
        reset_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.email == email) {
            Some(u) => {
                u.reset = Some(PendingReset {
                    reset_id,
                    expires_at,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn consume_reset(
        &self,
        email: &str,
        reset_id: Uuid,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        let Some(u) = users.iter_mut().find(|u| u.email == email) else {
            return Ok(None);
        };
        match u.reset {
            Some(pending) if pending.accepts(reset_id, now) => {
                u.password_hash = password_hash.to_string();
                u.reset = None;
                Ok(Some(u.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            first_name: "A".into(),
            last_name: "B".into(),
            email: email.into(),
            phone: "555".into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = MemoryUserStore::default();
        store.insert(new_user("a@x.com")).await.unwrap();
        let err = store.insert(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn consume_reset_is_single_use() {
        let store = MemoryUserStore::default();
        store.insert(new_user("a@x.com")).await.unwrap();
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        assert!(store
            .set_reset("a@x.com", id, now + Duration::minutes(10))
            .await
            .unwrap());

        let first = store.consume_reset("a@x.com", id, now, "new").await.unwrap();
        assert_eq!(first.unwrap().password_hash, "new");
        let second = store.consume_reset("a@x.com", id, now, "newer").await.unwrap();
        assert!(second.is_none());
    }
}
