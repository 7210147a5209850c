use crate::models::User;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,

    /// A unique field (`username` or `email`) is already taken.
    #[error("duplicate {0}")]
    Duplicate(&'static str),
}

/// User persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: User) -> Result<User, StoreError>;

    async fn list(&self) -> Vec<User>;

    async fn find_by_id(&self, id: Uuid) -> Option<User>;

    /// Look a user up by username, then by email.
    async fn find_by_login(&self, login: &str) -> Option<User>;

    async fn update(
        &self,
        id: Uuid,
        username: Option<String>,
        email: Option<String>,
    ) -> Result<User, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

/// In-process store. Data lives as long as the process.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// True if `login` would resolve to `user`.
fn answers_to(user: &User, login: &str) -> bool {
    user.username == login || user.email.eq_ignore_ascii_case(login)
}

// Usernames and emails share one login namespace, so a new value must not
// collide with either field of any other user.
fn check_unique(
    users: &HashMap<Uuid, User>,
    skip: Option<Uuid>,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<(), StoreError> {
    for user in users.values().filter(|u| Some(u.id) != skip) {
        if username.is_some_and(|name| answers_to(user, name)) {
            return Err(StoreError::Duplicate("username"));
        }
        if email.is_some_and(|mail| {
            user.email.eq_ignore_ascii_case(mail) || user.username.eq_ignore_ascii_case(mail)
        }) {
            return Err(StoreError::Duplicate("email"));
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        check_unique(&users, None, Some(&user.username), Some(&user.email))?;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list(&self) -> Vec<User> {
        let users = self.users.lock().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.username.cmp(&b.username)));
        all
    }

    async fn find_by_id(&self, id: Uuid) -> Option<User> {
        self.users.lock().await.get(&id).cloned()
    }

    async fn find_by_login(&self, login: &str) -> Option<User> {
        let users = self.users.lock().await;
        users
            .values()
            .find(|u| u.username == login)
            .or_else(|| users.values().find(|u| u.email.eq_ignore_ascii_case(login)))
            .cloned()
    }

    async fn update(
        &self,
        id: Uuid,
        username: Option<String>,
        email: Option<String>,
    ) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if !users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        check_unique(&users, Some(id), username.as_deref(), email.as_deref())?;

        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(username) = username {
            user.username = username;
        }
        if let Some(email) = email {
            user.email = email;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.users
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
