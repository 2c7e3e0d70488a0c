//! In-memory port implementations

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use communaute_core::{DirectoryClient, UserRepository};
use communaute_domain::{DirectoryUser, NewUser, Result as DomainResult, User};
use parking_lot::Mutex;

/// Members keyed by id, mutable from tests.
#[derive(Default, Clone)]
pub struct InMemoryUsers {
    users: Arc<Mutex<BTreeMap<i64, User>>>,
}

impl InMemoryUsers {
    pub fn with_members(count: i64) -> Self {
        let repo = Self::default();
        for id in 1..=count {
            repo.put(member(id));
        }
        repo
    }

    pub fn get(&self, id: i64) -> Option<User> {
        self.users.lock().get(&id).cloned()
    }

    pub fn put(&self, user: User) {
        self.users.lock().insert(user.id, user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_ids(&self, ids: &[i64]) -> DomainResult<Vec<User>> {
        Ok(ids.iter().filter_map(|id| self.get(*id)).collect())
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        Ok(self.users.lock().values().find(|u| u.email == email).cloned())
    }

    async fn list_published(&self) -> DomainResult<Vec<User>> {
        Ok(self.users.lock().values().filter(|u| u.is_published()).cloned().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    Send(Vec<DirectoryUser>),
    Delete(Vec<i64>),
}

/// Records every directory call in order.
#[derive(Default)]
pub struct RecordingDirectory {
    pub calls: Mutex<Vec<DirectoryCall>>,
}

#[async_trait]
impl DirectoryClient for RecordingDirectory {
    async fn send_users(&self, users: &[DirectoryUser]) -> DomainResult<()> {
        self.calls.lock().push(DirectoryCall::Send(users.to_vec()));
        Ok(())
    }

    async fn delete_users(&self, ids: &[i64]) -> DomainResult<()> {
        self.calls.lock().push(DirectoryCall::Delete(ids.to_vec()));
        Ok(())
    }

    async fn start_full_sync(&self) -> DomainResult<String> {
        Ok("started".to_string())
    }

    async fn complete_full_sync(&self, _started_at: &str) -> DomainResult<()> {
        Ok(())
    }
}

pub fn member(id: i64) -> User {
    NewUser::new(format!("member{id}"), format!("member{id}@example.org"))
        .with_names("Camille", format!("Martin{id}"))
        .into_user(id, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default())
}
