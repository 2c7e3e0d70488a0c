//! SQLite-backed forum members with directory change tracking.
//!
//! Every mutation runs inside a [`UnitOfWork`]. The unit classifies each
//! change with [`ChangeTracker`] and collects intents in a [`CommitQueue`];
//! the coalesced batch reaches the [`SyncDispatcher`] only after the
//! transaction committed. A rolled back unit dispatches nothing.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use communaute_core::{ChangeTracker, CommitQueue, SyncDispatcher, UserRepository};
use communaute_domain::{
    CommunauteError, IdentityProvider, NewUser, Result as DomainResult, SyncBatch, User,
    UserChanges, UserFilter,
};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use tokio::task;
use tracing::{debug, instrument};

use super::manager::DbManager;
use crate::errors::{map_join_error, map_storage_error};

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, last_login, \
                            identity_provider, is_active, is_staff, date_joined";

pub struct SqliteUserRepository {
    db: Arc<DbManager>,
    dispatcher: Option<Arc<dyn SyncDispatcher>>,
}

impl SqliteUserRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db, dispatcher: None }
    }

    /// Route committed changes to the directory.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn SyncDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Run `work` in one transaction.
    ///
    /// `Ok` commits and dispatches the collected intents, `Err` rolls back
    /// and dispatches nothing.
    pub async fn atomic<T, F>(&self, work: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut UnitOfWork<'_>) -> DomainResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);

        let (value, batch) = task::spawn_blocking(move || -> DomainResult<(T, SyncBatch)> {
            let mut conn = db.get_connection()?;
            let mut unit = UnitOfWork::begin(&mut conn)?;
            match work(&mut unit) {
                Ok(value) => Ok((value, unit.commit()?)),
                Err(err) => {
                    unit.rollback()?;
                    Err(err)
                }
            }
        })
        .await
        .map_err(map_join_error)??;

        self.dispatch(batch).await;
        Ok(value)
    }

    async fn dispatch(&self, batch: SyncBatch) {
        if batch.is_empty() {
            return;
        }
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.dispatch(batch).await,
            None => debug!(
                upserts = batch.upserts.len(),
                deletes = batch.deletes.len(),
                "no directory dispatcher configured, dropping batch"
            ),
        }
    }

    pub async fn get(&self, id: i64) -> DomainResult<Option<User>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<User>> {
            let conn = db.get_connection()?;
            query_user(&conn, id)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn create(&self, user: NewUser) -> DomainResult<User> {
        self.atomic(move |unit| unit.create(user)).await
    }

    pub async fn save(&self, user: &User) -> DomainResult<()> {
        let user = user.clone();
        self.atomic(move |unit| unit.save(&user)).await
    }

    pub async fn bulk_update(&self, users: Vec<User>) -> DomainResult<usize> {
        self.atomic(move |unit| unit.bulk_update(&users)).await
    }

    pub async fn update_where(
        &self,
        filter: UserFilter,
        changes: UserChanges,
    ) -> DomainResult<usize> {
        self.atomic(move |unit| unit.update_where(&filter, &changes)).await
    }

    pub async fn delete(&self, id: i64) -> DomainResult<bool> {
        self.atomic(move |unit| unit.delete(id)).await
    }

    pub async fn delete_where(&self, filter: UserFilter) -> DomainResult<usize> {
        self.atomic(move |unit| unit.delete_where(&filter)).await
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_ids(&self, ids: &[i64]) -> DomainResult<Vec<User>> {
        let db = Arc::clone(&self.db);
        let filter = UserFilter::Ids(ids.to_vec());

        task::spawn_blocking(move || -> DomainResult<Vec<User>> {
            let conn = db.get_connection()?;
            query_users(&conn, &filter)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let db = Arc::clone(&self.db);
        let email = email.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<User>> {
            let conn = db.get_connection()?;
            let sql =
                format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 ORDER BY id LIMIT 1");
            conn.query_row(&sql, params![email], map_user_row)
                .optional()
                .map_err(map_storage_error)?
                .map(UserRow::into_user)
                .transpose()
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_published(&self) -> DomainResult<Vec<User>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<User>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE is_active = 1 AND is_staff = 0 AND TRIM(email) <> ''
                 ORDER BY id"
            );
            collect_users(&conn, &sql, Vec::new())
        })
        .await
        .map_err(map_join_error)?
    }
}

/// One open transaction plus the directory intents it produced so far.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
    queue: CommitQueue,
}

impl<'conn> UnitOfWork<'conn> {
    fn begin(conn: &'conn mut Connection) -> DomainResult<Self> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_storage_error)?;
        Ok(Self { tx, queue: CommitQueue::new() })
    }

    pub fn get(&self, id: i64) -> DomainResult<Option<User>> {
        query_user(&self.tx, id)
    }

    pub fn create(&mut self, new_user: NewUser) -> DomainResult<User> {
        let date_joined = Utc::now();
        self.tx
            .execute(
                "INSERT INTO users (username, first_name, last_name, email, last_login,
                                    identity_provider, is_active, is_staff, date_joined)
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7, ?8)",
                params![
                    new_user.username,
                    new_user.first_name,
                    new_user.last_name,
                    new_user.email,
                    new_user.identity_provider.as_str(),
                    new_user.is_active,
                    new_user.is_staff,
                    date_joined.to_rfc3339()
                ],
            )
            .map_err(map_storage_error)?;

        let user = new_user.into_user(self.tx.last_insert_rowid(), date_joined);
        if let Some(intent) = ChangeTracker::classify(None, &user) {
            self.queue.push(intent);
        }
        Ok(user)
    }

    pub fn save(&mut self, user: &User) -> DomainResult<()> {
        let before = self.require(user.id)?;
        write_user(&self.tx, user)?;
        if let Some(intent) = ChangeTracker::classify(Some(&before), user) {
            self.queue.push(intent);
        }
        Ok(())
    }

    /// Save several members, classifying them as one bulk operation.
    pub fn bulk_update(&mut self, users: &[User]) -> DomainResult<usize> {
        let mut befores = Vec::with_capacity(users.len());
        for user in users {
            befores.push(self.require(user.id)?);
            write_user(&self.tx, user)?;
        }
        self.queue.extend(ChangeTracker::classify_bulk(befores.iter().zip(users.iter())));
        Ok(users.len())
    }

    /// Apply `changes` to every member matching `filter`.
    pub fn update_where(
        &mut self,
        filter: &UserFilter,
        changes: &UserChanges,
    ) -> DomainResult<usize> {
        let befores = query_users(&self.tx, filter)?;
        let afters: Vec<User> = befores.iter().map(|user| changes.apply(user)).collect();
        for user in &afters {
            write_user(&self.tx, user)?;
        }
        self.queue.extend(ChangeTracker::classify_bulk(befores.iter().zip(afters.iter())));
        Ok(afters.len())
    }

    pub fn delete(&mut self, id: i64) -> DomainResult<bool> {
        let removed = self
            .tx
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .map_err(map_storage_error)?;
        if removed == 0 {
            return Ok(false);
        }
        if let Some(intent) = ChangeTracker::classify_delete([id]) {
            self.queue.push(intent);
        }
        Ok(true)
    }

    pub fn delete_where(&mut self, filter: &UserFilter) -> DomainResult<usize> {
        let ids: Vec<i64> =
            query_users(&self.tx, filter)?.into_iter().map(|user| user.id).collect();
        for id in &ids {
            self.tx
                .execute("DELETE FROM users WHERE id = ?1", params![id])
                .map_err(map_storage_error)?;
        }
        let removed = ids.len();
        if let Some(intent) = ChangeTracker::classify_delete(ids) {
            self.queue.push(intent);
        }
        Ok(removed)
    }

    /// Commit and hand back the coalesced intents.
    pub fn commit(self) -> DomainResult<SyncBatch> {
        self.tx.commit().map_err(map_storage_error)?;
        Ok(self.queue.into_batch())
    }

    /// Roll back, discarding every pending intent.
    pub fn rollback(self) -> DomainResult<()> {
        self.tx.rollback().map_err(map_storage_error)
    }

    fn require(&self, id: i64) -> DomainResult<User> {
        self.get(id)?.ok_or_else(|| CommunauteError::NotFound(format!("user {id}")))
    }
}

// ============================================================================
// Synchronous SQL Operations
// ============================================================================

struct UserRow {
    id: i64,
    username: String,
    first_name: String,
    last_name: String,
    email: String,
    last_login: Option<String>,
    identity_provider: String,
    is_active: bool,
    is_staff: bool,
    date_joined: String,
}

impl UserRow {
    fn into_user(self) -> DomainResult<User> {
        Ok(User {
            id: self.id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            last_login: self.last_login.as_deref().map(parse_timestamp).transpose()?,
            identity_provider: IdentityProvider::from_str(&self.identity_provider)
                .map_err(CommunauteError::Database)?,
            is_active: self.is_active,
            is_staff: self.is_staff,
            date_joined: parse_timestamp(&self.date_joined)?,
        })
    }
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        last_login: row.get(5)?,
        identity_provider: row.get(6)?,
        is_active: row.get(7)?,
        is_staff: row.get(8)?,
        date_joined: row.get(9)?,
    })
}

fn parse_timestamp(value: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CommunauteError::Database(format!("invalid stored timestamp '{value}': {e}")))
}

fn query_user(conn: &Connection, id: i64) -> DomainResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    conn.query_row(&sql, params![id], map_user_row)
        .optional()
        .map_err(map_storage_error)?
        .map(UserRow::into_user)
        .transpose()
}

fn query_users(conn: &Connection, filter: &UserFilter) -> DomainResult<Vec<User>> {
    let (clause, values) = filter_clause(filter);
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause} ORDER BY id");
    collect_users(conn, &sql, values)
}

fn collect_users(conn: &Connection, sql: &str, values: Vec<Value>) -> DomainResult<Vec<User>> {
    let mut stmt = conn.prepare(sql).map_err(map_storage_error)?;
    let rows = stmt.query_map(params_from_iter(values), map_user_row).map_err(map_storage_error)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row.map_err(map_storage_error)?.into_user()?);
    }
    Ok(users)
}

fn filter_clause(filter: &UserFilter) -> (String, Vec<Value>) {
    match filter {
        UserFilter::All => ("1 = 1".to_string(), Vec::new()),
        UserFilter::Ids(ids) if ids.is_empty() => ("0 = 1".to_string(), Vec::new()),
        UserFilter::Ids(ids) => (
            format!("id IN ({})", vec!["?"; ids.len()].join(", ")),
            ids.iter().map(|id| Value::Integer(*id)).collect(),
        ),
        UserFilter::IsActive(active) => {
            ("is_active = ?".to_string(), vec![Value::Integer(i64::from(*active))])
        }
    }
}

fn write_user(conn: &Connection, user: &User) -> DomainResult<()> {
    conn.execute(
        "UPDATE users SET username = ?2, first_name = ?3, last_name = ?4, email = ?5,
                          last_login = ?6, identity_provider = ?7, is_active = ?8, is_staff = ?9
         WHERE id = ?1",
        params![
            user.id,
            user.username,
            user.first_name,
            user.last_name,
            user.email,
            user.last_login.map(|ts| ts.to_rfc3339()),
            user.identity_provider.as_str(),
            user.is_active,
            user.is_staff
        ],
    )
    .map_err(map_storage_error)?;
    Ok(())
}
