//! # ChanCast DB
//!
//! SQLite persistence — accounts, channels, account↔channel bindings, batch
//! tasks, schedules, and media assets. WAL mode, one connection behind a
//! mutex; the mutex is never held across an await point.
//!
//! Task progress is updated with single-statement atomic SQL (counter
//! increment + log append in one UPDATE) so concurrent workers touching the
//! same task row cannot lose updates, and the COMPLETED flip is guarded so it
//! happens exactly once.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use chancast_core::types::{ChannelRole, MediaKind, ScheduleKind, ScheduleStatus, TaskKind, TaskStatus};
use chancast_core::{ChanCastError, Result};

/// Registered messaging account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub tid: i64,
    pub username: String,
    pub phone: String,
    pub session_name: String,
    pub authenticated: bool,
    pub online: bool,
    pub created_at: String,
}

/// Known broadcast channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub user_id: i64,
    pub tid: i64,
    pub title: String,
    pub username: Option<String>,
    pub lang: String,
    /// Comma-joined in storage; split on read.
    pub primary_links: Vec<String>,
    pub created_at: String,
}

/// Batch task row. `logs` is append-only, newline-joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub kind: TaskKind,
    pub args: serde_json::Value,
    pub status: TaskStatus,
    pub total: i64,
    pub success: i64,
    pub failure: i64,
    pub logs: String,
    pub created_at: String,
}

/// Recurring schedule row. Hour/minute/second are the daily UTC fire time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub kind: ScheduleKind,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub args: serde_json::Value,
    pub status: ScheduleStatus,
    pub created_at: String,
}

/// Everything a publish job needs to address one channel through its account.
#[derive(Debug, Clone)]
pub struct PublishBinding {
    pub channel_id: i64,
    pub channel_tid: i64,
    pub lang: String,
    pub primary_links: Vec<String>,
    pub session_name: String,
    pub account_user_id: i64,
}

/// Session + access token for admin mutations on one channel.
#[derive(Debug, Clone)]
pub struct MutationBinding {
    pub channel_tid: i64,
    pub access_hash: i64,
    pub session_name: String,
}

fn db_err(e: rusqlite::Error) -> ChanCastError {
    ChanCastError::Database(e.to_string())
}

const ACCOUNT_SELECT: &str = "SELECT id, user_id, tid, username, phone, session_name, authenticated, online, created_at FROM accounts";
const CHANNEL_SELECT: &str =
    "SELECT id, user_id, tid, title, username, lang, primary_links, created_at FROM channels";
const TASK_SELECT: &str = "SELECT id, user_id, title, kind, args, status, total, success, failure, logs, created_at FROM tasks";
const SCHEDULE_SELECT: &str = "SELECT id, user_id, title, kind, hour, minute, second, args, status, created_at FROM schedules";

fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        tid: row.get(2)?,
        username: row.get(3)?,
        phone: row.get(4)?,
        session_name: row.get(5)?,
        authenticated: row.get::<_, i64>(6)? != 0,
        online: row.get::<_, i64>(7)? != 0,
        created_at: row.get(8)?,
    })
}

fn row_to_channel(row: &rusqlite::Row) -> rusqlite::Result<Channel> {
    let links: String = row.get(6)?;
    Ok(Channel {
        id: row.get(0)?,
        user_id: row.get(1)?,
        tid: row.get(2)?,
        title: row.get(3)?,
        username: row.get(4)?,
        lang: row.get(5)?,
        primary_links: split_links(&links),
        created_at: row.get(7)?,
    })
}

fn split_links(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn join_links(links: &[String]) -> String {
    links.join(",")
}

/// ChanCast database.
pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(db_err)?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ChanCastError::Database(format!("connection lock poisoned: {e}")))
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                tid INTEGER NOT NULL DEFAULT 0,
                username TEXT UNIQUE NOT NULL,
                phone TEXT UNIQUE NOT NULL,
                session_name TEXT UNIQUE NOT NULL,
                authenticated INTEGER NOT NULL DEFAULT 0,
                online INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS channels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                tid INTEGER UNIQUE NOT NULL,
                title TEXT NOT NULL,
                username TEXT,
                lang TEXT NOT NULL DEFAULT 'en',
                primary_links TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS account_channels (
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                channel_id INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
                access_hash INTEGER NOT NULL DEFAULT 0,
                role TEXT NOT NULL DEFAULT 'admin',
                PRIMARY KEY (account_id, channel_id)
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                args TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'pending',
                total INTEGER NOT NULL,
                success INTEGER NOT NULL DEFAULT 0,
                failure INTEGER NOT NULL DEFAULT 0,
                logs TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS schedules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                hour INTEGER NOT NULL,
                minute INTEGER NOT NULL,
                second INTEGER NOT NULL,
                args TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS media (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                path TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )
        .map_err(db_err)?;
        Ok(())
    }

    // ─── Accounts ─────────────────────────────────────────────

    /// Register an account. The phone doubles as the session key.
    pub fn create_account(
        &self,
        user_id: i64,
        tid: i64,
        username: &str,
        phone: &str,
    ) -> Result<Account> {
        let conn = self.lock()?;
        let existing: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM accounts WHERE phone = ?1 OR username = ?2",
                params![phone, username],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        if existing > 0 {
            return Err(ChanCastError::AlreadyExists(format!(
                "account {username} / {phone}"
            )));
        }

        conn.execute(
            "INSERT INTO accounts (user_id, tid, username, phone, session_name) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, tid, username, phone, phone],
        )
        .map_err(db_err)?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_account(id)
    }

    pub fn get_account(&self, id: i64) -> Result<Account> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("{ACCOUNT_SELECT} WHERE id = ?1"),
            params![id],
            row_to_account,
        )
        .map_err(|_| ChanCastError::NotFound(format!("account {id}")))
    }

    pub fn get_account_by_session(&self, session_name: &str) -> Result<Account> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("{ACCOUNT_SELECT} WHERE session_name = ?1"),
            params![session_name],
            row_to_account,
        )
        .map_err(|_| ChanCastError::NotFound(format!("account session {session_name}")))
    }

    pub fn list_accounts(&self, user_id: i64) -> Result<Vec<Account>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{ACCOUNT_SELECT} WHERE user_id = ?1 ORDER BY id"))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id], row_to_account)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    pub fn list_authenticated_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{ACCOUNT_SELECT} WHERE authenticated = 1 ORDER BY id"))
            .map_err(db_err)?;
        let rows = stmt.query_map([], row_to_account).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    pub fn list_online_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{ACCOUNT_SELECT} WHERE online = 1 ORDER BY id"))
            .map_err(db_err)?;
        let rows = stmt.query_map([], row_to_account).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    pub fn set_account_online(&self, id: i64, online: bool) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE accounts SET online = ?2 WHERE id = ?1",
            params![id, online as i64],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn set_account_authenticated(&self, id: i64, authenticated: bool) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE accounts SET authenticated = ?2 WHERE id = ?1",
            params![id, authenticated as i64],
        )
        .map_err(db_err)?;
        Ok(())
    }

    // ─── Channels & bindings ──────────────────────────────────

    /// Insert a channel freshly created by a worker.
    pub fn insert_channel(&self, user_id: i64, tid: i64, title: &str) -> Result<Channel> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO channels (user_id, tid, title) VALUES (?1, ?2, ?3)",
            params![user_id, tid, title],
        )
        .map_err(db_err)?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("{CHANNEL_SELECT} WHERE id = ?1"),
            params![id],
            row_to_channel,
        )
        .map_err(db_err)
    }

    /// Create-or-update a channel by its remote id.
    ///
    /// Returns the row and whether it was newly created — channel sync binds
    /// the discovering account only on first sight.
    pub fn upsert_channel_by_tid(
        &self,
        user_id: i64,
        tid: i64,
        title: &str,
        username: Option<&str>,
    ) -> Result<(Channel, bool)> {
        let conn = self.lock()?;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM channels WHERE tid = ?1",
                params![tid],
                |row| row.get(0),
            )
            .ok();

        let (id, created) = match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE channels SET title = ?2, username = COALESCE(?3, username) WHERE id = ?1",
                    params![id, title, username],
                )
                .map_err(db_err)?;
                (id, false)
            }
            None => {
                conn.execute(
                    "INSERT INTO channels (user_id, tid, title, username) VALUES (?1, ?2, ?3, ?4)",
                    params![user_id, tid, title, username],
                )
                .map_err(db_err)?;
                (conn.last_insert_rowid(), true)
            }
        };

        let channel = conn
            .query_row(
                &format!("{CHANNEL_SELECT} WHERE id = ?1"),
                params![id],
                row_to_channel,
            )
            .map_err(db_err)?;
        Ok((channel, created))
    }

    pub fn get_channel(&self, id: i64, user_id: i64) -> Result<Channel> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("{CHANNEL_SELECT} WHERE id = ?1 AND user_id = ?2"),
            params![id, user_id],
            row_to_channel,
        )
        .map_err(|_| ChanCastError::NotFound(format!("channel {id}")))
    }

    pub fn list_channels(&self, user_id: i64) -> Result<Vec<Channel>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{CHANNEL_SELECT} WHERE user_id = ?1 ORDER BY id"))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id], row_to_channel)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    pub fn set_channel_links(&self, id: i64, lang: &str, primary_links: &[String]) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE channels SET lang = ?2, primary_links = ?3 WHERE id = ?1",
            params![id, lang, join_links(primary_links)],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn bind_account_channel(
        &self,
        account_id: i64,
        channel_id: i64,
        access_hash: i64,
        role: ChannelRole,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO account_channels (account_id, channel_id, access_hash, role)
             VALUES (?1, ?2, ?3, ?4)",
            params![account_id, channel_id, access_hash, role.as_str()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// How many channels an account is bound to — the creation-ceiling input.
    pub fn count_channels_for_account(&self, account_id: i64) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM account_channels WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count as usize)
    }

    /// Binding data for admin mutations (set username/photo/description).
    pub fn mutation_binding(&self, channel_id: i64) -> Result<MutationBinding> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT c.tid, ac.access_hash, a.session_name
             FROM account_channels ac
             JOIN channels c ON c.id = ac.channel_id
             JOIN accounts a ON a.id = ac.account_id
             WHERE ac.channel_id = ?1
             ORDER BY ac.account_id LIMIT 1",
            params![channel_id],
            |row| {
                Ok(MutationBinding {
                    channel_tid: row.get(0)?,
                    access_hash: row.get(1)?,
                    session_name: row.get(2)?,
                })
            },
        )
        .map_err(|_| ChanCastError::NotFound(format!("binding for channel {channel_id}")))
    }

    /// Binding data for publish jobs (channel metadata + owning session).
    pub fn publish_binding(&self, channel_id: i64) -> Result<PublishBinding> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT c.id, c.tid, c.lang, c.primary_links, a.session_name, a.user_id
             FROM account_channels ac
             JOIN channels c ON c.id = ac.channel_id
             JOIN accounts a ON a.id = ac.account_id
             WHERE ac.channel_id = ?1
             ORDER BY ac.account_id LIMIT 1",
            params![channel_id],
            |row| {
                let links: String = row.get(3)?;
                Ok(PublishBinding {
                    channel_id: row.get(0)?,
                    channel_tid: row.get(1)?,
                    lang: row.get(2)?,
                    primary_links: split_links(&links),
                    session_name: row.get(4)?,
                    account_user_id: row.get(5)?,
                })
            },
        )
        .map_err(|_| ChanCastError::NotFound(format!("binding for channel {channel_id}")))
    }

    // ─── Tasks ────────────────────────────────────────────────

    pub fn create_task(
        &self,
        user_id: i64,
        title: &str,
        kind: TaskKind,
        args: &serde_json::Value,
        total: i64,
    ) -> Result<TaskRecord> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (user_id, title, kind, args, total) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, title, kind.as_str(), args.to_string(), total],
        )
        .map_err(db_err)?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_task(id)
    }

    pub fn get_task(&self, id: i64) -> Result<TaskRecord> {
        let conn = self.lock()?;
        conn.query_row(&format!("{TASK_SELECT} WHERE id = ?1"), params![id], |row| {
            Self::row_to_task(row)
        })
        .map_err(|_| ChanCastError::NotFound(format!("task {id}")))
    }

    /// Owner-scoped lookup; a foreign task reads as missing.
    pub fn get_task_scoped(&self, id: i64, user_id: i64) -> Result<TaskRecord> {
        let task = self.get_task(id)?;
        if task.user_id != user_id {
            return Err(ChanCastError::NotFound(format!("task {id}")));
        }
        Ok(task)
    }

    pub fn list_tasks(&self, user_id: i64) -> Result<Vec<TaskRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{TASK_SELECT} WHERE user_id = ?1 ORDER BY id DESC"))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| Self::row_to_task(row))
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<TaskRecord> {
        let kind_raw: String = row.get(3)?;
        let args_raw: String = row.get(4)?;
        let status_raw: String = row.get(5)?;
        Ok(TaskRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            kind: TaskKind::parse(&kind_raw).unwrap_or(TaskKind::CreateChannel),
            args: serde_json::from_str(&args_raw).unwrap_or_default(),
            status: TaskStatus::parse(&status_raw).unwrap_or(TaskStatus::Pending),
            total: row.get(6)?,
            success: row.get(7)?,
            failure: row.get(8)?,
            logs: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    /// PENDING → RUNNING. Fails with `DuplicateRunning` if already RUNNING.
    pub fn mark_task_running(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        let status: String = conn
            .query_row(
                "SELECT status FROM tasks WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map_err(|_| ChanCastError::NotFound(format!("task {id}")))?;
        if TaskStatus::parse(&status)? == TaskStatus::Running {
            return Err(ChanCastError::DuplicateRunning(id));
        }
        conn.execute(
            "UPDATE tasks SET status = 'running', success = 0, failure = 0, logs = '' WHERE id = ?1",
            params![id],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Delete a task; rejected while RUNNING.
    pub fn delete_task(&self, id: i64, user_id: i64) -> Result<()> {
        let task = self.get_task_scoped(id, user_id)?;
        if task.status == TaskStatus::Running {
            return Err(ChanCastError::DuplicateRunning(id));
        }
        let conn = self.lock()?;
        conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .map_err(db_err)?;
        Ok(())
    }

    /// Atomic success increment + log append, one statement.
    pub fn record_task_success(&self, id: i64, line: &str) -> Result<()> {
        self.record_task_outcome(id, "success", line)
    }

    /// Atomic failure increment + log append, one statement.
    pub fn record_task_failure(&self, id: i64, line: &str) -> Result<()> {
        self.record_task_outcome(id, "failure", line)
    }

    fn record_task_outcome(&self, id: i64, counter: &str, line: &str) -> Result<()> {
        let conn = self.lock()?;
        let sql = format!(
            "UPDATE tasks SET {counter} = {counter} + 1,
                 logs = CASE WHEN logs = '' THEN ?2 ELSE logs || char(10) || ?2 END
             WHERE id = ?1"
        );
        let changed = conn.execute(&sql, params![id, line]).map_err(db_err)?;
        if changed == 0 {
            return Err(ChanCastError::NotFound(format!("task {id}")));
        }
        Ok(())
    }

    /// Flip RUNNING → COMPLETED when every item is accounted for.
    ///
    /// Guarded in SQL, so redundant calls and concurrent workers racing on
    /// the last item are both no-ops after the first flip. Returns whether
    /// this call performed the flip.
    pub fn finish_task_if_complete(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE tasks SET status = 'completed'
                 WHERE id = ?1 AND status = 'running' AND success + failure >= total",
                params![id],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Startup reconciliation: queue contents died with the old process, so
    /// anything still RUNNING can no longer finish.
    pub fn fail_running_tasks(&self) -> Result<usize> {
        let conn = self.lock()?;
        let changed = conn
            .execute("UPDATE tasks SET status = 'failed' WHERE status = 'running'", [])
            .map_err(db_err)?;
        Ok(changed)
    }

    // ─── Schedules ────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn create_schedule(
        &self,
        user_id: i64,
        title: &str,
        kind: ScheduleKind,
        hour: u32,
        minute: u32,
        second: u32,
        args: &serde_json::Value,
    ) -> Result<ScheduleRecord> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO schedules (user_id, title, kind, hour, minute, second, args)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![user_id, title, kind.as_str(), hour, minute, second, args.to_string()],
        )
        .map_err(db_err)?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_schedule(id, user_id)
    }

    pub fn get_schedule(&self, id: i64, user_id: i64) -> Result<ScheduleRecord> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("{SCHEDULE_SELECT} WHERE id = ?1 AND user_id = ?2"),
            params![id, user_id],
            |row| Self::row_to_schedule(row),
        )
        .map_err(|_| ChanCastError::NotFound(format!("schedule {id}")))
    }

    pub fn list_schedules(&self, user_id: i64) -> Result<Vec<ScheduleRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SCHEDULE_SELECT} WHERE user_id = ?1 ORDER BY id"))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| Self::row_to_schedule(row))
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    pub fn all_schedules(&self) -> Result<Vec<ScheduleRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SCHEDULE_SELECT} ORDER BY id"))
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Self::row_to_schedule(row))
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn row_to_schedule(row: &rusqlite::Row) -> rusqlite::Result<ScheduleRecord> {
        let kind_raw: String = row.get(3)?;
        let args_raw: String = row.get(7)?;
        let status_raw: String = row.get(8)?;
        Ok(ScheduleRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            kind: ScheduleKind::parse(&kind_raw).unwrap_or(ScheduleKind::PublishMessage),
            hour: row.get(4)?,
            minute: row.get(5)?,
            second: row.get(6)?,
            args: serde_json::from_str(&args_raw).unwrap_or_default(),
            status: ScheduleStatus::parse(&status_raw).unwrap_or(ScheduleStatus::Pending),
            created_at: row.get(9)?,
        })
    }

    pub fn set_schedule_status(&self, id: i64, status: ScheduleStatus) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE schedules SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn delete_schedule(&self, id: i64, user_id: i64) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "DELETE FROM schedules WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(ChanCastError::NotFound(format!("schedule {id}")));
        }
        Ok(())
    }

    // ─── Media ────────────────────────────────────────────────

    pub fn add_media(&self, user_id: i64, kind: MediaKind, path: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO media (user_id, kind, path) VALUES (?1, ?2, ?3)",
            params![user_id, kind.as_str(), path],
        )
        .map_err(db_err)?;
        Ok(conn.last_insert_rowid())
    }

    /// Pick one stored asset at random for a publish job.
    pub fn random_media_path(&self, user_id: i64, kind: MediaKind) -> Result<Option<String>> {
        let conn = self.lock()?;
        let path = conn
            .query_row(
                "SELECT path FROM media WHERE user_id = ?1 AND kind = ?2 ORDER BY RANDOM() LIMIT 1",
                params![user_id, kind.as_str()],
                |row| row.get(0),
            )
            .ok();
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Db {
        Db::open_in_memory().unwrap()
    }

    #[test]
    fn account_create_and_duplicate() {
        let db = db();
        let account = db.create_account(1, 100, "alice", "+15550001").unwrap();
        assert_eq!(account.session_name, "+15550001");
        assert!(!account.online);

        let err = db.create_account(1, 101, "alice", "+15550002").unwrap_err();
        assert!(matches!(err, ChanCastError::AlreadyExists(_)));
    }

    #[test]
    fn online_flags_round_trip() {
        let db = db();
        let account = db.create_account(1, 100, "alice", "+15550001").unwrap();
        db.set_account_authenticated(account.id, true).unwrap();
        db.set_account_online(account.id, true).unwrap();

        assert_eq!(db.list_authenticated_accounts().unwrap().len(), 1);
        assert_eq!(db.list_online_accounts().unwrap().len(), 1);

        db.set_account_online(account.id, false).unwrap();
        assert!(db.list_online_accounts().unwrap().is_empty());
    }

    #[test]
    fn task_progress_accounting() {
        let db = db();
        let task = db
            .create_task(1, "rename batch", TaskKind::SetUsername, &serde_json::json!({}), 3)
            .unwrap();
        db.mark_task_running(task.id).unwrap();

        db.record_task_success(task.id, "item 1 ok").unwrap();
        assert!(!db.finish_task_if_complete(task.id).unwrap());
        db.record_task_success(task.id, "item 2 ok").unwrap();
        assert!(!db.finish_task_if_complete(task.id).unwrap());
        db.record_task_failure(task.id, "item 3 rejected").unwrap();
        assert!(db.finish_task_if_complete(task.id).unwrap());
        // Redundant completion checks are no-ops.
        assert!(!db.finish_task_if_complete(task.id).unwrap());

        let task = db.get_task(task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.success, 2);
        assert_eq!(task.failure, 1);
        assert!(task.success + task.failure <= task.total);
        assert_eq!(task.logs.lines().count(), 3);
    }

    #[test]
    fn duplicate_running_and_delete_guard() {
        let db = db();
        let task = db
            .create_task(1, "batch", TaskKind::CreateChannel, &serde_json::json!({}), 1)
            .unwrap();
        db.mark_task_running(task.id).unwrap();
        assert!(matches!(
            db.mark_task_running(task.id),
            Err(ChanCastError::DuplicateRunning(_))
        ));
        assert!(matches!(
            db.delete_task(task.id, 1),
            Err(ChanCastError::DuplicateRunning(_))
        ));
    }

    #[test]
    fn fail_running_tasks_on_startup() {
        let db = db();
        let task = db
            .create_task(1, "batch", TaskKind::SetPhoto, &serde_json::json!({}), 2)
            .unwrap();
        db.mark_task_running(task.id).unwrap();
        assert_eq!(db.fail_running_tasks().unwrap(), 1);
        assert_eq!(db.get_task(task.id).unwrap().status, TaskStatus::Failed);
    }

    #[test]
    fn bindings_resolve_session_and_access_hash() {
        let db = db();
        let account = db.create_account(1, 100, "alice", "+15550001").unwrap();
        let channel = db.insert_channel(1, 777, "My Channel").unwrap();
        db.set_channel_links(channel.id, "en", &["https://example.com/ref".into()])
            .unwrap();
        db.bind_account_channel(account.id, channel.id, 987654, ChannelRole::Owner)
            .unwrap();

        let binding = db.mutation_binding(channel.id).unwrap();
        assert_eq!(binding.channel_tid, 777);
        assert_eq!(binding.access_hash, 987654);
        assert_eq!(binding.session_name, "+15550001");

        let publish = db.publish_binding(channel.id).unwrap();
        assert_eq!(publish.primary_links, vec!["https://example.com/ref"]);
        assert_eq!(publish.account_user_id, 1);

        assert_eq!(db.count_channels_for_account(account.id).unwrap(), 1);
        assert!(matches!(
            db.mutation_binding(channel.id + 1),
            Err(ChanCastError::NotFound(_))
        ));
    }

    #[test]
    fn schedule_round_trip_and_ownership() {
        let db = db();
        let schedule = db
            .create_schedule(
                1,
                "daily posts",
                ScheduleKind::PublishMessage,
                9,
                0,
                0,
                &serde_json::json!({"channel_ids": [1, 2]}),
            )
            .unwrap();
        assert_eq!(schedule.status, ScheduleStatus::Pending);

        // Another owner cannot see or delete it.
        assert!(matches!(
            db.get_schedule(schedule.id, 2),
            Err(ChanCastError::NotFound(_))
        ));
        assert!(matches!(
            db.delete_schedule(schedule.id, 2),
            Err(ChanCastError::NotFound(_))
        ));

        db.set_schedule_status(schedule.id, ScheduleStatus::Running)
            .unwrap();
        assert_eq!(
            db.get_schedule(schedule.id, 1).unwrap().status,
            ScheduleStatus::Running
        );
        db.delete_schedule(schedule.id, 1).unwrap();
        assert!(db.list_schedules(1).unwrap().is_empty());
    }

    #[test]
    fn random_media_only_matches_kind_and_owner() {
        let db = db();
        db.add_media(1, MediaKind::Image, "/m/a.jpg").unwrap();
        db.add_media(2, MediaKind::Image, "/m/b.jpg").unwrap();

        let path = db.random_media_path(1, MediaKind::Image).unwrap();
        assert_eq!(path.as_deref(), Some("/m/a.jpg"));
        assert!(db.random_media_path(1, MediaKind::Video).unwrap().is_none());
    }
}
