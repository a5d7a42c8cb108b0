//! Connection lifecycle shared by every backend.
//!
//! A connection moves `Uninitialized → SetUp → Open → Closed`; a closed
//! connection may be set up and opened again. At most one transaction is
//! active at a time and nesting is refused.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::cursor::Cursor;
use crate::error::SqlError;
use crate::statement::PreparedStatement;
use crate::types::Backend;

/// Identity of one connection instance, used to tie cursors to their origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    SetUp,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    /// `successful` records whether `set_transaction_successful` was called.
    Active { successful: bool },
}

/// What a connection is asked to open: name, schema version and schema scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSpec {
    pub name: String,
    pub version: i64,
    pub create_ddl: String,
    pub upgrade_ddl: String,
}

impl DatabaseSpec {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: i64,
        create_ddl: impl Into<String>,
        upgrade_ddl: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            create_ddl: create_ddl.into(),
            upgrade_ddl: upgrade_ddl.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SqlError> {
        if self.name.trim().is_empty() {
            return Err(SqlError::ConfigError("database name is empty".into()));
        }
        if self.version < 1 {
            return Err(SqlError::ConfigError(format!(
                "database version must be at least 1, got {}",
                self.version
            )));
        }
        Ok(())
    }
}

/// One open handle to a named database.
///
/// Every method is synchronous and blocks until the engine returns. A single
/// instance must not be shared between threads; open one connection per thread
/// instead.
pub trait Database {
    type Cursor: Cursor;
    type Statement: PreparedStatement<Cursor = Self::Cursor>;

    fn id(&self) -> ConnectionId;

    fn spec(&self) -> &DatabaseSpec;

    fn backend(&self) -> Backend;

    fn state(&self) -> ConnectionState;

    fn transaction_state(&self) -> TransactionState;

    fn in_transaction(&self) -> bool {
        matches!(self.transaction_state(), TransactionState::Active { .. })
    }

    /// Prepare the native driver without touching the database file.
    /// Repeated calls before opening are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ConfigError` for an invalid configuration and
    /// `SqlError::ConnectionError` if the connection is already open or the
    /// driver cannot be prepared.
    fn setup_database(&mut self) -> Result<(), SqlError>;

    /// Open the database file, creating it and running the create script when
    /// it is new, or running the upgrade script when its stored version is
    /// older than requested.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ConnectionError` when the file cannot be opened, the
    /// connection was not set up, or the stored version is newer than requested.
    fn open_or_create_database(&mut self) -> Result<(), SqlError>;

    /// Release the native handle. Outstanding cursors and statements are not
    /// closed; using them afterwards fails.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ConnectionError` if the connection is not open or the
    /// engine refuses to close.
    fn close_database(&mut self) -> Result<(), SqlError>;

    /// Execute one statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ExecutionError` for malformed SQL, constraint
    /// failures or multiple statements, and `SqlError::Busy` on lock contention.
    fn exec_sql(&mut self, sql: &str) -> Result<(), SqlError>;

    /// Run a query and return a cursor over its result.
    ///
    /// # Errors
    ///
    /// See [`Database::exec_sql`].
    fn raw_query(&mut self, sql: &str) -> Result<Self::Cursor, SqlError>;

    /// Run a query into a cursor previously returned by this connection,
    /// discarding its previous rows and resetting its position.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::CursorError` if `cursor` came from a different
    /// connection, otherwise as [`Database::raw_query`].
    fn raw_query_into<'c>(
        &mut self,
        cursor: &'c mut Self::Cursor,
        sql: &str,
    ) -> Result<&'c mut Self::Cursor, SqlError>;

    /// Create a prepared statement. The SQL is compiled on first execution.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ConnectionError` if the connection is not open.
    fn get_prepared_statement(&mut self, sql: &str) -> Result<Self::Statement, SqlError>;

    /// # Errors
    ///
    /// Returns `SqlError::ExecutionError` if a transaction is already active.
    fn begin_transaction(&mut self) -> Result<(), SqlError>;

    /// Mark the active transaction to be committed by `end_transaction`.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ExecutionError` if no transaction is active.
    fn set_transaction_successful(&mut self) -> Result<(), SqlError>;

    /// Commit the active transaction if it was marked successful, otherwise
    /// roll it back.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ExecutionError` if no transaction is active or the
    /// engine fails to finish it; the transaction then stays active.
    fn end_transaction(&mut self) -> Result<(), SqlError>;

    /// Row id of the most recent insert on this connection, or `-1` when there
    /// has been none.
    ///
    /// # Errors
    ///
    /// Returns `SqlError` if the connection is not open or the lookup fails.
    fn get_last_row_id(&mut self) -> Result<i64, SqlError>;
}

/// Lifecycle and transaction bookkeeping embedded in each backend connection.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    pub(crate) id: ConnectionId,
    pub(crate) spec: DatabaseSpec,
    state: ConnectionState,
    tx: TransactionState,
}

impl Lifecycle {
    pub(crate) fn new(spec: DatabaseSpec) -> Self {
        Self {
            id: ConnectionId::next(),
            spec,
            state: ConnectionState::Uninitialized,
            tx: TransactionState::Idle,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn tx(&self) -> TransactionState {
        self.tx
    }

    /// Returns `false` when setup already happened and nothing needs doing.
    pub(crate) fn needs_setup(&self) -> Result<bool, SqlError> {
        match self.state {
            ConnectionState::Uninitialized | ConnectionState::Closed => Ok(true),
            ConnectionState::SetUp => Ok(false),
            ConnectionState::Open => Err(SqlError::ConnectionError(format!(
                "database {} is already open; setup_database must precede open_or_create_database",
                self.spec.name
            ))),
        }
    }

    pub(crate) fn ensure_set_up(&self) -> Result<(), SqlError> {
        match self.state {
            ConnectionState::SetUp => Ok(()),
            ConnectionState::Open => Err(SqlError::ConnectionError(format!(
                "database {} is already open",
                self.spec.name
            ))),
            ConnectionState::Uninitialized | ConnectionState::Closed => {
                Err(SqlError::ConnectionError(format!(
                    "setup_database must be called before opening database {}",
                    self.spec.name
                )))
            }
        }
    }

    pub(crate) fn ensure_open(&self, operation: &str) -> Result<(), SqlError> {
        if self.state == ConnectionState::Open {
            Ok(())
        } else {
            Err(SqlError::ConnectionError(format!(
                "database {} is not open ({operation}; state {:?})",
                self.spec.name, self.state
            )))
        }
    }

    pub(crate) fn mark_set_up(&mut self) {
        self.state = ConnectionState::SetUp;
    }

    pub(crate) fn mark_open(&mut self) {
        self.state = ConnectionState::Open;
        self.tx = TransactionState::Idle;
    }

    pub(crate) fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
        self.tx = TransactionState::Idle;
    }

    pub(crate) fn ensure_can_begin(&self) -> Result<(), SqlError> {
        self.ensure_open("begin transaction")?;
        if let TransactionState::Active { .. } = self.tx {
            return Err(SqlError::ExecutionError(
                "transaction already in progress; nested transactions are not supported".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn mark_begun(&mut self) {
        self.tx = TransactionState::Active { successful: false };
    }

    pub(crate) fn mark_successful(&mut self) -> Result<(), SqlError> {
        self.ensure_open("set transaction successful")?;
        match self.tx {
            TransactionState::Active { .. } => {
                self.tx = TransactionState::Active { successful: true };
                Ok(())
            }
            TransactionState::Idle => Err(SqlError::ExecutionError(
                "set_transaction_successful called with no active transaction".into(),
            )),
        }
    }

    /// Whether the active transaction should commit.
    pub(crate) fn ending(&self) -> Result<bool, SqlError> {
        self.ensure_open("end transaction")?;
        match self.tx {
            TransactionState::Active { successful } => Ok(successful),
            TransactionState::Idle => Err(SqlError::ExecutionError(
                "end_transaction called with no active transaction".into(),
            )),
        }
    }

    pub(crate) fn mark_ended(&mut self) {
        self.tx = TransactionState::Idle;
    }

    /// Transaction state as the engine sees it. A statement that fails inside
    /// a transaction can make the engine roll back on its own, and the engine
    /// is back in autocommit mode afterwards.
    pub(crate) fn observed_tx(&self, engine_autocommit: bool) -> TransactionState {
        match self.tx {
            TransactionState::Active { .. } if engine_autocommit => TransactionState::Idle,
            tx => tx,
        }
    }

    /// Forget a transaction the engine has already ended.
    pub(crate) fn sync_with_engine(&mut self, engine_autocommit: bool) {
        if self.observed_tx(engine_autocommit) != self.tx {
            tracing::warn!(
                database = %self.spec.name,
                "engine ended the active transaction; resetting transaction state"
            );
            self.tx = TransactionState::Idle;
        }
    }
}

/// Native handle shared between a connection and the statements it created.
///
/// Closing the connection empties the slot, so a statement used afterwards
/// gets a connection error instead of touching a freed handle.
#[derive(Debug)]
pub(crate) struct SharedHandle<T>(Arc<Mutex<Option<T>>>);

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> SharedHandle<T> {
    pub(crate) fn empty() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        match self.0.lock() {
            Ok(guard) => guard,
            // A panic while holding the lock leaves the handle itself intact.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn install(&self, handle: T) {
        *self.lock() = Some(handle);
    }

    pub(crate) fn take(&self) -> Option<T> {
        self.lock().take()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    pub(crate) fn with<R>(
        &self,
        func: impl FnOnce(&mut T) -> Result<R, SqlError>,
    ) -> Result<R, SqlError> {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(handle) => func(handle),
            None => Err(SqlError::ConnectionError("database is not open".into())),
        }
    }
}
