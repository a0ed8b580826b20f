//! Connection and transaction handles behind the store.

use async_trait::async_trait;
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction, DbErr,
    TransactionTrait,
};
use std::sync::Arc;
use toggles_core::{IsolationLevel, TransactionOptions};
use toggles_log::debug;

/// Something the store can run statements on: a pooled connection or an
/// open transaction.
#[async_trait]
pub trait StoreHandle: Send + Sync + 'static {
    type Conn: ConnectionTrait + Send + Sync;

    fn connection(&self) -> &Self::Conn;

    /// Open a transaction, or join the one this handle belongs to.
    async fn begin(&self, options: TransactionOptions) -> Result<TransactionHandle, DbErr>;
}

#[async_trait]
impl StoreHandle for DatabaseConnection {
    type Conn = DatabaseConnection;

    fn connection(&self) -> &DatabaseConnection {
        self
    }

    async fn begin(&self, options: TransactionOptions) -> Result<TransactionHandle, DbErr> {
        let backend = self.get_database_backend();
        let (isolation, access) = transaction_config(backend, options);

        debug!(
            target: "toggles::seaorm",
            isolation = format!("{:?}", options.isolation);
            "Starting database transaction"
        );
        let txn = self.begin_with_config(isolation, access).await?;

        Ok(TransactionHandle {
            txn: Arc::new(txn),
            owner: true,
        })
    }
}

/// SQLite has no per-transaction isolation or access mode; it is left to the
/// database defaults there.
fn transaction_config(
    backend: DatabaseBackend,
    options: TransactionOptions,
) -> (Option<sea_orm::IsolationLevel>, Option<AccessMode>) {
    if backend == DatabaseBackend::Sqlite {
        return (None, None);
    }

    let isolation = match options.isolation {
        IsolationLevel::Default => None,
        IsolationLevel::ReadUncommitted => Some(sea_orm::IsolationLevel::ReadUncommitted),
        IsolationLevel::ReadCommitted => Some(sea_orm::IsolationLevel::ReadCommitted),
        IsolationLevel::RepeatableRead => Some(sea_orm::IsolationLevel::RepeatableRead),
        IsolationLevel::Serializable => Some(sea_orm::IsolationLevel::Serializable),
    };
    let access = options.read_only.then_some(AccessMode::ReadOnly);

    (isolation, access)
}

/// A shared open transaction.
///
/// Only the handle that began the transaction (`owner`) can commit or roll it
/// back. Joined handles share the same database transaction.
#[derive(Clone)]
pub struct TransactionHandle {
    txn: Arc<DatabaseTransaction>,
    owner: bool,
}

impl TransactionHandle {
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    pub(crate) async fn finish(self, commit: bool) -> Result<(), DbErr> {
        if !self.owner {
            return Ok(());
        }

        let txn = Arc::try_unwrap(self.txn).map_err(|_| {
            DbErr::Custom("transaction is still in use by a joined handle".into())
        })?;

        if commit {
            txn.commit().await?;
            debug!(target: "toggles::seaorm", "Committed transaction");
        } else {
            txn.rollback().await?;
            debug!(target: "toggles::seaorm", "Rolled back transaction");
        }
        Ok(())
    }
}

#[async_trait]
impl StoreHandle for TransactionHandle {
    type Conn = DatabaseTransaction;

    fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    async fn begin(&self, _options: TransactionOptions) -> Result<TransactionHandle, DbErr> {
        Ok(TransactionHandle {
            txn: Arc::clone(&self.txn),
            owner: false,
        })
    }
}
