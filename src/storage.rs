//! Persistent repository backend using RocksDB
//!
//! Values are JSON documents under prefixed keys. Log rows are keyed by an
//! inverted sequence number so a forward prefix scan yields newest first.

use crate::common::traits::{NewBet, NewTransaction, Repository};
use crate::common::types::{Account, BetRecord, LogQuery, Money, TransactionRecord};
use crate::config::StorageConfig;
use crate::errors::{AccountError, CasinoError, CasinoResult, GameError, StorageError};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const ACCOUNT_PREFIX: &[u8] = b"account:";
const REFERRAL_PREFIX: &[u8] = b"referral:";
const SETTING_PREFIX: &[u8] = b"setting:";
const BET_LOG_PREFIX: &[u8] = b"log:bet:";
const TRANSACTION_LOG_PREFIX: &[u8] = b"log:tx:";
const BET_SEQUENCE_KEY: &[u8] = b"meta:seq:bet";
const TRANSACTION_SEQUENCE_KEY: &[u8] = b"meta:seq:tx";

fn prefixed_key(prefix: &[u8], name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + name.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(name.as_bytes());
    key
}

fn log_key(prefix: &[u8], id: u64) -> Vec<u8> {
    // Sort newest-first by using the inverted id as the key suffix.
    let inv_id = u64::MAX - id;
    let mut key = Vec::with_capacity(prefix.len() + 8);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&inv_id.to_be_bytes());
    key
}

fn parse_u64_le(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_le_bytes(arr))
}

fn encode<T: Serialize>(value: &T, what: &str) -> CasinoResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        StorageError::WriteFailed(format!("Failed to encode {}: {}", what, e)).into()
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> CasinoResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::CorruptedData(format!("Failed to decode {}: {}", what, e)).into()
    })
}

/// Repository stored in a RocksDB database directory
#[derive(Clone)]
pub struct RocksRepository {
    db: Arc<DB>,
    /// Serializes read-modify-write sequences (balance updates, inserts)
    write_lock: Arc<Mutex<()>>,
    next_bet_id: Arc<AtomicU64>,
    next_transaction_id: Arc<AtomicU64>,
}

impl RocksRepository {
    pub fn open<P: AsRef<Path>>(path: P) -> CasinoResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path.as_ref()).map_err(|e| {
            CasinoError::from(StorageError::DatabaseOpenFailed(format!(
                "{}: {}",
                path.as_ref().display(),
                e
            )))
        })?;

        let last_bet = db
            .get(BET_SEQUENCE_KEY)?
            .and_then(|b| parse_u64_le(&b))
            .unwrap_or(0);
        let last_transaction = db
            .get(TRANSACTION_SEQUENCE_KEY)?
            .and_then(|b| parse_u64_le(&b))
            .unwrap_or(0);

        tracing::debug!(
            path = %path.as_ref().display(),
            last_bet,
            last_transaction,
            "Opened RocksDB repository"
        );

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
            next_bet_id: Arc::new(AtomicU64::new(last_bet)),
            next_transaction_id: Arc::new(AtomicU64::new(last_transaction)),
        })
    }

    /// Open the database described by the storage section, wiping it first if requested
    pub fn open_with_config(config: &StorageConfig) -> CasinoResult<Self> {
        if config.clear_on_start {
            let _ = std::fs::remove_dir_all(&config.data_directory);
        }
        Self::open(&config.data_directory)
    }

    fn lock(&self) -> CasinoResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StorageError::WriteFailed("repository lock poisoned".to_string()).into())
    }

    fn get_json<T: DeserializeOwned>(&self, key: &[u8], what: &str) -> CasinoResult<Option<T>> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes, what)?)),
            None => Ok(None),
        }
    }

    /// Forward scan over every key starting with `prefix`
    fn scan_prefix(&self, prefix: &[u8], limit: usize) -> CasinoResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut rows = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) =
                item.map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if !key.starts_with(prefix) || rows.len() >= limit {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }

    fn scan_logs<T: DeserializeOwned>(
        &self,
        prefix: &[u8],
        query: &LogQuery,
        account_of: impl Fn(&T) -> &str,
    ) -> CasinoResult<Vec<T>> {
        let mut matched = Vec::new();
        for (_, value) in self.scan_prefix(prefix, usize::MAX)? {
            let record: T = decode(&value, "log record")?;
            if query.matches(account_of(&record)) {
                matched.push(record);
                if matched.len() >= query.limit {
                    break;
                }
            }
        }
        Ok(matched)
    }

    /// Stage the balance update for `name`; nothing is written until the batch is
    fn stage_balance(&self, batch: &mut WriteBatch, name: &str, delta: Money) -> CasinoResult<Money> {
        let key = prefixed_key(ACCOUNT_PREFIX, name);
        let mut account: Account = self
            .get_json(&key, "account")?
            .ok_or_else(|| AccountError::UnknownAccount(name.to_string()))?;

        let updated = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| StorageError::WriteFailed("balance overflow".to_string()))?;
        if updated.is_negative() {
            return Err(GameError::InsufficientFunds {
                requested: -delta,
                available: account.balance,
            }
            .into());
        }

        account.balance = updated;
        batch.put(&key, encode(&account, "account")?);
        Ok(updated)
    }

    fn stage_bet(&self, batch: &mut WriteBatch, entry: NewBet) -> CasinoResult<BetRecord> {
        let id = self.next_bet_id.load(Ordering::SeqCst) + 1;
        let record = entry.into_record(id);
        batch.put(log_key(BET_LOG_PREFIX, id), encode(&record, "bet record")?);
        batch.put(BET_SEQUENCE_KEY, id.to_le_bytes());
        Ok(record)
    }

    fn stage_transaction(&self, batch: &mut WriteBatch, entry: NewTransaction) -> CasinoResult<TransactionRecord> {
        let id = self.next_transaction_id.load(Ordering::SeqCst) + 1;
        let record = entry.into_record(id);
        batch.put(
            log_key(TRANSACTION_LOG_PREFIX, id),
            encode(&record, "transaction record")?,
        );
        batch.put(TRANSACTION_SEQUENCE_KEY, id.to_le_bytes());
        Ok(record)
    }

    /// Write the batch, then advance the in-memory sequences it consumed
    fn commit(&self, batch: WriteBatch, bet_id: Option<u64>, transaction_id: Option<u64>) -> CasinoResult<()> {
        self.db.write(batch)?;
        if let Some(id) = bet_id {
            self.next_bet_id.store(id, Ordering::SeqCst);
        }
        if let Some(id) = transaction_id {
            self.next_transaction_id.store(id, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Repository for RocksRepository {
    fn insert_account(&self, account: &Account) -> CasinoResult<()> {
        let _guard = self.lock()?;
        let account_key = prefixed_key(ACCOUNT_PREFIX, &account.name);
        let referral_key = prefixed_key(REFERRAL_PREFIX, &account.referral_code);

        if self.db.get(&account_key)?.is_some() {
            return Err(AccountError::DuplicateAccount(account.name.clone()).into());
        }
        if self.db.get(&referral_key)?.is_some() {
            return Err(StorageError::WriteFailed(format!(
                "referral code {} already assigned",
                account.referral_code
            ))
            .into());
        }

        let mut batch = WriteBatch::default();
        batch.put(&account_key, encode(account, "account")?);
        batch.put(&referral_key, account.name.as_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    fn get_account(&self, name: &str) -> CasinoResult<Option<Account>> {
        self.get_json(&prefixed_key(ACCOUNT_PREFIX, name), "account")
    }

    fn find_by_referral_code(&self, code: &str) -> CasinoResult<Option<String>> {
        match self.db.get(prefixed_key(REFERRAL_PREFIX, code))? {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                StorageError::CorruptedData(format!("referral index for {}: {}", code, e)).into()
            }),
            None => Ok(None),
        }
    }

    fn adjust_balance(&self, name: &str, delta: Money) -> CasinoResult<Money> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        let updated = self.stage_balance(&mut batch, name, delta)?;
        self.commit(batch, None, None)?;
        Ok(updated)
    }

    fn delete_account(&self, name: &str) -> CasinoResult<bool> {
        let _guard = self.lock()?;
        let key = prefixed_key(ACCOUNT_PREFIX, name);
        let Some(account) = self.get_json::<Account>(&key, "account")? else {
            return Ok(false);
        };

        let mut batch = WriteBatch::default();
        batch.delete(&key);
        batch.delete(prefixed_key(REFERRAL_PREFIX, &account.referral_code));
        self.db.write(batch)?;
        Ok(true)
    }

    fn list_accounts(&self) -> CasinoResult<Vec<Account>> {
        self.scan_prefix(ACCOUNT_PREFIX, usize::MAX)?
            .into_iter()
            .map(|(_, value)| decode(&value, "account"))
            .collect()
    }

    fn get_setting(&self, name: &str) -> CasinoResult<Option<f64>> {
        self.get_json(&prefixed_key(SETTING_PREFIX, name), "setting")
    }

    fn put_setting(&self, name: &str, value: f64) -> CasinoResult<()> {
        self.db
            .put(prefixed_key(SETTING_PREFIX, name), encode(&value, "setting")?)?;
        Ok(())
    }

    fn append_bet(&self, entry: NewBet) -> CasinoResult<BetRecord> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        let record = self.stage_bet(&mut batch, entry)?;
        self.commit(batch, Some(record.id), None)?;
        Ok(record)
    }

    fn append_transaction(&self, entry: NewTransaction) -> CasinoResult<TransactionRecord> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        let record = self.stage_transaction(&mut batch, entry)?;
        self.commit(batch, None, Some(record.id))?;
        Ok(record)
    }

    fn adjust_with_bet(
        &self,
        name: &str,
        delta: Money,
        entry: NewBet,
    ) -> CasinoResult<(Money, BetRecord)> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        let updated = self.stage_balance(&mut batch, name, delta)?;
        let record = self.stage_bet(&mut batch, entry)?;
        self.commit(batch, Some(record.id), None)?;
        Ok((updated, record))
    }

    fn adjust_with_transaction(
        &self,
        name: &str,
        delta: Money,
        entry: NewTransaction,
    ) -> CasinoResult<(Money, TransactionRecord)> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        let updated = self.stage_balance(&mut batch, name, delta)?;
        let record = self.stage_transaction(&mut batch, entry)?;
        self.commit(batch, None, Some(record.id))?;
        Ok((updated, record))
    }

    fn recent_bets(&self, query: &LogQuery) -> CasinoResult<Vec<BetRecord>> {
        self.scan_logs(BET_LOG_PREFIX, query, |r: &BetRecord| r.account.as_str())
    }

    fn recent_transactions(&self, query: &LogQuery) -> CasinoResult<Vec<TransactionRecord>> {
        self.scan_logs(TRANSACTION_LOG_PREFIX, query, |r: &TransactionRecord| {
            r.account.as_str()
        })
    }
}
