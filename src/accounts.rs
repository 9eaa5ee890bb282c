//! Player registration, authentication and profiles

use crate::common::traits::Repository;
use crate::common::types::{current_timestamp, Account, Money, TransactionKind};
use crate::config::AccountsConfig;
use crate::errors::{AccountError, CasinoResult};
use crate::ledger::Ledger;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CODE_ATTEMPTS: usize = 32;

/// Hex SHA-256 digest of a password
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// What happened to the referral code given at registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReferralOutcome {
    NotProvided,
    /// The code's owner received the bonus
    Credited { referrer: String, bonus: Money },
    /// No account owns the code; registration went ahead without a bonus
    Unknown { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub balance: Money,
    pub referral_code: String,
    pub referral: ReferralOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub balance: Money,
    pub referral_code: String,
}

pub struct AccountService {
    repo: Arc<dyn Repository>,
    ledger: Arc<Ledger>,
    config: AccountsConfig,
}

impl AccountService {
    pub fn new(ledger: Arc<Ledger>, config: AccountsConfig) -> Self {
        Self {
            repo: Arc::clone(ledger.repository()),
            ledger,
            config,
        }
    }

    /// Create an account, fund it and pay any referral bonus
    pub fn register(
        &self,
        name: &str,
        password: &str,
        referral_code: Option<&str>,
    ) -> CasinoResult<Registration> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AccountError::InvalidInput("account name is empty".to_string()).into());
        }
        if password.is_empty() {
            return Err(AccountError::InvalidInput("password is empty".to_string()).into());
        }
        if self.repo.get_account(name)?.is_some() {
            return Err(AccountError::DuplicateAccount(name.to_string()).into());
        }

        let account = Account {
            name: name.to_string(),
            password_hash: hash_password(password),
            balance: Money::ZERO,
            referral_code: self.fresh_referral_code()?,
            created_at: current_timestamp(),
        };
        self.repo.insert_account(&account)?;

        let mut balance = Money::ZERO;
        if self.config.initial_balance.is_positive() {
            balance = self
                .ledger
                .deposit(name, TransactionKind::InitialDeposit, self.config.initial_balance)?;
        }

        let referral = match referral_code.map(str::trim).filter(|c| !c.is_empty()) {
            None => ReferralOutcome::NotProvided,
            Some(code) => self.pay_referral(code)?,
        };

        tracing::info!(account = name, %balance, referral_code = %account.referral_code, "Account registered");
        Ok(Registration {
            name: account.name,
            balance,
            referral_code: account.referral_code,
            referral,
        })
    }

    fn pay_referral(&self, code: &str) -> CasinoResult<ReferralOutcome> {
        let code = code.to_ascii_uppercase();
        match self.repo.find_by_referral_code(&code)? {
            Some(referrer) => {
                let bonus = self.config.referral_bonus;
                if bonus.is_positive() {
                    self.ledger
                        .deposit(&referrer, TransactionKind::ReferralBonus, bonus)?;
                }
                Ok(ReferralOutcome::Credited { referrer, bonus })
            }
            None => {
                tracing::warn!(code = %code, "{}", AccountError::UnknownReferralCode(code.clone()));
                Ok(ReferralOutcome::Unknown { code })
            }
        }
    }

    fn fresh_referral_code(&self) -> CasinoResult<String> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code: String = (0..self.config.referral_code_length)
                .map(|_| REFERRAL_ALPHABET[rng.gen_range(0..REFERRAL_ALPHABET.len())] as char)
                .collect();
            if self.repo.find_by_referral_code(&code)?.is_none() {
                return Ok(code);
            }
        }
        Err(AccountError::InvalidInput("could not allocate a unique referral code".to_string()).into())
    }

    pub fn authenticate(&self, name: &str, password: &str) -> CasinoResult<bool> {
        Ok(self
            .repo
            .get_account(name)?
            .map(|account| account.password_hash == hash_password(password))
            .unwrap_or(false))
    }

    /// Player top-up of fictional currency
    pub fn deposit(&self, name: &str, amount: Money) -> CasinoResult<Money> {
        self.ledger.deposit(name, TransactionKind::Deposit, amount)
    }

    pub fn profile(&self, name: &str) -> CasinoResult<Profile> {
        let account = self
            .repo
            .get_account(name)?
            .ok_or_else(|| AccountError::UnknownAccount(name.to_string()))?;
        Ok(Profile {
            name: account.name,
            balance: account.balance,
            referral_code: account.referral_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::LogQuery;
    use crate::errors::CasinoError;
    use crate::memory_store::MemoryRepository;

    fn service() -> AccountService {
        let repo = Arc::new(MemoryRepository::new());
        AccountService::new(Arc::new(Ledger::new(repo)), AccountsConfig::default())
    }

    #[test]
    fn test_hash_password_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_register_funds_account_and_logs_deposit() {
        let service = service();
        let reg = service.register("ana", "pw", None).unwrap();
        assert_eq!(reg.balance, Money::from_units(1000));
        assert_eq!(reg.referral, ReferralOutcome::NotProvided);
        assert_eq!(reg.referral_code.len(), 6);
        assert!(reg.referral_code.bytes().all(|b| REFERRAL_ALPHABET.contains(&b)));

        let logs = service.repo.recent_transactions(&LogQuery::recent(10)).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, TransactionKind::InitialDeposit);
        assert_eq!(logs[0].amount, Money::from_units(1000));
    }

    #[test]
    fn test_duplicate_and_blank_registrations_rejected() {
        let service = service();
        service.register("ana", "pw", None).unwrap();

        assert!(matches!(
            service.register("ana", "other", None),
            Err(CasinoError::Account(AccountError::DuplicateAccount(_)))
        ));
        assert!(matches!(
            service.register("  ", "pw", None),
            Err(CasinoError::Account(AccountError::InvalidInput(_)))
        ));
        assert!(service.register("bob", "", None).is_err());
    }

    #[test]
    fn test_referral_bonus_goes_to_referrer() {
        let service = service();
        let ana = service.register("ana", "pw", None).unwrap();

        let bob = service
            .register("bob", "pw", Some(&ana.referral_code.to_lowercase()))
            .unwrap();
        assert_eq!(
            bob.referral,
            ReferralOutcome::Credited {
                referrer: "ana".to_string(),
                bonus: Money::from_units(200),
            }
        );
        assert_eq!(service.profile("ana").unwrap().balance, Money::from_units(1200));
        assert_eq!(service.profile("bob").unwrap().balance, Money::from_units(1000));

        let bonus = service
            .repo
            .recent_transactions(&LogQuery::for_account("ana", 10))
            .unwrap();
        assert_eq!(bonus[0].kind, TransactionKind::ReferralBonus);
    }

    #[test]
    fn test_unknown_referral_is_not_fatal() {
        let service = service();
        let reg = service.register("ana", "pw", Some("ZZZZZZ")).unwrap();
        assert_eq!(
            reg.referral,
            ReferralOutcome::Unknown {
                code: "ZZZZZZ".to_string()
            }
        );
        assert_eq!(reg.balance, Money::from_units(1000));
    }

    #[test]
    fn test_authenticate_and_deposit() {
        let service = service();
        service.register("ana", "secret", None).unwrap();

        assert!(service.authenticate("ana", "secret").unwrap());
        assert!(!service.authenticate("ana", "wrong").unwrap());
        assert!(!service.authenticate("nobody", "secret").unwrap());

        let balance = service.deposit("ana", Money::from_units(50)).unwrap();
        assert_eq!(balance, Money::from_units(1050));
        assert!(service.deposit("ana", Money::ZERO).is_err());
    }
}
