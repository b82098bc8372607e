mod ledger;
mod method;
mod purchase;

use anyhow::Result;
use credits::{CreditStorage, NewPurchase, PaymentMethod, Purchase, PurchaseStatus, Settlement};
use rand::Rng;
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Postgres-backed implementation of the credit core's storage contract.
pub struct Storage {
    pub db: PgPool,
}

impl CreditStorage for Storage {
    async fn payment_method(&self, user: i32, method: i32) -> Result<Option<PaymentMethod>> {
        Ok(method::get(method, user, &self.db).await?)
    }

    async fn payment_methods(&self, user: i32) -> Result<Vec<PaymentMethod>> {
        Ok(method::list(user, &self.db).await?)
    }

    async fn create_purchase(&self, new: NewPurchase) -> Result<Purchase> {
        purchase::insert(new, &self.db).await
    }

    async fn purchase(&self, id: i32, user: i32) -> Result<Option<Purchase>> {
        purchase::get(id, user, &self.db).await
    }

    async fn settle_purchase(
        &self,
        reference: &str,
        status: PurchaseStatus,
        txn_hash: Option<String>,
    ) -> Result<Settlement> {
        purchase::settle(reference, status, txn_hash, &self.db).await
    }

    async fn balance(&self, user: i32) -> Result<i64> {
        Ok(ledger::balance(user, &self.db).await?)
    }

    async fn spend(&self, user: i32, amount: i64, reference: &str, description: &str) -> Result<bool> {
        Ok(ledger::spend(user, amount, reference, description, &self.db).await?)
    }
}

// Proposals live only in redis; confirming is the first moment anything
// touches the provider or the database.
pub const PROPOSAL_TTL_SECS: u64 = 15 * 60;

/// A quoted-but-unconfirmed purchase, waiting for the user's decision.
#[derive(Debug, Serialize, Deserialize)]
pub struct Proposal {
    pub user: i32,
    pub method: i32,
    pub credits: String,
    pub pay_amount: String,
    pub rail: String,
    pub chat_id: Option<String>,
    pub message_id: Option<String>,
}

/// Expiring key-value store for proposals. Backed by redis in the
/// running service; tests substitute an in-memory map.
pub trait ProposalCache: Send + Sync {
    fn set_ex(
        &self,
        key: String,
        value: String,
        seconds: u64,
    ) -> impl Future<Output = Result<()>> + Send;
    /// Fetch and delete in one step; a key is readable at most once.
    fn get_del(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;
}

impl ProposalCache for RedisClient {
    async fn set_ex(&self, key: String, value: String, seconds: u64) -> Result<()> {
        let mut conn = self.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn get_del(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_multiplexed_async_connection().await?;
        Ok(conn.get_del(key).await?)
    }
}

/// Store a proposal under a fresh opaque id with a 15 minute expiry.
pub async fn store_proposal<C: ProposalCache>(cache: &C, proposal: &Proposal) -> Result<String> {
    let id: [u8; 16] = rand::thread_rng().r#gen();
    let id = hex::encode(id);

    let value = serde_json::to_string(proposal)?;
    cache.set_ex(format!("cp:{}", id), value, PROPOSAL_TTL_SECS).await?;

    debug!("stored purchase proposal: {}", id);
    Ok(id)
}

/// Consume a proposal: the GETDEL makes confirmation single use.
pub async fn take_proposal<C: ProposalCache>(cache: &C, id: &str) -> Result<Option<Proposal>> {
    match cache.get_del(&format!("cp:{}", id)).await? {
        Some(value) => Ok(Some(serde_json::from_str(&value)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryCache {
        // key -> (value, ttl secs)
        entries: Mutex<HashMap<String, (String, u64)>>,
    }

    impl ProposalCache for MemoryCache {
        async fn set_ex(&self, key: String, value: String, seconds: u64) -> Result<()> {
            self.entries.lock().unwrap().insert(key, (value, seconds));
            Ok(())
        }

        async fn get_del(&self, key: &str) -> Result<Option<String>> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .remove(key)
                .map(|(value, _)| value))
        }
    }

    fn proposal() -> Proposal {
        Proposal {
            user: 7,
            method: 1,
            credits: "500".to_owned(),
            pay_amount: "5000000".to_owned(),
            rail: "evm".to_owned(),
            chat_id: Some("chat_1".to_owned()),
            message_id: None,
        }
    }

    #[tokio::test]
    async fn take_is_single_use() {
        let cache = MemoryCache::default();
        let id = store_proposal(&cache, &proposal()).await.unwrap();

        let taken = take_proposal(&cache, &id).await.unwrap().unwrap();
        assert_eq!(taken.user, 7);
        assert_eq!(taken.method, 1);
        assert_eq!(taken.credits, "500");
        assert_eq!(taken.pay_amount, "5000000");
        assert_eq!(taken.rail, "evm");
        assert_eq!(taken.chat_id.as_deref(), Some("chat_1"));
        assert_eq!(taken.message_id, None);

        // a second confirm finds nothing to consume
        assert!(take_proposal(&cache, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stored_with_prefixed_key_and_ttl() {
        let cache = MemoryCache::default();
        let id = store_proposal(&cache, &proposal()).await.unwrap();
        // 16 random bytes, hex encoded
        assert_eq!(id.len(), 32);

        let entries = cache.entries.lock().unwrap();
        let (_, ttl) = entries.get(&format!("cp:{}", id)).unwrap();
        assert_eq!(*ttl, PROPOSAL_TTL_SECS);
    }

    #[tokio::test]
    async fn unknown_proposal_is_none() {
        let cache = MemoryCache::default();
        assert!(take_proposal(&cache, "missing").await.unwrap().is_none());
    }
}
