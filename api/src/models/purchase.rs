use super::ledger;
use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use credits::{NewPurchase, Purchase, PurchaseStatus, Settlement};
use sqlx::{FromRow, PgPool};

#[derive(FromRow)]
pub struct PurchaseRow {
    pub id: i32,
    pub user_id: i32,
    pub method: i32,
    pub amount: String,
    pub pay_amount: String,
    pub rail: String,
    pub reference: String,
    pub status: String,
    pub txn_hash: Option<String>,
    pub description: String,
    pub chat_id: Option<String>,
    pub message_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = anyhow::Error;

    fn try_from(row: PurchaseRow) -> Result<Purchase> {
        let status = PurchaseStatus::from_str(&row.status)
            .ok_or(anyhow::anyhow!("bad purchase status: {}", row.status))?;
        Ok(Purchase {
            id: row.id,
            user: row.user_id,
            method: row.method,
            amount: row.amount,
            pay_amount: row.pay_amount,
            rail: row.rail,
            reference: row.reference,
            status,
            txn_hash: row.txn_hash,
            description: row.description,
            chat_id: row.chat_id,
            message_id: row.message_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert(purchase: NewPurchase, db: &PgPool) -> Result<Purchase> {
    let now = Utc::now().naive_utc();
    let row: PurchaseRow = sqlx::query_as(
        "INSERT INTO purchases(user_id,method,amount,pay_amount,rail,reference,status,description,chat_id,message_id,created_at,updated_at) \
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$11) RETURNING *",
    )
    .bind(purchase.user)
    .bind(purchase.method)
    .bind(&purchase.amount)
    .bind(&purchase.pay_amount)
    .bind(&purchase.rail)
    .bind(&purchase.reference)
    .bind(PurchaseStatus::Pending.as_str())
    .bind(&purchase.description)
    .bind(&purchase.chat_id)
    .bind(&purchase.message_id)
    .bind(now)
    .fetch_one(db)
    .await?;

    row.try_into()
}

pub async fn get(id: i32, user: i32, db: &PgPool) -> Result<Option<Purchase>> {
    let row: Option<PurchaseRow> =
        sqlx::query_as("SELECT * FROM purchases WHERE id=$1 AND user_id=$2")
            .bind(id)
            .bind(user)
            .fetch_optional(db)
            .await?;

    row.map(TryInto::try_into).transpose()
}

/// Drive a pending purchase to a terminal state by provider reference.
///
/// The UPDATE is guarded by `status='pending'`, and the `purchase` ledger
/// entry for a completed purchase lands in the same transaction. Two
/// concurrent settles of one reference commit at most one transition and
/// one ledger entry; the loser observes zero updated rows.
pub async fn settle(
    reference: &str,
    status: PurchaseStatus,
    txn_hash: Option<String>,
    db: &PgPool,
) -> Result<Settlement> {
    let now = Utc::now().naive_utc();
    let mut tx = db.begin().await?;

    let row: Option<PurchaseRow> = sqlx::query_as(
        "UPDATE purchases SET status=$1, txn_hash=COALESCE($2, txn_hash), updated_at=$3 \
         WHERE reference=$4 AND status='pending' RETURNING *",
    )
    .bind(status.as_str())
    .bind(&txn_hash)
    .bind(now)
    .bind(reference)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        let exists: Option<i32> = sqlx::query_scalar("SELECT id FROM purchases WHERE reference=$1")
            .bind(reference)
            .fetch_optional(&mut *tx)
            .await?;
        tx.rollback().await?;
        return Ok(if exists.is_some() {
            Settlement::NotPending
        } else {
            Settlement::NotFound
        });
    };

    let purchase: Purchase = row.try_into()?;
    if status == PurchaseStatus::Completed {
        let amount: i64 = purchase.amount.parse()?;
        ledger::append(
            &mut *tx,
            purchase.user,
            amount,
            "purchase",
            &format!("Purchase {}", purchase.id),
            &purchase.id.to_string(),
            now,
        )
        .await?;
    }

    tx.commit().await?;
    Ok(Settlement::Applied(purchase))
}
