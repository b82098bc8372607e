use chrono::{NaiveDateTime, Utc};
use sqlx::{PgExecutor, PgPool};

/// Append a balance-affecting event. Entries are immutable once written;
/// the balance is always derived by summing them.
pub async fn append<'a, E: PgExecutor<'a>>(
    db: E,
    user: i32,
    amount: i64,
    kind: &str,
    description: &str,
    reference: &str,
    now: NaiveDateTime,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO credit_events(user_id,amount,kind,description,reference,created_at) \
         VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(user)
    .bind(amount)
    .bind(kind)
    .bind(description)
    .bind(reference)
    .bind(now)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn balance(user: i32, db: &PgPool) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM credit_events WHERE user_id=$1",
    )
    .bind(user)
    .fetch_one(db)
    .await
}

/// Atomic decrement-if-positive. Spends for one user serialize on an
/// advisory lock held for the transaction, so the balance guard and the
/// insert stay consistent even under READ COMMITTED: two concurrent
/// spends against a balance of 1 apply exactly once.
pub async fn spend(
    user: i32,
    amount: i64,
    reference: &str,
    description: &str,
    db: &PgPool,
) -> sqlx::Result<bool> {
    let now = Utc::now().naive_utc();
    let mut tx = db.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(user as i64)
        .execute(&mut *tx)
        .await?;

    let res = sqlx::query(
        "INSERT INTO credit_events(user_id,amount,kind,description,reference,created_at) \
         SELECT $1,$2,'spend',$3,$4,$5 \
         WHERE COALESCE((SELECT SUM(amount) FROM credit_events WHERE user_id=$1), 0) > 0",
    )
    .bind(user)
    .bind(-amount)
    .bind(description)
    .bind(reference)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(res.rows_affected() > 0)
}
