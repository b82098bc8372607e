use chrono::NaiveDateTime;
use credits::PaymentMethod;
use sqlx::{FromRow, PgPool};

#[derive(FromRow)]
pub struct MethodRow {
    pub id: i32,
    pub user_id: i32,
    pub rail: String,
    pub reference: String,
    #[allow(dead_code)]
    pub created_at: NaiveDateTime,
}

impl From<MethodRow> for PaymentMethod {
    fn from(row: MethodRow) -> PaymentMethod {
        PaymentMethod {
            id: row.id,
            user: row.user_id,
            rail: row.rail,
            reference: row.reference,
        }
    }
}

pub async fn get(id: i32, user: i32, db: &PgPool) -> sqlx::Result<Option<PaymentMethod>> {
    let row: Option<MethodRow> =
        sqlx::query_as("SELECT * FROM payment_methods WHERE id=$1 AND user_id=$2")
            .bind(id)
            .bind(user)
            .fetch_optional(db)
            .await?;

    Ok(row.map(Into::into))
}

pub async fn list(user: i32, db: &PgPool) -> sqlx::Result<Vec<PaymentMethod>> {
    let rows: Vec<MethodRow> =
        sqlx::query_as("SELECT * FROM payment_methods WHERE user_id=$1 ORDER BY id")
            .bind(user)
            .fetch_all(db)
            .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}
