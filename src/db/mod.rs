use sqlx::PgPool;

const CREATE_KV_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS kv_entries (
    key     TEXT PRIMARY KEY,
    value   TEXT NOT NULL,
    version BIGINT NOT NULL DEFAULT 1
)
"#;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPool::connect(database_url).await?;
    sqlx::query(CREATE_KV_TABLE).execute(&pool).await?;
    log::info!("Connected to Postgres key-value table");
    Ok(pool)
}
