use anyhow::Result;
use market_server::{app_config, db::DB};
use sqlx::{Executor, PgPool};
use tracing::info;

async fn create_enum(pool: &PgPool, name: &str, variants: &[&str]) -> Result<(), sqlx::Error> {
    let variants = variants
        .iter()
        .map(|v| format!("'{}'", v))
        .collect::<Vec<_>>()
        .join(", ");
    pool.execute(sqlx::query(&format!(
        r#"
        DO $$ BEGIN
            IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = '{name}') THEN
                CREATE TYPE {name} AS ENUM ({variants});
            END IF;
        END $$;
    "#
    )))
    .await?;
    Ok(())
}

async fn create_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    create_enum(pool, "user_role", &["employer", "freelancer", "hybrid"]).await?;
    create_enum(
        pool,
        "job_status",
        &["open", "in_progress", "completed", "closed"],
    )
    .await?;
    create_enum(pool, "bid_status", &["pending", "accepted", "rejected"]).await?;
    create_enum(
        pool,
        "notification_kind",
        &["bid_received", "bid_accepted", "bid_rejected"],
    )
    .await?;

    pool.execute(sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            role user_role NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
    "#,
    ))
    .await?;

    pool.execute(sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id UUID PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            budget_min DOUBLE PRECISION NOT NULL CHECK (budget_min >= 0),
            budget_max DOUBLE PRECISION NOT NULL,
            categories TEXT[] NOT NULL,
            skills_required TEXT[] NOT NULL,
            status job_status NOT NULL,
            employer_id UUID NOT NULL REFERENCES users (id),
            bid_accepted BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            CHECK (budget_max > budget_min)
        )
    "#,
    ))
    .await?;

    pool.execute(sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bids (
            id UUID PRIMARY KEY,
            job_id UUID NOT NULL REFERENCES jobs (id),
            freelancer_id UUID NOT NULL REFERENCES users (id),
            amount DOUBLE PRECISION NOT NULL,
            status bid_status NOT NULL,
            proposal_text TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            UNIQUE (job_id, freelancer_id)
        )
    "#,
    ))
    .await?;

    pool.execute(sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id UUID PRIMARY KEY,
            recipient_id UUID NOT NULL REFERENCES users (id),
            kind notification_kind NOT NULL,
            job_id UUID NOT NULL REFERENCES jobs (id),
            bid_id UUID NOT NULL REFERENCES bids (id),
            read BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL
        )
    "#,
    ))
    .await?;

    // At most one accepted bid per job, even if the application check is bypassed.
    pool.execute(sqlx::query(
        r#"
        DO $$ BEGIN
            CREATE UNIQUE INDEX IF NOT EXISTS idx_bids_one_accepted
                ON bids (job_id) WHERE status = 'accepted';
            CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs (status, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_jobs_employer ON jobs (employer_id);
            CREATE INDEX IF NOT EXISTS idx_bids_job_created ON bids (job_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_bids_freelancer ON bids (freelancer_id);
            CREATE INDEX IF NOT EXISTS idx_notifications_recipient
                ON notifications (recipient_id, created_at DESC);
        END $$;
    "#,
    ))
    .await?;

    info!("Schema created successfully for database");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    app_config::init_console_subscriber();
    let db = DB::new_from_environment().await?;
    match create_schema(&db.pool).await {
        Ok(_) => {
            info!("Database schema setup completed successfully.");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Error setting up database schema: {}", e);
            Err(e.into())
        }
    }
}
