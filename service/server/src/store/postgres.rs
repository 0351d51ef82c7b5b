use super::{MarketStore, StoreResult};
use crate::db::{
    notify::{BidEvent, BID_CHANNEL},
    schema::{BidRow, JobRow, NotificationRow, UserRow},
};
use chrono::{DateTime, SubsecRound, Utc};
use market::{
    error::Entity,
    lifecycle::{self, Outcome},
    state::Snapshot,
    Bid, BidDecision, BidId, BidStatus, Job, JobFilter, JobId, JobStatus, MarketError, NewBid,
    NewJob, Notification, SortOrder, User, UserId, UserRole,
};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// TIMESTAMPTZ keeps microseconds, so records are built at that precision
/// and compare equal to what is read back.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }
}

async fn lock_job(conn: &mut PgConnection, id: JobId) -> StoreResult<Job> {
    let row: Option<JobRow> = sqlx::query_as(
        r#"
        SELECT
            id, title, description, budget_min, budget_max, categories,
            skills_required, status, employer_id, bid_accepted, created_at, updated_at
        FROM jobs
        WHERE id = $1
        FOR UPDATE
    "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row
        .map(Job::from)
        .ok_or(MarketError::not_found(Entity::Job, id))?)
}

/// All bids on `job`, oldest first, locked for the rest of the transaction.
async fn lock_job_bids(conn: &mut PgConnection, job: JobId) -> StoreResult<Vec<Bid>> {
    let rows: Vec<BidRow> = sqlx::query_as(
        r#"
        SELECT
            id, job_id, freelancer_id, amount, status,
            proposal_text, created_at, updated_at
        FROM bids
        WHERE job_id = $1
        ORDER BY created_at ASC, id ASC
        FOR UPDATE
    "#,
    )
    .bind(job)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(Bid::from).collect())
}

async fn insert_notifications(
    conn: &mut PgConnection,
    notifications: &[Notification],
) -> Result<(), sqlx::Error> {
    for n in notifications {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, recipient_id, kind, job_id, bid_id, read, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7
            )
        "#,
        )
        .bind(n.id)
        .bind(n.recipient)
        .bind(n.kind)
        .bind(n.job)
        .bind(n.bid)
        .bind(n.read)
        .bind(n.created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

impl MarketStore for PostgresStore {
    async fn register_user(&self, name: &str, role: UserRole) -> StoreResult<User> {
        let user = lifecycle::new_user(name, role, now())?;
        sqlx::query(
            r#"
            INSERT INTO users (id, name, role, created_at)
            VALUES ($1, $2, $3, $4)
        "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.role)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<User> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, name, role, created_at
            FROM users
            WHERE id = $1
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .map(User::from)
            .ok_or(MarketError::not_found(Entity::User, id))?)
    }

    #[instrument(skip(self, input), level = "debug")]
    async fn create_job(&self, employer: UserId, input: NewJob) -> StoreResult<Job> {
        let job = lifecycle::open_job(employer, input, now())?;
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, title, description, budget_min, budget_max, categories,
                skills_required, status, employer_id, bid_accepted, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12
            )
        "#,
        )
        .bind(job.id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(job.budget.min)
        .bind(job.budget.max)
        .bind(&job.categories)
        .bind(&job.skills_required)
        .bind(job.status)
        .bind(job.employer)
        .bind(job.bid_accepted)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;
        info!("Created job {}", job.id);
        Ok(job)
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Snapshot<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT
                id, title, description, budget_min, budget_max, categories,
                skills_required, status, employer_id, bid_accepted, created_at, updated_at
            FROM jobs
            WHERE ($1::uuid IS NULL OR employer_id = $1)
              AND ($2::job_status IS NULL OR status = $2)
              AND ($3::text IS NULL OR $3 = ANY(categories))
              AND ($4::text IS NULL OR $4 = ANY(skills_required))
            ORDER BY created_at DESC, id DESC
            LIMIT $5
        "#,
        )
        .bind(filter.employer)
        .bind(filter.status)
        .bind(&filter.category)
        .bind(&filter.skill)
        .bind(filter.limit.map(i64::from))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(Job::from)
            .collect::<Vec<_>>()
            .into_iter())
    }

    async fn get_job(&self, id: JobId) -> StoreResult<Job> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT
                id, title, description, budget_min, budget_max, categories,
                skills_required, status, employer_id, bid_accepted, created_at, updated_at
            FROM jobs
            WHERE id = $1
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .map(Job::from)
            .ok_or(MarketError::not_found(Entity::Job, id))?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn update_job_status(&self, id: JobId, status: JobStatus) -> StoreResult<Job> {
        let mut tx = self.pool.begin().await?;
        let current = lock_job(&mut tx, id).await?;
        let job = lifecycle::transition_job(&current, status, now())?;
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, updated_at = $3
            WHERE id = $1
        "#,
        )
        .bind(job.id)
        .bind(job.status)
        .bind(job.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        info!("Job {} is now {}", id, job.status);
        Ok(job)
    }

    #[instrument(skip(self, input), level = "debug")]
    async fn create_bid(&self, freelancer: UserId, input: NewBid) -> StoreResult<Bid> {
        let mut tx = self.pool.begin().await?;
        // The job row lock serializes bids against a concurrent acceptance.
        let job = lock_job(&mut tx, input.job).await?;
        let job_bids = lock_job_bids(&mut tx, job.id).await?;
        let Outcome {
            value: bid,
            notifications,
        } = lifecycle::place_bid(&job, &job_bids, freelancer, input, now())?;

        sqlx::query(
            r#"
            INSERT INTO bids (
                id, job_id, freelancer_id, amount, status,
                proposal_text, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8
            )
        "#,
        )
        .bind(bid.id)
        .bind(bid.job)
        .bind(bid.freelancer)
        .bind(bid.amount)
        .bind(bid.status)
        .bind(&bid.proposal_text)
        .bind(bid.created_at)
        .bind(bid.updated_at)
        .execute(&mut *tx)
        .await?;
        insert_notifications(&mut tx, &notifications).await?;
        BID_CHANNEL
            .publish(&mut tx, &BidEvent::from(&bid))
            .await?;
        tx.commit().await?;
        info!("Bid {} placed on job {}", bid.id, bid.job);
        Ok(bid)
    }

    async fn list_bids_for_job(
        &self,
        job: JobId,
        order: SortOrder,
    ) -> StoreResult<Snapshot<Bid>> {
        self.get_job(job).await?;
        let query = match order {
            SortOrder::Ascending => {
                r#"
                SELECT
                    id, job_id, freelancer_id, amount, status,
                    proposal_text, created_at, updated_at
                FROM bids
                WHERE job_id = $1
                ORDER BY created_at ASC, id ASC
            "#
            }
            SortOrder::Descending => {
                r#"
                SELECT
                    id, job_id, freelancer_id, amount, status,
                    proposal_text, created_at, updated_at
                FROM bids
                WHERE job_id = $1
                ORDER BY created_at DESC, id DESC
            "#
            }
        };
        let rows: Vec<BidRow> = sqlx::query_as(query)
            .bind(job)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(Bid::from)
            .collect::<Vec<_>>()
            .into_iter())
    }

    async fn list_bids_for_user(&self, freelancer: UserId) -> StoreResult<Snapshot<Bid>> {
        let rows: Vec<BidRow> = sqlx::query_as(
            r#"
            SELECT
                id, job_id, freelancer_id, amount, status,
                proposal_text, created_at, updated_at
            FROM bids
            WHERE freelancer_id = $1
            ORDER BY created_at DESC, id DESC
        "#,
        )
        .bind(freelancer)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(Bid::from)
            .collect::<Vec<_>>()
            .into_iter())
    }

    async fn recent_bids(&self, employer: UserId, limit: u32) -> StoreResult<Snapshot<Bid>> {
        let rows: Vec<BidRow> = sqlx::query_as(
            r#"
            SELECT
                b.id, b.job_id, b.freelancer_id, b.amount, b.status,
                b.proposal_text, b.created_at, b.updated_at
            FROM bids b
            JOIN jobs j ON j.id = b.job_id
            WHERE j.employer_id = $1
            ORDER BY b.created_at DESC, b.id DESC
            LIMIT $2
        "#,
        )
        .bind(employer)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(Bid::from)
            .collect::<Vec<_>>()
            .into_iter())
    }

    async fn get_bid(&self, id: BidId) -> StoreResult<Bid> {
        let row: Option<BidRow> = sqlx::query_as(
            r#"
            SELECT
                id, job_id, freelancer_id, amount, status,
                proposal_text, created_at, updated_at
            FROM bids
            WHERE id = $1
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .map(Bid::from)
            .ok_or(MarketError::not_found(Entity::Bid, id))?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_bid_status(&self, id: BidId, status: BidStatus) -> StoreResult<BidDecision> {
        let mut tx = self.pool.begin().await?;

        // Lock the job before its bids, the same order create_bid uses.
        let job_id: Option<Uuid> = sqlx::query_scalar("SELECT job_id FROM bids WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let job_id = job_id.ok_or(MarketError::not_found(Entity::Bid, id))?;
        let job = lock_job(&mut tx, job_id).await?;
        let job_bids = lock_job_bids(&mut tx, job_id).await?;
        let bid = job_bids
            .iter()
            .find(|b| b.id == id)
            .ok_or(MarketError::not_found(Entity::Bid, id))?;

        let Outcome {
            value: decision,
            notifications,
        } = lifecycle::decide_bid(&job, bid, &job_bids, status, now())?;

        if decision.job.bid_accepted {
            let swapped = sqlx::query(
                r#"
                UPDATE jobs
                SET status = $2, bid_accepted = TRUE, updated_at = $3
                WHERE id = $1 AND status = 'open' AND NOT bid_accepted
            "#,
            )
            .bind(decision.job.id)
            .bind(decision.job.status)
            .bind(decision.job.updated_at)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if swapped == 0 {
                warn!("Job {} changed underneath bid acceptance", job_id);
                return Err(MarketError::BidAlreadyAccepted { job: job_id }.into());
            }
        }

        sqlx::query(
            r#"
            UPDATE bids
            SET status = $2, updated_at = $3
            WHERE id = $1 AND status = 'pending'
        "#,
        )
        .bind(decision.bid.id)
        .bind(decision.bid.status)
        .bind(decision.bid.updated_at)
        .execute(&mut *tx)
        .await?;

        if !decision.rejected.is_empty() {
            let ids: Vec<Uuid> = decision.rejected.iter().map(|b| b.id).collect();
            sqlx::query(
                r#"
                UPDATE bids
                SET status = 'rejected', updated_at = $2
                WHERE id = ANY($1) AND status = 'pending'
            "#,
            )
            .bind(&ids)
            .bind(decision.bid.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        insert_notifications(&mut tx, &notifications).await?;
        for bid in std::iter::once(&decision.bid).chain(decision.rejected.iter()) {
            BID_CHANNEL.publish(&mut tx, &BidEvent::from(bid)).await?;
        }
        tx.commit().await?;

        info!(
            "Bid {} {}, {} sibling bids rejected",
            id,
            decision.bid.status,
            decision.rejected.len()
        );
        Ok(decision)
    }

    async fn notifications(&self, user: UserId) -> StoreResult<Snapshot<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id, recipient_id, kind, job_id, bid_id, read, created_at
            FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC, id DESC
        "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(Notification::from)
            .collect::<Vec<_>>()
            .into_iter())
    }

    async fn unread_count(&self, user: UserId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE recipient_id = $1 AND NOT read
        "#,
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn mark_notifications_read(&self, user: UserId) -> StoreResult<u64> {
        let changed = sqlx::query(
            r#"
            UPDATE notifications
            SET read = TRUE
            WHERE recipient_id = $1 AND NOT read
        "#,
        )
        .bind(user)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::DB, store::StoreError};
    use market::{Budget, ErrorKind};

    fn landing_page() -> NewJob {
        NewJob {
            title: "Build a landing page".into(),
            description: "Need a responsive landing page with hero section and contact form."
                .into(),
            budget: Budget::new(100.0, 500.0),
            categories: vec!["Design".into()],
            skills_required: vec!["HTML".into(), "CSS".into()],
        }
    }

    #[tokio::test]
    #[ignore = "requires postgres instance"]
    async fn test_accept_bid_round_trip() -> anyhow::Result<()> {
        let store = PostgresStore::new(DB::new_from_environment().await?.pool);
        let employer = store.register_user("Eve", UserRole::Employer).await?;
        let winner = store.register_user("Fred", UserRole::Freelancer).await?;
        let loser = store.register_user("Gina", UserRole::Hybrid).await?;

        let job = store.create_job(employer.id, landing_page()).await?;
        assert_eq!(store.get_job(job.id).await?, job);
        let low = store
            .create_bid(
                winner.id,
                NewBid {
                    job: job.id,
                    amount: 50.0,
                    proposal_text: None,
                },
            )
            .await;
        assert!(matches!(
            low,
            Err(StoreError::Market(ref e)) if e.kind() == ErrorKind::OutOfRange
        ));

        let won = store
            .create_bid(
                winner.id,
                NewBid {
                    job: job.id,
                    amount: 300.0,
                    proposal_text: Some("Two weeks".into()),
                },
            )
            .await?;
        let lost = store
            .create_bid(
                loser.id,
                NewBid {
                    job: job.id,
                    amount: 280.0,
                    proposal_text: None,
                },
            )
            .await?;

        assert_eq!(store.get_bid(won.id).await?, won);

        let decision = store.set_bid_status(won.id, BidStatus::Accepted).await?;
        assert_eq!(decision.job.status, JobStatus::InProgress);
        assert_eq!(decision.rejected.len(), 1);

        let stored = store.get_job(job.id).await?;
        assert!(stored.bid_accepted);
        assert_eq!(stored, decision.job);
        assert_eq!(store.get_bid(won.id).await?, decision.bid);
        let lost = store
            .list_bids_for_job(job.id, SortOrder::Ascending)
            .await?
            .find(|b| b.id == lost.id)
            .unwrap();
        assert_eq!(lost.status, BidStatus::Rejected);

        assert_eq!(store.unread_count(employer.id).await?, 2);
        assert_eq!(store.mark_notifications_read(employer.id).await?, 2);
        assert_eq!(store.unread_count(employer.id).await?, 0);
        Ok(())
    }
}
