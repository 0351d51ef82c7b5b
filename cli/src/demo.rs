use crate::client::MarketClient;
use anyhow::{ensure, Result};
use market::{
    BidStatus, ErrorKind, Job, JobFilter, JobStatus, NewBid, NewJob, NotificationKind, SortOrder,
    User, UserRole,
};
use proptest::{
    arbitrary::Arbitrary,
    strategy::{Strategy, ValueTree},
    test_runner::TestRunner,
};
use rand::{seq::SliceRandom, Rng};
use tracing::info;

pub struct Participants {
    pub employer: User,
    pub freelancers: Vec<User>,
}

/// Random, valid job postings.
pub fn generate_jobs(n: usize) -> Result<Vec<NewJob>> {
    let mut runner = TestRunner::default();
    let strategy = proptest::collection::vec(NewJob::arbitrary(), n);
    let tree = strategy
        .new_tree(&mut runner)
        .map_err(|e| anyhow::anyhow!("failed to generate jobs: {}", e))?;
    Ok(tree.current())
}

/// A cent-rounded amount inside the job's budget.
fn bid_amount<R: Rng>(rng: &mut R, job: &Job) -> f64 {
    let amount = rng.gen_range(job.budget.min..=job.budget.max);
    let cents = (amount * 100.0).round() / 100.0;
    cents.clamp(job.budget.min, job.budget.max)
}

async fn register(client: &MarketClient, num_freelancers: usize) -> Result<Participants> {
    let employer = client.register_user("Demo Employer", UserRole::Employer).await?;
    let registrations = (0..num_freelancers)
        .map(|i| {
            let name = format!("Demo Freelancer {}", i + 1);
            async move { client.register_user(&name, UserRole::Freelancer).await }
        })
        .collect::<Vec<_>>();
    let freelancers = futures::future::try_join_all(registrations).await?;
    Ok(Participants {
        employer,
        freelancers,
    })
}

/// Every freelancer bids once on the job, in random order.
async fn collect_bids(client: &MarketClient, job: &Job, freelancers: &[User]) -> Result<()> {
    let mut bidders: Vec<&User> = freelancers.iter().collect();
    let amounts: Vec<f64> = {
        let mut rng = rand::thread_rng();
        bidders.shuffle(&mut rng);
        bidders.iter().map(|_| bid_amount(&mut rng, job)).collect()
    };
    for (freelancer, amount) in bidders.into_iter().zip(amounts) {
        let bid = client
            .create_bid(
                freelancer.id,
                NewBid {
                    job: job.id,
                    amount,
                    proposal_text: Some(format!("{} can start right away.", freelancer.name)),
                },
            )
            .await?;
        info!("{} bid {} on '{}'", freelancer.name, bid.amount, job.title);
    }
    Ok(())
}

/// Accepts a random bid on the job and checks the cascade.
async fn award(client: &MarketClient, employer: &User, job: &Job) -> Result<()> {
    let bids = client
        .list_bids_for_job(job.id, Some(SortOrder::Ascending))
        .await?;
    let winner = bids.choose(&mut rand::thread_rng()).cloned();
    let Some(winner) = winner else {
        info!("No bids on '{}', closing it", job.title);
        client
            .update_job_status(employer.id, job.id, JobStatus::Closed)
            .await?;
        return Ok(());
    };

    let decision = client
        .set_bid_status(employer.id, winner.id, BidStatus::Accepted)
        .await?;
    ensure!(
        decision.job.status == JobStatus::InProgress && decision.job.bid_accepted,
        "job '{}' did not move to in-progress",
        job.title
    );
    ensure!(
        decision.rejected.len() == bids.len() - 1,
        "expected {} sibling bids to be rejected, got {}",
        bids.len() - 1,
        decision.rejected.len()
    );
    info!(
        "Accepted {} for '{}', {} other bids rejected",
        decision.bid.amount,
        job.title,
        decision.rejected.len()
    );

    // A second acceptance must lose.
    if let Some(loser) = decision.rejected.first() {
        match client
            .set_bid_status(employer.id, loser.id, BidStatus::Accepted)
            .await
        {
            Err(e) if e.kind() == Some(ErrorKind::InvalidState) => {}
            Err(e) => anyhow::bail!("unexpected error on second acceptance: {}", e),
            Ok(_) => anyhow::bail!("second acceptance on '{}' succeeded", job.title),
        }
    }

    let done = client
        .update_job_status(employer.id, job.id, JobStatus::Completed)
        .await?;
    info!("'{}' is now {}", done.title, done.status);
    Ok(())
}

pub async fn run_demo(client: &MarketClient, num_jobs: usize, num_freelancers: usize) -> Result<()> {
    client.health_check().await?;
    let Participants {
        employer,
        freelancers,
    } = register(client, num_freelancers).await?;
    info!(
        "Registered employer {} and {} freelancers",
        employer.id,
        freelancers.len()
    );

    let mut posted = Vec::new();
    for input in generate_jobs(num_jobs)? {
        let job = client.create_job(employer.id, input).await?;
        info!("Posted '{}' with budget {}..{}", job.title, job.budget.min, job.budget.max);
        posted.push(job);
    }

    let listed = client.list_jobs(JobFilter::by_employer(employer.id)).await?;
    ensure!(
        listed.iter().map(|j| j.id).eq(posted.iter().rev().map(|j| j.id)),
        "listing is not newest first"
    );

    if let (Some(job), Some(freelancer)) = (posted.first(), freelancers.first()) {
        let below = NewBid {
            job: job.id,
            amount: job.budget.min - 1.0,
            proposal_text: None,
        };
        match client.create_bid(freelancer.id, below).await {
            Err(e) if e.kind() == Some(ErrorKind::OutOfRange) => {
                info!("Bid below the budget refused: {}", e)
            }
            Err(e) => return Err(e.into()),
            Ok(_) => anyhow::bail!("bid below the budget was accepted"),
        }
    }

    for job in &posted {
        collect_bids(client, job, &freelancers).await?;
    }
    let unread = client.unread_count(employer.id).await?;
    info!("Employer has {} unread notifications", unread);

    for job in &posted {
        award(client, &employer, job).await?;
    }

    for freelancer in &freelancers {
        let kinds: Vec<NotificationKind> = client
            .notifications(freelancer.id)
            .await?
            .into_iter()
            .map(|n| n.kind)
            .collect();
        ensure!(
            kinds.len() == posted.len(),
            "{} has {} notifications for {} jobs",
            freelancer.name,
            kinds.len(),
            posted.len()
        );
        let won = kinds
            .iter()
            .filter(|k| **k == NotificationKind::BidAccepted)
            .count();
        info!("{} won {} of {} jobs", freelancer.name, won, posted.len());
        client.mark_notifications_read(freelancer.id).await?;
    }

    let finished = client.list_jobs(JobFilter::by_employer(employer.id)).await?;
    ensure!(
        finished.iter().all(|j| j.status.is_terminal()),
        "every demo job should be finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use market::Budget;
    use uuid::Uuid;

    fn sample_job(min: f64, max: f64) -> Job {
        let now = Default::default();
        Job {
            id: Uuid::new_v4(),
            title: "Build a landing page".into(),
            description: "Need a responsive landing page.".into(),
            budget: Budget::new(min, max),
            categories: vec!["Design".into()],
            skills_required: vec!["HTML".into()],
            status: JobStatus::Open,
            employer: Uuid::new_v4(),
            bid_accepted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn generated_jobs_pass_local_validation() {
        let jobs = generate_jobs(16).unwrap();
        assert_eq!(jobs.len(), 16);
        for job in &jobs {
            assert!(market::validation::validate_new_job(job).is_empty());
        }
    }

    #[test]
    fn amounts_stay_in_budget() {
        let mut rng = rand::thread_rng();
        let job = sample_job(100.0, 100.5);
        for _ in 0..200 {
            assert!(job.budget.contains(bid_amount(&mut rng, &job)));
        }
    }
}
