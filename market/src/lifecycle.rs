//! Status machines for jobs and bids.
//!
//! Every function here is pure: it checks a proposed change against the
//! current records and returns the records to write, or the reason the
//! change is refused. Callers are responsible for writing the result
//! atomically.

use crate::{
    error::MarketError,
    types::{
        Bid, BidDecision, BidStatus, Job, JobStatus, NewBid, NewJob, Notification,
        NotificationKind, User, UserId, UserRole,
    },
    validation,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

impl JobStatus {
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Open, InProgress) | (Open, Closed) | (InProgress, Completed) | (InProgress, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Closed)
    }
}

impl BidStatus {
    pub fn can_transition_to(self, to: BidStatus) -> bool {
        matches!(
            (self, to),
            (BidStatus::Pending, BidStatus::Accepted) | (BidStatus::Pending, BidStatus::Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, BidStatus::Pending)
    }
}

/// A set of records to persist together with the notifications they raise.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub notifications: Vec<Notification>,
}

pub fn authorize_posting(user: &User) -> Result<(), MarketError> {
    if user.role.can_post_jobs() {
        Ok(())
    } else {
        Err(MarketError::Forbidden(format!(
            "a {} account cannot post jobs",
            user.role
        )))
    }
}

pub fn authorize_bidding(user: &User) -> Result<(), MarketError> {
    if user.role.can_bid() {
        Ok(())
    } else {
        Err(MarketError::Forbidden(format!(
            "a {} account cannot bid on jobs",
            user.role
        )))
    }
}

pub fn authorize_employer(caller: UserId, job: &Job) -> Result<(), MarketError> {
    if job.employer == caller {
        Ok(())
    } else {
        Err(MarketError::Forbidden(format!(
            "only the employer of job {} can change it",
            job.id
        )))
    }
}

/// Employers may close or complete a job directly. Starting work only
/// happens through `decide_bid`.
pub fn authorize_manual_transition(job: &Job, to: JobStatus) -> Result<(), MarketError> {
    if to == JobStatus::InProgress {
        return Err(MarketError::InvalidJobTransition {
            from: job.status,
            to,
        });
    }
    Ok(())
}

pub fn new_user(name: &str, role: UserRole, now: DateTime<Utc>) -> Result<User, MarketError> {
    validation::validate_user_name(name)?;
    Ok(User {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        role,
        created_at: now,
    })
}

/// Validates the form and builds an open job.
pub fn open_job(employer: UserId, input: NewJob, now: DateTime<Utc>) -> Result<Job, MarketError> {
    let input = validation::prepare_job(input)?;
    Ok(Job {
        id: Uuid::new_v4(),
        title: input.title,
        description: input.description,
        budget: input.budget,
        categories: input.categories,
        skills_required: input.skills_required,
        status: JobStatus::Open,
        employer,
        bid_accepted: false,
        created_at: now,
        updated_at: now,
    })
}

pub fn transition_job(job: &Job, to: JobStatus, now: DateTime<Utc>) -> Result<Job, MarketError> {
    if !job.status.can_transition_to(to) {
        return Err(MarketError::InvalidJobTransition {
            from: job.status,
            to,
        });
    }
    Ok(Job {
        status: to,
        updated_at: now,
        ..job.clone()
    })
}

/// `job_bids` must hold every bid already placed on `job`.
pub fn place_bid(
    job: &Job,
    job_bids: &[Bid],
    freelancer: UserId,
    input: NewBid,
    now: DateTime<Utc>,
) -> Result<Outcome<Bid>, MarketError> {
    if job.employer == freelancer {
        return Err(MarketError::Forbidden(
            "employers cannot bid on their own jobs".to_string(),
        ));
    }
    if job.status != JobStatus::Open {
        return Err(MarketError::JobNotOpen {
            job: job.id,
            status: job.status,
        });
    }
    if job_bids.iter().any(|b| b.freelancer == freelancer) {
        return Err(MarketError::DuplicateBid {
            job: job.id,
            freelancer,
        });
    }
    if !job.budget.contains(input.amount) {
        return Err(MarketError::OutOfRange {
            amount: input.amount,
            min: job.budget.min,
            max: job.budget.max,
        });
    }

    let proposal_text = input
        .proposal_text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let bid = Bid {
        id: Uuid::new_v4(),
        job: job.id,
        freelancer,
        amount: input.amount,
        status: BidStatus::Pending,
        proposal_text,
        created_at: now,
        updated_at: now,
    };
    let notification = Notification::new(job.employer, NotificationKind::BidReceived, &bid, now);
    Ok(Outcome {
        value: bid,
        notifications: vec![notification],
    })
}

/// Accepts or rejects `bid`. On acceptance every other pending bid in
/// `job_bids` is rejected and the job moves to in-progress.
pub fn decide_bid(
    job: &Job,
    bid: &Bid,
    job_bids: &[Bid],
    to: BidStatus,
    now: DateTime<Utc>,
) -> Result<Outcome<BidDecision>, MarketError> {
    // A losing acceptance reports the job's state, not its own rejected bid.
    if to == BidStatus::Accepted {
        if job.bid_accepted {
            return Err(MarketError::BidAlreadyAccepted { job: job.id });
        }
        if job.status != JobStatus::Open {
            return Err(MarketError::JobNotOpen {
                job: job.id,
                status: job.status,
            });
        }
    }
    if !bid.status.can_transition_to(to) {
        return Err(MarketError::InvalidBidTransition {
            bid: bid.id,
            from: bid.status,
            to,
        });
    }

    let decided = Bid {
        status: to,
        updated_at: now,
        ..bid.clone()
    };

    if to == BidStatus::Rejected {
        let notification =
            Notification::new(decided.freelancer, NotificationKind::BidRejected, &decided, now);
        return Ok(Outcome {
            value: BidDecision {
                bid: decided,
                job: job.clone(),
                rejected: Vec::new(),
            },
            notifications: vec![notification],
        });
    }

    let mut job = transition_job(job, JobStatus::InProgress, now)?;
    job.bid_accepted = true;

    let rejected: Vec<Bid> = job_bids
        .iter()
        .filter(|b| b.id != bid.id && b.status == BidStatus::Pending)
        .map(|b| Bid {
            status: BidStatus::Rejected,
            updated_at: now,
            ..b.clone()
        })
        .collect();

    let notifications = std::iter::once(Notification::new(
        decided.freelancer,
        NotificationKind::BidAccepted,
        &decided,
        now,
    ))
    .chain(
        rejected
            .iter()
            .map(|b| Notification::new(b.freelancer, NotificationKind::BidRejected, b, now)),
    )
    .collect();

    Ok(Outcome {
        value: BidDecision {
            bid: decided,
            job,
            rejected,
        },
        notifications,
    })
}
