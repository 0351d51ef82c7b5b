use crate::{
    error::{Entity, MarketError},
    lifecycle::{self, Outcome},
    types::{
        Bid, BidDecision, BidId, BidStatus, Job, JobFilter, JobId, JobStatus, NewBid, NewJob,
        Notification, SortOrder, User, UserId, UserRole,
    },
};
use chrono::{DateTime, Utc};
use std::{cmp::Ordering, collections::HashMap};
use tracing::debug;

/// A one-shot, finite listing. Consuming it does not touch the state it was
/// taken from.
pub type Snapshot<T> = std::vec::IntoIter<T>;

pub fn newest_first_jobs(a: &Job, b: &Job) -> Ordering {
    (b.created_at, b.id).cmp(&(a.created_at, a.id))
}

pub fn oldest_first_bids(a: &Bid, b: &Bid) -> Ordering {
    (a.created_at, a.id).cmp(&(b.created_at, b.id))
}

/// The whole marketplace held in memory. Each mutating method either
/// applies all of its writes or none of them.
#[derive(Debug, Clone, Default)]
pub struct MarketState {
    users: HashMap<UserId, User>,
    jobs: HashMap<JobId, Job>,
    bids: HashMap<BidId, Bid>,
    notifications: Vec<Notification>,
}

impl MarketState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_user(
        &mut self,
        name: &str,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> Result<User, MarketError> {
        let user = lifecycle::new_user(name, role, now)?;
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn user(&self, id: UserId) -> Result<&User, MarketError> {
        self.users
            .get(&id)
            .ok_or(MarketError::not_found(Entity::User, id))
    }

    pub fn create_job(
        &mut self,
        employer: UserId,
        input: NewJob,
        now: DateTime<Utc>,
    ) -> Result<Job, MarketError> {
        let job = lifecycle::open_job(employer, input, now)?;
        debug!("Opened job {} for employer {}", job.id, employer);
        self.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    pub fn job(&self, id: JobId) -> Result<&Job, MarketError> {
        self.jobs
            .get(&id)
            .ok_or(MarketError::not_found(Entity::Job, id))
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> Snapshot<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .values()
            .filter(|j| filter.matches(j))
            .cloned()
            .collect();
        jobs.sort_by(newest_first_jobs);
        if let Some(limit) = filter.limit {
            jobs.truncate(limit as usize);
        }
        jobs.into_iter()
    }

    pub fn update_job_status(
        &mut self,
        id: JobId,
        to: JobStatus,
        now: DateTime<Utc>,
    ) -> Result<Job, MarketError> {
        let job = lifecycle::transition_job(self.job(id)?, to, now)?;
        self.jobs.insert(id, job.clone());
        Ok(job)
    }

    pub fn bid(&self, id: BidId) -> Result<&Bid, MarketError> {
        self.bids
            .get(&id)
            .ok_or(MarketError::not_found(Entity::Bid, id))
    }

    fn job_bids(&self, job: JobId) -> Vec<Bid> {
        let mut bids: Vec<Bid> = self
            .bids
            .values()
            .filter(|b| b.job == job)
            .cloned()
            .collect();
        bids.sort_by(oldest_first_bids);
        bids
    }

    pub fn create_bid(
        &mut self,
        freelancer: UserId,
        input: NewBid,
        now: DateTime<Utc>,
    ) -> Result<Bid, MarketError> {
        let job = self.job(input.job)?;
        let Outcome {
            value: bid,
            notifications,
        } = lifecycle::place_bid(job, &self.job_bids(job.id), freelancer, input, now)?;
        self.bids.insert(bid.id, bid.clone());
        self.notifications.extend(notifications);
        Ok(bid)
    }

    pub fn bids_for_job(&self, job: JobId, order: SortOrder) -> Result<Snapshot<Bid>, MarketError> {
        self.job(job)?;
        let mut bids = self.job_bids(job);
        if order == SortOrder::Descending {
            bids.reverse();
        }
        Ok(bids.into_iter())
    }

    pub fn bids_for_user(&self, freelancer: UserId) -> Snapshot<Bid> {
        let mut bids: Vec<Bid> = self
            .bids
            .values()
            .filter(|b| b.freelancer == freelancer)
            .cloned()
            .collect();
        bids.sort_by(|a, b| oldest_first_bids(b, a));
        bids.into_iter()
    }

    /// Newest bids placed on any job owned by `employer`.
    pub fn recent_bids(&self, employer: UserId, limit: usize) -> Snapshot<Bid> {
        let mut bids: Vec<Bid> = self
            .bids
            .values()
            .filter(|b| {
                self.jobs
                    .get(&b.job)
                    .is_some_and(|j| j.employer == employer)
            })
            .cloned()
            .collect();
        bids.sort_by(|a, b| oldest_first_bids(b, a));
        bids.truncate(limit);
        bids.into_iter()
    }

    pub fn set_bid_status(
        &mut self,
        id: BidId,
        to: BidStatus,
        now: DateTime<Utc>,
    ) -> Result<BidDecision, MarketError> {
        let bid = self.bid(id)?;
        let job = self.job(bid.job)?;
        let Outcome {
            value: decision,
            notifications,
        } = lifecycle::decide_bid(job, bid, &self.job_bids(job.id), to, now)?;

        self.jobs.insert(decision.job.id, decision.job.clone());
        self.bids.insert(decision.bid.id, decision.bid.clone());
        for rejected in &decision.rejected {
            self.bids.insert(rejected.id, rejected.clone());
        }
        self.notifications.extend(notifications);
        Ok(decision)
    }

    pub fn notifications(&self, user: UserId) -> Snapshot<Notification> {
        let mut out: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|n| n.recipient == user)
            .cloned()
            .collect();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        out.into_iter()
    }

    pub fn unread_count(&self, user: UserId) -> u64 {
        self.notifications
            .iter()
            .filter(|n| n.recipient == user && !n.read)
            .count() as u64
    }

    pub fn mark_notifications_read(&mut self, user: UserId) -> u64 {
        let mut changed = 0;
        for n in self
            .notifications
            .iter_mut()
            .filter(|n| n.recipient == user && !n.read)
        {
            n.read = true;
            changed += 1;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, types::Budget};
    use chrono::Duration;
    use proptest::prelude::*;

    struct Clock(DateTime<Utc>);

    impl Clock {
        fn new() -> Self {
            Clock(Utc::now())
        }

        fn tick(&mut self) -> DateTime<Utc> {
            self.0 += Duration::seconds(1);
            self.0
        }
    }

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

    fn titled(title: &str, category: &str) -> NewJob {
        NewJob {
            title: title.into(),
            categories: vec![category.into()],
            ..landing_page()
        }
    }

    #[test]
    fn landing_page_scenario() {
        let mut clock = Clock::new();
        let mut state = MarketState::new();
        let employer = state
            .register_user("Eve", UserRole::Employer, clock.tick())
            .unwrap();
        let freelancer = state
            .register_user("Fred", UserRole::Freelancer, clock.tick())
            .unwrap();

        let job = state
            .create_job(employer.id, landing_page(), clock.tick())
            .unwrap();
        assert_eq!(job.status, JobStatus::Open);
        assert!(!job.bid_accepted);

        let low = NewBid {
            job: job.id,
            amount: 50.0,
            proposal_text: None,
        };
        let err = state
            .create_bid(freelancer.id, low, clock.tick())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);

        let bid = state
            .create_bid(
                freelancer.id,
                NewBid {
                    job: job.id,
                    amount: 300.0,
                    proposal_text: None,
                },
                clock.tick(),
            )
            .unwrap();
        assert_eq!(bid.status, BidStatus::Pending);

        let decision = state
            .set_bid_status(bid.id, BidStatus::Accepted, clock.tick())
            .unwrap();
        assert_eq!(decision.bid.status, BidStatus::Accepted);
        assert_eq!(state.job(job.id).unwrap().status, JobStatus::InProgress);
        assert!(state.job(job.id).unwrap().bid_accepted);
        assert_eq!(state.bid(bid.id).unwrap().status, BidStatus::Accepted);
    }

    #[test]
    fn closed_job_refuses_bids() {
        let mut clock = Clock::new();
        let mut state = MarketState::new();
        let employer = UserId::new_v4();
        let job = state
            .create_job(employer, landing_page(), clock.tick())
            .unwrap();
        state
            .update_job_status(job.id, JobStatus::Closed, clock.tick())
            .unwrap();
        let err = state
            .create_bid(
                UserId::new_v4(),
                NewBid {
                    job: job.id,
                    amount: 300.0,
                    proposal_text: None,
                },
                clock.tick(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn invalid_job_is_not_stored() {
        let mut state = MarketState::new();
        let mut input = landing_page();
        input.budget = Budget::new(500.0, 100.0);
        match state.create_job(UserId::new_v4(), input, Utc::now()) {
            Err(MarketError::Validation(errors)) => assert!(errors.contains("budgetMax")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(state.list_jobs(&JobFilter::default()).len(), 0);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut state = MarketState::new();
        let id = uuid::Uuid::new_v4();
        assert_eq!(state.job(id).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            state
                .update_job_status(id, JobStatus::Closed, Utc::now())
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            state
                .set_bid_status(id, BidStatus::Accepted, Utc::now())
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert!(state.bids_for_job(id, SortOrder::Ascending).is_err());
    }

    #[test]
    fn listing_is_newest_first_and_filtered() {
        let mut clock = Clock::new();
        let mut state = MarketState::new();
        let alice = UserId::new_v4();
        let bob = UserId::new_v4();
        let first = state
            .create_job(alice, titled("First job", "Design"), clock.tick())
            .unwrap();
        let second = state
            .create_job(bob, titled("Second job", "Writing"), clock.tick())
            .unwrap();
        let third = state
            .create_job(alice, titled("Third job", "Design"), clock.tick())
            .unwrap();
        state
            .update_job_status(third.id, JobStatus::Closed, clock.tick())
            .unwrap();

        let all: Vec<JobId> = state.list_jobs(&JobFilter::default()).map(|j| j.id).collect();
        assert_eq!(all, vec![third.id, second.id, first.id]);

        let open: Vec<JobId> = state.list_jobs(&JobFilter::open()).map(|j| j.id).collect();
        assert_eq!(open, vec![second.id, first.id]);

        let alices: Vec<JobId> = state
            .list_jobs(&JobFilter::by_employer(alice))
            .map(|j| j.id)
            .collect();
        assert_eq!(alices, vec![third.id, first.id]);

        let design = JobFilter {
            category: Some("Design".into()),
            limit: Some(1),
            ..JobFilter::default()
        };
        let design: Vec<JobId> = state.list_jobs(&design).map(|j| j.id).collect();
        assert_eq!(design, vec![third.id]);
    }

    #[test]
    fn bid_listings_follow_requested_order() {
        let mut clock = Clock::new();
        let mut state = MarketState::new();
        let employer = UserId::new_v4();
        let job = state
            .create_job(employer, landing_page(), clock.tick())
            .unwrap();
        let ids: Vec<BidId> = [120.0, 240.0, 360.0]
            .iter()
            .map(|amount| {
                state
                    .create_bid(
                        UserId::new_v4(),
                        NewBid {
                            job: job.id,
                            amount: *amount,
                            proposal_text: None,
                        },
                        clock.tick(),
                    )
                    .unwrap()
                    .id
            })
            .collect();

        let asc: Vec<BidId> = state
            .bids_for_job(job.id, SortOrder::Ascending)
            .unwrap()
            .map(|b| b.id)
            .collect();
        assert_eq!(asc, ids);

        let desc: Vec<BidId> = state
            .bids_for_job(job.id, SortOrder::Descending)
            .unwrap()
            .map(|b| b.id)
            .collect();
        assert_eq!(desc, ids.iter().rev().cloned().collect::<Vec<_>>());

        let recent: Vec<BidId> = state.recent_bids(employer, 2).map(|b| b.id).collect();
        assert_eq!(recent, vec![ids[2], ids[1]]);
        assert_eq!(state.recent_bids(UserId::new_v4(), 10).len(), 0);
    }

    #[test]
    fn bids_for_user_spans_jobs() {
        let mut clock = Clock::new();
        let mut state = MarketState::new();
        let freelancer = UserId::new_v4();
        let a = state
            .create_job(UserId::new_v4(), landing_page(), clock.tick())
            .unwrap();
        let b = state
            .create_job(UserId::new_v4(), landing_page(), clock.tick())
            .unwrap();
        for job in [&a, &b] {
            state
                .create_bid(
                    freelancer,
                    NewBid {
                        job: job.id,
                        amount: 200.0,
                        proposal_text: None,
                    },
                    clock.tick(),
                )
                .unwrap();
        }
        let jobs: Vec<JobId> = state.bids_for_user(freelancer).map(|b| b.job).collect();
        assert_eq!(jobs, vec![b.id, a.id]);
    }

    #[test]
    fn notifications_track_unread() {
        let mut clock = Clock::new();
        let mut state = MarketState::new();
        let employer = UserId::new_v4();
        let winner = UserId::new_v4();
        let loser = UserId::new_v4();
        let job = state
            .create_job(employer, landing_page(), clock.tick())
            .unwrap();
        let mut place = |state: &mut MarketState, who: UserId| {
            state
                .create_bid(
                    who,
                    NewBid {
                        job: job.id,
                        amount: 300.0,
                        proposal_text: None,
                    },
                    clock.tick(),
                )
                .unwrap()
        };
        let won = place(&mut state, winner);
        let lost = place(&mut state, loser);
        assert_eq!(state.unread_count(employer), 2);

        state
            .set_bid_status(won.id, BidStatus::Accepted, Utc::now() + Duration::hours(1))
            .unwrap();
        assert_eq!(state.bid(lost.id).unwrap().status, BidStatus::Rejected);
        assert_eq!(state.unread_count(winner), 1);
        assert_eq!(state.unread_count(loser), 1);

        assert_eq!(state.mark_notifications_read(employer), 2);
        assert_eq!(state.unread_count(employer), 0);
        assert_eq!(state.mark_notifications_read(employer), 0);
        assert!(state.notifications(employer).all(|n| n.read));
    }

    #[derive(Debug, Clone)]
    enum Action {
        Bid { job: usize, who: usize, amount: f64 },
        Decide { bid: usize, accept: bool },
        Move { job: usize, to: usize },
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            (0usize..3, 0usize..5, 0.0f64..700.0)
                .prop_map(|(job, who, amount)| Action::Bid { job, who, amount }),
            (0usize..16, any::<bool>()).prop_map(|(bid, accept)| Action::Decide { bid, accept }),
            (0usize..3, 0usize..4).prop_map(|(job, to)| Action::Move { job, to }),
        ]
    }

    proptest! {
    #[test]
    fn accepted_bids_stay_unique(actions in prop::collection::vec(action(), 1..60)) {
        let statuses = [JobStatus::Open, JobStatus::InProgress, JobStatus::Completed, JobStatus::Closed];
        let mut clock = Clock::new();
        let mut state = MarketState::new();
        let freelancers: Vec<UserId> = (0..5).map(|_| UserId::new_v4()).collect();
        let jobs: Vec<JobId> = (0..3)
            .map(|_| state.create_job(UserId::new_v4(), landing_page(), clock.tick()).unwrap().id)
            .collect();
        let mut bids: Vec<BidId> = Vec::new();

        for action in actions {
            let before = state.clone();
            let res = match action {
                Action::Bid { job, who, amount } => state
                    .create_bid(freelancers[who], NewBid { job: jobs[job], amount, proposal_text: None }, clock.tick())
                    .map(|b| bids.push(b.id)),
                Action::Decide { bid, accept } if bid < bids.len() => {
                    let to = if accept { BidStatus::Accepted } else { BidStatus::Rejected };
                    state.set_bid_status(bids[bid], to, clock.tick()).map(|_| ())
                }
                Action::Decide { .. } => Ok(()),
                Action::Move { job, to } => state
                    .update_job_status(jobs[job], statuses[to], clock.tick())
                    .map(|_| ()),
            };
            if res.is_err() {
                prop_assert_eq!(state.bids.len(), before.bids.len());
                prop_assert_eq!(&state.jobs, &before.jobs);
            }

            for job in &jobs {
                let job = state.job(*job).unwrap();
                let accepted = state
                    .bids_for_job(job.id, SortOrder::Ascending)
                    .unwrap()
                    .filter(|b| b.status == BidStatus::Accepted)
                    .count();
                prop_assert!(accepted <= 1);
                prop_assert_eq!(job.bid_accepted, accepted == 1);
                if accepted == 1 {
                    prop_assert!(job.status != JobStatus::Open);
                }
            }
        }
    }

    #[test]
    fn listing_twice_gives_same_sequence(n in 1usize..12) {
        let mut state = MarketState::new();
        // Equal timestamps force the id tie-break.
        let now = Utc::now();
        for _ in 0..n {
            state.create_job(UserId::new_v4(), landing_page(), now).unwrap();
        }
        let first: Vec<Job> = state.list_jobs(&JobFilter::open()).collect();
        let second: Vec<Job> = state.list_jobs(&JobFilter::open()).collect();
        prop_assert_eq!(first, second);
    }
    }
}
