//! In-memory stand-ins for the pipeline capabilities, used by unit tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        event::LoanEvent,
        loan::{Loan, LoanStatus},
        notification::{EmailMessage, NotificationContext},
    },
    ports::{Delivery, EventConsumer, EventPublisher, LoanReader, Mailer},
};

/// Active loan due `days` after `today`, at `hour` UTC
pub fn loan_due(today: NaiveDate, days: i64, hour: u32) -> Loan {
    let due_day = today + Duration::days(days);
    let expiring_date: DateTime<Utc> = Utc
        .from_utc_datetime(&due_day.and_hms_opt(hour, 0, 0).expect("valid hour"));

    Loan {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        book_copy_id: Uuid::new_v4(),
        status: LoanStatus::Active,
        loan_date: expiring_date - Duration::days(14),
        expiring_date,
        return_date: None,
        created_at: expiring_date - Duration::days(14),
    }
}

struct StoredLoan {
    loan: Loan,
    email: String,
    title: String,
}

/// Loan store holding loans with their borrower email and book title
#[derive(Default)]
pub struct MemoryLoanStore {
    loans: Mutex<HashMap<Uuid, StoredLoan>>,
    fail_reads: Mutex<bool>,
}

impl MemoryLoanStore {
    pub async fn insert_loan(&self, loan: Loan, email: &str, title: &str) {
        self.loans.lock().await.insert(
            loan.id,
            StoredLoan {
                loan,
                email: email.to_string(),
                title: title.to_string(),
            },
        );
    }

    pub async fn mark_returned(&self, loan_id: Uuid) {
        if let Some(stored) = self.loans.lock().await.get_mut(&loan_id) {
            stored.loan.status = LoanStatus::Returned;
            stored.loan.return_date = Some(Utc::now());
        }
    }

    /// Make every read fail as if the database were unreachable
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.fail_reads.lock().await = unavailable;
    }

    async fn check_available(&self) -> AppResult<()> {
        if *self.fail_reads.lock().await {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl LoanReader for MemoryLoanStore {
    async fn find_expiring(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Loan>> {
        self.check_available().await?;
        let mut due: Vec<Loan> = self
            .loans
            .lock()
            .await
            .values()
            .map(|stored| stored.loan.clone())
            .filter(|loan| loan.return_date.is_none())
            .filter(|loan| (from..=to).contains(&loan.expiring_day()))
            .collect();
        due.sort_by_key(|loan| loan.expiring_date);
        Ok(due)
    }

    async fn notification_context(&self, loan_id: Uuid) -> AppResult<Option<NotificationContext>> {
        self.check_available().await?;
        Ok(self.loans.lock().await.get(&loan_id).map(|stored| NotificationContext {
            loan_id,
            email: stored.email.clone(),
            book_title: stored.title.clone(),
            expiring_date: stored.loan.expiring_date,
            return_date: stored.loan.return_date,
        }))
    }
}

/// Queue with manual acknowledgment: received messages stay unacked until
/// `ack`, and `redeliver_unacked` hands the unacked ones out again
#[derive(Default)]
pub struct MemoryChannel {
    queue: Mutex<VecDeque<Delivery>>,
    unacked: Mutex<HashMap<String, Delivery>>,
    acked: Mutex<Vec<String>>,
    published: Mutex<Vec<LoanEvent>>,
    publish_delay: Mutex<Option<std::time::Duration>>,
    next_id: AtomicUsize,
    receives: AtomicUsize,
}

impl MemoryChannel {
    /// Enqueue a raw payload as if a producer had published it
    pub async fn push_raw(&self, body: &[u8]) -> String {
        let id = format!("{}-0", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.queue.lock().await.push_back(Delivery {
            id: id.clone(),
            body: Some(body.to_vec()),
        });
        id
    }

    pub async fn set_publish_delay(&self, delay: std::time::Duration) {
        *self.publish_delay.lock().await = Some(delay);
    }

    pub async fn published(&self) -> Vec<LoanEvent> {
        self.published.lock().await.clone()
    }

    pub async fn acked(&self) -> Vec<String> {
        self.acked.lock().await.clone()
    }

    pub async fn unacked_count(&self) -> usize {
        self.unacked.lock().await.len()
    }

    pub async fn queued_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub fn receive_count(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }

    /// Requeue every delivered but unacknowledged message
    pub async fn redeliver_unacked(&self) {
        let mut unacked = self.unacked.lock().await;
        let mut queue = self.queue.lock().await;
        let mut pending: Vec<Delivery> = unacked.drain().map(|(_, d)| d).collect();
        pending.sort_by(|a, b| a.id.cmp(&b.id));
        queue.extend(pending);
    }
}

#[async_trait]
impl EventPublisher for MemoryChannel {
    async fn publish(&self, event: &LoanEvent) -> AppResult<()> {
        let delay = *self.publish_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.push_raw(event.to_json()?.as_bytes()).await;
        self.published.lock().await.push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl EventConsumer for MemoryChannel {
    async fn receive(&self) -> AppResult<Vec<Delivery>> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        let batch: Vec<Delivery> = self.queue.lock().await.drain(..).collect();
        if batch.is_empty() {
            // Stand-in for a blocking read that times out
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            return Ok(batch);
        }

        let mut unacked = self.unacked.lock().await;
        for delivery in &batch {
            unacked.insert(delivery.id.clone(), delivery.clone());
        }
        Ok(batch)
    }

    async fn ack(&self, delivery_id: &str) -> AppResult<()> {
        self.unacked.lock().await.remove(delivery_id);
        self.acked.lock().await.push(delivery_id.to_string());
        Ok(())
    }
}

/// Channel whose receive claims queued entries first and only returns them
/// after `hold`, like a blocking stream read that already has its reply in
/// flight. Dropping a receive in between loses the claimed entries.
pub struct ClaimingChannel {
    queue: Mutex<VecDeque<Delivery>>,
    acked: Mutex<Vec<String>>,
    hold: std::time::Duration,
    next_id: AtomicUsize,
}

impl ClaimingChannel {
    pub fn new(hold: std::time::Duration) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            acked: Mutex::new(Vec::new()),
            hold,
            next_id: AtomicUsize::new(0),
        }
    }

    pub async fn push_raw(&self, body: &[u8]) {
        let id = format!("{}-0", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.queue.lock().await.push_back(Delivery {
            id,
            body: Some(body.to_vec()),
        });
    }

    pub async fn acked(&self) -> Vec<String> {
        self.acked.lock().await.clone()
    }
}

#[async_trait]
impl EventConsumer for ClaimingChannel {
    async fn receive(&self) -> AppResult<Vec<Delivery>> {
        loop {
            let claimed: Vec<Delivery> = self.queue.lock().await.drain(..).collect();
            if !claimed.is_empty() {
                tokio::time::sleep(self.hold).await;
                return Ok(claimed);
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    async fn ack(&self, delivery_id: &str) -> AppResult<()> {
        self.acked.lock().await.push(delivery_id.to_string());
        Ok(())
    }
}

/// Mailer that records every message; optionally fails or waits for a
/// permit before completing each send
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failures_left: AtomicUsize,
    gate: Option<Semaphore>,
    started: AtomicUsize,
}

impl RecordingMailer {
    /// Every send blocks until a permit is released through `release`
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    /// Sends that have begun, finished or not
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?
                .forget();
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Mail("relay refused connection".to_string()));
        }

        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}
