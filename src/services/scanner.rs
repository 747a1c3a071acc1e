//! Expiry scanner: finds loans due soon and publishes one event per loan
//!
//! A run is a single batch sweep over the loans returned by the store; it
//! keeps no cursor between runs. A failed publish is logged and counted but
//! never stops the sweep.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    config::ScannerConfig,
    error::{AppError, AppResult},
    models::{
        event::{EventType, LoanEvent},
        loan::Loan,
    },
    ports::{EventPublisher, LoanReader},
};

/// Loans due in `1..=EXPIRING_WINDOW_DAYS` days are reported as expiring
pub const EXPIRING_WINDOW_DAYS: i64 = 2;

/// Event to emit for a loan due on `expiring`, seen from `today`
pub fn classify(expiring: NaiveDate, today: NaiveDate) -> Option<EventType> {
    match (expiring - today).num_days() {
        0 => Some(EventType::LoanExpired),
        1..=EXPIRING_WINDOW_DAYS => Some(EventType::LoanExpiring),
        _ => None,
    }
}

/// Outcome of one scanner run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Loans returned by the store for the window
    pub processed: usize,
    pub published: usize,
    pub failed: usize,
}

pub struct ExpiryScanner {
    loans: Arc<dyn LoanReader>,
    publisher: Arc<dyn EventPublisher>,
    config: ScannerConfig,
}

impl ExpiryScanner {
    pub fn new(
        loans: Arc<dyn LoanReader>,
        publisher: Arc<dyn EventPublisher>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            loans,
            publisher,
            config,
        }
    }

    /// Loans due within `window_days` of today, with the event each one calls for
    pub async fn scan(&self, window_days: u32) -> AppResult<Vec<(Loan, EventType)>> {
        self.scan_on(Utc::now().date_naive(), window_days).await
    }

    pub async fn scan_on(&self, today: NaiveDate, window_days: u32) -> AppResult<Vec<(Loan, EventType)>> {
        let until = today + chrono::Duration::days(i64::from(window_days));
        let loans = self.loans.find_expiring(today, until).await?;

        Ok(loans
            .into_iter()
            .filter(|loan| !loan.is_returned())
            .filter_map(|loan| classify(loan.expiring_day(), today).map(|t| (loan, t)))
            .collect())
    }

    /// Scan with the configured window and publish every resulting event
    pub async fn run(&self) -> AppResult<ScanReport> {
        self.run_on(Utc::now().date_naive()).await
    }

    pub async fn run_on(&self, today: NaiveDate) -> AppResult<ScanReport> {
        let matches = self.scan_on(today, self.config.window_days).await?;
        let mut report = ScanReport {
            processed: matches.len(),
            ..ScanReport::default()
        };

        tracing::info!(date = %today, loans = report.processed, "Processing due loans");

        for (loan, event_type) in matches {
            let event = LoanEvent::for_loan(&self.config.source, event_type, &loan);

            match self.publish(&event).await {
                Ok(()) => {
                    report.published += 1;
                    tracing::info!(
                        loan_id = %loan.id,
                        event_id = %event.event_id,
                        "Sent {}",
                        event_type
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        loan_id = %loan.id,
                        event_id = %event.event_id,
                        "Failed to publish {}: {}",
                        event_type,
                        e
                    );
                }
            }
        }

        Ok(report)
    }

    async fn publish(&self, event: &LoanEvent) -> AppResult<()> {
        let timeout = self.config.publish_timeout();
        tokio::time::timeout(timeout, self.publisher.publish(event))
            .await
            .map_err(|_| AppError::Timeout(format!("publish exceeded {:?}", timeout)))?
    }
}
