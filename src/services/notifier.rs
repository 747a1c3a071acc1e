//! Notifier: turns loan events into borrower emails
//!
//! Every delivery is handled by its own task. A delivery is acknowledged
//! once it is either fully handled (email sent) or known to be useless
//! (malformed, unknown type, loan gone). Transient failures leave it
//! unacknowledged so the channel hands it out again later.
//!
//! On shutdown the receive loop stops first, then every spawned handler is
//! awaited before [`Notifier::run`] returns.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::{
    sync::{watch, Mutex},
    task::JoinSet,
};

use crate::{
    config::{EmailConfig, NotifierConfig},
    error::{AppError, AppResult},
    models::event::LoanEvent,
    ports::{Delivery, EventConsumer, LoanReader, Mailer},
};

/// What happened to a single delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Email sent, delivery acknowledged
    Sent,
    /// Permanently unprocessable, acknowledged without sending
    Dropped(String),
    /// Transient failure, left unacknowledged for redelivery
    Retry(String),
}

impl Outcome {
    fn should_ack(&self) -> bool {
        !matches!(self, Outcome::Retry(_))
    }
}

pub struct Notifier {
    consumer: Arc<dyn EventConsumer>,
    loans: Arc<dyn LoanReader>,
    mailer: Arc<dyn Mailer>,
    send_timeout: Duration,
    receive_retry_delay: Duration,
    /// Deliveries currently being handled, so a redelivery sweep does not
    /// start a second handler for the same message
    in_flight: Mutex<HashSet<String>>,
}

impl Notifier {
    pub fn new(
        consumer: Arc<dyn EventConsumer>,
        loans: Arc<dyn LoanReader>,
        mailer: Arc<dyn Mailer>,
        email: &EmailConfig,
        config: &NotifierConfig,
    ) -> Self {
        Self {
            consumer,
            loans,
            mailer,
            send_timeout: email.send_timeout(),
            receive_retry_delay: config.receive_retry_delay(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Consume until `shutdown` flips to `true` (or its sender is dropped),
    /// then wait for every in-flight handler.
    ///
    /// A receive is only ever dropped at shutdown. Finished handlers are
    /// reaped while the same receive keeps running, since a blocking read
    /// that is abandoned halfway may already have claimed entries.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut tasks = JoinSet::new();
        let mut receiving = self.consumer.receive();
        tracing::info!("Notifier started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join_error(joined);
                }
                received = &mut receiving => {
                    match received {
                        Ok(batch) => {
                            for delivery in batch {
                                if !self.in_flight.lock().await.insert(delivery.id.clone()) {
                                    tracing::debug!(delivery_id = %delivery.id, "Already in flight, skipping");
                                    continue;
                                }
                                let notifier = Arc::clone(&self);
                                tasks.spawn(async move {
                                    let id = delivery.id.clone();
                                    notifier.handle(delivery).await;
                                    notifier.in_flight.lock().await.remove(&id);
                                });
                            }
                        }
                        Err(e) => {
                            tracing::error!("Failed to receive events: {}", e);
                            tokio::select! {
                                _ = tokio::time::sleep(self.receive_retry_delay) => {}
                                _ = shutdown.changed() => {}
                            }
                        }
                    }
                    receiving = self.consumer.receive();
                }
            }
        }

        // Whatever the abandoned receive claimed stays unacknowledged and is
        // redelivered on the next start
        drop(receiving);

        tracing::info!(in_flight = tasks.len(), "Shutting down, waiting for handlers");
        while let Some(joined) = tasks.join_next().await {
            log_join_error(joined);
        }
        tracing::info!("All handlers finished");
    }

    /// Process one delivery and acknowledge it unless it must be retried
    pub async fn handle(&self, delivery: Delivery) -> Outcome {
        let outcome = self.process(&delivery).await;

        match &outcome {
            Outcome::Sent => {
                tracing::info!(delivery_id = %delivery.id, "Notification sent");
            }
            Outcome::Dropped(reason) => {
                tracing::warn!(delivery_id = %delivery.id, "Dropping event: {}", reason);
            }
            Outcome::Retry(reason) => {
                tracing::warn!(delivery_id = %delivery.id, "Leaving event for redelivery: {}", reason);
            }
        }

        if outcome.should_ack() {
            if let Err(e) = self.consumer.ack(&delivery.id).await {
                // The delivery comes back later and is processed again
                tracing::error!(delivery_id = %delivery.id, "Failed to acknowledge event: {}", e);
            }
        }

        outcome
    }

    async fn process(&self, delivery: &Delivery) -> Outcome {
        let Some(body) = delivery.body.as_deref() else {
            return Outcome::Dropped("delivery has no payload".to_string());
        };

        tracing::debug!(
            delivery_id = %delivery.id,
            "Received event: {}",
            String::from_utf8_lossy(body)
        );

        let event = match LoanEvent::decode(body) {
            Ok(event) => event,
            // Malformed JSON or an unknown type never becomes valid on retry
            Err(e) => return Outcome::Dropped(e.to_string()),
        };

        let loan_id = event.payload.loan_id;
        let context = match self.loans.notification_context(loan_id).await {
            Ok(Some(context)) => context,
            Ok(None) => return Outcome::Dropped(format!("loan {} not found", loan_id)),
            Err(e) => return classify_error(e),
        };

        if context.return_date.is_some() {
            return Outcome::Dropped(format!("loan {} already returned", loan_id));
        }

        let message = context.render(event.event_type);
        let sent = tokio::time::timeout(self.send_timeout, self.mailer.send(&message))
            .await
            .unwrap_or_else(|_| {
                Err(AppError::Timeout(format!("email send exceeded {:?}", self.send_timeout)))
            });

        match sent {
            Ok(()) => {
                tracing::info!(
                    loan_id = %loan_id,
                    event_id = %event.event_id,
                    "Sent {} email",
                    event.event_type
                );
                Outcome::Sent
            }
            Err(e) => classify_error(e),
        }
    }
}

fn classify_error(error: AppError) -> Outcome {
    if error.is_transient() {
        Outcome::Retry(error.to_string())
    } else {
        Outcome::Dropped(error.to_string())
    }
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("Event handler task failed: {}", e);
    }
}

/// Resolve once SIGINT or SIGTERM is received
pub async fn shutdown_signal() -> AppResult<()> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to listen for Ctrl+C: {}", e)))
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map_err(|e| AppError::Internal(format!("Failed to listen for SIGTERM: {}", e)))?
            .recv()
            .await;
        Ok(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<AppResult<()>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}
