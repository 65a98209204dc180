//! Asynchronous order processing: intake, worker and dead-letter observer.
//!
//! The intake validates submissions, records a pending order and enqueues a
//! processing job. The processor consumes jobs from the queue and drives the
//! reserve → pay → confirm pipeline, compensating reserved stock when a later
//! step fails transiently. The dead-letter observer marks orders failed once
//! the queue exhausts their retries.

mod dlq;
mod error;
mod intake;
mod payload;
mod payment;
mod processor;

pub use dlq::DeadLetterObserver;
pub use error::WorkerError;
pub use intake::{OrderIntake, Submitter, VIP_PRIORITY};
pub use payload::OrderJobPayload;
pub use payment::{
    FlakyPaymentGateway, NoopPaymentGateway, PaymentError, PaymentGateway, ScriptedPaymentGateway,
};
pub use processor::OrderProcessor;
