//! Delivery transport seam. The core only produces requests; sending them
//! (email, SMS, ...) is the transport's business.

use crate::core::router::SessionLabels;
use crate::errors::AppResult;
use crate::models::ids::UserId;
use crate::models::notification::DeliveryRequest;
use crate::models::work_session::WorkSession;
use std::sync::{Mutex, PoisonError};
use tracing::info;

pub trait DeliveryTransport: Send + Sync {
    fn send(&self, request: DeliveryRequest) -> AppResult<()>;
}

/// Default transport: writes the request to the diagnostic log.
#[derive(Debug, Default)]
pub struct LogTransport;

impl DeliveryTransport for LogTransport {
    fn send(&self, request: DeliveryRequest) -> AppResult<()> {
        info!(
            recipient = %request.recipient_id,
            subject = %request.subject,
            body = %request.body,
            "delivery request"
        );
        Ok(())
    }
}

/// Keeps every request in memory. Handy for dashboards embedding the
/// pipeline and for tests.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<DeliveryRequest>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<DeliveryRequest> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DeliveryTransport for RecordingTransport {
    fn send(&self, request: DeliveryRequest) -> AppResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        Ok(())
    }
}

/// Build the completion message for the project owner.
/// Missing names fall back to the raw ids.
pub fn compose_completion(
    recipient_id: &UserId,
    session: &WorkSession,
    labels: &SessionLabels,
) -> DeliveryRequest {
    let project = labels
        .project
        .clone()
        .unwrap_or_else(|| session.project_id.to_string());
    let component = labels
        .component
        .clone()
        .unwrap_or_else(|| session.component_id.to_string());
    let process = labels
        .process
        .clone()
        .unwrap_or_else(|| session.process_id.to_string());
    let assembler = labels
        .assembler
        .clone()
        .unwrap_or_else(|| session.assembler_id.to_string());
    let duration = session
        .duration_minutes
        .map(|m| m.to_string())
        .unwrap_or_else(|| "--".to_string());

    DeliveryRequest {
        recipient_id: recipient_id.clone(),
        subject: format!("Work Completed: {project}"),
        body: format!(
            "Work Session Completed\n\
             Project: {project}\n\
             Component: {component}\n\
             Process: {process}\n\
             Assembler: {assembler}\n\
             Parts Completed: {}\n\
             Duration: {duration} minutes\n",
            session.parts_completed
        ),
    }
}
