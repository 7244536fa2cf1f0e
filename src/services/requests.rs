//! Assistance request rules and service

use crate::domain::error::{StoreError, WelcomeError, WelcomeResult};
use crate::domain::headcount::ServiceId;
use crate::domain::request::{NewRequest, RequestId, RequestStatus, ServiceRequest};
use crate::infra::metrics::Metrics;
use crate::io::store::{RealtimeStore, Subscription};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

pub fn can_resolve_request(request: &ServiceRequest) -> bool {
    request.status == RequestStatus::Pending
}

/// Age of a request for display: `just now`, `12m ago`, `1h 5m ago`
pub fn format_time_elapsed(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created_at).num_seconds();
    let mins = secs.div_euclid(60);
    let hours = mins.div_euclid(60);

    if secs < 60 {
        "just now".to_string()
    } else if mins < 60 {
        format!("{}m ago", mins)
    } else {
        format!("{}h {}m ago", hours, mins % 60)
    }
}

/// Oldest first; stable for equal timestamps
pub fn sort_requests_by_time(requests: &[ServiceRequest]) -> Vec<ServiceRequest> {
    let mut sorted = requests.to_vec();
    sorted.sort_by_key(|r| r.created_at);
    sorted
}

pub fn pending_requests(requests: &[ServiceRequest]) -> Vec<ServiceRequest> {
    requests.iter().filter(|r| r.status == RequestStatus::Pending).cloned().collect()
}

pub fn resolved_requests(requests: &[ServiceRequest]) -> Vec<ServiceRequest> {
    requests.iter().filter(|r| r.status == RequestStatus::Resolved).cloned().collect()
}

/// Problems with a request before it is raised; empty when acceptable
pub fn validate_new_request(request: &NewRequest) -> Vec<String> {
    let mut errors = Vec::new();
    let layout = request.section.layout();
    if layout.seats_in_row(request.row).is_none() {
        errors.push(format!("row {} does not exist in the {} section", request.row, request.section));
    }
    if request.quantity == 0 {
        errors.push("quantity must be at least 1".to_string());
    } else if request.quantity > 1 && !request.request_type.is_quantifiable() {
        errors.push(format!("{} requests cannot have a quantity", request.request_type));
    }
    errors
}

/// Request writes against the real-time store
pub struct RequestService {
    store: Arc<dyn RealtimeStore>,
    metrics: Arc<Metrics>,
}

impl RequestService {
    pub fn new(store: Arc<dyn RealtimeStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    pub fn subscribe_requests(&self, service: &ServiceId) -> WelcomeResult<Subscription<Vec<ServiceRequest>>> {
        Ok(self.store.subscribe_requests(service)?)
    }

    /// Raise a request; the note and area label are trimmed
    pub async fn submit_request(&self, service: &ServiceId, mut request: NewRequest) -> WelcomeResult<ServiceRequest> {
        let errors = validate_new_request(&request);
        if !errors.is_empty() {
            warn!(service = %service, errors = %errors.join("; "), "request_rejected");
            return Err(WelcomeError::InvalidRequest(errors));
        }

        request.note = request.note.trim().to_string();
        request.area_label = request.area_label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());

        let stored = self.store.add_request(service, request).await.map_err(|e| {
            self.metrics.record_store_error();
            error!(service = %service, error = %e, "request_submit_failed");
            WelcomeError::from(e)
        })?;

        self.metrics.record_request_submitted();
        info!(
            service = %service,
            id = %stored.id,
            request_type = %stored.request_type,
            section = %stored.section,
            row = %stored.row,
            quantity = %stored.quantity,
            "request_submitted"
        );
        Ok(stored)
    }

    pub async fn resolve_request(&self, service: &ServiceId, id: &RequestId) -> WelcomeResult<ServiceRequest> {
        let resolved = match self.store.resolve_request(service, id).await {
            Ok(resolved) => resolved,
            Err(StoreError::NotFound(_)) => return Err(WelcomeError::RequestNotFound(id.to_string())),
            Err(StoreError::Conflict(_)) => return Err(WelcomeError::RequestAlreadyResolved(id.to_string())),
            Err(e) => {
                self.metrics.record_store_error();
                error!(service = %service, id = %id, error = %e, "request_resolve_failed");
                return Err(e.into());
            }
        };

        self.metrics.record_request_resolved();
        info!(service = %service, id = %id, "request_resolved");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::RequestType;
    use crate::domain::seat::SectionName;
    use crate::infra::clock::ManualClock;
    use crate::io::memory_store::InMemoryStore;
    use crate::services::reconcile::fixtures::at;
    use chrono::Duration;

    fn new_request(request_type: RequestType, quantity: u32) -> NewRequest {
        NewRequest {
            section: SectionName::Left,
            row: 3,
            area_label: None,
            request_type,
            quantity,
            note: String::new(),
        }
    }

    fn stored(id: &str, secs: i64, status: RequestStatus) -> ServiceRequest {
        ServiceRequest {
            id: RequestId(id.to_string()),
            section: SectionName::Middle,
            row: 1,
            area_label: None,
            request_type: RequestType::Pen,
            quantity: 1,
            note: String::new(),
            status,
            created_at: at(secs),
            resolved_at: None,
        }
    }

    #[test]
    fn test_format_time_elapsed() {
        let created = at(0);
        assert_eq!(format_time_elapsed(created, created + Duration::seconds(59)), "just now");
        assert_eq!(format_time_elapsed(created, created + Duration::seconds(60)), "1m ago");
        assert_eq!(format_time_elapsed(created, created + Duration::minutes(59)), "59m ago");
        assert_eq!(format_time_elapsed(created, created + Duration::minutes(65)), "1h 5m ago");
        assert_eq!(format_time_elapsed(created, created + Duration::minutes(180)), "3h 0m ago");
        // Clock skew makes a request look slightly in the future
        assert_eq!(format_time_elapsed(created, created - Duration::seconds(5)), "just now");
    }

    #[test]
    fn test_sort_and_filter() {
        let requests = vec![
            stored("b", 20, RequestStatus::Pending),
            stored("a", 10, RequestStatus::Resolved),
            stored("c", 30, RequestStatus::Pending),
        ];
        let ids: Vec<String> = sort_requests_by_time(&requests).into_iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        assert_eq!(pending_requests(&requests).len(), 2);
        assert_eq!(resolved_requests(&requests)[0].id.0, "a");
        assert!(can_resolve_request(&requests[0]));
        assert!(!can_resolve_request(&requests[1]));
    }

    #[test]
    fn test_validate_new_request() {
        assert!(validate_new_request(&new_request(RequestType::SermonNotes, 3)).is_empty());
        assert!(validate_new_request(&new_request(RequestType::Prayer, 1)).is_empty());

        let errors = validate_new_request(&new_request(RequestType::Prayer, 2));
        assert_eq!(errors, vec!["Prayer requests cannot have a quantity".to_string()]);

        let errors = validate_new_request(&new_request(RequestType::Pen, 0));
        assert_eq!(errors, vec!["quantity must be at least 1".to_string()]);

        let mut off_map = new_request(RequestType::Pen, 1);
        off_map.section = SectionName::Right;
        off_map.row = 14;
        assert_eq!(validate_new_request(&off_map).len(), 1);
    }

    #[tokio::test]
    async fn test_submit_and_resolve() {
        let clock = Arc::new(ManualClock::new(at(0)));
        let store = Arc::new(InMemoryStore::new(clock.clone()));
        let metrics = Arc::new(Metrics::new());
        let svc = RequestService::new(store, metrics.clone());
        let service = ServiceId::new("service-2026-10-18");

        let mut request = new_request(RequestType::OfferingEnvelope, 2);
        request.note = "  aisle side  ".to_string();
        request.area_label = Some("   ".to_string());
        let raised = svc.submit_request(&service, request).await.unwrap();
        assert_eq!(raised.note, "aisle side");
        assert!(raised.area_label.is_none());
        assert_eq!(raised.status, RequestStatus::Pending);

        clock.advance(Duration::minutes(4));
        let resolved = svc.resolve_request(&service, &raised.id).await.unwrap();
        assert_eq!(resolved.status, RequestStatus::Resolved);
        assert_eq!(format_time_elapsed(raised.created_at, resolved.resolved_at.unwrap()), "4m ago");

        let err = svc.resolve_request(&service, &raised.id).await.unwrap_err();
        assert_eq!(err, WelcomeError::RequestAlreadyResolved(raised.id.to_string()));
        let err = svc.resolve_request(&service, &RequestId("nope".into())).await.unwrap_err();
        assert_eq!(err, WelcomeError::RequestNotFound("nope".to_string()));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_submitted, 1);
        assert_eq!(snapshot.requests_resolved, 1);
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_stored() {
        let store = Arc::new(InMemoryStore::new(Arc::new(ManualClock::new(at(0)))));
        let svc = RequestService::new(store, Arc::new(Metrics::new()));
        let service = ServiceId::new("service-2026-10-18");

        let err = svc.submit_request(&service, new_request(RequestType::Other, 5)).await.unwrap_err();
        assert!(matches!(err, WelcomeError::InvalidRequest(ref errors) if errors.len() == 1));
        let mut sub = svc.subscribe_requests(&service).unwrap();
        assert!(sub.latest().unwrap().is_empty());
    }
}
