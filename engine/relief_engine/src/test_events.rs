use std::sync::Arc;

use crate::{
    EventKind, IncidentStatus, MemorySink, MemoryStore, NewIncident, ReliefEngine, Severity,
};

fn setup() -> (ReliefEngine<MemoryStore>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let engine = ReliefEngine::new(MemoryStore::new()).with_event_sink(sink.clone());
    (engine, sink)
}

fn drought() -> NewIncident {
    NewIncident {
        beneficiary_id: "ben-3".to_string(),
        beneficiary_name: "Ahmed Hassan".to_string(),
        location: "Cairo, Egypt".to_string(),
        cause: "Drought".to_string(),
        description: "Water sources depleted.".to_string(),
        severity: Severity::Medium,
        image_url: None,
        amount_needed: 2_500,
    }
}

#[test]
fn test_incident_submitted_event() {
    let (engine, sink) = setup();
    let incident = engine.submit_incident(drought()).unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.kind, EventKind::IncidentSubmitted);
    assert_eq!(event.incident, incident);
    assert_eq!(event.actor.as_deref(), Some("ben-3"));
    assert!(event.donation.is_none());
}

#[test]
fn test_incident_verified_event() {
    let (engine, sink) = setup();
    let incident = engine.submit_incident(drought()).unwrap();
    engine
        .verify_incident(&incident.id, "ngo-2", "Water Relief International")
        .unwrap();

    let last = sink.events().pop().expect("No events found");
    assert_eq!(last.kind, EventKind::IncidentVerified);
    assert_eq!(last.actor.as_deref(), Some("ngo-2"));
    assert_eq!(last.incident.status, IncidentStatus::Verified);
}

#[test]
fn test_donation_events_include_funded_once_target_met() {
    let (engine, sink) = setup();
    let incident = engine.submit_incident(drought()).unwrap();
    engine.verify_incident(&incident.id, "ngo-2", "Water Relief").unwrap();
    engine.apply_donation(&incident.id, "don-1", "Sarah", 1_000).unwrap();
    let receipt = engine.apply_donation(&incident.id, "don-2", "Michael", 1_500).unwrap();

    assert_eq!(
        sink.kinds(),
        vec![
            EventKind::IncidentSubmitted,
            EventKind::IncidentVerified,
            EventKind::DonationReceived,
            EventKind::DonationReceived,
            EventKind::IncidentFunded,
        ]
    );

    let events = sink.events();
    let donation_event = &events[3];
    assert_eq!(donation_event.amount, Some(1_500));
    assert_eq!(donation_event.actor.as_deref(), Some("don-2"));
    assert_eq!(donation_event.donation.as_ref(), Some(&receipt.donation));
    assert_eq!(donation_event.incident.amount_funded, 2_500);
}

#[test]
fn test_overfunding_does_not_repeat_funded_event() {
    let (engine, sink) = setup();
    let incident = engine.submit_incident(drought()).unwrap();
    engine.verify_incident(&incident.id, "ngo-2", "Water Relief").unwrap();
    engine.apply_donation(&incident.id, "don-1", "Sarah", 2_500).unwrap();
    engine.apply_donation(&incident.id, "don-1", "Sarah", 10).unwrap();

    let funded_events = sink
        .kinds()
        .into_iter()
        .filter(|k| *k == EventKind::IncidentFunded)
        .count();
    assert_eq!(funded_events, 1);
}

#[test]
fn test_funds_released_event_names_verifier() {
    let (engine, sink) = setup();
    let incident = engine.submit_incident(drought()).unwrap();
    engine.verify_incident(&incident.id, "ngo-2", "Water Relief").unwrap();
    engine.apply_donation(&incident.id, "don-1", "Sarah", 2_500).unwrap();
    engine.release_funds(&incident.id).unwrap();

    let last = sink.events().pop().expect("No events found");
    assert_eq!(last.kind, EventKind::FundsReleased);
    assert_eq!(last.actor.as_deref(), Some("ngo-2"));
    assert_eq!(last.incident.status, IncidentStatus::Completed);
}

#[test]
fn test_rejected_transitions_emit_nothing() {
    let (engine, sink) = setup();
    let incident = engine.submit_incident(drought()).unwrap();

    assert!(engine.apply_donation(&incident.id, "don-1", "Sarah", 10).is_err());
    assert!(engine.release_funds(&incident.id).is_err());

    assert_eq!(sink.kinds(), vec![EventKind::IncidentSubmitted]);
}

#[test]
fn test_event_kind_storage_names() {
    assert_eq!(EventKind::IncidentSubmitted.as_str(), "incident_submitted");
    assert_eq!(EventKind::DonationReceived.as_str(), "donation_received");
    assert_eq!(EventKind::FundsReleased.as_str(), "funds_released");
}
