use crate::invariants::{
    assert_all_incident_invariants, assert_donation_invariant, assert_incident_immutable_fields,
    assert_store_invariants, assert_valid_status_transition,
};
use crate::queries::{donations_for_incident, funding_progress};
use crate::{
    Amount, Error, FundingPolicy, IncidentId, IncidentStatus, IncidentStore, MemoryStore,
    NewIncident, ReliefEngine, Severity,
};

fn setup() -> ReliefEngine<MemoryStore> {
    ReliefEngine::new(MemoryStore::new())
}

fn submission(amount_needed: Amount) -> NewIncident {
    NewIncident {
        beneficiary_id: "ben-1".to_string(),
        beneficiary_name: "John Doe".to_string(),
        location: "Port-au-Prince, Haiti".to_string(),
        cause: "Earthquake".to_string(),
        description: "We need food, water and medical supplies.".to_string(),
        severity: Severity::Critical,
        image_url: None,
        amount_needed,
    }
}

fn verified_incident(engine: &ReliefEngine<MemoryStore>, amount_needed: Amount) -> IncidentId {
    let incident = engine.submit_incident(submission(amount_needed)).unwrap();
    engine
        .verify_incident(&incident.id, "ngo-1", "Rebuild Together")
        .unwrap();
    incident.id
}

// ─────────────────────────────────────────────────────────
// Submission
// ─────────────────────────────────────────────────────────

#[test]
fn test_submit_incident_starts_submitted_and_unfunded() {
    let engine = setup();
    let incident = engine.submit_incident(submission(3_000)).unwrap();

    assert_eq!(incident.status, IncidentStatus::Submitted);
    assert_eq!(incident.amount_funded, 0);
    assert_eq!(incident.amount_needed, 3_000);
    assert!(incident.verifier_id.is_none());
    assert!(incident.verifier_name.is_none());
    assert_all_incident_invariants(&incident);
}

#[test]
fn test_submit_incident_assigns_unique_ids() {
    let engine = setup();
    let a = engine.submit_incident(submission(100)).unwrap();
    let b = engine.submit_incident(submission(100)).unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(engine.store().list_incidents().len(), 2);
}

#[test]
fn test_submit_incident_rejects_non_positive_amount() {
    let engine = setup();
    for amount in [0, -5] {
        let err = engine.submit_incident(submission(amount)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }
    assert!(engine.store().list_incidents().is_empty());
}

#[test]
fn test_submit_incident_rejects_blank_required_fields() {
    let engine = setup();

    let mut blank_location = submission(100);
    blank_location.location = "   ".to_string();
    let mut blank_cause = submission(100);
    blank_cause.cause = String::new();
    let mut blank_description = submission(100);
    blank_description.description = String::new();
    let mut blank_beneficiary = submission(100);
    blank_beneficiary.beneficiary_id = String::new();

    for bad in [blank_location, blank_cause, blank_description, blank_beneficiary] {
        let err = engine.submit_incident(bad).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }
    assert!(engine.store().list_incidents().is_empty());
}

// ─────────────────────────────────────────────────────────
// Verification
// ─────────────────────────────────────────────────────────

#[test]
fn test_verify_incident_sets_verifier() {
    let engine = setup();
    let submitted = engine.submit_incident(submission(1_000)).unwrap();

    let verified = engine
        .verify_incident(&submitted.id, "ngo-2", "Water Relief International")
        .unwrap();

    assert_eq!(verified.status, IncidentStatus::Verified);
    assert_eq!(verified.verifier_id.as_deref(), Some("ngo-2"));
    assert_eq!(
        verified.verifier_name.as_deref(),
        Some("Water Relief International")
    );
    assert_valid_status_transition(submitted.status, verified.status);
    assert_incident_immutable_fields(&submitted, &verified);
}

#[test]
fn test_verify_incident_twice_fails_and_keeps_first_verifier() {
    let engine = setup();
    let id = verified_incident(&engine, 1_000);

    let err = engine
        .verify_incident(&id, "ngo-evil", "Impostor")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            status: IncidentStatus::Verified,
            ..
        }
    ));

    let incident = engine.store().find_incident_by_id(&id).unwrap();
    assert_eq!(incident.verifier_id.as_deref(), Some("ngo-1"));
    assert_eq!(incident.verifier_name.as_deref(), Some("Rebuild Together"));
}

#[test]
fn test_verify_unknown_incident_is_not_found() {
    let engine = setup();
    let err = engine
        .verify_incident(&IncidentId::from("incident-404"), "ngo-1", "Rebuild Together")
        .unwrap_err();
    assert_eq!(err, Error::NotFound(IncidentId::from("incident-404")));
}

#[test]
fn test_verify_requires_verifier_identity() {
    let engine = setup();
    let incident = engine.submit_incident(submission(1_000)).unwrap();

    let err = engine.verify_incident(&incident.id, "", "Name").unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let unchanged = engine.store().find_incident_by_id(&incident.id).unwrap();
    assert_eq!(unchanged.status, IncidentStatus::Submitted);
}

// ─────────────────────────────────────────────────────────
// Donations
// ─────────────────────────────────────────────────────────

#[test]
fn test_donation_to_submitted_incident_is_rejected() {
    let engine = setup();
    let incident = engine.submit_incident(submission(1_000)).unwrap();

    let err = engine
        .apply_donation(&incident.id, "don-1", "Sarah Johnson", 100)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidState {
            status: IncidentStatus::Submitted,
            ..
        }
    ));
    assert!(engine.store().list_donations().is_empty());
    let unchanged = engine.store().find_incident_by_id(&incident.id).unwrap();
    assert_eq!(unchanged.amount_funded, 0);
}

#[test]
fn test_donation_rejects_non_positive_amount() {
    let engine = setup();
    let id = verified_incident(&engine, 1_000);

    for amount in [0, -1] {
        let err = engine
            .apply_donation(&id, "don-1", "Sarah Johnson", amount)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
    assert!(engine.store().list_donations().is_empty());
}

#[test]
fn test_donation_to_unknown_incident_is_not_found() {
    let engine = setup();
    let err = engine
        .apply_donation(&IncidentId::from("incident-404"), "don-1", "Sarah", 10)
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_donation_exactly_meeting_target_funds_incident() {
    let engine = setup();
    let id = verified_incident(&engine, 1_000);

    let receipt = engine.apply_donation(&id, "don-1", "Sarah", 1_000).unwrap();

    assert_eq!(receipt.incident.status, IncidentStatus::Funded);
    assert_eq!(receipt.incident.amount_funded, 1_000);
    assert_store_invariants(engine.store());
}

#[test]
fn test_donation_one_unit_short_stays_verified() {
    let engine = setup();
    let id = verified_incident(&engine, 1_000);

    let receipt = engine.apply_donation(&id, "don-1", "Sarah", 999).unwrap();

    assert_eq!(receipt.incident.status, IncidentStatus::Verified);
    assert_eq!(receipt.incident.amount_funded, 999);

    let receipt = engine.apply_donation(&id, "don-2", "Michael", 1).unwrap();
    assert_eq!(receipt.incident.status, IncidentStatus::Funded);
}

#[test]
fn test_each_donation_increases_funded_by_its_amount() {
    let engine = setup();
    let id = verified_incident(&engine, 10_000);

    for amount in [250, 1, 4_000, 17] {
        let before = engine.store().find_incident_by_id(&id).unwrap();
        let receipt = engine.apply_donation(&id, "don-1", "Sarah", amount).unwrap();
        assert_donation_invariant(before.amount_funded, receipt.incident.amount_funded, amount);
        assert_valid_status_transition(before.status, receipt.incident.status);
        assert_incident_immutable_fields(&before, &receipt.incident);
    }
    assert_store_invariants(engine.store());
}

#[test]
fn test_donation_overflowing_funded_amount_is_rejected_and_not_applied() {
    let engine = setup();
    let id = verified_incident(&engine, 10);
    engine.apply_donation(&id, "don-1", "Sarah", 1).unwrap();

    let err = engine
        .apply_donation(&id, "don-2", "Michael", Amount::MAX)
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    let incident = engine.store().find_incident_by_id(&id).unwrap();
    assert_eq!(incident.amount_funded, 1);
    assert_eq!(incident.status, IncidentStatus::Verified);
    assert_eq!(donations_for_incident(engine.store(), &id).len(), 1);
    assert_eq!(engine.store().list_donations().len(), 1);
    assert_store_invariants(engine.store());
}

#[test]
fn test_donation_records_are_complete() {
    let engine = setup();
    let id = verified_incident(&engine, 5_000);

    let first = engine.apply_donation(&id, "don-1", "Sarah", 100).unwrap().donation;
    let second = engine.apply_donation(&id, "don-1", "Sarah", 100).unwrap().donation;

    assert_eq!(first.incident_id, id);
    assert_eq!(first.donor_id, "don-1");
    assert_eq!(first.donor_name, "Sarah");
    assert_eq!(first.status, crate::DonationStatus::Completed);
    assert_ne!(first.id, second.id);
    assert_ne!(first.transaction_ref, second.transaction_ref);
}

#[test]
fn test_permissive_policy_accepts_donations_after_funded() {
    let engine = setup();
    let id = verified_incident(&engine, 500);
    engine.apply_donation(&id, "don-1", "Sarah", 500).unwrap();

    let receipt = engine.apply_donation(&id, "don-2", "Michael", 200).unwrap();

    assert_eq!(receipt.incident.status, IncidentStatus::Funded);
    assert_eq!(receipt.incident.amount_funded, 700);
    assert_eq!(funding_progress(&receipt.incident), 1.0);
    assert_store_invariants(engine.store());
}

#[test]
fn test_close_on_funded_policy_rejects_donations_after_funded() {
    let engine = ReliefEngine::new(MemoryStore::new()).with_policy(FundingPolicy::CloseOnFunded);
    let id = verified_incident(&engine, 500);
    engine.apply_donation(&id, "don-1", "Sarah", 500).unwrap();

    let err = engine.apply_donation(&id, "don-2", "Michael", 200).unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidState {
            status: IncidentStatus::Funded,
            ..
        }
    ));
    let incident = engine.store().find_incident_by_id(&id).unwrap();
    assert_eq!(incident.amount_funded, 500);
    assert_eq!(engine.store().list_donations().len(), 1);
}

#[test]
fn test_donation_to_completed_incident_is_rejected() {
    let engine = setup();
    let id = verified_incident(&engine, 500);
    engine.apply_donation(&id, "don-1", "Sarah", 500).unwrap();
    engine.release_funds(&id).unwrap();

    let err = engine.apply_donation(&id, "don-2", "Michael", 5).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            status: IncidentStatus::Completed,
            ..
        }
    ));
}

// ─────────────────────────────────────────────────────────
// Release
// ─────────────────────────────────────────────────────────

#[test]
fn test_release_funds_on_verified_incident_fails_and_leaves_status() {
    let engine = setup();
    let id = verified_incident(&engine, 5_000);
    engine.apply_donation(&id, "don-1", "Sarah", 1_000).unwrap();

    let err = engine.release_funds(&id).unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidState {
            status: IncidentStatus::Verified,
            ..
        }
    ));
    let incident = engine.store().find_incident_by_id(&id).unwrap();
    assert_eq!(incident.status, IncidentStatus::Verified);
    assert_eq!(incident.amount_funded, 1_000);
}

#[test]
fn test_release_funds_twice_fails() {
    let engine = setup();
    let id = verified_incident(&engine, 100);
    engine.apply_donation(&id, "don-1", "Sarah", 100).unwrap();
    engine.release_funds(&id).unwrap();

    let err = engine.release_funds(&id).unwrap_err();
    assert_eq!(err.code(), 3);
}

#[test]
fn test_release_unknown_incident_is_not_found() {
    let engine = setup();
    let err = engine.release_funds(&IncidentId::from("nope")).unwrap_err();
    assert_eq!(err.code(), 2);
}

// ─────────────────────────────────────────────────────────
// End-to-end scenarios
// ─────────────────────────────────────────────────────────

#[test]
fn test_scenario_single_donation_funds_then_completes() {
    let engine = setup();
    let id = verified_incident(&engine, 2_500);

    let receipt = engine.apply_donation(&id, "don-1", "Sarah Johnson", 2_500).unwrap();
    assert_eq!(receipt.incident.status, IncidentStatus::Funded);

    let donations = donations_for_incident(engine.store(), &id);
    assert_eq!(donations.len(), 1);
    assert_eq!(donations[0].amount, 2_500);

    let released = engine.release_funds(&id).unwrap();
    assert_eq!(released.status, IncidentStatus::Completed);
    assert_eq!(released.amount_funded, 2_500);
    assert!(released.status.is_terminal());
    assert_store_invariants(engine.store());
}

#[test]
fn test_scenario_partial_funding_reports_progress() {
    let engine = setup();
    let id = verified_incident(&engine, 5_000);

    engine.apply_donation(&id, "don-1", "Sarah Johnson", 1_000).unwrap();
    engine.apply_donation(&id, "don-2", "Michael Smith", 1_000).unwrap();

    let incident = engine.store().find_incident_by_id(&id).unwrap();
    assert_eq!(incident.status, IncidentStatus::Verified);
    assert_eq!(incident.amount_funded, 2_000);
    assert_eq!(donations_for_incident(engine.store(), &id).len(), 2);
    assert!((funding_progress(&incident) - 0.4).abs() < f64::EPSILON);
    assert_store_invariants(engine.store());
}
