//! Demo data set: three incidents in different lifecycle stages.
//!
//! Everything is replayed through the engine so the usual invariants hold
//! (funded amounts match donations, verifiers are recorded).

use relief_engine::{IncidentStore, NewIncident, ReliefEngine, Severity};
use tracing::info;

use crate::errors::Result;

struct DemoDonation {
    donor_id: &'static str,
    donor_name: &'static str,
    amount: i64,
}

struct DemoIncident {
    beneficiary: (&'static str, &'static str),
    location: &'static str,
    cause: &'static str,
    description: &'static str,
    severity: Severity,
    image_url: &'static str,
    amount_needed: i64,
    verifier: Option<(&'static str, &'static str)>,
    donations: &'static [DemoDonation],
}

const DEMO: &[DemoIncident] = &[
    DemoIncident {
        beneficiary: ("ben-1", "John Doe"),
        location: "Port-au-Prince, Haiti",
        cause: "Earthquake",
        description: "A 7.2 magnitude earthquake has devastated our community. We need immediate support for food, water, and medical supplies.",
        severity: Severity::Critical,
        image_url: "https://images.unsplash.com/photo-1500673922987-e212871fec22",
        amount_needed: 5000,
        verifier: Some(("ngo-1", "Rebuild Together")),
        donations: &[
            DemoDonation { donor_id: "don-1", donor_name: "Sarah Johnson", amount: 1000 },
            DemoDonation { donor_id: "don-2", donor_name: "Michael Smith", amount: 1000 },
        ],
    },
    DemoIncident {
        beneficiary: ("ben-2", "Maria Garcia"),
        location: "Manila, Philippines",
        cause: "Typhoon",
        description: "Typhoon Yagi has flooded our village, destroying homes and infrastructure. We need help with temporary shelter and clean water.",
        severity: Severity::High,
        image_url: "https://images.unsplash.com/photo-1469474968028-56623f02e42e",
        amount_needed: 3000,
        verifier: None,
        donations: &[],
    },
    DemoIncident {
        beneficiary: ("ben-3", "Ahmed Hassan"),
        location: "Cairo, Egypt",
        cause: "Drought",
        description: "Prolonged drought has depleted our water sources and devastated crops. We urgently need water supplies and food assistance.",
        severity: Severity::Medium,
        image_url: "https://images.unsplash.com/photo-1433086966358-54859d0ed716",
        amount_needed: 2500,
        verifier: Some(("ngo-2", "Water Relief International")),
        donations: &[DemoDonation { donor_id: "don-1", donor_name: "Sarah Johnson", amount: 2500 }],
    },
];

/// Load the demo set. Does nothing when the store already holds incidents.
pub fn load_demo<S: IncidentStore>(engine: &ReliefEngine<S>) -> Result<usize> {
    if !engine.store().list_incidents().is_empty() {
        return Ok(0);
    }

    for demo in DEMO {
        let incident = engine.submit_incident(NewIncident {
            beneficiary_id: demo.beneficiary.0.to_string(),
            beneficiary_name: demo.beneficiary.1.to_string(),
            location: demo.location.to_string(),
            cause: demo.cause.to_string(),
            description: demo.description.to_string(),
            severity: demo.severity,
            image_url: Some(demo.image_url.to_string()),
            amount_needed: demo.amount_needed,
        })?;
        if let Some((verifier_id, verifier_name)) = demo.verifier {
            engine.verify_incident(&incident.id, verifier_id, verifier_name)?;
        }
        for donation in demo.donations {
            engine.apply_donation(
                &incident.id,
                donation.donor_id,
                donation.donor_name,
                donation.amount,
            )?;
        }
    }

    info!("Seeded {} demo incidents", DEMO.len());
    Ok(DEMO.len())
}
