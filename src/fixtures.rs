//! Synthetic patients backing the demo warehouse and patient store.

/// One demo patient, carrying both the analytics and the contact view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemoPatient {
    pub patient_id: &'static str,
    pub patient_name: &'static str,
    pub risk_score: i64,
    pub gap_status: &'static str,
    pub last_hba1c_date: Option<&'static str>,
    pub last_hba1c_value: Option<f64>,
    pub glycemic_control: &'static str,
    pub days_overdue: i64,
    pub phone_number: &'static str,
    pub preferred_name: &'static str,
    pub preferred_language: &'static str,
    pub best_contact_time: &'static str,
}

pub static DEMO_PATIENTS: [DemoPatient; 5] = [
    DemoPatient {
        patient_id: "patient-001",
        patient_name: "Maria Garcia",
        risk_score: 95,
        gap_status: "CRITICAL",
        last_hba1c_date: None,
        last_hba1c_value: None,
        glycemic_control: "UNKNOWN",
        days_overdue: 365,
        phone_number: "+19176649186",
        preferred_name: "Maria",
        preferred_language: "Spanish",
        best_contact_time: "Evening",
    },
    DemoPatient {
        patient_id: "patient-002",
        patient_name: "James Wilson",
        risk_score: 88,
        gap_status: "HIGH",
        last_hba1c_date: Some("2024-03-15"),
        last_hba1c_value: Some(9.2),
        glycemic_control: "UNCONTROLLED",
        days_overdue: 260,
        phone_number: "+15559876543",
        preferred_name: "Jim",
        preferred_language: "English",
        best_contact_time: "Morning",
    },
    DemoPatient {
        patient_id: "patient-003",
        patient_name: "Sarah Johnson",
        risk_score: 72,
        gap_status: "MODERATE",
        last_hba1c_date: Some("2024-06-20"),
        last_hba1c_value: Some(7.8),
        glycemic_control: "ABOVE_TARGET",
        days_overdue: 163,
        phone_number: "+15551112222",
        preferred_name: "Sarah",
        preferred_language: "English",
        best_contact_time: "Afternoon",
    },
    DemoPatient {
        patient_id: "patient-004",
        patient_name: "Robert Chen",
        risk_score: 65,
        gap_status: "MODERATE",
        last_hba1c_date: Some("2024-07-10"),
        last_hba1c_value: Some(7.4),
        glycemic_control: "ABOVE_TARGET",
        days_overdue: 143,
        phone_number: "+15553334444",
        preferred_name: "Bob",
        preferred_language: "English",
        best_contact_time: "Morning",
    },
    DemoPatient {
        patient_id: "patient-005",
        patient_name: "Linda Martinez",
        risk_score: 55,
        gap_status: "MODERATE",
        last_hba1c_date: Some("2024-08-01"),
        last_hba1c_value: Some(7.1),
        glycemic_control: "ABOVE_TARGET",
        days_overdue: 121,
        phone_number: "+15555556666",
        preferred_name: "Linda",
        preferred_language: "Spanish",
        best_contact_time: "Evening",
    },
];

/// Exact-key lookup
pub fn find_patient(patient_id: &str) -> Option<&'static DemoPatient> {
    DEMO_PATIENTS.iter().find(|p| p.patient_id == patient_id)
}
