//! SQL emitted for each measure template

/// HbA1c testing gap among diabetic patients, with outreach prioritisation
pub const DIABETES_HBA1C_GAP: &str = r#"-- Spark SQL: Patients with Diabetes who haven't had HbA1c in 6 months
-- Generated from CQL: DiabetesHbA1cGap measure logic

WITH diabetes_patients AS (
    SELECT DISTINCT
        p.id AS patient_id,
        p.gender,
        FLOOR(DATEDIFF(CURRENT_DATE(), p.birthDate) / 365.25) AS age,
        CONCAT(n.given[0], ' ', n.family) AS patient_name
    FROM patient p
    LATERAL VIEW EXPLODE(p.name) AS n
    WHERE EXISTS (
        SELECT 1 FROM condition c
        WHERE c.subject.reference = CONCAT('Patient/', p.id)
        AND c.code.coding[0].system = 'http://snomed.info/sct'
        AND c.code.coding[0].code IN ('44054006', '46635009', '73211009', '313436004')
        -- SNOMED codes for Type 1, Type 2, Diabetes mellitus, Diabetes unspecified
        AND c.clinicalStatus.coding[0].code = 'active'
    )
),

latest_hba1c AS (
    SELECT
        REPLACE(o.subject.reference, 'Patient/', '') AS patient_id,
        MAX(COALESCE(o.effectiveDateTime, o.issued)) AS last_hba1c_date,
        FIRST(o.valueQuantity.value) AS last_hba1c_value
    FROM observation o
    WHERE o.code.coding[0].code IN ('4548-4', '4549-2', '17856-6')
    -- LOINC codes for HbA1c
    AND o.status = 'final'
    GROUP BY REPLACE(o.subject.reference, 'Patient/', '')
),

risk_stratification AS (
    SELECT
        dp.patient_id,
        dp.patient_name,
        dp.age,
        dp.gender,
        lh.last_hba1c_date,
        lh.last_hba1c_value,
        DATEDIFF(CURRENT_DATE(), lh.last_hba1c_date) AS days_since_last_test,
        CASE
            WHEN lh.last_hba1c_date IS NULL THEN 'CRITICAL'
            WHEN DATEDIFF(CURRENT_DATE(), lh.last_hba1c_date) > 180 THEN 'HIGH'
            WHEN DATEDIFF(CURRENT_DATE(), lh.last_hba1c_date) > 90 THEN 'MODERATE'
            ELSE 'LOW'
        END AS risk_level,
        CASE
            WHEN lh.last_hba1c_value >= 9.0 THEN 'UNCONTROLLED'
            WHEN lh.last_hba1c_value >= 7.0 THEN 'ABOVE_TARGET'
            WHEN lh.last_hba1c_value >= 5.7 THEN 'AT_TARGET'
            ELSE 'NORMAL'
        END AS glycemic_control
    FROM diabetes_patients dp
    LEFT JOIN latest_hba1c lh ON dp.patient_id = lh.patient_id
)

SELECT
    patient_id,
    patient_name,
    age,
    gender,
    last_hba1c_date,
    last_hba1c_value,
    days_since_last_test,
    risk_level,
    glycemic_control,
    CASE
        WHEN risk_level = 'CRITICAL' THEN 100
        WHEN risk_level = 'HIGH' AND glycemic_control = 'UNCONTROLLED' THEN 95
        WHEN risk_level = 'HIGH' THEN 85
        WHEN risk_level = 'MODERATE' AND glycemic_control IN ('UNCONTROLLED', 'ABOVE_TARGET') THEN 70
        WHEN risk_level = 'MODERATE' THEN 50
        ELSE 20
    END AS outreach_priority_score
FROM risk_stratification
WHERE risk_level IN ('CRITICAL', 'HIGH', 'MODERATE')
ORDER BY outreach_priority_score DESC, days_since_last_test DESC"#;

/// CMS125 breast cancer screening measure
pub const BREAST_CANCER_SCREENING: &str = r#"-- Spark SQL: CMS125 Breast Cancer Screening Measure
-- Generated from CQL: BreastCancerScreening v2.0.0

WITH initial_population AS (
    SELECT DISTINCT
        p.id AS patient_id,
        p.gender,
        FLOOR(DATEDIFF(DATE('2024-12-31'), p.birthDate) / 365.25) AS age_at_period_end
    FROM patient p
    WHERE p.gender = 'female'
    AND FLOOR(DATEDIFF(DATE('2024-12-31'), p.birthDate) / 365.25) BETWEEN 51 AND 74
),

qualifying_encounters AS (
    SELECT DISTINCT
        REPLACE(e.subject.reference, 'Patient/', '') AS patient_id
    FROM encounter e
    WHERE e.status = 'finished'
    AND e.period.start >= DATE_SUB(DATE('2024-12-31'), 730)
    AND e.type.coding[0].code IN ('99201', '99202', '99203', '99204', '99205',
                                   '99211', '99212', '99213', '99214', '99215')
),

denominator_exclusions AS (
    SELECT DISTINCT
        REPLACE(pr.subject.reference, 'Patient/', '') AS patient_id
    FROM procedure pr
    WHERE pr.code.coding[0].code IN ('27865001', '0HTV0ZZ', '0HTU0ZZ')
    -- Bilateral mastectomy codes
    AND pr.status = 'completed'
),

numerator AS (
    SELECT DISTINCT
        REPLACE(o.subject.reference, 'Patient/', '') AS patient_id,
        o.effectiveDateTime AS mammogram_date
    FROM observation o
    WHERE o.code.coding[0].code IN ('24606-6', '24605-8', '24610-8')
    -- LOINC mammography codes
    AND o.status = 'final'
    AND o.effectiveDateTime >= DATE_SUB(DATE('2024-12-31'), 821)
    -- 27 months lookback
)

SELECT
    ip.patient_id,
    ip.age_at_period_end AS age,
    CASE WHEN qe.patient_id IS NOT NULL THEN 1 ELSE 0 END AS in_denominator,
    CASE WHEN de.patient_id IS NOT NULL THEN 1 ELSE 0 END AS excluded,
    CASE WHEN n.patient_id IS NOT NULL THEN 1 ELSE 0 END AS in_numerator,
    n.mammogram_date AS last_mammogram,
    CASE
        WHEN de.patient_id IS NOT NULL THEN 'EXCLUDED'
        WHEN qe.patient_id IS NULL THEN 'NOT_IN_DENOMINATOR'
        WHEN n.patient_id IS NOT NULL THEN 'MET'
        ELSE 'GAP'
    END AS measure_status
FROM initial_population ip
LEFT JOIN qualifying_encounters qe ON ip.patient_id = qe.patient_id
LEFT JOIN denominator_exclusions de ON ip.patient_id = de.patient_id
LEFT JOIN numerator n ON ip.patient_id = n.patient_id
ORDER BY measure_status, ip.patient_id"#;

/// Body of the generic cohort template; the header comment is generated per call
pub const GENERIC_COHORT_BODY: &str = r#"WITH patient_cohort AS (
    SELECT
        p.id AS patient_id,
        CONCAT(n.given[0], ' ', n.family) AS patient_name,
        p.gender,
        p.birthDate,
        FLOOR(DATEDIFF(CURRENT_DATE(), p.birthDate) / 365.25) AS age
    FROM patient p
    LATERAL VIEW EXPLODE(p.name) AS n
    WHERE p.active = true
),

qualifying_conditions AS (
    SELECT
        REPLACE(c.subject.reference, 'Patient/', '') AS patient_id,
        c.code.coding[0].display AS condition_name,
        c.onsetDateTime AS onset_date
    FROM condition c
    WHERE c.clinicalStatus.coding[0].code = 'active'
),

measure_evaluation AS (
    SELECT
        pc.patient_id,
        pc.patient_name,
        pc.age,
        pc.gender,
        qc.condition_name,
        CASE
            WHEN qc.patient_id IS NOT NULL THEN 'IN_MEASURE'
            ELSE 'EXCLUDED'
        END AS measure_status
    FROM patient_cohort pc
    LEFT JOIN qualifying_conditions qc ON pc.patient_id = qc.patient_id
)

SELECT * FROM measure_evaluation
WHERE measure_status = 'IN_MEASURE'
ORDER BY patient_name"#;
