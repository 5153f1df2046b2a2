//! Seeded bundle databases shared by the module tests.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use super::open_memory_database;

/// A bundle using the older table names (`well_visits`, `episodes`,
/// `perinatal_history`, `well_visit_milestones`, `users`).
pub const BUNDLE_SCHEMA: &str = "
CREATE TABLE patients (
    id INTEGER PRIMARY KEY,
    first_name TEXT, last_name TEXT, alias_label TEXT, mrn TEXT,
    dob TEXT, sex TEXT
);
CREATE TABLE users (id INTEGER PRIMARY KEY, first_name TEXT, last_name TEXT);
CREATE TABLE well_visits (
    id INTEGER PRIMARY KEY,
    patient_id INTEGER, user_id INTEGER,
    visit_type TEXT, visit_date TEXT, created_at TEXT, updated_at TEXT,
    parent_concerns TEXT, issues_since_last TEXT,
    milk_types TEXT, feed_volume_ml REAL, feed_freq_per_24h INTEGER,
    regurgitation INTEGER, feeding_issue TEXT,
    solid_food_started INTEGER, solid_food_quality TEXT,
    food_variety_quality TEXT, dairy_amount_text TEXT,
    vitamin_d_given INTEGER, vitamin_d_dose TEXT,
    sleep_hours_text TEXT, sleep_regular INTEGER, sleep_snoring INTEGER,
    devtest_score INTEGER, devtest_result TEXT, mchat_score INTEGER, mchat_result TEXT,
    weight_today_kg REAL, length_today_cm REAL, head_circ_today_cm REAL,
    delta_weight_g INTEGER, delta_days_since_discharge INTEGER,
    pe_trophic_normal INTEGER, pe_heart_normal INTEGER, pe_heart_comment TEXT,
    pe_hips_normal INTEGER, pe_hips_comment TEXT, pe_skin_normal INTEGER,
    problem_listing TEXT, conclusions TEXT, anticipatory_guidance TEXT,
    comments TEXT, next_visit_date TEXT
);
CREATE TABLE episodes (
    id INTEGER PRIMARY KEY,
    patient_id INTEGER, user_id INTEGER,
    created_at TEXT, updated_at TEXT,
    main_complaint TEXT, duration TEXT, hpi TEXT,
    appearance TEXT, feeding TEXT, breathing TEXT, stools TEXT,
    general_appearance TEXT, lungs TEXT, right_ear TEXT, left_ear TEXT,
    problem_listing TEXT, complementary_investigations TEXT,
    diagnosis TEXT, icd10 TEXT, medications TEXT, anticipatory_guidance TEXT,
    comments TEXT, next_visit_date TEXT
);
CREATE TABLE perinatal_history (
    id INTEGER PRIMARY KEY,
    patient_id INTEGER,
    pregnancy_risk TEXT, birth_mode TEXT, birth_term_weeks INTEGER,
    birth_weight_g INTEGER, birth_length_cm REAL, birth_head_circumference_cm REAL,
    vitamin_k INTEGER, maternity_discharge_date TEXT, discharge_weight_g INTEGER,
    created_at TEXT, updated_at TEXT
);
CREATE TABLE well_visit_milestones (
    id INTEGER PRIMARY KEY,
    visit_id INTEGER, code TEXT, label TEXT, status TEXT, note TEXT
);
CREATE TABLE past_medical_history (
    id INTEGER PRIMARY KEY,
    patient_id INTEGER, allergies TEXT, chronic_conditions TEXT,
    hospitalizations TEXT, updated_at TEXT
);
CREATE TABLE vitals (
    id INTEGER PRIMARY KEY,
    patient_id INTEGER, episode_id INTEGER, measured_at TEXT,
    weight_kg REAL, height_cm REAL, head_circumference_cm REAL,
    temperature_c REAL, heart_rate INTEGER, respiratory_rate INTEGER, spo2 INTEGER
);
CREATE TABLE manual_growth (
    id INTEGER PRIMARY KEY,
    patient_id INTEGER, recorded_at TEXT, age_months REAL,
    weight_kg REAL, height_cm REAL, head_circumference_cm REAL
);
";

pub const BUNDLE_SEED: &str = "
INSERT INTO patients VALUES (1, 'Lina', 'Haddad', 'Blue Fox', 'MRN-0042', '2024-01-01', 'F');
INSERT INTO users VALUES (7, 'Sara', 'Benali');

INSERT INTO well_visits (id, patient_id, user_id, visit_type, visit_date, parent_concerns, problem_listing, conclusions, comments)
VALUES (1, 1, 7, 'one_month', '2024-02-01', 'Spits up after feeds', 'Mild reflux', 'Growing well', 'Reassured');
INSERT INTO well_visits (id, patient_id, user_id, visit_type, visit_date, issues_since_last, parent_concerns, problem_listing, conclusions, comments)
VALUES (2, 1, 7, '2 months', '2024-03-03 10:00:00', 'Cold last week', 'Sleep', 'None', 'Normal exam', 'Vaccines given');
INSERT INTO well_visits (id, patient_id, user_id, visit_type, visit_date, conclusions)
VALUES (3, 1, 7, 'four_month', '2024-05-02', 'Normal development');
INSERT INTO well_visits (id, patient_id, user_id, visit_type, visit_date, comments)
VALUES (4, 1, 7, 'six_month', '2024-07-01T09:30:00Z', 'Started solids');
INSERT INTO well_visits (id, patient_id, user_id, visit_type, visit_date, problem_listing)
VALUES (5, 1, 7, 'nine_month', '2024-10-01', 'Eczema on cheeks');
INSERT INTO well_visits (
    id, patient_id, user_id, visit_type, visit_date, created_at, updated_at,
    parent_concerns, issues_since_last, milk_types, feed_volume_ml, feed_freq_per_24h,
    solid_food_started, solid_food_quality, food_variety_quality, dairy_amount_text,
    vitamin_d_given, vitamin_d_dose, sleep_hours_text, sleep_regular,
    devtest_score, devtest_result, mchat_score,
    weight_today_kg, length_today_cm, head_circ_today_cm,
    pe_trophic_normal, pe_heart_normal, pe_hips_normal, pe_hips_comment,
    problem_listing, conclusions, anticipatory_guidance, comments, next_visit_date
) VALUES (
    6, 1, 7, '12 months', '2025-01-01', '2025-01-01T09:00:00Z', '2025-01-01T10:00:00Z',
    'Picky eater', 'Ear infection in December', '[\"breast\", \"cow milk\"]', 180, 3,
    1, 'Good', 'Varied', '500 ml/day',
    1, '400 IU', '12 h', 1,
    52, 'Pass', 3,
    9.4, 75.2, 45.5,
    1, 1, 0, 'Clicking left hip',
    'Hip click', 'Healthy toddler', 'Dental hygiene', 'Follow hip', '2025-04-01'
);

INSERT INTO episodes (
    id, patient_id, user_id, created_at, main_complaint, duration, hpi,
    appearance, breathing, general_appearance, lungs, right_ear,
    complementary_investigations, diagnosis, icd10, medications, comments, next_visit_date
) VALUES (
    1, 1, 7, '2024-12-01T10:00:00Z', 'Fever', '2 days', 'Fever up to 39.2 since Friday',
    'Tired', 'Normal', 'Irritable', 'Clear', 'Bulging tympanic membrane',
    'None', 'Acute otitis media', 'H66.9', 'Amoxicillin 80 mg/kg/day', 'Review if no better', '2024-12-04'
);

INSERT INTO perinatal_history (
    patient_id, pregnancy_risk, birth_mode, birth_term_weeks, birth_weight_g, birth_length_cm,
    birth_head_circumference_cm, vitamin_k, maternity_discharge_date, discharge_weight_g, updated_at
) VALUES (1, 'Low', 'Vaginal', 39, 3200, 49.5, 34.0, 1, '2024-01-04', 3050, '2024-01-05');

INSERT INTO well_visit_milestones (visit_id, code, label, status, note) VALUES
    (6, 'walks_alone', 'Walks alone', 'Delayed', 'slow progress'),
    (6, 'pincer', 'Pincer grasp', 'ACHIEVED', NULL),
    (6, 'words', 'Says 2 words', ' done ', NULL),
    (6, 'waves', 'Waves bye-bye', 'not yet', NULL),
    (3, 'smile', 'Social smile', 'achieved', NULL);

INSERT INTO past_medical_history (patient_id, allergies, chronic_conditions, updated_at)
VALUES (1, 'None known', 'Atopic dermatitis', '2024-10-01');

INSERT INTO vitals (patient_id, episode_id, measured_at, weight_kg, temperature_c, heart_rate, spo2)
VALUES (1, 1, '2024-12-01', 9.1, 38.6, 140, 98);
INSERT INTO vitals (patient_id, episode_id, measured_at, weight_kg)
VALUES (1, NULL, '2025-06-01', 11.0);

INSERT INTO manual_growth (patient_id, recorded_at, weight_kg, height_cm, head_circumference_cm)
VALUES (1, '2024-07-01', 7.6, 66.0, 42.8);
INSERT INTO manual_growth (patient_id, age_months, weight_kg)
VALUES (1, 9.0, 8.4);
";

pub fn seed(conn: &Connection) {
    conn.execute_batch(BUNDLE_SCHEMA).unwrap();
    conn.execute_batch(BUNDLE_SEED).unwrap();
}

/// In-memory bundle with the full seed.
pub fn seeded_bundle() -> Connection {
    let conn = open_memory_database().unwrap();
    seed(&conn);
    conn
}

/// On-disk bundle directory holding `db.sqlite` with the full seed.
pub fn write_bundle(dir: &Path) -> PathBuf {
    let path = dir.join("db.sqlite");
    let conn = Connection::open(&path).unwrap();
    seed(&conn);
    path
}
