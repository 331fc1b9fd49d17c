//! Demo data: sample approved teachers and admin accounts.
//!
//! Seeding runs once per scope; a flag document records that it happened.

use log::info;
use serde_json::json;

use crate::credentials::CredentialStore;
use crate::error::StoreResult;
use crate::models::{now_timestamp, AccountStatus, Role, UserProfile, USERS};
use crate::store::Store;

const SEED_FLAGS: &str = "_flags";
const SAMPLE_TEACHERS_ADDED: &str = "sampleTeachersAdded";

pub const DEMO_ADMIN_PASSWORD: &str = "admin123";

fn teacher(uid: &str, email: &str, name: &str, department: &str, subject: &str, hours: &str) -> UserProfile {
    UserProfile {
        uid: uid.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role: Role::Teacher,
        status: AccountStatus::Approved,
        created_at: now_timestamp(),
        student_id: None,
        year_of_study: None,
        department: Some(department.to_string()),
        subject: Some(subject.to_string()),
        office_hours: Some(hours.to_string()),
    }
}

fn admin(uid: &str, email: &str, name: &str) -> UserProfile {
    UserProfile {
        uid: uid.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role: Role::Admin,
        status: AccountStatus::Approved,
        created_at: now_timestamp(),
        student_id: None,
        year_of_study: None,
        department: None,
        subject: None,
        office_hours: None,
    }
}

pub fn sample_teachers() -> Vec<UserProfile> {
    vec![
        teacher(
            "teacher-1",
            "john.smith@school.edu",
            "Dr. John Smith",
            "Computer Science",
            "Data Structures and Algorithms",
            "Mon, Wed 2-4 PM",
        ),
        teacher(
            "teacher-2",
            "mary.johnson@school.edu",
            "Prof. Mary Johnson",
            "Mathematics",
            "Calculus and Linear Algebra",
            "Tue, Thu 10-12 PM",
        ),
        teacher(
            "teacher-3",
            "david.wilson@school.edu",
            "Dr. David Wilson",
            "Physics",
            "Quantum Mechanics",
            "Mon, Fri 1-3 PM",
        ),
    ]
}

pub fn admin_accounts() -> Vec<UserProfile> {
    vec![
        admin("admin-001", "admin@school.edu", "System Administrator"),
        admin("admin-002", "admin@university.edu", "University Administrator"),
        admin("admin-003", "admin@demo.com", "Demo Administrator"),
    ]
}

/// Writes the demo profiles and admin credentials.
///
/// Returns `false` without touching anything when the scope was already
/// seeded.
pub async fn seed_demo_data(store: &Store, auth: &CredentialStore) -> StoreResult<bool> {
    let flags = store.collection(SEED_FLAGS).doc(SAMPLE_TEACHERS_ADDED);
    if flags.get().await?.exists() {
        return Ok(false);
    }

    let users = store.collection(USERS);
    for profile in sample_teachers() {
        users.doc(&profile.uid).set(&profile).await?;
    }
    for profile in admin_accounts() {
        users.doc(&profile.uid).set(&profile).await?;
        auth.upsert_credential(&profile.uid, &profile.email, DEMO_ADMIN_PASSWORD)?;
    }

    flags.set(&json!({ "at": now_timestamp() })).await?;
    info!("Seeded sample teachers and admin accounts");
    Ok(true)
}
