//! # Test Suite for Offline Docstore
//!
//! End-to-end tests over the public handles, the booking workflows and the
//! FFI surface. Lower-level behaviour (operators, media, credential list)
//! is tested next to the code in each module.
//!
//! ## Test Categories
//!
//! ### 1. Store Semantics
//! - Round-trip, idempotent `set`, shallow-merge `update`, idempotent `delete`
//! - Query correctness and collection isolation
//!
//! ### 2. Persistence and Recovery
//! - Reopening an LMDB store (reload simulation)
//! - Corrupt blobs recovered as empty collections
//!
//! ### 3. Booking Workflows
//! - Registration and login rules per role
//! - Appointment status transitions
//! - Messages and replies, demo seeding
//!
//! ### 4. FFI Functions
//! - JSON envelopes, null pointers, malformed input
//!
//! ## Running the Tests
//!
//! ```bash
//! cargo test
//! cargo test test_ffi_        # FFI tests
//! cargo test test_workflow_   # booking flows
//! ```

#[cfg(test)]
pub mod tests {
    use std::ffi::{CStr, CString};
    use std::os::raw::c_char;
    use std::sync::Arc;

    use log::info;
    use serde_json::{json, Value as JsonValue};

    use crate::accounts::{AccountService, RegistrationForm};
    use crate::appointments::{AppointmentService, BookingRequest};
    use crate::config::StoreConfig;
    use crate::credentials::CredentialStore;
    use crate::document::to_document;
    use crate::error::{StoreError, StoreResult};
    use crate::ffi::*;
    use crate::messages::MessageService;
    use crate::models::{AccountStatus, AppointmentStatus, Role, UserProfile, USERS};
    use crate::seed::{seed_demo_data, DEMO_ADMIN_PASSWORD};
    use crate::storage_medium::{MemoryMedium, StorageMedium};
    use crate::store::Store;

    struct Harness {
        store: Store,
        accounts: AccountService,
        appointments: AppointmentService,
        messages: MessageService,
    }

    fn harness() -> Harness {
        let medium: Arc<dyn StorageMedium> = Arc::new(MemoryMedium::new());
        let store = Store::from_medium(medium.clone(), "mock_");
        let auth = CredentialStore::new(medium, "mock_").unwrap();
        Harness {
            accounts: AccountService::new(store.clone(), auth),
            appointments: AppointmentService::new(store.clone()),
            messages: MessageService::new(store.clone()),
            store,
        }
    }

    /// Memory medium whose writes to one key always fail, as with a full map.
    struct FullKeyMedium {
        inner: MemoryMedium,
        failing_key: &'static str,
    }

    impl StorageMedium for FullKeyMedium {
        fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
            if key == self.failing_key {
                return Err(StoreError::Storage("map size exhausted".to_string()));
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> StoreResult<bool> {
            self.inner.remove_item(key)
        }

        fn clear(&self) -> StoreResult<()> {
            self.inner.clear()
        }
    }

    fn lmdb_config(dir: &tempfile::TempDir, name: &str) -> StoreConfig {
        StoreConfig::lmdb(dir.path().join(name).to_string_lossy().into_owned())
    }

    fn student_form(email: &str) -> RegistrationForm {
        RegistrationForm {
            name: "Ana Student".to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            role: "student".to_string(),
            student_id: Some("S-100".to_string()),
            student_year: Some("2".to_string()),
            ..RegistrationForm::default()
        }
    }

    fn teacher_form(email: &str) -> RegistrationForm {
        RegistrationForm {
            name: "Dr. Lee".to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            role: "teacher".to_string(),
            teacher_department: Some("Chemistry".to_string()),
            teacher_subject: Some("Organic Chemistry".to_string()),
            teacher_office_hours: Some("Fri 9-11 AM".to_string()),
            ..RegistrationForm::default()
        }
    }

    async fn approved_teacher(h: &Harness, email: &str) -> UserProfile {
        let teacher = h.accounts.register(&teacher_form(email)).await.unwrap();
        h.accounts.approve_teacher(&teacher.uid).await.unwrap();
        h.accounts.profile(&teacher.uid).await.unwrap().unwrap()
    }

    fn booking(teacher_id: &str, date: &str) -> BookingRequest {
        BookingRequest {
            teacher_id: teacher_id.to_string(),
            date: date.to_string(),
            time: "14:00".to_string(),
            reason: "Project feedback".to_string(),
            message: String::new(),
        }
    }

    // ===============================
    // STORE SEMANTICS
    // ===============================

    #[tokio::test]
    async fn test_round_trip_injects_id() {
        let store = Store::in_memory();
        let doc = store.collection("users").doc("u1");
        let data = json!({"name": "Ana", "tags": ["a", "b"], "profile": {"year": 2}, "nothing": null});

        doc.set(&data).await.unwrap();
        let snapshot = doc.get().await.unwrap();

        assert!(snapshot.exists());
        let mut expected = to_document(&data).unwrap();
        expected.insert("id".to_string(), json!("u1"));
        assert_eq!(snapshot.data(), Some(&expected));
    }

    #[tokio::test]
    async fn test_set_is_idempotent() {
        let medium = MemoryMedium::new();
        let store = Store::from_medium(Arc::new(medium.clone()), "mock_");
        let doc = store.collection("users").doc("u1");

        doc.set(&json!({"a": 1})).await.unwrap();
        let once = medium.get_item("mock_users").unwrap();
        doc.set(&json!({"a": 1})).await.unwrap();
        let twice = medium.get_item("mock_users").unwrap();

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_set_replaces_wholesale() {
        let store = Store::in_memory();
        let doc = store.collection("users").doc("u1");
        doc.set(&json!({"a": 1, "b": 2})).await.unwrap();
        doc.set(&json!({"c": 3})).await.unwrap();

        let snapshot = doc.get().await.unwrap();
        assert_eq!(snapshot.data(), Some(&to_document(&json!({"c": 3, "id": "u1"})).unwrap()));
    }

    #[tokio::test]
    async fn test_update_is_shallow_merge() {
        let store = Store::in_memory();
        let doc = store.collection("users").doc("u1");
        doc.set(&json!({"a": 1, "b": 2, "nested": {"x": 1, "y": 2}})).await.unwrap();

        doc.update(&json!({"b": 3, "c": 4, "nested": {"x": 9}})).await.unwrap();

        let snapshot = doc.get().await.unwrap();
        assert_eq!(
            snapshot.data(),
            Some(&to_document(&json!({"id": "u1", "a": 1, "b": 3, "c": 4, "nested": {"x": 9}})).unwrap())
        );
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = Store::in_memory();
        let doc = store.collection("appointments").doc("nope");

        match doc.update(&json!({"status": "approved"})).await {
            Err(StoreError::NotFound { collection, id }) => {
                assert_eq!(collection, "appointments");
                assert_eq!(id, "nope");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(!doc.get().await.unwrap().exists());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = Store::in_memory();
        let doc = store.collection("users").doc("u1");
        doc.set(&json!({"a": 1})).await.unwrap();

        doc.delete().await.unwrap();
        doc.delete().await.unwrap();

        let snapshot = doc.get().await.unwrap();
        assert!(!snapshot.exists());
        assert!(snapshot.data().is_none());
    }

    #[tokio::test]
    async fn test_add_generates_distinct_ids() {
        let store = Store::in_memory();
        let messages = store.collection("messages");

        let first = messages.add(&json!({"content": "hi"})).await.unwrap();
        let second = messages.add(&json!({"content": "hi"})).await.unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(messages.get().await.unwrap().len(), 2);
        let snapshot = first.get().await.unwrap();
        assert_eq!(snapshot.get("id"), Some(&json!(first.id())));
    }

    #[tokio::test]
    async fn test_query_correctness() {
        let store = Store::in_memory();
        let users = store.collection("users");
        users.doc("t1").set(&json!({"role": "teacher", "status": "approved"})).await.unwrap();
        users.doc("t2").set(&json!({"role": "teacher", "status": "pending"})).await.unwrap();
        users.doc("s1").set(&json!({"role": "student", "status": "approved"})).await.unwrap();

        let result = users
            .where_("role", "==", "teacher")
            .unwrap()
            .where_("status", "==", "approved")
            .unwrap()
            .get()
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.docs[0].id, "t1");

        let not_pending = users.where_("status", "!=", "pending").unwrap().get().await.unwrap();
        assert_eq!(not_pending.len(), 2);
    }

    #[tokio::test]
    async fn test_query_numbers_match_by_value() {
        let store = Store::in_memory();
        let users = store.collection("users");
        users.doc("s1").set(&json!({"yearOfStudy": 2})).await.unwrap();
        users.doc("s2").set(&json!({"yearOfStudy": 3})).await.unwrap();

        let eq = users.where_("yearOfStudy", "==", 2.0).unwrap().get().await.unwrap();
        let ne = users.where_("yearOfStudy", "!=", 2.0).unwrap().get().await.unwrap();
        let le = users.where_("yearOfStudy", "<=", 2.0).unwrap().get().await.unwrap();

        assert_eq!(eq.len(), 1);
        assert_eq!(eq.docs[0].id, "s1");
        assert_eq!(ne.len(), 1);
        assert_eq!(ne.docs[0].id, "s2");
        assert_eq!(le.docs, eq.docs);
    }

    #[tokio::test]
    async fn test_query_rejects_unknown_operator() {
        let store = Store::in_memory();
        assert!(matches!(
            store.collection("users").where_("role", "~=", "teacher"),
            Err(StoreError::InvalidOperator(_))
        ));
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = Store::in_memory();
        store.collection("appointments").doc("x").set(&json!({"kind": "appointment"})).await.unwrap();
        store.collection("users").doc("x").set(&json!({"kind": "user"})).await.unwrap();
        store.collection("users").doc("x").update(&json!({"extra": true})).await.unwrap();
        store.collection("users").doc("x").delete().await.unwrap();

        let appointment = store.collection("appointments").doc("x").get().await.unwrap();
        assert_eq!(appointment.get("kind"), Some(&json!("appointment")));
        assert!(appointment.get("extra").is_none());
    }

    #[tokio::test]
    async fn test_doc_path_resolution() {
        let store = Store::in_memory();
        let by_path = store.doc("users/u1").unwrap();
        assert_eq!(by_path.collection(), "users");
        assert_eq!(by_path.id(), "u1");
        assert_eq!(by_path.path(), "users/u1");

        for bad in ["users", "/u1", "users/", "users/u1/extra"] {
            assert!(matches!(store.doc(bad), Err(StoreError::InvalidPath(_))), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_clear_collection() {
        let store = Store::in_memory();
        store.collection("messages").doc("m1").set(&json!({})).await.unwrap();
        store.clear_collection("messages").await.unwrap();
        assert!(store.collection("messages").get().await.unwrap().is_empty());
    }

    // ===============================
    // PERSISTENCE AND RECOVERY
    // ===============================

    #[tokio::test]
    async fn test_persistence_survives_reconstruction() {
        let dir = tempfile::tempdir().unwrap();
        let config = lmdb_config(&dir, "reload");

        {
            let store = Store::open(&config).unwrap();
            for i in 1..=5 {
                store
                    .collection("appointments")
                    .doc(&format!("apt-{i}"))
                    .set(&json!({"status": "pending", "slot": i}))
                    .await
                    .unwrap();
            }
            store.collection("users").doc("u1").set(&json!({"name": "Ana"})).await.unwrap();
        }

        let store = Store::open(&config).unwrap();
        let all = store.collection("appointments").get().await.unwrap();
        assert_eq!(all.len(), 5, "documents should persist across reopen");

        let user = store.collection("users").doc("u1").get().await.unwrap();
        assert_eq!(user.get("name"), Some(&json!("Ana")));
        info!("Reload simulation completed");
    }

    #[tokio::test]
    async fn test_shared_memory_scope_is_visible_to_new_instances() {
        let medium = MemoryMedium::new();
        let first = Store::from_medium(Arc::new(medium.clone()), "mock_");
        first.collection("users").doc("u1").set(&json!({"a": 1})).await.unwrap();

        let second = Store::from_medium(Arc::new(medium.clone()), "mock_");
        assert!(second.collection("users").doc("u1").get().await.unwrap().exists());

        let other_scope = Store::from_medium(Arc::new(medium), "tab2_");
        assert!(!other_scope.collection("users").doc("u1").get().await.unwrap().exists());
    }

    #[tokio::test]
    async fn test_corrupt_blob_reads_as_empty() {
        let medium = MemoryMedium::new();
        medium.set_item("mock_users", "this is not json").unwrap();
        let store = Store::from_medium(Arc::new(medium.clone()), "mock_");

        let all = store.collection("users").get().await.unwrap();
        assert!(all.is_empty());

        store.collection("users").doc("u1").set(&json!({"a": 1})).await.unwrap();
        assert_eq!(store.collection("users").get().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_blob_in_lmdb_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = lmdb_config(&dir, "corrupt");
        let medium = crate::store::open_medium(&config).unwrap();
        medium.set_item("mock_appointments", "[1, 2").unwrap();

        let store = Store::from_medium(medium, &config.scope_prefix);
        let result = store
            .collection("appointments")
            .where_("status", "==", "pending")
            .unwrap()
            .get()
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_not_lost() {
        let store = Store::in_memory();
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.collection("messages").add(&json!({"n": i})).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.collection("messages").get().await.unwrap().len(), 20);
    }

    // ===============================
    // BOOKING WORKFLOWS
    // ===============================

    #[tokio::test]
    async fn test_workflow_registration_initial_status() {
        let h = harness();
        let student = h.accounts.register(&student_form("ana@school.edu")).await.unwrap();
        let teacher = h.accounts.register(&teacher_form("lee@school.edu")).await.unwrap();

        assert_eq!(student.status, AccountStatus::Approved);
        assert_eq!(student.student_id.as_deref(), Some("S-100"));
        assert_eq!(teacher.status, AccountStatus::Pending);
        assert_eq!(teacher.department.as_deref(), Some("Chemistry"));
        assert!(h.accounts.auth().current_user().is_none(), "registration signs out");

        let stored = h.accounts.profile(&teacher.uid).await.unwrap().unwrap();
        assert_eq!(stored, teacher);
    }

    #[tokio::test]
    async fn test_workflow_registration_validation() {
        let h = harness();

        let mut short = student_form("a@school.edu");
        short.password = "12345".to_string();
        assert!(matches!(h.accounts.register(&short).await, Err(StoreError::Validation(_))));

        let mut no_year = student_form("b@school.edu");
        no_year.student_year = None;
        assert!(matches!(h.accounts.register(&no_year).await, Err(StoreError::Validation(_))));

        let mut no_subject = teacher_form("c@school.edu");
        no_subject.teacher_subject = Some("  ".to_string());
        assert!(matches!(h.accounts.register(&no_subject).await, Err(StoreError::Validation(_))));

        let mut bad_role = student_form("d@school.edu");
        bad_role.role = "janitor".to_string();
        assert!(matches!(h.accounts.register(&bad_role).await, Err(StoreError::Validation(_))));

        h.accounts.register(&student_form("e@school.edu")).await.unwrap();
        assert!(matches!(
            h.accounts.register(&student_form("e@school.edu")).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_workflow_login_rules() {
        let h = harness();
        h.accounts.register(&student_form("ana@school.edu")).await.unwrap();
        let teacher = h.accounts.register(&teacher_form("lee@school.edu")).await.unwrap();

        let logged_in = h.accounts.login("ana@school.edu", "secret1", Role::Student).await.unwrap();
        assert_eq!(logged_in.profile.role, Role::Student);
        assert_eq!(h.accounts.auth().current_user(), Some(logged_in.user));
        h.accounts.logout().unwrap();

        assert!(matches!(
            h.accounts.login("ana@school.edu", "secret1", Role::Teacher).await,
            Err(StoreError::RoleMismatch { .. })
        ));
        assert!(h.accounts.auth().current_user().is_none());

        assert!(matches!(
            h.accounts.login("ana@school.edu", "wrong!!", Role::Student).await,
            Err(StoreError::InvalidCredentials)
        ));

        assert!(matches!(
            h.accounts.login("lee@school.edu", "secret1", Role::Teacher).await,
            Err(StoreError::PendingApproval(_))
        ));
        assert!(h.accounts.auth().current_user().is_none());

        h.accounts.approve_teacher(&teacher.uid).await.unwrap();
        h.accounts.login("lee@school.edu", "secret1", Role::Teacher).await.unwrap();
    }

    #[tokio::test]
    async fn test_workflow_login_without_profile() {
        let h = harness();
        h.accounts.auth().create_user("ghost@school.edu", "secret1").unwrap();
        assert!(matches!(
            h.accounts.login("ghost@school.edu", "secret1", Role::Student).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(h.accounts.auth().current_user().is_none());
    }

    #[tokio::test]
    async fn test_workflow_admin_teacher_management() {
        let h = harness();
        let lee = h.accounts.register(&teacher_form("lee@school.edu")).await.unwrap();
        let kim = h.accounts.register(&teacher_form("kim@school.edu")).await.unwrap();
        h.accounts.register(&student_form("ana@school.edu")).await.unwrap();

        assert_eq!(h.accounts.pending_teachers().await.unwrap().len(), 2);
        assert!(h.accounts.approved_teachers().await.unwrap().is_empty());

        h.accounts.approve_teacher(&lee.uid).await.unwrap();
        h.accounts.reject_teacher(&kim.uid).await.unwrap();

        let approved = h.accounts.approved_teachers().await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].uid, lee.uid);
        assert!(h.accounts.pending_teachers().await.unwrap().is_empty());
        assert_eq!(h.accounts.students().await.unwrap().len(), 1);

        let rejected = h.accounts.profile(&kim.uid).await.unwrap().unwrap();
        assert_eq!(rejected.status, AccountStatus::Rejected);
        assert_eq!(rejected.role, Role::Teacher);

        assert!(matches!(
            h.accounts.approve_teacher("missing").await,
            Err(StoreError::NotFound { .. })
        ));

        let ana = h.accounts.students().await.unwrap().remove(0);
        assert!(matches!(
            h.accounts.reject_teacher(&ana.uid).await,
            Err(StoreError::Validation(_))
        ));
        assert_eq!(
            h.accounts.profile(&ana.uid).await.unwrap().unwrap().status,
            AccountStatus::Approved
        );

        assert!(matches!(
            h.accounts.login("kim@school.edu", "secret1", Role::Teacher).await,
            Err(StoreError::AccountRejected(_))
        ));
        assert!(h.accounts.auth().current_user().is_none());

        h.accounts.delete_user(&kim.uid).await.unwrap();
        assert!(h.accounts.profile(&kim.uid).await.unwrap().is_none());
        assert!(h.accounts.auth().find_by_email("kim@school.edu").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_workflow_listings_skip_foreign_documents() {
        let h = harness();
        let lee = approved_teacher(&h, "lee@school.edu").await;
        h.store
            .collection(USERS)
            .doc("t9")
            .set(&json!({"role": "teacher", "status": "approved", "name": "X"}))
            .await
            .unwrap();

        let approved = h.accounts.approved_teachers().await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].uid, lee.uid);
    }

    #[tokio::test]
    async fn test_workflow_search_teachers() {
        let h = harness();
        seed_demo_data(&h.store, h.accounts.auth()).await.unwrap();
        h.accounts.register(&teacher_form("pending@school.edu")).await.unwrap();

        let all = h.accounts.search_teachers(None, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let by_name = h.accounts.search_teachers(Some("JOHNSON"), None).await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].uid, "teacher-2");

        let by_subject = h.accounts.search_teachers(Some("quantum"), None).await.unwrap();
        assert_eq!(by_subject.len(), 1);
        assert_eq!(by_subject[0].uid, "teacher-3");

        let by_department = h.accounts.search_teachers(Some(" "), Some("Computer Science")).await.unwrap();
        assert_eq!(by_department.len(), 1);
        assert_eq!(by_department[0].uid, "teacher-1");

        let both = h.accounts.search_teachers(Some("dr."), Some("Mathematics")).await.unwrap();
        assert!(both.is_empty());

        // Pending teachers never show up, even on an exact match.
        let organic = h.accounts.search_teachers(Some("organic"), None).await.unwrap();
        assert!(organic.is_empty());
    }

    #[tokio::test]
    async fn test_workflow_registration_rolls_back_on_profile_failure() {
        let inner = MemoryMedium::new();
        let medium: Arc<dyn StorageMedium> = Arc::new(FullKeyMedium {
            inner: inner.clone(),
            failing_key: "mock_users",
        });
        let store = Store::from_medium(medium.clone(), "mock_");
        let auth = CredentialStore::new(medium, "mock_").unwrap();
        let accounts = AccountService::new(store, auth.clone());

        assert!(matches!(
            accounts.register(&student_form("ana@school.edu")).await,
            Err(StoreError::Storage(_))
        ));
        assert!(auth.find_by_email("ana@school.edu").unwrap().is_none());
        assert!(auth.current_user().is_none());

        // Once the medium recovers the same email registers cleanly.
        let recovered: Arc<dyn StorageMedium> = Arc::new(inner);
        let accounts = AccountService::new(
            Store::from_medium(recovered.clone(), "mock_"),
            CredentialStore::new(recovered, "mock_").unwrap(),
        );
        accounts.register(&student_form("ana@school.edu")).await.unwrap();
    }

    #[tokio::test]
    async fn test_workflow_appointment_lifecycle() {
        let h = harness();
        let teacher = approved_teacher(&h, "lee@school.edu").await;
        let student = h.accounts.register(&student_form("ana@school.edu")).await.unwrap();

        let first = h.appointments.book(&student, &booking(&teacher.uid, "2025-03-20")).await.unwrap();
        let second = h.appointments.book(&student, &booking(&teacher.uid, "2025-03-10")).await.unwrap();
        assert_eq!(first.status, AppointmentStatus::Pending);
        assert_eq!(first.teacher_email, "lee@school.edu");

        let mine = h.appointments.for_student(&student.uid).await.unwrap();
        assert_eq!(
            mine.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec![second.id.as_str(), first.id.as_str()]
        );
        assert_eq!(h.appointments.for_teacher(&teacher.uid).await.unwrap().len(), 2);

        let approved = h.appointments.approve(&first.id).await.unwrap();
        assert_eq!(approved.status, AppointmentStatus::Approved);
        assert!(approved.approved_at.is_some());

        let cancelled = h.appointments.cancel(&second.id).await.unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        for result in [
            h.appointments.reject(&first.id).await,
            h.appointments.confirm(&second.id).await,
            h.appointments.cancel(&first.id).await,
        ] {
            assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));
        }
        assert!(matches!(
            h.appointments.approve("missing").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_workflow_booking_requires_approved_teacher() {
        let h = harness();
        let pending = h.accounts.register(&teacher_form("lee@school.edu")).await.unwrap();
        let student = h.accounts.register(&student_form("ana@school.edu")).await.unwrap();

        assert!(matches!(
            h.appointments.book(&student, &booking(&pending.uid, "2025-03-20")).await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            h.appointments.book(&student, &booking(&student.uid, "2025-03-20")).await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            h.appointments.book(&student, &booking("nobody", "2025-03-20")).await,
            Err(StoreError::NotFound { .. })
        ));

        let mut incomplete = booking(&pending.uid, "2025-03-20");
        incomplete.reason = String::new();
        assert!(matches!(
            h.appointments.book(&student, &incomplete).await,
            Err(StoreError::Validation(_))
        ));
        assert!(h.appointments.for_student(&student.uid).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_workflow_concurrent_transitions_apply_once() {
        let h = harness();
        let teacher = approved_teacher(&h, "lee@school.edu").await;
        let student = h.accounts.register(&student_form("ana@school.edu")).await.unwrap();

        let mut ids = Vec::new();
        for day in 1..=50 {
            let request = booking(&teacher.uid, &format!("2025-04-{:02}", day % 28 + 1));
            ids.push(h.appointments.book(&student, &request).await.unwrap().id);
        }

        let mut handles = Vec::new();
        for id in &ids {
            let approver = h.appointments.clone();
            let canceller = h.appointments.clone();
            let (a, c) = (id.clone(), id.clone());
            handles.push((
                tokio::spawn(async move { approver.approve(&a).await }),
                tokio::spawn(async move { canceller.cancel(&c).await }),
            ));
        }

        for (id, (approve, cancel)) in ids.iter().zip(handles) {
            let approve = approve.await.unwrap();
            let cancel = cancel.await.unwrap();
            assert!(
                approve.is_ok() != cancel.is_ok(),
                "appointment {id} must move out of pending exactly once"
            );
            let loser = if approve.is_ok() { cancel } else { approve };
            assert!(matches!(loser, Err(StoreError::InvalidTransition { .. })));

            let stored = h.appointments.get(id).await.unwrap();
            assert_ne!(stored.status, AppointmentStatus::Pending);
            assert!(stored.approved_at.is_some() != stored.cancelled_at.is_some());
        }
    }

    #[tokio::test]
    async fn test_workflow_messages_and_replies() {
        let h = harness();
        let teacher = approved_teacher(&h, "lee@school.edu").await;
        let student = h.accounts.register(&student_form("ana@school.edu")).await.unwrap();

        let sent = h
            .messages
            .send(&student, &teacher.uid, "Office hours", "Can we meet on Friday?")
            .await
            .unwrap();
        assert!(!sent.read);
        assert_eq!(sent.sender_name, "Ana Student");

        let inbox = h.messages.inbox(&teacher.uid).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, sent.id);

        let reply = h.messages.reply(&teacher, &sent.id, "Yes, 10 AM works.").await.unwrap();
        assert_eq!(reply.receiver_id, student.uid);
        assert_eq!(reply.subject, "Re: Office hours");
        assert_eq!(reply.reply_to.as_deref(), Some(sent.id.as_str()));
        assert_eq!(h.messages.inbox(&student.uid).await.unwrap().len(), 1);

        assert!(matches!(
            h.messages.reply(&student, &sent.id, "not mine").await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            h.messages.send(&student, "nobody", "Hi", "Hello").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_workflow_seed_runs_once() {
        let h = harness();
        let auth = h.accounts.auth().clone();

        assert!(seed_demo_data(&h.store, &auth).await.unwrap());
        assert!(!seed_demo_data(&h.store, &auth).await.unwrap());

        assert_eq!(h.accounts.approved_teachers().await.unwrap().len(), 3);
        let admins = h.store.collection(USERS).where_("role", "==", "admin").unwrap().get().await.unwrap();
        assert_eq!(admins.len(), 3);

        let admin = h
            .accounts
            .login("admin@demo.com", DEMO_ADMIN_PASSWORD, Role::Admin)
            .await
            .unwrap();
        assert_eq!(admin.profile.uid, "admin-003");
    }

    // ===============================
    // FFI FUNCTIONS
    // ===============================

    fn take_response(ptr: *mut c_char) -> JsonValue {
        assert!(!ptr.is_null(), "FFI call returned null");
        let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        docstore_free_string(ptr);
        serde_json::from_str(&text).unwrap()
    }

    fn cstr(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn open_memory_state() -> *mut DocStoreState {
        let config = cstr(r#"{"name":"ffi_test","medium":"memory"}"#);
        let state = docstore_open(config.as_ptr());
        assert!(!state.is_null());
        state
    }

    #[test]
    fn test_ffi_crud_cycle() {
        let state = open_memory_state();
        let path = cstr("users/u1");

        let set = take_response(docstore_set(state, path.as_ptr(), cstr(r#"{"a":1,"b":2}"#).as_ptr()));
        assert_eq!(set, json!({"Ok": {"id": "u1"}}));

        let updated = take_response(docstore_update(state, path.as_ptr(), cstr(r#"{"b":3}"#).as_ptr()));
        assert!(updated.get("Ok").is_some());

        let got = take_response(docstore_get(state, path.as_ptr()));
        assert_eq!(got["Ok"]["exists"], json!(true));
        assert_eq!(got["Ok"]["data"], json!({"id": "u1", "a": 1, "b": 3}));

        take_response(docstore_delete(state, path.as_ptr()));
        let gone = take_response(docstore_get(state, path.as_ptr()));
        assert_eq!(gone["Ok"]["exists"], json!(false));
        assert_eq!(gone["Ok"]["data"], JsonValue::Null);

        let closed = take_response(docstore_close(state));
        assert!(closed.get("Ok").is_some());
    }

    #[test]
    fn test_ffi_add_list_and_query() {
        let state = open_memory_state();
        let collection = cstr("users");

        take_response(docstore_add(state, collection.as_ptr(), cstr(r#"{"role":"teacher","status":"approved"}"#).as_ptr()));
        take_response(docstore_add(state, collection.as_ptr(), cstr(r#"{"role":"teacher","status":"pending"}"#).as_ptr()));

        let all = take_response(docstore_list(state, collection.as_ptr()));
        assert_eq!(all["Ok"]["docs"].as_array().unwrap().len(), 2);

        let conditions = cstr(r#"[{"field":"role","operator":"==","value":"teacher"},{"field":"status","operator":"==","value":"approved"}]"#);
        let matched = take_response(docstore_query(state, collection.as_ptr(), conditions.as_ptr()));
        let docs = matched["Ok"]["docs"].as_array().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["data"]["status"], json!("approved"));

        let bad = take_response(docstore_query(state, collection.as_ptr(), cstr(r#"[{"field":"a","operator":"~","value":1}]"#).as_ptr()));
        assert!(bad.get("BadRequest").is_some());

        take_response(docstore_close(state));
    }

    #[test]
    fn test_ffi_error_envelopes() {
        let state = open_memory_state();

        let missing = take_response(docstore_update(state, cstr("users/nope").as_ptr(), cstr("{}").as_ptr()));
        assert!(missing.get("NotFound").is_some());

        let bad_path = take_response(docstore_get(state, cstr("users").as_ptr()));
        assert!(bad_path.get("BadRequest").is_some());

        let bad_json = take_response(docstore_set(state, cstr("users/u1").as_ptr(), cstr("{oops").as_ptr()));
        assert!(bad_json.get("SerializationError").is_some());

        let not_object = take_response(docstore_set(state, cstr("users/u1").as_ptr(), cstr("[1,2]").as_ptr()));
        assert!(not_object.get("ValidationError").is_some());

        take_response(docstore_close(state));
    }

    #[test]
    fn test_ffi_null_pointers() {
        assert!(docstore_open(std::ptr::null()).is_null());
        assert!(docstore_open(cstr("not json").as_ptr()).is_null());

        let path = cstr("users/u1");
        let response = take_response(docstore_get(std::ptr::null_mut(), path.as_ptr()));
        assert!(response.get("BadRequest").is_some());

        let state = open_memory_state();
        let response = take_response(docstore_get(state, std::ptr::null()));
        assert!(response.get("BadRequest").is_some());
        let response = take_response(docstore_set(state, path.as_ptr(), std::ptr::null()));
        assert!(response.get("BadRequest").is_some());
        take_response(docstore_close(state));

        let response = take_response(docstore_close(std::ptr::null_mut()));
        assert!(response.get("BadRequest").is_some());
        docstore_free_string(std::ptr::null_mut());
    }

    #[test]
    fn test_ffi_invalid_utf8() {
        let state = open_memory_state();
        let invalid = [0xffu8, 0xfe, 0x00];
        let response = take_response(docstore_get(state, invalid.as_ptr() as *const c_char));
        assert!(response.get("BadRequest").is_some());
        take_response(docstore_close(state));
    }

    #[test]
    fn test_ffi_lmdb_reopen_with_seed() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("ffi_seed").to_string_lossy().into_owned();
        let config = cstr(&json!({"name": name, "seed_demo_data": true}).to_string());

        let state = docstore_open(config.as_ptr());
        assert!(!state.is_null());
        let teacher = take_response(docstore_get(state, cstr("users/teacher-2").as_ptr()));
        assert_eq!(teacher["Ok"]["data"]["name"], json!("Prof. Mary Johnson"));
        take_response(docstore_set(state, cstr("users/teacher-2").as_ptr(), cstr(r#"{"name":"Renamed"}"#).as_ptr()));
        take_response(docstore_close(state));

        // Reopening must not re-seed over the edit.
        let state = docstore_open(config.as_ptr());
        assert!(!state.is_null());
        let teacher = take_response(docstore_get(state, cstr("users/teacher-2").as_ptr()));
        assert_eq!(teacher["Ok"]["data"]["name"], json!("Renamed"));
        take_response(docstore_close(state));
    }
}
