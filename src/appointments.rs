//! Appointment booking and status transitions.
//!
//! An appointment is created `pending` and moves at most once, into one of
//! the terminal statuses.

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::error::{StoreError, StoreResult};
use crate::query::{Condition, Operator};
use crate::models::{
    now_timestamp, AccountStatus, Appointment, AppointmentStatus, Role, UserProfile, APPOINTMENTS,
    USERS,
};
use crate::store::Store;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub teacher_id: String,
    pub date: String,
    pub time: String,
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone)]
pub struct AppointmentService {
    store: Store,
}

impl AppointmentService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Books a pending appointment with an approved teacher.
    pub async fn book(&self, student: &UserProfile, request: &BookingRequest) -> StoreResult<Appointment> {
        if [&request.teacher_id, &request.date, &request.time, &request.reason]
            .iter()
            .any(|v| v.trim().is_empty())
        {
            return Err(StoreError::Validation(
                "teacher, date, time and reason are required".to_string(),
            ));
        }

        let teacher: UserProfile = self
            .store
            .collection(USERS)
            .doc(&request.teacher_id)
            .get()
            .await?
            .deserialize()?
            .ok_or_else(|| StoreError::not_found(USERS, &request.teacher_id))?;
        if teacher.role != Role::Teacher || teacher.status != AccountStatus::Approved {
            return Err(StoreError::Validation(format!(
                "{} is not an approved teacher",
                teacher.uid
            )));
        }

        let doc_ref = self.store.collection(APPOINTMENTS).new_doc();
        let appointment = Appointment {
            id: doc_ref.id().to_string(),
            student_id: student.uid.clone(),
            student_email: student.email.clone(),
            teacher_id: teacher.uid.clone(),
            teacher_email: teacher.email.clone(),
            date: request.date.clone(),
            time: request.time.clone(),
            reason: request.reason.clone(),
            message: request.message.clone(),
            status: AppointmentStatus::Pending,
            created_at: now_timestamp(),
            approved_at: None,
            rejected_at: None,
            cancelled_at: None,
        };
        doc_ref.set(&appointment).await?;

        info!("Appointment {} booked with {}", appointment.id, teacher.uid);
        Ok(appointment)
    }

    pub async fn get(&self, id: &str) -> StoreResult<Appointment> {
        self.store
            .collection(APPOINTMENTS)
            .doc(id)
            .get()
            .await?
            .deserialize()?
            .ok_or_else(|| StoreError::not_found(APPOINTMENTS, id))
    }

    async fn by_field(&self, field: &str, uid: &str) -> StoreResult<Vec<Appointment>> {
        let mut appointments: Vec<Appointment> = self
            .store
            .collection(APPOINTMENTS)
            .where_(field, "==", uid)?
            .get()
            .await?
            .deserialize_valid();
        appointments.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));
        Ok(appointments)
    }

    pub async fn for_student(&self, uid: &str) -> StoreResult<Vec<Appointment>> {
        self.by_field("studentId", uid).await
    }

    pub async fn for_teacher(&self, uid: &str) -> StoreResult<Vec<Appointment>> {
        self.by_field("teacherId", uid).await
    }

    pub async fn approve(&self, id: &str) -> StoreResult<Appointment> {
        self.transition(id, AppointmentStatus::Approved).await
    }

    pub async fn confirm(&self, id: &str) -> StoreResult<Appointment> {
        self.transition(id, AppointmentStatus::Confirmed).await
    }

    pub async fn reject(&self, id: &str) -> StoreResult<Appointment> {
        self.transition(id, AppointmentStatus::Rejected).await
    }

    pub async fn cancel(&self, id: &str) -> StoreResult<Appointment> {
        self.transition(id, AppointmentStatus::Cancelled).await
    }

    async fn transition(&self, id: &str, to: AppointmentStatus) -> StoreResult<Appointment> {
        if !to.is_terminal() {
            let current = self.get(id).await?;
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: current.status.to_string(),
                to: to.to_string(),
            });
        }

        let mut partial = serde_json::Map::new();
        partial.insert("status".to_string(), json!(to));
        if let Some(field) = to.timestamp_field() {
            partial.insert(field.to_string(), JsonValue::String(now_timestamp()));
        }

        // Status check and write happen under one backend lock.
        let still_pending = Condition::new("status", Operator::Equal, AppointmentStatus::Pending.as_str());
        let applied = self
            .store
            .collection(APPOINTMENTS)
            .doc(id)
            .update_if(&still_pending, &partial)
            .await?;

        let updated = self.get(id).await?;
        if !applied {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: updated.status.to_string(),
                to: to.to_string(),
            });
        }

        info!("Appointment {id} moved from pending to {to}");
        Ok(updated)
    }
}
