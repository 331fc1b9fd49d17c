//! Registration, login and admin account management.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::credentials::{AuthUser, CredentialStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{now_timestamp, AccountStatus, Role, UserProfile, USERS};
use crate::store::Store;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub student_id: Option<String>,
    pub student_year: Option<String>,
    pub teacher_department: Option<String>,
    pub teacher_subject: Option<String>,
    pub teacher_office_hours: Option<String>,
}

fn filled(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl RegistrationForm {
    pub fn validate(&self) -> StoreResult<Role> {
        if [&self.name, &self.email, &self.password, &self.role]
            .iter()
            .any(|v| v.trim().is_empty())
        {
            return Err(StoreError::Validation(
                "please fill in all required fields".to_string(),
            ));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(StoreError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let role: Role = self.role.parse()?;
        match role {
            Role::Student if !(filled(&self.student_id) && filled(&self.student_year)) => Err(
                StoreError::Validation("please fill in all student fields".to_string()),
            ),
            Role::Teacher if !(filled(&self.teacher_department) && filled(&self.teacher_subject)) => {
                Err(StoreError::Validation(
                    "please fill in all teacher fields".to_string(),
                ))
            }
            _ => Ok(role),
        }
    }
}

/// The signed-in user together with their profile document.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedIn {
    pub user: AuthUser,
    pub profile: UserProfile,
}

#[derive(Clone)]
pub struct AccountService {
    store: Store,
    auth: CredentialStore,
}

impl AccountService {
    pub fn new(store: Store, auth: CredentialStore) -> Self {
        Self { store, auth }
    }

    pub fn auth(&self) -> &CredentialStore {
        &self.auth
    }

    /// Creates the account and its profile, then signs out so the user
    /// logs in explicitly. Teachers start out pending approval.
    pub async fn register(&self, form: &RegistrationForm) -> StoreResult<UserProfile> {
        let role = form.validate()?;
        info!("Registration attempt for {} as {role}", form.email);

        let user = self.auth.create_user(&form.email, &form.password)?;

        let mut profile = UserProfile {
            uid: user.uid.clone(),
            name: form.name.clone(),
            email: form.email.clone(),
            role,
            status: role.initial_status(),
            created_at: now_timestamp(),
            student_id: None,
            year_of_study: None,
            department: None,
            subject: None,
            office_hours: None,
        };
        match role {
            Role::Student => {
                profile.student_id = form.student_id.clone();
                profile.year_of_study = form.student_year.clone();
            }
            Role::Teacher => {
                profile.department = form.teacher_department.clone();
                profile.subject = form.teacher_subject.clone();
                profile.office_hours = form.teacher_office_hours.clone();
            }
            Role::Admin => {}
        }

        if let Err(e) = self.store.collection(USERS).doc(&user.uid).set(&profile).await {
            warn!("Profile write failed for {}, removing credential: {e}", user.uid);
            self.auth.remove_credential(&user.uid)?;
            self.auth.sign_out()?;
            return Err(e);
        }
        self.auth.sign_out()?;

        info!("Registered {} ({role}, {})", profile.uid, profile.status.as_str());
        Ok(profile)
    }

    /// Signs in and checks the requested role and approval status.
    ///
    /// Any rejection after authentication signs the user back out.
    pub async fn login(&self, email: &str, password: &str, role: Role) -> StoreResult<LoggedIn> {
        let user = self.auth.sign_in(email, password)?;

        match self.check_profile(&user, role).await {
            Ok(profile) => {
                info!("Login successful for {} as {role}", user.uid);
                Ok(LoggedIn { user, profile })
            }
            Err(e) => {
                self.auth.sign_out()?;
                Err(e)
            }
        }
    }

    async fn check_profile(&self, user: &AuthUser, role: Role) -> StoreResult<UserProfile> {
        let profile = self
            .profile(&user.uid)
            .await?
            .ok_or_else(|| StoreError::not_found(USERS, &user.uid))?;

        if profile.role != role {
            warn!(
                "Role mismatch during login for {}: requested {role}, actual {}",
                user.uid, profile.role
            );
            return Err(StoreError::RoleMismatch {
                requested: role.to_string(),
                actual: profile.role.to_string(),
            });
        }
        if profile.role == Role::Teacher {
            match profile.status {
                AccountStatus::Approved => {}
                AccountStatus::Rejected => {
                    info!("Rejected teacher attempted login: {}", user.uid);
                    return Err(StoreError::AccountRejected(user.uid.clone()));
                }
                AccountStatus::Pending => {
                    info!("Teacher login attempted before approval: {}", user.uid);
                    return Err(StoreError::PendingApproval(user.uid.clone()));
                }
            }
        }
        Ok(profile)
    }

    pub fn logout(&self) -> StoreResult<()> {
        self.auth.sign_out()
    }

    pub async fn profile(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        self.store.collection(USERS).doc(uid).get().await?.deserialize()
    }

    pub async fn approve_teacher(&self, uid: &str) -> StoreResult<()> {
        self.set_status(uid, AccountStatus::Approved).await
    }

    pub async fn reject_teacher(&self, uid: &str) -> StoreResult<()> {
        self.set_status(uid, AccountStatus::Rejected).await
    }

    /// Only teacher accounts go through approval.
    async fn set_status(&self, uid: &str, status: AccountStatus) -> StoreResult<()> {
        let profile = self
            .profile(uid)
            .await?
            .ok_or_else(|| StoreError::not_found(USERS, uid))?;
        if profile.role != Role::Teacher {
            return Err(StoreError::Validation(format!(
                "{uid} is a {} account, only teachers can be approved or rejected",
                profile.role
            )));
        }

        self.store
            .collection(USERS)
            .doc(uid)
            .update(&json!({ "status": status }))
            .await?;
        info!("Account {uid} is now {}", status.as_str());
        Ok(())
    }

    /// Removes the profile document and, when present, the credential.
    pub async fn delete_user(&self, uid: &str) -> StoreResult<()> {
        self.store.collection(USERS).doc(uid).delete().await?;
        self.auth.remove_credential(uid)?;
        Ok(())
    }

    async fn users_where(&self, role: Role, status: Option<AccountStatus>) -> StoreResult<Vec<UserProfile>> {
        let mut query = self.store.collection(USERS).where_("role", "==", role.as_str())?;
        if let Some(status) = status {
            query = query.where_("status", "==", status.as_str())?;
        }
        Ok(query.get().await?.deserialize_valid())
    }

    pub async fn approved_teachers(&self) -> StoreResult<Vec<UserProfile>> {
        self.users_where(Role::Teacher, Some(AccountStatus::Approved)).await
    }

    pub async fn pending_teachers(&self) -> StoreResult<Vec<UserProfile>> {
        self.users_where(Role::Teacher, Some(AccountStatus::Pending)).await
    }

    /// Approved teachers whose name or subject contains `term`
    /// (case-insensitive) and whose department equals `department`.
    /// Blank filters are ignored.
    pub async fn search_teachers(
        &self,
        term: Option<&str>,
        department: Option<&str>,
    ) -> StoreResult<Vec<UserProfile>> {
        let term = term.map(str::trim).filter(|t| !t.is_empty()).map(str::to_lowercase);
        let department = department.filter(|d| !d.trim().is_empty());

        let teachers = self
            .approved_teachers()
            .await?
            .into_iter()
            .filter(|t| match &term {
                Some(term) => {
                    t.name.to_lowercase().contains(term)
                        || t.subject.as_deref().is_some_and(|s| s.to_lowercase().contains(term))
                }
                None => true,
            })
            .filter(|t| department.map_or(true, |d| t.department.as_deref() == Some(d)))
            .collect::<Vec<_>>();

        debug!("Teacher search {term:?} / {department:?} matched {}", teachers.len());
        Ok(teachers)
    }

    pub async fn students(&self) -> StoreResult<Vec<UserProfile>> {
        self.users_where(Role::Student, None).await
    }
}
