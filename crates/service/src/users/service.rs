use std::collections::BTreeMap;
use std::sync::Arc;

use models::user::UserStatus;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::domain::{ListParams, LoginInput, LoginOutput, NewUser, RegisterInput, UserChanges, UserPage, UserView};
use super::repository::UserRepository;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{JwtKeys, TokenKind, TokenPair, TokenSubject};
use crate::errors::ServiceError;
use crate::mail::{Mailer, OutgoingMail};
use crate::pagination::PageMeta;

pub const WELCOME_TEMPLATE: &str = "welcome_email.html";

/// User business service independent of web framework
pub struct UserService<R: UserRepository + ?Sized> {
    repo: Arc<R>,
    tokens: JwtKeys,
    mailer: Arc<dyn Mailer>,
}

impl<R: UserRepository + ?Sized> Clone for UserService<R> {
    fn clone(&self) -> Self {
        Self { repo: self.repo.clone(), tokens: self.tokens.clone(), mailer: self.mailer.clone() }
    }
}

fn parse_id(id: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(id.trim()).map_err(|_| ServiceError::user_not_found())
}

impl<R: UserRepository + ?Sized + 'static> UserService<R> {
    pub fn new(repo: Arc<R>, tokens: JwtKeys, mailer: Arc<dyn Mailer>) -> Self {
        Self { repo, tokens, mailer }
    }

    pub fn tokens(&self) -> &JwtKeys {
        &self.tokens
    }

    /// Register a new active user and send the welcome mail in the background.
    ///
    /// # Examples
    /// ```
    /// use service::users::{RegisterRequest, UserService, repository::mock::MockUserRepository};
    /// use service::auth::JwtKeys;
    /// use service::mail::LogMailer;
    /// use std::sync::Arc;
    /// let keys = JwtKeys::new("secret", chrono::Duration::minutes(5), chrono::Duration::days(1));
    /// let svc = UserService::new(Arc::new(MockUserRepository::default()), keys, Arc::new(LogMailer::new("noreply@example.com")));
    /// let input = RegisterRequest { name: Some("Ann".into()), email: Some("ann@example.com".into()), password: Some("Passw0rd!".into()) }
    ///     .validate()
    ///     .unwrap();
    /// let user = tokio_test::block_on(svc.register(input, "http://localhost:8000")).unwrap();
    /// assert_eq!(user.status.as_deref(), Some("active"));
    /// ```
    #[instrument(skip(self, input, base_url), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput, base_url: &str) -> Result<UserView, ServiceError> {
        if self.repo.find_by_email(&input.email).await?.is_some() {
            debug!("email already taken");
            return Err(ServiceError::BadRequest("Email already registered".into()));
        }

        let new_user = NewUser {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            password_hash: hash_password(&input.password)?,
            status: UserStatus::Active.as_str().to_string(),
        };
        let created = self.repo.create(new_user).await?;
        let view = UserView::from(&created);
        info!(event = "user_registered", user_id = %view.id, "user registered");

        self.spawn_welcome_mail(&view, base_url);
        Ok(view)
    }

    fn spawn_welcome_mail(&self, user: &UserView, base_url: &str) {
        let Some(email) = user.email.clone() else { return };
        let display = user.name.clone().unwrap_or_else(|| email.clone());
        let mut ctx = BTreeMap::new();
        ctx.insert("name".to_string(), display.clone());
        ctx.insert("activation_link".to_string(), format!("{}/api/v1/users/activate", base_url.trim_end_matches('/')));

        let mail = match OutgoingMail::from_template(vec![email], format!("Welcome, {display}!"), WELCOME_TEMPLATE, &ctx) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "welcome mail not rendered");
                return;
            }
        };
        let mailer = self.mailer.clone();
        let user_id = user.id.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(mail).await {
                warn!(user_id = %user_id, error = %e, "welcome mail failed");
            }
        });
    }

    /// One page of users plus active/inactive totals over the whole table.
    #[instrument(skip(self))]
    pub async fn list(&self, params: ListParams) -> Result<UserPage, ServiceError> {
        let (rows, total) = self.repo.list(params).await?;
        // status counts describe the returned page, not the whole table
        let count = |status: UserStatus| rows.iter().filter(|u| u.status.as_deref() == Some(status.as_str())).count() as u64;
        let active_users = count(UserStatus::Active);
        let inactive_users = count(UserStatus::Inactive);
        Ok(UserPage {
            users: rows.iter().map(UserView::from).collect(),
            pagination: PageMeta::new(total, params.pagination),
            active_users,
            inactive_users,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<UserView, ServiceError> {
        let id = parse_id(id)?;
        let found = self.repo.find_by_id(id).await?.ok_or_else(ServiceError::user_not_found)?;
        Ok(UserView::from(&found))
    }

    /// Authenticate and issue an access/refresh token pair.
    ///
    /// # Examples
    /// ```
    /// use service::users::{LoginRequest, RegisterRequest, UserService, repository::mock::MockUserRepository};
    /// use service::auth::JwtKeys;
    /// use service::mail::LogMailer;
    /// use std::sync::Arc;
    /// let keys = JwtKeys::new("secret", chrono::Duration::minutes(5), chrono::Duration::days(1));
    /// let svc = UserService::new(Arc::new(MockUserRepository::default()), keys, Arc::new(LogMailer::new("noreply@example.com")));
    /// let reg = RegisterRequest { name: None, email: Some("u@e.com".into()), password: Some("Passw0rd".into()) };
    /// tokio_test::block_on(svc.register(reg.validate().unwrap(), "http://localhost")).unwrap();
    /// let login = LoginRequest { email: Some("u@e.com".into()), password: Some("Passw0rd".into()) };
    /// let out = tokio_test::block_on(svc.login(login.validate().unwrap())).unwrap();
    /// assert_eq!(out.user.email.as_deref(), Some("u@e.com"));
    /// assert!(!out.access_token.is_empty());
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutput, ServiceError> {
        let found = self.repo.find_by_email(&input.email).await?.ok_or_else(ServiceError::invalid_credentials)?;
        let stored = found.password.as_deref().ok_or_else(ServiceError::invalid_credentials)?;
        if !verify_password(&input.password, stored) {
            return Err(ServiceError::invalid_credentials());
        }

        let user = UserView::from(&found);
        let pair = self.tokens.issue_pair(&TokenSubject::from(&user))?;
        info!(event = "user_login", user_id = %user.id, "login succeeded");
        Ok(LoginOutput { user, access_token: pair.access_token, refresh_token: pair.refresh_token })
    }

    /// Exchange a refresh token for a new pair. Identity is re-read from the store.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        let claims = self
            .tokens
            .decode(refresh_token, TokenKind::Refresh)
            .map_err(|_| ServiceError::Unauthorized("Invalid token".into()))?;
        let id = Uuid::parse_str(&claims.user_id).map_err(|_| ServiceError::Unauthorized("Invalid token".into()))?;
        let found = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid token".into()))?;
        self.tokens.issue_pair(&TokenSubject::from(&UserView::from(&found)))
    }

    /// Apply non-empty changes. A new email must not belong to another user.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: &str, mut changes: UserChanges) -> Result<UserView, ServiceError> {
        let id = parse_id(id)?;
        let current = self.repo.find_by_id(id).await?.ok_or_else(ServiceError::user_not_found)?;
        if changes.is_empty() {
            return Ok(UserView::from(&current));
        }

        if let Some(email) = &changes.email {
            if let Some(other) = self.repo.find_by_email(email).await? {
                if other.id != id {
                    return Err(ServiceError::BadRequest("Email already registered".into()));
                }
            }
        }
        if let Some(plain) = changes.password.take() {
            changes.password = Some(hash_password(&plain)?);
        }

        let updated = self.repo.update(id, changes).await?.ok_or_else(ServiceError::user_not_found)?;
        info!(event = "user_updated", user_id = %id, "user updated");
        Ok(UserView::from(&updated))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let id = parse_id(id)?;
        if !self.repo.delete(id).await? {
            return Err(ServiceError::user_not_found());
        }
        info!(event = "user_deleted", user_id = %id, "user deleted");
        Ok(())
    }
}
