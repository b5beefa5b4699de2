use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::{attendance::AttendanceRecord, role::Role};
use crate::models::{Claims, TokenType};
use crate::service::attendance::OrgScope;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,

    /// Present only if this user belongs to an organization
    pub organization_id: Option<u64>,
}

impl AuthUser {
    /// Accepts only access tokens with a known role.
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }
        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            role,
            organization_id: claims.organization_id,
        })
    }

    fn from_request_headers(req: &HttpRequest) -> Result<Self, AppError> {
        // already resolved by the auth middleware
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

        let config = req
            .app_data::<Data<Config>>()
            .ok_or_else(|| AppError::Internal("Config missing".into()))?;

        let claims = verify_token(token, &config.jwt_secret)
            .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

        Self::from_claims(claims)
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Self::from_request_headers(req))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    pub fn require_recorder(&self) -> Result<(), AppError> {
        if self.role.is_recorder() {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin/Leader only"))
        }
    }

    /// Admins see every organization; everyone else only the one in their token.
    pub fn organization_scope(&self) -> Result<OrgScope, AppError> {
        if self.role == Role::Admin {
            return Ok(OrgScope::Any);
        }
        self.organization_id
            .map(OrgScope::Only)
            .ok_or_else(|| AppError::forbidden("Account is not attached to an organization"))
    }

    /// Leaders act only inside their own organization.
    fn leads(&self, organization_id: u64) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Leader => self.organization_id == Some(organization_id),
            _ => false,
        }
    }

    /// Recorders may record anyone; members only themselves; guests nobody.
    pub fn require_can_record_for(&self, user_id: u64) -> Result<(), AppError> {
        match self.role {
            Role::Admin | Role::Leader => Ok(()),
            Role::Member if self.user_id == user_id => Ok(()),
            _ => Err(AppError::forbidden(
                "Not enough permissions to record attendance for another user",
            )),
        }
    }

    pub fn require_can_view(&self, record: &AttendanceRecord) -> Result<(), AppError> {
        if self.leads(record.organization_id) || record.user_id == self.user_id {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "Not enough permissions to view this attendance record",
            ))
        }
    }

    pub fn require_can_edit(&self, record: &AttendanceRecord) -> Result<(), AppError> {
        if self.leads(record.organization_id) || record.recorded_by == Some(self.user_id) {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "Not enough permissions to update this attendance record",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::{AttachedTo, AttendanceStatus};
    use chrono::Utc;

    fn user(user_id: u64, role: Role) -> AuthUser {
        AuthUser {
            user_id,
            email: format!("user{user_id}@example.org"),
            role,
            organization_id: Some(1),
        }
    }

    fn record(user_id: u64, recorded_by: Option<u64>) -> AttendanceRecord {
        let now = Utc::now();
        AttendanceRecord {
            id: 1,
            user_id,
            organization_id: 1,
            attached_to: AttachedTo::Event(1),
            status: AttendanceStatus::Present,
            notes: None,
            recorded_by,
            created_at: now,
            updated_at: now,
        }
    }

    fn claims(token_type: TokenType, role: u8) -> Claims {
        Claims {
            user_id: 3,
            sub: "user3@example.org".into(),
            role,
            exp: 0,
            jti: "jti".into(),
            token_type,
            organization_id: None,
        }
    }

    #[test]
    fn refresh_tokens_are_not_access_tokens() {
        assert!(AuthUser::from_claims(claims(TokenType::Refresh, 1)).is_err());
        assert!(AuthUser::from_claims(claims(TokenType::Access, 9)).is_err());
        let user = AuthUser::from_claims(claims(TokenType::Access, 3)).unwrap();
        assert_eq!(user.role, Role::Member);
    }

    #[test]
    fn members_record_only_themselves() {
        assert!(user(3, Role::Member).require_can_record_for(3).is_ok());
        assert!(user(3, Role::Member).require_can_record_for(4).is_err());
        assert!(user(3, Role::Guest).require_can_record_for(3).is_err());
        assert!(user(2, Role::Leader).require_can_record_for(4).is_ok());
    }

    #[test]
    fn view_and_edit_rules() {
        let member = user(3, Role::Member);
        assert!(member.require_can_view(&record(3, Some(2))).is_ok());
        assert!(member.require_can_view(&record(4, Some(3))).is_err());
        assert!(member.require_can_edit(&record(3, Some(2))).is_err());
        assert!(member.require_can_edit(&record(3, Some(3))).is_ok());
        assert!(user(2, Role::Leader).require_can_edit(&record(3, None)).is_ok());
    }

    #[test]
    fn leaders_are_held_to_their_organization() {
        let mut leader = user(2, Role::Leader);
        leader.organization_id = Some(2);
        assert!(leader.require_can_view(&record(3, None)).is_err());
        assert!(leader.require_can_edit(&record(3, None)).is_err());
        assert_eq!(leader.organization_scope().unwrap(), OrgScope::Only(2));

        let mut admin = user(1, Role::Admin);
        admin.organization_id = Some(2);
        assert!(admin.require_can_view(&record(3, None)).is_ok());
        assert_eq!(admin.organization_scope().unwrap(), OrgScope::Any);

        let mut stray = user(5, Role::Member);
        stray.organization_id = None;
        assert!(stray.organization_scope().is_err());
    }

    #[test]
    fn only_admins_pass_admin_check() {
        assert!(user(1, Role::Admin).require_admin().is_ok());
        assert!(user(2, Role::Leader).require_admin().is_err());
    }
}
