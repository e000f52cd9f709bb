use crate::{
    config::Config,
    error::ApiError,
    model::role::Role,
    models::TokenType,
};
use actix_web::{
    FromRequest, HttpMessage, HttpRequest,
    dev::Payload,
    http::header::{AUTHORIZATION, HeaderMap},
    web::Data,
};
use futures::future::{Ready, ready};

use super::jwt::verify_token;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
    pub token_type: TokenType,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

/// Validates the bearer token in `headers`. Refresh tokens never grant API access.
pub fn authenticate(headers: &HeaderMap, config: &Config) -> Result<AuthUser, ApiError> {
    let header_value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid Authorization header encoding".into()))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Authorization header must start with Bearer".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid or expired token: {e}")))?;

    if claims.token_type == TokenType::Refresh {
        return Err(ApiError::Unauthorized("Refresh tokens cannot access the API".into()));
    }

    let role = Role::from_id(claims.role).ok_or_else(|| ApiError::Unauthorized("Invalid role".into()))?;

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
        token_type: claims.token_type,
        employee_id: claims.employee_id,
    })
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Already validated by `auth_middleware` on protected scopes.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let result = match req.app_data::<Data<Config>>() {
            Some(config) => authenticate(req.headers(), config),
            None => Err(ApiError::Internal("Config missing".into())),
        };
        ready(result)
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        self.require_any(&[Role::Admin], "Admin only")
    }

    pub fn require_hr_or_admin(&self) -> Result<(), ApiError> {
        self.require_any(&[Role::Admin, Role::Hr], "HR/Admin only")
    }

    /// Badge scans come from readers (ApiUser/System) or from HR kiosks.
    pub fn require_scanner(&self) -> Result<(), ApiError> {
        self.require_any(
            &[Role::Admin, Role::Hr, Role::System, Role::ApiUser],
            "Scanner role required",
        )
    }

    pub fn require_any(&self, roles: &[Role], message: &str) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(message.to_string()))
        }
    }

    /// The caller's own employee id, for self-service endpoints.
    pub fn employee_profile(&self) -> Result<u64, ApiError> {
        self.employee_id
            .ok_or_else(|| ApiError::Forbidden("No employee profile".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_token};
    use actix_web::http::header::HeaderValue;

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "STORAGE" => Some("memory".into()),
            "JWT_SECRET" => Some("unit-secret".into()),
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            _ => None,
        })
        .unwrap()
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn token(role: Role, token_type: TokenType) -> String {
        let subject = TokenSubject {
            user_id: 1,
            username: "hr".into(),
            role,
            employee_id: Some(4),
        };
        generate_token(&subject, token_type, "unit-secret", 60).unwrap().0
    }

    #[test]
    fn accepts_access_tokens() {
        let user = authenticate(&headers_with(&token(Role::Hr, TokenType::Access)), &config()).unwrap();
        assert_eq!(user.role, Role::Hr);
        assert_eq!(user.employee_profile().unwrap(), 4);
        assert!(user.require_hr_or_admin().is_ok());
        assert!(user.require_admin().is_err());
    }

    #[test]
    fn rejects_refresh_tokens_and_missing_header() {
        let err = authenticate(&headers_with(&token(Role::Admin, TokenType::Refresh)), &config()).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");

        let err = authenticate(&HeaderMap::new(), &config()).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }
}
