use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::validation::FieldErrors;
use crate::domain::user::User;
use crate::infra::db::{violated_constraint, Db};

const TOKEN_ISSUER: &str = "tubeshare";
const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 4096;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Il existe déjà un compte avec cet email")]
    EmailTaken,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Registration form as submitted.
#[derive(Debug, Clone, Default)]
pub struct RegistrationInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub agree_terms: bool,
}

impl RegistrationInput {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        let name_len = self.name.trim().chars().count();
        if name_len == 0 {
            errors.push("name", "Veuillez entrer votre nom");
        } else if name_len < 2 {
            errors.push("name", "Votre nom doit contenir au moins 2 caractères");
        } else if name_len > 100 {
            errors.push("name", "Votre nom ne peut pas dépasser 100 caractères");
        }

        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if email.is_empty() || !valid_email || email.len() > 180 {
            errors.push("email", "Veuillez entrer une adresse email valide");
        }

        if self.password.is_empty() {
            errors.push("password", "Veuillez entrer un mot de passe");
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(
                "password",
                "Votre mot de passe doit contenir au moins 6 caractères",
            );
        } else if self.password.len() > MAX_PASSWORD_LEN {
            errors.push("password", "Votre mot de passe est trop long");
        } else if self.password != self.password_confirmation {
            errors.push("password", "Les mots de passe ne correspondent pas.");
        }

        if !self.agree_terms {
            errors.push(
                "agree_terms",
                "Vous devez accepter les conditions d'utilisation.",
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    session_key: [u8; 32],
    session_ttl_hours: u64,
}

impl AuthService {
    pub fn new(db: Db, session_key: [u8; 32], session_ttl_hours: u64) -> Self {
        Self {
            db,
            session_key,
            session_ttl_hours,
        }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let password_hash = hash_password(password)?;
        let row = sqlx::query(
            "INSERT INTO users (name, email, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING id, email, name, created_at",
        )
        .bind(name.trim())
        .bind(normalize_email(email))
        .bind(password_hash)
        .fetch_one(self.db.pool())
        .await
        .map_err(anyhow::Error::from)
        .map_err(|err| match violated_constraint(&err) {
            Some(constraint) if constraint == "users_email_key" => AuthError::EmailTaken.into(),
            _ => err,
        })?;

        Ok(User {
            id: row.get("id"),
            email: row.get("email"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        })
    }

    /// Check credentials and open a session. `None` on bad email or password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<SessionToken>> {
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(self.db.pool())
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let user_id: Uuid = row.get("id");
        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() {
            return Ok(None);
        }

        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let token = self.issue_session_token(user_id)?;
        Ok(Some(token))
    }

    pub fn issue_session_token(&self, user_id: Uuid) -> Result<SessionToken> {
        let duration = std::time::Duration::from_secs(self.session_ttl_hours * 60 * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", "session")?;

        let key = SymmetricKey::<V4>::from(&self.session_key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::hours(self.session_ttl_hours as i64);

        Ok(SessionToken { token, expires_at })
    }

    pub fn authenticate_session_token(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "session") {
            return Ok(None);
        }
        let user_id = claim_uuid(&claims, "sub")?;
        Ok(Some(AuthSession { user_id }))
    }

    pub async fn get_current_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, name, created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        let user = row.map(|row| User {
            id: row.get("id"),
            email: row.get("email"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        });

        Ok(user)
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.session_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn service(key: [u8; 32]) -> AuthService {
        // Token handling never touches the pool.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        AuthService::new(Db::from_pool(pool), key, 1)
    }

    fn registration() -> RegistrationInput {
        RegistrationInput {
            name: "Camille".into(),
            email: "camille@example.com".into(),
            password: "secret42".into(),
            password_confirmation: "secret42".into(),
            agree_terms: true,
        }
    }

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[tokio::test]
    async fn session_token_authenticates_its_subject() {
        let auth = service([3u8; 32]);
        let user_id = Uuid::new_v4();
        let token = auth.issue_session_token(user_id).unwrap();
        let session = auth
            .authenticate_session_token(&token.token)
            .unwrap()
            .expect("valid session");
        assert_eq!(session.user_id, user_id);
    }

    #[tokio::test]
    async fn token_from_another_key_is_rejected() {
        let token = service([3u8; 32])
            .issue_session_token(Uuid::new_v4())
            .unwrap();
        let other = service([4u8; 32]);
        assert!(other.authenticate_session_token(&token.token).unwrap().is_none());
        assert!(other.authenticate_session_token("garbage").unwrap().is_none());
    }

    #[test]
    fn valid_registration_passes() {
        assert!(registration().validate().is_ok());
    }

    #[test]
    fn registration_errors_are_per_field() {
        let input = RegistrationInput {
            name: "C".into(),
            email: "camille".into(),
            password_confirmation: "different".into(),
            agree_terms: false,
            ..registration()
        };
        let errors = input.validate().unwrap_err();
        assert_eq!(
            errors.get("name"),
            Some("Votre nom doit contenir au moins 2 caractères")
        );
        assert!(errors.get("email").is_some());
        assert_eq!(
            errors.get("password"),
            Some("Les mots de passe ne correspondent pas.")
        );
        assert!(errors.get("agree_terms").is_some());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Camille@Example.COM "), "camille@example.com");
    }
}
