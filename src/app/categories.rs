use anyhow::Result;
use sqlx::Row;
use url::Url;
use uuid::Uuid;

use crate::domain::category::Category;
use crate::infra::db::Db;

const ALLOWED_LOGO_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "svg", "webp"];
const MAX_LOGO_LABEL_CHARS: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LogoError {
    #[error("logo cannot be empty")]
    Empty,
    #[error("logo URL is not valid")]
    InvalidUrl,
    #[error("unsupported logo format \"{found}\", accepted: jpg, jpeg, png, gif, svg, webp")]
    UnsupportedFormat { found: String },
    #[error("logo label must be at most 32 characters")]
    TooLong,
}

/// Accept an emoji or short label, or an http(s) image URL.
pub fn validate_logo(logo: &str) -> Result<String, LogoError> {
    let logo = logo.trim();
    if logo.is_empty() {
        return Err(LogoError::Empty);
    }

    let looks_like_url = logo.contains("://") || logo.starts_with("www.");
    if !looks_like_url {
        if logo.chars().count() > MAX_LOGO_LABEL_CHARS {
            return Err(LogoError::TooLong);
        }
        return Ok(logo.to_string());
    }

    let url = Url::parse(logo).map_err(|_| LogoError::InvalidUrl)?;
    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(LogoError::InvalidUrl);
    }

    let extension = url
        .path()
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_LOGO_EXTENSIONS.contains(&extension.as_str()) {
        let found = if extension.is_empty() {
            "(aucun)".to_string()
        } else {
            extension
        };
        return Err(LogoError::UnsupportedFormat { found });
    }

    Ok(logo.to_string())
}

#[derive(Clone)]
pub struct CategoryService {
    db: Db,
}

impl CategoryService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, logo FROM categories ORDER BY name ASC")
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(category_from_row).collect())
    }

    pub async fn get(&self, category_id: Uuid) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT id, name, logo FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(category_from_row))
    }

    pub async fn create(&self, name: &str, logo: &str) -> Result<Category> {
        let logo = validate_logo(logo)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow::anyhow!("category name cannot be empty"));
        }

        let row = sqlx::query(
            "INSERT INTO categories (name, logo) VALUES ($1, $2) RETURNING id, name, logo",
        )
        .bind(name)
        .bind(logo)
        .fetch_one(self.db.pool())
        .await?;

        Ok(category_from_row(&row))
    }

    /// Partial update; `None` when the category does not exist.
    pub async fn update(
        &self,
        category_id: Uuid,
        name: Option<&str>,
        logo: Option<&str>,
    ) -> Result<Option<Category>> {
        let logo = logo.map(validate_logo).transpose()?;
        let name = name.map(str::trim).filter(|name| !name.is_empty());

        let row = sqlx::query(
            "UPDATE categories \
             SET name = COALESCE($2, name), \
                 logo = COALESCE($3, logo) \
             WHERE id = $1 \
             RETURNING id, name, logo",
        )
        .bind(category_id)
        .bind(name)
        .bind(logo)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(category_from_row))
    }
}

fn category_from_row(row: &sqlx::postgres::PgRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        logo: row.get("logo"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emoji_logo_is_accepted() {
        assert_eq!(validate_logo(" 🎮 ").unwrap(), "🎮");
    }

    #[test]
    fn image_url_logo_is_accepted() {
        assert!(validate_logo("https://cdn.example.com/logos/music.PNG").is_ok());
    }

    #[test]
    fn url_without_image_extension_is_rejected() {
        assert_eq!(
            validate_logo("https://example.com/logo").unwrap_err(),
            LogoError::UnsupportedFormat {
                found: "(aucun)".into()
            }
        );
        assert_eq!(
            validate_logo("https://example.com/logo.exe").unwrap_err(),
            LogoError::UnsupportedFormat { found: "exe".into() }
        );
    }

    #[test]
    fn non_http_url_is_rejected() {
        assert_eq!(
            validate_logo("ftp://example.com/a.png").unwrap_err(),
            LogoError::InvalidUrl
        );
    }

    #[test]
    fn long_label_is_rejected() {
        assert_eq!(validate_logo(&"x".repeat(33)).unwrap_err(), LogoError::TooLong);
        assert_eq!(validate_logo("   ").unwrap_err(), LogoError::Empty);
    }
}
