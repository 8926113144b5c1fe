//! Domain records for the admin backend.
//!
//! Everything here is plain data plus the pure rules that go with it
//! (validation, status transitions, segmentation, SEO scoring, test
//! statistics). Persistence and orchestration live in the `service` crate.

pub mod affiliate;
pub mod analytics;
pub mod campaign;
pub mod content;
pub mod customer;
pub mod errors;
pub mod order;
pub mod product;
pub mod seo;

use errors::ModelError;

/// Round a money amount to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub fn validate_name(field: &str, value: &str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(ModelError::validation(format!("{field} required")));
    }
    if value.chars().count() > 200 {
        return Err(ModelError::validation(format!("{field} too long (<=200)")));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ModelError> {
    let email = email.trim();
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| ModelError::validation("invalid email"))?;
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(char::is_whitespace) {
        return Err(ModelError::validation("invalid email"));
    }
    Ok(())
}

pub fn validate_http_url(field: &str, url: &str) -> Result<(), ModelError> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ModelError::validation(format!("{field} must start with http(s)")))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ModelError::validation(format!("{field} is missing a host")));
    }
    Ok(())
}

/// Trim every tag, drop empties and duplicates, keep first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            out.push(tag);
        }
    }
    out
}

/// Blank optional strings collapse to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_cents(10.005_1), 10.01);
        assert_eq!(round_cents(3.333_3), 3.33);
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("ana.example.com").is_err());
        assert!(validate_email("ana@localhost").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }

    #[test]
    fn url_rules() {
        assert!(validate_http_url("url", "https://shop.example/p/1").is_ok());
        assert!(validate_http_url("url", "ftp://shop.example").is_err());
        assert!(validate_http_url("url", "https://").is_err());
    }

    #[test]
    fn tags_are_deduplicated() {
        let tags = normalize_tags(vec![" Summer ".into(), "summer".into(), "".into(), "sale".into()]);
        assert_eq!(tags, vec!["Summer".to_string(), "sale".to_string()]);
    }
}
