use std::collections::HashMap;

use serde::Deserialize;

use crate::store::wishes::NewWish;

const PRIORITIES: [&str; 3] = ["low", "normal", "high"];

/// Request body for a new wish. `priority` defaults to "normal" when absent.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateWishRequest {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub catalog_id: Option<i64>,
    pub priority: Option<String>,
    pub notes: Option<String>,
}

impl CreateWishRequest {
    pub fn validate(&self) -> HashMap<String, String> {
        let mut errors = HashMap::new();

        if self.title.is_empty() {
            errors.insert("title".to_owned(), "title is required".to_owned());
        }

        if self.author.is_empty() {
            errors.insert("author".to_owned(), "author is required".to_owned());
        }

        if let Some(isbn) = &self.isbn {
            if isbn.len() < 13 {
                errors.insert("isbn".to_owned(), "isbn must be 13 characters".to_owned());
            }
        }

        if let Some(priority) = &self.priority {
            if !PRIORITIES.contains(&priority.as_str()) {
                errors.insert(
                    "priority".to_owned(),
                    "priority must be one of: low, normal or high".to_owned(),
                );
            }
        }

        errors
    }

    pub fn into_new_wish(self) -> NewWish {
        NewWish {
            title: self.title,
            author: Some(self.author),
            isbn: self.isbn,
            catalog_id: self.catalog_id,
            priority: self.priority.unwrap_or_else(|| "normal".to_owned()),
            notes: self.notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CreateWishRequest {
        CreateWishRequest {
            title: "The Dispossessed".to_owned(),
            author: "Ursula K. Le Guin".to_owned(),
            ..CreateWishRequest::default()
        }
    }

    #[test]
    fn title_and_author_are_required() {
        let errors = CreateWishRequest::default().validate();
        assert_eq!(
            errors.get("title").map(String::as_str),
            Some("title is required")
        );
        assert_eq!(
            errors.get("author").map(String::as_str),
            Some("author is required")
        );
    }

    #[test]
    fn short_isbn_is_rejected_but_absent_isbn_is_fine() {
        assert!(valid().validate().is_empty());

        let mut request = valid();
        request.isbn = Some("12345".to_owned());
        assert_eq!(
            request.validate().get("isbn").map(String::as_str),
            Some("isbn must be 13 characters")
        );

        let mut request = valid();
        request.isbn = Some("9780061054884".to_owned());
        assert!(request.validate().is_empty());
    }

    #[test]
    fn priority_defaults_to_normal() {
        let wish = valid().into_new_wish();
        assert_eq!(wish.priority, "normal");
    }

    #[test]
    fn unknown_priority_is_rejected() {
        let mut request = valid();
        request.priority = Some("urgent".to_owned());
        assert_eq!(
            request.validate().get("priority").map(String::as_str),
            Some("priority must be one of: low, normal or high")
        );

        for priority in PRIORITIES {
            let mut request = valid();
            request.priority = Some(priority.to_owned());
            assert!(request.validate().is_empty(), "{priority} should be valid");
        }
    }
}
