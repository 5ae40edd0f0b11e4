use std::collections::HashMap;

use serde::Deserialize;
use time::{macros::format_description, Date};

use crate::store::books::{Book, NewBook};

const VALID_STATUSES: [&str; 3] = ["to_read", "reading", "read"];

fn parse_date(raw: &str) -> Option<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw, &format).ok()
}

fn check_date(errors: &mut HashMap<String, String>, field: &str, value: Option<&str>) {
    if let Some(raw) = value {
        if parse_date(raw).is_none() {
            errors.insert(
                field.to_owned(),
                format!("{field} must be in YYYY-MM-DD format"),
            );
        }
    }
}

fn check_status(errors: &mut HashMap<String, String>, status: &str) {
    if !VALID_STATUSES.contains(&status) {
        errors.insert(
            "status".to_owned(),
            "status must be one of: to_read, reading, read".to_owned(),
        );
    }
}

/// Request body for a new book. Absent fields decode to their defaults and
/// are caught by `validate`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub genre: Option<String>,
    pub status: String,
    pub rating: i16,
    pub notes: Option<String>,
    pub date_added: Option<String>,
    pub date_started: Option<String>,
    pub date_finished: Option<String>,
}

impl CreateBookRequest {
    pub fn validate(&self) -> HashMap<String, String> {
        let mut errors = HashMap::new();

        if self.title.is_empty() {
            errors.insert("title".to_owned(), "title is required".to_owned());
        }

        if self.author.is_empty() {
            errors.insert("author".to_owned(), "author is required".to_owned());
        }

        if self.status.is_empty() {
            errors.insert("status".to_owned(), "status is required".to_owned());
        } else {
            check_status(&mut errors, &self.status);
        }

        if !(1..=5).contains(&self.rating) {
            errors.insert(
                "rating".to_owned(),
                "rating must be between 1 and 5".to_owned(),
            );
        }

        check_date(&mut errors, "date_added", self.date_added.as_deref());
        check_date(&mut errors, "date_started", self.date_started.as_deref());
        check_date(&mut errors, "date_finished", self.date_finished.as_deref());

        errors
    }

    /// Only call after a clean `validate`; date strings that fail to parse
    /// here fall back to defaults.
    pub fn into_new_book(self, today: Date) -> NewBook {
        NewBook {
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            description: self.description,
            cover_url: self.cover_url,
            genre: self.genre,
            status: self.status,
            rating: self.rating,
            notes: self.notes,
            date_added: self
                .date_added
                .as_deref()
                .and_then(parse_date)
                .unwrap_or(today),
            date_started: self.date_started.as_deref().and_then(parse_date),
            date_finished: self.date_finished.as_deref().and_then(parse_date),
        }
    }
}

/// Request body for a book update. Every field is optional; absent fields
/// leave the stored value untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub genre: Option<String>,
    pub status: Option<String>,
    pub rating: Option<i16>,
    pub notes: Option<String>,
    pub date_added: Option<String>,
    pub date_started: Option<String>,
    pub date_finished: Option<String>,
}

impl UpdateBookRequest {
    pub fn validate(&self) -> HashMap<String, String> {
        let mut errors = HashMap::new();

        if let Some(status) = &self.status {
            check_status(&mut errors, status);
        }

        if let Some(rating) = self.rating {
            if !(1..=5).contains(&rating) {
                errors.insert(
                    "rating".to_owned(),
                    "rating must be between 1 and 5".to_owned(),
                );
            }
        }

        check_date(&mut errors, "date_added", self.date_added.as_deref());
        check_date(&mut errors, "date_started", self.date_started.as_deref());
        check_date(&mut errors, "date_finished", self.date_finished.as_deref());

        errors
    }

    /// Folds the provided fields into the stored book.
    pub fn apply_to(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(isbn) = self.isbn {
            book.isbn = Some(isbn);
        }
        if let Some(description) = self.description {
            book.description = Some(description);
        }
        if let Some(cover_url) = self.cover_url {
            book.cover_url = Some(cover_url);
        }
        if let Some(genre) = self.genre {
            book.genre = Some(genre);
        }
        if let Some(status) = self.status {
            book.status = status;
        }
        if let Some(rating) = self.rating {
            book.rating = rating;
        }
        if let Some(notes) = self.notes {
            book.notes = Some(notes);
        }
        if let Some(date) = self.date_added.as_deref().and_then(parse_date) {
            book.date_added = date;
        }
        if let Some(date) = self.date_started.as_deref().and_then(parse_date) {
            book.date_started = Some(date);
        }
        if let Some(date) = self.date_finished.as_deref().and_then(parse_date) {
            book.date_finished = Some(date);
        }
    }
}
