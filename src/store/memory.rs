//! In-memory store implementations for tests. Behavior mirrors the Postgres
//! stores closely enough that handler tests exercise the same branches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::extract::Page;
use crate::store::books::{Book, BookStore, NewBook};
use crate::store::tokens::{generate, Scope, ScopeSet, Token, TokenRecord, TokenStore};
use crate::store::users::{Credential, DuplicateEmail, User, UserStore};
use crate::store::wishes::{Acquisition, NewWish, Wish, WishStore};

#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<HashMap<Uuid, Credential>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, email: &str, name: &str, password_hash: &str) -> anyhow::Result<User> {
        let mut rows = self.rows.lock().unwrap();

        if rows.values().any(|c| c.user.email == email) {
            return Err(anyhow::Error::new(DuplicateEmail));
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            name: name.to_owned(),
            created_at: now,
            updated_at: now,
        };
        rows.insert(
            user.id,
            Credential {
                user: user.clone(),
                password_hash: password_hash.to_owned(),
            },
        );

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Credential>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.values().find(|c| c.user.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(&id).map(|c| c.user.clone()))
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(credential) = rows.get_mut(&user_id) {
            credential.password_hash = password_hash.to_owned();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    rows: Mutex<HashMap<Vec<u8>, TokenRecord>>,
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn create(&self, user_id: Uuid, scope: ScopeSet, ttl: Duration) -> anyhow::Result<Token> {
        let token = generate(user_id, scope, ttl);

        let mut rows = self.rows.lock().unwrap();
        rows.insert(
            token.hash.clone(),
            TokenRecord {
                hash: token.hash.clone(),
                user_id: token.user_id,
                expiry: token.expiry,
                scope: token.scope.clone(),
            },
        );

        Ok(token)
    }

    async fn resolve(&self, plaintext: &str) -> anyhow::Result<Option<TokenRecord>> {
        let hash = super::tokens::fingerprint(plaintext);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .get(&hash)
            .filter(|r| r.expiry > OffsetDateTime::now_utc())
            .cloned())
    }

    async fn revoke_all(&self, user_id: Uuid, scope: Scope) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|_, r| !(r.user_id == user_id && r.scope.contains(scope)));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBookStore {
    rows: Mutex<HashMap<Uuid, Book>>,
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn create(&self, user_id: Uuid, new: NewBook) -> anyhow::Result<Book> {
        let now = OffsetDateTime::now_utc();
        let book = Book {
            id: Uuid::new_v4(),
            user_id,
            title: new.title,
            author: new.author,
            isbn: new.isbn,
            description: new.description,
            cover_url: new.cover_url,
            genre: new.genre,
            status: new.status,
            rating: new.rating,
            notes: new.notes,
            date_added: new.date_added,
            date_started: new.date_started,
            date_finished: new.date_finished,
            created_at: now,
            updated_at: now,
        };

        let mut rows = self.rows.lock().unwrap();
        rows.insert(book.id, book.clone());

        Ok(book)
    }

    async fn list(&self, user_id: Uuid, page: Page) -> anyhow::Result<Vec<Book>> {
        let rows = self.rows.lock().unwrap();
        let mut books: Vec<Book> = rows
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(books
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.take as usize)
            .collect())
    }

    async fn count(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.values().filter(|b| b.user_id == user_id).count() as i64)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Book>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(&id).filter(|b| b.user_id == user_id).cloned())
    }

    async fn update(&self, book: &Book) -> anyhow::Result<Option<Book>> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&book.id) {
            Some(existing) if existing.user_id == book.user_id => {
                let mut updated = book.clone();
                updated.updated_at = OffsetDateTime::now_utc();
                *existing = updated.clone();
                Ok(Some(updated))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&id) {
            Some(b) if b.user_id == user_id => {
                rows.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

pub struct MemoryWishStore {
    rows: Mutex<HashMap<Uuid, Wish>>,
    books: Arc<MemoryBookStore>,
}

impl MemoryWishStore {
    pub fn new(books: Arc<MemoryBookStore>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            books,
        }
    }
}

#[async_trait]
impl WishStore for MemoryWishStore {
    async fn create(&self, user_id: Uuid, new: NewWish) -> anyhow::Result<Wish> {
        let now = OffsetDateTime::now_utc();
        let wish = Wish {
            id: Uuid::new_v4(),
            user_id,
            title: new.title,
            author: new.author,
            isbn: new.isbn,
            catalog_id: new.catalog_id,
            priority: new.priority,
            acquired: false,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };

        let mut rows = self.rows.lock().unwrap();
        rows.insert(wish.id, wish.clone());

        Ok(wish)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Wish>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(&id).cloned())
    }

    async fn list(&self, user_id: Uuid, page: Page) -> anyhow::Result<Vec<Wish>> {
        let rows = self.rows.lock().unwrap();
        let mut wishes: Vec<Wish> = rows
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        wishes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(wishes
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.take as usize)
            .collect())
    }

    async fn count(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.values().filter(|w| w.user_id == user_id).count() as i64)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.remove(&id).is_some())
    }

    async fn acquire(&self, id: Uuid) -> anyhow::Result<Acquisition> {
        let pending = {
            let rows = self.rows.lock().unwrap();
            match rows.get(&id) {
                None => return Ok(Acquisition::NotFound),
                Some(w) if w.acquired => return Ok(Acquisition::AlreadyAcquired),
                Some(w) => w.clone(),
            }
        };

        let book = self
            .books
            .create(
                pending.user_id,
                NewBook {
                    title: pending.title.clone(),
                    author: pending.author.clone().unwrap_or_default(),
                    isbn: pending.isbn.clone(),
                    description: None,
                    cover_url: None,
                    genre: None,
                    status: "to_read".to_owned(),
                    rating: 1,
                    notes: pending.notes.clone(),
                    date_added: OffsetDateTime::now_utc().date(),
                    date_started: None,
                    date_finished: None,
                },
            )
            .await?;

        let mut rows = self.rows.lock().unwrap();
        if let Some(wish) = rows.get_mut(&id) {
            wish.acquired = true;
            wish.updated_at = OffsetDateTime::now_utc();
        }

        Ok(Acquisition::Created(book))
    }
}

#[cfg(test)]
mod token_store_tests {
    use super::*;

    #[tokio::test]
    async fn resolve_rejects_expired_tokens() {
        let store = MemoryTokenStore::default();
        let user = Uuid::new_v4();

        let expired = store
            .create(user, ScopeSet::all(), Duration::hours(-1))
            .await
            .unwrap();
        let fresh = store
            .create(user, ScopeSet::all(), Duration::hours(1))
            .await
            .unwrap();

        assert!(store.resolve(&expired.plaintext).await.unwrap().is_none());
        assert!(store.resolve(&fresh.plaintext).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn resolve_rejects_unknown_plaintext() {
        let store = MemoryTokenStore::default();
        assert!(store.resolve("no-such-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_all_matches_scope_exactly() {
        let store = MemoryTokenStore::default();
        let user = Uuid::new_v4();

        let full = store
            .create(user, ScopeSet::all(), Duration::hours(1))
            .await
            .unwrap();
        let books_only = store
            .create(user, ScopeSet::from(Scope::Books), Duration::hours(1))
            .await
            .unwrap();

        store.revoke_all(user, Scope::Auth).await.unwrap();

        assert!(store.resolve(&full.plaintext).await.unwrap().is_none());
        assert!(store.resolve(&books_only.plaintext).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revoke_all_leaves_other_users_alone() {
        let store = MemoryTokenStore::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let alice_token = store
            .create(alice, ScopeSet::all(), Duration::hours(1))
            .await
            .unwrap();
        let bob_token = store
            .create(bob, ScopeSet::all(), Duration::hours(1))
            .await
            .unwrap();

        store.revoke_all(alice, Scope::Auth).await.unwrap();

        assert!(store.resolve(&alice_token.plaintext).await.unwrap().is_none());
        assert!(store.resolve(&bob_token.plaintext).await.unwrap().is_some());
    }
}

#[cfg(test)]
mod wish_store_tests {
    use super::*;

    fn stores() -> (Arc<MemoryBookStore>, MemoryWishStore) {
        let books = Arc::new(MemoryBookStore::default());
        let wishes = MemoryWishStore::new(books.clone());
        (books, wishes)
    }

    fn new_wish(title: &str) -> NewWish {
        NewWish {
            title: title.to_owned(),
            author: Some("Ursula K. Le Guin".to_owned()),
            isbn: None,
            catalog_id: None,
            priority: "normal".to_owned(),
            notes: Some("recommended by a friend".to_owned()),
        }
    }

    #[tokio::test]
    async fn acquire_copies_the_wish_onto_the_shelf() {
        let (books, wishes) = stores();
        let user = Uuid::new_v4();

        let wish = wishes.create(user, new_wish("The Dispossessed")).await.unwrap();

        let outcome = wishes.acquire(wish.id).await.unwrap();
        let book = match outcome {
            Acquisition::Created(book) => book,
            other => panic!("expected Created, got {other:?}"),
        };

        assert_eq!(book.user_id, user);
        assert_eq!(book.title, "The Dispossessed");
        assert_eq!(book.author, "Ursula K. Le Guin");
        assert_eq!(book.status, "to_read");
        assert_eq!(book.rating, 1);
        assert_eq!(book.notes.as_deref(), Some("recommended by a friend"));
        assert_eq!(books.count(user).await.unwrap(), 1);

        let stored = wishes.find(wish.id).await.unwrap().unwrap();
        assert!(stored.acquired);
    }

    #[tokio::test]
    async fn acquire_twice_does_not_duplicate_the_book() {
        let (books, wishes) = stores();
        let user = Uuid::new_v4();

        let wish = wishes.create(user, new_wish("Piranesi")).await.unwrap();
        wishes.acquire(wish.id).await.unwrap();

        let second = wishes.acquire(wish.id).await.unwrap();
        assert!(matches!(second, Acquisition::AlreadyAcquired));
        assert_eq!(books.count(user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn acquire_missing_wish_reports_not_found() {
        let (_, wishes) = stores();
        let outcome = wishes.acquire(Uuid::new_v4()).await.unwrap();
        assert!(matches!(outcome, Acquisition::NotFound));
    }

    #[tokio::test]
    async fn acquire_defaults_missing_author_to_empty() {
        let (_, wishes) = stores();
        let user = Uuid::new_v4();

        let mut input = new_wish("Anonymous Epic");
        input.author = None;
        let wish = wishes.create(user, input).await.unwrap();

        let outcome = wishes.acquire(wish.id).await.unwrap();
        match outcome {
            Acquisition::Created(book) => assert_eq!(book.author, ""),
            other => panic!("expected Created, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod user_store_tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryUserStore::default();
        store
            .create("reader@example.com", "Reader", "hash-one")
            .await
            .unwrap();

        let err = store
            .create("reader@example.com", "Impostor", "hash-two")
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<DuplicateEmail>().is_some());
    }

    #[tokio::test]
    async fn update_password_replaces_the_hash() {
        let store = MemoryUserStore::default();
        let user = store
            .create("reader@example.com", "Reader", "old-hash")
            .await
            .unwrap();

        store.update_password(user.id, "new-hash").await.unwrap();

        let credential = store
            .find_by_email("reader@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(credential.password_hash, "new-hash");
    }
}
