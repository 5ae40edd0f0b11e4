pub mod books;
pub mod tokens;
pub mod users;
pub mod wishes;

#[cfg(test)]
pub mod memory;
