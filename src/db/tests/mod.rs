use crate::db::*;
use crate::types::BookId;


/// Shorthand for a minimal NewJob used across tests
fn sample_job(book_id: i64) -> NewJob {
    NewJob {
        book_id: BookId(book_id),
        book_name: Some(format!("Book {}", book_id)),
        book_author: Some("Author".to_string()),
        book_cover_url: None,
        source_id: 1,
        book_url: format!("https://example.com/book/{}", book_id),
        variables: None,
    }
}
