//! Feature facades pairing one cached collection with the API calls that
//! fill and mutate it.
//!
//! Each service owns the fetcher closures for its collection and expresses
//! every mutation through [`store::optimistic`](crate::store::optimistic),
//! so views talk to a service and never to the store or the HTTP client
//! directly.

mod chat;
mod comments;
mod reviews;
mod shelves;

pub use chat::ChatService;
pub use comments::CommentsService;
pub use reviews::ReviewsService;
pub use shelves::ShelvesService;
