//! Email -> OTP -> comment submission flow.
mod api;
mod form;
pub mod state;
mod store;

pub use api::{CommentApi, CommentApiError, HttpCommentApi, NewComment};
pub use form::{CommentForm, FormTimings, SubmitOutcome};
pub use state::{CommentSession, FormFields, Step};
pub use store::{AUTHOR_NAME_KEY, FileStore, KeyValueStore, MemoryStore, StoreError, TOKEN_KEY};
