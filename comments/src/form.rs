use crate::api::{CommentApi, NewComment};
use crate::state::{
    Command, CommentSession, Delay, Event, Failure, FormFields, transition,
};
use crate::store::{AUTHOR_NAME_KEY, KeyValueStore, TOKEN_KEY};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormTimings {
    /// Pause before the step changes after an OTP verification.
    pub step_change: Duration,
    /// Delay before the page reloads after a successful comment.
    pub reload: Duration,
}

impl Default for FormTimings {
    fn default() -> Self {
        Self {
            step_change: Duration::from_secs(1),
            reload: Duration::from_secs(2),
        }
    }
}

impl FormTimings {
    pub fn immediate() -> Self {
        Self {
            step_change: Duration::ZERO,
            reload: Duration::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Another submission was in flight, or the form is done.
    Dropped,
    Completed,
    /// The comment was accepted; the page should reload after the delay.
    Reload(Duration),
}

/// Drives a [`CommentSession`] against the API and the durable store.
///
/// The session lock is only held while applying a transition, never across
/// an API call, so a second `submit` while one is running observes the
/// in-flight flag and is dropped.
pub struct CommentForm<A, S> {
    api: A,
    store: S,
    timings: FormTimings,
    session: Mutex<CommentSession>,
}

impl<A: CommentApi, S: KeyValueStore> CommentForm<A, S> {
    pub fn new(api: A, store: S, post_id: &str) -> Self {
        Self {
            api,
            store,
            timings: FormTimings::default(),
            session: Mutex::new(CommentSession::new(post_id)),
        }
    }

    pub fn with_timings(mut self, timings: FormTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn session(&self) -> CommentSession {
        self.lock().clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Restores stored values and resolves the post id.
    pub async fn attach(&self) {
        let event = Event::Attached {
            stored_token: self.stored(TOKEN_KEY),
            stored_author: self.stored(AUTHOR_NAME_KEY),
        };
        let commands = self.apply(event);
        self.run(commands).await;
    }

    pub async fn submit(&self, fields: FormFields) -> SubmitOutcome {
        let stored_token = self.stored(TOKEN_KEY);

        let commands = {
            let mut session = self.lock();
            if !session.can_submit() {
                tracing::debug!(step = session.step.number(), "dropping submission");
                return SubmitOutcome::Dropped;
            }
            let t = transition(
                &session,
                Event::Submitted {
                    fields,
                    stored_token,
                },
            );
            *session = t.next;
            t.commands
        };

        match self.run(commands).await {
            Some(delay) => SubmitOutcome::Reload(delay),
            None => SubmitOutcome::Completed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CommentSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn apply(&self, event: Event) -> Vec<Command> {
        let mut session = self.lock();
        let t = transition(&session, event);
        *session = t.next;
        t.commands
    }

    fn stored(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "failed to read stored value");
            None
        })
    }

    /// Executes commands until the queue drains. Returns the reload delay
    /// when one was scheduled.
    async fn run(&self, commands: Vec<Command>) -> Option<Duration> {
        let mut queue = VecDeque::from(commands);
        let mut reload = None;

        while let Some(command) = queue.pop_front() {
            let follow_up = match command {
                Command::RequestOtp { email } => {
                    let result = self.api.request_otp(&email).await;
                    Some(Event::OtpRequested(result.map_err(|e| failure("request otp", &e))))
                }
                Command::VerifyOtp { email, code } => {
                    let result = self.api.verify_otp(&email, &code).await;
                    Some(Event::OtpVerified(result.map_err(|e| failure("verify otp", &e))))
                }
                Command::ResolvePostId { post_id } => {
                    let result = self.api.resolve_post_id(&post_id).await;
                    Some(Event::PostIdResolved(
                        result.map_err(|e| failure("resolve post id", &e)),
                    ))
                }
                Command::SubmitComment {
                    token,
                    post_id,
                    author_name,
                    content,
                } => {
                    let comment = NewComment {
                        post_id,
                        author_name,
                        content,
                    };
                    let result = self.api.submit_comment(&token, &comment).await;
                    Some(Event::CommentPosted(
                        result.map_err(|e| failure("submit comment", &e)),
                    ))
                }
                Command::StoreToken(token) => {
                    self.persist(TOKEN_KEY, Some(&token));
                    None
                }
                Command::ClearToken => {
                    self.persist(TOKEN_KEY, None);
                    None
                }
                Command::StoreAuthorName(name) => {
                    self.persist(AUTHOR_NAME_KEY, Some(&name));
                    None
                }
                Command::Schedule { after, event } => {
                    let delay = match after {
                        Delay::StepChange => self.timings.step_change,
                    };
                    tokio::time::sleep(delay).await;
                    Some(event)
                }
                Command::ScheduleReload => {
                    reload = Some(self.timings.reload);
                    None
                }
            };

            if let Some(event) = follow_up {
                queue.extend(self.apply(event));
            }
        }

        reload
    }

    fn persist(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        };
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "failed to update stored value");
        }
    }
}

fn failure(operation: &str, error: &crate::api::CommentApiError) -> Failure {
    tracing::warn!(operation, error = %error, "comment API call failed");
    Failure::from(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CommentApiError, HttpCommentApi};
    use crate::state::{MSG_COMMENT_SENT, MSG_EMPTY_EMAIL, MSG_NO_TOKEN, Message, Step};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use shared::testutils::{CannedResponse, RecordedRequest, TestServer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn start_api() -> TestServer {
        TestServer::spawn(|req: &RecordedRequest| match req.path() {
            "/api/comments/request-otp" => CannedResponse::json(200, json!({"sent": true})),
            "/api/comments/verify-otp" => CannedResponse::json(200, json!({"token": "tok-1"})),
            "/api/comments" => CannedResponse::json(201, json!({"id": 1})),
            _ => CannedResponse::text(404, "text/plain", "Not Found"),
        })
        .await
    }

    fn form_for(server: &TestServer, post_id: &str) -> CommentForm<HttpCommentApi, MemoryStore> {
        CommentForm::new(
            HttpCommentApi::new(&server.url("/api")),
            MemoryStore::new(),
            post_id,
        )
        .with_timings(FormTimings::immediate())
    }

    #[tokio::test]
    async fn test_full_flow() {
        let server = start_api().await;
        let form = form_for(&server, "5");
        form.attach().await;
        assert_eq!(form.session().step, Step::Email);

        assert_eq!(
            form.submit(FormFields::email("a@b.com")).await,
            SubmitOutcome::Completed
        );
        assert_eq!(form.session().step, Step::Otp);

        form.submit(FormFields::otp("123456")).await;
        assert_eq!(form.session().step, Step::Comment);
        assert_eq!(form.store().get(TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));

        let outcome = form.submit(FormFields::comment("Ana", "Hola")).await;
        assert_eq!(outcome, SubmitOutcome::Reload(Duration::ZERO));

        let session = form.session();
        assert_eq!(session.message, Some(Message::info(MSG_COMMENT_SENT)));
        assert!(session.submit_disabled);
        assert_eq!(
            form.store().get(AUTHOR_NAME_KEY).unwrap().as_deref(),
            Some("Ana")
        );

        let posted = &server.requests_to("/api/comments")[0];
        assert_eq!(posted.header("authorization"), Some("Bearer tok-1"));
        assert_eq!(
            posted.json(),
            json!({"postId": 5, "authorName": "Ana", "content": "Hola"})
        );

        // Further submissions are ignored once the comment is sent
        assert_eq!(
            form.submit(FormFields::comment("Ana", "Otra vez")).await,
            SubmitOutcome::Dropped
        );
        assert_eq!(server.requests_to("/api/comments").len(), 1);
    }

    #[tokio::test]
    async fn test_empty_email_makes_no_request() {
        let server = start_api().await;
        let form = form_for(&server, "5");
        form.attach().await;

        form.submit(FormFields::email("")).await;
        let session = form.session();
        assert_eq!(session.step, Step::Email);
        assert_eq!(session.message, Some(Message::error(MSG_EMPTY_EMAIL)));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_stored_token_starts_at_comment_step() {
        let server = start_api().await;
        let form = form_for(&server, "5");
        form.store().set(TOKEN_KEY, "tok-9").unwrap();
        form.store().set(AUTHOR_NAME_KEY, "Ana").unwrap();
        form.attach().await;

        let session = form.session();
        assert_eq!(session.step, Step::Comment);
        assert_eq!(session.author_name, "Ana");

        form.submit(FormFields::comment("Ana", "Hola")).await;
        assert_eq!(
            server.requests_to("/api/comments")[0].header("authorization"),
            Some("Bearer tok-9")
        );
    }

    #[tokio::test]
    async fn test_comment_without_token_is_not_sent() {
        let server = start_api().await;
        let form = form_for(&server, "5");
        form.attach().await;
        form.lock().step = Step::Comment;

        form.submit(FormFields::comment("Ana", "Hola")).await;
        assert_eq!(form.session().message, Some(Message::error(MSG_NO_TOKEN)));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_uuid_post_lookup_failure() {
        let server = start_api().await;
        let form = form_for(&server, "0b6c-uuid");
        form.attach().await;

        assert_eq!(server.requests_to("/api/posts/uuid/0b6c-uuid").len(), 1);
        let session = form.session();
        assert_eq!(session.numeric_post_id, None);
        assert_eq!(
            session.message.map(|m| m.text),
            Some("No se pudo inicializar el formulario.".to_string())
        );
    }

    /// Counts OTP requests and takes a while to answer.
    struct SlowApi {
        otp_requests: AtomicUsize,
    }

    #[async_trait]
    impl CommentApi for SlowApi {
        async fn request_otp(&self, _email: &str) -> Result<(), CommentApiError> {
            self.otp_requests.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }

        async fn verify_otp(&self, _: &str, _: &str) -> Result<Option<String>, CommentApiError> {
            Ok(None)
        }

        async fn resolve_post_id(&self, _: &str) -> Result<u64, CommentApiError> {
            Ok(1)
        }

        async fn submit_comment(&self, _: &str, _: &NewComment) -> Result<(), CommentApiError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_submission_is_dropped() {
        let api = SlowApi {
            otp_requests: AtomicUsize::new(0),
        };
        let form = CommentForm::new(api, MemoryStore::new(), "1");
        form.attach().await;

        let (first, second) = tokio::join!(
            form.submit(FormFields::email("a@b.com")),
            form.submit(FormFields::email("a@b.com")),
        );

        assert_eq!(first, SubmitOutcome::Completed);
        assert_eq!(second, SubmitOutcome::Dropped);
        assert_eq!(form.api.otp_requests.load(Ordering::SeqCst), 1);
        assert_eq!(form.session().step, Step::Otp);
    }

    #[tokio::test]
    async fn test_verify_without_token_reverts() {
        let api = SlowApi {
            otp_requests: AtomicUsize::new(0),
        };
        let form = CommentForm::new(api, MemoryStore::new(), "1")
            .with_timings(FormTimings::immediate());
        form.store().set(TOKEN_KEY, "stale").unwrap();
        form.attach().await;
        {
            let mut session = form.lock();
            session.step = Step::Otp;
            session.jwt = None;
        }

        form.submit(FormFields::otp("123456")).await;
        assert_eq!(form.session().step, Step::Otp);
        assert_eq!(form.store().get(TOKEN_KEY).unwrap(), None);
    }

    /// Hands out a token on the first verification and rejects the rest.
    struct OneShotOtp {
        verifies: AtomicUsize,
    }

    #[async_trait]
    impl CommentApi for OneShotOtp {
        async fn request_otp(&self, _email: &str) -> Result<(), CommentApiError> {
            Ok(())
        }

        async fn verify_otp(&self, _: &str, _: &str) -> Result<Option<String>, CommentApiError> {
            match self.verifies.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(Some("tok-1".into())),
                _ => Err(CommentApiError::Rejected {
                    status: reqwest::StatusCode::UNAUTHORIZED,
                    body: "OTP already used".into(),
                }),
            }
        }

        async fn resolve_post_id(&self, _: &str) -> Result<u64, CommentApiError> {
            Ok(1)
        }

        async fn submit_comment(&self, _: &str, _: &NewComment) -> Result<(), CommentApiError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_resubmit_during_step_change_is_dropped() {
        let api = OneShotOtp {
            verifies: AtomicUsize::new(0),
        };
        let form = CommentForm::new(api, MemoryStore::new(), "1").with_timings(FormTimings {
            step_change: Duration::from_millis(200),
            reload: Duration::ZERO,
        });
        form.attach().await;
        {
            let mut session = form.lock();
            session.step = Step::Otp;
            session.user_email = "a@b.com".into();
        }

        let (first, second) = tokio::join!(form.submit(FormFields::otp("123456")), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            form.submit(FormFields::otp("123456")).await
        });

        assert_eq!(first, SubmitOutcome::Completed);
        assert_eq!(second, SubmitOutcome::Dropped);
        assert_eq!(form.api.verifies.load(Ordering::SeqCst), 1);

        let session = form.session();
        assert_eq!(session.step, Step::Comment);
        assert_eq!(session.jwt.as_deref(), Some("tok-1"));
        assert!(session.can_submit());
        assert_eq!(form.store().get(TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));
    }
}
