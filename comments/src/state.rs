//! The comment form as a pure state machine.
//!
//! [`transition`] never performs I/O. It returns the next session together
//! with the commands the driver has to execute; their outcomes come back as
//! events.

pub const MSG_EMPTY_EMAIL: &str = "Completa el campo de email.";
pub const MSG_OTP_SENT: &str = "Te enviamos un OTP a tu email.";
pub const MSG_OTP_REQUEST_FAILED: &str = "No se pudo solicitar el OTP.";
pub const MSG_EMPTY_OTP: &str = "Completa el campo de OTP.";
pub const MSG_OTP_VERIFIED: &str = "OTP validado. Ahora puedes comentar.";
pub const MSG_OTP_NO_TOKEN: &str = "No se recibió token del backend. Intenta de nuevo.";
pub const MSG_OTP_REJECTED: &str = "OTP incorrecto o expirado.";
pub const MSG_OTP_ERROR: &str = "Error validando OTP.";
pub const MSG_EMPTY_FIELDS: &str = "Completa todos los campos.";
pub const MSG_NO_TOKEN: &str = "Debes validar tu email antes de comentar.";
pub const MSG_INIT_FAILED: &str = "No se pudo inicializar el formulario.";
pub const MSG_COMMENT_SENT: &str = "¡Comentario enviado! Será revisado antes de publicarse.";
pub const MSG_COMMENT_ERROR: &str = "Error al enviar comentario";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    #[default]
    Email = 1,
    Otp = 2,
    Comment = 3,
}

impl Step {
    pub const fn number(&self) -> u8 {
        *self as u8
    }
}

/// Inline text shown under the form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub is_error: bool,
}

impl Message {
    pub fn info(text: &str) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Everything the user may have typed. Only the fields of the current step
/// are read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormFields {
    pub email: String,
    pub otp: String,
    pub name: String,
    pub content: String,
}

impl FormFields {
    pub fn email(email: &str) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn otp(otp: &str) -> Self {
        Self {
            otp: otp.into(),
            ..Default::default()
        }
    }

    pub fn comment(name: &str, content: &str) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Why an API call failed, as far as the form cares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    /// The API answered with a non-success status.
    Rejected { status: u16, body: String },
    /// The API could not be reached or answered with garbage.
    Transport(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingComment {
    pub token: String,
    pub author_name: String,
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentSession {
    pub step: Step,
    pub post_id: String,
    pub numeric_post_id: Option<u64>,
    pub user_email: String,
    pub otp: String,
    pub jwt: Option<String>,
    pub author_name: String,
    pub message: Option<Message>,
    pub in_flight: bool,
    pub submit_disabled: bool,
    /// A comment waiting for the post id lookup to finish.
    pub pending: Option<PendingComment>,
}

impl CommentSession {
    pub fn new(post_id: &str) -> Self {
        Self {
            post_id: post_id.trim().to_string(),
            ..Default::default()
        }
    }

    pub fn can_submit(&self) -> bool {
        !self.in_flight && !self.submit_disabled
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Attached {
        stored_token: Option<String>,
        stored_author: Option<String>,
    },
    Submitted {
        fields: FormFields,
        stored_token: Option<String>,
    },
    OtpRequested(Result<(), Failure>),
    OtpVerified(Result<Option<String>, Failure>),
    PostIdResolved(Result<u64, Failure>),
    CommentPosted(Result<(), Failure>),
    DelayElapsed(Step),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delay {
    /// Pause before a step change after OTP verification.
    StepChange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    RequestOtp { email: String },
    VerifyOtp { email: String, code: String },
    ResolvePostId { post_id: String },
    SubmitComment {
        token: String,
        post_id: u64,
        author_name: String,
        content: String,
    },
    StoreToken(String),
    ClearToken,
    StoreAuthorName(String),
    Schedule { after: Delay, event: Event },
    ScheduleReload,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub next: CommentSession,
    pub commands: Vec<Command>,
}

impl Transition {
    fn stay(next: CommentSession) -> Self {
        Self {
            next,
            commands: Vec::new(),
        }
    }
}

/// Numeric identifiers are used as they are; anything else needs a lookup.
pub fn parse_numeric_id(post_id: &str) -> Option<u64> {
    if post_id.is_empty() || !post_id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    post_id.parse().ok()
}

pub fn transition(state: &CommentSession, event: Event) -> Transition {
    let mut next = state.clone();

    match event {
        Event::Attached {
            stored_token,
            stored_author,
        } => {
            if let Some(token) = stored_token.filter(|t| !t.is_empty()) {
                next.jwt = Some(token);
                next.step = Step::Comment;
            }
            if let Some(name) = stored_author {
                next.author_name = name;
            }

            match parse_numeric_id(&next.post_id) {
                Some(id) => {
                    next.numeric_post_id = Some(id);
                    Transition::stay(next)
                }
                None => {
                    let post_id = next.post_id.clone();
                    Transition {
                        next,
                        commands: vec![Command::ResolvePostId { post_id }],
                    }
                }
            }
        }

        Event::Submitted { .. } if !state.can_submit() => Transition::stay(next),

        Event::Submitted {
            fields,
            stored_token,
        } => match state.step {
            Step::Email => submit_email(next, fields),
            Step::Otp => submit_otp(next, fields),
            Step::Comment => submit_comment(next, fields, stored_token),
        },

        Event::OtpRequested(result) => {
            next.in_flight = false;
            match result {
                Ok(()) => {
                    next.step = Step::Otp;
                    next.message = Some(Message::info(MSG_OTP_SENT));
                }
                Err(_) => {
                    next.message = Some(Message::error(MSG_OTP_REQUEST_FAILED));
                }
            }
            Transition::stay(next)
        }

        // The form stays busy until the scheduled step change lands.
        Event::OtpVerified(result) => {
            match result {
                Ok(Some(token)) if !token.is_empty() => {
                    next.jwt = Some(token.clone());
                    next.message = Some(Message::info(MSG_OTP_VERIFIED));
                    Transition {
                        next,
                        commands: vec![
                            Command::StoreToken(token),
                            Command::Schedule {
                                after: Delay::StepChange,
                                event: Event::DelayElapsed(Step::Comment),
                            },
                        ],
                    }
                }
                outcome => {
                    let text = match outcome {
                        Err(Failure::Rejected { .. }) => MSG_OTP_REJECTED,
                        Err(Failure::Transport(_)) => MSG_OTP_ERROR,
                        Ok(_) => MSG_OTP_NO_TOKEN,
                    };
                    next.jwt = None;
                    next.message = Some(Message::error(text));
                    Transition {
                        next,
                        commands: vec![
                            Command::ClearToken,
                            Command::Schedule {
                                after: Delay::StepChange,
                                event: Event::DelayElapsed(Step::Otp),
                            },
                        ],
                    }
                }
            }
        }

        Event::PostIdResolved(Ok(id)) => {
            next.numeric_post_id = Some(id);
            match next.pending.take() {
                Some(pending) => Transition {
                    next,
                    commands: vec![Command::SubmitComment {
                        token: pending.token,
                        post_id: id,
                        author_name: pending.author_name,
                        content: pending.content,
                    }],
                },
                None => Transition::stay(next),
            }
        }

        Event::PostIdResolved(Err(_)) => {
            if next.pending.take().is_some() {
                next.in_flight = false;
            }
            next.message = Some(Message::error(MSG_INIT_FAILED));
            Transition::stay(next)
        }

        Event::CommentPosted(result) => {
            next.in_flight = false;
            match result {
                Ok(()) => {
                    next.message = Some(Message::info(MSG_COMMENT_SENT));
                    next.submit_disabled = true;
                    let name = next.author_name.clone();
                    Transition {
                        next,
                        commands: vec![Command::StoreAuthorName(name), Command::ScheduleReload],
                    }
                }
                Err(failure) => {
                    let text = match failure {
                        Failure::Rejected { body, .. } => {
                            format!("No se pudo enviar el comentario. {body}")
                        }
                        Failure::Transport(_) => MSG_COMMENT_ERROR.to_string(),
                    };
                    next.message = Some(Message::error(text));
                    Transition::stay(next)
                }
            }
        }

        Event::DelayElapsed(step) => {
            next.step = step;
            next.in_flight = false;
            Transition::stay(next)
        }
    }
}

fn submit_email(mut next: CommentSession, fields: FormFields) -> Transition {
    let email = fields.email.trim();
    if email.is_empty() {
        next.message = Some(Message::error(MSG_EMPTY_EMAIL));
        return Transition::stay(next);
    }

    next.user_email = email.to_string();
    next.in_flight = true;
    next.message = None;
    Transition {
        commands: vec![Command::RequestOtp {
            email: next.user_email.clone(),
        }],
        next,
    }
}

fn submit_otp(mut next: CommentSession, fields: FormFields) -> Transition {
    let code = fields.otp.trim();
    if code.is_empty() {
        next.message = Some(Message::error(MSG_EMPTY_OTP));
        return Transition::stay(next);
    }

    next.otp = code.to_string();
    next.in_flight = true;
    next.message = None;
    Transition {
        commands: vec![Command::VerifyOtp {
            email: next.user_email.clone(),
            code: next.otp.clone(),
        }],
        next,
    }
}

fn submit_comment(
    mut next: CommentSession,
    fields: FormFields,
    stored_token: Option<String>,
) -> Transition {
    let name = fields.name.trim();
    let content = fields.content.trim();
    if name.is_empty() || content.is_empty() {
        next.message = Some(Message::error(MSG_EMPTY_FIELDS));
        return Transition::stay(next);
    }

    let Some(token) = next
        .jwt
        .clone()
        .or(stored_token)
        .filter(|t| !t.is_empty())
    else {
        next.message = Some(Message::error(MSG_NO_TOKEN));
        return Transition::stay(next);
    };

    next.author_name = name.to_string();
    next.in_flight = true;
    next.message = None;

    let command = match next.numeric_post_id {
        Some(post_id) => Command::SubmitComment {
            token,
            post_id,
            author_name: name.to_string(),
            content: content.to_string(),
        },
        None => {
            next.pending = Some(PendingComment {
                token,
                author_name: name.to_string(),
                content: content.to_string(),
            });
            Command::ResolvePostId {
                post_id: next.post_id.clone(),
            }
        }
    };

    Transition {
        next,
        commands: vec![command],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted(fields: FormFields) -> Event {
        Event::Submitted {
            fields,
            stored_token: None,
        }
    }

    fn at_step(step: Step) -> CommentSession {
        CommentSession {
            step,
            numeric_post_id: Some(7),
            user_email: "a@b.com".into(),
            ..CommentSession::new("7")
        }
    }

    #[test]
    fn test_attach() {
        let t = transition(
            &CommentSession::new("42"),
            Event::Attached {
                stored_token: None,
                stored_author: Some("Ana".into()),
            },
        );
        assert_eq!(t.next.step, Step::Email);
        assert_eq!(t.next.numeric_post_id, Some(42));
        assert_eq!(t.next.author_name, "Ana");
        assert!(t.commands.is_empty());

        let t = transition(
            &CommentSession::new("3f2a-uuid"),
            Event::Attached {
                stored_token: Some("tok".into()),
                stored_author: None,
            },
        );
        assert_eq!(t.next.step, Step::Comment);
        assert_eq!(t.next.jwt.as_deref(), Some("tok"));
        assert_eq!(
            t.commands,
            vec![Command::ResolvePostId {
                post_id: "3f2a-uuid".into()
            }]
        );
    }

    #[test]
    fn test_empty_email_stays_without_request() {
        let t = transition(&CommentSession::new("1"), submitted(FormFields::email("   ")));
        assert_eq!(t.next.step, Step::Email);
        assert!(!t.next.in_flight);
        assert!(t.commands.is_empty());
        assert_eq!(t.next.message, Some(Message::error(MSG_EMPTY_EMAIL)));
    }

    #[test]
    fn test_request_otp() {
        let t = transition(&CommentSession::new("1"), submitted(FormFields::email(" a@b.com ")));
        assert!(t.next.in_flight);
        assert_eq!(
            t.commands,
            vec![Command::RequestOtp {
                email: "a@b.com".into()
            }]
        );

        let failed = transition(
            &t.next,
            Event::OtpRequested(Err(Failure::Transport("refused".into()))),
        );
        assert_eq!(failed.next.step, Step::Email);
        assert!(!failed.next.in_flight);
        assert_eq!(failed.next.message, Some(Message::error(MSG_OTP_REQUEST_FAILED)));

        let ok = transition(&t.next, Event::OtpRequested(Ok(())));
        assert_eq!(ok.next.step, Step::Otp);
    }

    #[test]
    fn test_verified_without_token_reverts_and_clears() {
        let mut state = at_step(Step::Otp);
        state.jwt = Some("stale".into());
        let t = transition(&state, submitted(FormFields::otp("123456")));
        assert_eq!(
            t.commands,
            vec![Command::VerifyOtp {
                email: "a@b.com".into(),
                code: "123456".into()
            }]
        );

        let t = transition(&t.next, Event::OtpVerified(Ok(None)));
        assert_eq!(t.next.jwt, None);
        assert!(!t.next.can_submit());
        assert_eq!(t.next.message, Some(Message::error(MSG_OTP_NO_TOKEN)));
        assert_eq!(
            t.commands,
            vec![
                Command::ClearToken,
                Command::Schedule {
                    after: Delay::StepChange,
                    event: Event::DelayElapsed(Step::Otp)
                }
            ]
        );

        let rejected = transition(
            &state,
            Event::OtpVerified(Err(Failure::Rejected {
                status: 401,
                body: String::new(),
            })),
        );
        assert_eq!(rejected.next.message, Some(Message::error(MSG_OTP_REJECTED)));
        assert_eq!(rejected.commands[0], Command::ClearToken);
    }

    #[test]
    fn test_verified_token_stores_and_advances_after_delay() {
        let mut state = at_step(Step::Otp);
        state.in_flight = true;
        let t = transition(&state, Event::OtpVerified(Ok(Some("tok-1".into()))));
        assert_eq!(t.next.step, Step::Otp);
        assert_eq!(t.next.jwt.as_deref(), Some("tok-1"));
        assert_eq!(t.commands[0], Command::StoreToken("tok-1".into()));

        // Still busy while the step change is pending
        assert!(!t.next.can_submit());
        let resubmit = transition(&t.next, submitted(FormFields::otp("123456")));
        assert!(resubmit.commands.is_empty());

        let t = transition(&t.next, Event::DelayElapsed(Step::Comment));
        assert_eq!(t.next.step, Step::Comment);
        assert!(t.next.can_submit());
    }

    #[test]
    fn test_comment_requires_fields_and_token() {
        let state = at_step(Step::Comment);

        let t = transition(&state, submitted(FormFields::comment("Ana", " ")));
        assert_eq!(t.next.message, Some(Message::error(MSG_EMPTY_FIELDS)));
        assert!(t.commands.is_empty());

        let t = transition(&state, submitted(FormFields::comment("Ana", "Hola")));
        assert_eq!(t.next.message, Some(Message::error(MSG_NO_TOKEN)));
        assert!(t.commands.is_empty());
        assert!(!t.next.in_flight);

        // A token from the durable store is enough
        let t = transition(
            &state,
            Event::Submitted {
                fields: FormFields::comment("Ana", "Hola"),
                stored_token: Some("tok".into()),
            },
        );
        assert_eq!(
            t.commands,
            vec![Command::SubmitComment {
                token: "tok".into(),
                post_id: 7,
                author_name: "Ana".into(),
                content: "Hola".into()
            }]
        );
    }

    #[test]
    fn test_comment_waits_for_post_id() {
        let mut state = at_step(Step::Comment);
        state.numeric_post_id = None;
        state.post_id = "uuid-1".into();
        state.jwt = Some("tok".into());

        let t = transition(&state, submitted(FormFields::comment("Ana", "Hola")));
        assert_eq!(
            t.commands,
            vec![Command::ResolvePostId {
                post_id: "uuid-1".into()
            }]
        );
        assert!(t.next.pending.is_some());

        let failed = transition(
            &t.next,
            Event::PostIdResolved(Err(Failure::Transport("down".into()))),
        );
        assert!(failed.commands.is_empty());
        assert!(!failed.next.in_flight);
        assert_eq!(failed.next.message, Some(Message::error(MSG_INIT_FAILED)));

        let resolved = transition(&t.next, Event::PostIdResolved(Ok(9)));
        assert_eq!(resolved.next.numeric_post_id, Some(9));
        assert!(matches!(
            resolved.commands.as_slice(),
            [Command::SubmitComment { post_id: 9, .. }]
        ));
    }

    #[test]
    fn test_comment_posted() {
        let mut state = at_step(Step::Comment);
        state.author_name = "Ana".into();
        state.in_flight = true;

        let t = transition(&state, Event::CommentPosted(Ok(())));
        assert!(t.next.submit_disabled);
        assert!(!t.next.can_submit());
        assert_eq!(
            t.commands,
            vec![Command::StoreAuthorName("Ana".into()), Command::ScheduleReload]
        );

        let t = transition(
            &state,
            Event::CommentPosted(Err(Failure::Rejected {
                status: 400,
                body: "Contenido inválido".into(),
            })),
        );
        assert_eq!(
            t.next.message,
            Some(Message::error("No se pudo enviar el comentario. Contenido inválido"))
        );
        assert!(t.next.can_submit());
    }

    #[test]
    fn test_submissions_ignored_while_in_flight() {
        let mut state = CommentSession::new("1");
        state.in_flight = true;
        let t = transition(&state, submitted(FormFields::email("a@b.com")));
        assert_eq!(t.next, state);
        assert!(t.commands.is_empty());
    }

    #[test]
    fn test_parse_numeric_id() {
        assert_eq!(parse_numeric_id("42"), Some(42));
        assert_eq!(parse_numeric_id(""), None);
        assert_eq!(parse_numeric_id("-1"), None);
        assert_eq!(parse_numeric_id("7f0c2c9e-0000"), None);
    }
}
