//! Drives the comment form from a terminal.
use comments::{CommentForm, CommentSession, FormFields, Step, SubmitOutcome};
use comments::{CommentApi, KeyValueStore};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub async fn run<A, S, R, W>(
    form: &CommentForm<A, S>,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    A: CommentApi,
    S: KeyValueStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    form.attach().await;
    show_message(&mut output, &form.session()).await?;

    loop {
        let session = form.session();
        let fields = match session.step {
            Step::Email => {
                let Some(email) = prompt(&mut lines, &mut output, "Email (no se mostrará)").await? else {
                    return Ok(());
                };
                FormFields::email(&email)
            }
            Step::Otp => {
                let Some(otp) = prompt(&mut lines, &mut output, "OTP").await? else {
                    return Ok(());
                };
                FormFields::otp(&otp)
            }
            Step::Comment => {
                let label = match session.author_name.as_str() {
                    "" => "Nombre".to_string(),
                    saved => format!("Nombre [{saved}]"),
                };
                let Some(mut name) = prompt(&mut lines, &mut output, &label).await? else {
                    return Ok(());
                };
                if name.trim().is_empty() {
                    name = session.author_name.clone();
                }
                let Some(content) = prompt(&mut lines, &mut output, "Comentario").await? else {
                    return Ok(());
                };
                FormFields::comment(&name, &content)
            }
        };

        let outcome = form.submit(fields).await;
        show_message(&mut output, &form.session()).await?;

        if let SubmitOutcome::Reload(after) = outcome {
            tracing::info!(after_ms = after.as_millis() as u64, "comment sent, reload scheduled");
            return Ok(());
        }
    }
}

async fn prompt<R, W>(
    lines: &mut tokio::io::Lines<R>,
    output: &mut W,
    label: &str,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(format!("{label}: ").as_bytes()).await?;
    output.flush().await?;
    lines.next_line().await
}

async fn show_message<W: AsyncWrite + Unpin>(
    output: &mut W,
    session: &CommentSession,
) -> std::io::Result<()> {
    if let Some(message) = &session.message {
        let prefix = if message.is_error { "error: " } else { "" };
        output
            .write_all(format!("{prefix}{}\n", message.text).as_bytes())
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use comments::{FormTimings, HttpCommentApi, MemoryStore, TOKEN_KEY};
    use serde_json::json;
    use shared::testutils::{CannedResponse, RecordedRequest, TestServer};

    #[tokio::test]
    async fn test_terminal_flow() {
        let server = TestServer::spawn(|req: &RecordedRequest| match req.path() {
            "/api/comments/verify-otp" => CannedResponse::json(200, json!({"token": "tok-1"})),
            _ => CannedResponse::json(200, json!({})),
        })
        .await;
        let form = CommentForm::new(
            HttpCommentApi::new(&server.url("/api")),
            MemoryStore::new(),
            "3",
        )
        .with_timings(FormTimings::immediate());

        let input: &[u8] = b"\na@b.com\n123456\nAna\nHola\n";
        let mut output = Vec::new();
        run(&form, input, &mut output).await.unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("error: Completa el campo de email."));
        assert!(output.contains("OTP validado. Ahora puedes comentar."));
        assert!(output.contains("¡Comentario enviado!"));
        assert_eq!(form.store().get(TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));
        assert_eq!(server.requests_to("/api/comments").len(), 1);
    }
}
