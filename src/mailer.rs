use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{SmtpSecurity, SmtpSettings};
use crate::error::MailError;

pub const SENT: &str = "Email sent successfully!";
pub const MISSING_FIELDS: &str = "Please fill out all fields before sending the email.";
pub const NOT_CONFIGURED: &str = "Email sharing is not configured on this server.";

/// A file to send along with a share.
#[derive(Clone, Debug, PartialEq)]
pub enum Attachment {
    /// Content produced in memory, such as a CSV download.
    Bytes {
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
    /// A file read from disk when the message is built.
    Path(PathBuf),
}

impl Attachment {
    pub fn csv(file_name: &str, bytes: Vec<u8>) -> Self {
        Attachment::Bytes {
            file_name: file_name.to_string(),
            content_type: "text/csv".to_string(),
            bytes,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Attachment::Path(path.as_ref().to_path_buf())
    }

    fn resolve(&self) -> Result<(String, String, Vec<u8>), MailError> {
        match self {
            Attachment::Bytes {
                file_name,
                content_type,
                bytes,
            } => Ok((file_name.clone(), content_type.clone(), bytes.clone())),
            Attachment::Path(path) => {
                let bytes = std::fs::read(path).map_err(|source| MailError::Attachment {
                    path: path.display().to_string(),
                    source,
                })?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "attachment".to_string());
                Ok((file_name, "application/octet-stream".to_string(), bytes))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShareRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

impl ShareRequest {
    pub fn new(to: &str, subject: &str, body: &str) -> Self {
        ShareRequest {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_file(self, path: impl AsRef<Path>) -> Self {
        self.with_attachment(Attachment::from_path(path))
    }

    /// Recipient, subject and body are all non-blank.
    pub fn is_complete(&self) -> bool {
        [&self.to, &self.subject, &self.body]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

/// Hands a finished message to the mail system.
pub trait MailTransport {
    fn submit(&self, message: &Message) -> Result<(), MailError>;
}

impl MailTransport for SmtpTransport {
    fn submit(&self, message: &Message) -> Result<(), MailError> {
        self.send(message)
            .map(|_| ())
            .map_err(|e| MailError::Transport(e.to_string()))
    }
}

pub struct Mailer<T = SmtpTransport> {
    transport: T,
    from: Mailbox,
    attempts: u32,
    retry_delay: Duration,
}

impl Mailer<SmtpTransport> {
    /// Authenticated SMTP submission using externally supplied settings.
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let creds = Credentials::new(settings.username.clone(), settings.password.clone());

        let tls_parameters = TlsParameters::new(settings.host.clone())
            .map_err(|e| MailError::Transport(e.to_string()))?;
        let tls = match settings.security {
            SmtpSecurity::StartTls => Tls::Required(tls_parameters),
            SmtpSecurity::Wrapper => Tls::Wrapper(tls_parameters),
        };

        let smtp = SmtpTransport::relay(&settings.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .credentials(creds)
            .port(settings.port)
            .tls(tls)
            .build();

        Mailer::with_transport(smtp, &settings.from, settings.attempts)
    }
}

impl<T: MailTransport> Mailer<T> {
    pub fn with_transport(transport: T, from: &str, attempts: u32) -> Result<Self, MailError> {
        let from = from
            .parse::<Mailbox>()
            .map_err(|_| MailError::Address(from.to_string()))?;

        Ok(Mailer {
            transport,
            from,
            attempts: attempts.max(1),
            retry_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn build_message(&self, request: &ShareRequest) -> Result<Message, MailError> {
        let to = request
            .to
            .trim()
            .parse::<Mailbox>()
            .map_err(|_| MailError::Address(request.to.clone()))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(request.subject.clone());
        let text = SinglePart::plain(request.body.clone());

        let message = match &request.attachment {
            None => builder.singlepart(text),
            Some(attachment) => {
                let (file_name, content_type, bytes) = attachment.resolve()?;
                let content_type = ContentType::parse(&content_type)
                    .map_err(|e| MailError::Build(e.to_string()))?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(text)
                        .singlepart(MailAttachment::new(file_name).body(bytes, content_type)),
                )
            }
        };

        message.map_err(|e| MailError::Build(e.to_string()))
    }

    /// Build and submit, retrying only the submission step.
    pub fn send(&self, request: &ShareRequest) -> Result<(), MailError> {
        let message = self.build_message(request)?;

        let mut attempt = 1;
        loop {
            match self.transport.submit(&message) {
                Ok(()) => {
                    info!("shared dashboard data with {}", request.to);
                    return Ok(());
                }
                Err(e) if attempt < self.attempts => {
                    warn!("mail submission attempt {} failed: {}", attempt, e);
                    std::thread::sleep(self.retry_delay * attempt);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send and report the outcome as a user-facing message.
    ///
    /// Never fails: every error becomes text for the page.
    pub fn share(&self, request: &ShareRequest) -> Result<String, String> {
        if !request.is_complete() {
            return Err(MISSING_FIELDS.to_string());
        }
        self.send(request).map(|()| SENT.to_string()).map_err(|e| {
            warn!("sharing failed: {}", e);
            describe_failure(&e)
        })
    }
}

pub fn describe_failure(error: &MailError) -> String {
    match error {
        MailError::Attachment { source, .. } => {
            format!("An error occurred while attaching the file: {}", source)
        }
        other => format!("An error occurred: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl MailTransport for Flaky {
        fn submit(&self, _message: &Message) -> Result<(), MailError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(MailError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn mailer(failures: u32, attempts: u32) -> Mailer<Flaky> {
        let transport = Flaky {
            failures,
            calls: AtomicU32::new(0),
        };
        Mailer::with_transport(transport, "Reports <reports@example.com>", attempts)
            .unwrap()
            .with_retry_delay(Duration::ZERO)
    }

    fn request() -> ShareRequest {
        ShareRequest::new("boss@example.com", "Q3 numbers", "See attached.")
    }

    #[test]
    fn submission_is_retried_up_to_the_limit() {
        let m = mailer(2, 3);
        assert_eq!(m.share(&request()), Ok(SENT.to_string()));
        assert_eq!(m.transport.calls.load(Ordering::SeqCst), 3);

        let m = mailer(5, 3);
        let message = m.share(&request()).unwrap_err();
        assert!(message.starts_with("An error occurred: "), "{}", message);
        assert_eq!(m.transport.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn blank_fields_are_rejected_before_sending() {
        let m = mailer(0, 1);
        let mut incomplete = request();
        incomplete.subject = "  ".to_string();

        assert_eq!(m.share(&incomplete), Err(MISSING_FIELDS.to_string()));
        assert_eq!(m.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn attachments_are_included() {
        let m = mailer(0, 1);
        let req = request().with_attachment(Attachment::csv("Category.csv", b"Category,Sales\n".to_vec()));
        let formatted = String::from_utf8_lossy(&m.build_message(&req).unwrap().formatted()).into_owned();

        assert!(formatted.contains("Category.csv"));
        assert!(formatted.contains("text/csv"));
    }

    #[test]
    fn files_from_disk_are_attached_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "quarterly notes").unwrap();

        let m = mailer(0, 1);
        let req = request().with_file(&path);
        let formatted = String::from_utf8_lossy(&m.build_message(&req).unwrap().formatted()).into_owned();

        assert!(formatted.contains("notes.txt"), "{}", formatted);
        assert!(formatted.contains("application/octet-stream"));
        assert_eq!(m.share(&req), Ok(SENT.to_string()));
    }

    #[test]
    fn unreadable_attachment_is_reported() {
        let m = mailer(0, 1);
        let req = request().with_file("/definitely/not/here.csv");

        let message = m.share(&req).unwrap_err();
        assert!(message.starts_with("An error occurred while attaching the file"));
        assert_eq!(m.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn bad_recipient_is_an_error_not_a_panic() {
        let m = mailer(0, 1);
        let req = ShareRequest::new("not-an-address", "s", "b");
        assert!(matches!(m.build_message(&req), Err(MailError::Address(_))));
    }
}
