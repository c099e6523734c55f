use crate::chat::{classify_author, last_message, Author, AuthorHeuristic};
use crate::config::Settings;
use crate::responder::ResponseGenerator;
use crate::surface::{ChatSurface, SurfaceError};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Already scanning")]
    AlreadyRunning,
    #[error("Cannot start: completion API not initialized and fallback mode disabled")]
    NoResponder,
    #[error("Error capturing chat text")]
    CaptureError(#[source] SurfaceError),
    #[error("Error sending reply")]
    SendError(#[source] SurfaceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub persona_name: String,
    pub author_heuristic: AuthorHeuristic,
    pub check_interval: Duration,
    pub inactivity_timeout: Duration,
    pub error_backoff: Duration,
    pub stop_join_timeout: Duration,
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            persona_name: settings.persona_name.clone(),
            author_heuristic: settings.author_heuristic,
            check_interval: Duration::from_secs(settings.check_interval),
            inactivity_timeout: Duration::from_secs(settings.inactivity_timeout),
            error_backoff: Duration::from_secs(settings.error_backoff),
            stop_join_timeout: Duration::from_secs(settings.stop_join_timeout),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The messaging app could not be brought up.
    OpenFailed,
    /// No new message for longer than the inactivity timeout.
    Inactive,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub end: SessionEnd,
    pub replies: Vec<String>,
    /// Last transcript line the loop has dealt with.
    pub last_processed: String,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tick {
    EmptyCapture,
    Unchanged,
    OwnMessage,
    Replied,
    Cancelled,
}

/// One polling run over a chat surface.
pub struct Session {
    surface: Arc<dyn ChatSurface>,
    generator: Arc<ResponseGenerator>,
    config: SessionConfig,
    cancel: CancellationToken,
    last_processed: String,
    last_activity: Instant,
    replies: Vec<String>,
    started_at: DateTime<Local>,
}

impl Session {
    pub fn new(
        surface: Arc<dyn ChatSurface>,
        generator: Arc<ResponseGenerator>,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            surface,
            generator,
            config,
            cancel,
            last_processed: String::new(),
            last_activity: Instant::now(),
            replies: Vec::new(),
            started_at: Local::now(),
        }
    }

    pub async fn run(mut self) -> SessionReport {
        if let Err(e) = self.surface.open_app().await {
            error!(error = %e, "could not open messaging app, ending session");
            return self.finish(SessionEnd::OpenFailed);
        }

        let initial = self.capture().await.unwrap_or_else(|e| {
            warn!(error = %e, "initial capture failed");
            String::new()
        });
        self.last_processed = last_message(&initial).to_string();
        self.last_activity = Instant::now();
        info!(last_message = %self.last_processed, "starting scan");

        loop {
            if self.cancel.is_cancelled() {
                return self.finish(SessionEnd::Stopped);
            }
            let delay = match self.tick().await {
                Ok(Tick::Cancelled) => return self.finish(SessionEnd::Stopped),
                Ok(tick) => {
                    debug!(?tick, "tick finished");
                    self.config.check_interval
                }
                Err(e) => {
                    error!(error = %e, source = ?std::error::Error::source(&e), "error in scan loop");
                    self.config.error_backoff
                }
            };
            if self.last_activity.elapsed() > self.config.inactivity_timeout {
                info!("no activity for a while, stopping scan");
                return self.finish(SessionEnd::Inactive);
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return self.finish(SessionEnd::Stopped),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn capture(&self) -> Result<String, SessionError> {
        self.surface
            .capture_chat()
            .await
            .map_err(SessionError::CaptureError)
    }

    async fn tick(&mut self) -> Result<Tick, SessionError> {
        let chat_text = self.capture().await?;
        if chat_text.is_empty() {
            return Ok(Tick::EmptyCapture);
        }
        let last_line = last_message(&chat_text);
        if last_line.is_empty() || last_line == self.last_processed {
            return Ok(Tick::Unchanged);
        }
        let author = classify_author(last_line, &self.config.persona_name, self.config.author_heuristic);
        if author == Author::Persona {
            self.last_processed = last_line.to_string();
            return Ok(Tick::OwnMessage);
        }

        info!(message = %last_line, "new message from other person");
        self.last_activity = Instant::now();
        let answered = last_line.to_string();
        let reply = self.generator.generate_with_cancel(&chat_text, &self.cancel).await;
        if self.cancel.is_cancelled() {
            return Ok(Tick::Cancelled);
        }

        let sent = self.surface.send_reply(&reply.text).await;
        if sent.is_ok() {
            info!(reply = %reply.text, "sent reply");
            self.replies.push(reply.text);
        }
        // re-read after sending so our own reply is not mistaken for news
        self.last_processed = match self.capture().await {
            Ok(text) if !last_message(&text).is_empty() => last_message(&text).to_string(),
            Ok(_) => answered,
            Err(e) => {
                warn!(error = %e, "could not refresh chat after replying");
                answered
            }
        };
        sent.map_err(SessionError::SendError)?;
        Ok(Tick::Replied)
    }

    fn finish(self, end: SessionEnd) -> SessionReport {
        info!(?end, replies = self.replies.len(), "scan loop ended");
        SessionReport {
            end,
            replies: self.replies,
            last_processed: self.last_processed,
            started_at: self.started_at,
            ended_at: Local::now(),
        }
    }
}

/// Owns at most one background session.
pub struct SessionController {
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<SessionReport>>,
    /// A stopped session that outlived the join timeout.
    detached: Option<JoinHandle<SessionReport>>,
    stop_join_timeout: Duration,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    pub fn new() -> Self {
        Self {
            cancel: None,
            handle: None,
            detached: None,
            stop_join_timeout: Duration::from_secs(3),
        }
    }

    pub fn state(&self) -> SessionState {
        let alive = |handle: &Option<JoinHandle<SessionReport>>| {
            handle.as_ref().is_some_and(|h| !h.is_finished())
        };
        if alive(&self.handle) {
            SessionState::Running
        } else if alive(&self.detached) {
            SessionState::Stopping
        } else {
            SessionState::Idle
        }
    }

    pub fn start(
        &mut self,
        surface: Arc<dyn ChatSurface>,
        generator: Arc<ResponseGenerator>,
        config: SessionConfig,
    ) -> Result<(), SessionError> {
        if self.state() != SessionState::Idle {
            warn!("already scanning");
            return Err(SessionError::AlreadyRunning);
        }
        if !generator.can_reply() {
            error!("completion API not initialized and fallback mode disabled");
            return Err(SessionError::NoResponder);
        }
        let cancel = CancellationToken::new();
        self.stop_join_timeout = config.stop_join_timeout;
        let session = Session::new(surface, generator, config, cancel.clone());
        self.handle = Some(tokio::spawn(session.run()));
        self.cancel = Some(cancel);
        self.detached = None;
        info!("started scanning for messages");
        Ok(())
    }

    /// Signals the session to stop and waits up to the join timeout for it.
    /// A session that does not exit in time is left to finish on its own.
    pub async fn stop(&mut self) -> Option<SessionReport> {
        let Some(mut handle) = self.handle.take() else {
            info!("not currently scanning");
            return None;
        };
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        let report = match tokio::time::timeout(self.stop_join_timeout, &mut handle).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                error!(error = %e, "session task failed");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.stop_join_timeout, "session did not stop in time, detaching it");
                self.detached = Some(handle);
                None
            }
        };
        info!("stopped scanning");
        report
    }

    /// Waits for the current session to end by itself. Dropping the future
    /// early leaves the session in place, so `stop` still reaches it.
    pub async fn wait(&mut self) -> Option<SessionReport> {
        let result = self.handle.as_mut()?.await;
        self.handle = None;
        self.cancel = None;
        match result {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "session task failed");
                None
            }
        }
    }

    /// Collects the report of a session that already ended on its own.
    pub async fn take_finished(&mut self) -> Option<SessionReport> {
        if self.handle.as_ref().is_some_and(|h| h.is_finished()) {
            return self.wait().await;
        }
        None
    }
}
