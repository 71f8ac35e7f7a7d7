use crate::client::ClientError;

/// Results of background work, delivered to the UI loop
#[derive(Debug)]
pub enum AppEvent {
    /// The relay answered (or failed to answer) a prompt
    Reply(Result<String, ClientError>),

    /// The relay acknowledged a reset, or failed to
    ResetDone(Result<String, ClientError>),

    /// A finished utterance from the speech recognizer
    Transcript(String),

    /// The recognizer stopped; carries the failure, if any
    RecordingEnded(Option<String>),
}

/// Terminal input and timer events
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// Key press event
    Key(crossterm::event::KeyEvent),

    /// Paste event
    Paste(String),

    /// Terminal resize
    Resize(u16, u16),

    /// Periodic tick for timers and background results
    Tick,
}
