use crate::chat::{ChatState, Overlay, SettingsItem, Theme};
use crate::client::RelayClient;
use crate::clipboard::Clipboard;
use crate::events::AppEvent;
use crate::ui::conversation::composer::ConversationResult;
use crate::ui::conversation::{
    ConversationComposer, ConversationHistory, ParsedCommand, SlashCommand, ThinkingIndicator, get_help_text,
};
use crate::ui::dialogs::OverlayView;
use crate::ui::theme::Palette;
use crate::voice::{Recording, SpeechRecognizer};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Widget,
};
use std::time::Instant;
use tokio::sync::mpsc;

const PLACEHOLDER: &str = "Type your message here...";
const SCROLL_STEP: usize = 5;

fn unavailable_while_thinking(command: SlashCommand) -> String {
    format!("/{} is unavailable while Vision is thinking.", command.command())
}

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Manages the conversation flow and UI components
pub struct ConversationManager {
    chat: ChatState,
    history: ConversationHistory,
    composer: ConversationComposer,
    client: RelayClient,
    contact_url: Option<String>,
    recognizer: Box<dyn SpeechRecognizer>,
    recording: Option<Recording>,
    clipboard: Box<dyn Clipboard>,
    loading_since: Option<Instant>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    event_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl ConversationManager {
    pub fn new(
        client: RelayClient,
        theme: Theme,
        contact_url: Option<String>,
        recognizer: Box<dyn SpeechRecognizer>,
        clipboard: Box<dyn Clipboard>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut composer = ConversationComposer::new(PLACEHOLDER.to_string(), theme);
        composer.set_focus(true);

        Self {
            chat: ChatState::new(client.base_url(), theme),
            history: ConversationHistory::new(),
            composer,
            client,
            contact_url,
            recognizer,
            recording: None,
            clipboard,
            loading_since: None,
            event_tx,
            event_rx,
        }
    }

    pub fn chat(&self) -> &ChatState {
        &self.chat
    }

    #[cfg(test)]
    pub fn composer_content(&self) -> String {
        self.composer.get_content()
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return ConversationAction::Exit;
        }

        if self.chat.ui.has_overlay() {
            self.handle_overlay_key(key);
            return ConversationAction::None;
        }

        match key.code {
            KeyCode::F(2) => {
                self.chat.ui.toggle_settings();
                return ConversationAction::None;
            }
            KeyCode::Char('r') if ctrl => {
                self.toggle_mic();
                return ConversationAction::None;
            }
            KeyCode::Char('y') if ctrl => {
                self.copy_message(None);
                return ConversationAction::None;
            }
            KeyCode::PageUp => {
                self.history.scroll_up(SCROLL_STEP);
                return ConversationAction::None;
            }
            KeyCode::PageDown => {
                self.history.scroll_down(SCROLL_STEP);
                return ConversationAction::None;
            }
            _ => {}
        }

        match self.composer.handle_key(key) {
            ConversationResult::Submitted(input) => {
                self.handle_input(&input);
                ConversationAction::None
            }
            ConversationResult::Command(command) => self.handle_slash_command(command),
            ConversationResult::None => ConversationAction::None,
        }
    }

    /// Insert pasted text into the composer
    pub fn handle_paste(&mut self, text: &str) {
        if !self.chat.ui.has_overlay() {
            self.composer.paste(text);
        }
    }

    /// Send the composer text if the chat accepts it
    fn handle_input(&mut self, input: &str) {
        let prompt = match self.chat.begin_send(input) {
            Ok(prompt) => prompt,
            Err(rejection) => {
                tracing::debug!(?rejection, "send blocked");
                return;
            }
        };

        self.composer.clear();
        self.composer.set_busy(true);
        self.history.scroll_to_bottom();
        self.loading_since = Some(Instant::now());

        let client = self.client.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = client.send_prompt(&prompt).await;
            let _ = tx.send(AppEvent::Reply(result));
        });
    }

    /// Clear locally right away, then ask the relay to reset its session
    fn clear_chat(&mut self) {
        self.chat.clear();
        self.chat.ui.dismiss();
        self.history.scroll_to_bottom();

        let client = self.client.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = client.reset().await;
            let _ = tx.send(AppEvent::ResetDone(result));
        });
    }

    fn toggle_mic(&mut self) {
        if let Some(recording) = self.recording.take() {
            recording.stop();
            self.chat.ui.recording = false;
            return;
        }

        match self.recognizer.start(self.event_tx.clone()) {
            Ok(recording) => {
                self.recording = Some(recording);
                self.chat.ui.recording = true;
            }
            Err(err) => {
                tracing::warn!("voice input unavailable: {}", err);
                self.chat.ui.alert(err.to_string());
            }
        }
    }

    /// Copy message `number` (1-based), or the latest bot reply
    fn copy_message(&mut self, number: Option<usize>) {
        let message = match number {
            Some(n) => self.chat.message_at(n),
            None => self.chat.last_bot_message(),
        };
        let Some(content) = message.map(|m| m.content.clone()) else {
            self.chat.ui.alert("Nothing to copy.");
            return;
        };

        match self.clipboard.copy(&content) {
            Ok(()) => self.chat.ui.mark_copied(Instant::now()),
            Err(err) => {
                tracing::error!("Failed to copy text: {:#}", err);
                self.chat.ui.alert("Failed to copy text.");
            }
        }
    }

    fn set_theme(&mut self, theme: Theme) {
        self.chat.ui.theme = theme;
        self.composer.set_theme(theme);
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) {
        match self.chat.ui.overlay.clone() {
            Overlay::None => {}
            Overlay::Settings { .. } => match key.code {
                KeyCode::Up => self.chat.ui.move_selection(-1),
                KeyCode::Down | KeyCode::Tab => self.chat.ui.move_selection(1),
                KeyCode::Enter => match self.chat.ui.choose_setting(self.contact_url.as_deref()) {
                    Some(SettingsItem::ToggleTheme) => {
                        let theme = self.chat.ui.theme;
                        self.set_theme(theme);
                    }
                    Some(SettingsItem::ClearChat) if self.chat.is_loading() => {
                        self.chat.ui.alert(unavailable_while_thinking(SlashCommand::Clear));
                    }
                    _ => {}
                },
                KeyCode::Esc | KeyCode::F(2) => self.chat.ui.dismiss(),
                _ => {}
            },
            Overlay::ClearConfirm => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    if self.chat.is_loading() {
                        self.chat.ui.alert(unavailable_while_thinking(SlashCommand::Clear));
                    } else {
                        self.clear_chat();
                    }
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.chat.ui.dismiss(),
                _ => {}
            },
            Overlay::About | Overlay::Alert(_) => self.chat.ui.dismiss(),
        }
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        if self.chat.is_loading() && !command.command.available_while_loading() {
            self.chat.ui.alert(unavailable_while_thinking(command.command));
            return ConversationAction::None;
        }

        match command.command {
            SlashCommand::Clear => self.chat.ui.overlay = Overlay::ClearConfirm,
            SlashCommand::Theme => {
                let theme = self.chat.ui.theme.toggled();
                self.set_theme(theme);
            }
            SlashCommand::About => self.chat.ui.overlay = Overlay::About,
            SlashCommand::Settings => self.chat.ui.toggle_settings(),
            SlashCommand::Copy => {
                if command.argument().is_some() && command.copy_target().is_none() {
                    self.chat.ui.alert("Usage: /copy [message number]");
                } else {
                    self.copy_message(command.copy_target());
                }
            }
            SlashCommand::Mic => self.toggle_mic(),
            SlashCommand::Help => self.chat.ui.alert(get_help_text()),
            SlashCommand::Bye => return ConversationAction::Exit,
        }
        ConversationAction::None
    }

    /// Apply results delivered by background tasks (called from main loop)
    pub fn process_events(&mut self) {
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(mpsc::error::TryRecvError::Empty) | Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Reply(result) => {
                self.chat.finish_send(result);
                self.composer.set_busy(false);
                self.loading_since = None;
                self.history.scroll_to_bottom();
            }
            AppEvent::ResetDone(Ok(message)) => tracing::info!("{}", message),
            AppEvent::ResetDone(Err(err)) => tracing::error!("Failed to reset chat: {}", err),
            AppEvent::Transcript(text) => self.composer.append_transcript(&text),
            AppEvent::RecordingEnded(failure) => {
                self.recording = None;
                self.chat.ui.recording = false;
                if let Some(reason) = failure {
                    self.chat.ui.alert(reason);
                }
            }
        }
    }

    /// Render the conversation UI components
    pub fn render(&self, area: Rect, buf: &mut Buffer, now: Instant) {
        let palette = Palette::for_theme(self.chat.ui.theme);
        buf.set_style(area, palette.base());

        let input_lines = self.composer.get_content().split('\n').count() as u16;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),                          // Header
                Constraint::Min(5),                             // History area
                Constraint::Length(input_lines.clamp(1, 6) + 2), // Composer area
                Constraint::Length(1),                          // Footer
            ])
            .split(area);

        let header = Line::from(vec![
            Span::styled(" Vision AI ", palette.title()),
            Span::styled(
                " F2 settings  Ctrl+R mic  Ctrl+Y copy  PgUp/PgDn scroll  Ctrl+C quit",
                palette.muted(),
            ),
        ]);
        buf.set_line(chunks[0].x, chunks[0].y, &header, chunks[0].width);

        let thinking = self
            .loading_since
            .map(|since| ThinkingIndicator::new(palette, since, now).line());
        self.history
            .view(self.chat.messages(), palette, thinking)
            .render(chunks[1], buf);

        self.composer.clone().render(chunks[2], buf);

        let mut footer = vec![Span::styled(crate::prompts::DISCLAIMER, palette.muted())];
        if self.chat.ui.recording {
            footer.push(Span::styled("  ● Listening...", Style::default().fg(palette.warning)));
        }
        if self.chat.ui.is_copied(now) {
            footer.push(Span::styled("  Copied!", Style::default().fg(palette.accent)));
        }
        buf.set_line(chunks[3].x, chunks[3].y, &Line::from(footer), chunks[3].width);

        OverlayView::new(&self.chat.ui.overlay, self.chat.ui.theme).render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;
    use crate::llm::ChatBackend;
    use crate::prompts::{CLEARED_GREETING, GREETING};
    use crate::relay::{RelayState, router};
    use crate::session::SessionSettings;
    use crate::testing::{FailingBackend, FixedBackend, SlowBackend};
    use crate::voice::{CommandRecognizer, Unsupported};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct MemoryClipboard(Rc<RefCell<Vec<String>>>);

    impl Clipboard for MemoryClipboard {
        fn copy(&mut self, text: &str) -> anyhow::Result<()> {
            self.0.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    async fn spawn_relay(backend: Arc<dyn ChatBackend>) -> RelayClient {
        let settings = SessionSettings {
            model: "gemini-test".to_string(),
            system_instruction: String::new(),
        };
        let app = router(RelayState::new(backend, settings));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        RelayClient::new(&format!("http://{}", addr))
    }

    fn manager_with(client: RelayClient, recognizer: Box<dyn SpeechRecognizer>) -> ConversationManager {
        ConversationManager::new(client, Theme::Light, None, recognizer, Box::new(MemoryClipboard::default()))
    }

    fn press(manager: &mut ConversationManager, code: KeyCode) -> ConversationAction {
        manager.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(manager: &mut ConversationManager, c: char) -> ConversationAction {
        manager.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn type_text(manager: &mut ConversationManager, text: &str) {
        for c in text.chars() {
            press(manager, KeyCode::Char(c));
        }
    }

    async fn wait_until(manager: &mut ConversationManager, done: impl Fn(&ConversationManager) -> bool) {
        for _ in 0..300 {
            manager.process_events();
            if done(manager) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn contents(manager: &ConversationManager) -> Vec<(Role, String)> {
        manager
            .chat()
            .messages()
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn sending_appends_prompt_and_reply() {
        let mut manager = manager_with(spawn_relay(FixedBackend::new("Hi there!")).await, Box::new(Unsupported));

        type_text(&mut manager, "Hello");
        press(&mut manager, KeyCode::Enter);
        assert!(manager.chat().is_loading());
        assert_eq!(manager.composer_content(), "");

        wait_until(&mut manager, |m| !m.chat().is_loading()).await;

        assert_eq!(
            contents(&manager),
            vec![
                (Role::Bot, GREETING.to_string()),
                (Role::User, "Hello".to_string()),
                (Role::Bot, "Hi there!".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn relay_failure_becomes_apology() {
        let client = spawn_relay(Arc::new(FailingBackend("boom"))).await;
        let base_url = client.base_url().to_string();
        let mut manager = manager_with(client, Box::new(Unsupported));

        type_text(&mut manager, "Hello");
        press(&mut manager, KeyCode::Enter);
        wait_until(&mut manager, |m| !m.chat().is_loading()).await;

        let messages = contents(&manager);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].1, crate::prompts::apology(&base_url));
    }

    #[tokio::test]
    async fn over_limit_input_is_not_sent() {
        let backend = FixedBackend::new("unused");
        let mut manager = manager_with(spawn_relay(backend.clone()).await, Box::new(Unsupported));

        manager.handle_paste(&"x".repeat(crate::chat::MAX_INPUT_CHARS + 1));
        press(&mut manager, KeyCode::Enter);

        assert!(!manager.chat().is_loading());
        assert_eq!(manager.chat().messages().len(), 1);
        assert_eq!(manager.composer_content().chars().count(), crate::chat::MAX_INPUT_CHARS + 1);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn clear_asks_for_confirmation() {
        let mut manager = manager_with(spawn_relay(FixedBackend::new("ok")).await, Box::new(Unsupported));

        type_text(&mut manager, "/clear");
        press(&mut manager, KeyCode::Enter);
        assert_eq!(manager.chat().ui.overlay, Overlay::ClearConfirm);

        press(&mut manager, KeyCode::Char('n'));
        assert_eq!(manager.chat().ui.overlay, Overlay::None);
        assert_eq!(contents(&manager)[0].1, GREETING);

        type_text(&mut manager, "/clear");
        press(&mut manager, KeyCode::Enter);
        press(&mut manager, KeyCode::Char('y'));
        assert_eq!(contents(&manager), vec![(Role::Bot, CLEARED_GREETING.to_string())]);
        assert_eq!(manager.chat().ui.overlay, Overlay::None);
    }

    #[tokio::test]
    async fn clear_is_blocked_while_thinking_from_every_entry_point() {
        let mut manager = manager_with(spawn_relay(Arc::new(SlowBackend::default())).await, Box::new(Unsupported));
        let blocked = Overlay::Alert("/clear is unavailable while Vision is thinking.".to_string());

        type_text(&mut manager, "Hello");
        press(&mut manager, KeyCode::Enter);
        assert!(manager.chat().is_loading());

        type_text(&mut manager, "/clear");
        press(&mut manager, KeyCode::Enter);
        assert_eq!(manager.chat().ui.overlay, blocked);
        press(&mut manager, KeyCode::Esc);

        press(&mut manager, KeyCode::F(2));
        press(&mut manager, KeyCode::Enter);
        assert_eq!(manager.chat().ui.overlay, blocked);
        assert_eq!(manager.chat().messages().len(), 2);
        press(&mut manager, KeyCode::Esc);

        wait_until(&mut manager, |m| !m.chat().is_loading()).await;
        press(&mut manager, KeyCode::F(2));
        press(&mut manager, KeyCode::Enter);
        assert_eq!(manager.chat().ui.overlay, Overlay::ClearConfirm);
        press(&mut manager, KeyCode::Char('y'));
        assert_eq!(contents(&manager), vec![(Role::Bot, CLEARED_GREETING.to_string())]);
    }

    #[tokio::test]
    async fn settings_toggle_theme() {
        let mut manager = manager_with(spawn_relay(FixedBackend::new("ok")).await, Box::new(Unsupported));

        press(&mut manager, KeyCode::F(2));
        press(&mut manager, KeyCode::Down);
        press(&mut manager, KeyCode::Enter);

        assert_eq!(manager.chat().ui.theme, Theme::Dark);
        assert_eq!(manager.chat().ui.overlay, Overlay::None);
    }

    #[tokio::test]
    async fn mic_without_recognizer_alerts() {
        let mut manager = manager_with(spawn_relay(FixedBackend::new("ok")).await, Box::new(Unsupported));

        ctrl(&mut manager, 'r');

        assert_eq!(
            manager.chat().ui.overlay,
            Overlay::Alert("Speech Recognition not supported".to_string())
        );
        assert!(!manager.chat().ui.recording);
    }

    #[tokio::test]
    async fn transcripts_fill_the_composer() {
        let recognizer = CommandRecognizer::new("sh", vec!["-c".to_string(), "echo hello; echo world".to_string()]);
        let mut manager = manager_with(spawn_relay(FixedBackend::new("ok")).await, Box::new(recognizer));

        type_text(&mut manager, "Say");
        ctrl(&mut manager, 'r');
        assert!(manager.chat().ui.recording);

        wait_until(&mut manager, |m| !m.chat().ui.recording).await;
        assert_eq!(manager.composer_content(), "Say hello world");
    }

    #[tokio::test]
    async fn recognizer_failure_is_shown() {
        let recognizer = CommandRecognizer::new("sh", vec!["-c".to_string(), "exit 3".to_string()]);
        let mut manager = manager_with(spawn_relay(FixedBackend::new("ok")).await, Box::new(recognizer));

        ctrl(&mut manager, 'r');
        wait_until(&mut manager, |m| !m.chat().ui.recording).await;

        match &manager.chat().ui.overlay {
            Overlay::Alert(reason) => assert!(reason.contains("exited with"), "{}", reason),
            other => panic!("expected an alert, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn copy_uses_last_bot_reply() {
        let clipboard = MemoryClipboard::default();
        let mut manager = ConversationManager::new(
            spawn_relay(FixedBackend::new("ok")).await,
            Theme::Light,
            None,
            Box::new(Unsupported),
            Box::new(clipboard.clone()),
        );

        ctrl(&mut manager, 'y');
        assert_eq!(*clipboard.0.borrow(), vec![GREETING.to_string()]);
        assert!(manager.chat().ui.is_copied(Instant::now()));

        type_text(&mut manager, "/copy 9");
        press(&mut manager, KeyCode::Enter);
        assert_eq!(manager.chat().ui.overlay, Overlay::Alert("Nothing to copy.".to_string()));
    }

    #[tokio::test]
    async fn quit_keys_exit() {
        let mut manager = manager_with(spawn_relay(FixedBackend::new("ok")).await, Box::new(Unsupported));
        assert_eq!(ctrl(&mut manager, 'c'), ConversationAction::Exit);

        type_text(&mut manager, "/bye");
        assert_eq!(press(&mut manager, KeyCode::Enter), ConversationAction::Exit);
    }
}
