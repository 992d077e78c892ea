use std::path::PathBuf;

use chatbot_core::{
    ChatMessage, ChatSession, Config, ConfigError, GenerationSettings, SessionSnapshot, SubmitError,
    Theme, TurnOutcome,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
pub const MAX_TOKENS_RANGE: (u32, u32) = (1, 8192);
pub const TOP_P_RANGE: (f32, f32) = (0.0, 1.0);
const MAX_TOKENS_STEP: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsField {
    #[default]
    Model,
    Temperature,
    MaxTokens,
    TopP,
}

impl SettingsField {
    pub const ALL: [SettingsField; 4] = [
        SettingsField::Model,
        SettingsField::Temperature,
        SettingsField::MaxTokens,
        SettingsField::TopP,
    ];

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(i + 1).min(Self::ALL.len() - 1)]
    }

    pub fn prev(self) -> Self {
        let i = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[i.saturating_sub(1)]
    }
}

/// Step a 0.1-granular slider, keeping one decimal place.
fn step_tenths(value: f32, delta: i32, (min, max): (f32, f32)) -> f32 {
    let stepped = ((value * 10.0).round() + delta as f32) / 10.0;
    stepped.clamp(min, max)
}

fn step_tokens(value: u32, delta: i32) -> u32 {
    let (min, max) = MAX_TOKENS_RANGE;
    let stepped = value as i64 + delta as i64 * MAX_TOKENS_STEP as i64;
    stepped.clamp(min as i64, max as i64) as u32
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Window state
    pub chat_open: bool,
    pub settings_open: bool,
    pub settings_field: SettingsField,
    pub theme: Theme,
    pub heading: String,

    // Input box
    pub input: String,
    pub input_cursor: usize, // cursor position in chars

    // Chat area
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_max_scroll: u16, // set by the renderer from the wrapped transcript
    pub follow_tail: bool,
    pub selected_message: Option<usize>,
    pub reveal_selected: bool,
    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub status: Option<String>,

    // Session
    pub session: ChatSession,
    pub updates: watch::Receiver<SessionSnapshot>,
    pub snapshot: SessionSnapshot,
    pub turn_task: Option<JoinHandle<Result<TurnOutcome, SubmitError>>>,

    // Settings
    pub endpoint: String,
    pub models: Vec<String>,
    pub settings: GenerationSettings,
    /// File the config was read from; preferences are written back here.
    pub config_path: PathBuf,
}

impl App {
    pub fn new(config: Config, config_path: PathBuf, session: ChatSession) -> Self {
        let updates = session.subscribe();
        let snapshot = session.snapshot();
        let mut models = config.models.clone();
        let settings = config.initial_settings();
        if !models.contains(&settings.model) {
            models.insert(0, settings.model.clone());
        }

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            chat_open: true,
            settings_open: false,
            settings_field: SettingsField::default(),
            theme: config.theme,
            heading: config.heading.clone(),

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_max_scroll: 0,
            follow_tail: true,
            selected_message: None,
            reveal_selected: false,
            animation_frame: 0,
            status: None,

            session,
            updates,
            snapshot,
            turn_task: None,

            endpoint: config.endpoint,
            models,
            settings,
            config_path,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.loading || self.turn_task.is_some()
    }

    /// Pull the latest published snapshot into the view state.
    pub fn sync_snapshot(&mut self) {
        self.snapshot = self.updates.borrow_and_update().clone();
    }

    pub fn submit_input(&mut self) {
        if self.input.trim().is_empty() {
            return;
        }
        if self.is_loading() {
            self.status = Some("Still answering, please wait".to_string());
            return;
        }
        if self.endpoint.trim().is_empty() {
            self.status = Some("No endpoint configured: pass --endpoint or set CHATBOT_ENDPOINT".to_string());
            return;
        }

        let text = std::mem::take(&mut self.input);
        self.input_cursor = 0;
        self.status = None;
        self.clear_selection();
        self.follow_tail = true;

        let session = self.session.clone();
        let settings = self.settings.clone();
        let endpoint = self.endpoint.clone();
        self.turn_task = Some(tokio::spawn(async move {
            session.submit(&text, &settings, &endpoint).await
        }));
    }

    /// Reap a finished turn and surface how it went.
    pub async fn poll_turn(&mut self) {
        let finished = self.turn_task.as_ref().is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }
        let Some(task) = self.turn_task.take() else {
            return;
        };

        match task.await {
            Ok(Ok(TurnOutcome::Completed { sentinel })) => {
                tracing::debug!(sentinel, "turn completed");
            }
            Ok(Ok(TurnOutcome::Failed(e))) => {
                self.status = Some(format!("Request failed: {}", e));
            }
            Ok(Ok(TurnOutcome::Cancelled)) => {}
            Ok(Err(e)) => {
                self.status = Some(e.to_string());
            }
            Err(e) => {
                tracing::error!(error = %e, "turn task panicked");
                self.status = Some("Request task crashed".to_string());
            }
        }
    }

    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn toggle_chat(&mut self) {
        self.chat_open = !self.chat_open;
        if !self.chat_open {
            self.input_mode = InputMode::Normal;
        }
    }

    pub fn toggle_settings(&mut self) {
        self.settings_open = !self.settings_open;
        if !self.settings_open {
            self.persist_settings();
        }
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        let theme = self.theme;
        self.save_config(|stored| stored.theme = theme);
    }

    pub fn adjust_setting(&mut self, delta: i32) {
        match self.settings_field {
            SettingsField::Model => {
                if self.models.is_empty() {
                    return;
                }
                let len = self.models.len() as i32;
                let current = self
                    .models
                    .iter()
                    .position(|m| *m == self.settings.model)
                    .unwrap_or(0) as i32;
                let next = (current + delta).rem_euclid(len) as usize;
                self.settings.model = self.models[next].clone();
            }
            SettingsField::Temperature => {
                self.settings.temperature = step_tenths(self.settings.temperature, delta, TEMPERATURE_RANGE);
            }
            SettingsField::MaxTokens => {
                self.settings.max_tokens = step_tokens(self.settings.max_tokens, delta);
            }
            SettingsField::TopP => {
                self.settings.top_p = step_tenths(self.settings.top_p, delta, TOP_P_RANGE);
            }
        }
    }

    fn persist_settings(&mut self) {
        let settings = self.settings.clone();
        self.save_config(|stored| stored.remember_settings(&settings));
    }

    /// Write one preference change into the file the config came from.
    /// Command-line and environment overrides stay out of the file.
    fn save_config(&mut self, change: impl FnOnce(&mut Config)) {
        if let Err(e) = Config::update_file(&self.config_path, change) {
            self.report_save_error(e);
        }
    }

    fn report_save_error(&mut self, e: ConfigError) {
        tracing::warn!(error = %e, path = %self.config_path.display(), "could not save config");
        self.status = Some(format!("Could not save settings: {}", e));
    }

    /// Message `y` copies: the selected one, else the latest reply.
    pub fn copy_target(&self) -> Option<&ChatMessage> {
        let transcript = &self.snapshot.transcript;
        match self.selected_message {
            Some(i) => transcript.get(i),
            None => transcript.last_assistant(),
        }
    }

    pub fn copy_message(&mut self) {
        let Some(text) = self.copy_target().map(|m| m.content.clone()) else {
            self.status = Some("Nothing to copy yet".to_string());
            return;
        };

        self.status = Some(match crate::clipboard::copy_to_clipboard(&text) {
            Ok(()) => "Message copied to clipboard!".to_string(),
            Err(e) => format!("Copy failed: {}", e),
        });
    }

    pub fn select_prev_message(&mut self) {
        let count = self.snapshot.transcript.len();
        if count == 0 {
            return;
        }
        self.selected_message = Some(match self.selected_message {
            Some(i) => i.saturating_sub(1),
            None => count - 1,
        });
        self.follow_tail = false;
        self.reveal_selected = true;
    }

    pub fn select_next_message(&mut self) {
        let count = self.snapshot.transcript.len();
        let Some(i) = self.selected_message else {
            return;
        };
        self.selected_message = Some((i + 1).min(count.saturating_sub(1)));
        self.follow_tail = false;
        self.reveal_selected = true;
    }

    pub fn clear_selection(&mut self) {
        self.selected_message = None;
        self.reveal_selected = false;
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1).min(self.chat_max_scroll);
        // Reaching the bottom re-attaches to the streaming tail
        self.follow_tail = self.chat_scroll >= self.chat_max_scroll;
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
        self.follow_tail = false;
    }

    /// Keep the newest line in view; the renderer applies it with the real wrapped height.
    pub fn scroll_chat_to_bottom(&mut self) {
        self.follow_tail = true;
        self.chat_scroll = self.chat_max_scroll;
    }

    pub fn quit(&mut self) {
        self.session.close();
        if let Some(task) = self.turn_task.take() {
            task.abort();
        }
        self.should_quit = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_steps_by_tenths_and_clamps() {
        assert_eq!(step_tenths(1.0, 1, TEMPERATURE_RANGE), 1.1);
        assert_eq!(step_tenths(0.0, -1, TEMPERATURE_RANGE), 0.0);
        assert_eq!(step_tenths(1.95, 1, TEMPERATURE_RANGE), 2.0);
        assert_eq!(step_tenths(2.0, 1, TEMPERATURE_RANGE), 2.0);
    }

    #[test]
    fn top_p_clamps_to_unit_range() {
        assert_eq!(step_tenths(1.0, 1, TOP_P_RANGE), 1.0);
        assert_eq!(step_tenths(0.1, -1, TOP_P_RANGE), 0.0);
    }

    #[test]
    fn max_tokens_stays_within_bounds() {
        assert_eq!(step_tokens(4096, 1), 4224);
        assert_eq!(step_tokens(64, -1), 1);
        assert_eq!(step_tokens(8100, 1), 8192);
    }

    fn app_with(config: Config, path: PathBuf) -> App {
        App::new(config, path, ChatSession::http())
    }

    fn saved_config(endpoint: &str, dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("mine.json");
        Config {
            endpoint: endpoint.to_string(),
            ..Config::default()
        }
        .save_to(&path)
        .unwrap();
        path
    }

    #[test]
    fn theme_toggle_writes_to_the_loaded_file_without_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved_config("http://saved", &dir);

        let mut config = Config::load_from(&path).unwrap();
        config.endpoint = "http://one-off-cli-override".to_string();
        config.initial_model = "gpt-4o-mini".to_string();
        let mut app = app_with(config, path.clone());
        app.toggle_theme();

        let stored = Config::load_from(&path).unwrap();
        assert_eq!(stored.theme, Theme::Light);
        assert_eq!(stored.endpoint, "http://saved");
        assert_eq!(stored.initial_model, "gpt-4o");
        assert!(app.status.is_none());
    }

    #[test]
    fn closing_settings_panel_persists_only_generation_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved_config("http://saved", &dir);

        let mut config = Config::load_from(&path).unwrap();
        config.endpoint = "http://from-env".to_string();
        let mut app = app_with(config, path.clone());
        app.toggle_settings();
        app.settings_field = SettingsField::Temperature;
        app.adjust_setting(-5);
        app.toggle_settings();

        let stored = Config::load_from(&path).unwrap();
        assert_eq!(stored.initial_temperature, 0.5);
        assert_eq!(stored.endpoint, "http://saved");
        assert_eq!(stored.theme, Theme::Dark);
    }

    #[test]
    fn unreadable_config_file_is_reported_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut app = app_with(Config::default(), path.clone());
        app.toggle_theme();

        assert!(app.status.as_deref().is_some_and(|s| s.starts_with("Could not save settings")));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn selection_picks_which_message_is_copied() {
        let mut app = app_with(Config::default(), PathBuf::from("unused.json"));
        app.snapshot = SessionSnapshot {
            transcript: vec![
                ChatMessage::user("question"),
                ChatMessage::assistant("answer"),
            ]
            .into(),
            loading: false,
        };

        assert_eq!(app.copy_target().map(|m| m.content.as_str()), Some("answer"));

        app.select_prev_message();
        assert_eq!(app.selected_message, Some(1));
        app.select_prev_message();
        app.select_prev_message();
        assert_eq!(app.copy_target().map(|m| m.content.as_str()), Some("question"));
        assert!(!app.follow_tail);

        app.select_next_message();
        app.select_next_message();
        assert_eq!(app.selected_message, Some(1));

        app.clear_selection();
        assert_eq!(app.copy_target().map(|m| m.content.as_str()), Some("answer"));
    }

    #[test]
    fn scrolling_down_to_the_end_follows_the_tail_again() {
        let mut app = app_with(Config::default(), PathBuf::from("unused.json"));
        app.chat_max_scroll = 2;
        app.chat_scroll = 0;
        app.scroll_down();
        assert!(!app.follow_tail);
        app.scroll_down();
        app.scroll_down();
        assert_eq!(app.chat_scroll, 2);
        assert!(app.follow_tail);
    }

    #[test]
    fn settings_field_navigation_stops_at_ends() {
        assert_eq!(SettingsField::Model.prev(), SettingsField::Model);
        assert_eq!(SettingsField::Model.next(), SettingsField::Temperature);
        assert_eq!(SettingsField::TopP.next(), SettingsField::TopP);
    }
}
