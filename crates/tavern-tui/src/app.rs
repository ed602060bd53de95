use std::collections::HashSet;

use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;

use tavern_core::{ChatTurn, Conversation, GenerationParameters, ParamKind, Settings};

use crate::client::{spawn_chat, ChatClient, StreamEvent};
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Navigating messages
    Normal,
    /// Typing a new message
    Input,
    /// Editing an existing message in place
    EditMessage,
    /// Parameter sliders open
    Params,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Chat state
    pub conversation: Conversation,
    pub input: String,
    pub input_cursor: usize, // cursor position in chars
    pub edit_cursor: usize,
    pub selected: Option<usize>,
    pub open_reasoning: HashSet<usize>,
    pub pending: bool,
    pub chat_task: Option<tokio::task::JoinHandle<()>>,
    pub status: Option<String>,

    // Scroll state (updated during render)
    pub scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16,
    pub chat_width: u16,
    pub total_lines: u16,
    pub message_offsets: Vec<u16>,

    // Parameter panel
    pub params: GenerationParameters,
    pub params_state: ListState,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub user_name: String,
    pub assistant_name: String,
    pub client: ChatClient,
}

impl App {
    pub fn new(settings: &Settings) -> Self {
        let mut params_state = ListState::default();
        params_state.select(Some(0));

        Self {
            should_quit: false,
            input_mode: InputMode::Input,
            conversation: Conversation::new(),
            input: String::new(),
            input_cursor: 0,
            edit_cursor: 0,
            selected: None,
            open_reasoning: HashSet::new(),
            pending: false,
            chat_task: None,
            status: None,
            scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            chat_width: 0,
            total_lines: 0,
            message_offsets: Vec::new(),
            params: GenerationParameters::default(),
            params_state,
            animation_frame: 0,
            user_name: settings.user_name.clone(),
            assistant_name: settings.assistant_name.clone(),
            client: ChatClient::new(&settings.server_url),
        }
    }

    pub fn can_submit(&self) -> bool {
        !self.pending && !self.input.trim().is_empty()
    }

    /// Append the typed message and start streaming the reply.
    pub fn submit(&mut self, tx: UnboundedSender<AppEvent>) -> bool {
        if !self.can_submit() {
            return false;
        }

        let content = std::mem::take(&mut self.input);
        self.input_cursor = 0;
        self.conversation.push(ChatTurn::user(content));
        self.pending = true;
        self.status = None;
        self.scroll_to_bottom();

        let turns = self.conversation.turns().to_vec();
        self.chat_task = Some(spawn_chat(
            self.client.clone(),
            turns,
            Some(self.params),
            tx,
        ));
        true
    }

    pub fn on_stream(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Chunk(text) => {
                self.conversation.append_assistant_text(&text);
            }
            StreamEvent::Finished => {
                self.finish_request();
                if let Some(last) = self.conversation.last() {
                    tracing::info!(chars = last.content.len(), "final message");
                }
                self.scroll_to_bottom();
            }
            StreamEvent::Failed(message) => {
                self.finish_request();
                self.status = Some(message);
            }
        }
    }

    /// Abandon the in-flight request; whatever streamed so far stays.
    pub fn cancel_request(&mut self) {
        if let Some(task) = self.chat_task.take() {
            task.abort();
            tracing::info!("request cancelled");
        }
        self.pending = false;
    }

    fn finish_request(&mut self) {
        self.pending = false;
        self.chat_task = None;
    }

    pub fn tick_animation(&mut self) {
        if self.pending {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Message selection

    pub fn select_next(&mut self) {
        let len = self.conversation.len();
        if len == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        });
        self.scroll_to_selected();
    }

    pub fn select_prev(&mut self) {
        let len = self.conversation.len();
        if len == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) => i.saturating_sub(1),
            None => len - 1,
        });
        self.scroll_to_selected();
    }

    fn scroll_to_selected(&mut self) {
        if let Some(offset) = self.selected.and_then(|i| self.message_offsets.get(i)) {
            self.scroll = *offset;
            self.follow_bottom = false;
        }
    }

    /// Only user and assistant messages are editable, and never mid-stream.
    fn can_modify(&mut self, index: usize) -> bool {
        if self.pending {
            self.status = Some("Wait for the reply to finish first".to_string());
            return false;
        }
        self.conversation
            .get(index)
            .is_some_and(|turn| turn.role.is_editable())
    }

    pub fn start_edit_selected(&mut self) {
        let Some(index) = self.selected else { return };
        if !self.can_modify(index) {
            return;
        }
        if self.conversation.start_edit(index) {
            self.edit_cursor = self
                .conversation
                .edit_buffer()
                .map(|b| b.chars().count())
                .unwrap_or(0);
            self.input_mode = InputMode::EditMessage;
        }
    }

    pub fn save_edit(&mut self) {
        self.conversation.save_edit();
        self.input_mode = InputMode::Normal;
    }

    pub fn cancel_edit(&mut self) {
        self.conversation.cancel_edit();
        self.input_mode = InputMode::Normal;
    }

    pub fn delete_selected(&mut self) {
        let Some(index) = self.selected else { return };
        if !self.can_modify(index) {
            return;
        }
        if self.conversation.delete(index).is_none() {
            return;
        }

        // Reasoning toggles follow their messages
        self.open_reasoning = self
            .open_reasoning
            .iter()
            .filter(|&&i| i != index)
            .map(|&i| if i > index { i - 1 } else { i })
            .collect();

        self.selected = if self.conversation.is_empty() {
            None
        } else {
            Some(index.min(self.conversation.len() - 1))
        };
    }

    pub fn toggle_reasoning_selected(&mut self) {
        if let Some(index) = self.selected {
            if !self.open_reasoning.remove(&index) {
                self.open_reasoning.insert(index);
            }
        }
    }

    // Scrolling

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.total_lines.saturating_sub(self.chat_height);
        self.scroll = (self.scroll + lines).min(max);
        self.follow_bottom = self.scroll >= max;
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    // Parameter panel

    pub fn toggle_params(&mut self) {
        self.input_mode = if self.input_mode == InputMode::Params {
            InputMode::Normal
        } else {
            InputMode::Params
        };
    }

    pub fn selected_param(&self) -> ParamKind {
        let kinds = ParamKind::all();
        let i = self.params_state.selected().unwrap_or(0).min(kinds.len() - 1);
        kinds[i]
    }

    pub fn params_nav_down(&mut self) {
        let i = self.params_state.selected().unwrap_or(0);
        self.params_state
            .select(Some((i + 1).min(ParamKind::all().len() - 1)));
    }

    pub fn params_nav_up(&mut self) {
        let i = self.params_state.selected().unwrap_or(0);
        self.params_state.select(Some(i.saturating_sub(1)));
    }

    pub fn adjust_param(&mut self, steps: i32) {
        let kind = self.selected_param();
        self.params.nudge(kind, steps);
    }
}
