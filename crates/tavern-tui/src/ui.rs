use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};
use tavern_core::{parse_content, ChatRole, ParamKind};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, InputMode};

const REASONING_LABEL: &str = "Whispered Thoughts";
const SLIDER_WIDTH: usize = 20;

/// Wrap text to fit within a given width (in terminal columns), returning
/// multiple lines. Breaks on word boundaries; a word wider than the whole
/// line is split across lines.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.width();

        if word_len > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current_line));
            }
            let mut pieces = split_to_width(word, width);
            // The last piece stays open so following words can join it
            let last = pieces.pop().unwrap_or_default();
            lines.extend(pieces);
            current_len = last.width();
            current_line = last;
        } else if current_len == 0 {
            current_line = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current_line.push(' ');
            current_line.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
            current_len = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Hard-break a single word into pieces no wider than `width` columns
fn split_to_width(word: &str, width: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_len = 0;

    for c in word.chars() {
        let char_len = c.width().unwrap_or(0);
        if piece_len + char_len > width && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            piece_len = 0;
        }
        piece.push(c);
        piece_len += char_len;
    }

    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Position of the closing marker for an emphasis run opened just before
/// `start`. `**` closes bold, a lone `*` closes italic; empty runs never match.
fn find_closing(chars: &[char], start: usize, marker: usize) -> Option<usize> {
    // `2 * 3` is arithmetic, not emphasis
    if marker == 1 && chars.get(start).map_or(true, |c| c.is_whitespace()) {
        return None;
    }
    (start + 1..chars.len()).find(|&j| {
        chars[j] == '*' && (marker == 1 || chars.get(j + 1) == Some(&'*'))
    })
}

/// Convert **bold** and *italic* spans to styled text; everything else stays literal
fn parse_markdown_line(text: &str, base: Style) -> Line<'static> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current_text = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '*' {
            let marker = if chars.get(i + 1) == Some(&'*') { 2 } else { 1 };
            if let Some(end) = find_closing(&chars, i + marker, marker) {
                if !current_text.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut current_text), base));
                }
                let inner: String = chars[i + marker..end].iter().collect();
                let style = if marker == 2 {
                    base.add_modifier(Modifier::BOLD)
                } else {
                    base.fg(Color::Gray).add_modifier(Modifier::ITALIC)
                };
                spans.push(Span::styled(inner, style));
                i = end + marker;
                continue;
            }
        }
        current_text.push(chars[i]);
        i += 1;
    }

    if !current_text.is_empty() {
        spans.push(Span::styled(current_text, base));
    }

    Line::from(spans)
}

/// Wrap each source line separately so paragraph breaks survive.
/// `> ` lines render as an indented quote; a paragraph wrapped in double
/// quotes is spoken dialogue and gets the accent colour.
fn push_wrapped(lines: &mut Vec<Line<'static>>, text: &str, width: usize, style: Style) {
    for source_line in text.lines() {
        let trimmed = source_line.trim();

        if let Some(quote) = trimmed.strip_prefix('>') {
            let quote_style = style.add_modifier(Modifier::ITALIC);
            for wrapped in wrap_text_to_width(quote.trim_start(), width.saturating_sub(2).max(1)) {
                let mut line = parse_markdown_line(&wrapped, quote_style);
                line.spans.insert(0, Span::styled("│ ", Style::default().fg(Color::Yellow)));
                lines.push(line);
            }
            continue;
        }

        let is_dialogue = trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"');
        let line_style = if is_dialogue { style.fg(Color::Yellow) } else { style };
        for wrapped in wrap_text_to_width(source_line, width) {
            lines.push(parse_markdown_line(&wrapped, line_style));
        }
    }
}

fn role_style(role: ChatRole) -> Style {
    match role {
        ChatRole::User => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ChatRole::Assistant => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ChatRole::System => Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
    }
}

/// Lay out every message as pre-wrapped lines. Returns the lines and the
/// line offset where each message starts.
fn build_chat_lines(app: &App, width: usize) -> (Vec<Line<'static>>, Vec<u16>) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut offsets = Vec::with_capacity(app.conversation.len());

    for (index, turn) in app.conversation.turns().iter().enumerate() {
        offsets.push(lines.len().min(u16::MAX as usize) as u16);

        let name = match turn.role {
            ChatRole::User => app.user_name.clone(),
            ChatRole::Assistant => app.assistant_name.clone(),
            ChatRole::System => "System".to_string(),
        };
        let mut header = vec![Span::styled(format!("{}:", name), role_style(turn.role))];
        if app.selected == Some(index) {
            header.insert(0, Span::styled("> ", Style::default().fg(Color::Green).bold()));
        }

        if let Some(buffer) = app
            .conversation
            .edit_buffer()
            .filter(|_| app.conversation.is_editing(index))
        {
            header.push(Span::styled(" (editing)", Style::default().fg(Color::DarkGray)));
            lines.push(Line::from(header));
            push_wrapped(&mut lines, buffer, width, Style::default().fg(Color::Green));
            lines.push(Line::default());
            continue;
        }

        lines.push(Line::from(header));

        let parsed = parse_content(&turn.content);
        if let Some(reasoning) = parsed.reasoning.as_deref().filter(|r| !r.is_empty()) {
            let open = app.open_reasoning.contains(&index);
            let marker = if open { "▾" } else { "▸" };
            lines.push(Line::from(Span::styled(
                format!("{} {}", marker, REASONING_LABEL),
                Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC),
            )));
            if open {
                let style = Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC);
                push_wrapped(&mut lines, reasoning, width.saturating_sub(2), style);
            }
        }

        push_wrapped(&mut lines, &parsed.display_text, width, Style::default());
        lines.push(Line::default());
    }

    if app.pending {
        // Animated ellipsis: ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("{} is pondering{}", app.assistant_name, dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    (lines, offsets)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.input_mode == InputMode::Params {
        render_params(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Haunted Tavern ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("  {}", app.client.url()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, kept for scroll math in the handlers
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", app.assistant_name));

    let text = if app.conversation.is_empty() && !app.pending {
        Text::from(Span::styled(
            "The hearth crackles. Say something...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let (lines, offsets) = build_chat_lines(app, app.chat_width as usize);
        app.total_lines = lines.len().min(u16::MAX as usize) as u16;
        app.message_offsets = offsets;
        Text::from(lines)
    };

    let max_scroll = app.total_lines.saturating_sub(app.chat_height);
    app.scroll = if app.follow_bottom {
        max_scroll
    } else {
        app.scroll.min(max_scroll)
    };

    let chat = Paragraph::new(text).block(block).scroll((app.scroll, 0));
    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let (text, cursor_pos, title, active) = match app.input_mode {
        InputMode::EditMessage => (
            app.conversation.edit_buffer().unwrap_or_default(),
            app.edit_cursor,
            " Editing (Enter save, Esc cancel) ",
            true,
        ),
        mode => (
            app.input.as_str(),
            app.input_cursor,
            " Speak your mind... ",
            mode == InputMode::Input,
        ),
    };

    let border_color = if !active {
        Color::DarkGray
    } else if app.pending && app.input_mode == InputMode::Input {
        Color::Red
    } else {
        Color::Yellow
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Newlines shown as a single glyph so char positions stay aligned
    let visible_text: String = text
        .chars()
        .map(|c| if c == '\n' { '↵' } else { c })
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if active {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    if let Some(status) = &app.status {
        let line = Line::from(vec![
            Span::styled(" ERROR ", Style::default().bg(Color::Red).fg(Color::White)),
            Span::styled(format!(" {}", status), Style::default().fg(Color::Red)),
        ]);
        frame.render_widget(Paragraph::new(line).style(Style::default().bg(Color::Black)), area);
        return;
    }

    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Input => (" INPUT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        InputMode::EditMessage => (" EDIT ", Style::default().bg(Color::Green).fg(Color::Black)),
        InputMode::Params => (" PARAMS ", Style::default().bg(Color::Magenta).fg(Color::White)),
    };

    let keys: &[(&str, &str)] = match app.input_mode {
        InputMode::Normal if app.pending => &[("Esc", "stop"), ("j/k", "select"), ("q", "quit")],
        InputMode::Normal => &[
            ("i", "type"),
            ("j/k", "select"),
            ("e", "edit"),
            ("d", "delete"),
            ("t", "thoughts"),
            ("p", "params"),
            ("q", "quit"),
        ],
        InputMode::Input => &[("Enter", "send"), ("Esc", "normal"), ("^p", "params")],
        InputMode::EditMessage => &[("Enter", "save"), ("Esc", "cancel")],
        InputMode::Params => &[("j/k", "select"), ("h/l", "adjust"), ("Enter", "done")],
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    for (key, label) in keys {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn slider_bar(ratio: f64) -> String {
    let filled = (ratio.clamp(0.0, 1.0) * SLIDER_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(SLIDER_WIDTH - filled))
}

fn render_params(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_width = 56.min(area.width.saturating_sub(4));
    let popup_height = (ParamKind::all().len() as u16 + 2).min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Parameters (Enter: Done) ");

    let items: Vec<ListItem> = ParamKind::all()
        .iter()
        .map(|&kind| {
            let value = app.params.get(kind);
            ListItem::new(format!(
                " {:<18} {} {:>6} ",
                kind.label(),
                slider_bar(kind.ratio(value)),
                app.params.format(kind)
            ))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.params_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tavern_core::{ChatTurn, Config, Settings};

    fn app() -> App {
        App::new(&Settings::resolve(Config::new()).unwrap())
    }

    fn plain(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_wrap_respects_width() {
        assert_eq!(
            wrap_text_to_width("the quick brown fox", 10),
            vec!["the quick", "brown fox"]
        );
        assert_eq!(wrap_text_to_width("", 10), vec![String::new()]);
    }

    #[test]
    fn test_wrap_breaks_words_wider_than_line() {
        let url = "https://example.com/a/very/long/path/segment";
        let lines = wrap_text_to_width(&format!("see {} ok", url), 20);
        assert!(lines.iter().all(|l| l.width() <= 20), "{:?}", lines);
        assert_eq!(lines[0], "see");
        assert_eq!(lines.concat().replace(' ', ""), format!("see{}ok", url));
    }

    #[test]
    fn test_wrap_counts_wide_characters_by_column() {
        let lines = wrap_text_to_width("漢字漢字漢字", 5);
        assert_eq!(lines, vec!["漢字", "漢字", "漢字"]);
    }

    #[test]
    fn test_bold_markdown() {
        let line = parse_markdown_line("a **b** c", Style::default());
        assert_eq!(line.spans.len(), 3);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));

        let unclosed = parse_markdown_line("a **b", Style::default());
        assert_eq!(plain(&[unclosed]), vec!["a **b"]);
    }

    #[test]
    fn test_italic_markdown() {
        let line = parse_markdown_line("an *aside* here", Style::default());
        assert_eq!(plain(&[line.clone()]), vec!["an aside here"]);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::ITALIC));

        let math = parse_markdown_line("2 * 3 * 4", Style::default());
        assert_eq!(math.spans.len(), 1);
    }

    #[test]
    fn test_blockquote_and_dialogue() {
        let mut lines = Vec::new();
        push_wrapped(&mut lines, "> old words\n\"Welcome in.\"", 40, Style::default());
        assert_eq!(plain(&lines), vec!["│ old words", "\"Welcome in.\""]);
        assert!(lines[0].spans[1].style.add_modifier.contains(Modifier::ITALIC));
        assert_eq!(lines[1].spans[0].style.fg, Some(Color::Yellow));
    }

    #[test]
    fn test_reasoning_collapsed_by_default() {
        let mut app = app();
        app.conversation.push(ChatTurn::user("hi"));
        app.conversation
            .push(ChatTurn::assistant("<think>hidden plan</think>Welcome"));

        let (lines, offsets) = build_chat_lines(&app, 40);
        let text = plain(&lines);
        assert_eq!(offsets, vec![0, 3]);
        assert!(text.contains(&"▸ Whispered Thoughts".to_string()));
        assert!(text.contains(&"Welcome".to_string()));
        assert!(!text.iter().any(|l| l.contains("hidden plan")));

        app.open_reasoning.insert(1);
        let (lines, _) = build_chat_lines(&app, 40);
        assert!(plain(&lines).contains(&"hidden plan".to_string()));
    }

    #[test]
    fn test_blank_reasoning_not_shown() {
        let mut app = app();
        app.conversation.push(ChatTurn::assistant("<think>  </think>Hello"));
        let (lines, _) = build_chat_lines(&app, 40);
        assert!(!plain(&lines).iter().any(|l| l.contains(REASONING_LABEL)));
    }

    #[test]
    fn test_pondering_indicator_while_pending() {
        let mut app = app();
        app.conversation.push(ChatTurn::user("hi"));
        app.pending = true;
        let (lines, _) = build_chat_lines(&app, 40);
        assert_eq!(
            plain(&lines).last().map(String::as_str),
            Some("Tavern Keeper is pondering.")
        );
    }

    #[test]
    fn test_offsets_saturate_on_huge_transcripts() {
        let mut app = app();
        app.conversation.push(ChatTurn::user("line\n".repeat(70_000)));
        app.conversation.push(ChatTurn::user("after"));
        let (_, offsets) = build_chat_lines(&app, 40);
        assert_eq!(offsets, vec![0, u16::MAX]);
    }

    #[test]
    fn test_editing_shows_display_text_buffer() {
        let mut app = app();
        app.conversation.push(ChatTurn::assistant("<think>x</think>Hi"));
        app.conversation.start_edit(0);
        let (lines, _) = build_chat_lines(&app, 40);
        let text = plain(&lines);
        assert!(text.contains(&"Hi".to_string()));
        assert!(!text.iter().any(|l| l.contains("<think>")));
    }

    #[test]
    fn test_slider_bar_bounds() {
        assert_eq!(slider_bar(0.0).chars().filter(|&c| c == '█').count(), 0);
        assert_eq!(slider_bar(1.0).chars().filter(|&c| c == '█').count(), SLIDER_WIDTH);
        assert_eq!(slider_bar(2.0).chars().count(), SLIDER_WIDTH);
    }
}
