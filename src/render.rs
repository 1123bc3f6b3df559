//! Terminal presentation. Everything here is a pure function of a
//! [`ChatView`]; [`TerminalRenderer`] only remembers what it already printed
//! so streaming output can be written as deltas.
//!
//! Server-supplied text is printed only after [`strip_control`].

use colored::*;

use crate::controller::ChatView;
use crate::sanitize::{sanitize_for_display, strip_control};
use crate::types::{Message, QueryOptimization, Source};

pub const LIMIT_WARNING: &str =
    "You've reached the session limit of questions. Type /logout to start a new session.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeLevel {
    Normal,
    Warning,
    Critical,
}

/// Colour band for the quota gauge. Unknown quota reads as zero.
pub fn gauge_level(remaining: Option<u32>) -> GaugeLevel {
    match remaining.unwrap_or(0) {
        0..=2 => GaugeLevel::Critical,
        3..=5 => GaugeLevel::Warning,
        _ => GaugeLevel::Normal,
    }
}

/// `[######----] 6/10`, or `--/10` when the quota is unknown.
pub fn render_gauge(remaining: Option<u32>, max: u32, width: usize) -> String {
    let filled = match (remaining, max) {
        (Some(r), m) if m > 0 => ((r.min(m) as usize) * width) / m as usize,
        _ => 0,
    };
    let bar = format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled));
    let count = match remaining {
        Some(r) => format!("{r}/{max}"),
        None => format!("--/{max}"),
    };
    let text = format!("{bar} {count}");
    match gauge_level(remaining) {
        GaugeLevel::Critical => text.bright_red().to_string(),
        GaugeLevel::Warning => text.bright_yellow().to_string(),
        GaugeLevel::Normal => text.bright_green().to_string(),
    }
}

pub fn render_header(app_name: &str, view: &ChatView<'_>) -> String {
    let user = view.session.user_name().unwrap_or("Guest");
    format!(
        "{}\n{}: {}   {}: {}\n{}\n",
        app_name.bright_cyan().bold(),
        "User".bright_yellow(),
        sanitize_for_display(user),
        "Queries".bright_yellow(),
        render_gauge(view.session.questions_remaining(), view.max_questions, 10),
        "=".repeat(50).bright_blue(),
    )
}

pub fn render_optimization(opt: &QueryOptimization) -> String {
    let mut out = format!("  {}\n", "Query optimization".bright_magenta());
    out.push_str(&format!("    Original:  {}\n", strip_control(&opt.original)));
    if let Some(rewritten) = &opt.rewritten {
        out.push_str(&format!("    Rewritten: {}\n", strip_control(rewritten)));
    }
    if let Some(terms) = opt.expanded.as_ref().filter(|t| !t.is_empty()) {
        out.push_str(&format!("    Expanded:  {}\n", strip_control(&terms.join(", "))));
    }
    out
}

pub fn render_sources(sources: &[Source], total_docs: u32) -> String {
    let mut out = format!(
        "  {}\n",
        format!("Sources ({total_docs} documents found)").bright_blue()
    );
    for s in sources {
        out.push_str(&format!(
            "    {} (Page {})\n      {}\n",
            strip_control(&s.source_file).bold(),
            s.page,
            strip_control(&s.preview).dimmed()
        ));
    }
    out
}

/// Optimization and source blocks shown under an answer.
pub fn render_extras(message: &Message) -> String {
    let mut out = String::new();
    if let Some(opt) = &message.optimization {
        out.push_str(&render_optimization(opt));
    }
    if let Some(c) = message.citations.as_ref().filter(|c| !c.sources.is_empty()) {
        out.push_str(&render_sources(&c.sources, c.total_docs));
    }
    out
}

pub fn render_message(message: &Message) -> String {
    if message.is_user {
        format!("{} {}\n", "You:".bright_green().bold(), sanitize_for_display(&message.content))
    } else {
        let mut out = format!(
            "{} {}\n",
            "Navigator:".bright_cyan().bold(),
            strip_control(&message.content)
        );
        out.push_str(&render_extras(message));
        out
    }
}

pub fn render_transcript(view: &ChatView<'_>) -> String {
    view.messages.iter().map(render_message).collect::<Vec<_>>().join("\n")
}

/// Incremental renderer for a line-oriented terminal.
///
/// User messages are not echoed: the user just typed them.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    printed: usize,
    streamed: String,
    status: String,
    warned: bool,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to append to the terminal for the new state.
    pub fn frame(&mut self, view: &ChatView<'_>) -> String {
        let mut out = String::new();

        if view.messages.len() < self.printed {
            // Transcript was wiped by a logout.
            *self = Self::default();
        }

        if !view.live.status.is_empty() && view.live.status != self.status {
            out.push_str(&format!("{} {}\n", "…".bright_blue(), strip_control(&view.live.status).dimmed()));
        }
        self.status.clone_from(&view.live.status);

        for message in &view.messages[self.printed..] {
            if message.is_user {
                continue;
            }
            if !self.streamed.is_empty() && message.content.starts_with(self.streamed.as_str()) {
                // Finish the answer already on screen.
                out.push_str(&strip_control(&message.content[self.streamed.len()..]));
                out.push('\n');
                out.push_str(&render_extras(message));
            } else {
                if !self.streamed.is_empty() {
                    out.push('\n');
                }
                out.push_str(&render_message(message));
            }
            self.streamed.clear();
        }
        self.printed = view.messages.len();

        let answer = &view.live.answer;
        if !answer.starts_with(self.streamed.as_str()) {
            // answer_start threw away earlier text.
            out.push('\n');
            self.streamed.clear();
        }
        if answer.len() > self.streamed.len() {
            if self.streamed.is_empty() {
                out.push_str(&format!("{} ", "Navigator:".bright_cyan().bold()));
            }
            out.push_str(&strip_control(&answer[self.streamed.len()..]));
            self.streamed.clone_from(answer);
        }

        let limited = view.limit_reached() && !view.phase.in_flight();
        if limited && !self.warned {
            out.push_str(&format!("{}\n", LIMIT_WARNING.bright_red()));
        }
        self.warned = limited;

        out
    }
}
