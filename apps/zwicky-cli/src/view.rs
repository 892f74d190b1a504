use console::style;
use zwicky_engine::{ExpansionState, Grid, Idea, IdeaKind, Session};

pub fn header(session: &Session) -> String {
    let challenge = if session.challenge.trim().is_empty() {
        style("(no challenge yet)").dim().to_string()
    } else {
        style(&session.challenge).cyan().to_string()
    };
    format!("{} {}", style("Challenge:").bold(), challenge)
}

pub fn grid(grid: &Grid) -> String {
    if grid.is_empty() {
        return style("No attributes yet. Generate some or add your own.")
            .dim()
            .to_string();
    }
    let mut out = String::new();
    for attr in grid.attributes() {
        out.push_str(&format!("{}", style(&attr.name).bold().green()));
        if let Some(question) = &attr.question {
            out.push_str(&format!("  {}", style(question).dim()));
        }
        out.push('\n');
        if attr.items.is_empty() {
            out.push_str(&format!("    {}\n", style("(no items)").dim()));
        }
        for item in &attr.items {
            if item.selected {
                out.push_str(&format!(
                    "  {} {}\n",
                    style("●").yellow(),
                    style(&item.text).yellow()
                ));
            } else {
                out.push_str(&format!("  ○ {}\n", item.text));
            }
        }
    }
    out
}

/// One-line summary used in pickers.
pub fn idea_label(idea: &Idea) -> String {
    let marker = match idea.kind {
        IdeaKind::Generated => "",
        IdeaKind::Variation => " (variation)",
    };
    let state = match idea.expansion {
        ExpansionState::Collapsed => "",
        ExpansionState::Loading => " [loading]",
        ExpansionState::Expanded(_) => " [expanded]",
    };
    format!("{}{marker}{state}", idea.title)
}

pub fn idea(idea: &Idea) -> String {
    let mut out = format!(
        "{}  {}\n",
        style(&idea.title).bold().magenta(),
        style(idea.created_at.format("%H:%M:%S")).dim()
    );
    if !idea.components.is_empty() {
        let parts: Vec<String> = idea.components.iter().map(|c| c.to_string()).collect();
        out.push_str(&format!("{}\n", style(parts.join(" | ")).dim()));
    }
    out.push('\n');
    out.push_str(&idea.summary);
    out.push('\n');
    if let Some(text) = idea.expanded_text() {
        out.push('\n');
        out.push_str(text);
        out.push('\n');
    }
    out
}

pub fn error(message: &str) -> String {
    format!("{} {}", style("Error:").bold().red(), style(message).red())
}
