//! Plain-text renderings of chat state for the terminal front-end.

use super::style;
use crate::api::{CandidateProfile, EvaluationSession};
use crate::session::{CandidateMatch, Message, MessageRole, Session};
use std::fmt::Write;

const SHORT_ID_CHARS: usize = 8;

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_CHARS) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

fn indent_continuation(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.to_string()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn message(message: &Message) -> String {
    let (speaker, width) = match message.role {
        MessageRole::User => (style::dim("you ›"), 6),
        MessageRole::Assistant => (style::accent("ai  ›"), 6),
    };
    format!("{speaker} {}", indent_continuation(&message.content, width))
}

pub fn transcript(session: &Session) -> String {
    let mut out = format!(
        "{} {}\n",
        style::header(&session.name),
        style::dim(format!(
            "({} · {} · {})",
            short_id(&session.id),
            session.user_type,
            session.phase
        ))
    );
    for entry in &session.messages {
        let _ = writeln!(out, "{}", message(entry));
    }
    out
}

pub fn session_line(session: &Session, current: bool) -> String {
    let marker = if current { style::accent("●") } else { " ".into() };
    format!(
        "{marker} {}  {}  {}",
        style::dim(short_id(&session.id)),
        style::header(&session.name),
        style::dim(format!(
            "{} · {} · {} messages",
            session.user_type,
            session.phase,
            session.messages.len()
        ))
    )
}

pub fn matches(matches: &[CandidateMatch]) -> String {
    if matches.is_empty() {
        return style::dim("No matches yet.");
    }

    let mut out = style::header(format!("Top matches ({})", matches.len()));
    out.push('\n');
    for (rank, candidate) in matches.iter().enumerate() {
        let name = if candidate.name.is_empty() {
            candidate.id.as_str()
        } else {
            candidate.name.as_str()
        };
        let _ = writeln!(
            out,
            "{}. {}  {}",
            rank + 1,
            style::header(name),
            style::score(candidate.match_percentage)
        );
        if !candidate.skills.is_empty() {
            let _ = writeln!(
                out,
                "   {} {}",
                style::label("skills:"),
                candidate.skills.join(", ")
            );
        }
        for reason in &candidate.reasons {
            let _ = writeln!(out, "   {} {reason}", style::accent("•"));
        }
        if let Some(portfolio) = &candidate.portfolio {
            let _ = writeln!(out, "   {} {}", style::label("portfolio:"), style::url(portfolio));
        }
        if let Some(email) = &candidate.email {
            let _ = writeln!(out, "   {} {email}", style::label("email:"));
        }
    }
    out
}

pub fn candidate(profile: &CandidateProfile) -> String {
    let mut out = format!(
        "{}  {}",
        style::header(if profile.name.is_empty() {
            &profile.id
        } else {
            &profile.name
        }),
        style::dim(short_id(&profile.id))
    );
    let study: Vec<&str> = [profile.university.as_deref(), profile.major.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if !study.is_empty() {
        let _ = write!(out, "\n   {}", study.join(" · "));
    }
    if !profile.skills.is_empty() {
        let _ = write!(
            out,
            "\n   {} {}",
            style::label("skills:"),
            profile.skills.join(", ")
        );
    }
    if let Some(email) = &profile.email {
        let _ = write!(out, "\n   {} {email}", style::label("email:"));
    }
    out
}

pub fn evaluation_session(session: &EvaluationSession) -> String {
    let title = session
        .session_name
        .as_deref()
        .or(session.search_query.as_deref())
        .unwrap_or("Untitled search");
    let mut out = format!(
        "{}  {}",
        style::header(title),
        style::dim(short_id(&session.session_id))
    );
    if let Some(created_at) = &session.created_at {
        let _ = write!(out, "  {}", style::dim(created_at));
    }
    if !session.required_skills.is_empty() {
        let _ = write!(
            out,
            "\n   {} {}",
            style::label("skills:"),
            session.required_skills.join(", ")
        );
    }
    for evaluation in &session.evaluations {
        let name = evaluation
            .candidate_name
            .as_deref()
            .unwrap_or(&evaluation.candidate_id);
        let _ = write!(
            out,
            "\n   {} {name}  {}",
            style::accent("•"),
            style::score(evaluation.match_percentage)
        );
    }
    out
}
