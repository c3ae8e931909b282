//! Free-text command interpreter.
//!
//! Maps operator phrases ("Fire in Mumbai", "Need ambulance in Delhi",
//! "join agencies near Pune", "assign fireteam 1 to alert-3") onto typed
//! [`Command`]s. Interpretation is purely lexical; executing a command is
//! the dispatcher's job.

use serde::{Deserialize, Serialize};

/// An operator intent recognized from free text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Report an emergency or request a service at a place.
    Report {
        /// Disaster keyword, or the service's responder type.
        emergency_type: String,
        /// Responder type to notify.
        response_type: String,
        /// Place name as typed.
        location: String,
        /// True for "need an ambulance" style requests.
        is_service_request: bool,
    },
    /// Join up to three agencies close to a place.
    JoinNearby {
        /// Place name to search around.
        location: String,
    },
    /// Join one agency picked by name fragment or type.
    JoinAgency {
        /// Name fragment or agency type.
        agency: String,
        /// Where to coordinate; the agency's home when absent.
        location: Option<String>,
    },
    /// Leave the joined agency whose name contains the fragment.
    Leave {
        /// Name fragment of a joined agency.
        agency: String,
    },
    /// End the coordination session.
    LeaveAll,
    /// Put a named team on an alert.
    Assign {
        /// Team name or id.
        team: String,
        /// `alert-<n>`.
        alert_id: String,
    },
    /// Change the operator's availability.
    SetStatus {
        /// One of available, busy, offline.
        status: String,
    },
}

/// Result of executing a [`Command`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandReply {
    /// The command that ran.
    pub command: Command,
    /// False when the command ran but was declined (nothing to leave,
    /// already joined, no agencies nearby).
    pub ok: bool,
    /// Operator-facing summary.
    pub message: String,
}

// Service keywords are checked first, in this order.
const SERVICES: &[(&str, &str)] = &[
    ("fire brigade", "fire"),
    ("fire truck", "fire"),
    ("fire engine", "fire"),
    ("fire department", "fire"),
    ("firefighters", "fire"),
    ("ambulance", "medical"),
    ("paramedic", "medical"),
    ("medical team", "medical"),
    ("doctor", "medical"),
    ("hospital", "medical"),
    ("police", "police"),
    ("cops", "police"),
    ("security force", "police"),
    ("ndrf", "disaster"),
    ("disaster team", "disaster"),
    ("rescue team", "disaster"),
    ("relief team", "disaster"),
    ("boat", "flood"),
    ("rescue boat", "flood"),
    ("navy", "flood"),
    ("helicopter", "disaster"),
    ("air ambulance", "disaster"),
    ("air lift", "disaster"),
];

// (keyword, disaster type, response type)
const DISASTERS: &[(&str, &str, &str)] = &[
    ("fire", "fire", "fire"),
    ("burning", "fire", "fire"),
    ("blaze", "fire", "fire"),
    ("wildfire", "fire", "fire"),
    ("forest fire", "fire", "fire"),
    ("flood", "flood", "flood"),
    ("flooding", "flood", "flood"),
    ("flash flood", "flood", "flood"),
    ("water logging", "flood", "flood"),
    ("earthquake", "earthquake", "disaster"),
    ("quake", "earthquake", "disaster"),
    ("tremor", "earthquake", "disaster"),
    ("seismic", "earthquake", "disaster"),
    ("cyclone", "cyclone", "disaster"),
    ("hurricane", "cyclone", "disaster"),
    ("storm", "cyclone", "disaster"),
    ("typhoon", "cyclone", "disaster"),
    ("landslide", "landslide", "disaster"),
    ("mudslide", "landslide", "disaster"),
    ("rockslide", "landslide", "disaster"),
    ("landslip", "landslide", "disaster"),
    ("drought", "drought", "disaster"),
    ("water shortage", "drought", "disaster"),
    ("famine", "drought", "disaster"),
    ("tsunami", "tsunami", "flood"),
    ("tidal wave", "tsunami", "flood"),
    ("heatwave", "heatwave", "medical"),
    ("heat wave", "heatwave", "medical"),
    ("coldwave", "coldwave", "medical"),
    ("cold wave", "coldwave", "medical"),
    ("frost", "coldwave", "medical"),
    ("epidemic", "epidemic", "medical"),
    ("outbreak", "epidemic", "medical"),
    ("pandemic", "epidemic", "medical"),
    ("virus", "epidemic", "medical"),
    ("chemical", "chemical", "chemical"),
    ("toxic", "chemical", "chemical"),
    ("leak", "chemical", "chemical"),
    ("industrial", "industrial", "fire"),
    ("factory", "industrial", "fire"),
    ("radiation", "chemical", "chemical"),
    ("stampede", "stampede", "medical"),
    ("crowd crush", "stampede", "medical"),
    ("riot", "stampede", "police"),
    ("medical", "medical", "medical"),
    ("injury", "medical", "medical"),
    ("accident", "medical", "medical"),
    ("heart attack", "medical", "medical"),
    ("emergency", "medical", "medical"),
];

const NEED_KEYWORDS: &[&str] = &[
    "need", "required", "wanted", "send", "dispatch", "deploy", "help", "rescue", "assist",
    "emergency", "immediate",
];

const JOIN_TRIGGERS: &[&str] = &["join", "connect", "coordinate with", "work with"];
const LEAVE_TRIGGERS: &[&str] = &["leave", "disconnect", "stop coordinating", "end coordination"];
const LEAVE_ALL: &[&str] = &[
    "leave all",
    "disconnect all",
    "end all",
    "stop all coordination",
    "end coordination",
];

/// Interprets one operator phrase. `None` when nothing was recognized.
pub fn interpret(text: &str) -> Option<Command> {
    let text = text.trim();
    let lower = text.to_lowercase();
    if lower.is_empty() {
        return None;
    }

    if let Some(cmd) = parse_status(text) {
        return Some(cmd);
    }
    if let Some(cmd) = parse_assign(text) {
        return Some(cmd);
    }
    // "disconnect" contains "connect", so leave is checked first.
    if LEAVE_TRIGGERS.iter().any(|t| lower.contains(t)) {
        return parse_leave(text);
    }
    if JOIN_TRIGGERS.iter().any(|t| lower.contains(t)) {
        return parse_join(text);
    }
    parse_report(text)
}

fn parse_status(text: &str) -> Option<Command> {
    let words = words(text);
    let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let rest = match lowered.as_slice() {
        [first, ..] if first == "status" => &words[1..],
        [first, second, ..] if first == "set" && second == "status" => &words[2..],
        _ => return None,
    };
    let rest = match rest {
        [to, tail @ ..] if to.eq_ignore_ascii_case("to") => tail,
        other => other,
    };
    let status = rest.first()?;
    Some(Command::SetStatus {
        status: status.to_lowercase(),
    })
}

fn parse_assign(text: &str) -> Option<Command> {
    let words = words(text);
    if !words.first()?.eq_ignore_ascii_case("assign") {
        return None;
    }
    let to = words.iter().rposition(|w| w.eq_ignore_ascii_case("to"))?;
    let team = words[1..to].join(" ");
    let alert_id = words.get(to + 1)?.to_lowercase();
    if team.is_empty() {
        return None;
    }
    Some(Command::Assign { team, alert_id })
}

fn parse_join(text: &str) -> Option<Command> {
    let location = after_preposition(text, &["in", "at", "near", "around"]);
    if let Some(agency) = agency_after_with(text) {
        return Some(Command::JoinAgency { agency, location });
    }
    location.map(|location| Command::JoinNearby { location })
}

fn parse_leave(text: &str) -> Option<Command> {
    let lower = text.to_lowercase();
    if LEAVE_ALL.iter().any(|t| lower.contains(t)) {
        return Some(Command::LeaveAll);
    }
    for lead in ["stop coordinating with", "disconnect from", "leave"] {
        if let Some(tail) = lower.find(lead).and_then(|pos| text.get(pos + lead.len()..)) {
            let agency = letters_and_spaces(tail);
            if !agency.is_empty() {
                return Some(Command::Leave { agency });
            }
        }
    }
    None
}

fn parse_report(text: &str) -> Option<Command> {
    let lower = text.to_lowercase();
    let location = after_preposition(text, &["in", "at", "near", "around", "by"])
        .or_else(|| trailing_words(text))?;

    if let Some((_, service)) = SERVICES.iter().find(|(k, _)| lower.contains(k)) {
        return Some(Command::Report {
            emergency_type: service.to_string(),
            response_type: service.to_string(),
            location,
            is_service_request: true,
        });
    }

    let (_, disaster, response) = DISASTERS.iter().find(|(k, _, _)| lower.contains(k))?;
    let needs_help = NEED_KEYWORDS.iter().any(|k| lower.contains(k));
    Some(Command::Report {
        emergency_type: disaster.to_string(),
        response_type: response.to_string(),
        location,
        is_service_request: needs_help,
    })
}

fn words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Text following the first of `preps` (tried in order) that appears as a
/// whole word, up to the first character that is not a word character or
/// whitespace.
fn after_preposition(text: &str, preps: &[&str]) -> Option<String> {
    let tokens = word_spans(text);
    for prep in preps {
        let Some(&(_, end)) = tokens
            .iter()
            .find(|(start, end)| text[*start..*end].eq_ignore_ascii_case(prep))
        else {
            continue;
        };
        let tail: String = text[end..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
            .collect();
        let tail = tail.trim();
        if !tail.is_empty() {
            return Some(tail.to_string());
        }
    }
    None
}

/// The last (up to three) words, when the text has at least two.
fn trailing_words(text: &str) -> Option<String> {
    let words = words(text);
    if words.len() < 2 {
        return None;
    }
    let start = words.len().saturating_sub(3);
    Some(words[start..].join(" "))
}

/// Agency named after "with", stopping at a location preposition.
fn agency_after_with(text: &str) -> Option<String> {
    let tokens = word_spans(text);
    let idx = tokens
        .iter()
        .position(|(s, e)| text[*s..*e].eq_ignore_ascii_case("with"))?;
    let mut name = Vec::new();
    for &(s, e) in &tokens[idx + 1..] {
        let word = &text[s..e];
        if ["in", "near", "at", "for"]
            .iter()
            .any(|p| word.eq_ignore_ascii_case(p))
        {
            break;
        }
        if !word.chars().all(char::is_alphabetic) {
            break;
        }
        name.push(word);
    }
    (!name.is_empty()).then(|| name.join(" "))
}

fn letters_and_spaces(text: &str) -> String {
    text.chars()
        .take_while(|c| c.is_alphabetic() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Byte spans of maximal alphanumeric runs.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_alphanumeric(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}
