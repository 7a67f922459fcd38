//! Report text in Telegram's HTML subset.

use crate::bridges::{FetchedBridges, TransportClass};

/// Escape text for Telegram HTML.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Report listing the new lines of a successful run, one section per class.
pub fn success_message(new_by_class: &FetchedBridges) -> String {
    let mut message = String::from("🚀 <b>New Tor Bridges:</b>\n\n");

    for class in TransportClass::ALL {
        message.push_str(&format!("<b>{}:</b>\n", class.title()));
        match new_by_class.get(&class) {
            Some(lines) if !lines.is_empty() => {
                for line in lines {
                    message.push_str(&format!("<code>{}</code>\n\n", html_escape(line.as_str())));
                }
            }
            _ => message.push_str("<i>❌ No new bridges</i>\n\n"),
        }
    }

    message
}

/// Report for a run whose fetched lines were all known already.
pub fn no_new_message(fetched: usize) -> String {
    if fetched == 0 {
        "ℹ️ <b>No new Tor bridges</b>\nThe listings returned no bridges this time.".to_string()
    } else {
        format!(
            "ℹ️ <b>No new Tor bridges</b>\nAll {} fetched bridge(s) are already known.",
            fetched
        )
    }
}

/// Report for a failed run.
pub fn failure_message(reason: &str) -> String {
    format!(
        "❌ <b>Bridge fetch failed</b>\n{}\nPlease check the logs for details.",
        html_escape(reason)
    )
}

/// Split text into chunks of at most `max_chars` characters, cutting after a
/// line break when one falls inside the window.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let limit = match rest.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(rest.to_string());
                break;
            }
        };
        let cut = match rest[..limit].rfind('\n') {
            Some(idx) if idx > 0 => idx + 1,
            _ => limit,
        };
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    chunks
}
