//! Rule-based reply selection used when the model path is unavailable.
//!
//! Rules are evaluated top to bottom and the first match wins. The order
//! is significant: several topics share keywords (`anxiety`, `stigma`,
//! `discrimination`) and only the earlier rule ever answers for them.

use crate::knowledge::{self, BackgroundDocument};
use crate::text::{contains_any, content_words, normalize_message};

const GREETINGS: [&str; 3] = ["hello", "hi", "hey"];
const HOW_ARE_YOU: [&str; 2] = ["how are you", "how are you doing"];

const MAX_DOCUMENT_EXCERPTS: usize = 2;

pub fn is_greeting(normalized: &str) -> bool {
    GREETINGS.contains(&normalized)
}

/// Pick a canned passage for `text`. Never empty.
pub fn select_reply(text: &str, document: Option<&BackgroundDocument>) -> String {
    let msg = normalize_message(text);
    let m = msg.as_str();

    if is_greeting(m) {
        return knowledge::GREETING.to_string();
    }
    if HOW_ARE_YOU.contains(&m) {
        return knowledge::HOW_ARE_YOU.to_string();
    }
    if contains_any(m, &["thank you", "thanks"]) {
        return knowledge::THANKS.to_string();
    }

    let mentions_health = m.contains("mental health");
    let mentions_illness = m.contains("mental illness");

    if contains_any(m, &["what", "define", "meaning"]) && mentions_health {
        return knowledge::DEFINITION_EXTENDED.to_string();
    }
    if contains_any(m, &["children", "child", "kid"])
        || (mentions_health && contains_any(m, &["young", "youth"]))
    {
        return knowledge::CHILDREN.to_string();
    }
    if contains_any(m, &["difference", "versus", "vs"]) && mentions_health && mentions_illness {
        return knowledge::COMPARISON.to_string();
    }
    if contains_any(m, &["stigma", "prejudice", "discrimination"]) {
        return knowledge::STIGMA_LITERATURE.to_string();
    }

    if let Some(doc) = document {
        let words = content_words(m);
        let excerpts = doc.matching_paragraphs(&words, MAX_DOCUMENT_EXCERPTS);
        if !excerpts.is_empty() {
            return BackgroundDocument::attributed_reply(&excerpts);
        }
    }

    if (mentions_health && mentions_illness)
        || contains_any(m, &["difference between", "what is mental health", "define mental"])
    {
        return knowledge::DEFINITION.to_string();
    }
    if contains_any(
        m,
        &[
            "mental health problem",
            "mental disorder",
            "mental illness",
            "depression",
            "anxiety",
        ],
    ) {
        return knowledge::PROBLEMS.to_string();
    }
    if contains_any(m, &["stress", "anxiety", "worried", "anxious", "overwhelmed"]) {
        return knowledge::STRESS.to_string();
    }
    if contains_any(m, &["self-care", "self care", "take care", "cope", "manage"]) {
        return knowledge::SELF_CARE.to_string();
    }
    if contains_any(m, &["stigma", "judged", "judgment", "discrimination"]) {
        return knowledge::STIGMA.to_string();
    }
    if contains_any(m, &["factor", "cause", "influence", "affect"]) {
        return knowledge::FACTORS.to_string();
    }

    knowledge::DEFAULT_REPLY.to_string()
}
