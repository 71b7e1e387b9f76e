//! Cleanup of raw model output.
//!
//! Small instruction-tuned models echo their prompt, prefix replies with
//! their own name and wrap them in quotes. One pass applies, in order:
//!
//! 1. strip every leading role prefix (`Dax:`, `NPC:`, `Assistant:`)
//! 2. cut at the first prompt-echo marker (`Player:`, `Human:`, section headers)
//! 3. remove one pair of wrapping quotes, straight or curly
//! 4. collapse repeated role prefixes anywhere in the text
//!
//! Passes repeat until nothing changes. Every pass only removes characters,
//! so the loop terminates and `sanitize(sanitize(x)) == sanitize(x)`.

/// Markers that mean the model started reproducing the prompt.
const ECHO_MARKERS: &[&str] = &[
    "Player says:",
    "Player:",
    "Human:",
    "You:",
    "WORKFLOW STATE:",
    "NEXT STEP:",
    "INSTRUCTION:",
    "BUILD PROGRESS:",
    "RECENT CHAT:",
    "RULES:",
    "MOOD (",
];

/// Opening and closing quote characters.
const OPEN_QUOTES: &[char] = &['"', '\u{201C}', '\u{201D}'];
const CLOSE_QUOTES: &[char] = &['"', '\u{201D}', '\u{201C}'];

#[derive(Debug, Clone)]
pub struct ResponseSanitizer {
    /// Lowercased role prefixes, each ending with `:`.
    role_prefixes: Vec<String>,
}

impl ResponseSanitizer {
    pub fn new(npc_name: &str) -> Self {
        let mut role_prefixes = vec![format!("{}:", npc_name.trim().to_ascii_lowercase())];
        for generic in ["npc:", "assistant:"] {
            if !role_prefixes.iter().any(|p| p == generic) {
                role_prefixes.push(generic.to_string());
            }
        }
        Self { role_prefixes }
    }

    /// Clean `raw` until it reaches a fixed point.
    pub fn sanitize(&self, raw: &str) -> String {
        let mut current = raw.trim().to_string();
        loop {
            let next = self.pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn pass(&self, text: &str) -> String {
        let text = self.strip_role_prefixes(text.trim());
        let text = cut_at_echo(text);
        let text = strip_wrapping_quotes(text);
        let mut text = text.trim().to_string();
        for prefix in &self.role_prefixes {
            text = collapse_repeats(&text, prefix);
        }
        text.trim().to_string()
    }

    /// Remove every leading role prefix.
    pub fn strip_role_prefixes<'a>(&self, mut text: &'a str) -> &'a str {
        'outer: loop {
            for prefix in &self.role_prefixes {
                if let Some(rest) = strip_prefix_ignore_case(text, prefix) {
                    text = rest.trim_start();
                    continue 'outer;
                }
            }
            return text;
        }
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

fn cut_at_echo(text: &str) -> &str {
    let cut = ECHO_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min();
    match cut {
        Some(idx) => &text[..idx],
        None => text,
    }
}

/// Remove one pair of wrapping quotes. A missing closing quote is tolerated
/// (token limits often cut it off).
pub fn strip_wrapping_quotes(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix(OPEN_QUOTES) else {
        return text;
    };
    rest.strip_suffix(CLOSE_QUOTES).unwrap_or(rest).trim()
}

/// Collapse `prefix prefix` (any case, any whitespace between) into a single
/// `prefix`. `prefix` must be lowercase.
fn collapse_repeats(text: &str, prefix: &str) -> String {
    let mut out = text.to_string();
    while let Some((start, end)) = find_repeat(&out.to_ascii_lowercase(), prefix) {
        out.replace_range(start..end, "");
    }
    out
}

/// Range covering the second of two consecutive prefixes and the whitespace
/// before it. The first occurrence keeps its original casing.
fn find_repeat(lower: &str, prefix: &str) -> Option<(usize, usize)> {
    let mut from = 0;
    while let Some(rel) = lower[from..].find(prefix) {
        let start = from + rel;
        let after = start + prefix.len();
        let rest = &lower[after..];
        let gap = rest.len() - rest.trim_start().len();
        if rest[gap..].starts_with(prefix) {
            return Some((after, after + gap + prefix.len()));
        }
        from = after;
    }
    None
}
