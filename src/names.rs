use std::collections::{HashMap, HashSet};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::HeatError;
use crate::events::{Tag, channel_record, split_tag};

#[derive(Debug, Clone, Default)]
pub struct NameTable {
    patterns: Vec<(String, String)>,
    decoded: HashMap<String, String>,
}

impl NameTable {
    /// Builds the table for a set of raw craft names.
    pub fn build<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut raw_names: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for name in names {
            let name = name.into();
            if !name.is_empty() && seen.insert(name.clone()) {
                raw_names.push(name);
            }
        }

        let mut table = Self::default();
        let mut patterns_seen: HashSet<String> = HashSet::new();
        for name in &raw_names {
            let token = encode_token(name);
            table.decoded.insert(token.clone(), name.clone());
            patterns_seen.insert(name.clone());
            table.patterns.push((name.clone(), token));
        }
        for name in &raw_names {
            let Some(escaped) = json_escaped(name) else {
                continue;
            };
            if escaped == *name || seen.contains(&escaped) || !patterns_seen.insert(escaped.clone())
            {
                continue;
            }
            table.patterns.push((escaped, encode_token(name)));
        }
        // Stable sort keeps first-seen order among equal lengths.
        table
            .patterns
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        table
    }

    pub fn from_log_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self::build(collect_craft_names(lines))
    }

    pub fn len(&self) -> usize {
        self.decoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoded.is_empty()
    }

    /// Replaces every known name occurring in `text` by its token.
    ///
    /// The text is scanned once, left to right; at each position the longest matching
    /// name wins and the inserted token is never rescanned, so a shorter name can
    /// never match inside a longer name or inside another name's token.
    pub fn encode(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() * 4 / 3 + 4);
        let mut rest = text;
        'scan: while !rest.is_empty() {
            for (name, token) in &self.patterns {
                if let Some(tail) = rest.strip_prefix(name.as_str()) {
                    out.push_str(token);
                    rest = tail;
                    continue 'scan;
                }
            }
            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                out.push(ch);
            }
            rest = chars.as_str();
        }
        out
    }

    pub fn decode(&self, token: &str) -> Option<&str> {
        self.decoded.get(token).map(String::as_str)
    }

    /// Decodes a craft token, failing the heat when it is unknown.
    pub fn resolve(&self, token: &str, line: usize) -> Result<String, HeatError> {
        self.decode(token)
            .map(str::to_string)
            .ok_or_else(|| HeatError::UnresolvedIdentifier {
                line,
                token: token.to_string(),
            })
    }

    /// Checks a raw name taken from a JSON payload against the table.
    pub fn known(&self, name: &str, line: usize) -> Result<String, HeatError> {
        if self.decoded.contains_key(&encode_token(name)) {
            Ok(name.to_string())
        } else {
            Err(HeatError::UnresolvedIdentifier {
                line,
                token: name.to_string(),
            })
        }
    }
}

pub fn encode_token(name: &str) -> String {
    BASE64.encode(name.as_bytes())
}

pub fn collect_craft_names<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();
    for line in lines {
        let Some(record) = channel_record(line) else {
            continue;
        };
        let Some((word, payload)) = split_tag(record) else {
            continue;
        };
        let name = match Tag::classify(word) {
            Some(Tag::Alive) | Some(Tag::Mia) => payload,
            Some(Tag::Dead) => match payload.splitn(3, ':').nth(2) {
                Some(name) => name,
                None => continue,
            },
            _ => continue,
        };
        if seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    }
    names
}

fn json_escaped(name: &str) -> Option<String> {
    let quoted = serde_json::to_string(name).ok()?;
    quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(str::to_string)
}
