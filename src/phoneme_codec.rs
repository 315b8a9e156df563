//! IPA <-> LIAPHON phoneme codec (component A).
//!
//! LIAPHON is a 7-bit-ASCII encoding of the IPA inventory used by French speech
//! corpora. This module holds the one static bidirectional table both directions of
//! the codec are built from, in the same spirit as a static `ArpaPhone`/`Unit`
//! `Display`/`FromStr` table — except the French inventory here is data-driven rather
//! than an exhaustive enum match, since unlike ARPABET the LIAPHON set isn't fixed by a
//! single well-known standard.
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// `(LIAPHON, IPA)` pairs. Ordering only matters for deterministic iteration; lookup
/// tables built from this are indexed both ways.
const TABLE: &[(&str, &str)] = &[
    // Plosives
    ("p", "p"),
    ("t", "t"),
    ("k", "k"),
    ("b", "b"),
    ("d", "d"),
    ("g", "ɡ"),
    // Fricatives
    ("f", "f"),
    ("s", "s"),
    ("S", "ʃ"),
    ("v", "v"),
    ("z", "z"),
    ("Z", "ʒ"),
    // Nasals / liquids
    ("m", "m"),
    ("n", "n"),
    ("N", "ɲ"),
    ("l", "l"),
    ("R", "ʁ"),
    // Semivowels
    ("j", "j"),
    ("w", "w"),
    ("H", "ɥ"),
    // Oral vowels
    ("a", "a"),
    ("i", "i"),
    ("u", "u"),
    ("y", "y"),
    ("e", "e"),
    ("E", "ɛ"),
    ("o", "o"),
    ("O", "ɔ"),
    ("2", "ø"),
    ("9", "œ"),
    ("@", "ə"),
    // Nasal vowels (multi-character IPA; round-trip isn't guaranteed for these)
    ("An", "ɑ̃"),
    ("IN", "ɛ̃"),
    ("ON", "ɔ̃"),
    ("UN", "œ̃"),
    // Silence
    ("_", "_"),
];

struct Codec {
    liaphon_to_ipa: HashMap<&'static str, &'static str>,
    /// IPA entries sorted longest-first so `ipa_to_liaphon`'s longest-match scan tries
    /// multi-character entries (the nasal vowels) before falling back to singletons.
    ipa_entries: Vec<(&'static str, &'static str)>,
}

static CODEC: Lazy<Codec> = Lazy::new(|| {
    let liaphon_to_ipa = TABLE.iter().copied().collect();
    let mut ipa_entries: Vec<(&'static str, &'static str)> =
        TABLE.iter().map(|(l, i)| (*i, *l)).collect();
    ipa_entries.sort_by_key(|(ipa, _)| std::cmp::Reverse(ipa.chars().count()));
    Codec {
        liaphon_to_ipa,
        ipa_entries,
    }
});

/// Converts a sequence of LIAPHON tokens into a single IPA string by concatenating the
/// per-token IPA mapping. Unknown tokens pass through unchanged.
pub fn liaphon_to_ipa<S: AsRef<str>>(seq: impl IntoIterator<Item = S>) -> String {
    let mut out = String::new();
    for token in seq {
        let token = token.as_ref();
        match CODEC.liaphon_to_ipa.get(token) {
            Some(ipa) => out.push_str(ipa),
            None => out.push_str(token),
        }
    }
    out
}

/// Tokenizes an IPA string into LIAPHON tokens via longest-match over the IPA->LIAPHON
/// table. Characters with no match pass through as singleton tokens (keeping the
/// original IPA character, since there is no LIAPHON equivalent to substitute).
pub fn ipa_to_liaphon(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    'outer: while i < chars.len() {
        for (ipa, liaphon) in &CODEC.ipa_entries {
            let ipa_chars: Vec<char> = ipa.chars().collect();
            if i + ipa_chars.len() <= chars.len() && chars[i..i + ipa_chars.len()] == ipa_chars[..]
            {
                out.push((*liaphon).to_string());
                i += ipa_chars.len();
                continue 'outer;
            }
        }
        out.push(chars[i].to_string());
        i += 1;
    }
    out
}
