//! Label normalization: singular/plural forms and relationship phrases
//!
//! The engine only talks to [`LabelInflector`]; [`EnglishInflector`] is a
//! rule-based implementation that covers the object vocabulary of common
//! detection datasets without pulling in a dictionary.

/// Spatial relation phrases that mark a label as a relationship descriptor
pub const RELATIONSHIP_PHRASES: &[&str] = &[
    "next to",
    "on top of",
    "below",
    "above",
    "beside",
    "near",
    "under",
    "over",
    "around",
    "in front of",
    "behind",
];

/// Swappable linguistic strategy used by merging and formatting
pub trait LabelInflector: Send + Sync {
    /// Singularize every word of a phrase
    fn to_singular(&self, phrase: &str) -> String;

    /// Pluralize the head noun of a phrase
    fn to_plural(&self, phrase: &str) -> String;

    /// Whether the label describes a spatial relation rather than an object
    fn is_relationship(&self, label: &str) -> bool {
        is_relationship_label(label)
    }
}

/// Word-boundary match against [`RELATIONSHIP_PHRASES`]
pub fn is_relationship_label(label: &str) -> bool {
    let normalized: String = label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let padded = format!(" {} ", normalized.split_whitespace().collect::<Vec<_>>().join(" "));
    RELATIONSHIP_PHRASES
        .iter()
        .any(|phrase| padded.contains(&format!(" {} ", phrase)))
}

/// Singularize with the default English rules
pub fn to_singular(phrase: &str) -> String {
    EnglishInflector.to_singular(phrase)
}

/// Pluralize with the default English rules
pub fn to_plural(phrase: &str) -> String {
    EnglishInflector.to_plural(phrase)
}

/// Edit distance counted in characters
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    if s1_chars.is_empty() {
        return s2_chars.len();
    }
    if s2_chars.is_empty() {
        return s1_chars.len();
    }

    let mut previous: Vec<usize> = (0..=s2_chars.len()).collect();
    let mut current = vec![0; s2_chars.len() + 1];

    for (i, c1) in s1_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = if c1 == c2 { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[s2_chars.len()]
}

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("ox", "oxen"),
    ("leaf", "leaves"),
    ("knife", "knives"),
    ("wife", "wives"),
    ("life", "lives"),
    ("shelf", "shelves"),
    ("wolf", "wolves"),
    ("half", "halves"),
    ("loaf", "loaves"),
    ("calf", "calves"),
    ("thief", "thieves"),
    ("scarf", "scarves"),
];

/// Same form in singular and plural, or plural-only
const UNINFLECTED: &[&str] = &[
    "sheep", "fish", "deer", "series", "species", "aircraft", "moose", "salmon", "trout",
    "shrimp", "bison", "pants", "jeans", "shorts", "scissors", "trousers", "clothes", "news",
    "goggles", "binoculars", "headphones", "earphones", "tongs",
];

/// Nouns ending in -o that take -es
const O_ES: &[&str] = &[
    "potato", "tomato", "hero", "echo", "torpedo", "veto", "mango", "volcano", "mosquito",
    "buffalo", "domino",
];

/// Singular nouns ending in a single -s
const SINGULAR_S: &[&str] = &[
    "bus", "gas", "lens", "canvas", "atlas", "iris", "bias", "alias", "chaos", "cactus", "octopus",
    "walrus", "virus", "circus", "tennis", "chassis", "trellis", "pelvis", "axis", "oasis",
    "basis", "crisis", "analysis", "thesis", "mantis", "ibis", "cannabis", "dais",
];

/// Nouns whose plural ends in -ies but whose singular keeps -ie
const IE_NOUNS: &[&str] = &[
    "cookie", "movie", "tie", "pie", "brownie", "zombie", "selfie", "hoodie", "calorie", "lie",
    "smoothie", "pixie", "rookie", "goalie", "beanie",
];

/// Nouns ending in -che whose plural only adds -s
const CHE_NOUNS: &[&str] = &["cache", "niche", "headache", "moustache", "avalanche", "quiche"];

/// Words ending in -man that do not inflect to -men
const MAN_EXCEPTIONS: &[&str] = &["human", "german", "roman", "shaman", "caiman", "talisman"];

/// Words ending in -men that are not plurals of -man
const MEN_EXCEPTIONS: &[&str] = &["ramen", "omen", "abdomen", "specimen", "stamen", "amen"];

/// Rule-based English inflector
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishInflector;

impl EnglishInflector {
    fn singular_word(&self, word: &str) -> String {
        let lower = word.to_lowercase();

        if lower.contains("people") {
            return lower.replace("people", "person");
        }
        if lower.ends_with("men") && !MEN_EXCEPTIONS.contains(&lower.as_str()) {
            return format!("{}man", &lower[..lower.len() - 3]);
        }
        if let Some((singular, _)) = IRREGULAR.iter().find(|(_, plural)| *plural == lower) {
            return singular.to_string();
        }
        if UNINFLECTED.contains(&lower.as_str()) || lower.chars().count() <= 3 {
            return lower;
        }

        if let Some(stem) = lower.strip_suffix("ies") {
            if IE_NOUNS.contains(&format!("{}ie", stem).as_str()) || lower.chars().count() <= 4 {
                return format!("{}ie", stem);
            }
            return format!("{}y", stem);
        }
        if let Some(stem) = lower.strip_suffix("es") {
            if SINGULAR_S.contains(&stem) || O_ES.contains(&stem) {
                return stem.to_string();
            }
            if stem.ends_with("ch") && CHE_NOUNS.contains(&format!("{}e", stem).as_str()) {
                return format!("{}e", stem);
            }
            if ["ss", "ch", "sh", "x", "z"].iter().any(|s| stem.ends_with(s)) {
                return stem.to_string();
            }
        }
        if lower.ends_with("ss") || lower.ends_with("us") {
            return lower;
        }
        if SINGULAR_S.contains(&lower.as_str()) {
            return lower;
        }
        if let Some(stem) = lower.strip_suffix('s') {
            return stem.to_string();
        }
        lower
    }

    fn plural_word(&self, word: &str) -> String {
        let lower = word.to_lowercase();

        if lower == "a" || lower == "an" {
            return "some".to_string();
        }
        if UNINFLECTED.contains(&lower.as_str()) {
            return lower;
        }
        if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
            return plural.to_string();
        }
        if let Some(stem) = lower.strip_suffix("man") {
            if !MAN_EXCEPTIONS.contains(&lower.as_str()) {
                return format!("{}men", stem);
            }
        }
        // Already plural
        if self.singular_word(&lower) != lower {
            return lower;
        }

        if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s))
            && !CHE_NOUNS.contains(&lower.as_str())
        {
            return format!("{}es", lower);
        }
        if let Some(stem) = lower.strip_suffix('y') {
            let after_consonant = stem
                .chars()
                .last()
                .map(|c| !"aeiou".contains(c))
                .unwrap_or(false);
            if after_consonant {
                return format!("{}ies", stem);
            }
        }
        if O_ES.contains(&lower.as_str()) {
            return format!("{}es", lower);
        }
        format!("{}s", lower)
    }
}

impl LabelInflector for EnglishInflector {
    fn to_singular(&self, phrase: &str) -> String {
        phrase
            .split(' ')
            .map(|word| {
                if word.is_empty() {
                    return String::new();
                }
                match_case(word, &self.singular_word(word))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_plural(&self, phrase: &str) -> String {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if words.is_empty() {
            return String::new();
        }

        // "cup on top of table" inflects within "cup", "cup of coffee" inflects "cup"
        let head = match relationship_start(&words) {
            Some(0) => words.len() - 1,
            start => {
                let object_end = start.unwrap_or(words.len());
                words[..object_end]
                    .iter()
                    .position(|w| w.eq_ignore_ascii_case("of"))
                    .filter(|&i| i > 0)
                    .map(|i| i - 1)
                    .unwrap_or(object_end - 1)
            }
        };

        words
            .iter()
            .enumerate()
            .map(|(i, word)| {
                let lower = word.to_lowercase();
                let inflect = lower == "a" || lower == "an" || i == head;
                if inflect && word.chars().any(char::is_alphanumeric) {
                    let stem = word.trim_end_matches(|c: char| !c.is_alphanumeric());
                    let punctuation = &word[stem.len()..];
                    format!("{}{}", match_case(stem, &self.plural_word(stem)), punctuation)
                } else {
                    word.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Index of the first word of the earliest relationship phrase
fn relationship_start(words: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = words
        .iter()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .collect();
    (0..normalized.len()).find(|&start| {
        RELATIONSHIP_PHRASES.iter().any(|phrase| {
            let parts: Vec<&str> = phrase.split(' ').collect();
            normalized.len() - start >= parts.len()
                && parts.iter().zip(&normalized[start..]).all(|(p, w)| *p == w.as_str())
        })
    })
}

fn match_case(original: &str, inflected: &str) -> String {
    let capitalized = original.chars().next().map(char::is_uppercase).unwrap_or(false);
    if !capitalized {
        return inflected.to_string();
    }
    let mut chars = inflected.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
