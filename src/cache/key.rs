//! Cache key derivation.
//!
//! Keys are content addressed: the request is normalized, hashed with
//! SHA-256 and prefixed with a versioned namespace,
//! `ai:<operation>:v<version>:<hex digest>`. Bumping a version constant
//! makes every key of that operation new, so a prompt or schema change
//! never serves stale entries.

use std::fmt;

use sha2::{Digest, Sha256};

/// Operation name of field extraction keys.
pub const SEARCH_FIELD: &str = "searchField";
/// Current version of field extraction keys.
pub const SEARCH_FIELD_VERSION: u32 = 1;
/// Operation name of itinerary keys.
pub const CREATE_PLAN: &str = "createPlan";
/// Current version of itinerary keys.
pub const CREATE_PLAN_VERSION: u32 = 2;

/// Separator between fields of a structured request.
const FIELD_SEPARATOR: char = '|';
const ESCAPE: char = '\\';

/// A derived AI cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: &'static str,
    version: u32,
    digest: String,
}

impl CacheKey {
    /// Hash `content` under the given operation namespace.
    pub fn derive(operation: &'static str, version: u32, content: &str) -> Self {
        Self {
            operation,
            version,
            digest: sha256_hex(content),
        }
    }

    /// Key for a free-text field extraction prompt.
    pub fn search_field(prompt: &str) -> Self {
        Self::derive(SEARCH_FIELD, SEARCH_FIELD_VERSION, &normalize(prompt))
    }

    /// Key for a structured itinerary request.
    pub fn create_plan(fields: &PlanKeyFields<'_>) -> Self {
        Self::derive(CREATE_PLAN, CREATE_PLAN_VERSION, &fields.composite())
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Lowercase hex SHA-256 of the normalized content.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ai:{}:v{}:{}", self.operation, self.version, self.digest)
    }
}

/// The parts of an itinerary request that identify its response.
#[derive(Debug, Clone, Copy)]
pub struct PlanKeyFields<'a> {
    pub origin: &'a str,
    pub destination: &'a str,
    pub budget: &'a str,
    pub members: u32,
    pub days: u32,
    pub prompt: &'a str,
}

impl PlanKeyFields<'_> {
    /// Normalized fields joined with `|`.
    ///
    /// Separator and escape characters inside a field are escaped, so no
    /// choice of field contents can shift a field boundary.
    fn composite(&self) -> String {
        [
            escape_field(&normalize(self.origin)),
            escape_field(&normalize(self.destination)),
            escape_field(&normalize(self.budget)),
            self.members.to_string(),
            self.days.to_string(),
            escape_field(&normalize(self.prompt)),
        ]
        .join(&FIELD_SEPARATOR.to_string())
    }
}

/// Canonicalize text: trim, collapse whitespace runs to one space, lowercase.
///
/// Total: every input, including the empty string, has a normal form.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        if c == FIELD_SEPARATOR || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan<'a>(origin: &'a str, destination: &'a str, prompt: &'a str) -> PlanKeyFields<'a> {
        PlanKeyFields {
            origin,
            destination,
            budget: "mid",
            members: 2,
            days: 3,
            prompt,
        }
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize("  Dhaka\t to\n\nCOX'S   Bazar "), "dhaka to cox's bazar");
    }

    #[test]
    fn normalize_is_total() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \t\n "), "");
    }

    #[test]
    fn known_digest_of_empty_prompt() {
        let key = CacheKey::search_field("   ");
        assert_eq!(
            key.digest(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            key.to_string(),
            "ai:searchField:v1:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn plan_composite_matches_pipe_join() {
        let fields = plan(" Dhaka ", "Cox's  Bazar", "Beach   time");
        assert_eq!(fields.composite(), "dhaka|cox's bazar|mid|2|3|beach time");
    }

    #[test]
    fn separator_inside_field_cannot_shift_boundaries() {
        let a = plan("a|b", "c", "p");
        let b = plan("a", "b|c", "p");
        assert_ne!(a.composite(), b.composite());
        assert_ne!(CacheKey::create_plan(&a), CacheKey::create_plan(&b));
    }

    #[test]
    fn escape_character_is_escaped_too() {
        let a = plan("a\\", "|c", "p");
        let b = plan("a", "\\|c", "p");
        assert_ne!(a.composite(), b.composite());
    }

    #[test]
    fn plan_key_prefix() {
        let key = CacheKey::create_plan(&plan("x", "y", "z"));
        assert!(key.to_string().starts_with("ai:createPlan:v2:"));
        assert_eq!(key.digest().len(), 64);
    }
}
