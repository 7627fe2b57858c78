//! TargetAddress - the structured name of an activation target.
//!
//! String form:
//!
//! ```text
//! [(<state_name>)][<network_id>:]<relative_path>[@<resolver_name>]
//! ```
//!
//! | Input                                        | state     | network_id               | path               |
//! |----------------------------------------------|-----------|--------------------------|--------------------|
//! | `script/hello.lua`                           |           |                          | `script/hello.lua` |
//! | `(worker1)script/hello.lua`                  | `worker1` |                          | `script/hello.lua` |
//! | `(gl)script/hello.lua`                       |           |                          | `script/hello.lua` |
//! | `user001@paraengine.com:script/hello.lua`    |           | `user001@paraengine.com` | `script/hello.lua` |
//!
//! Parsing never fails. Malformed input is still valid input, it just fills
//! fewer fields.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Path used for routing when an address carries no relative path.
pub const DEFAULT_RELATIVE_PATH: &str = "script/empty.lua";

/// State name that means "the current/default state".
pub const LOCAL_STATE_ALIAS: &str = "gl";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetAddress {
    /// Owning runtime state. Empty means the sender's own state (or main).
    pub state_name: String,
    /// Remote node identity. Empty means this process.
    pub network_id: String,
    /// Slash-normalized handler path.
    pub relative_path: String,
    /// Resolution service for `network_id`. Empty means inherit.
    pub resolver_name: String,
}

impl TargetAddress {
    /// Local address for `path` in the default state.
    pub fn local(path: &str) -> Self {
        let mut address = Self::default();
        address.set_relative_path(path);
        address
    }

    /// Single left-to-right scan of `text`.
    pub fn parse(text: &str) -> Self {
        let mut address = Self::default();
        if text.is_empty() {
            return address;
        }

        let mut rest = text;
        if let Some(after_paren) = rest.strip_prefix('(') {
            let (name, remainder) = match after_paren.find(')') {
                Some(end) => (&after_paren[..end], &after_paren[end + 1..]),
                None => (after_paren, ""),
            };
            if name != LOCAL_STATE_ALIAS {
                address.state_name = name.to_string();
            }
            rest = remainder;
        }

        if let Some(colon) = rest.find(':') {
            address.network_id = rest[..colon].to_string();
            rest = &rest[colon + 1..];
        }

        match rest.find('@') {
            Some(at) => {
                address.set_relative_path(&rest[..at]);
                address.resolver_name = rest[at + 1..].to_string();
            }
            None => address.set_relative_path(rest),
        }

        address
    }

    /// Inverse of [`TargetAddress::parse`]. Empty fields and their delimiters are omitted.
    pub fn format(&self) -> String {
        let mut out = String::with_capacity(
            self.state_name.len()
                + self.network_id.len()
                + self.relative_path.len()
                + self.resolver_name.len()
                + 4,
        );
        if !self.state_name.is_empty() {
            out.push('(');
            out.push_str(&self.state_name);
            out.push(')');
        }
        if !self.network_id.is_empty() {
            out.push_str(&self.network_id);
            out.push(':');
        }
        out.push_str(&self.relative_path);
        if !self.resolver_name.is_empty() {
            out.push('@');
            out.push_str(&self.resolver_name);
        }
        out
    }

    /// Assigns the path, turning backslashes into forward slashes.
    pub fn set_relative_path(&mut self, path: &str) {
        self.relative_path = path.replace('\\', "/");
    }

    pub fn with_state(mut self, name: impl Into<String>) -> Self {
        self.state_name = name.into();
        self
    }

    pub fn with_network_id(mut self, network_id: impl Into<String>) -> Self {
        self.network_id = network_id.into();
        self
    }

    pub fn with_resolver(mut self, resolver_name: impl Into<String>) -> Self {
        self.resolver_name = resolver_name.into();
        self
    }

    pub fn is_remote(&self) -> bool {
        !self.network_id.is_empty()
    }

    /// True when no explicit state is named (empty or the `gl` alias).
    pub fn targets_default_state(&self) -> bool {
        self.state_name.is_empty() || self.state_name == LOCAL_STATE_ALIAS
    }

    /// The path handlers are looked up by; falls back to [`DEFAULT_RELATIVE_PATH`].
    pub fn effective_path(&self) -> &str {
        if self.relative_path.is_empty() {
            DEFAULT_RELATIVE_PATH
        } else {
            &self.relative_path
        }
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for TargetAddress {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for TargetAddress {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rstest::rstest;

    fn addr(state: &str, nid: &str, path: &str, resolver: &str) -> TargetAddress {
        TargetAddress {
            state_name: state.into(),
            network_id: nid.into(),
            relative_path: path.into(),
            resolver_name: resolver.into(),
        }
    }

    #[rstest]
    #[case("script/hello.lua", addr("", "", "script/hello.lua", ""))]
    #[case("(worker1)script/hello.lua", addr("worker1", "", "script/hello.lua", ""))]
    #[case("(gl)script/hello.lua", addr("", "", "script/hello.lua", ""))]
    #[case(
        "user001@paraengine.com:script/hello.lua",
        addr("", "user001@paraengine.com", "script/hello.lua", "")
    )]
    #[case(
        "(world1)server001@paraengine.com:script/hello.lua",
        addr("world1", "server001@paraengine.com", "script/hello.lua", "")
    )]
    #[case("node:script/a.lua@dir", addr("", "node", "script/a.lua", "dir"))]
    #[case("script/a.lua@dir", addr("", "", "script/a.lua", "dir"))]
    #[case("script\\sub\\a.lua", addr("", "", "script/sub/a.lua", ""))]
    #[case("(w)n:script\\a.lua", addr("w", "n", "script/a.lua", ""))]
    #[case(":script/a.lua", addr("", "", "script/a.lua", ""))]
    #[case("(worker1)", addr("worker1", "", "", ""))]
    #[case("(unterminated", addr("unterminated", "", "", ""))]
    #[case("()script/a.lua", addr("", "", "script/a.lua", ""))]
    #[case("(glx)a.lua", addr("glx", "", "a.lua", ""))]
    fn parses_known_forms(#[case] input: &str, #[case] expected: TargetAddress) {
        assert_eq!(TargetAddress::parse(input), expected);
    }

    #[test]
    fn empty_input_is_the_local_default() {
        let parsed = TargetAddress::parse("");
        assert_eq!(parsed, TargetAddress::default());
        assert!(parsed.state_name.is_empty());
        assert!(parsed.network_id.is_empty());
        assert!(parsed.relative_path.is_empty());
        assert!(parsed.resolver_name.is_empty());
        assert_eq!(parsed.effective_path(), DEFAULT_RELATIVE_PATH);
    }

    #[rstest]
    #[case(addr("", "", "script/hello.lua", ""), "script/hello.lua")]
    #[case(addr("w1", "", "a.lua", ""), "(w1)a.lua")]
    #[case(addr("", "nid", "a.lua", ""), "nid:a.lua")]
    #[case(addr("w1", "nid", "a.lua", "dns"), "(w1)nid:a.lua@dns")]
    #[case(addr("", "", "a.lua", "dns"), "a.lua@dns")]
    fn formats_without_empty_delimiters(#[case] address: TargetAddress, #[case] expected: &str) {
        assert_eq!(address.format(), expected);
        assert_eq!(address.to_string(), expected);
    }

    #[test]
    fn gl_state_canonicalizes_on_reparse() {
        let original = addr("gl", "", "a.lua", "");
        assert_eq!(original.format(), "(gl)a.lua");
        let reparsed = TargetAddress::parse(&original.format());
        assert_eq!(reparsed, addr("", "", "a.lua", ""));
        assert_eq!(TargetAddress::parse(&reparsed.format()), reparsed);
    }

    fn alphabetic(rng: &mut impl Rng) -> String {
        let len = rng.gen_range(1..12);
        (0..len)
            .map(|_| {
                let c = char::from(rng.gen_range(b'a'..=b'z'));
                if rng.gen_bool(0.5) { c.to_ascii_uppercase() } else { c }
            })
            .collect()
    }

    #[test]
    fn random_addresses_round_trip() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let mut original = TargetAddress::local(&alphabetic(&mut rng));
            if rng.gen_bool(0.5) {
                original.state_name = alphabetic(&mut rng);
            }
            if rng.gen_bool(0.5) {
                original.network_id = alphabetic(&mut rng);
            }
            if rng.gen_bool(0.5) {
                original.resolver_name = alphabetic(&mut rng);
            }

            let reparsed = TargetAddress::parse(&original.format());
            if original.state_name == LOCAL_STATE_ALIAS {
                original.state_name.clear();
            }
            assert_eq!(reparsed, original, "text: {}", original.format());
        }
    }

    #[test]
    fn builder_setters_and_queries() {
        let address = TargetAddress::local("script\\x.lua")
            .with_state("w1")
            .with_network_id("peer")
            .with_resolver("dir");
        assert_eq!(address.relative_path, "script/x.lua");
        assert!(address.is_remote());
        assert!(!address.targets_default_state());
        assert_eq!(address.format(), "(w1)peer:script/x.lua@dir");

        let parsed: TargetAddress = "(gl)x.lua".parse().unwrap();
        assert!(parsed.targets_default_state());
        assert!(!parsed.is_remote());
    }
}
