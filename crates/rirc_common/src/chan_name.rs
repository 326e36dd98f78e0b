//! Channel names per RFC 2812 section 1.3. Channel names are case-insensitive, so `ChanName`
//! defines `Eq`/`Hash`/`Ord` that fold case the way servers do, while `display()` keeps the
//! original casing for rendering.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use crate::limits::{truncate_to, CHANSIZE};

#[derive(Debug, Clone)]
pub struct ChanName(String);

#[derive(Debug)]
pub struct ChanNameRef(str);

impl Deref for ChanName {
    type Target = ChanNameRef;

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

impl AsRef<ChanNameRef> for ChanName {
    fn as_ref(&self) -> &ChanNameRef {
        ChanNameRef::new(self.0.as_ref())
    }
}

impl Borrow<ChanNameRef> for ChanName {
    fn borrow(&self) -> &ChanNameRef {
        self.as_ref()
    }
}

// RFC 2812 section 2.2: '[', ']', '\\', '~' case-fold to '{', '}', '|', '^'.
fn to_lower(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        _ => c.to_ascii_lowercase(),
    }
}

impl ChanName {
    pub fn new(name: String) -> Self {
        ChanName(truncate_to(&name, CHANSIZE))
    }

    pub fn display(&self) -> &str {
        &self.0
    }

    /// First character of the name, used as the channel "type" flag (`#`, `&`, ...).
    pub fn type_char(&self) -> char {
        self.0.chars().next().unwrap_or('\0')
    }
}

impl ChanNameRef {
    pub fn new(name: &str) -> &Self {
        unsafe { &*(name as *const str as *const ChanNameRef) }
    }

    pub fn display(&self) -> &str {
        &self.0
    }

    pub fn normalized(&self) -> String {
        self.0.chars().map(to_lower).collect()
    }

    pub fn type_char(&self) -> char {
        self.0.chars().next().unwrap_or('\0')
    }
}

impl ToOwned for ChanNameRef {
    type Owned = ChanName;

    fn to_owned(&self) -> Self::Owned {
        ChanName(self.0.to_owned())
    }
}

impl PartialEq for ChanName {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref().eq(other.as_ref())
    }
}
impl Eq for ChanName {}

impl PartialEq<ChanNameRef> for ChanName {
    fn eq(&self, other: &ChanNameRef) -> bool {
        self.as_ref().eq(other)
    }
}

impl Hash for ChanName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ref().hash(state)
    }
}

impl PartialEq for ChanNameRef {
    fn eq(&self, other: &Self) -> bool {
        if self.0.as_bytes().len() != other.0.as_bytes().len() {
            return false;
        }
        self.0
            .chars()
            .map(to_lower)
            .zip(other.0.chars().map(to_lower))
            .all(|(a, b)| a == b)
    }
}
impl Eq for ChanNameRef {}

impl PartialEq<ChanName> for ChanNameRef {
    fn eq(&self, other: &ChanName) -> bool {
        self.eq(other.as_ref())
    }
}

impl Hash for ChanNameRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for c in self.0.chars() {
            to_lower(c).hash(state);
        }
    }
}

impl PartialOrd for ChanNameRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChanNameRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized().cmp(&other.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_eq() {
        let a = ChanName::new("#Rust".to_owned());
        let b = ChanName::new("#rust".to_owned());
        assert_eq!(a, b);
    }

    #[test]
    fn bracket_folding() {
        let a = ChanNameRef::new("#a[b]");
        let b = ChanNameRef::new("#a{b}");
        assert_eq!(a, b);
    }

    #[test]
    fn truncates_long_names() {
        let long = "#".to_string() + &"x".repeat(CHANSIZE + 50);
        let chan = ChanName::new(long);
        assert_eq!(chan.display().len(), CHANSIZE);
    }
}
