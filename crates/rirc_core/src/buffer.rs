//! Channel/buffer model (`spec.md` section 4.3): scrollback, input history, channel modes and
//! nick set, activity tracking, and ping detection.
//!
//! Grounded on the teacher's `libtiny_tui::msg_area` (scrollback ring over `VecDeque`) and
//! `libtiny_tui::input_area`/`input_line` (history + cursor), generalized from TUI widgets that
//! draw themselves into plain data the session engine can mutate without a terminal.

use std::collections::BTreeSet;

use rirc_common::limits::{
    truncate_to, CHANSIZE, MAX_INPUT, NICKSIZE, SCROLLBACK_BUFFER, SCROLLBACK_INPUT,
};
use rirc_common::{ChanName, OrderedSet, Ring};

/// What kind of buffer a [`Channel`] represents. Every server has exactly one `Server` buffer
/// (`spec.md` section 3 invariant); the rest are created on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferType {
    Server,
    Channel,
    Private,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Default,
    Active,
    Pinged,
}

/// Rendering category of a single scrollback line, independent of the channel's overall
/// [`Activity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Default,
    Pinged,
    Chat,
}

/// A single line appended to a channel's scrollback.
#[derive(Debug, Clone)]
pub struct BufferLine {
    pub timestamp: u64,
    pub sender: String,
    pub text: String,
    /// Rendered row count at the channel's current terminal width. Recomputed lazily on resize.
    pub rows: u16,
    pub kind: LineKind,
}

impl BufferLine {
    pub fn new(timestamp: u64, sender: impl Into<String>, text: impl Into<String>, kind: LineKind) -> Self {
        let sender = truncate_to(&sender.into(), NICKSIZE);
        BufferLine {
            timestamp,
            sender,
            text: text.into(),
            rows: 1,
            kind,
        }
    }

    fn recompute_rows(&mut self, width: usize) {
        let width = width.max(1);
        let len = self.text.chars().count().max(1);
        self.rows = len.div_ceil(width).max(1) as u16;
    }
}

/// Pseudo-senders used for system/status lines, matching the reference's `"--"`, `">>"`,
/// `"-!!-"`, `"ERROR"` conventions.
pub mod pseudo_sender {
    pub const INFO: &str = "--";
    pub const JOIN_PART: &str = ">>";
    pub const ERROR: &str = "-!!-";
    pub const SERVER_ERROR: &str = "ERROR";
}

/// Input history ring plus the line currently being composed.
///
/// `window` is `Some(i)` while the user is browsing history entry `i` read-only; the first edit
/// clones that entry into `head` (copy-on-edit) and clears `window`, matching `spec.md`'s
/// "inserting a new composing line evicts the oldest when the ring is full. Navigation cycles
/// history without mutating historical entries until the user edits one."
#[derive(Debug)]
pub struct Input {
    history: Ring<String>,
    head: Vec<char>,
    cursor: usize,
    window: Option<usize>,
}

impl Default for Input {
    fn default() -> Self {
        Input {
            history: Ring::new(SCROLLBACK_INPUT),
            head: Vec::new(),
            cursor: 0,
            window: None,
        }
    }
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// The line currently shown to the user: the composing line, or a read-only history entry
    /// while browsing.
    pub fn current(&self) -> String {
        match self.window {
            Some(idx) => self.history.get(idx).cloned().unwrap_or_default(),
            None => self.head.iter().collect(),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn char_count(&self) -> usize {
        match self.window {
            Some(idx) => self.history.get(idx).map_or(0, |s| s.chars().count()),
            None => self.head.len(),
        }
    }

    /// Copies a historical entry into `head` on first edit while browsing (copy-on-edit).
    fn materialize_for_edit(&mut self) {
        if let Some(idx) = self.window.take() {
            self.head = self
                .history
                .get(idx)
                .map(|s| s.chars().collect())
                .unwrap_or_default();
        }
    }

    pub fn insert_char(&mut self, c: char) {
        self.materialize_for_edit();
        if self.head.len() >= MAX_INPUT {
            return;
        }
        self.head.insert(self.cursor, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        self.materialize_for_edit();
        if self.cursor > 0 {
            self.cursor -= 1;
            self.head.remove(self.cursor);
        }
    }

    pub fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.char_count() {
            self.cursor += 1;
        }
    }

    /// Moves the browsing window one entry toward older history.
    pub fn older(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.window {
            None => self.history.len() - 1,
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.window = Some(next);
        self.cursor = self.history.get(next).map_or(0, |s| s.chars().count());
    }

    /// Moves the browsing window one entry toward newer history, falling back to the live
    /// composing line once past the newest entry.
    pub fn newer(&mut self) {
        match self.window {
            None => {}
            Some(i) if i + 1 >= self.history.len() => {
                self.window = None;
                self.cursor = self.head.len();
            }
            Some(i) => {
                self.window = Some(i + 1);
                self.cursor = self.history.get(i + 1).map_or(0, |s| s.chars().count());
            }
        }
    }

    /// Commits the currently displayed line as a new history entry (evicting the oldest if the
    /// ring is full) and resets to an empty composing line. Returns the submitted text.
    pub fn submit(&mut self) -> String {
        let line = self.current();
        if !line.is_empty() {
            self.history.push(line.clone());
        }
        self.head.clear();
        self.cursor = 0;
        self.window = None;
        line
    }
}

/// Letter-boundary word match used by ping detection: `nick` occurs in `text` with no adjacent
/// alphanumeric character on either side.
pub fn contains_word(text: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    let bytes = text.as_bytes();
    let wlen = word.len();
    let mut start = 0;
    while let Some(rel) = text[start..].find(word) {
        let idx = start + rel;
        let before_ok = idx == 0 || !(bytes[idx - 1] as char).is_alphanumeric();
        let after_idx = idx + wlen;
        let after_ok = after_idx >= bytes.len() || !(bytes[after_idx] as char).is_alphanumeric();
        if before_ok && after_ok {
            return true;
        }
        start = idx + 1;
        if start >= text.len() {
            break;
        }
    }
    false
}

/// A channel or buffer: a server tab, a joined channel, a private-message tab, or a misc tab.
pub struct Channel {
    pub name: ChanName,
    pub buffer_type: BufferType,
    pub modes: BTreeSet<char>,
    pub parted: bool,
    pub activity: Activity,
    pub scrollback: Ring<BufferLine>,
    pub input: Input,
    pub nicks: OrderedSet<String>,
    width: usize,
    resized: bool,
    nick_pad: usize,
    /// Monotonic count of lines ever pushed, surviving ring eviction and disconnect resets. The
    /// "lines appended to a buffer" event `spec.md` section 6 describes the core as producing,
    /// for a front end that has no other way to notice new scrollback entries between ticks.
    pub appended: u64,
}

impl Channel {
    pub fn new(name: ChanName, buffer_type: BufferType) -> Self {
        Channel {
            name,
            buffer_type,
            modes: BTreeSet::new(),
            parted: false,
            activity: Activity::Default,
            scrollback: Ring::new(SCROLLBACK_BUFFER),
            input: Input::new(),
            nicks: OrderedSet::new(),
            width: 80,
            resized: false,
            nick_pad: 0,
            appended: 0,
        }
    }

    pub fn nick_count(&self) -> usize {
        self.nicks.len()
    }

    /// Appends a line to scrollback, recomputing its row count and the nick-pad width.
    pub fn push_line(&mut self, mut line: BufferLine) {
        self.nick_pad = self.nick_pad.max(line.sender.chars().count());
        line.recompute_rows(self.width);
        self.scrollback.push(line);
        self.recompute_nick_pad_on_evict();
        self.appended += 1;
    }

    fn recompute_nick_pad_on_evict(&mut self) {
        // Cheap upper bound recompute: only needed when eviction may have dropped the widest
        // sender. Scanning the (bounded, <=200) remaining lines is O(capacity), not O(history).
        self.nick_pad = self
            .scrollback
            .iter()
            .map(|l| l.sender.chars().count())
            .max()
            .unwrap_or(0);
    }

    pub fn nick_pad(&self) -> usize {
        self.nick_pad
    }

    /// Marks the channel dirty for a terminal resize; row counts are lazily recomputed on the
    /// next draw rather than eagerly here (`spec.md` section 4.3).
    pub fn mark_resized(&mut self, width: usize) {
        self.width = width;
        self.resized = true;
    }

    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    pub fn recompute_row_counts(&mut self) {
        let width = self.width;
        for line in self.scrollback.iter_mut() {
            line.recompute_rows(width);
        }
        self.resized = false;
    }

    /// Detects whether `text` pings `local_nick` (letter-boundary match), marks the channel and
    /// returns the [`LineKind`] the new line should be appended with, plus whether a BEL should
    /// fire.
    pub fn detect_ping(&mut self, text: &str, local_nick: &str) -> (LineKind, bool) {
        if contains_word(text, local_nick) {
            self.activity = Activity::Pinged;
            (LineKind::Pinged, true)
        } else {
            if self.activity == Activity::Default {
                self.activity = Activity::Active;
            }
            (LineKind::Chat, false)
        }
    }

    /// Applies a `+`/`-` mode-letter run (e.g. `+nt-k`) to the channel's mode set.
    pub fn apply_modes(&mut self, modes: &str) {
        let mut adding = true;
        for c in modes.chars() {
            match c {
                '+' => adding = true,
                '-' => adding = false,
                letter => {
                    if adding {
                        self.modes.insert(letter);
                    } else {
                        self.modes.remove(&letter);
                    }
                }
            }
        }
    }

    /// Entering Disconnected from Connected: clears nick state but preserves scrollback.
    pub fn reset_on_disconnect(&mut self) {
        self.nicks.clear();
        self.parted = false;
    }
}

/// Truncates an incoming nick to the bounded nick size, matching `spec.md`'s "bounded" nick.
pub fn bound_nick(nick: &str) -> String {
    truncate_to(nick, NICKSIZE)
}

pub fn bound_chan_str(name: &str) -> String {
    truncate_to(name, CHANSIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrollback_never_exceeds_200() {
        let mut chan = Channel::new(ChanName::new("#c".to_owned()), BufferType::Channel);
        for i in 0..500 {
            chan.push_line(BufferLine::new(0, "x", format!("line {i}"), LineKind::Default));
        }
        assert_eq!(chan.scrollback.len(), 200);
        assert_eq!(chan.scrollback.front().unwrap().text, "line 300");
    }

    #[test]
    fn nick_count_matches_nick_set() {
        let mut chan = Channel::new(ChanName::new("#c".to_owned()), BufferType::Channel);
        chan.nicks.insert("alice".to_owned());
        chan.nicks.insert("bob".to_owned());
        assert_eq!(chan.nick_count(), chan.nicks.len());
        assert_eq!(chan.nick_count(), 2);
    }

    #[test]
    fn ping_detection_requires_word_boundary() {
        assert!(contains_word("hey bob, how are you", "bob"));
        assert!(!contains_word("bobby isn't bob", "bobby2"));
        assert!(!contains_word("thebobwhorode", "bob"));
        assert!(contains_word("bob: hi", "bob"));
    }

    #[test]
    fn input_copy_on_edit() {
        let mut input = Input::new();
        input.insert_char('a');
        input.insert_char('b');
        assert_eq!(input.submit(), "ab");

        input.insert_char('c');
        assert_eq!(input.submit(), "c");

        // Browse to oldest history entry ("ab"), then edit -- must not mutate history.
        input.older();
        input.older();
        assert_eq!(input.current(), "ab");
        input.insert_char('!');
        assert_eq!(input.current(), "ab!");

        input.older(); // still editing head; browsing only moves window when not mid-edit
    }

    #[test]
    fn input_history_evicts_oldest_past_15() {
        let mut input = Input::new();
        for i in 0..20 {
            input.insert_char(char::from_digit(i % 10, 10).unwrap());
            input.submit();
        }
        input.older();
        for _ in 0..SCROLLBACK_INPUT {
            input.older();
        }
        // Oldest remaining entry corresponds to submission #5 (20 - 15), i.e. char '5'.
        assert_eq!(input.current(), "5");
    }

    #[test]
    fn mode_apply_plus_minus_runs() {
        let mut chan = Channel::new(ChanName::new("#c".to_owned()), BufferType::Channel);
        chan.apply_modes("+ntk-s");
        assert!(chan.modes.contains(&'n'));
        assert!(chan.modes.contains(&'t'));
        assert!(chan.modes.contains(&'k'));
        assert!(!chan.modes.contains(&'s'));
        chan.apply_modes("-n");
        assert!(!chan.modes.contains(&'n'));
    }
}
