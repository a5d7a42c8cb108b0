/// Lexical context of the byte under the scanner.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backticked,
    Bracketed,
    LineComment,
    BlockComment,
}

/// What the scanner saw at one byte offset.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum Token {
    /// A byte of SQL text outside literals, identifiers and comments.
    Code(usize, u8),
    /// A byte that belongs to a quoted literal or identifier, quotes included.
    Quoted(usize),
}

/// Walks SQL text and classifies bytes, skipping comments entirely.
pub(super) struct Scanner<'a> {
    bytes: &'a [u8],
    idx: usize,
    state: State,
}

impl<'a> Scanner<'a> {
    pub(super) fn new(sql: &'a str) -> Self {
        Self {
            bytes: sql.as_bytes(),
            idx: 0,
            state: State::Normal,
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        use super::parsers::{is_block_comment_end, is_block_comment_start, is_line_comment_start};

        while self.idx < self.bytes.len() {
            let idx = self.idx;
            let b = self.bytes[idx];
            self.idx += 1;
            match self.state {
                State::Normal => {
                    let opened = match b {
                        b'\'' => Some(State::SingleQuoted),
                        b'"' => Some(State::DoubleQuoted),
                        b'`' => Some(State::Backticked),
                        b'[' => Some(State::Bracketed),
                        _ => None,
                    };
                    if let Some(state) = opened {
                        self.state = state;
                        return Some(Token::Quoted(idx));
                    }
                    if is_line_comment_start(self.bytes, idx) {
                        self.state = State::LineComment;
                        self.idx += 1;
                        continue;
                    }
                    if is_block_comment_start(self.bytes, idx) {
                        self.state = State::BlockComment;
                        self.idx += 1;
                        continue;
                    }
                    return Some(Token::Code(idx, b));
                }
                State::SingleQuoted | State::DoubleQuoted | State::Backticked => {
                    let close = match self.state {
                        State::SingleQuoted => b'\'',
                        State::DoubleQuoted => b'"',
                        _ => b'`',
                    };
                    if b == close {
                        if self.bytes.get(self.idx) == Some(&close) {
                            self.idx += 1; // doubled quote is an escape
                        } else {
                            self.state = State::Normal;
                        }
                    }
                    return Some(Token::Quoted(idx));
                }
                State::Bracketed => {
                    if b == b']' {
                        self.state = State::Normal;
                    }
                    return Some(Token::Quoted(idx));
                }
                State::LineComment => {
                    if b == b'\n' {
                        self.state = State::Normal;
                    }
                }
                State::BlockComment => {
                    if is_block_comment_end(self.bytes, idx) {
                        self.state = State::Normal;
                        self.idx += 1;
                    }
                }
            }
        }
        None
    }
}

pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}
