//! Tokenizer for a single shell input line.

use thiserror::Error;

/// A part of a word: literal text or a parameter to expand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    Literal(String),
    /// `$NAME` or `${NAME}`; holds the name.
    ParamSubst(String),
}

/// A token produced by [`split_into_tokens`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word, possibly assembled from several quoted and unquoted parts.
    Word(Vec<WordPart>),
    /// The background marker, `&`.
    Ampersand,
}

/// Errors found while tokenizing a line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexingError {
    /// A single or double quote was never closed.
    #[error("unterminated quote")]
    UnfinishedQuote,
    /// A `${` had no closing brace.
    #[error("unterminated ${{...}}")]
    UnfinishedParamSubst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

/// Character-at-a-time state machine behind [`split_into_tokens`].
struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current_word: Vec<WordPart>,
    buffer: String,
    /// A quote was opened in the current word, so it exists even if empty (`''`).
    quoted: bool,
}

impl LexingFSM {
    /// Creates a machine positioned at the start of `line`.
    ///
    /// # Arguments
    /// * `line` - The input line to tokenize.
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            current_word: Vec::new(),
            buffer: String::new(),
            quoted: false,
        }
    }

    /// Consumes the whole input and returns its tokens.
    ///
    /// Each character is handed to the handler for the current state; the
    /// last word is flushed once the input runs out.
    ///
    /// # Returns
    /// The tokens in input order, or a `LexingError` if a quote or `${` is
    /// still open at the end of the line.
    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start | LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
                return Err(LexingError::UnfinishedQuote);
            }
            _ => {}
        }

        self.finish_word(&mut out);
        Ok(out)
    }

    /// Returns the next character and advances past it.
    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    /// Handles one unquoted character.
    ///
    /// Blanks end the current word, `&` ends it and emits a background marker,
    /// quotes switch state, a backslash takes the next character literally and
    /// `$` starts a parameter.
    ///
    /// # Arguments
    /// * `ch` - The character just read.
    /// * `out` - Tokens completed so far.
    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' => {
                self.finish_word(out);
                self.state = LexingState::Start;
            }
            '&' => {
                self.finish_word(out);
                out.push(Token::Ampersand);
                self.state = LexingState::Start;
            }
            '\'' => {
                self.quoted = true;
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.quoted = true;
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' => {
                if let Some(next) = self.read_char() {
                    self.buffer.push(next);
                }
                self.state = LexingState::ReadingWord;
            }
            '$' => {
                self.read_param()?;
                self.state = LexingState::ReadingWord;
            }
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
        Ok(())
    }

    /// Inside `'...'` everything is literal up to the closing quote.
    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    /// Inside `"..."` only `$` and the escapes `\"`, `\\`, `\$` are special.
    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' if matches!(self.peek_char(), Some('"' | '\\' | '$')) => {
                if let Some(next) = self.read_char() {
                    self.buffer.push(next);
                }
            }
            '$' => self.read_param()?,
            c => self.buffer.push(c),
        }
        Ok(())
    }

    /// Reads the name after a `$`. A `$` not followed by a name stays literal.
    fn read_param(&mut self) -> Result<(), LexingError> {
        if self.peek_char() == Some('{') {
            self.read_char();
            let mut name = String::new();
            loop {
                match self.read_char() {
                    Some('}') => break,
                    Some(c) => name.push(c),
                    None => return Err(LexingError::UnfinishedParamSubst),
                }
            }
            self.push_param(name);
            return Ok(());
        }

        match self.peek_char() {
            Some(c) if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    self.read_char();
                }
                self.push_param(name);
            }
            _ => self.buffer.push('$'),
        }
        Ok(())
    }

    fn push_param(&mut self, name: String) {
        self.flush_literal();
        self.current_word.push(WordPart::ParamSubst(name));
    }

    /// Moves pending literal text into the current word.
    fn flush_literal(&mut self) {
        if !self.buffer.is_empty() {
            self.current_word
                .push(WordPart::Literal(std::mem::take(&mut self.buffer)));
        }
    }

    /// Ends the current word and pushes it onto `out`.
    ///
    /// A word made only of quotes (`''`) is still a word, holding an empty
    /// literal; an empty unquoted word produces nothing.
    fn finish_word(&mut self, out: &mut Vec<Token>) {
        self.flush_literal();
        if self.current_word.is_empty() && self.quoted {
            self.current_word.push(WordPart::Literal(String::new()));
        }
        if !self.current_word.is_empty() {
            out.push(Token::Word(std::mem::take(&mut self.current_word)));
        }
        self.quoted = false;
    }
}

/// Split `line` into words and background markers.
///
/// # Arguments
/// * `line` - A single input line, without its newline.
///
/// # Returns
/// The tokens of the line, or the first `LexingError` found.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    LexingFSM::new(line).make_tokens()
}
