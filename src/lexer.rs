//! Lexical analysis (tokenization) for the session's small command language.

/// A part of a word: literal text or a parameter substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Literal text that requires no further processing.
    Literal(String),
    /// Parameter substitution, `$NAME`, `${NAME}` or `$?`. Contains the name.
    ParamSubst(String),
}

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word token, which may be composed of multiple parts. Empty for `""`.
    Word(Vec<WordPart>),
    /// The pipe operator, `|`.
    PipeOp,
}

/// Errors that can occur during the lexical analysis process.
///
/// All of them describe input that stops in the middle of a construct, so an
/// interactive reader can ask for a continuation line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    UnfinishedQuote,
    /// A closing brace for parameter substitution `${...}` was not found.
    UnfinishedParamSubst,
    /// The input ends with a backslash.
    TrailingEscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current_word: Vec<WordPart>,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            current_word: Vec::new(),
            buffer: String::new(),
        }
    }

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
            LexingState::ReadingWord => self.finish_word(&mut out),
            LexingState::Start => {}
        }

        Ok(out)
    }

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

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' | '\n' => {
                if self.state == LexingState::ReadingWord {
                    self.finish_word(out);
                }
            }
            '|' => {
                if self.state == LexingState::ReadingWord {
                    self.finish_word(out);
                }
                out.push(Token::PipeOp);
            }
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '\\' => {
                let escaped = self.read_char().ok_or(LexingError::TrailingEscape)?;
                self.buffer.push(escaped);
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

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => match self.read_char() {
                Some(c @ ('"' | '\\' | '$')) => self.buffer.push(c),
                Some(c) => {
                    self.buffer.push('\\');
                    self.buffer.push(c);
                }
                None => return Err(LexingError::UnfinishedQuote),
            },
            '$' => self.read_param()?,
            c => self.buffer.push(c),
        }
        Ok(())
    }

    /// Reads the parameter after a `$`. A `$` not followed by a name stays literal.
    fn read_param(&mut self) -> Result<(), LexingError> {
        match self.peek_char() {
            Some('{') => {
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
            }
            Some('?') => {
                self.read_char();
                self.push_param("?".to_string());
            }
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

    fn flush_literal(&mut self) {
        if !self.buffer.is_empty() {
            self.current_word
                .push(WordPart::Literal(std::mem::take(&mut self.buffer)));
        }
    }

    fn finish_word(&mut self, out: &mut Vec<Token>) {
        self.flush_literal();
        out.push(Token::Word(std::mem::take(&mut self.current_word)));
        self.state = LexingState::Start;
    }
}

/// Performs lexical analysis on one (possibly multi-line) entry.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    LexingFSM::new(line).make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> WordPart {
        WordPart::Literal(s.to_string())
    }

    fn param(s: &str) -> WordPart {
        WordPart::ParamSubst(s.to_string())
    }

    #[test]
    fn test_simple_words_and_pipe() {
        let tokens = split_into_tokens("echo  hi | wc").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word(vec![lit("echo")]),
                Token::Word(vec![lit("hi")]),
                Token::PipeOp,
                Token::Word(vec![lit("wc")]),
            ]
        );
    }

    #[test]
    fn test_quotes_join_into_one_word() {
        let tokens = split_into_tokens(r#"a'b c'"d e" "" "#).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Word(vec![lit("ab cd e")]), Token::Word(vec![])]
        );
    }

    #[test]
    fn test_param_forms() {
        let tokens = split_into_tokens(r#"x$HOME/y "${A}-$?" '$B' $ \$C"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word(vec![lit("x"), param("HOME"), lit("/y")]),
                Token::Word(vec![param("A"), lit("-"), param("?")]),
                Token::Word(vec![lit("$B")]),
                Token::Word(vec![lit("$")]),
                Token::Word(vec![lit("$C")]),
            ]
        );
    }

    #[test]
    fn test_incomplete_input() {
        assert_eq!(split_into_tokens("echo 'abc"), Err(LexingError::UnfinishedQuote));
        assert_eq!(split_into_tokens("echo \"abc"), Err(LexingError::UnfinishedQuote));
        assert_eq!(split_into_tokens("echo ${abc"), Err(LexingError::UnfinishedParamSubst));
        assert_eq!(split_into_tokens("echo abc\\"), Err(LexingError::TrailingEscape));
    }

    #[test]
    fn test_newline_inside_quotes_is_kept() {
        let tokens = split_into_tokens("echo 'a\nb'").unwrap();
        assert_eq!(tokens[1], Token::Word(vec![lit("a\nb")]));
    }
}
