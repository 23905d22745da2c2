//! Lexical analysis for a command line: words (with quote grouping) and the
//! pipe, redirection and background operators.

use thiserror::Error;

/// A token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word: command name, argument, or redirection target.
    Word(String),
    /// The pipe operator, `|`.
    Pipe,
    /// Input redirection, `<`.
    RedirectIn,
    /// Output redirection, `>`.
    RedirectOut,
    /// Appending output redirection, `>>`.
    RedirectAppend,
    /// Background marker, `&`.
    Background,
}

/// Errors that can occur during tokenization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated quote")]
    UnterminatedQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Word,
    SingleQuote,
    DoubleQuote,
}

struct Lexer {
    input: Vec<char>,
    pos: usize,
    state: State,
    buffer: String,
    /// Set once the current word has seen a quote, so an empty quoted word
    /// (`''`) still produces a token.
    word_started: bool,
}

/// Tokenize one line of input.
pub fn tokenize(line: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(line).run()
}

impl Lexer {
    fn new(line: &str) -> Self {
        Lexer {
            input: line.chars().collect(),
            pos: 0,
            state: State::Start,
            buffer: String::new(),
            word_started: false,
        }
    }

    fn run(&mut self) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                State::Start => self.handle_start(ch, &mut out),
                State::Word => self.handle_word(ch, &mut out),
                State::SingleQuote => self.handle_quote(ch, '\''),
                State::DoubleQuote => self.handle_quote(ch, '"'),
            }
        }

        match self.state {
            State::SingleQuote | State::DoubleQuote => {
                return Err(LexError::UnterminatedQuote);
            }
            _ => {}
        }
        self.flush_word(&mut out);

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

    fn handle_start(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            ' ' | '\t' | '\n' => {}
            '|' => out.push(Token::Pipe),
            '<' => out.push(Token::RedirectIn),
            '>' => self.handle_redirect_out(out),
            '&' => out.push(Token::Background),
            '\'' => {
                self.word_started = true;
                self.state = State::SingleQuote;
            }
            '"' => {
                self.word_started = true;
                self.state = State::DoubleQuote;
            }
            _ => {
                self.buffer.push(ch);
                self.state = State::Word;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            ' ' | '\t' | '\n' => {
                self.flush_word(out);
                self.state = State::Start;
            }
            '|' | '<' | '>' | '&' => {
                self.flush_word(out);
                self.state = State::Start;
                match ch {
                    '|' => out.push(Token::Pipe),
                    '<' => out.push(Token::RedirectIn),
                    '>' => self.handle_redirect_out(out),
                    _ => out.push(Token::Background),
                }
            }
            '\'' => self.state = State::SingleQuote,
            '"' => self.state = State::DoubleQuote,
            _ => self.buffer.push(ch),
        }
    }

    /// Inside quotes every character is literal, including operators.
    fn handle_quote(&mut self, ch: char, closing: char) {
        if ch == closing {
            self.state = State::Word;
        } else {
            self.buffer.push(ch);
        }
    }

    fn handle_redirect_out(&mut self, out: &mut Vec<Token>) {
        if self.peek_char() == Some('>') {
            self.pos += 1;
            out.push(Token::RedirectAppend);
        } else {
            out.push(Token::RedirectOut);
        }
    }

    fn flush_word(&mut self, out: &mut Vec<Token>) {
        if !self.buffer.is_empty() || self.word_started {
            out.push(Token::Word(std::mem::take(&mut self.buffer)));
        }
        self.word_started = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn splits_on_whitespace() {
        let tokens = tokenize("ls  -l \t /tmp").unwrap();
        assert_eq!(tokens, vec![word("ls"), word("-l"), word("/tmp")]);
    }

    #[test]
    fn empty_line_yields_no_tokens() {
        assert_eq!(tokenize("").unwrap(), vec![]);
        assert_eq!(tokenize("   \t").unwrap(), vec![]);
    }

    #[test]
    fn operators_need_no_surrounding_spaces() {
        let tokens = tokenize("cat<in|wc>out&").unwrap();
        assert_eq!(
            tokens,
            vec![
                word("cat"),
                Token::RedirectIn,
                word("in"),
                Token::Pipe,
                word("wc"),
                Token::RedirectOut,
                word("out"),
                Token::Background,
            ]
        );
    }

    #[test]
    fn double_angle_is_append() {
        let tokens = tokenize("echo hi >> log").unwrap();
        assert_eq!(
            tokens,
            vec![word("echo"), word("hi"), Token::RedirectAppend, word("log")]
        );
    }

    #[test]
    fn quotes_keep_spaces_and_operators_literal() {
        let tokens = tokenize("echo 'a | b' \"c > d\"").unwrap();
        assert_eq!(tokens, vec![word("echo"), word("a | b"), word("c > d")]);
    }

    #[test]
    fn quotes_join_with_adjacent_text() {
        let tokens = tokenize("e'ch'o hello").unwrap();
        assert_eq!(tokens, vec![word("echo"), word("hello")]);
    }

    #[test]
    fn empty_quoted_word_is_a_word() {
        let tokens = tokenize("echo ''").unwrap();
        assert_eq!(tokens, vec![word("echo"), word("")]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert_eq!(tokenize("echo 'oops").unwrap_err(), LexError::UnterminatedQuote);
        assert_eq!(tokenize("echo \"oops").unwrap_err(), LexError::UnterminatedQuote);
    }
}
