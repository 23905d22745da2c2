//! Builds a [`Pipeline`] descriptor from a token stream.
//!
//! Grammar: `cmd (| cmd)* (< file)? ((> | >>) file)? (&)?` — input
//! redirection is only valid on the first command, output redirection on the
//! last, and the background marker must close the line. Redirection
//! operators may appear anywhere inside their command segment.

use crate::command::{Command, OutputRedirect, Pipeline};
use crate::lexer::{self, LexError, Token};
use std::path::PathBuf;
use thiserror::Error;

/// Errors for lines that tokenize but do not form a valid pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("missing target after `{0}`")]
    MissingRedirectTarget(&'static str),
    #[error("input redirection is only allowed on the first command")]
    InputNotFirst,
    #[error("output redirection is only allowed on the last command")]
    OutputNotLast,
    #[error("duplicate input redirection")]
    DuplicateInput,
    #[error("duplicate output redirection")]
    DuplicateOutput,
    #[error("empty command")]
    EmptyCommand,
    #[error("`&` must be the last token of the line")]
    BackgroundNotLast,
}

/// Parse one line of input. Returns `Ok(None)` for a blank line.
pub fn parse(line: &str) -> Result<Option<Pipeline>, ParseError> {
    let tokens = lexer::tokenize(line)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    Parser::new(tokens).run().map(Some)
}

struct Parser {
    tokens: std::vec::IntoIter<Token>,
    commands: Vec<Command>,
    argv: Vec<String>,
    input: Option<PathBuf>,
    /// Output redirect with the index of the segment it was seen in, so
    /// "last command only" can be checked once the segment count is known.
    output: Option<(OutputRedirect, usize)>,
    input_segment: usize,
    background: bool,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter(),
            commands: Vec::new(),
            argv: Vec::new(),
            input: None,
            output: None,
            input_segment: 0,
            background: false,
        }
    }

    fn run(mut self) -> Result<Pipeline, ParseError> {
        while let Some(token) = self.tokens.next() {
            if self.background {
                // Anything after `&` is malformed.
                return Err(ParseError::BackgroundNotLast);
            }
            match token {
                Token::Word(w) => self.argv.push(w),
                Token::Pipe => self.end_segment()?,
                Token::RedirectIn => {
                    if self.input.is_some() {
                        return Err(ParseError::DuplicateInput);
                    }
                    self.input = Some(PathBuf::from(self.expect_target("<")?));
                    self.input_segment = self.commands.len();
                }
                Token::RedirectOut | Token::RedirectAppend => {
                    if self.output.is_some() {
                        return Err(ParseError::DuplicateOutput);
                    }
                    let append = token == Token::RedirectAppend;
                    let op = if append { ">>" } else { ">" };
                    let path = PathBuf::from(self.expect_target(op)?);
                    self.output = Some((OutputRedirect { path, append }, self.commands.len()));
                }
                Token::Background => self.background = true,
            }
        }
        self.end_segment()?;

        if self.input_segment != 0 {
            return Err(ParseError::InputNotFirst);
        }
        let last = self.commands.len() - 1;
        let output = match self.output {
            Some((redirect, segment)) if segment == last => Some(redirect),
            Some(_) => return Err(ParseError::OutputNotLast),
            None => None,
        };

        Ok(Pipeline {
            commands: self.commands,
            input: self.input,
            output,
            background: self.background,
        })
    }

    fn end_segment(&mut self) -> Result<(), ParseError> {
        if self.argv.is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        self.commands.push(Command::new(std::mem::take(&mut self.argv)));
        Ok(())
    }

    fn expect_target(&mut self, op: &'static str) -> Result<String, ParseError> {
        match self.tokens.next() {
            Some(Token::Word(w)) => Ok(w),
            _ => Err(ParseError::MissingRedirectTarget(op)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(line: &str) -> Pipeline {
        parse(line).unwrap().unwrap()
    }

    fn argv(pipeline: &Pipeline, index: usize) -> Vec<&str> {
        pipeline.commands[index]
            .argv()
            .iter()
            .map(|s| s.as_str())
            .collect()
    }

    #[test]
    fn blank_line_parses_to_none() {
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn single_command() {
        let p = parse_ok("ls -l /tmp");
        assert_eq!(p.commands.len(), 1);
        assert_eq!(argv(&p, 0), ["ls", "-l", "/tmp"]);
        assert!(p.input.is_none() && p.output.is_none() && !p.background);
    }

    #[test]
    fn three_stage_pipeline() {
        let p = parse_ok("cat notes | sort | uniq -c");
        assert_eq!(p.commands.len(), 3);
        assert_eq!(argv(&p, 1), ["sort"]);
        assert_eq!(argv(&p, 2), ["uniq", "-c"]);
    }

    #[test]
    fn redirections_on_the_boundary_commands() {
        let p = parse_ok("sort < in.txt | head -n 1 > out.txt");
        assert_eq!(p.input, Some(PathBuf::from("in.txt")));
        let out = p.output.unwrap();
        assert_eq!(out.path, PathBuf::from("out.txt"));
        assert!(!out.append);
    }

    #[test]
    fn append_redirection() {
        let p = parse_ok("echo done >> log");
        assert!(p.output.unwrap().append);
    }

    #[test]
    fn trailing_ampersand_sets_background() {
        let p = parse_ok("sleep 10 &");
        assert!(p.background);
        assert_eq!(argv(&p, 0), ["sleep", "10"]);
    }

    #[test]
    fn input_redirect_rejected_past_the_first_command() {
        assert_eq!(
            parse("cat | wc < in.txt").unwrap_err(),
            ParseError::InputNotFirst
        );
    }

    #[test]
    fn output_redirect_rejected_before_the_last_command() {
        assert_eq!(
            parse("cat > out.txt | wc").unwrap_err(),
            ParseError::OutputNotLast
        );
    }

    #[test]
    fn redirect_without_target_is_an_error() {
        assert_eq!(
            parse("cat <").unwrap_err(),
            ParseError::MissingRedirectTarget("<")
        );
        assert_eq!(
            parse("cat > | wc").unwrap_err(),
            ParseError::MissingRedirectTarget(">")
        );
    }

    #[test]
    fn duplicate_redirects_are_errors() {
        assert_eq!(
            parse("cat < a < b").unwrap_err(),
            ParseError::DuplicateInput
        );
        assert_eq!(
            parse("cat > a >> b").unwrap_err(),
            ParseError::DuplicateOutput
        );
    }

    #[test]
    fn empty_pipeline_segment_is_an_error() {
        assert_eq!(parse("ls |").unwrap_err(), ParseError::EmptyCommand);
        assert_eq!(parse("| ls").unwrap_err(), ParseError::EmptyCommand);
    }

    #[test]
    fn ampersand_must_close_the_line() {
        assert_eq!(
            parse("sleep 1 & echo hi").unwrap_err(),
            ParseError::BackgroundNotLast
        );
    }

    #[test]
    fn lex_errors_surface_as_parse_errors() {
        assert!(matches!(
            parse("echo 'oops").unwrap_err(),
            ParseError::Lex(LexError::UnterminatedQuote)
        ));
    }
}
