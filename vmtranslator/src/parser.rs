//! Command-at-a-time cursor over a tokenized VM IL unit.

use tracing::{debug, error};

use crate::command::{Command, CommandKind};
use crate::error::{LexError, ParseError};
use crate::token::{is_symbol, tokenize, Token, TokenKind};

pub struct CommandParser {
    tokens: Vec<Token>,
    p: usize,
    command: Command,
    error: Option<ParseError>,
    line: usize,
}

impl CommandParser {
    /// Tokenizes `source`. A lexical error aborts the whole unit.
    pub fn new(source: &str) -> Result<Self, LexError> {
        Ok(Self {
            tokens: tokenize(source)?,
            p: 0,
            command: Command::error(),
            error: None,
            line: 0,
        })
    }

    fn peek(&self) -> &Token {
        // tokenize always ends the list with Eof, which is never consumed
        &self.tokens[self.p.min(self.tokens.len() - 1)]
    }

    fn next_token(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.p += 1;
        }
        token
    }

    pub fn has_more_commands(&self) -> bool {
        self.peek().kind != TokenKind::Eof
    }

    /// The command read by the last [`advance`](Self::advance).
    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn kind(&self) -> CommandKind {
        self.command.kind
    }

    pub fn arg1(&self) -> Option<&str> {
        self.command.arg1.as_deref()
    }

    pub fn arg2(&self) -> Option<u16> {
        self.command.arg2
    }

    /// Why the current command is [`CommandKind::Error`], if it is.
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Source line of the current command.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Reads the next command. A malformed command becomes [`CommandKind::Error`]
    /// and parsing resumes at the next command keyword.
    pub fn advance(&mut self) {
        self.line = self.peek().line;
        match self.parse_command() {
            Ok(command) => {
                debug!(line = self.line, ?command, "parsed");
                self.command = command;
                self.error = None;
            }
            Err(err) => {
                error!(line = self.line, "{}", err);
                self.command = Command::error();
                self.error = Some(err);
                self.recover();
            }
        }
    }

    fn recover(&mut self) {
        while self.has_more_commands() {
            let token = self.peek();
            if token.kind == TokenKind::Identifier
                && CommandKind::from_keyword(&token.lexeme).is_some()
            {
                break;
            }
            self.p += 1;
        }
    }

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        let token = self.next_token();
        let (kind, arity) = match token.kind {
            TokenKind::Identifier => CommandKind::from_keyword(&token.lexeme),
            _ => None,
        }
        .ok_or_else(|| ParseError::UnknownCommand {
            line: token.line,
            word: token.lexeme.clone(),
        })?;
        let keyword = token.lexeme;

        let mut command = Command {
            kind,
            arg1: None,
            arg2: None,
        };
        match (kind, arity) {
            (CommandKind::Arithmetic, _) => command.arg1 = Some(keyword),
            (_, 0) => {}
            (CommandKind::Push | CommandKind::Pop, _) => {
                command.arg1 = Some(self.expect_identifier(&keyword, "a segment")?);
                command.arg2 = Some(self.expect_number(&keyword)?);
            }
            (_, 1) => command.arg1 = Some(self.expect_symbol(&keyword)?),
            _ => {
                command.arg1 = Some(self.expect_symbol(&keyword)?);
                command.arg2 = Some(self.expect_number(&keyword)?);
            }
        }
        Ok(command)
    }

    fn unexpected(&self, command: &str, expected: &'static str, found: &Token) -> ParseError {
        ParseError::UnexpectedToken {
            line: found.line,
            command: command.to_string(),
            expected,
            found: if found.kind == TokenKind::Eof {
                "end of input".to_string()
            } else {
                found.lexeme.clone()
            },
        }
    }

    // Arguments never run onto the next line.
    fn argument(
        &mut self,
        command: &str,
        expected: &'static str,
        kind: TokenKind,
    ) -> Result<Token, ParseError> {
        let token = self.peek();
        if token.kind != kind || token.line != self.line {
            return Err(self.unexpected(command, expected, token));
        }
        Ok(self.next_token())
    }

    fn expect_identifier(
        &mut self,
        command: &str,
        expected: &'static str,
    ) -> Result<String, ParseError> {
        Ok(self.argument(command, expected, TokenKind::Identifier)?.lexeme)
    }

    fn expect_symbol(&mut self, command: &str) -> Result<String, ParseError> {
        let token = self.argument(command, "a symbol", TokenKind::Identifier)?;
        if !is_symbol(&token.lexeme) {
            return Err(ParseError::InvalidSymbol {
                line: token.line,
                text: token.lexeme,
            });
        }
        Ok(token.lexeme)
    }

    fn expect_number(&mut self, command: &str) -> Result<u16, ParseError> {
        let token = self.argument(command, "a number", TokenKind::Number)?;
        token.lexeme.parse().map_err(|_| ParseError::InvalidNumber {
            line: token.line,
            text: token.lexeme,
        })
    }
}
