use crate::env::Environment;
use crate::lexer::{self, LexingError, Token, WordPart};
use thiserror::Error;

/// One unexpanded word of a command line.
pub type Word = Vec<WordPart>;

/// A parsed input line: a simple command, optionally marked for background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub argv: Vec<Word>,
    pub background: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsingError {
    #[error(transparent)]
    Lexing(#[from] LexingError),
    #[error("syntax error near unexpected token `&'")]
    MisplacedAmpersand,
}

impl CommandLine {
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    /// Expand every word against `env`. Unset parameters expand to "".
    pub fn expand(&self, env: &Environment) -> Vec<String> {
        self.argv.iter().map(|word| expand_word(word, env)).collect()
    }
}

fn expand_word(word: &Word, env: &Environment) -> String {
    let mut result = String::new();
    for part in word {
        match part {
            WordPart::Literal(text) => result.push_str(text),
            WordPart::ParamSubst(name) => {
                if let Some(value) = env.get_var(name) {
                    result.push_str(&value);
                }
            }
        }
    }
    result
}

/// Parse one input line. `&` is only accepted as the last token and only
/// after a command word.
pub fn parse_line(line: &str) -> Result<CommandLine, ParsingError> {
    let mut tokens = lexer::split_into_tokens(line)?;

    let background = tokens.last() == Some(&Token::Ampersand);
    if background {
        tokens.pop();
    }

    let argv = tokens
        .into_iter()
        .map(|token| match token {
            Token::Word(parts) => Ok(parts),
            Token::Ampersand => Err(ParsingError::MisplacedAmpersand),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if background && argv.is_empty() {
        return Err(ParsingError::MisplacedAmpersand);
    }
    Ok(CommandLine { argv, background })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn env_with(vars: &[(&str, &str)]) -> Environment {
        Environment {
            vars: vars
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            current_dir: PathBuf::from("/"),
            exit_requested: None,
        }
    }

    #[test]
    fn test_foreground_command() {
        let cmd = parse_line("sleep 1").unwrap();
        assert!(!cmd.background);
        assert_eq!(cmd.expand(&env_with(&[])), vec!["sleep", "1"]);
    }

    #[test]
    fn test_background_marker() {
        let cmd = parse_line("sleep 1 &").unwrap();
        assert!(cmd.background);
        assert_eq!(cmd.expand(&env_with(&[])), vec!["sleep", "1"]);

        let cmd = parse_line("./stub&").unwrap();
        assert!(cmd.background);
        assert_eq!(cmd.expand(&env_with(&[])), vec!["./stub"]);
    }

    #[test]
    fn test_ampersand_must_be_last() {
        assert_eq!(
            parse_line("sleep & 1"),
            Err(ParsingError::MisplacedAmpersand)
        );
        assert_eq!(parse_line("&"), Err(ParsingError::MisplacedAmpersand));
        assert_eq!(parse_line("a & &"), Err(ParsingError::MisplacedAmpersand));
    }

    #[test]
    fn test_blank_line_is_empty() {
        assert!(parse_line("   ").unwrap().is_empty());
    }

    #[test]
    fn test_expansion_uses_shell_vars() {
        let cmd = parse_line("echo $GREETING-${WHO} $UNSET_JOBSH_VAR").unwrap();
        let env = env_with(&[("GREETING", "hi"), ("WHO", "there")]);
        assert_eq!(cmd.expand(&env), vec!["echo", "hi-there", ""]);
    }

    #[test]
    fn test_lexing_errors_surface() {
        assert!(matches!(
            parse_line("echo 'x"),
            Err(ParsingError::Lexing(LexingError::UnfinishedQuote))
        ));
    }
}
