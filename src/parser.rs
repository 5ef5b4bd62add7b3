use crate::lexer::{Token, WordPart};

/// A shell word: the parts are concatenated after substitution.
pub type Word = Vec<WordPart>;

/// A simple command: leading `NAME=value` assignments followed by argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleCommand {
    pub assignments: Vec<(String, Word)>,
    pub argv: Vec<Word>,
}

/// Commands connected by `|`. A single command is a pipeline of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub commands: Vec<SimpleCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    /// A pipe with no command on one of its sides.
    EmptyPipelineStage,
}

/// Build a pipeline from tokens. Returns `None` for a blank entry.
pub fn construct_pipeline(tokens: Vec<Token>) -> Result<Option<Pipeline>, ParsingError> {
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut commands = Vec::new();
    let mut current = SimpleCommand {
        assignments: Vec::new(),
        argv: Vec::new(),
    };

    for token in tokens {
        match token {
            Token::PipeOp => {
                if current.argv.is_empty() && current.assignments.is_empty() {
                    return Err(ParsingError::EmptyPipelineStage);
                }
                commands.push(std::mem::replace(
                    &mut current,
                    SimpleCommand {
                        assignments: Vec::new(),
                        argv: Vec::new(),
                    },
                ));
            }
            Token::Word(word) => {
                if current.argv.is_empty() {
                    if let Some(assignment) = split_assignment(&word) {
                        current.assignments.push(assignment);
                        continue;
                    }
                }
                current.argv.push(word);
            }
        }
    }

    if current.argv.is_empty() && current.assignments.is_empty() {
        return Err(ParsingError::EmptyPipelineStage);
    }
    commands.push(current);
    Ok(Some(Pipeline { commands }))
}

/// Recognize `NAME=value`, where NAME is a valid variable name in the leading literal.
fn split_assignment(word: &Word) -> Option<(String, Word)> {
    let Some(WordPart::Literal(first)) = word.first() else {
        return None;
    };
    let (name, value_head) = first.split_once('=')?;
    if !is_valid_name(name) {
        return None;
    }

    let mut value = Vec::new();
    if !value_head.is_empty() {
        value.push(WordPart::Literal(value_head.to_string()));
    }
    value.extend(word.iter().skip(1).cloned());
    Some((name.to_string(), value))
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_tokens;

    fn parse(line: &str) -> Result<Option<Pipeline>, ParsingError> {
        construct_pipeline(split_into_tokens(line).unwrap())
    }

    #[test]
    fn test_blank_line_is_none() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn test_pipeline_stages() {
        let pipeline = parse("echo a | wc | cat").unwrap().unwrap();
        assert_eq!(pipeline.commands.len(), 3);
        assert_eq!(pipeline.commands[0].argv.len(), 2);
    }

    #[test]
    fn test_assignments_only_before_argv() {
        let pipeline = parse("A=1 B=x$C echo D=2").unwrap().unwrap();
        let cmd = &pipeline.commands[0];
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.assignments[0].0, "A");
        assert_eq!(
            cmd.assignments[1].1,
            vec![
                WordPart::Literal("x".to_string()),
                WordPart::ParamSubst("C".to_string())
            ]
        );
        assert_eq!(cmd.argv.len(), 2);
    }

    #[test]
    fn test_invalid_assignment_name_is_a_word() {
        let pipeline = parse("1A=2").unwrap().unwrap();
        assert!(pipeline.commands[0].assignments.is_empty());
        assert_eq!(pipeline.commands[0].argv.len(), 1);
    }

    #[test]
    fn test_empty_stage_is_an_error() {
        assert_eq!(parse("| wc"), Err(ParsingError::EmptyPipelineStage));
        assert_eq!(parse("echo |"), Err(ParsingError::EmptyPipelineStage));
        assert_eq!(parse("echo | | wc"), Err(ParsingError::EmptyPipelineStage));
    }
}
