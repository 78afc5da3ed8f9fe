use super::ast::{Node, Pipeline, Redirect, Stage, UnsupportedKind};
use super::lexer::{split_unquoted, Lexer, RedirectOp, Token};
use crate::error::ShellError;

/// Parses one input line into a command node. Never panics; malformed input
/// is a `ShellError::Parse` the caller reports and discards.
///
/// `&` splitting runs before pipe splitting, so each parallel segment may
/// itself contain pipes. Both splits are quote-aware: a quoted or escaped
/// `&`/`|` is a literal word character, never an operator.
pub fn parse(line: &str) -> Result<Node, ShellError> {
    let segments = split_unquoted(line, '&');
    if segments.len() > 1 {
        let non_empty: Vec<&str> = segments
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if non_empty.len() > 1 {
            let mut pipelines = Vec::new();
            for segment in non_empty {
                match parse_single(segment)? {
                    Node::Pipeline(pipeline) => pipelines.push(pipeline),
                    _ => {
                        return Err(ShellError::Parse(format!(
                            "cannot run '{}' as a parallel job",
                            segment
                        )))
                    }
                }
            }
            return Ok(Node::ParallelJobs(pipelines));
        }
        // a lone trailing `&` is the caller's background marker, not a split
        return match non_empty.first() {
            Some(only) => parse_single(only),
            None => Err(ShellError::Parse("empty command".to_string())),
        };
    }
    parse_single(line)
}

fn parse_single(line: &str) -> Result<Node, ShellError> {
    let trimmed = line.trim();
    if trimmed == "wait" {
        return Ok(Node::Wait);
    }
    if let Some(kind) = detect_unsupported(trimmed) {
        return Ok(Node::Unsupported {
            kind,
            text: trimmed.to_string(),
        });
    }

    let tokens = Lexer::new(line).tokenize();
    let mut stages = Vec::new();
    for group in tokens.split(|t| *t == Token::Pipe) {
        stages.push(parse_stage(group)?);
    }
    Ok(Node::Pipeline(Pipeline { stages }))
}

/// Source forms the executor refuses to run: function definitions, control
/// flow blocks and here-documents.
fn detect_unsupported(trimmed: &str) -> Option<UnsupportedKind> {
    if trimmed.starts_with("function ") || (trimmed.contains("()") && trimmed.contains('{')) {
        return Some(UnsupportedKind::FunctionDef);
    }
    if ["if ", "for ", "while ", "case "]
        .iter()
        .any(|kw| trimmed.starts_with(kw))
    {
        return Some(UnsupportedKind::Block);
    }
    if trimmed.contains("<<") {
        return Some(UnsupportedKind::Heredoc);
    }
    None
}

fn parse_stage(tokens: &[Token]) -> Result<Stage, ShellError> {
    let mut stage = Stage::default();
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        match token {
            Token::Word(word) => stage.args.push(word.clone()),
            Token::Redirect(op) => {
                let operand = match iter.next() {
                    Some(Token::Word(word)) => word.clone(),
                    _ => {
                        return Err(ShellError::Parse(format!(
                            "expected filename after '{}'",
                            redirect_symbol(op)
                        )))
                    }
                };
                match op {
                    RedirectOp::Input => stage.stdin = Some(operand),
                    RedirectOp::Output => {
                        stage.stdout = Some(Redirect {
                            path: operand,
                            append: false,
                        })
                    }
                    RedirectOp::Append => {
                        stage.stdout = Some(Redirect {
                            path: operand,
                            append: true,
                        })
                    }
                    RedirectOp::Error => stage.stderr = Some(operand),
                }
            }
            Token::Pipe => {
                return Err(ShellError::Parse("unexpected '|'".to_string()));
            }
            Token::Background => {
                return Err(ShellError::Parse("unexpected '&'".to_string()));
            }
        }
    }

    if stage.args.is_empty() {
        return Err(ShellError::Parse("missing command".to_string()));
    }
    Ok(stage)
}

fn redirect_symbol(op: &RedirectOp) -> &'static str {
    match op {
        RedirectOp::Input => "<",
        RedirectOp::Output => ">",
        RedirectOp::Append => ">>",
        RedirectOp::Error => "2>",
    }
}
