//! ABOUTME: The Jig node tree: text runs, interpolations, and tag blocks with their parsed args
//! ABOUTME: Builds by matching `@end` against the innermost open tag, not by tag name.

use super::lexer::{lex, RawToken};
use super::args::parse_tag_args;
use crate::engine::TemplateError;
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    Interp(String),
    Tag { name: String, args: Value, children: Vec<Node> },
}

struct Frame {
    name: String,
    args: Value,
    children: Vec<Node>,
}

pub fn parse(src: &str) -> Result<Vec<Node>, TemplateError> {
    let tokens = lex(src)?;
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for token in tokens {
        match token {
            RawToken::Text(t) => push(&mut stack, &mut root, Node::Text(t)),
            RawToken::Interp(expr) => push(&mut stack, &mut root, Node::Interp(expr)),
            RawToken::TagOpen { name, args } => {
                let parsed_args = parse_tag_args(&args)?;
                stack.push(Frame {
                    name,
                    args: parsed_args,
                    children: Vec::new(),
                });
            }
            RawToken::TagEnd => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| TemplateError::Parse("unmatched @end".into()))?;
                let node = Node::Tag {
                    name: frame.name,
                    args: frame.args,
                    children: frame.children,
                };
                push(&mut stack, &mut root, node);
            }
        }
    }

    if let Some(frame) = stack.last() {
        return Err(TemplateError::Parse(format!("unterminated @{} block (missing @end)", frame.name)));
    }

    Ok(root)
}

fn push(stack: &mut [Frame], root: &mut Vec<Node>, node: Node) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    } else {
        root.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_tags_build_a_tree() {
        let nodes = parse("@ai('body') @prompt() hi @end @end").unwrap();
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            Node::Tag { name, children, .. } => {
                assert_eq!(name, "ai");
                assert_eq!(children.len(), 1);
                match &children[0] {
                    Node::Tag { name, .. } => assert_eq!(name, "prompt"),
                    _ => panic!("expected nested prompt tag"),
                }
            }
            _ => panic!("expected a tag node"),
        }
    }

    #[test]
    fn unterminated_tag_is_a_parse_error() {
        assert!(parse("@ai('body')").is_err());
    }

    #[test]
    fn unmatched_end_is_a_parse_error() {
        assert!(parse("text @end").is_err());
    }
}
