//! ABOUTME: Parses a tag's raw argument text (`'key'` or `{ key: 'value', flag: true }`) into JSON
//! ABOUTME: Deliberately minimal: string/bool/number literals only, no nested expressions.

use crate::engine::TemplateError;
use serde_json::Value;

pub fn parse_tag_args(raw: &str) -> Result<Value, TemplateError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    let mut chars = raw.chars().peekable();
    let value = parse_value(&mut chars)?;
    skip_ws(&mut chars);
    if chars.peek().is_some() {
        return Err(TemplateError::Parse(format!("unexpected trailing text in tag args: {raw}")));
    }
    Ok(value)
}

/// Parses a comma-separated positional argument list (no surrounding
/// parens), used to evaluate global-function calls inside `{{ }}`
/// interpolations, e.g. `slugify('My Title')`.
pub(crate) fn parse_value_list(raw: &str) -> Result<Vec<Value>, TemplateError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let mut chars = raw.chars().peekable();
    let mut values = Vec::new();
    loop {
        values.push(parse_value(&mut chars)?);
        skip_ws(&mut chars);
        match chars.peek() {
            Some(',') => {
                chars.next();
            }
            Some(_) => {
                return Err(TemplateError::Parse(format!(
                    "unexpected trailing text in argument list: {raw}"
                )))
            }
            None => break,
        }
    }
    Ok(values)
}

fn skip_ws(chars: &mut std::iter::Peekable<std::str::Chars>) {
    while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
        chars.next();
    }
}

fn parse_value(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<Value, TemplateError> {
    skip_ws(chars);
    match chars.peek() {
        Some('{') => parse_object(chars),
        Some('\'') | Some('"') => Ok(Value::String(parse_string(chars)?)),
        Some(c) if c.is_ascii_digit() || *c == '-' => parse_number(chars),
        Some(_) => parse_ident(chars),
        None => Err(TemplateError::Parse("expected a value in tag args".into())),
    }
}

fn parse_object(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<Value, TemplateError> {
    chars.next(); // consume '{'
    let mut map = serde_json::Map::new();
    skip_ws(chars);
    if chars.peek() == Some(&'}') {
        chars.next();
        return Ok(Value::Object(map));
    }
    loop {
        skip_ws(chars);
        let key = parse_key(chars)?;
        skip_ws(chars);
        match chars.next() {
            Some(':') => {}
            other => return Err(TemplateError::Parse(format!("expected ':' after key, found {other:?}"))),
        }
        let value = parse_value(chars)?;
        map.insert(key, value);
        skip_ws(chars);
        match chars.peek() {
            Some(',') => {
                chars.next();
            }
            Some('}') => {
                chars.next();
                break;
            }
            other => return Err(TemplateError::Parse(format!("expected ',' or '}}', found {other:?}"))),
        }
    }
    Ok(Value::Object(map))
}

fn parse_key(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<String, TemplateError> {
    if matches!(chars.peek(), Some('\'') | Some('"')) {
        return parse_string(chars);
    }
    let mut key = String::new();
    while matches!(chars.peek(), Some(c) if c.is_alphanumeric() || *c == '_') {
        key.push(chars.next().unwrap());
    }
    if key.is_empty() {
        return Err(TemplateError::Parse("expected an object key".into()));
    }
    Ok(key)
}

fn parse_string(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<String, TemplateError> {
    let quote = chars.next().ok_or_else(|| TemplateError::Parse("expected a quote".into()))?;
    let mut s = String::new();
    loop {
        match chars.next() {
            Some(c) if c == quote => break,
            Some('\\') => {
                if let Some(next) = chars.next() {
                    s.push(next);
                }
            }
            Some(c) => s.push(c),
            None => return Err(TemplateError::Parse("unterminated string in tag args".into())),
        }
    }
    Ok(s)
}

fn parse_number(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<Value, TemplateError> {
    let mut text = String::new();
    if chars.peek() == Some(&'-') {
        text.push(chars.next().unwrap());
    }
    while matches!(chars.peek(), Some(c) if c.is_ascii_digit() || *c == '.') {
        text.push(chars.next().unwrap());
    }
    text.parse::<f64>()
        .map(|n| serde_json::json!(n))
        .map_err(|_| TemplateError::Parse(format!("invalid number literal '{text}'")))
}

fn parse_ident(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<Value, TemplateError> {
    let mut text = String::new();
    while matches!(chars.peek(), Some(c) if c.is_alphanumeric() || *c == '_') {
        text.push(chars.next().unwrap());
    }
    match text.as_str() {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "null" => Ok(Value::Null),
        "" => Err(TemplateError::Parse("expected a value".into())),
        other => Ok(Value::String(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_string() {
        assert_eq!(parse_tag_args("'name'").unwrap(), Value::String("name".into()));
    }

    #[test]
    fn parses_object_with_string_and_bool_fields() {
        let value = parse_tag_args("{ key: 'title', typeHint: 'json' }").unwrap();
        assert_eq!(value["key"], "title");
        assert_eq!(value["typeHint"], "json");
    }

    #[test]
    fn empty_args_is_null() {
        assert_eq!(parse_tag_args("").unwrap(), Value::Null);
    }
}
