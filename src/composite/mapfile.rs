//! Hot-reloadable composite map file format (spec §6 "Composite map file
//! format"): one composite per line, `<name>:<score> <expression>\n`.

use super::model::Policy;
use super::registry::{CompositeRegistrationError, CompositeRegistry};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MapFileError {
    #[error("line {0} has no score")]
    MissingScore(usize),
    #[error("line {0} has no expression")]
    MissingExpression(usize),
    #[error("line {0}: composite '{1}' is unparseable")]
    InvalidExpression(usize, String),
}

struct ParsedLine {
    name: String,
    score: f64,
    expression: String,
}

fn parse_line(line_no: usize, line: &str) -> Result<Option<ParsedLine>, MapFileError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (head, expression) = line.split_once(' ').ok_or(MapFileError::MissingExpression(line_no))?;
    let (name, score) = head.split_once(':').ok_or(MapFileError::MissingScore(line_no))?;
    let score: f64 = score.parse().map_err(|_| MapFileError::MissingScore(line_no))?;
    Ok(Some(ParsedLine {
        name: name.to_string(),
        score,
        expression: expression.trim().to_string(),
    }))
}

/// Load every well-formed line of `contents` into `registry` at the given
/// `policy`/`group`/`priority`. Malformed or unparseable lines are skipped
/// and reported; well-formed entries replace prior definitions of the same
/// name (spec §6).
pub fn load_composite_map(
    registry: &mut CompositeRegistry,
    contents: &str,
    policy: Policy,
    group: Option<&str>,
    priority: i32,
) -> Vec<MapFileError> {
    let mut errors = Vec::new();
    for (i, raw_line) in contents.lines().enumerate() {
        let line_no = i + 1;
        match parse_line(line_no, raw_line) {
            Ok(None) => {}
            Ok(Some(parsed)) => {
                if let Err(CompositeRegistrationError::Unparseable { name, .. }) =
                    registry.register(parsed.name, &parsed.expression, parsed.score, policy, group.map(str::to_string), priority)
                {
                    errors.push(MapFileError::InvalidExpression(line_no, name));
                }
            }
            Err(e) => errors.push(e),
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_lines_load() {
        let mut registry = CompositeRegistry::new();
        let errors = load_composite_map(&mut registry, "C1:5.0 A & B\nC2:2 !A\n", Policy::RemoveAll, None, 0);
        assert!(errors.is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn missing_score_is_rejected() {
        let mut registry = CompositeRegistry::new();
        let errors = load_composite_map(&mut registry, "C1 A & B\n", Policy::RemoveAll, None, 0);
        assert_eq!(errors, vec![MapFileError::MissingScore(1)]);
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_expression_is_rejected() {
        let mut registry = CompositeRegistry::new();
        let errors = load_composite_map(&mut registry, "C1:5.0\n", Policy::RemoveAll, None, 0);
        assert_eq!(errors, vec![MapFileError::MissingExpression(1)]);
    }

    #[test]
    fn later_line_replaces_earlier_definition() {
        let mut registry = CompositeRegistry::new();
        load_composite_map(&mut registry, "C:1.0 A\nC:2.0 B\n", Policy::RemoveAll, None, 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        let mut registry = CompositeRegistry::new();
        let errors = load_composite_map(&mut registry, "\n# comment\nC:1.0 A\n", Policy::RemoveAll, None, 0);
        assert!(errors.is_empty());
        assert_eq!(registry.len(), 1);
    }
}
