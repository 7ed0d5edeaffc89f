//! Mode Template Rendering
//!
//! Renders `<application>-mode` templates with tag parameters. Placeholders
//! follow the familiar brace syntax:
//! - `{0}`, `{1}`: positional parameters
//! - `{name}`: named parameters
//! - `{}`: the next positional parameter
//! - `{{` and `}}`: literal braces
//!
//! A format spec after `:` or a conversion after `!` is accepted and
//! ignored. Placeholders that cannot be resolved are kept verbatim, so a
//! tag that did not match the parser yields the unexpanded template.

use std::collections::BTreeMap;

/// Checks if a template references any parameter.
pub fn has_placeholders(text: &str) -> bool {
    !placeholder_names(text).is_empty()
}

/// Extracts placeholder field names from a template, skipping escaped braces.
///
/// # Example
/// ```
/// use prodchain::tag::template::placeholder_names;
///
/// let names = placeholder_names("gun --particles {0} --momentums {momentum} {{x}}");
/// assert_eq!(names, vec!["0", "momentum"]);
/// ```
pub fn placeholder_names(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    field.push(c);
                }
                if closed {
                    names.push(field_name(&field).to_string());
                }
            }
            _ => {}
        }
    }

    names
}

/// Renders a template with positional and named parameters.
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use prodchain::tag::template::render;
///
/// let positional = vec!["e+".to_string(), "1.398".to_string()];
/// let out = render("gun --particles {0} --momentums {1}", &positional, &BTreeMap::new());
/// assert_eq!(out, "gun --particles e+ --momentums 1.398");
/// ```
pub fn render(template: &str, positional: &[String], named: &BTreeMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto_index = 0usize;

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    field.push(c);
                }

                if !closed {
                    output.push('{');
                    output.push_str(&field);
                    continue;
                }

                match resolve(field_name(&field), positional, named, &mut auto_index) {
                    Some(value) => output.push_str(value),
                    None => {
                        output.push('{');
                        output.push_str(&field);
                        output.push('}');
                    }
                }
            }
            _ => output.push(ch),
        }
    }

    output
}

/// Strips a trailing `!conversion` or `:spec` from a field.
fn field_name(field: &str) -> &str {
    let end = field.find(['!', ':']).unwrap_or(field.len());
    field[..end].trim()
}

fn resolve<'a>(
    name: &str,
    positional: &'a [String],
    named: &'a BTreeMap<String, String>,
    auto_index: &mut usize,
) -> Option<&'a str> {
    if name.is_empty() {
        let index = *auto_index;
        *auto_index += 1;
        return positional.get(index).map(String::as_str);
    }

    if let Ok(index) = name.parse::<usize>() {
        return positional.get(index).map(String::as_str);
    }

    named.get(name).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_and_named_together() {
        let positional = strings(&["e+", "1.398"]);
        let mut named = BTreeMap::new();
        named.insert("particle".to_string(), "e+".to_string());

        let out = render("{particle} {1} {0}", &positional, &named);
        assert_eq!(out, "e+ 1.398 e+");
    }

    #[test]
    fn test_auto_numbering() {
        let out = render("{} and {}", &strings(&["a", "b"]), &BTreeMap::new());
        assert_eq!(out, "a and b");
    }

    #[test]
    fn test_escaped_braces() {
        let out = render("{{literal}} {0}", &strings(&["x"]), &BTreeMap::new());
        assert_eq!(out, "{literal} x");
    }

    #[test]
    fn test_unresolved_placeholder_kept() {
        let out = render("gun --particles {0} --momentums {momentum}", &[], &BTreeMap::new());
        assert_eq!(out, "gun --particles {0} --momentums {momentum}");
    }

    #[test]
    fn test_format_spec_ignored() {
        let out = render("{0:.2f}", &strings(&["1.5"]), &BTreeMap::new());
        assert_eq!(out, "1.5");
    }

    #[test]
    fn test_unterminated_brace_is_literal() {
        let out = render("value {0", &strings(&["x"]), &BTreeMap::new());
        assert_eq!(out, "value {0");
    }

    #[test]
    fn test_has_placeholders() {
        assert!(has_placeholders("gun {0}"));
        assert!(!has_placeholders("--disablePmtTTS"));
        assert!(!has_placeholders("--json {{\"a\": 1}}"));
    }

    #[test]
    fn test_placeholder_names() {
        assert_eq!(placeholder_names("{a}_{b!r}_{0:>3}"), vec!["a", "b", "0"]);
        assert!(placeholder_names("{{none}}").is_empty());
    }

    #[test]
    fn test_empty_template() {
        assert_eq!(render("", &strings(&["a"]), &BTreeMap::new()), "");
    }
}
