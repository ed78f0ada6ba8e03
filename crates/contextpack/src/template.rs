//! Closed-substitution template engine (§4.4).
//!
//! No templating crate pulled in — the closed variable set and absence of
//! conditionals/loops make a general engine (`handlebars`, `tera`)
//! unjustified, and neither is in the teacher's dependency set.

/// The closed set of substitution variables. Missing values expand to `""`.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext<'a> {
    pub char: Option<&'a str>,
    pub description: Option<&'a str>,
    pub personality: Option<&'a str>,
    pub scenario: Option<&'a str>,
    pub user: Option<&'a str>,
    pub persona: Option<&'a str>,
    pub system: Option<&'a str>,
    pub mes_examples: Option<&'a str>,
    pub mes_examples_raw: Option<&'a str>,
    pub wi_before: Option<&'a str>,
    pub wi_after: Option<&'a str>,
    pub lore_before: Option<&'a str>,
    pub lore_after: Option<&'a str>,
    pub anchor_before: Option<&'a str>,
    pub anchor_after: Option<&'a str>,
}

impl<'a> TemplateContext<'a> {
    fn lookup(&self, name: &str) -> &'a str {
        match name {
            "char" => self.char,
            "description" => self.description,
            "personality" => self.personality,
            "scenario" => self.scenario,
            "user" => self.user,
            "persona" => self.persona,
            "system" => self.system,
            "mesExamples" => self.mes_examples,
            "mesExamplesRaw" => self.mes_examples_raw,
            "wiBefore" => self.wi_before,
            "wiAfter" => self.wi_after,
            "loreBefore" => self.lore_before,
            "loreAfter" => self.lore_after,
            "anchorBefore" => self.anchor_before,
            "anchorAfter" => self.anchor_after,
            _ => None,
        }
        .unwrap_or("")
    }
}

enum Token<'a> {
    Text(&'a str),
    Var(&'a str),
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(&rest[..start]));
        }
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                tokens.push(Token::Var(after_open[..end].trim()));
                rest = &after_open[end + 2..];
            }
            None => {
                tokens.push(Token::Text(rest));
                rest = "";
                break;
            }
        }
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    tokens
}

/// Render `template` against `ctx`, substituting the closed variable set
/// and collapsing `{{trim}}...{{/trim}}` blocks by stripping their
/// leading/trailing newlines. Unknown `{{name}}` tokens expand to `""`.
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    let tokens = tokenize(template);
    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Text(t) => out.push_str(t),
            Token::Var(name) if *name == "trim" => {
                let mut inner = String::new();
                i += 1;
                while i < tokens.len() {
                    match &tokens[i] {
                        Token::Var(n) if *n == "/trim" => break,
                        Token::Text(t) => inner.push_str(t),
                        Token::Var(n) => inner.push_str(ctx.lookup(n)),
                    }
                    i += 1;
                }
                out.push_str(inner.trim_matches('\n'));
            }
            Token::Var(name) => out.push_str(ctx.lookup(name)),
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_variables() {
        let ctx = TemplateContext {
            char: Some("Aria"),
            user: Some("Sam"),
            ..Default::default()
        };
        assert_eq!(render("{{char}} meets {{user}}", &ctx), "Aria meets Sam");
    }

    #[test]
    fn missing_variable_expands_to_empty() {
        let ctx = TemplateContext::default();
        assert_eq!(render("[{{description}}]", &ctx), "[]");
    }

    #[test]
    fn unknown_token_expands_to_empty() {
        let ctx = TemplateContext::default();
        assert_eq!(render("[{{notARealVar}}]", &ctx), "[]");
    }

    #[test]
    fn trim_block_strips_leading_and_trailing_newlines() {
        let ctx = TemplateContext::default();
        let rendered = render("a{{trim}}\n\nmiddle\n\n{{/trim}}b", &ctx);
        assert_eq!(rendered, "amiddleb");
    }

    #[test]
    fn trim_block_substitutes_vars_inside() {
        let ctx = TemplateContext {
            scenario: Some("a quiet room"),
            ..Default::default()
        };
        let rendered = render("{{trim}}\n{{scenario}}\n{{/trim}}", &ctx);
        assert_eq!(rendered, "a quiet room");
    }

    #[test]
    fn no_arithmetic_or_conditionals_supported_literally() {
        let ctx = TemplateContext::default();
        // `{{#if x}}` is not a recognized macro; it is just an unknown var.
        assert_eq!(render("{{#if x}}yes{{/if}}", &ctx), "yes");
    }
}
