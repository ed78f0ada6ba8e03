//! Minimal `{{me}}` substitution for image tool prompts.
//!
//! The full ~15-variable template engine for system prompts lives in
//! `orc_context::template`; the image tool only ever needs this one
//! variable, so it gets its own tiny resolver rather than pulling in the
//! context-assembly crate for one substitution.

/// Replace every `{{me}}` occurrence with the calling participant's name
/// and appearance fragment, joined as `"<name>, <appearance>"`. Falls back
/// to just the name (or "the user" if even that is missing) when no
/// appearance is recorded.
pub fn resolve_me(template: &str, name: Option<&str>, appearance: Option<&str>) -> String {
    let me = match (name, appearance) {
        (Some(name), Some(appearance)) if !appearance.trim().is_empty() => {
            format!("{name}, {appearance}")
        }
        (Some(name), _) => name.to_string(),
        (None, _) => "the user".to_string(),
    };
    template.replace("{{me}}", &me)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_name_and_appearance() {
        let out = resolve_me("a portrait of {{me}}", Some("Ari"), Some("red hair, green eyes"));
        assert_eq!(out, "a portrait of Ari, red hair, green eyes");
    }

    #[test]
    fn falls_back_to_name_only_without_appearance() {
        let out = resolve_me("{{me}} waves", Some("Ari"), None);
        assert_eq!(out, "Ari waves");
    }

    #[test]
    fn falls_back_to_generic_label_without_name() {
        let out = resolve_me("{{me}} waves", None, None);
        assert_eq!(out, "the user waves");
    }

    #[test]
    fn leaves_template_untouched_when_no_placeholder() {
        let out = resolve_me("a sunset", Some("Ari"), None);
        assert_eq!(out, "a sunset");
    }
}
