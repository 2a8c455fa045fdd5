//! Prefix-command parsing.
//!
//! The bot answers text commands (`!ask ...`, `!persona ...`,
//! `!plugin ...`) plus any registered dynamic plugin name.

/// Built-in command names. Plugin names may not collide with these.
pub const RESERVED_COMMANDS: &[&str] = &["ask", "persona", "plugin", "help"];

/// A parsed prefix command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// `!ask <prompt>`: run the reasoning loop.
    Ask(String),
    /// `!persona` (list) or `!persona <name>` (select).
    Persona(Option<String>),
    /// `!plugin <action>`.
    Plugin(PluginAction),
    /// `!help`.
    Help,
    /// Any other command word: a dynamic plugin candidate.
    Custom { name: String, input: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginAction {
    Create(String),
    List,
    Remove(String),
}

/// Parse a message body into a command, if it starts with the prefix.
#[must_use]
pub fn parse(content: &str, prefix: &str) -> Option<Invocation> {
    let body = content.trim().strip_prefix(prefix)?;
    let (word, rest) = split_word(body);
    if word.is_empty() {
        return None;
    }
    let word = word.to_ascii_lowercase();

    Some(match word.as_str() {
        "ask" => {
            if rest.is_empty() {
                return None;
            }
            Invocation::Ask(rest.to_string())
        },
        "persona" => Invocation::Persona((!rest.is_empty()).then(|| rest.to_string())),
        "plugin" => Invocation::Plugin(parse_plugin_action(rest)?),
        "help" => Invocation::Help,
        _ => Invocation::Custom {
            name: word,
            input: rest.to_string(),
        },
    })
}

fn parse_plugin_action(rest: &str) -> Option<PluginAction> {
    let (action, rest) = split_word(rest);
    Some(match action.to_ascii_lowercase().as_str() {
        "create" if !rest.is_empty() => PluginAction::Create(rest.to_string()),
        "list" => PluginAction::List,
        "remove" if !rest.is_empty() => PluginAction::Remove(rest.to_string()),
        _ => return None,
    })
}

fn split_word(text: &str) -> (&str, &str) {
    let trimmed = text.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (trimmed, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ask_with_prompt() {
        assert_eq!(
            parse("!ask what is rust?", "!"),
            Some(Invocation::Ask("what is rust?".into()))
        );
    }

    #[test]
    fn ask_without_prompt_is_ignored() {
        assert_eq!(parse("!ask", "!"), None);
        assert_eq!(parse("!ask   ", "!"), None);
    }

    #[test]
    fn non_prefixed_text_is_ignored() {
        assert_eq!(parse("just chatting", "!"), None);
        assert_eq!(parse("?ask hi", "!"), None);
    }

    #[test]
    fn persona_list_and_select() {
        assert_eq!(parse("!persona", "!"), Some(Invocation::Persona(None)));
        assert_eq!(
            parse("!persona pirate", "!"),
            Some(Invocation::Persona(Some("pirate".into())))
        );
    }

    #[test]
    fn plugin_actions() {
        assert_eq!(
            parse("!plugin create a haiku writer", "!"),
            Some(Invocation::Plugin(PluginAction::Create(
                "a haiku writer".into()
            )))
        );
        assert_eq!(
            parse("!plugin list", "!"),
            Some(Invocation::Plugin(PluginAction::List))
        );
        assert_eq!(
            parse("!plugin remove haiku", "!"),
            Some(Invocation::Plugin(PluginAction::Remove("haiku".into())))
        );
        assert_eq!(parse("!plugin", "!"), None);
        assert_eq!(parse("!plugin create", "!"), None);
    }

    #[test]
    fn unknown_word_becomes_custom() {
        assert_eq!(
            parse("!haiku autumn leaves", "!"),
            Some(Invocation::Custom {
                name: "haiku".into(),
                input: "autumn leaves".into(),
            })
        );
    }

    #[test]
    fn command_word_is_case_insensitive() {
        assert_eq!(parse("!ASK hello", "!"), Some(Invocation::Ask("hello".into())));
    }
}
