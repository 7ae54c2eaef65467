//! Static parameter rules and the validator that applies them before any handler runs.

use crate::commands::CommandError;
use crate::error::DomainError;
use crate::input::parser::Intent;
use crate::models::item::{ItemCatalog, ItemSelector, ItemTemplate};
use crate::models::types::Direction;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub enum ParamKind {
    Integer { min: i64, max: i64 },
    /// A single token
    Word,
    /// The rest of the line
    Text,
    /// Must name an item template
    ItemTemplate,
    /// An inventory slot index or an item name; resolved against the inventory by the handler
    ItemOrSlot,
    Direction,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamRule {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamRule {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }

    /// `<name>` or `[name]`
    pub fn usage(&self) -> String {
        if self.required {
            format!("<{}>", self.name)
        } else {
            format!("[{}]", self.name)
        }
    }
}

#[derive(Debug, Clone)]
pub enum ArgValue {
    Int(i64),
    Word(String),
    Text(String),
    Template(Arc<ItemTemplate>),
    Item(ItemSelector),
    Dir(Direction),
}

/// Validated arguments, looked up by rule name.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<(&'static str, ArgValue)>,
}

impl Args {
    fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ArgValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn word(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ArgValue::Word(s) | ArgValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.word(name)
    }

    pub fn template(&self, name: &str) -> Option<Arc<ItemTemplate>> {
        match self.get(name)? {
            ArgValue::Template(t) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn item(&self, name: &str) -> Option<&ItemSelector> {
        match self.get(name)? {
            ArgValue::Item(sel) => Some(sel),
            _ => None,
        }
    }

    pub fn direction(&self, name: &str) -> Option<Direction> {
        match self.get(name)? {
            ArgValue::Dir(d) => Some(*d),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Apply `rules` to the intent's arguments in order. The first failing rule rejects the command.
pub fn validate(rules: &[ParamRule], intent: &Intent, catalog: &ItemCatalog, usage: &str) -> Result<Args, CommandError> {
    let mut args = Args::default();
    let mut idx = 0;

    for rule in rules {
        let Some(raw) = intent.arg(idx) else {
            if rule.required {
                return Err(CommandError::Usage(usage.to_string()));
            }
            continue;
        };

        let value = match rule.kind {
            ParamKind::Integer { min, max } => {
                let n: i64 = raw.parse().map_err(|_| invalid(rule, format!("{} must be a whole number.", rule.name)))?;
                if n < min || n > max {
                    return Err(invalid(rule, format!("{} must be between {min} and {max}.", rule.name)));
                }
                ArgValue::Int(n)
            }
            ParamKind::Word => ArgValue::Word(raw.to_string()),
            ParamKind::Text => {
                let text = intent.rest(idx).unwrap_or(raw).trim();
                if text.is_empty() {
                    return Err(invalid(rule, format!("{} cannot be empty.", rule.name)));
                }
                idx = intent.args.len();
                args.values.push((rule.name, ArgValue::Text(text.to_string())));
                continue;
            }
            ParamKind::ItemTemplate => {
                let template = catalog
                    .find_by_name(raw)
                    .ok_or_else(|| CommandError::Domain(DomainError::NotFound(format!("Item '{raw}'"))))?;
                ArgValue::Template(template)
            }
            ParamKind::ItemOrSlot => ArgValue::Item(ItemSelector::parse(raw)),
            ParamKind::Direction => {
                let dir = Direction::parse(raw).ok_or_else(|| invalid(rule, format!("'{raw}' is not a direction.")))?;
                ArgValue::Dir(dir)
            }
        };
        args.values.push((rule.name, value));
        idx += 1;
    }

    if idx < intent.args.len() {
        return Err(CommandError::Usage(usage.to_string()));
    }
    Ok(args)
}

fn invalid(rule: &ParamRule, message: String) -> CommandError {
    CommandError::Domain(DomainError::Validation {
        field: rule.name,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::parser::parse_command;
    use crate::models::item::tests::catalog;

    const DROP: &[ParamRule] = &[
        ParamRule::required("item", ParamKind::ItemOrSlot),
        ParamRule::optional("amount", ParamKind::Integer { min: 1, max: 1000 }),
    ];

    const WHISPER: &[ParamRule] = &[
        ParamRule::required("name", ParamKind::Word),
        ParamRule::required("message", ParamKind::Text),
    ];

    fn run(rules: &[ParamRule], line: &str) -> Result<Args, CommandError> {
        let intent = parse_command(line).unwrap();
        validate(rules, &intent, &catalog(), "/test")
    }

    #[test]
    fn optional_params_may_be_missing() {
        let args = run(DROP, "/drop 0").unwrap();
        assert_eq!(args.item("item"), Some(&ItemSelector::Slot(0)));
        assert_eq!(args.int("amount"), None);
    }

    #[test]
    fn missing_required_is_usage() {
        assert!(matches!(run(DROP, "/drop"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn range_is_enforced() {
        let err = run(DROP, "/drop apple 0").unwrap_err();
        assert!(matches!(
            err,
            CommandError::Domain(DomainError::Validation { field: "amount", .. })
        ));
        assert!(run(DROP, "/drop apple many").is_err());
    }

    #[test]
    fn surplus_arguments_are_rejected() {
        assert!(matches!(run(DROP, "/drop apple 1 2"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn text_swallows_the_rest() {
        let args = run(WHISPER, "/w Bob see you  later").unwrap();
        assert_eq!(args.word("name"), Some("Bob"));
        assert_eq!(args.text("message"), Some("see you  later"));
    }

    #[test]
    fn template_must_exist() {
        let rules = [ParamRule::required("item", ParamKind::ItemTemplate)];
        assert_eq!(run(&rules, "/giveitem short").unwrap().template("item").unwrap().id, "sword");
        assert!(matches!(
            run(&rules, "/giveitem banana"),
            Err(CommandError::Domain(DomainError::NotFound(_)))
        ));
    }

    #[test]
    fn direction_is_parsed() {
        let rules = [ParamRule::required("direction", ParamKind::Direction)];
        assert_eq!(run(&rules, "/move n").unwrap().direction("direction"), Some(Direction::North));
        assert!(run(&rules, "/move up").is_err());
    }
}
