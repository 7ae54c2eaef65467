//! Command-line tokenizer for slash commands.
//!
//! Examples:
//!   "/drop apple 3"           -> key="drop", args=["apple", "3"]
//!   "/w Bob hello there"      -> key="w", args=["Bob", "hello", "there"], rest(1)="hello there"
//!   "/pickup \"short sword\"" -> key="pickup", args=["short sword"]
//!   "hello all"               -> key="say", args=["hello", "all"]
//!
//! Text without a leading slash is treated as `/say`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token text with quotes removed
    pub text: String,
    /// Byte offset of the token in the argument string
    pub start: usize,
    pub quoted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    /// Lowercased command key without the slash
    pub key: String,
    pub args: Vec<Token>,
    /// Everything after the command key, untouched
    pub raw_args: String,
}

impl Intent {
    pub fn arg(&self, idx: usize) -> Option<&str> {
        self.args.get(idx).map(|t| t.text.as_str())
    }

    /// The raw text from argument `idx` to the end of the line, quotes and spacing preserved.
    pub fn rest(&self, idx: usize) -> Option<&str> {
        let tok = self.args.get(idx)?;
        let start = if tok.quoted { tok.start.saturating_sub(1) } else { tok.start };
        self.raw_args.get(start..).map(str::trim_end)
    }
}

/// Split raw input into a command key and its arguments. Returns `None` for blank input.
pub fn parse_command(input: &str) -> Option<Intent> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let (key, raw_args) = match input.strip_prefix('/') {
        Some(cmd) => {
            let (key, rest) = cmd.split_once(char::is_whitespace).unwrap_or((cmd, ""));
            (key.to_lowercase(), rest.trim_start())
        }
        None => ("say".to_string(), input),
    };
    if key.is_empty() {
        return None;
    }

    Some(Intent {
        key,
        args: tokenize(raw_args),
        raw_args: raw_args.to_string(),
    })
}

fn tokenize(s: &str) -> Vec<Token> {
    let mut toks = Vec::new();
    let mut buf = String::new();
    let mut start = 0;
    let mut in_quote = false;

    let push_tok = |quoted: bool, start: usize, buf: &mut String, toks: &mut Vec<Token>| {
        if !buf.is_empty() || quoted {
            toks.push(Token {
                text: std::mem::take(buf),
                start,
                quoted,
            });
        }
    };

    for (i, ch) in s.char_indices() {
        if in_quote {
            if ch == '"' {
                push_tok(true, start, &mut buf, &mut toks);
                in_quote = false;
            } else {
                buf.push(ch);
            }
            continue;
        }
        match ch {
            '"' => {
                // starting a quote right after text -> split
                push_tok(false, start, &mut buf, &mut toks);
                in_quote = true;
                start = i + 1;
            }
            c if c.is_whitespace() => push_tok(false, start, &mut buf, &mut toks),
            _ => {
                if buf.is_empty() {
                    start = i;
                }
                buf.push(ch);
            }
        }
    }
    // an unterminated quote keeps what was typed
    push_tok(in_quote, start, &mut buf, &mut toks);
    toks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(i: &Intent) -> Vec<&str> {
        i.args.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn t_simple_command() {
        let i = parse_command("/drop apple 3").unwrap();
        assert_eq!(i.key, "drop");
        assert_eq!(texts(&i), vec!["apple", "3"]);
    }

    #[test]
    fn t_key_is_lowercased() {
        let i = parse_command("/GIVEITEM Sword").unwrap();
        assert_eq!(i.key, "giveitem");
        assert_eq!(texts(&i), vec!["Sword"]);
    }

    #[test]
    fn t_plain_text_is_say() {
        let i = parse_command("hello   world").unwrap();
        assert_eq!(i.key, "say");
        assert_eq!(i.rest(0), Some("hello   world"));
    }

    #[test]
    fn t_quoted_multiword() {
        let i = parse_command(r#"/pickup "short sword" 1"#).unwrap();
        assert_eq!(texts(&i), vec!["short sword", "1"]);
        assert!(i.args[0].quoted);
    }

    #[test]
    fn t_rest_keeps_spacing_and_apostrophes() {
        let i = parse_command("/w Bob don't  go there").unwrap();
        assert_eq!(i.arg(0), Some("Bob"));
        assert_eq!(i.rest(1), Some("don't  go there"));
    }

    #[test]
    fn t_blank_input() {
        assert!(parse_command("   ").is_none());
        assert!(parse_command("/").is_none());
    }

    #[test]
    fn t_no_args() {
        let i = parse_command("/who").unwrap();
        assert!(i.args.is_empty());
        assert_eq!(i.rest(0), None);
    }

    #[test]
    fn t_unterminated_quote() {
        let i = parse_command(r#"/say "half done"#).unwrap();
        assert_eq!(texts(&i), vec!["half done"]);
    }
}
