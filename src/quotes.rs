use crate::parser::Expression;

pub const DEFAULT_QUOTED_COMMAND: &str = "grep";

/// Strips one pair of surrounding double quotes from the arguments of every
/// command named `name`.
///
/// The lexer has already split on spaces, so a quoted phrase such as
/// `"foo bar"` arrives as the words `"foo` and `bar"`. Those are rejoined
/// with a single space before the quotes are stripped. A phrase that never
/// closes is left as the lexer produced it, except that a lone `"` counts
/// as a quoted empty string. Escaped, nested or partial quotes are not
/// understood.
pub fn strip_quotes(expression: &mut Expression, name: &str) {
    for cmd in expression.commands.iter_mut().filter(|cmd| cmd.name() == name) {
        let mut args = cmd.args.drain(1..).collect::<Vec<_>>().into_iter();
        while let Some(arg) = args.next() {
            let words = if opens_phrase(&arg) {
                join_phrase(arg, &mut args)
            } else {
                vec![arg]
            };
            cmd.args.extend(words.into_iter().map(unquote));
        }
    }
}

fn opens_phrase(arg: &str) -> bool {
    arg.starts_with('"') && (arg.len() == 1 || !is_quoted(arg))
}

/// First and last character are both `"`, which holds for a lone `"` too.
fn is_quoted(arg: &str) -> bool {
    arg.starts_with('"') && arg.ends_with('"')
}

/// Collects words up to the one closing the phrase opened by `first`.
/// Returns the words unjoined when the phrase is never closed.
fn join_phrase(first: String, rest: &mut impl Iterator<Item = String>) -> Vec<String> {
    let mut words = vec![first];
    for word in rest.by_ref() {
        let closes = word.ends_with('"');
        words.push(word);
        if closes {
            return vec![words.join(" ")];
        }
    }
    words
}

fn unquote(arg: String) -> String {
    if !is_quoted(&arg) {
        return arg;
    }
    let inner = &arg[1..];
    inner.strip_suffix('"').unwrap_or(inner).to_string()
}
