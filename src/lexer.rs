pub const PIPE: char = '|';
pub const SPACE: char = ' ';

/// Splits a line on a single delimiter character.
///
/// Runs of the delimiter collapse into one boundary, so no empty token is
/// ever produced, and a trailing delimiter does not add an empty final token.
/// Quotes and escapes carry no meaning here.
pub struct Lexer<'a> {
    input: &'a str,
    delimiter: char,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, delimiter: char) -> Self {
        Self {
            input,
            delimiter,
            position: 0,
        }
    }

    pub fn lex(&mut self) -> Vec<String> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }

    fn next_token(&mut self) -> Option<String> {
        self.skip_delimiters();
        if self.is_eof() {
            return None;
        }

        let rest = &self.input[self.position..];
        let end = rest.find(self.delimiter).unwrap_or(rest.len());
        self.position += end;

        Some(rest[..end].to_string())
    }

    fn skip_delimiters(&mut self) {
        let rest = &self.input[self.position..];
        let trimmed = rest.trim_start_matches(self.delimiter);
        self.position += rest.len() - trimmed.len();
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }
}

/// Splits a line into one token group per pipeline stage.
pub fn split_stages(line: &str) -> Vec<Vec<String>> {
    Lexer::new(line, PIPE)
        .lex()
        .iter()
        .map(|stage| Lexer::new(stage, SPACE).lex())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("hello world", vec!["hello", "world"])]
    #[case("hello    world", vec!["hello", "world"])]
    #[case("   hello world", vec!["hello", "world"])]
    #[case("hello world   ", vec!["hello", "world"])]
    #[case("hello", vec!["hello"])]
    #[case("", vec![])]
    #[case("     ", vec![])]
    #[case(r#"grep "foo bar""#, vec!["grep", r#""foo"#, r#"bar""#])]
    fn split_on_space(#[case] input: &str, #[case] expected: Vec<&str>) {
        assert_eq!(Lexer::new(input, SPACE).lex(), expected);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(5)]
    fn repeated_delimiters_collapse(#[case] k: usize) {
        let sep = SPACE.to_string().repeat(k);
        let line = ["ls", "-l", "/tmp"].join(&sep);
        assert_eq!(
            Lexer::new(&line, SPACE).lex(),
            Lexer::new("ls -l /tmp", SPACE).lex()
        );
    }

    #[test]
    fn trailing_pipe_adds_no_stage() {
        assert_eq!(Lexer::new("ls | wc |", PIPE).lex(), vec!["ls ", " wc "]);
    }

    #[test]
    fn stages_split_then_words() {
        assert_eq!(
            split_stages("cat  file.txt |sort| uniq -c"),
            vec![
                vec!["cat".to_string(), "file.txt".to_string()],
                vec!["sort".to_string()],
                vec!["uniq".to_string(), "-c".to_string()],
            ]
        );
    }

    #[test]
    fn blank_stage_is_kept_as_empty_group() {
        assert_eq!(
            split_stages("ls | | wc"),
            vec![vec!["ls".to_string()], vec![], vec!["wc".to_string()]]
        );
    }

    #[test]
    fn multibyte_input() {
        assert_eq!(Lexer::new("échó  ü", SPACE).lex(), vec!["échó", "ü"]);
    }
}
