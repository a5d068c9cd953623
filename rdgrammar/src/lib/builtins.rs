/// The tokens registered by a grammar's `usedefaulttokens` option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinToken {
    Identifier,
    Whitespace,
    Integer,
    Float,
    SingleQuotedString,
    DoubleQuotedString,
    SingleLineComment,
    MultiLineComment,
    Boolean,
    RegularExpression,
}

impl BuiltinToken {
    /// All built-in tokens, in the order they are registered.
    pub const ALL: [BuiltinToken; 10] = [
        BuiltinToken::Identifier,
        BuiltinToken::Whitespace,
        BuiltinToken::Integer,
        BuiltinToken::Float,
        BuiltinToken::SingleQuotedString,
        BuiltinToken::DoubleQuotedString,
        BuiltinToken::SingleLineComment,
        BuiltinToken::MultiLineComment,
        BuiltinToken::Boolean,
        BuiltinToken::RegularExpression,
    ];

    /// The rule name the token is registered under.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinToken::Identifier => "IDENTIFIER",
            BuiltinToken::Whitespace => "WHITESPACE",
            BuiltinToken::Integer => "INTEGER",
            BuiltinToken::Float => "FLOAT",
            BuiltinToken::SingleQuotedString => "SINGLEQUOTEDSTRING",
            BuiltinToken::DoubleQuotedString => "DOUBLEQUOTEDSTRING",
            BuiltinToken::SingleLineComment => "SINGLELINECOMMENT",
            BuiltinToken::MultiLineComment => "MULTILINECOMMENT",
            BuiltinToken::Boolean => "BOOLEAN",
            BuiltinToken::RegularExpression => "REGULAREXPRESSION",
        }
    }

    pub fn regex(self) -> &'static str {
        match self {
            BuiltinToken::Identifier => r"[a-zA-Z_][a-zA-Z_0-9]*",
            BuiltinToken::Whitespace => r"\s+",
            BuiltinToken::Integer => r"-?\d+",
            BuiltinToken::Float => r"-?\d+(\.\d+)?(e\d+)?",
            BuiltinToken::SingleQuotedString => r#"'(?:[^\\']|\\[btnfr"'\\])*'"#,
            BuiltinToken::DoubleQuotedString => r#""(?:[^\\"]|\\[btnfr"'\\])*""#,
            BuiltinToken::SingleLineComment => r"//[^\n]*(?:\n|$)",
            BuiltinToken::MultiLineComment => r"(?s)/\*.*?\*/",
            BuiltinToken::Boolean => r"true|false",
            BuiltinToken::RegularExpression => r"/(?:[^\\/\n]|\\.)*/",
        }
    }

    /// Is this token skipped automatically between other tokens?
    pub fn is_whitespace(self) -> bool {
        matches!(
            self,
            BuiltinToken::Whitespace
                | BuiltinToken::SingleLineComment
                | BuiltinToken::MultiLineComment
        )
    }
}

#[cfg(test)]
mod test {
    use super::BuiltinToken;
    use regex::Regex;

    fn matched(t: BuiltinToken, s: &str) -> Option<String> {
        let re = Regex::new(&format!("\\A(?:{})", t.regex())).unwrap();
        re.find(s).map(|m| m.as_str().to_owned())
    }

    #[test]
    fn builtin_regexes() {
        assert_eq!(
            matched(BuiltinToken::Identifier, "foo_1 bar"),
            Some("foo_1".to_owned())
        );
        assert_eq!(matched(BuiltinToken::Identifier, "1foo"), None);
        assert_eq!(
            matched(BuiltinToken::SingleQuotedString, r"'it\'s' x"),
            Some(r"'it\'s'".to_owned())
        );
        assert_eq!(
            matched(BuiltinToken::DoubleQuotedString, r#""a\"b" c"#),
            Some(r#""a\"b""#.to_owned())
        );
        assert_eq!(
            matched(BuiltinToken::SingleLineComment, "// x\ny"),
            Some("// x\n".to_owned())
        );
        assert_eq!(
            matched(BuiltinToken::SingleLineComment, "// at eof"),
            Some("// at eof".to_owned())
        );
        assert_eq!(
            matched(BuiltinToken::MultiLineComment, "/* a\n * b */ c */"),
            Some("/* a\n * b */".to_owned())
        );
        assert_eq!(
            matched(BuiltinToken::RegularExpression, r"/a\/b/ = /c/"),
            Some(r"/a\/b/".to_owned())
        );
        assert_eq!(
            matched(BuiltinToken::Float, "-3.25e2;"),
            Some("-3.25e2".to_owned())
        );
    }
}
