//! Line-level lexer for mysqldump output
//!
//! The dump grammar the rewrite cares about is small and line oriented:
//!
//! ```sql
//! CREATE TABLE `order_items` (                              -- begin table definition
//!   `id` int NOT NULL AUTO_INCREMENT,                       -- ordinary member
//!   CONSTRAINT `fk_order` FOREIGN KEY (`order_id`) REFERENCES `orders` (`id`)  -- constraint clause
//! ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;                  -- end of definition
//! ```
//!
//! Each classifier is a pure function of the line text. Identifier extraction goes through
//! the sqlparser tokenizer so back-quoted names with odd characters are handled the same way
//! the server would read them.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use sqlparser::dialect::MySqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::model::ConstraintKind;
use crate::util::contains_ci;

static BEGIN_TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*CREATE\s+TABLE\b").unwrap());

static CONSTRAINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*CONSTRAINT\b").unwrap());

/// `)` then any version comments (e.g. `/*!50100 TABLESPACE `ts1` */`) then `ENGINE=`
static END_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\)\s*((?:/\*!\d+.*?\*/\s*)*ENGINE\s*=.*)$").unwrap()
});

static DATA_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:INSERT|REPLACE)\b").unwrap());

/// `user@host` in any of the quoting styles mysqldump uses, or CURRENT_USER.
const DEFINER_USER: &str =
    r"(?:(?:`[^`]*`|'[^']*'|[^\s@*/]+)@(?:`[^`]*`|'[^']*'|[^\s*/]+)|CURRENT_USER(?:\s*\(\s*\))?)";

/// Version comment whose only content is the definer, e.g. `/*!50017 DEFINER=`root`@`%`*/`
static DEFINER_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)/\*!\d+\s+DEFINER\s*=\s*{}\s*\*/\s*",
        DEFINER_USER
    ))
    .unwrap()
});

/// Inline definer clause, e.g. `CREATE DEFINER=`root`@`%` PROCEDURE`
static DEFINER_CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bDEFINER\s*=\s*{}\s*", DEFINER_USER)).unwrap()
});

/// Start of a `CREATE TABLE` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    /// Unquoted table name, `None` when the line has no back-quoted name
    pub name: Option<String>,
}

/// A named constraint member of a table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintClause<'a> {
    /// Unquoted constraint name, `None` when the clause has no readable name
    pub name: Option<String>,
    pub kind: ConstraintKind,
    /// Clause text without surrounding whitespace or the trailing separator
    pub text: &'a str,
}

/// The `) ENGINE=...;` line closing a table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTrailer<'a> {
    /// Table options following the closing parenthesis
    pub options: &'a str,
}

/// Recognize the line that opens a table definition.
pub fn begin_table_definition(line: &str) -> Option<TableHeader> {
    if !BEGIN_TABLE_RE.is_match(line) {
        return None;
    }
    let name = LineTokens::new(line).and_then(|mut tokens| tokens.parse_create_table_name());
    Some(TableHeader { name })
}

/// Recognize a `CONSTRAINT name ...` member line.
pub fn constraint_clause(line: &str) -> Option<ConstraintClause<'_>> {
    if !CONSTRAINT_RE.is_match(line) {
        return None;
    }
    let text = crate::util::strip_trailing_separator(line.trim());
    let (name, kind) = LineTokens::new(text)
        .and_then(|mut tokens| tokens.parse_constraint_head())
        .map(|(name, kind)| (Some(name), kind))
        .unwrap_or((None, ConstraintKind::Other));
    Some(ConstraintClause { name, kind, text })
}

/// Recognize the line that closes a table definition.
pub fn end_table_definition(line: &str) -> Option<TableTrailer<'_>> {
    END_TABLE_RE.captures(line).map(|caps| TableTrailer {
        options: caps.get(1).map(|m| m.as_str().trim_end()).unwrap_or(""),
    })
}

/// Whether a line is row data (`INSERT`/`REPLACE`).
pub fn is_data_line(line: &str) -> bool {
    DATA_LINE_RE.is_match(line)
}

/// Whether a line carries nothing but whitespace.
#[inline]
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Remove definer annotations from a line.
pub fn strip_definer(line: &str) -> Cow<'_, str> {
    if !contains_ci(line, "DEFINER") {
        return Cow::Borrowed(line);
    }
    match DEFINER_COMMENT_RE.replace_all(line, "") {
        Cow::Borrowed(unchanged) => DEFINER_CLAUSE_RE.replace_all(unchanged, ""),
        Cow::Owned(stripped) => {
            Cow::Owned(DEFINER_CLAUSE_RE.replace_all(&stripped, "").into_owned())
        }
    }
}

/// Whitespace-free token cursor over a single dump line
struct LineTokens {
    tokens: Vec<Token>,
    pos: usize,
}

impl LineTokens {
    fn new(line: &str) -> Option<Self> {
        let dialect = MySqlDialect {};
        let tokens = Tokenizer::new(&dialect, line)
            .tokenize()
            .ok()?
            .into_iter()
            .filter(|t| !matches!(t, Token::Whitespace(_)))
            .collect();
        Some(Self { tokens, pos: 0 })
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current(), Some(Token::Word(w)) if w.keyword == keyword && w.quote_style.is_none())
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Option<()> {
        if self.check_keyword(keyword) {
            self.advance();
            Some(())
        } else {
            None
        }
    }

    /// Parse an identifier; unquoted words must not be one of `reserved`.
    fn parse_identifier(&mut self, reserved: &[Keyword]) -> Option<String> {
        let name = match self.current()? {
            Token::Word(w) if w.quote_style.is_some() => w.value.clone(),
            Token::Word(w) if !reserved.contains(&w.keyword) => w.value.clone(),
            _ => return None,
        };
        self.advance();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Substitution only rewrites back-quoted references, so unquoted table names are refused.
    fn parse_backquoted_identifier(&mut self) -> Option<String> {
        match self.current()? {
            Token::Word(w) if w.quote_style == Some('`') => {}
            _ => return None,
        }
        self.parse_identifier(&[])
    }

    /// `CREATE TABLE [IF NOT EXISTS] [schema.]name`
    fn parse_create_table_name(&mut self) -> Option<String> {
        self.expect_keyword(Keyword::CREATE)?;
        self.expect_keyword(Keyword::TABLE)?;
        if self.check_keyword(Keyword::IF) {
            self.advance();
            self.expect_keyword(Keyword::NOT)?;
            self.expect_keyword(Keyword::EXISTS)?;
        }

        let mut name = self.parse_backquoted_identifier()?;
        if matches!(self.current(), Some(Token::Period)) {
            self.advance();
            name = self.parse_backquoted_identifier()?;
        }

        match self.current() {
            None | Some(Token::LParen) => Some(name),
            Some(Token::Word(w)) if w.keyword == Keyword::LIKE => Some(name),
            _ => None,
        }
    }

    /// `CONSTRAINT name <kind> ...`
    fn parse_constraint_head(&mut self) -> Option<(String, ConstraintKind)> {
        self.expect_keyword(Keyword::CONSTRAINT)?;
        let name = self.parse_identifier(&[
            Keyword::FOREIGN,
            Keyword::CHECK,
            Keyword::PRIMARY,
            Keyword::UNIQUE,
        ])?;
        let kind = if self.check_keyword(Keyword::FOREIGN) {
            ConstraintKind::ForeignKey
        } else if self.check_keyword(Keyword::CHECK) {
            ConstraintKind::Check
        } else {
            ConstraintKind::Other
        };
        Some((name, kind))
    }
}
