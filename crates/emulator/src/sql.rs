//! Minimal SQL dialect understood by the emulator
//!
//! Supported statements:
//!
//! ```text
//! CREATE DATABASE `name`
//! CREATE TABLE t (c1 INT64 NOT NULL, c2 INT64) PRIMARY KEY(c1)
//! INSERT INTO t (c1, c2) VALUES (1, 1)[, (2, NULL) ...]
//! DELETE FROM t WHERE c1 = 1
//! UPDATE t SET c2 = 5[, ...] WHERE c1 = 1
//! ```
//!
//! Keywords and identifiers are case-insensitive. Only INT64 columns and
//! integer/NULL literals exist. Anything else is `InvalidArgument`.

use crate::error::{Result, Status};
use crate::store::{ColumnDef, TableSchema};
use crate::types::Value;

/// A parsed statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `CREATE DATABASE`
    CreateDatabase {
        /// Database id
        name: String,
    },
    /// `CREATE TABLE`
    CreateTable(TableSchema),
    /// `INSERT INTO ... VALUES`
    Insert {
        /// Target table
        table: String,
        /// Column list
        columns: Vec<String>,
        /// One entry per VALUES tuple
        rows: Vec<Vec<Value>>,
    },
    /// `DELETE FROM ... WHERE pk = n`
    Delete {
        /// Target table
        table: String,
        /// Row selector
        filter: KeyFilter,
    },
    /// `UPDATE ... SET ... WHERE pk = n`
    Update {
        /// Target table
        table: String,
        /// Column assignments
        assignments: Vec<(String, Value)>,
        /// Row selector
        filter: KeyFilter,
    },
}

impl Statement {
    /// DDL statements are only accepted by the admin surface
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            Statement::CreateDatabase { .. } | Statement::CreateTable(_)
        )
    }
}

/// `WHERE column = value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilter {
    /// Column compared
    pub column: String,
    /// Literal compared against
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Int(i64),
    LParen,
    RParen,
    Comma,
    Eq,
    Semicolon,
}

fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            ';' => {
                chars.next();
                tokens.push(Token::Semicolon);
            }
            '`' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('`') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(Status::invalid_argument(
                                "unterminated quoted identifier",
                            ))
                        }
                    }
                }
                tokens.push(Token::Quoted(name));
            }
            '-' | '0'..='9' => {
                let mut text = String::new();
                if c == '-' {
                    text.push(c);
                    chars.next();
                }
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = text
                    .parse::<i64>()
                    .map_err(|_| Status::invalid_argument(format!("invalid integer literal: {}", text)))?;
                tokens.push(Token::Int(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&w) = chars.peek() {
                    if w.is_ascii_alphanumeric() || w == '_' {
                        word.push(w);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => {
                return Err(Status::invalid_argument(format!(
                    "unexpected character '{}' in statement",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn keyword(&mut self, keyword: &str) -> Result<()> {
        match self.next() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword) => Ok(()),
            other => Err(unexpected(keyword, other)),
        }
    }

    fn punct(&mut self, expected: Token, label: &str) -> Result<()> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            other => Err(unexpected(label, other)),
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Word(w)) | Some(Token::Quoted(w)) => Ok(w),
            other => Err(unexpected("identifier", other)),
        }
    }

    fn int(&mut self) -> Result<i64> {
        match self.next() {
            Some(Token::Int(v)) => Ok(v),
            other => Err(unexpected("integer literal", other)),
        }
    }

    fn literal(&mut self) -> Result<Value> {
        match self.next() {
            Some(Token::Int(v)) => Ok(Value::Int64(v)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("NULL") => Ok(Value::Null),
            other => Err(unexpected("literal", other)),
        }
    }

    /// Comma-separated list inside parentheses
    fn list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        self.punct(Token::LParen, "(")?;
        let mut items = vec![item(self)?];
        loop {
            match self.next() {
                Some(Token::Comma) => items.push(item(self)?),
                Some(Token::RParen) => return Ok(items),
                other => return Err(unexpected(", or )", other)),
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        if matches!(self.peek(), Some(Token::Semicolon)) {
            self.pos += 1;
        }
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(Status::invalid_argument(format!(
                "unexpected trailing token {:?}",
                t
            ))),
        }
    }

    fn filter(&mut self) -> Result<KeyFilter> {
        self.keyword("WHERE")?;
        let column = self.ident()?;
        self.punct(Token::Eq, "=")?;
        let value = self.int()?;
        Ok(KeyFilter { column, value })
    }

    fn statement(&mut self) -> Result<Statement> {
        let stmt = match self.next() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("CREATE") => {
                if self.peek_keyword("DATABASE") {
                    self.pos += 1;
                    Statement::CreateDatabase { name: self.ident()? }
                } else {
                    self.keyword("TABLE")?;
                    self.create_table()?
                }
            }
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("INSERT") => {
                if self.peek_keyword("INTO") {
                    self.pos += 1;
                }
                let table = self.ident()?;
                let columns = self.list(|p| p.ident())?;
                self.keyword("VALUES")?;
                let mut rows = vec![self.list(|p| p.literal())?];
                while matches!(self.peek(), Some(Token::Comma)) {
                    self.pos += 1;
                    rows.push(self.list(|p| p.literal())?);
                }
                for row in &rows {
                    if row.len() != columns.len() {
                        return Err(Status::invalid_argument(format!(
                            "INSERT has {} columns but a VALUES tuple has {} values",
                            columns.len(),
                            row.len()
                        )));
                    }
                }
                Statement::Insert {
                    table,
                    columns,
                    rows,
                }
            }
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("DELETE") => {
                if self.peek_keyword("FROM") {
                    self.pos += 1;
                }
                let table = self.ident()?;
                let filter = self.filter()?;
                Statement::Delete { table, filter }
            }
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("UPDATE") => {
                let table = self.ident()?;
                self.keyword("SET")?;
                let mut assignments = Vec::new();
                loop {
                    let column = self.ident()?;
                    self.punct(Token::Eq, "=")?;
                    assignments.push((column, self.literal()?));
                    if matches!(self.peek(), Some(Token::Comma)) {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                let filter = self.filter()?;
                Statement::Update {
                    table,
                    assignments,
                    filter,
                }
            }
            other => return Err(unexpected("CREATE, INSERT, DELETE or UPDATE", other)),
        };
        self.finish()?;
        Ok(stmt)
    }

    fn create_table(&mut self) -> Result<Statement> {
        let name = self.ident()?;
        let columns = self.list(|p| {
            let name = p.ident()?;
            let ty = p.ident()?;
            if !ty.eq_ignore_ascii_case("INT64") {
                return Err(Status::invalid_argument(format!(
                    "unsupported column type {} for column {}",
                    ty, name
                )));
            }
            let mut nullable = true;
            if p.peek_keyword("NOT") {
                p.pos += 1;
                p.keyword("NULL")?;
                nullable = false;
            }
            Ok(ColumnDef { name, nullable })
        })?;
        self.keyword("PRIMARY")?;
        self.keyword("KEY")?;
        let key = self.list(|p| p.ident())?;
        let [primary_key] = <[String; 1]>::try_from(key).map_err(|key| {
            Status::invalid_argument(format!(
                "only single-column primary keys are supported, got {}",
                key.len()
            ))
        })?;
        let schema = TableSchema::new(name, columns, primary_key)?;
        Ok(Statement::CreateTable(schema))
    }
}

fn unexpected(expected: &str, found: Option<Token>) -> Status {
    match found {
        Some(t) => Status::invalid_argument(format!("expected {}, found {:?}", expected, t)),
        None => Status::invalid_argument(format!("expected {}, found end of statement", expected)),
    }
}

/// Parse one SQL statement
pub fn parse(sql: &str) -> Result<Statement> {
    let tokens = tokenize(sql)?;
    if tokens.is_empty() {
        return Err(Status::invalid_argument("empty statement"));
    }
    Parser { tokens, pos: 0 }.statement()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_database() {
        let stmt = parse("CREATE DATABASE `test-database`").unwrap();
        assert_eq!(
            stmt,
            Statement::CreateDatabase {
                name: "test-database".into()
            }
        );
        assert!(stmt.is_ddl());
    }

    #[test]
    fn test_parse_create_table() {
        let stmt = parse("CREATE TABLE T (PK INT64 NOT NULL, Val INT64) PRIMARY KEY(PK)").unwrap();
        match stmt {
            Statement::CreateTable(schema) => {
                assert_eq!(schema.name, "T");
                assert_eq!(schema.columns.len(), 2);
                assert!(!schema.columns[0].nullable);
                assert!(schema.columns[1].nullable);
                assert_eq!(schema.primary_key, "PK");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_create_table_rejects_composite_key() {
        let err = parse("CREATE TABLE T (A INT64, B INT64) PRIMARY KEY(A, B)").unwrap_err();
        assert!(err.message.contains("single-column"));
    }

    #[test]
    fn test_parse_insert() {
        let stmt = parse("INSERT INTO T (PK, Val) VALUES (1, 1)").unwrap();
        assert_eq!(
            stmt,
            Statement::Insert {
                table: "T".into(),
                columns: vec!["PK".into(), "Val".into()],
                rows: vec![vec![Value::Int64(1), Value::Int64(1)]],
            }
        );
        assert!(!stmt.is_ddl());
    }

    #[test]
    fn test_parse_insert_multiple_rows_and_null() {
        let stmt = parse("insert into t (pk, val) values (1, NULL), (-2, 3);").unwrap();
        match stmt {
            Statement::Insert { rows, .. } => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0][1], Value::Null);
                assert_eq!(rows[1][0], Value::Int64(-2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_insert_arity_mismatch() {
        assert!(parse("INSERT INTO T (PK, Val) VALUES (1)").is_err());
    }

    #[test]
    fn test_parse_delete() {
        let stmt = parse("DELETE FROM T WHERE PK = 1").unwrap();
        assert_eq!(
            stmt,
            Statement::Delete {
                table: "T".into(),
                filter: KeyFilter {
                    column: "PK".into(),
                    value: 1
                },
            }
        );
    }

    #[test]
    fn test_parse_update() {
        let stmt = parse("UPDATE T SET Val = 2 WHERE PK = 1").unwrap();
        assert_eq!(
            stmt,
            Statement::Update {
                table: "T".into(),
                assignments: vec![("Val".into(), Value::Int64(2))],
                filter: KeyFilter {
                    column: "PK".into(),
                    value: 1
                },
            }
        );
    }

    #[test]
    fn test_parse_rejects_unsupported() {
        assert!(parse("").is_err());
        assert!(parse("SELECT 1").is_err());
        assert!(parse("DELETE FROM T").is_err());
        assert!(parse("DELETE FROM T WHERE PK = 1 extra").is_err());
        assert!(parse("CREATE TABLE T (PK STRING(MAX)) PRIMARY KEY(PK)").is_err());
        assert!(parse("INSERT INTO T (PK) VALUES ('a')").is_err());
    }
}
