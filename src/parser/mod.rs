//! Recursive-descent parser for the statement grammar of §6. Produces
//! [`Statement`](crate::statement::Statement) values against a frozen
//! [`Model`], resolving dotted entity/field names as it goes.

mod lexer;

use lexer::Token;

use crate::error::{AdvisorError, Result};
use crate::model::{FieldId, Model, Path};
use crate::statement::{Condition, Insert, Literal, Operator, Query, Setting, Statement, Update};

/// Parses one statement of §6's grammar against `model`.
pub fn parse(model: &Model, source: &str) -> Result<Statement> {
    let tokens = lexer::tokenize(source)?;
    let mut parser = Parser { model, tokens, pos: 0 };
    let statement = parser.parse_statement()?;
    parser.expect(Token::Eof)?;
    Ok(statement)
}

struct Parser<'m> {
    model: &'m Model,
    tokens: lexer::Tokens,
    pos: usize,
}

impl<'m> Parser<'m> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn pos_at_cursor(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(AdvisorError::ParseFailed {
                pos: self.pos_at_cursor(),
                reason: format!("expected {expected:?}, found {:?}", self.peek()),
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.advance() {
            Token::Identifier(name) => Ok(name),
            other => Err(AdvisorError::ParseFailed {
                pos: self.pos_at_cursor(),
                reason: format!("expected identifier, found {other:?}"),
            }),
        }
    }

    /// `<ident>(.<ident>)*`
    fn parse_dotted(&mut self) -> Result<Vec<String>> {
        let mut segments = vec![self.expect_identifier()?];
        while *self.peek() == Token::Dot {
            self.advance();
            segments.push(self.expect_identifier()?);
        }
        Ok(segments)
    }

    /// `<path> := <ident>(.<ident>)*`, resolved entity-by-entity against `model`.
    fn parse_path(&mut self) -> Result<Path> {
        let segments = self.parse_dotted()?;
        let entities = segments
            .iter()
            .map(|name| self.model.entity_by_name(name))
            .collect::<Result<Vec<_>>>()?;
        Path::new(self.model, entities)
    }

    /// `<field> := <ident>.<ident>(.<ident>)*` — resolved as the entity named
    /// by the second-to-last segment and the field named by the last one;
    /// intermediate segments describe the traversal and are validated
    /// against the statement's own path by the AST constructors.
    fn parse_field(&mut self) -> Result<FieldId> {
        let segments = self.parse_dotted()?;
        if segments.len() < 2 {
            return Err(AdvisorError::ParseFailed {
                pos: self.pos_at_cursor(),
                reason: "a field reference needs an entity and a field name".into(),
            });
        }
        let entity_name = &segments[segments.len() - 2];
        let field_name = &segments[segments.len() - 1];
        let entity = self.model.entity_by_name(entity_name)?;
        self.model.field_by_name(entity, field_name)
    }

    fn parse_operator(&mut self) -> Result<Operator> {
        let op = match self.peek() {
            Token::Eq => Operator::Eq,
            Token::Ne => Operator::Ne,
            Token::Lt => Operator::Lt,
            Token::Le => Operator::Le,
            Token::Gt => Operator::Gt,
            Token::Ge => Operator::Ge,
            other => {
                return Err(AdvisorError::ParseFailed {
                    pos: self.pos_at_cursor(),
                    reason: format!("expected a comparison operator, found {other:?}"),
                })
            }
        };
        self.advance();
        Ok(op)
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        let lit = match self.advance() {
            Token::Placeholder => Literal::Placeholder,
            Token::IntegerLit(v) => Literal::Integer(v),
            Token::FloatLit(v) => Literal::Float(v),
            Token::StringLit(v) => Literal::Str(v),
            other => {
                return Err(AdvisorError::ParseFailed {
                    pos: self.pos_at_cursor(),
                    reason: format!("expected a literal or '?', found {other:?}"),
                })
            }
        };
        Ok(lit)
    }

    /// `<cond> := <field> (=|!=|<|<=|>|>=) (<literal>|'?')`
    fn parse_condition(&mut self) -> Result<Condition> {
        let field = self.parse_field()?;
        let op = self.parse_operator()?;
        let value = self.parse_literal()?;
        Ok(Condition { field, op, value })
    }

    fn parse_conditions(&mut self) -> Result<Vec<Condition>> {
        let mut conditions = vec![self.parse_condition()?];
        while *self.peek() == Token::And {
            self.advance();
            conditions.push(self.parse_condition()?);
        }
        Ok(conditions)
    }

    /// `<setting> := <field> = (<literal>|'?')`
    fn parse_setting(&mut self) -> Result<Setting> {
        let field = self.parse_field()?;
        self.expect(Token::Eq)?;
        let value = self.parse_literal()?;
        Ok(Setting { field, value })
    }

    fn parse_settings(&mut self) -> Result<Vec<Setting>> {
        let mut settings = vec![self.parse_setting()?];
        while *self.peek() == Token::Comma {
            self.advance();
            settings.push(self.parse_setting()?);
        }
        Ok(settings)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.peek() {
            Token::Select => self.parse_query().map(Statement::Query),
            Token::Update => self.parse_update().map(Statement::Update),
            Token::Insert => self.parse_insert().map(Statement::Insert),
            Token::Delete => self.parse_delete(),
            other => Err(AdvisorError::ParseFailed {
                pos: self.pos_at_cursor(),
                reason: format!("expected SELECT, UPDATE, INSERT or DELETE, found {other:?}"),
            }),
        }
    }

    fn parse_query(&mut self) -> Result<Query> {
        self.expect(Token::Select)?;
        let mut select = Vec::new();
        if *self.peek() == Token::Star {
            self.advance();
        } else {
            select.push(self.parse_field()?);
            while *self.peek() == Token::Comma {
                self.advance();
                select.push(self.parse_field()?);
            }
        }
        self.expect(Token::From)?;
        let path = self.parse_path()?;

        let conditions = if *self.peek() == Token::Where {
            self.advance();
            self.parse_conditions()?
        } else {
            Vec::new()
        };

        let order_by = if *self.peek() == Token::Order {
            self.advance();
            self.expect(Token::By)?;
            let mut fields = vec![self.parse_field()?];
            while *self.peek() == Token::Comma {
                self.advance();
                fields.push(self.parse_field()?);
            }
            fields
        } else {
            Vec::new()
        };

        let limit = if *self.peek() == Token::Limit {
            self.advance();
            match self.advance() {
                Token::IntegerLit(n) if n >= 0 => Some(n as usize),
                other => {
                    return Err(AdvisorError::ParseFailed {
                        pos: self.pos_at_cursor(),
                        reason: format!("expected a non-negative integer after LIMIT, found {other:?}"),
                    })
                }
            }
        } else {
            None
        };

        let select = if select.is_empty() {
            // `SELECT *` resolves to every field of the path's last entity.
            self.model.entity(path.last()).fields.clone()
        } else {
            select
        };

        Query::new(self.model, select, path, conditions, order_by, limit)
    }

    fn parse_update(&mut self) -> Result<Update> {
        self.expect(Token::Update)?;
        let target_name = self.expect_identifier()?;
        let target = self.model.entity_by_name(&target_name)?;

        let path = if *self.peek() == Token::From {
            self.advance();
            self.parse_path()?
        } else {
            Path::single(target)
        };

        self.expect(Token::Set)?;
        let settings = self.parse_settings()?;

        let conditions = if *self.peek() == Token::Where {
            self.advance();
            self.parse_conditions()?
        } else {
            Vec::new()
        };

        Update::new(self.model, target, path, settings, conditions)
    }

    fn parse_insert(&mut self) -> Result<Insert> {
        self.expect(Token::Insert)?;
        self.expect(Token::Into)?;
        let target_name = self.expect_identifier()?;
        let target = self.model.entity_by_name(&target_name)?;
        self.expect(Token::Set)?;
        let settings = self.parse_settings()?;
        Insert::new(self.model, target, settings)
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect(Token::Delete)?;
        let target_name = self.expect_identifier()?;
        let target = self.model.entity_by_name(&target_name)?;

        let path = if *self.peek() == Token::From {
            self.advance();
            Some(self.parse_path()?)
        } else {
            None
        };

        let conditions = if *self.peek() == Token::Where {
            self.advance();
            self.parse_conditions()?
        } else {
            Vec::new()
        };

        Ok(Statement::Delete(crate::statement::Delete { target, path, conditions }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityId, FieldKind, ModelBuilder};

    fn user_tweet_model() -> Model {
        ModelBuilder::new()
            .entity(
                "User",
                100.0,
                vec![
                    ("UserId", FieldKind::Id, 8),
                    ("City", FieldKind::String(20), 20),
                    ("Username", FieldKind::String(30), 30),
                ],
            )
            .unwrap()
            .entity(
                "Tweet",
                1000.0,
                vec![
                    ("TweetId", FieldKind::Id, 8),
                    ("Body", FieldKind::String(140), 140),
                    (
                        "User",
                        FieldKind::ForeignKey { target: EntityId(0), many: false },
                        8,
                    ),
                ],
            )
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn parses_s1_query() {
        let model = user_tweet_model();
        let stmt = parse(&model, "SELECT Username FROM User WHERE User.City = ?").unwrap();
        match stmt {
            Statement::Query(q) => {
                assert_eq!(q.select.len(), 1);
                assert_eq!(q.conditions.len(), 1);
            }
            _ => panic!("expected a query"),
        }
    }

    #[test]
    fn parses_update_with_from_path() {
        let model = user_tweet_model();
        let stmt = parse(
            &model,
            "UPDATE User SET Username = ? WHERE User.City = ?",
        )
        .unwrap();
        assert!(matches!(stmt, Statement::Update(_)));
    }

    #[test]
    fn parses_insert() {
        let model = user_tweet_model();
        let stmt = parse(&model, "INSERT INTO User SET UserId = ?, City = ?").unwrap();
        assert!(matches!(stmt, Statement::Insert(_)));
    }

    #[test]
    fn rejects_multi_range_at_parse_time() {
        let model = user_tweet_model();
        let result = parse(
            &model,
            "SELECT UserId FROM User WHERE User.UserId > 1 AND User.UserId < 3",
        );
        assert!(matches!(result, Err(AdvisorError::InvalidStatement(_))));
    }

    #[test]
    fn reports_parse_failure_position() {
        let model = user_tweet_model();
        let result = parse(&model, "SELECT Username User WHERE User.City = ?");
        assert!(matches!(result, Err(AdvisorError::ParseFailed { .. })));
    }
}
