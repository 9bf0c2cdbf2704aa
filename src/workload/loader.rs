//! A line-oriented loader for the Workload DSL of §6: declares entities and
//! fields, then adds weighted statements under a `mix` label. Builds on
//! [`ModelBuilder`] and [`parser::parse`](crate::parser::parse) rather than
//! re-parsing field/statement syntax itself.
//!
//! Grammar (one directive per line, blank lines and `#` comments ignored):
//! ```text
//! entity <Name> <count>
//! field <Name> id <size>
//! field <Name> integer|float|date <size>
//! field <Name> string <len>
//! field <Name> foreign_key <TargetEntity> one|many <size>
//! end
//! budget <storage_budget>
//! mix <label>
//! stmt <weight> <statement text>
//! ```
//! Time-dependent workloads (`TimeSteps`/`F`, §6) are not supported by this
//! loader; see DESIGN.md.

use crate::error::{AdvisorError, Result};
use crate::model::{EntityId, FieldKind, Model, ModelBuilder};
use crate::workload::Workload;

struct PendingEntity {
    name: String,
    count: f64,
    fields: Vec<(String, FieldKind, usize)>,
}

/// Parses `source` into a `(Model, Workload)` pair.
pub fn load(source: &str) -> Result<Workload> {
    let mut entities: Vec<PendingEntity> = Vec::new();
    let mut current: Option<PendingEntity> = None;
    let mut budget = 0.0_f64;
    let mut mix = "default".to_string();
    let mut stmt_lines: Vec<(f64, String)> = Vec::new();

    for (lineno, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let keyword = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        match keyword {
            "entity" => {
                if let Some(pending) = current.take() {
                    entities.push(pending);
                }
                let mut fields = rest.splitn(2, char::is_whitespace);
                let name = fields.next().unwrap_or("").to_string();
                let count: f64 = fields
                    .next()
                    .unwrap_or("0")
                    .trim()
                    .parse()
                    .map_err(|_| dsl_error(lineno, "entity count must be a number"))?;
                current = Some(PendingEntity { name, count, fields: Vec::new() });
            }
            "field" => {
                let entity = current.as_mut().ok_or_else(|| dsl_error(lineno, "field declared outside an entity block"))?;
                let mut tokens = rest.split_whitespace();
                let name = tokens.next().ok_or_else(|| dsl_error(lineno, "field needs a name"))?.to_string();
                let kind_word = tokens.next().ok_or_else(|| dsl_error(lineno, "field needs a kind"))?;
                match kind_word {
                    "id" => {
                        let size = parse_size(&mut tokens, lineno)?;
                        entity.fields.push((name, FieldKind::Id, size));
                    }
                    "integer" => {
                        let size = parse_size(&mut tokens, lineno)?;
                        entity.fields.push((name, FieldKind::Integer, size));
                    }
                    "float" => {
                        let size = parse_size(&mut tokens, lineno)?;
                        entity.fields.push((name, FieldKind::Float, size));
                    }
                    "date" => {
                        let size = parse_size(&mut tokens, lineno)?;
                        entity.fields.push((name, FieldKind::Date, size));
                    }
                    "string" => {
                        let len: usize = tokens
                            .next()
                            .ok_or_else(|| dsl_error(lineno, "string field needs a length"))?
                            .parse()
                            .map_err(|_| dsl_error(lineno, "string length must be a number"))?;
                        entity.fields.push((name, FieldKind::String(len), len));
                    }
                    "foreign_key" => {
                        let target = tokens.next().ok_or_else(|| dsl_error(lineno, "foreign_key needs a target entity"))?.to_string();
                        let many = match tokens.next() {
                            Some("many") => true,
                            Some("one") | None => false,
                            Some(other) => return Err(dsl_error(lineno, &format!("expected 'one' or 'many', found '{other}'"))),
                        };
                        let size = parse_size(&mut tokens, lineno)?;
                        // Target is resolved to an EntityId once every entity
                        // has been declared, below; stash it in the name.
                        let tagged_name = format!("{name}\0{target}");
                        entity.fields.push((
                            tagged_name,
                            FieldKind::ForeignKey { target: EntityId(usize::MAX), many },
                            size,
                        ));
                    }
                    other => return Err(dsl_error(lineno, &format!("unknown field kind '{other}'"))),
                }
            }
            "end" => {
                if let Some(pending) = current.take() {
                    entities.push(pending);
                }
            }
            "budget" => {
                budget = rest
                    .parse()
                    .map_err(|_| dsl_error(lineno, "budget must be a number"))?;
            }
            "mix" => {
                mix = rest.to_string();
            }
            "stmt" => {
                let mut fields = rest.splitn(2, char::is_whitespace);
                let weight: f64 = fields
                    .next()
                    .ok_or_else(|| dsl_error(lineno, "stmt needs a weight"))?
                    .parse()
                    .map_err(|_| dsl_error(lineno, "stmt weight must be a number"))?;
                let text = fields.next().unwrap_or("").to_string();
                stmt_lines.push((weight, text));
            }
            other => return Err(dsl_error(lineno, &format!("unknown directive '{other}'"))),
        }
    }
    if let Some(pending) = current.take() {
        entities.push(pending);
    }

    let model = build_model(entities)?;

    let mut workload = Workload::new(model.clone(), budget, mix);
    for (weight, text) in stmt_lines {
        match crate::parser::parse(&model, &text) {
            Ok(statement) => {
                workload = workload.with_statement(statement, weight)?;
            }
            Err(e) => {
                workload = workload.record_error(e.to_string());
            }
        }
    }
    Ok(workload)
}

fn parse_size<'a>(tokens: &mut impl Iterator<Item = &'a str>, lineno: usize) -> Result<usize> {
    tokens
        .next()
        .ok_or_else(|| dsl_error(lineno, "field needs a byte size"))?
        .parse()
        .map_err(|_| dsl_error(lineno, "byte size must be a number"))
}

fn dsl_error(lineno: usize, reason: &str) -> AdvisorError {
    AdvisorError::InvalidWorkload(format!("line {}: {reason}", lineno + 1))
}

fn build_model(entities: Vec<PendingEntity>) -> Result<Model> {
    let name_index: std::collections::HashMap<String, usize> = entities
        .iter()
        .enumerate()
        .map(|(i, e)| (e.name.clone(), i))
        .collect();

    let mut builder = ModelBuilder::new();
    for entity in &entities {
        let resolved_fields: Vec<(String, FieldKind, usize)> = entity
            .fields
            .iter()
            .map(|(name, kind, size)| {
                if let Some(stripped) = name.split_once('\0') {
                    let target_name = stripped.1;
                    let target_idx = *name_index.get(target_name).ok_or_else(|| {
                        AdvisorError::InvalidWorkload(format!("foreign_key target '{target_name}' is not a declared entity"))
                    })?;
                    let many = matches!(kind, FieldKind::ForeignKey { many: true, .. });
                    Ok((stripped.0.to_string(), FieldKind::ForeignKey { target: EntityId(target_idx), many }, *size))
                } else {
                    Ok((name.clone(), kind.clone(), *size))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let field_refs: Vec<(&str, FieldKind, usize)> =
            resolved_fields.iter().map(|(n, k, s)| (n.as_str(), k.clone(), *s)).collect();
        builder = builder.entity(&entity.name, entity.count, field_refs)?;
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_s1_workload() {
        let source = r#"
            entity User 100
              field UserId id 8
              field City string 20
              field Username string 30
            end
            budget 1000000
            mix default
            stmt 1.0 SELECT Username FROM User WHERE User.City = ?
        "#;
        let workload = load(source).unwrap();
        assert!(workload.valid());
        assert_eq!(workload.len(), 1);
        assert_eq!(workload.storage_budget(), 1_000_000.0);
    }

    #[test]
    fn loads_foreign_key_between_entities() {
        let source = r#"
            entity User 100
              field UserId id 8
            end
            entity Tweet 1000
              field TweetId id 8
              field User foreign_key User one 8
            end
            budget 1000
        "#;
        let workload = load(source).unwrap();
        let model = workload.model();
        let user = model.entity_by_name("User").unwrap();
        let tweet = model.entity_by_name("Tweet").unwrap();
        assert!(model.foreign_key_between(user, tweet).is_some());
    }

    #[test]
    fn loads_workload_round_tripped_through_a_file() {
        use std::io::Write;

        let source = r#"
            entity User 100
              field UserId id 8
              field City string 20
              field Username string 30
            end
            budget 1000000
            mix default
            stmt 1.0 SELECT Username FROM User WHERE User.City = ?
        "#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(source.as_bytes()).unwrap();

        let read_back = std::fs::read_to_string(file.path()).unwrap();
        let workload = load(&read_back).unwrap();
        assert!(workload.valid());
        assert_eq!(workload.len(), 1);
    }

    #[test]
    fn records_unparseable_statement_without_aborting_load() {
        let source = r#"
            entity User 100
              field UserId id 8
              field City string 20
            end
            budget 1000
            stmt 1.0 SELECT Nonexistent FROM User WHERE User.City = ?
        "#;
        let workload = load(source).unwrap();
        assert!(!workload.valid());
        assert_eq!(workload.errors().len(), 1);
    }
}
