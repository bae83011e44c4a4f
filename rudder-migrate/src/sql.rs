//! Migration script parsing.
//!
//! A migration script is plain SQL. Single-file migrations carry both
//! directions, separated by annotation comments:
//!
//! ```sql
//! -- +rudder Up
//! CREATE TABLE post (id int NOT NULL, title text);
//!
//! -- +rudder Down
//! DROP TABLE post;
//! ```
//!
//! Statements end with a semicolon at the end of a line. Bodies that contain
//! semicolons of their own (functions, triggers) are wrapped in
//! `-- +rudder StatementBegin` / `-- +rudder StatementEnd` and kept whole.

use crate::error::{MigrateResult, MigrationError};

/// Annotation prefix recognized in migration scripts.
pub const ANNOTATION_PREFIX: &str = "-- +rudder";

/// Parsed SQL for both directions of a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSql {
    /// Statements applied when migrating forward.
    pub up: Vec<String>,
    /// Statements applied when reverting.
    pub down: Vec<String>,
}

impl MigrationSql {
    /// Check if there are no statements in either direction.
    pub fn is_empty(&self) -> bool {
        self.up.is_empty() && self.down.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Annotation {
    Up,
    Down,
    StatementBegin,
    StatementEnd,
}

fn parse_annotation(line: &str) -> Option<Annotation> {
    let rest = line.trim().strip_prefix(ANNOTATION_PREFIX)?;
    match rest.trim() {
        "Up" => Some(Annotation::Up),
        "Down" => Some(Annotation::Down),
        "StatementBegin" => Some(Annotation::StatementBegin),
        "StatementEnd" => Some(Annotation::StatementEnd),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

/// Parse a single-file migration with `Up` / `Down` annotations.
///
/// Text before the first annotation is ignored. A script without an `Up`
/// annotation is rejected.
pub fn parse_annotated(source: &str) -> MigrateResult<MigrationSql> {
    let mut sql = MigrationSql::default();
    let mut section = Section::Preamble;
    let mut seen_up = false;
    let mut splitter = StatementSplitter::default();

    for (idx, line) in source.lines().enumerate() {
        match (parse_annotation(line), section) {
            (Some(Annotation::Up), _) => {
                splitter.finish_into(section_target(&mut sql, section), idx)?;
                section = Section::Up;
                seen_up = true;
            }
            (Some(Annotation::Down), _) => {
                splitter.finish_into(section_target(&mut sql, section), idx)?;
                section = Section::Down;
            }
            (_, Section::Preamble) => {}
            (Some(other), _) => {
                if let Some(stmt) = splitter.annotate(other, idx)? {
                    section_target(&mut sql, section).push(stmt);
                }
            }
            (None, _) => {
                if let Some(stmt) = splitter.push_line(line) {
                    section_target(&mut sql, section).push(stmt);
                }
            }
        }
    }
    let line_count = source.lines().count();
    splitter.finish_into(section_target(&mut sql, section), line_count)?;

    if !seen_up {
        return Err(MigrationError::invalid_migration(format!(
            "no '{} Up' annotation found",
            ANNOTATION_PREFIX
        )));
    }

    Ok(sql)
}

/// Split a one-direction script (`*.up.sql` / `*.down.sql`) into statements.
pub fn split_statements(source: &str) -> MigrateResult<Vec<String>> {
    let mut statements = Vec::new();
    let mut splitter = StatementSplitter::default();

    for (idx, line) in source.lines().enumerate() {
        match parse_annotation(line) {
            Some(annotation @ (Annotation::StatementBegin | Annotation::StatementEnd)) => {
                if let Some(stmt) = splitter.annotate(annotation, idx)? {
                    statements.push(stmt);
                }
            }
            Some(Annotation::Up | Annotation::Down) => {}
            None => {
                if let Some(stmt) = splitter.push_line(line) {
                    statements.push(stmt);
                }
            }
        }
    }
    splitter.finish_into(&mut statements, source.lines().count())?;

    Ok(statements)
}

fn section_target(sql: &mut MigrationSql, section: Section) -> &mut Vec<String> {
    match section {
        // Preamble text is discarded; the splitter never yields there.
        Section::Preamble | Section::Up => &mut sql.up,
        Section::Down => &mut sql.down,
    }
}

/// Accumulates lines until a statement is complete.
#[derive(Debug, Default)]
struct StatementSplitter {
    buffer: String,
    in_block: Option<usize>,
}

impl StatementSplitter {
    /// Handle a block annotation; a block end yields the whole block.
    fn annotate(&mut self, annotation: Annotation, line_idx: usize) -> MigrateResult<Option<String>> {
        match annotation {
            Annotation::StatementBegin => {
                if let Some(open) = self.in_block {
                    return Err(MigrationError::invalid_migration(format!(
                        "line {}: StatementBegin inside the block opened on line {}",
                        line_idx + 1,
                        open + 1
                    )));
                }
                let pending = self.take();
                self.in_block = Some(line_idx);
                Ok(pending)
            }
            Annotation::StatementEnd => {
                if self.in_block.take().is_none() {
                    return Err(MigrationError::invalid_migration(format!(
                        "line {}: StatementEnd without StatementBegin",
                        line_idx + 1
                    )));
                }
                Ok(self.take())
            }
            Annotation::Up | Annotation::Down => Ok(None),
        }
    }

    /// Feed one line; returns a statement when one completes.
    fn push_line(&mut self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        if self.in_block.is_none() && self.buffer.trim().is_empty() && is_comment_or_blank(trimmed) {
            return None;
        }

        self.buffer.push_str(line);
        self.buffer.push('\n');

        if self.in_block.is_none() && trimmed.ends_with(';') {
            return self.take();
        }
        None
    }

    fn take(&mut self) -> Option<String> {
        let stmt = self.buffer.trim().to_string();
        self.buffer.clear();
        if stmt.is_empty() { None } else { Some(stmt) }
    }

    /// Flush any pending statement at a section boundary.
    fn finish_into(&mut self, target: &mut Vec<String>, line_idx: usize) -> MigrateResult<()> {
        if let Some(open) = self.in_block {
            return Err(MigrationError::invalid_migration(format!(
                "line {}: StatementBegin on line {} was never closed",
                line_idx + 1,
                open + 1
            )));
        }
        if let Some(stmt) = self.take() {
            target.push(stmt);
        }
        Ok(())
    }
}

fn is_comment_or_blank(line: &str) -> bool {
    line.is_empty() || line.starts_with("--")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_annotated_both_directions() {
        let source = r#"
-- create the first table
-- +rudder Up
CREATE TABLE x (id int NOT NULL);
INSERT INTO x (id) VALUES (1);

-- +rudder Down
DROP TABLE x;
"#;
        let sql = parse_annotated(source).unwrap();
        assert_eq!(
            sql.up,
            vec![
                "CREATE TABLE x (id int NOT NULL);".to_string(),
                "INSERT INTO x (id) VALUES (1);".to_string(),
            ]
        );
        assert_eq!(sql.down, vec!["DROP TABLE x;".to_string()]);
    }

    #[test]
    fn test_multiline_statement() {
        let source = "-- +rudder Up\nCREATE TABLE y (\n  id int,\n  name text\n);\n";
        let sql = parse_annotated(source).unwrap();
        assert_eq!(sql.up, vec!["CREATE TABLE y (\n  id int,\n  name text\n);".to_string()]);
        assert!(sql.down.is_empty());
    }

    #[test]
    fn test_statement_block_kept_whole() {
        let source = r#"-- +rudder Up
-- +rudder StatementBegin
CREATE FUNCTION touch() RETURNS trigger AS $$
BEGIN
  NEW.updated_at = now();
  RETURN NEW;
END;
$$ LANGUAGE plpgsql;
-- +rudder StatementEnd
CREATE TABLE z (id int);
-- +rudder Down
DROP TABLE z;
DROP FUNCTION touch();
"#;
        let sql = parse_annotated(source).unwrap();
        assert_eq!(sql.up.len(), 2);
        assert!(sql.up[0].starts_with("CREATE FUNCTION touch()"));
        assert!(sql.up[0].ends_with("LANGUAGE plpgsql;"));
        assert_eq!(sql.up[1], "CREATE TABLE z (id int);");
        assert_eq!(sql.down.len(), 2);
    }

    #[test]
    fn test_missing_up_annotation() {
        let err = parse_annotated("CREATE TABLE x (id int);").unwrap_err();
        assert!(matches!(err, MigrationError::InvalidMigration(_)));
    }

    #[test]
    fn test_unclosed_block() {
        let source = "-- +rudder Up\n-- +rudder StatementBegin\nSELECT 1;\n-- +rudder Down\n";
        assert!(parse_annotated(source).is_err());
    }

    #[test]
    fn test_trailing_statement_without_semicolon() {
        let sql = parse_annotated("-- +rudder Up\nALTER TABLE x ADD COLUMN y int").unwrap();
        assert_eq!(sql.up, vec!["ALTER TABLE x ADD COLUMN y int".to_string()]);
    }

    #[test]
    fn test_split_statements_plain_script() {
        let stmts = split_statements("-- adds y\nALTER TABLE x ADD COLUMN y int;\n\nUPDATE x SET y = 0;\n").unwrap();
        assert_eq!(
            stmts,
            vec![
                "ALTER TABLE x ADD COLUMN y int;".to_string(),
                "UPDATE x SET y = 0;".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_down_section() {
        let sql = parse_annotated("-- +rudder Up\nSELECT 1;\n-- +rudder Down\n-- nothing to undo\n").unwrap();
        assert_eq!(sql.up.len(), 1);
        assert!(sql.down.is_empty());
    }
}
