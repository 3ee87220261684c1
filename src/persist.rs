// used for persistence
use rusqlite::{params, params_from_iter, Connection, Row, ToSql};

use std::fmt;

use crate::construct::{Category, Model, Options, Question, Quiz};
use crate::datatype::{Identity, Stamp};
use crate::error::{QuizError, Result};

/// Where the records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}
impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PersistenceMode::InMemory => write!(f, "in-memory"),
            PersistenceMode::File(path) => write!(f, "file:{}", path),
        }
    }
}

/// A record that maps onto one row of its model's table. The identity is
/// always the first column.
pub trait Persistable: Model + Sized {
    const COLUMNS: &'static [&'static str];
    fn values(&self) -> Vec<&dyn ToSql>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

impl Persistable for Category {
    const COLUMNS: &'static [&'static str] = &["id", "name"];
    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.id as &dyn ToSql, &self.name]
    }
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }
}

impl Persistable for Quiz {
    const COLUMNS: &'static [&'static str] = &["id", "title", "category_id", "created", "updated"];
    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.id as &dyn ToSql,
            &self.title,
            &self.category,
            &self.stamp.created,
            &self.stamp.updated,
        ]
    }
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Quiz {
            id: row.get(0)?,
            title: row.get(1)?,
            category: row.get(2)?,
            stamp: Stamp::restore(row.get(3)?, row.get(4)?),
        })
    }
}

impl Persistable for Question {
    const COLUMNS: &'static [&'static str] =
        &["id", "title", "quiz_id", "difficulty", "created", "updated"];
    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.id as &dyn ToSql,
            &self.title,
            &self.quiz,
            &self.difficulty,
            &self.stamp.created,
            &self.stamp.updated,
        ]
    }
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Question {
            id: row.get(0)?,
            title: row.get(1)?,
            quiz: row.get(2)?,
            difficulty: row.get(3)?,
            stamp: Stamp::restore(row.get(4)?, row.get(5)?),
        })
    }
}

impl Persistable for Options {
    const COLUMNS: &'static [&'static str] =
        &["id", "option_text", "question_id", "is_right", "created", "updated"];
    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.id as &dyn ToSql,
            &self.option_text,
            &self.question,
            &self.is_right,
            &self.stamp.created,
            &self.stamp.updated,
        ]
    }
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Options {
            id: row.get(0)?,
            option_text: row.get(1)?,
            question: row.get(2)?,
            is_right: row.get(3)?,
            stamp: Stamp::restore(row.get(4)?, row.get(5)?),
        })
    }
}

// Foreign keys are only enforced by SQLite when asked for, per connection.
const SCHEMA: &str = "
    pragma foreign_keys = on;
    create table if not exists quiz_category (
        id integer not null,
        name varchar(50) not null,
        constraint referenceable_Category_id primary key (
            id
        )
    );
    create table if not exists quiz_quiz (
        id integer not null,
        title varchar(50) not null,
        category_id integer not null,
        created datetime not null,
        updated datetime not null,
        constraint Quiz_in_Category foreign key (
            category_id
        ) references quiz_category(id) on delete cascade,
        constraint referenceable_Quiz_id primary key (
            id
        )
    );
    create index if not exists quiz_quiz_category_id on quiz_quiz (category_id);
    create table if not exists quiz_question (
        id integer not null,
        title text not null,
        quiz_id integer not null,
        difficulty varchar(1) not null,
        created datetime not null,
        updated datetime not null,
        constraint Question_in_Quiz foreign key (
            quiz_id
        ) references quiz_quiz(id) on delete cascade,
        constraint known_Question_difficulty check (
            difficulty in ('B', 'I', 'A')
        ),
        constraint referenceable_Question_id primary key (
            id
        )
    );
    create index if not exists quiz_question_quiz_id on quiz_question (quiz_id);
    create table if not exists quiz_options (
        id integer not null,
        option_text varchar(200) not null,
        question_id integer not null,
        is_right bool not null default 0,
        created datetime not null,
        updated datetime not null,
        constraint Options_of_Question foreign key (
            question_id
        ) references quiz_question(id) on delete cascade,
        constraint referenceable_Options_id primary key (
            id
        )
    );
    create index if not exists quiz_options_question_id on quiz_options (question_id);
    create table if not exists quiz_sequence (
        name varchar(50) not null,
        seq integer not null,
        constraint referenceable_sequence_name primary key (
            name
        )
    );
";

// ------------- Persistence -------------
pub struct Persistor {
    db: Connection,
    mode: PersistenceMode,
}
impl Persistor {
    pub fn new(mode: PersistenceMode) -> Result<Persistor> {
        let db = match &mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        db.execute_batch(SCHEMA)?;
        Ok(Persistor { db, mode })
    }
    pub fn mode(&self) -> &PersistenceMode {
        &self.mode
    }
    // The row and the highest identity handed out for its model are written
    // together, so a deleted identity is never allocated again.
    pub fn insert<R: Persistable>(&self, record: &R) -> Result<()> {
        let placeholders: Vec<String> = (1..=R::COLUMNS.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "insert into {} ({}) values ({})",
            R::TABLE,
            R::COLUMNS.join(", "),
            placeholders.join(", ")
        );
        let transaction = self.db.unchecked_transaction()?;
        transaction
            .prepare_cached(&sql)?
            .execute(params_from_iter(record.values()))?;
        transaction
            .prepare_cached(
                "insert into quiz_sequence (name, seq) values (?1, ?2)
                 on conflict (name) do update set seq = max(seq, excluded.seq)",
            )?
            .execute(params![R::TABLE, record.id()])?;
        transaction.commit()?;
        Ok(())
    }
    /// The highest identity ever inserted for the model, zero if none was.
    pub fn sequence<R: Persistable>(&self) -> Result<Identity> {
        let seq = self
            .db
            .prepare_cached("select coalesce(max(seq), 0) from quiz_sequence where name = ?1")?
            .query_row(params![R::TABLE], |row| row.get(0))?;
        Ok(seq)
    }
    pub fn update<R: Persistable>(&self, record: &R) -> Result<()> {
        let assignments: Vec<String> = R::COLUMNS
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect();
        let sql = format!(
            "update {} set {} where {} = ?1",
            R::TABLE,
            assignments.join(", "),
            R::COLUMNS[0]
        );
        let changed = self
            .db
            .prepare_cached(&sql)?
            .execute(params_from_iter(record.values()))?;
        if changed == 0 {
            return Err(QuizError::NotFound {
                model: R::MODEL,
                id: record.id(),
            });
        }
        Ok(())
    }
    // Dependent rows go with it through the cascading foreign keys.
    pub fn delete<R: Persistable>(&self, id: Identity) -> Result<()> {
        let sql = format!("delete from {} where {} = ?1", R::TABLE, R::COLUMNS[0]);
        let changed = self.db.prepare_cached(&sql)?.execute(params![id])?;
        if changed == 0 {
            return Err(QuizError::NotFound { model: R::MODEL, id });
        }
        Ok(())
    }
    pub fn count<R: Persistable>(&self) -> Result<usize> {
        let sql = format!("select count(*) from {}", R::TABLE);
        let count: i64 = self.db.prepare_cached(&sql)?.query_row([], |row| row.get(0))?;
        usize::try_from(count).map_err(|e| QuizError::Persistence(e.to_string()))
    }
    pub fn restore<R: Persistable>(&self) -> Result<Vec<R>> {
        let sql = format!(
            "select {} from {} order by {}",
            R::COLUMNS.join(", "),
            R::TABLE,
            R::COLUMNS[0]
        );
        let mut statement = self.db.prepare_cached(&sql)?;
        let records = statement
            .query_map([], |row| R::from_row(row))?
            .collect::<rusqlite::Result<Vec<R>>>()?;
        Ok(records)
    }
}
