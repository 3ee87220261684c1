//! Quizschema – the relational data model behind a quiz application.
//!
//! Four record types make up the schema, each belonging to the one before it:
//! * A [`construct::Category`] groups quizzes under a short `name`.
//! * A [`construct::Quiz`] has a short `title` and belongs to a category.
//! * A [`construct::Question`] has a free text `title`, a
//!   [`datatype::Difficulty`] and belongs to a quiz.
//! * An [`construct::Options`] is one answer option of a question, with a
//!   short `option_text` and an `is_right` flag (false unless stated).
//!
//! Quizzes, questions and options carry a [`datatype::Stamp`]: `created` is set
//! once on insert, `updated` moves strictly forward on every save. Deleting a
//! record deletes everything that belongs to it, all the way down.
//!
//! ## Modules
//! * [`construct`] – The records, their [`construct::Model`] metadata, the
//!   keepers that own them in memory and the [`construct::Database`] facade.
//! * [`datatype`] – Identities, difficulty codes, timestamps and field
//!   descriptions with their validation.
//! * [`persist`] – SQLite persistence & restoration layer.
//! * [`settings`] – Configuration for the `quizschema` binary.
//!
//! ## Persistence
//! The [`persist::Persistor`] creates the schema (tables `quiz_category`,
//! `quiz_quiz`, `quiz_question` and `quiz_options`, with cascading foreign
//! keys) and writes every change before it becomes visible in memory. A
//! [`construct::Database`] opened on an existing file restores all records.
//!
//! ## Quick Start
//! ```
//! use quizschema::construct::{Database, Model, NewCategory, NewOptions, NewQuestion, NewQuiz};
//! use quizschema::persist::PersistenceMode;
//! let db = Database::new(PersistenceMode::InMemory).unwrap();
//! let math = db.create_category(NewCategory { name: "Math" }).unwrap();
//! let quiz = db.create_quiz(NewQuiz { title: "Algebra Basics", category: math.id() }).unwrap();
//! let question = db
//!     .create_question(NewQuestion { title: "What is 2+2?", quiz: quiz.id(), difficulty: "B" })
//!     .unwrap();
//! db.create_options(NewOptions::new("4", question.id()).right(true)).unwrap();
//! assert_eq!(quiz.to_string(), "Algebra Basics");
//! assert_eq!(db.delete_category(math.id()).unwrap().total(), 4);
//! ```

pub mod construct;
pub mod datatype;
pub mod error;
pub mod persist;
pub mod settings;

pub use error::{QuizError, Result};
