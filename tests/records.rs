use quizschema::construct::{
    Category, Database, Model, NewCategory, NewOptions, NewQuestion, NewQuiz, Options, Question,
    Quiz,
};
use quizschema::datatype::{Difficulty, FieldKind};
use quizschema::persist::PersistenceMode;

fn seeded() -> (Database, u64, u64, u64) {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let math = db.create_category(NewCategory { name: "Math" }).unwrap();
    let quiz = db
        .create_quiz(NewQuiz { title: "Algebra Basics", category: math.id() })
        .unwrap();
    let question = db
        .create_question(NewQuestion { title: "What is 2+2?", quiz: quiz.id(), difficulty: "B" })
        .unwrap();
    (db, math.id(), quiz.id(), question.id())
}

#[test]
fn category_reads_back_its_name() {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    for name in ["Math", "Geschichte", "  padded  ", "ünïcödé"] {
        let created = db.create_category(NewCategory { name }).unwrap();
        let read = db.category(created.id()).unwrap();
        assert_eq!(read.name(), name);
    }
    assert_eq!(db.categories().unwrap().len(), 4);
}

#[test]
fn identities_increase_per_model() {
    let (db, math, _, _) = seeded();
    let science = db.create_category(NewCategory { name: "Science" }).unwrap();
    assert_eq!(math, 1);
    assert_eq!(science.id(), 2);
    // quizzes count on their own
    let quiz = db.create_quiz(NewQuiz { title: "Physics", category: science.id() }).unwrap();
    assert_eq!(quiz.id(), 2);
}

#[test]
fn identities_are_not_reused_after_delete() {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let first = db.create_category(NewCategory { name: "a" }).unwrap();
    let second = db.create_category(NewCategory { name: "b" }).unwrap();
    db.delete_category(second.id()).unwrap();
    let third = db.create_category(NewCategory { name: "c" }).unwrap();
    assert!(third.id() > second.id());
    assert!(second.id() > first.id());
}

#[test]
fn options_default_to_wrong() {
    let (db, _, _, question) = seeded();
    let plain = db.create_options(NewOptions::new("5", question)).unwrap();
    let right = db.create_options(NewOptions::new("4", question).right(true)).unwrap();
    assert!(!plain.is_right());
    assert!(right.is_right());
}

#[test]
fn relationship_traversal() {
    let (db, math, quiz, question) = seeded();
    let other = db
        .create_question(NewQuestion { title: "Solve x+1=3", quiz, difficulty: "I" })
        .unwrap();
    db.create_options(NewOptions::new("4", question).right(true)).unwrap();
    db.create_options(NewOptions::new("5", question)).unwrap();
    db.create_options(NewOptions::new("2", other.id()).right(true)).unwrap();

    let quizzes = db.quizzes_in(math).unwrap();
    assert_eq!(quizzes.len(), 1);
    assert_eq!(quizzes[0].title(), "Algebra Basics");

    let questions = db.questions_in(quiz).unwrap();
    let ids: Vec<u64> = questions.iter().map(|q| q.id()).collect();
    assert_eq!(ids, vec![question, other.id()]);
    assert_eq!(questions[1].difficulty(), Difficulty::Intermediate);

    let options = db.options_for(question).unwrap();
    let texts: Vec<&str> = options.iter().map(|o| o.option_text()).collect();
    assert_eq!(texts, vec!["4", "5"]);
    assert!(options.iter().all(|o| o.question() == question));
    assert_eq!(db.options_for(other.id()).unwrap().len(), 1);
    assert_eq!(db.all_options().unwrap().len(), 3);
}

#[test]
fn traversal_from_unknown_parent_is_not_found() {
    let (db, _, _, _) = seeded();
    assert!(db.quizzes_in(99).is_err());
    assert!(db.questions_in(99).is_err());
    assert!(db.options_for(99).is_err());
    assert!(db.question(99).is_err());
}

#[test]
fn display_labels() {
    let (db, math, quiz, question) = seeded();
    let option = db.create_options(NewOptions::new("4", question)).unwrap();
    assert_eq!(db.category(math).unwrap().to_string(), "Math");
    assert_eq!(db.quiz(quiz).unwrap().to_string(), "Algebra Basics");
    assert_eq!(option.to_string(), "4");
    assert_eq!(
        db.question(question).unwrap().to_string(),
        format!("Question object ({})", question)
    );
}

#[test]
fn model_metadata() {
    assert_eq!(Category::VERBOSE_NAME_PLURAL, "Categories");
    assert_eq!(Quiz::VERBOSE_NAME_PLURAL, "Quizzes");
    assert_eq!(Category::TABLE, "quiz_category");
    assert_eq!(Options::TABLE, "quiz_options");

    let name = Category::FIELDS.iter().find(|f| f.name == "name").unwrap();
    assert_eq!(name.verbose_name, "Category Name");
    assert_eq!(name.max_length(), Some(50));
    let title = Quiz::FIELDS.iter().find(|f| f.name == "title").unwrap();
    assert_eq!(title.verbose_name, "Quiz Title");
    let question_title = Question::FIELDS.iter().find(|f| f.name == "title").unwrap();
    assert_eq!(question_title.max_length(), None);
    let option_text = Options::FIELDS.iter().find(|f| f.name == "option_text").unwrap();
    assert_eq!(option_text.max_length(), Some(200));
    let is_right = Options::FIELDS.iter().find(|f| f.name == "is_right").unwrap();
    assert_eq!(is_right.kind, FieldKind::Boolean { default: false });
    let difficulty = Question::FIELDS.iter().find(|f| f.name == "difficulty").unwrap();
    assert_eq!(difficulty.kind, FieldKind::Choice { choices: Difficulty::CHOICES });
    assert_eq!(
        Quiz::FIELDS.iter().find(|f| f.name == "category").unwrap().kind,
        FieldKind::ForeignKey { to: "Category" }
    );
}

#[test]
fn snapshot_serializes_codes_and_stamps() {
    let (db, _, _, question) = seeded();
    db.create_options(NewOptions::new("4", question).right(true)).unwrap();
    let snapshot = db.snapshot().unwrap();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["categories"][0]["name"], "Math");
    assert_eq!(json["quizzes"][0]["category"], 1);
    assert_eq!(json["questions"][0]["difficulty"], "B");
    assert_eq!(json["options"][0]["is_right"], true);
    assert!(json["questions"][0]["created"].is_string());
    assert!(json["questions"][0]["updated"].is_string());
}
