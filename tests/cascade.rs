use quizschema::QuizError;
use quizschema::construct::{
    Database, Model, NewCategory, NewOptions, NewQuestion, NewQuiz, Options, Question, Quiz,
    Removed,
};
use quizschema::persist::PersistenceMode;

struct Lineage {
    category: u64,
    quiz: u64,
    question: u64,
}

fn lineage(db: &Database, name: &str) -> Lineage {
    let category = db.create_category(NewCategory { name }).unwrap();
    let quiz = db
        .create_quiz(NewQuiz { title: "Algebra Basics", category: category.id() })
        .unwrap();
    let question = db
        .create_question(NewQuestion { title: "What is 2+2?", quiz: quiz.id(), difficulty: "B" })
        .unwrap();
    db.create_options(NewOptions::new("4", question.id()).right(true)).unwrap();
    db.create_options(NewOptions::new("5", question.id()).right(false)).unwrap();
    Lineage {
        category: category.id(),
        quiz: quiz.id(),
        question: question.id(),
    }
}

#[test]
fn deleting_a_category_removes_its_lineage() {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let math = lineage(&db, "Math");
    let removed = db.delete_category(math.category).unwrap();
    assert_eq!(
        removed,
        Removed {
            categories: 1,
            quizzes: 1,
            questions: 1,
            options: 2
        }
    );
    assert!(db.categories().unwrap().is_empty());
    assert!(db.quizzes().unwrap().is_empty());
    assert!(db.questions().unwrap().is_empty());
    assert!(db.all_options().unwrap().is_empty());
    // the persisted rows went with them
    assert_eq!(db.persisted::<Quiz>().unwrap(), 0);
    assert_eq!(db.persisted::<Question>().unwrap(), 0);
    assert_eq!(db.persisted::<Options>().unwrap(), 0);
    assert!(matches!(db.quiz(math.quiz), Err(QuizError::NotFound { .. })));
    assert!(matches!(db.question(math.question), Err(QuizError::NotFound { .. })));
}

#[test]
fn other_lineages_survive() {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let math = lineage(&db, "Math");
    let science = lineage(&db, "Science");
    db.delete_category(math.category).unwrap();
    assert_eq!(db.categories().unwrap().len(), 1);
    assert_eq!(db.quizzes_in(science.category).unwrap().len(), 1);
    assert_eq!(db.questions_in(science.quiz).unwrap().len(), 1);
    assert_eq!(db.options_for(science.question).unwrap().len(), 2);
    assert_eq!(db.persisted::<Options>().unwrap(), 2);
}

#[test]
fn deleting_a_quiz_keeps_its_category() {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let math = lineage(&db, "Math");
    let removed = db.delete_quiz(math.quiz).unwrap();
    assert_eq!(removed.total(), 4);
    assert_eq!(removed.categories, 0);
    assert!(db.category(math.category).is_ok());
    assert!(db.quizzes_in(math.category).unwrap().is_empty());
    assert!(db.all_options().unwrap().is_empty());
}

#[test]
fn deleting_a_question_or_option() {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let math = lineage(&db, "Math");
    let options = db.options_for(math.question).unwrap();
    let removed = db.delete_options(options[0].id()).unwrap();
    assert_eq!(removed.options, 1);
    assert_eq!(db.options_for(math.question).unwrap().len(), 1);

    let removed = db.delete_question(math.question).unwrap();
    assert_eq!(removed.questions, 1);
    assert_eq!(removed.options, 1);
    assert!(db.questions_in(math.quiz).unwrap().is_empty());
    assert_eq!(db.persisted::<Options>().unwrap(), 0);
}

#[test]
fn deleting_twice_is_not_found() {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let math = lineage(&db, "Math");
    db.delete_category(math.category).unwrap();
    assert!(matches!(
        db.delete_category(math.category),
        Err(QuizError::NotFound { model: "Category", .. })
    ));
    assert!(matches!(
        db.delete_quiz(math.quiz),
        Err(QuizError::NotFound { model: "Quiz", .. })
    ));
}

#[test]
fn moved_children_follow_their_new_parent() {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let math = lineage(&db, "Math");
    let science = lineage(&db, "Science");
    // move the math quiz under science, then delete science
    db.update_quiz(
        math.quiz,
        quizschema::construct::QuizChanges {
            category: Some(science.category),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(db.quizzes_in(math.category).unwrap().is_empty());
    assert_eq!(db.quizzes_in(science.category).unwrap().len(), 2);
    let removed = db.delete_category(science.category).unwrap();
    assert_eq!(removed.quizzes, 2);
    assert_eq!(removed.options, 4);
    assert!(db.quizzes().unwrap().is_empty());
    assert!(db.category(math.category).is_ok());
}
