use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;

use quizschema::construct::{Database, Model, NewCategory, NewOptions, NewQuestion, NewQuiz};
use quizschema::persist::PersistenceMode;

// One category holding `quizzes` quizzes of ten questions with four options each.
fn populate(db: &Database, quizzes: usize) -> u64 {
    let category = db.create_category(NewCategory { name: "Bench" }).unwrap();
    for q in 0..quizzes {
        let title = format!("Quiz {}", q);
        let quiz = db
            .create_quiz(NewQuiz { title: &title, category: category.id() })
            .unwrap();
        for n in 0..10 {
            let title = format!("What is {}+{}?", n, n);
            let question = db
                .create_question(NewQuestion { title: &title, quiz: quiz.id(), difficulty: "B" })
                .unwrap();
            for o in 0..4 {
                let text = (n + o).to_string();
                db.create_options(NewOptions::new(&text, question.id()).right(o == n))
                    .unwrap();
            }
        }
    }
    category.id()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let category = db.create_category(NewCategory { name: "Math" }).unwrap();
    c.bench_function("create quiz", |b| {
        b.iter(|| {
            db.create_quiz(NewQuiz { title: black_box("Algebra"), category: category.id() })
                .unwrap()
        })
    });

    let quiz = db.quizzes().unwrap()[0].id();
    c.bench_function("questions of quiz", |b| b.iter(|| db.questions_in(black_box(quiz)).unwrap()));

    c.bench_function("cascade 10 quizzes", |b| {
        b.iter_batched(
            || {
                let db = Database::new(PersistenceMode::InMemory).unwrap();
                let category = populate(&db, 10);
                (db, category)
            },
            |(db, category)| db.delete_category(black_box(category)).unwrap(),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
