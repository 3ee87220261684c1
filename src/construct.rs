use std::sync::{Arc, Mutex, MutexGuard};

// keepers and lookups are keyed by identities
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

// used to print out readable forms of a record
use std::fmt;

// used to export a snapshot of all records
use serde::Serialize;

use tracing::{debug, info, warn};

// our own stuff that we need
use crate::datatype::{
    now, Difficulty, Field, FieldKind, Identity, IdentityGenerator, IdentityHasher, Stamp,
};
use crate::error::{QuizError, Result};
use crate::persist::{Persistable, PersistenceMode, Persistor};

// ------------- Model -------------

/// Schema level metadata shared by all record types.
pub trait Model: fmt::Debug + Send + Sync + 'static {
    const MODEL: &'static str;
    const TABLE: &'static str;
    const VERBOSE_NAME: &'static str;
    const VERBOSE_NAME_PLURAL: &'static str;
    const FIELDS: &'static [Field];
    fn id(&self) -> Identity;
    /// Identity of the record this one belongs to, if any.
    fn parent(&self) -> Option<Identity>;
}

const ID: Field = Field::new("id", "ID", FieldKind::Identity);
const CREATED: Field = Field::new("created", "created", FieldKind::CreatedAt);
const UPDATED: Field = Field::new("updated", "updated", FieldKind::UpdatedAt);

const CATEGORY_NAME: Field = Field::new(
    "name",
    "Category Name",
    FieldKind::Text { max_length: Some(50) },
);

const QUIZ_TITLE: Field = Field::new(
    "title",
    "Quiz Title",
    FieldKind::Text { max_length: Some(50) },
);
const QUIZ_CATEGORY: Field = Field::new(
    "category",
    "category",
    FieldKind::ForeignKey { to: Category::MODEL },
);

const QUESTION_TITLE: Field = Field::new("title", "title", FieldKind::Text { max_length: None });
const QUESTION_QUIZ: Field = Field::new("quiz", "quiz", FieldKind::ForeignKey { to: Quiz::MODEL });
const QUESTION_DIFFICULTY: Field = Field::new(
    "difficulty",
    "difficulty",
    FieldKind::Choice { choices: Difficulty::CHOICES },
);

const OPTION_TEXT: Field = Field::new(
    "option_text",
    "option text",
    FieldKind::Text { max_length: Some(200) },
);
const OPTION_QUESTION: Field = Field::new(
    "question",
    "question",
    FieldKind::ForeignKey { to: Question::MODEL },
);
const OPTION_IS_RIGHT: Field = Field::new("is_right", "is right", FieldKind::Boolean { default: false });

// ------------- Category -------------
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Category {
    pub(crate) id: Identity,
    pub(crate) name: String,
}

impl Category {
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl Model for Category {
    const MODEL: &'static str = "Category";
    const TABLE: &'static str = "quiz_category";
    const VERBOSE_NAME: &'static str = "Category";
    const VERBOSE_NAME_PLURAL: &'static str = "Categories";
    const FIELDS: &'static [Field] = &[ID, CATEGORY_NAME];
    fn id(&self) -> Identity {
        self.id
    }
    fn parent(&self) -> Option<Identity> {
        None
    }
}
impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ------------- Quiz -------------
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Quiz {
    pub(crate) id: Identity,
    pub(crate) title: String,
    pub(crate) category: Identity,
    #[serde(flatten)]
    pub(crate) stamp: Stamp,
}

impl Quiz {
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn category(&self) -> Identity {
        self.category
    }
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }
}
impl Model for Quiz {
    const MODEL: &'static str = "Quiz";
    const TABLE: &'static str = "quiz_quiz";
    const VERBOSE_NAME: &'static str = "Quiz";
    const VERBOSE_NAME_PLURAL: &'static str = "Quizzes";
    const FIELDS: &'static [Field] = &[ID, QUIZ_TITLE, QUIZ_CATEGORY, CREATED, UPDATED];
    fn id(&self) -> Identity {
        self.id
    }
    fn parent(&self) -> Option<Identity> {
        Some(self.category)
    }
}
impl fmt::Display for Quiz {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

// ------------- Question -------------
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Question {
    pub(crate) id: Identity,
    pub(crate) title: String,
    pub(crate) quiz: Identity,
    pub(crate) difficulty: Difficulty,
    #[serde(flatten)]
    pub(crate) stamp: Stamp,
}

impl Question {
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn quiz(&self) -> Identity {
        self.quiz
    }
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }
}
impl Model for Question {
    const MODEL: &'static str = "Question";
    const TABLE: &'static str = "quiz_question";
    const VERBOSE_NAME: &'static str = "Question";
    const VERBOSE_NAME_PLURAL: &'static str = "Questions";
    const FIELDS: &'static [Field] = &[
        ID,
        QUESTION_TITLE,
        QUESTION_QUIZ,
        QUESTION_DIFFICULTY,
        CREATED,
        UPDATED,
    ];
    fn id(&self) -> Identity {
        self.id
    }
    fn parent(&self) -> Option<Identity> {
        Some(self.quiz)
    }
}
// Questions have no label of their own, so they fall back on their identity.
impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Question object ({})", self.id)
    }
}

// ------------- Options -------------
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Options {
    pub(crate) id: Identity,
    pub(crate) option_text: String,
    pub(crate) question: Identity,
    pub(crate) is_right: bool,
    #[serde(flatten)]
    pub(crate) stamp: Stamp,
}

impl Options {
    pub fn option_text(&self) -> &str {
        &self.option_text
    }
    pub fn question(&self) -> Identity {
        self.question
    }
    pub fn is_right(&self) -> bool {
        self.is_right
    }
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }
}
impl Model for Options {
    const MODEL: &'static str = "Options";
    const TABLE: &'static str = "quiz_options";
    const VERBOSE_NAME: &'static str = "Options";
    const VERBOSE_NAME_PLURAL: &'static str = "Options";
    const FIELDS: &'static [Field] = &[
        ID,
        OPTION_TEXT,
        OPTION_QUESTION,
        OPTION_IS_RIGHT,
        CREATED,
        UPDATED,
    ];
    fn id(&self) -> Identity {
        self.id
    }
    fn parent(&self) -> Option<Identity> {
        Some(self.question)
    }
}
impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.option_text)
    }
}

// ------------- Inserts and changes -------------
#[derive(Debug, Clone, Copy)]
pub struct NewCategory<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct NewQuiz<'a> {
    pub title: &'a str,
    pub category: Identity,
}

/// The difficulty arrives as its raw code and is checked on insert.
#[derive(Debug, Clone, Copy)]
pub struct NewQuestion<'a> {
    pub title: &'a str,
    pub quiz: Identity,
    pub difficulty: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct NewOptions<'a> {
    pub option_text: &'a str,
    pub question: Identity,
    pub is_right: bool,
}

impl<'a> NewOptions<'a> {
    pub fn new(option_text: &'a str, question: Identity) -> Self {
        Self {
            option_text,
            question,
            is_right: false,
        }
    }
    pub fn right(self, is_right: bool) -> Self {
        Self { is_right, ..self }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryChanges<'a> {
    pub name: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuizChanges<'a> {
    pub title: Option<&'a str>,
    pub category: Option<Identity>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuestionChanges<'a> {
    pub title: Option<&'a str>,
    pub quiz: Option<Identity>,
    pub difficulty: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OptionsChanges<'a> {
    pub option_text: Option<&'a str>,
    pub question: Option<Identity>,
    pub is_right: Option<bool>,
}

/// Number of records of each model taken away by one delete.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Removed {
    pub categories: usize,
    pub quizzes: usize,
    pub questions: usize,
    pub options: usize,
}
impl Removed {
    pub fn total(&self) -> usize {
        self.categories + self.quizzes + self.questions + self.options
    }
}

/// Owned copy of every record, in identity order.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Snapshot {
    pub categories: Vec<Category>,
    pub quizzes: Vec<Quiz>,
    pub questions: Vec<Question>,
    pub options: Vec<Options>,
}

// ------------- Keeper -------------
#[derive(Debug)]
pub struct Keeper<R> {
    kept: HashMap<Identity, Arc<R>, IdentityHasher>,
    generator: IdentityGenerator,
}
impl<R: Model> Keeper<R> {
    pub fn new() -> Self {
        Self {
            kept: HashMap::default(),
            generator: IdentityGenerator::new(),
        }
    }
    // Keeping a record under an identity already kept replaces it,
    // which is how updates land.
    pub fn keep(&mut self, record: R) -> Arc<R> {
        let identity = record.id();
        self.generator.retain(identity);
        let keepsake = Arc::new(record);
        self.kept.insert(identity, Arc::clone(&keepsake));
        keepsake
    }
    pub fn next_identity(&self) -> Identity {
        self.generator.next()
    }
    // Identities once allocated stay allocated, whether kept or not.
    pub fn retain(&mut self, identity: Identity) {
        self.generator.retain(identity);
    }
    pub fn get(&self, identity: Identity) -> Option<Arc<R>> {
        self.kept.get(&identity).map(Arc::clone)
    }
    pub fn contains(&self, identity: Identity) -> bool {
        self.kept.contains_key(&identity)
    }
    pub fn remove(&mut self, identity: Identity) -> Option<Arc<R>> {
        self.kept.remove(&identity)
    }
    pub fn all(&self) -> Vec<Arc<R>> {
        let mut all: Vec<Arc<R>> = self.kept.values().map(Arc::clone).collect();
        all.sort_unstable_by_key(|record| record.id());
        all
    }
}
impl<R: Model> Default for Keeper<R> {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Lookups -------------
#[derive(Debug)]
pub struct Lookup<K, V, H = IdentityHasher> {
    index: HashMap<K, HashSet<V, H>, H>,
}
impl<K, V, H> Lookup<K, V, H>
where
    K: Eq + Hash,
    V: Eq + Hash + Ord + Copy,
    H: std::hash::BuildHasher + Default,
{
    pub fn new() -> Self {
        Self {
            index: HashMap::<K, HashSet<V, H>, H>::default(),
        }
    }
    pub fn insert(&mut self, key: K, value: V) {
        self.index.entry(key).or_default().insert(value);
    }
    pub fn remove(&mut self, key: &K, value: &V) {
        if let Some(values) = self.index.get_mut(key) {
            values.remove(value);
            if values.is_empty() {
                self.index.remove(key);
            }
        }
    }
    pub fn lookup(&self, key: &K) -> Vec<V> {
        let mut values: Vec<V> = self
            .index
            .get(key)
            .map(|values| values.iter().copied().collect())
            .unwrap_or_default();
        values.sort_unstable();
        values
    }
    /// Removes the key, handing back whatever was indexed under it.
    pub fn take(&mut self, key: &K) -> Vec<V> {
        let mut values: Vec<V> = self
            .index
            .remove(key)
            .map(|values| values.into_iter().collect())
            .unwrap_or_default();
        values.sort_unstable();
        values
    }
}
impl<K, V, H> Default for Lookup<K, V, H>
where
    K: Eq + Hash,
    V: Eq + Hash + Ord + Copy,
    H: std::hash::BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

type Children = Lookup<Identity, Identity>;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|e| QuizError::Lock(e.to_string()))
}

fn rejected(model: &'static str) -> impl Fn(&QuizError) {
    move |e| warn!(model, error = %e, "write rejected")
}

// The parent must be kept for a child to reference it.
fn require<R: Model>(keeper: &Mutex<Keeper<R>>, field: &'static str, id: Identity) -> Result<()> {
    if lock(keeper)?.contains(id) {
        Ok(())
    } else {
        Err(QuizError::Reference {
            field,
            target: R::MODEL,
            id,
        })
    }
}

fn fetch<R: Model>(keeper: &Mutex<Keeper<R>>, id: Identity) -> Result<Arc<R>> {
    lock(keeper)?.get(id).ok_or(QuizError::NotFound {
        model: R::MODEL,
        id,
    })
}

fn gather<R: Model>(keeper: &Mutex<Keeper<R>>, identities: &[Identity]) -> Result<Vec<Arc<R>>> {
    let keeper = lock(keeper)?;
    Ok(identities
        .iter()
        .filter_map(|identity| keeper.get(*identity))
        .collect())
}

// ------------- Database -------------
// This sets up the database with the necessary structures
pub struct Database {
    // owns keepers for the four models
    categories: Arc<Mutex<Keeper<Category>>>,
    quizzes: Arc<Mutex<Keeper<Quiz>>>,
    questions: Arc<Mutex<Keeper<Question>>>,
    options: Arc<Mutex<Keeper<Options>>>,
    // owns lookups from a parent to its children (similar to foreign key indexes)
    quizzes_by_category: Arc<Mutex<Children>>,
    questions_by_quiz: Arc<Mutex<Children>>,
    options_by_question: Arc<Mutex<Children>>,
    // responsible for the persistence layer, and held for the whole of every write
    persistor: Arc<Mutex<Persistor>>,
}

impl Database {
    pub fn new(mode: PersistenceMode) -> Result<Database> {
        let persistor = Persistor::new(mode)?;
        let database = Database {
            categories: Arc::new(Mutex::new(Keeper::new())),
            quizzes: Arc::new(Mutex::new(Keeper::new())),
            questions: Arc::new(Mutex::new(Keeper::new())),
            options: Arc::new(Mutex::new(Keeper::new())),
            quizzes_by_category: Arc::new(Mutex::new(Lookup::new())),
            questions_by_quiz: Arc::new(Mutex::new(Lookup::new())),
            options_by_question: Arc::new(Mutex::new(Lookup::new())),
            persistor: Arc::new(Mutex::new(persistor)),
        };
        // Restore the existing database, parents before children
        database.restore()?;
        Ok(database)
    }

    fn restore(&self) -> Result<()> {
        let persistor = lock(&self.persistor)?;
        let categories = persistor.restore::<Category>()?;
        let quizzes = persistor.restore::<Quiz>()?;
        let questions = persistor.restore::<Question>()?;
        let options = persistor.restore::<Options>()?;
        let sequences = [
            persistor.sequence::<Category>()?,
            persistor.sequence::<Quiz>()?,
            persistor.sequence::<Question>()?,
            persistor.sequence::<Options>()?,
        ];
        info!(
            mode = %persistor.mode(),
            categories = categories.len(),
            quizzes = quizzes.len(),
            questions = questions.len(),
            options = options.len(),
            "database restored"
        );
        let mut keeper = lock(&self.categories)?;
        for category in categories {
            keeper.keep(category);
        }
        keeper.retain(sequences[0]);
        drop(keeper);
        Self::restore_children(&self.quizzes, &self.quizzes_by_category, quizzes, sequences[1])?;
        Self::restore_children(&self.questions, &self.questions_by_quiz, questions, sequences[2])?;
        Self::restore_children(&self.options, &self.options_by_question, options, sequences[3])?;
        Ok(())
    }

    fn restore_children<R: Model>(
        keeper: &Mutex<Keeper<R>>,
        lookup: &Mutex<Children>,
        records: Vec<R>,
        sequence: Identity,
    ) -> Result<()> {
        let mut keeper = lock(keeper)?;
        let mut lookup = lock(lookup)?;
        for record in records {
            if let Some(parent) = record.parent() {
                lookup.insert(parent, record.id());
            }
            keeper.keep(record);
        }
        keeper.retain(sequence);
        Ok(())
    }

    // ------------- Create -------------
    pub fn create_category(&self, new: NewCategory) -> Result<Arc<Category>> {
        let persistor = lock(&self.persistor)?;
        let name = CATEGORY_NAME
            .check_text(new.name)
            .inspect_err(rejected(Category::MODEL))?;
        let mut keeper = lock(&self.categories)?;
        let category = Category {
            id: keeper.next_identity(),
            name: name.to_owned(),
        };
        persistor.insert(&category)?;
        let kept = keeper.keep(category);
        debug!(id = kept.id, name = %kept, "category created");
        Ok(kept)
    }

    pub fn create_quiz(&self, new: NewQuiz) -> Result<Arc<Quiz>> {
        let persistor = lock(&self.persistor)?;
        let title = QUIZ_TITLE
            .check_text(new.title)
            .and_then(|title| {
                require(&self.categories, QUIZ_CATEGORY.name, new.category)?;
                Ok(title)
            })
            .inspect_err(rejected(Quiz::MODEL))?;
        let mut keeper = lock(&self.quizzes)?;
        let quiz = Quiz {
            id: keeper.next_identity(),
            title: title.to_owned(),
            category: new.category,
            stamp: Stamp::new(now()),
        };
        let mut lookup = lock(&self.quizzes_by_category)?;
        persistor.insert(&quiz)?;
        let kept = keeper.keep(quiz);
        lookup.insert(kept.category, kept.id);
        debug!(id = kept.id, category = kept.category, title = %kept, "quiz created");
        Ok(kept)
    }

    pub fn create_question(&self, new: NewQuestion) -> Result<Arc<Question>> {
        let persistor = lock(&self.persistor)?;
        let (title, difficulty) = QUESTION_TITLE
            .check_text(new.title)
            .and_then(|title| Ok((title, new.difficulty.parse::<Difficulty>()?)))
            .and_then(|checked| {
                require(&self.quizzes, QUESTION_QUIZ.name, new.quiz)?;
                Ok(checked)
            })
            .inspect_err(rejected(Question::MODEL))?;
        let mut keeper = lock(&self.questions)?;
        let question = Question {
            id: keeper.next_identity(),
            title: title.to_owned(),
            quiz: new.quiz,
            difficulty,
            stamp: Stamp::new(now()),
        };
        let mut lookup = lock(&self.questions_by_quiz)?;
        persistor.insert(&question)?;
        let kept = keeper.keep(question);
        lookup.insert(kept.quiz, kept.id);
        debug!(id = kept.id, quiz = kept.quiz, difficulty = kept.difficulty.code(), "question created");
        Ok(kept)
    }

    pub fn create_options(&self, new: NewOptions) -> Result<Arc<Options>> {
        let persistor = lock(&self.persistor)?;
        let option_text = OPTION_TEXT
            .check_text(new.option_text)
            .and_then(|text| {
                require(&self.questions, OPTION_QUESTION.name, new.question)?;
                Ok(text)
            })
            .inspect_err(rejected(Options::MODEL))?;
        let mut keeper = lock(&self.options)?;
        let options = Options {
            id: keeper.next_identity(),
            option_text: option_text.to_owned(),
            question: new.question,
            is_right: new.is_right,
            stamp: Stamp::new(now()),
        };
        let mut lookup = lock(&self.options_by_question)?;
        persistor.insert(&options)?;
        let kept = keeper.keep(options);
        lookup.insert(kept.question, kept.id);
        debug!(id = kept.id, question = kept.question, is_right = kept.is_right, "options created");
        Ok(kept)
    }

    // ------------- Read -------------
    pub fn category(&self, id: Identity) -> Result<Arc<Category>> {
        fetch(&self.categories, id)
    }
    pub fn quiz(&self, id: Identity) -> Result<Arc<Quiz>> {
        fetch(&self.quizzes, id)
    }
    pub fn question(&self, id: Identity) -> Result<Arc<Question>> {
        fetch(&self.questions, id)
    }
    pub fn options(&self, id: Identity) -> Result<Arc<Options>> {
        fetch(&self.options, id)
    }

    pub fn categories(&self) -> Result<Vec<Arc<Category>>> {
        Ok(lock(&self.categories)?.all())
    }
    pub fn quizzes(&self) -> Result<Vec<Arc<Quiz>>> {
        Ok(lock(&self.quizzes)?.all())
    }
    pub fn questions(&self) -> Result<Vec<Arc<Question>>> {
        Ok(lock(&self.questions)?.all())
    }
    pub fn all_options(&self) -> Result<Vec<Arc<Options>>> {
        Ok(lock(&self.options)?.all())
    }

    /// All quizzes belonging to the category.
    pub fn quizzes_in(&self, category: Identity) -> Result<Vec<Arc<Quiz>>> {
        self.category(category)?;
        let identities = lock(&self.quizzes_by_category)?.lookup(&category);
        gather(&self.quizzes, &identities)
    }
    /// All questions belonging to the quiz.
    pub fn questions_in(&self, quiz: Identity) -> Result<Vec<Arc<Question>>> {
        self.quiz(quiz)?;
        let identities = lock(&self.questions_by_quiz)?.lookup(&quiz);
        gather(&self.questions, &identities)
    }
    /// All options belonging to the question.
    pub fn options_for(&self, question: Identity) -> Result<Vec<Arc<Options>>> {
        self.question(question)?;
        let identities = lock(&self.options_by_question)?.lookup(&question);
        gather(&self.options, &identities)
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        fn owned<R: Clone>(records: Vec<Arc<R>>) -> Vec<R> {
            records.into_iter().map(|record| (*record).clone()).collect()
        }
        // no writer can interleave while the persistor is held
        let _persistor = lock(&self.persistor)?;
        Ok(Snapshot {
            categories: owned(self.categories()?),
            quizzes: owned(self.quizzes()?),
            questions: owned(self.questions()?),
            options: owned(self.all_options()?),
        })
    }

    /// Number of rows the persistence layer holds for a model.
    pub fn persisted<R: Persistable>(&self) -> Result<usize> {
        lock(&self.persistor)?.count::<R>()
    }

    // ------------- Update -------------
    pub fn update_category(&self, id: Identity, changes: CategoryChanges) -> Result<Arc<Category>> {
        let persistor = lock(&self.persistor)?;
        let current = self.category(id)?;
        let name = match changes.name {
            Some(name) => CATEGORY_NAME
                .check_text(name)
                .inspect_err(rejected(Category::MODEL))?
                .to_owned(),
            None => current.name.clone(),
        };
        let category = Category { id, name };
        let mut keeper = lock(&self.categories)?;
        persistor.update(&category)?;
        let kept = keeper.keep(category);
        debug!(id, name = %kept, "category updated");
        Ok(kept)
    }

    pub fn update_quiz(&self, id: Identity, changes: QuizChanges) -> Result<Arc<Quiz>> {
        let persistor = lock(&self.persistor)?;
        let current = self.quiz(id)?;
        let checked = || -> Result<(String, Identity)> {
            let title = match changes.title {
                Some(title) => QUIZ_TITLE.check_text(title)?.to_owned(),
                None => current.title.clone(),
            };
            let category = match changes.category {
                Some(category) => {
                    require(&self.categories, QUIZ_CATEGORY.name, category)?;
                    category
                }
                None => current.category,
            };
            Ok((title, category))
        };
        let (title, category) = checked().inspect_err(rejected(Quiz::MODEL))?;
        let quiz = Quiz {
            id,
            title,
            category,
            stamp: current.stamp.refreshed(now()),
        };
        let mut keeper = lock(&self.quizzes)?;
        let mut lookup = lock(&self.quizzes_by_category)?;
        persistor.update(&quiz)?;
        if category != current.category {
            lookup.remove(&current.category, &id);
            lookup.insert(category, id);
        }
        let kept = keeper.keep(quiz);
        debug!(id, category, updated = %kept.stamp.updated(), "quiz updated");
        Ok(kept)
    }

    pub fn update_question(&self, id: Identity, changes: QuestionChanges) -> Result<Arc<Question>> {
        let persistor = lock(&self.persistor)?;
        let current = self.question(id)?;
        let checked = || -> Result<(String, Identity, Difficulty)> {
            let title = match changes.title {
                Some(title) => QUESTION_TITLE.check_text(title)?.to_owned(),
                None => current.title.clone(),
            };
            let difficulty = match changes.difficulty {
                Some(code) => code.parse::<Difficulty>()?,
                None => current.difficulty,
            };
            let quiz = match changes.quiz {
                Some(quiz) => {
                    require(&self.quizzes, QUESTION_QUIZ.name, quiz)?;
                    quiz
                }
                None => current.quiz,
            };
            Ok((title, quiz, difficulty))
        };
        let (title, quiz, difficulty) = checked().inspect_err(rejected(Question::MODEL))?;
        let question = Question {
            id,
            title,
            quiz,
            difficulty,
            stamp: current.stamp.refreshed(now()),
        };
        let mut keeper = lock(&self.questions)?;
        let mut lookup = lock(&self.questions_by_quiz)?;
        persistor.update(&question)?;
        if quiz != current.quiz {
            lookup.remove(&current.quiz, &id);
            lookup.insert(quiz, id);
        }
        let kept = keeper.keep(question);
        debug!(id, quiz, updated = %kept.stamp.updated(), "question updated");
        Ok(kept)
    }

    pub fn update_options(&self, id: Identity, changes: OptionsChanges) -> Result<Arc<Options>> {
        let persistor = lock(&self.persistor)?;
        let current = self.options(id)?;
        let checked = || -> Result<(String, Identity)> {
            let option_text = match changes.option_text {
                Some(text) => OPTION_TEXT.check_text(text)?.to_owned(),
                None => current.option_text.clone(),
            };
            let question = match changes.question {
                Some(question) => {
                    require(&self.questions, OPTION_QUESTION.name, question)?;
                    question
                }
                None => current.question,
            };
            Ok((option_text, question))
        };
        let (option_text, question) = checked().inspect_err(rejected(Options::MODEL))?;
        let options = Options {
            id,
            option_text,
            question,
            is_right: changes.is_right.unwrap_or(current.is_right),
            stamp: current.stamp.refreshed(now()),
        };
        let mut keeper = lock(&self.options)?;
        let mut lookup = lock(&self.options_by_question)?;
        persistor.update(&options)?;
        if question != current.question {
            lookup.remove(&current.question, &id);
            lookup.insert(question, id);
        }
        let kept = keeper.keep(options);
        debug!(id, question, updated = %kept.stamp.updated(), "options updated");
        Ok(kept)
    }

    // ------------- Delete -------------
    // The persistence layer cascades on its own through its foreign keys,
    // the keepers are emptied here leaf first so no orphan is ever visible.

    pub fn delete_category(&self, id: Identity) -> Result<Removed> {
        let persistor = lock(&self.persistor)?;
        self.category(id)?;
        let mut cascade = self.cascade()?;
        persistor.delete::<Category>(id)?;
        cascade.forget_category(id);
        info!(model = Category::MODEL, id, removed = ?cascade.removed, "deleted");
        Ok(cascade.removed)
    }

    pub fn delete_quiz(&self, id: Identity) -> Result<Removed> {
        let persistor = lock(&self.persistor)?;
        let quiz = self.quiz(id)?;
        let mut cascade = self.cascade()?;
        persistor.delete::<Quiz>(id)?;
        cascade.forget_quiz(id);
        cascade.quizzes_by_category.remove(&quiz.category, &id);
        info!(model = Quiz::MODEL, id, removed = ?cascade.removed, "deleted");
        Ok(cascade.removed)
    }

    pub fn delete_question(&self, id: Identity) -> Result<Removed> {
        let persistor = lock(&self.persistor)?;
        let question = self.question(id)?;
        let mut cascade = self.cascade()?;
        persistor.delete::<Question>(id)?;
        cascade.forget_question(id);
        cascade.questions_by_quiz.remove(&question.quiz, &id);
        info!(model = Question::MODEL, id, removed = ?cascade.removed, "deleted");
        Ok(cascade.removed)
    }

    pub fn delete_options(&self, id: Identity) -> Result<Removed> {
        let persistor = lock(&self.persistor)?;
        let options = self.options(id)?;
        let mut cascade = self.cascade()?;
        persistor.delete::<Options>(id)?;
        cascade.forget_options(id);
        cascade.options_by_question.remove(&options.question, &id);
        info!(model = Options::MODEL, id, removed = ?cascade.removed, "deleted");
        Ok(cascade.removed)
    }

    // Every guard a delete may need, taken before the store is touched.
    fn cascade(&self) -> Result<Cascade<'_>> {
        Ok(Cascade {
            categories: lock(&self.categories)?,
            quizzes: lock(&self.quizzes)?,
            questions: lock(&self.questions)?,
            options: lock(&self.options)?,
            quizzes_by_category: lock(&self.quizzes_by_category)?,
            questions_by_quiz: lock(&self.questions_by_quiz)?,
            options_by_question: lock(&self.options_by_question)?,
            removed: Removed::default(),
        })
    }
}

struct Cascade<'d> {
    categories: MutexGuard<'d, Keeper<Category>>,
    quizzes: MutexGuard<'d, Keeper<Quiz>>,
    questions: MutexGuard<'d, Keeper<Question>>,
    options: MutexGuard<'d, Keeper<Options>>,
    quizzes_by_category: MutexGuard<'d, Children>,
    questions_by_quiz: MutexGuard<'d, Children>,
    options_by_question: MutexGuard<'d, Children>,
    removed: Removed,
}

impl Cascade<'_> {
    fn forget_category(&mut self, id: Identity) {
        for quiz in self.quizzes_by_category.take(&id) {
            self.forget_quiz(quiz);
        }
        if self.categories.remove(id).is_some() {
            self.removed.categories += 1;
        }
    }
    fn forget_quiz(&mut self, id: Identity) {
        for question in self.questions_by_quiz.take(&id) {
            self.forget_question(question);
        }
        if self.quizzes.remove(id).is_some() {
            self.removed.quizzes += 1;
        }
    }
    fn forget_question(&mut self, id: Identity) {
        for option in self.options_by_question.take(&id) {
            self.forget_options(option);
        }
        if self.questions.remove(id).is_some() {
            self.removed.questions += 1;
        }
    }
    fn forget_options(&mut self, id: Identity) {
        if self.options.remove(id).is_some() {
            self.removed.options += 1;
        }
    }
}
