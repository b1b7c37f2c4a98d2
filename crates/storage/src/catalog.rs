use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use study_core::model::{
    AnswerMatch, ChallengeTemplate, ChallengeType, CodeExample, ConceptCategory, ConceptDraft,
    ConceptId, ExpectedAnswer, LearningConcept, Level,
};
use study_core::LearningPath;

use crate::repository::{CatalogProvider, StorageError};

fn invalid<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::InvalidData(e.to_string())
}

fn validate_all(drafts: Vec<ConceptDraft>) -> Result<Vec<LearningConcept>, StorageError> {
    drafts
        .into_iter()
        .map(|draft| {
            let id = draft.id.clone();
            draft
                .validate()
                .map_err(|e| StorageError::InvalidData(format!("concept {id}: {e}")))
        })
        .collect()
}

//
// ─── JSON ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct CatalogFile {
    concepts: Vec<ConceptDraft>,
    #[serde(default)]
    paths: Vec<LearningPath>,
}

/// Catalog read from a JSON document of the form
/// `{ "concepts": [ConceptDraft, ..], "paths": [LearningPath, ..] }`.
#[derive(Debug)]
pub struct JsonCatalog {
    concepts: Vec<ConceptDraft>,
    paths: Vec<LearningPath>,
}

impl JsonCatalog {
    /// Parse a catalog document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the document is not a valid catalog.
    pub fn parse(json: &str) -> Result<Self, StorageError> {
        let file: CatalogFile =
            serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Self {
            concepts: file.concepts,
            paths: file.paths,
        })
    }

    /// Read and parse a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for a missing file, `Connection` for other
    /// I/O failures and `Serialization` for malformed JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(path.display().to_string()),
            _ => StorageError::Connection(format!("{}: {e}", path.display())),
        })?;
        tracing::debug!(path = %path.display(), "reading concept catalog");
        Self::parse(&raw)
    }
}

impl CatalogProvider for JsonCatalog {
    fn load_concepts(&self) -> Result<Vec<LearningConcept>, StorageError> {
        validate_all(self.concepts.clone())
    }

    fn load_paths(&self) -> Result<Vec<LearningPath>, StorageError> {
        Ok(self.paths.clone())
    }
}

//
// ─── BUILTIN ───────────────────────────────────────────────────────────────────
//

/// Sample Python curriculum covering all three levels.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl CatalogProvider for BuiltinCatalog {
    fn load_concepts(&self) -> Result<Vec<LearningConcept>, StorageError> {
        validate_all(builtin_concepts()?)
    }

    fn load_paths(&self) -> Result<Vec<LearningPath>, StorageError> {
        Ok(vec![
            LearningPath {
                id: "python_beginner_path".into(),
                name: "Python Fundamentals".into(),
                level: Level::Beginner,
                description: "Start your Python journey with the essential building blocks.".into(),
                concept_ids: ids(&[
                    "python_variables_beginner",
                    "python_conditionals_beginner",
                    "python_loops_beginner",
                    "python_functions_beginner",
                    "python_lists_beginner",
                ])?,
                estimated_total_hours: 4,
            },
            LearningPath {
                id: "python_intermediate_path".into(),
                name: "Writing Idiomatic Python".into(),
                level: Level::Intermediate,
                description: "Comprehensions, classes and robust error handling.".into(),
                concept_ids: ids(&[
                    "python_comprehensions_intermediate",
                    "python_exceptions_intermediate",
                    "python_classes_intermediate",
                    "python_files_intermediate",
                ])?,
                estimated_total_hours: 5,
            },
            LearningPath {
                id: "python_expert_path".into(),
                name: "Advanced Python".into(),
                level: Level::Expert,
                description: "Generators, decorators, context managers and asyncio.".into(),
                concept_ids: ids(&[
                    "python_generators_expert",
                    "python_decorators_expert",
                    "python_context_managers_expert",
                    "python_asyncio_expert",
                ])?,
                estimated_total_hours: 6,
            },
        ])
    }
}

fn id(raw: &str) -> Result<ConceptId, StorageError> {
    ConceptId::new(raw).map_err(invalid)
}

fn ids(raw: &[&str]) -> Result<Vec<ConceptId>, StorageError> {
    raw.iter().map(|r| id(r)).collect()
}

struct TemplateRow<'a> {
    id: &'a str,
    title: &'a str,
    prompt: &'a str,
    challenge_type: ChallengeType,
    difficulty: Level,
    accepted: &'a [&'a str],
    matching: AnswerMatch,
    hints: &'a [&'a str],
}

impl TemplateRow<'_> {
    fn build(self) -> ChallengeTemplate {
        ChallengeTemplate {
            id: self.id.to_owned(),
            title: self.title.to_owned(),
            prompt: self.prompt.to_owned(),
            challenge_type: self.challenge_type,
            difficulty: self.difficulty,
            expected: ExpectedAnswer::new(
                self.accepted.iter().map(|a| (*a).to_owned()).collect(),
                self.matching,
            ),
            hints: self.hints.iter().map(|h| (*h).to_owned()).collect(),
            code_template: None,
            points: None,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[allow(clippy::too_many_lines)]
fn builtin_concepts() -> Result<Vec<ConceptDraft>, StorageError> {
    use ChallengeType::{CodeCompletion, DebugCode, ExplainCode, MultipleChoice, WriteFunction};
    use Level::{Beginner, Expert, Intermediate};

    let mut variables = ConceptDraft::new(
        id("python_variables_beginner")?,
        "Variables and Assignment",
        Beginner,
        ConceptCategory::Basics,
        "Learn how to create and use variables to store data in Python.",
    )
    .with_weight(0.2)
    .with_keywords(["variables", "assignment", "naming", "data"])
    .with_challenge(
        TemplateRow {
            id: "variables_assign",
            title: "Create your first variable",
            prompt: "Write the statement that stores the number 25 in a variable named age.",
            challenge_type: CodeCompletion,
            difficulty: Beginner,
            accepted: &["age = 25", "age=25"],
            matching: AnswerMatch::Normalized,
            hints: &[
                "Use the = operator to assign a value",
                "The variable name goes on the left",
            ],
        }
        .build(),
    )
    .with_challenge(
        TemplateRow {
            id: "variables_type",
            title: "Inspect a value",
            prompt: "Which built-in function returns the type of a value?",
            challenge_type: MultipleChoice,
            difficulty: Beginner,
            accepted: &["type", "type()"],
            matching: AnswerMatch::Normalized,
            hints: &["It is a four letter word"],
        }
        .build(),
    )
    .with_challenge(
        TemplateRow {
            id: "variables_swap",
            title: "Swap without a temporary",
            prompt: "Swap the values of a and b in a single statement.",
            challenge_type: WriteFunction,
            difficulty: Intermediate,
            accepted: &["a, b = b, a"],
            matching: AnswerMatch::Normalized,
            hints: &["Tuple unpacking works on both sides of ="],
        }
        .build(),
    );
    variables.learning_objectives = strings(&[
        "Understand what variables are and why they're useful",
        "Learn Python variable naming rules and conventions",
        "Practice creating and using variables",
    ]);
    variables.explanation = "Variables in Python are names that refer to values. Python is \
        dynamically typed, so you do not declare a type before assigning a value."
        .into();
    variables.code_examples = vec![CodeExample {
        code: "name = \"Alice\"\nage = 25\nprint(f\"{name} is {age}\")".into(),
        explanation: "Creating variables of different types and printing them.".into(),
        output: Some("Alice is 25".into()),
    }];
    variables.estimated_duration_minutes = 20;

    let mut conditionals = ConceptDraft::new(
        id("python_conditionals_beginner")?,
        "Conditionals",
        Beginner,
        ConceptCategory::ControlFlow,
        "Make decisions in code with if, elif and else.",
    )
    .with_weight(0.3)
    .with_keywords(["if", "elif", "else", "boolean"])
    .with_challenge(
        TemplateRow {
            id: "conditionals_keyword",
            title: "Chained conditions",
            prompt: "Which keyword adds another condition after an if block?",
            challenge_type: MultipleChoice,
            difficulty: Beginner,
            accepted: &["elif"],
            matching: AnswerMatch::Normalized,
            hints: &["It is a contraction of two words"],
        }
        .build(),
    );
    conditionals.prerequisites = vec![id("python_variables_beginner")?];

    let mut loops = ConceptDraft::new(
        id("python_loops_beginner")?,
        "Loops",
        Beginner,
        ConceptCategory::ControlFlow,
        "Repeat work with for and while loops.",
    )
    .with_weight(0.4)
    .with_keywords(["for", "while", "range", "iteration"])
    .with_challenge(
        TemplateRow {
            id: "loops_range",
            title: "Counting with range",
            prompt: "What is printed last by: for i in range(3): print(i)",
            challenge_type: ExplainCode,
            difficulty: Beginner,
            accepted: &["2"],
            matching: AnswerMatch::Exact,
            hints: &["range stops before its argument"],
        }
        .build(),
    )
    .with_challenge(
        TemplateRow {
            id: "loops_break",
            title: "Leaving early",
            prompt: "Which statement exits the innermost loop immediately?",
            challenge_type: MultipleChoice,
            difficulty: Beginner,
            accepted: &["break"],
            matching: AnswerMatch::Normalized,
            hints: &["The opposite of continue"],
        }
        .build(),
    );
    loops.prerequisites = vec![id("python_conditionals_beginner")?];

    let mut functions = ConceptDraft::new(
        id("python_functions_beginner")?,
        "Defining Functions",
        Beginner,
        ConceptCategory::Functions,
        "Package reusable logic into functions with parameters and return values.",
    )
    .with_weight(0.5)
    .with_keywords(["def", "return", "parameters", "arguments"])
    .with_challenge(
        TemplateRow {
            id: "functions_def",
            title: "Declare a function",
            prompt: "Which keyword starts a function definition?",
            challenge_type: MultipleChoice,
            difficulty: Beginner,
            accepted: &["def"],
            matching: AnswerMatch::Normalized,
            hints: &["Short for define"],
        }
        .build(),
    );
    functions.prerequisites = vec![id("python_variables_beginner")?];

    let lists = ConceptDraft::new(
        id("python_lists_beginner")?,
        "Lists",
        Beginner,
        ConceptCategory::DataStructures,
        "Store ordered collections of values and work with them by index.",
    )
    .with_weight(0.4)
    .with_keywords(["list", "index", "append", "slice"])
    .with_challenge(
        TemplateRow {
            id: "lists_append",
            title: "Grow a list",
            prompt: "Which list method adds a single item to the end of the list?",
            challenge_type: MultipleChoice,
            difficulty: Beginner,
            accepted: &["append", "append()"],
            matching: AnswerMatch::Normalized,
            hints: &["It is not add or push"],
        }
        .build(),
    );

    let mut comprehensions = ConceptDraft::new(
        id("python_comprehensions_intermediate")?,
        "Comprehensions",
        Intermediate,
        ConceptCategory::DataStructures,
        "Build lists, sets and dicts from iterables in a single expression.",
    )
    .with_weight(0.5)
    .with_keywords(["comprehension", "list", "dict", "filter"])
    .with_challenge(
        TemplateRow {
            id: "comprehensions_squares",
            title: "Squares of evens",
            prompt: "Write a list comprehension of the squares of the even numbers in nums.",
            challenge_type: WriteFunction,
            difficulty: Intermediate,
            accepted: &[
                "[n * n for n in nums if n % 2 == 0]",
                "[n ** 2 for n in nums if n % 2 == 0]",
                "[x * x for x in nums if x % 2 == 0]",
                "[x ** 2 for x in nums if x % 2 == 0]",
            ],
            matching: AnswerMatch::Fuzzy,
            hints: &[
                "The filter goes after the for clause",
                "Use % 2 == 0 to test for even numbers",
            ],
        }
        .build(),
    );
    comprehensions.prerequisites = vec![id("python_lists_beginner")?, id("python_loops_beginner")?];

    let mut exceptions = ConceptDraft::new(
        id("python_exceptions_intermediate")?,
        "Handling Exceptions",
        Intermediate,
        ConceptCategory::ErrorHandling,
        "Catch and raise exceptions with try, except, else and finally.",
    )
    .with_weight(0.6)
    .with_keywords(["try", "except", "raise", "finally", "errors"])
    .with_challenge(
        TemplateRow {
            id: "exceptions_cleanup",
            title: "Always runs",
            prompt: "Which clause of a try statement runs whether or not an exception occurred?",
            challenge_type: MultipleChoice,
            difficulty: Intermediate,
            accepted: &["finally"],
            matching: AnswerMatch::Normalized,
            hints: &["Think of the last word"],
        }
        .build(),
    )
    .with_challenge(
        TemplateRow {
            id: "exceptions_bare",
            title: "Fix the catch-all",
            prompt: "Rewrite `except:` so it catches only a missing dictionary key.",
            challenge_type: DebugCode,
            difficulty: Intermediate,
            accepted: &["except KeyError:"],
            matching: AnswerMatch::Normalized,
            hints: &["Name the specific exception class"],
        }
        .build(),
    );
    exceptions.prerequisites = vec![id("python_functions_beginner")?];

    let classes = ConceptDraft::new(
        id("python_classes_intermediate")?,
        "Classes and Objects",
        Intermediate,
        ConceptCategory::Oop,
        "Model data and behavior together with classes, instances and methods.",
    )
    .with_weight(0.7)
    .with_keywords(["class", "object", "self", "__init__", "oop"])
    .with_challenge(
        TemplateRow {
            id: "classes_init",
            title: "The constructor",
            prompt: "What is the name of the method Python calls to initialize a new instance?",
            challenge_type: MultipleChoice,
            difficulty: Intermediate,
            accepted: &["__init__"],
            matching: AnswerMatch::Exact,
            hints: &["It is surrounded by double underscores"],
        }
        .build(),
    );

    let files = ConceptDraft::new(
        id("python_files_intermediate")?,
        "Reading and Writing Files",
        Intermediate,
        ConceptCategory::FileIo,
        "Open files safely, read their contents and write new data.",
    )
    .with_weight(0.5)
    .with_keywords(["open", "read", "write", "with", "file"])
    .with_challenge(
        TemplateRow {
            id: "files_mode",
            title: "Append mode",
            prompt: "Which mode string opens a text file for appending?",
            challenge_type: MultipleChoice,
            difficulty: Intermediate,
            accepted: &["a", "'a'", "\"a\""],
            matching: AnswerMatch::Exact,
            hints: &["A single letter"],
        }
        .build(),
    );

    let mut generators = ConceptDraft::new(
        id("python_generators_expert")?,
        "Generators",
        Expert,
        ConceptCategory::Advanced,
        "Produce values lazily with yield and generator expressions.",
    )
    .with_weight(0.7)
    .with_keywords(["yield", "generator", "lazy", "iterator"])
    .with_challenge(
        TemplateRow {
            id: "generators_yield",
            title: "Suspend and resume",
            prompt: "Which keyword turns a function into a generator function?",
            challenge_type: MultipleChoice,
            difficulty: Expert,
            accepted: &["yield"],
            matching: AnswerMatch::Normalized,
            hints: &["It hands a value back without returning"],
        }
        .build(),
    )
    .with_challenge(
        TemplateRow {
            id: "generators_explain",
            title: "Generator exhaustion",
            prompt: "Explain what happens when next() is called on an exhausted generator.",
            challenge_type: ExplainCode,
            difficulty: Expert,
            accepted: &["it raises StopIteration", "raises StopIteration", "StopIteration"],
            matching: AnswerMatch::Fuzzy,
            hints: &["An exception signals the end of iteration"],
        }
        .build(),
    );
    generators.prerequisites = vec![id("python_comprehensions_intermediate")?];

    let mut decorators = ConceptDraft::new(
        id("python_decorators_expert")?,
        "Decorators",
        Expert,
        ConceptCategory::Functions,
        "Wrap functions to extend their behavior without modifying them.",
    )
    .with_weight(0.8)
    .with_keywords(["decorator", "wrapper", "functools", "closure"])
    .with_challenge(
        TemplateRow {
            id: "decorators_wraps",
            title: "Preserve metadata",
            prompt: "Which functools decorator copies the wrapped function's name and docstring?",
            challenge_type: MultipleChoice,
            difficulty: Expert,
            accepted: &["functools.wraps", "wraps", "@wraps", "@functools.wraps"],
            matching: AnswerMatch::Normalized,
            hints: &["Its name describes what it does to the wrapper"],
        }
        .build(),
    );
    decorators.prerequisites = vec![id("python_functions_beginner")?];

    let mut context_managers = ConceptDraft::new(
        id("python_context_managers_expert")?,
        "Context Managers",
        Expert,
        ConceptCategory::Advanced,
        "Guarantee setup and teardown with the with statement and custom managers.",
    )
    .with_weight(0.8)
    .with_keywords(["with", "__enter__", "__exit__", "contextlib"])
    .with_challenge(
        TemplateRow {
            id: "context_managers_exit",
            title: "Teardown hook",
            prompt: "Which dunder method runs when a with block is left?",
            challenge_type: MultipleChoice,
            difficulty: Expert,
            accepted: &["__exit__"],
            matching: AnswerMatch::Exact,
            hints: &["The counterpart of __enter__"],
        }
        .build(),
    );
    context_managers.prerequisites = vec![id("python_files_intermediate")?];

    let mut asyncio = ConceptDraft::new(
        id("python_asyncio_expert")?,
        "Async and Await",
        Expert,
        ConceptCategory::Async,
        "Write concurrent I/O-bound code with coroutines and the asyncio event loop.",
    )
    .with_weight(0.9)
    .with_keywords(["async", "await", "asyncio", "coroutine", "event loop"])
    .with_challenge(
        TemplateRow {
            id: "asyncio_gather",
            title: "Run concurrently",
            prompt: "Which asyncio function runs several awaitables concurrently and collects their results?",
            challenge_type: MultipleChoice,
            difficulty: Expert,
            accepted: &["asyncio.gather", "gather"],
            matching: AnswerMatch::Normalized,
            hints: &["It gathers results"],
        }
        .build(),
    );
    asyncio.prerequisites = vec![id("python_generators_expert")?];
    asyncio.estimated_duration_minutes = 45;

    Ok(vec![
        variables,
        conditionals,
        loops,
        functions,
        lists,
        comprehensions,
        exceptions,
        classes,
        files,
        generators,
        decorators,
        context_managers,
        asyncio,
    ])
}
