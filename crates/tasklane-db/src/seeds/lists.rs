use chrono::{Duration, Utc};
use rusqlite::{Transaction, params};
use tasklane_common::Result;
use tracing::info;
use uuid::Uuid;

use super::{Seeder, db_err};

struct SampleList {
    name: &'static str,
    description: &'static str,
    /// Index into the users ordered by id.
    owner: usize,
    tasks: &'static [SampleTask],
}

struct SampleTask {
    title: &'static str,
    description: &'static str,
    status: &'static str,
    priority: &'static str,
    due_in_days: Option<i64>,
    subtasks: &'static [(&'static str, bool)],
}

const SAMPLE_LISTS: &[SampleList] = &[
    SampleList {
        name: "Personal Project",
        description: "Tasks for my personal development project",
        owner: 0,
        tasks: &[
            SampleTask {
                title: "Set up development environment",
                description: "Install and configure the required tools",
                status: "completed",
                priority: "high",
                due_in_days: None,
                subtasks: &[
                    ("Install the toolchain", true),
                    ("Configure the editor", true),
                    ("Install extensions", true),
                ],
            },
            SampleTask {
                title: "Design the database",
                description: "Create the data model and the migrations",
                status: "in_progress",
                priority: "high",
                due_in_days: None,
                subtasks: &[
                    ("Define entities", true),
                    ("Write migrations", true),
                    ("Implement seeders", false),
                    ("Set up relations", false),
                ],
            },
            SampleTask {
                title: "Implement the REST API",
                description: "Build every endpoint the app needs",
                status: "pending",
                priority: "medium",
                due_in_days: Some(7),
                subtasks: &[
                    ("User endpoints", false),
                    ("List endpoints", false),
                    ("Task endpoints", false),
                    ("Authentication middleware", false),
                    ("Input validation", false),
                ],
            },
        ],
    },
    SampleList {
        name: "Chores",
        description: "Housework and home maintenance",
        owner: 0,
        tasks: &[
            SampleTask {
                title: "Weekly cleaning",
                description: "Full cleaning routine for the house",
                status: "pending",
                priority: "medium",
                due_in_days: Some(2),
                subtasks: &[
                    ("Vacuum the rugs", false),
                    ("Clean the bathrooms", false),
                    ("Tidy the kitchen", false),
                    ("Change the sheets", false),
                ],
            },
            SampleTask {
                title: "Garden upkeep",
                description: "Look after the garden",
                status: "in_progress",
                priority: "low",
                due_in_days: None,
                subtasks: &[
                    ("Water the plants", true),
                    ("Trim the bushes", false),
                    ("Fertilize the lawn", false),
                ],
            },
        ],
    },
    SampleList {
        name: "Learning",
        description: "Courses and study material",
        owner: 0,
        tasks: &[
            SampleTask {
                title: "Advanced Rust course",
                description: "Finish the advanced Rust course",
                status: "in_progress",
                priority: "high",
                due_in_days: Some(14),
                subtasks: &[
                    ("Module 1: Ownership", true),
                    ("Module 2: Traits", true),
                    ("Module 3: Lifetimes", false),
                    ("Module 4: Macros", false),
                    ("Final project", false),
                ],
            },
            SampleTask {
                title: "Read an architecture book",
                description: "Clean Architecture by Robert C. Martin",
                status: "pending",
                priority: "medium",
                due_in_days: None,
                subtasks: &[
                    ("Chapters 1-5", false),
                    ("Chapters 6-10", false),
                    ("Chapters 11-15", false),
                    ("Take notes", false),
                ],
            },
        ],
    },
    SampleList {
        name: "Team Work",
        description: "Shared tasks for the development team",
        owner: 1,
        tasks: &[
            SampleTask {
                title: "Sprint planning",
                description: "Plan the next sprint",
                status: "completed",
                priority: "high",
                due_in_days: None,
                subtasks: &[
                    ("Review the backlog", true),
                    ("Estimate", true),
                    ("Assign tasks", true),
                ],
            },
            SampleTask {
                title: "Code review",
                description: "Review pending pull requests",
                status: "in_progress",
                priority: "high",
                due_in_days: None,
                subtasks: &[
                    ("PR #123 - Auth system", true),
                    ("PR #124 - Database models", false),
                    ("PR #125 - API endpoints", false),
                ],
            },
        ],
    },
];

/// Sample lists with tasks and subtasks for the first users.
pub struct ListsTasksSubtasksSeeder;

impl Seeder for ListsTasksSubtasksSeeder {
    fn name(&self) -> &str {
        "lists_tasks_subtasks"
    }

    fn description(&self) -> &str {
        "Seeds sample lists with tasks and subtasks"
    }

    fn run(&self, tx: &Transaction<'_>) -> Result<()> {
        let users = user_ids(tx)?;
        if users.is_empty() {
            info!("no users found, run the users seeder first");
            return Ok(());
        }

        let now = Utc::now();
        let (mut lists, mut tasks, mut subtasks) = (0, 0, 0);

        for list in SAMPLE_LISTS {
            let Some(&owner_id) = users.get(list.owner) else {
                continue;
            };

            let list_id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO lists (id, owner_id, name, description) VALUES (?1, ?2, ?3, ?4)",
                params![list_id, owner_id, list.name, list.description],
            )
            .map_err(db_err("failed to insert list"))?;
            lists += 1;

            for (position, task) in list.tasks.iter().enumerate() {
                let task_id = Uuid::new_v4().to_string();
                let due_date = task
                    .due_in_days
                    .map(|days| (now + Duration::days(days)).to_rfc3339());
                tx.execute(
                    "INSERT INTO tasks (id, list_id, title, description, status, priority, due_date, position)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        task_id,
                        list_id,
                        task.title,
                        task.description,
                        task.status,
                        task.priority,
                        due_date,
                        position as i64 + 1
                    ],
                )
                .map_err(db_err("failed to insert task"))?;
                tasks += 1;

                for (position, &(title, done)) in task.subtasks.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO subtasks (id, task_id, title, done, position)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            Uuid::new_v4().to_string(),
                            task_id,
                            title,
                            done,
                            position as i64 + 1
                        ],
                    )
                    .map_err(db_err("failed to insert subtask"))?;
                    subtasks += 1;
                }
            }
        }

        info!("seeded {lists} lists, {tasks} tasks and {subtasks} subtasks");
        Ok(())
    }
}

fn user_ids(tx: &Transaction<'_>) -> Result<Vec<i64>> {
    let mut stmt = tx
        .prepare("SELECT id FROM users ORDER BY id")
        .map_err(db_err("failed to prepare query"))?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(db_err("failed to query users"))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row.map_err(db_err("failed to read user row"))?);
    }
    Ok(ids)
}
