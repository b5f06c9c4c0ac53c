use std::collections::BTreeSet;

/// System persona sent with every completion request.
pub const GAME_MASTER_PERSONA: &str = "You are the game master of QueryHunt, a murder mystery game that players solve by querying a relational database with SQL.";

/// Prompt text with `{name}` placeholders. `{{` and `}}` render as literal braces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub text: &'static str,
}

pub const STORY_PROMPT: PromptTemplate = PromptTemplate {
    name: "story",
    text: r#"
Write an engaging, original story for a SQL murder mystery game.
Base the story on this database schema:
---------------------
{dbml_schema}
---------------------
The player explores the tables with SQL to identify the murderer by following the story.
Structure the story with these sections:
---------------------
Plot
Characters
Objective
Description of tables (never mention the admin-only Murderer table)
---------------------
The player reads this story, so do not reveal the murderer or give hints.
Do not include SQL queries or sample rows; the data is generated in a later step.
Keep the story short.
"#,
};

pub const QUERY_PROMPT: PromptTemplate = PromptTemplate {
    name: "dataset",
    text: r#"
Using the SQL murder mystery story below, create the game data that will be inserted into the tables.
Follow this database schema and return valid SQL INSERT statements:
---------------------
{dbml_schema}
---------------------
Do not use special characters or line breaks in the output.
Do not use apostrophes inside string values (write 'At a friends house', not 'At a friend's house').
Generate enough rows in every table for interesting gameplay.
Include explicit ids for every row.
Fill the admin-only Murderer table with the suspect id and name of this story's murderer.
Return the statements as a JSON object matching this JSON schema:
---------------------
{schema}
---------------------
Return nothing else.
The story to reference:
---------------------
{story}
---------------------
"#,
};

pub const QUERY_REFLECTION_PROMPT: PromptTemplate = PromptTemplate {
    name: "self_correction",
    text: r#"
You previously produced this output:
---------------------
{wrong_answer}
---------------------
It caused this error: {error}
Fix the error and return the corrected output, using this dbml schema:
---------------------
{dbml_schema}
---------------------
Do not include line breaks or other special characters.
Do not wrap the output in markdown code fences.
The response must contain only a JSON object of this shape:
---------------------
{{
  "queries": [
    {{"query": "INSERT INTO Table ...;"}},
    {{"query": "INSERT INTO Table ...;"}}
  ]
}}
---------------------
"#,
};

pub const HINT_PROMPT: PromptTemplate = PromptTemplate {
    name: "hint",
    text: r#"
You are helping a player of a SQL murder mystery game.
Give one useful hint that moves the player toward the murderer.
Use what you know about the game schema.
Never reveal the murderer.
Keep the hint short.

Reference the game story:
---------------------
{story}
---------------------
The player's SQL queries so far:
---------------------
{queries}
---------------------
Your previous hints:
---------------------
{hints}
---------------------
"#,
};

impl PromptTemplate {
    /// Substitutes each `{name}` in a single pass. Values are inserted verbatim and never re-scanned;
    /// placeholders without a value are kept as written.
    #[must_use]
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        let mut rendered = String::with_capacity(
            self.text.len() + values.iter().map(|(_, value)| value.len()).sum::<usize>(),
        );
        let mut rest = self.text;

        while let Some(position) = rest.find(['{', '}']) {
            rendered.push_str(&rest[..position]);
            let tail = &rest[position..];

            if let Some(after) = tail.strip_prefix("{{") {
                rendered.push('{');
                rest = after;
            } else if let Some(after) = tail.strip_prefix("}}") {
                rendered.push('}');
                rest = after;
            } else if let Some((name, after)) = placeholder_at(tail) {
                match values.iter().find(|(key, _)| *key == name) {
                    Some((_, value)) => rendered.push_str(value),
                    None => rendered.push_str(&tail[..name.len() + 2]),
                }
                rest = after;
            } else {
                rendered.push_str(&tail[..1]);
                rest = &tail[1..];
            }
        }

        rendered.push_str(rest);
        rendered
    }

    #[must_use]
    pub fn placeholders(&self) -> BTreeSet<&'static str> {
        let mut names = BTreeSet::new();
        let mut rest = self.text;
        while let Some(position) = rest.find(['{', '}']) {
            let tail = &rest[position..];
            if tail.starts_with("{{") || tail.starts_with("}}") {
                rest = &tail[2..];
            } else if let Some((name, after)) = placeholder_at(tail) {
                names.insert(name);
                rest = after;
            } else {
                rest = &tail[1..];
            }
        }
        names
    }
}

fn placeholder_at(tail: &str) -> Option<(&str, &str)> {
    let body = tail.strip_prefix('{')?;
    let end = body.find('}')?;
    let name = &body[..end];
    let is_identifier = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    is_identifier.then(|| (name, &body[end + 1..]))
}

#[must_use]
pub fn story_prompt(dbml_schema: &str) -> String {
    STORY_PROMPT.render(&[("dbml_schema", dbml_schema)])
}

#[must_use]
pub fn dataset_prompt(dbml_schema: &str, output_schema: &str, story: &str) -> String {
    QUERY_PROMPT.render(&[
        ("dbml_schema", dbml_schema),
        ("schema", output_schema),
        ("story", story),
    ])
}

#[must_use]
pub fn correction_prompt(wrong_answer: &str, dbml_schema: &str, error: &str) -> String {
    QUERY_REFLECTION_PROMPT.render(&[
        ("wrong_answer", wrong_answer),
        ("dbml_schema", dbml_schema),
        ("error", error),
    ])
}

#[must_use]
pub fn hint_prompt(story: &str, queries: &str, hints: &str) -> String {
    HINT_PROMPT.render(&[("story", story), ("queries", queries), ("hints", hints)])
}
