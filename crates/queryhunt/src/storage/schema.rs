pub const VICTIM_TABLE: &str = "Victim";
pub const SUSPECTS_TABLE: &str = "Suspects";
pub const ALIBIS_TABLE: &str = "Alibis";
pub const CRIME_SCENE_TABLE: &str = "CrimeScene";
pub const EVIDENCE_TABLE: &str = "Evidence";
pub const MURDERER_TABLE: &str = "Murderer";

/// Children before parents so row deletion never trips a foreign key.
pub const RESET_ORDER: &[&str] = &[
    EVIDENCE_TABLE,
    MURDERER_TABLE,
    ALIBIS_TABLE,
    CRIME_SCENE_TABLE,
    SUSPECTS_TABLE,
    VICTIM_TABLE,
];

// SQLite only applies type affinity, so each typed column carries a CHECK that
// rejects values the declared type cannot hold.
const CREATE_VICTIM_TABLE_SQL: &str = r#"
CREATE TABLE Victim (
    victim_id INTEGER NOT NULL,
    name VARCHAR(100),
    age INTEGER CHECK (age IS NULL OR typeof(age) = 'integer'),
    occupation VARCHAR(100),
    time_of_death DATETIME CHECK (time_of_death IS NULL OR datetime(time_of_death) IS NOT NULL),
    location_of_death VARCHAR(100),
    PRIMARY KEY (victim_id)
);
"#;

const CREATE_SUSPECTS_TABLE_SQL: &str = r#"
CREATE TABLE Suspects (
    suspect_id INTEGER NOT NULL,
    name VARCHAR(100),
    age INTEGER CHECK (age IS NULL OR typeof(age) = 'integer'),
    relationship_to_victim VARCHAR(100),
    motive VARCHAR(100),
    PRIMARY KEY (suspect_id)
);
"#;

const CREATE_ALIBIS_TABLE_SQL: &str = r#"
CREATE TABLE Alibis (
    alibi_id INTEGER NOT NULL,
    suspect_id INTEGER CHECK (suspect_id IS NULL OR typeof(suspect_id) = 'integer'),
    alibi VARCHAR(255),
    alibi_verified BOOLEAN CHECK (alibi_verified IS NULL OR alibi_verified IN (0, 1)),
    alibi_time DATETIME CHECK (alibi_time IS NULL OR datetime(alibi_time) IS NOT NULL),
    PRIMARY KEY (alibi_id),
    FOREIGN KEY (suspect_id) REFERENCES Suspects(suspect_id)
);
"#;

const CREATE_CRIME_SCENE_TABLE_SQL: &str = r#"
CREATE TABLE CrimeScene (
    scene_id INTEGER NOT NULL,
    location VARCHAR(100),
    description TEXT,
    evidence_found BOOLEAN CHECK (evidence_found IS NULL OR evidence_found IN (0, 1)),
    victim_id INTEGER CHECK (victim_id IS NULL OR typeof(victim_id) = 'integer'),
    PRIMARY KEY (scene_id),
    FOREIGN KEY (victim_id) REFERENCES Victim(victim_id)
);
"#;

const CREATE_EVIDENCE_TABLE_SQL: &str = r#"
CREATE TABLE Evidence (
    evidence_id INTEGER NOT NULL,
    description TEXT,
    found_at_location VARCHAR(100),
    points_to_suspect_id INTEGER
        CHECK (points_to_suspect_id IS NULL OR typeof(points_to_suspect_id) = 'integer'),
    scene_id INTEGER CHECK (scene_id IS NULL OR typeof(scene_id) = 'integer'),
    PRIMARY KEY (evidence_id),
    FOREIGN KEY (points_to_suspect_id) REFERENCES Suspects(suspect_id),
    FOREIGN KEY (scene_id) REFERENCES CrimeScene(scene_id)
);
"#;

const CREATE_MURDERER_TABLE_SQL: &str = r#"
CREATE TABLE Murderer (
    murderer_id INTEGER NOT NULL,
    suspect_id INTEGER CHECK (suspect_id IS NULL OR typeof(suspect_id) = 'integer'),
    name VARCHAR(100),
    PRIMARY KEY (murderer_id),
    FOREIGN KEY (suspect_id) REFERENCES Suspects(suspect_id)
);
"#;

#[must_use]
pub fn schema_statements() -> &'static [&'static str] {
    &[
        CREATE_VICTIM_TABLE_SQL,
        CREATE_SUSPECTS_TABLE_SQL,
        CREATE_ALIBIS_TABLE_SQL,
        CREATE_CRIME_SCENE_TABLE_SQL,
        CREATE_EVIDENCE_TABLE_SQL,
        CREATE_MURDERER_TABLE_SQL,
    ]
}

#[must_use]
pub fn create_schema_sql() -> String {
    schema_statements().join("\n")
}
