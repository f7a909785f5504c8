#![allow(dead_code)]

use entitykit::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Hero {
    pub id: i64,
    pub name: String,
    pub secret_name: String,
    pub age: Option<i32>,
}

static HERO_FIELDS: &[FieldInfo] = &[
    FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
    FieldInfo::new("name", "name", SqlType::Varchar(100)),
    FieldInfo::new("secret_name", "secret_name", SqlType::Text),
    FieldInfo::new("age", "age", SqlType::Integer).nullable(true),
];

impl Model for Hero {
    const TABLE_NAME: &'static str = "heroes";
    const SCHEMA: Option<&'static str> = Some("public");
    const PRIMARY_KEY: &'static [&'static str] = &["id"];

    fn fields() -> &'static [FieldInfo] {
        HERO_FIELDS
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
            .with("secret_name", self.secret_name.as_str())
            .with("age", self.age)
    }

    fn from_snapshot(values: &Snapshot) -> Result<Self> {
        Ok(Self {
            id: values.decode("id")?,
            name: values.decode("name")?,
            secret_name: values.decode("secret_name")?,
            age: values.decode("age")?,
        })
    }
}

pub fn hero(id: i64, name: &str, age: Option<i32>) -> Hero {
    Hero {
        id,
        name: name.to_string(),
        secret_name: format!("{name} (secret)"),
        age,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub version: i64,
}

static TEAM_FIELDS: &[FieldInfo] = &[
    FieldInfo::new("id", "team_id", SqlType::BigInt).primary_key(true),
    FieldInfo::new("name", "name", SqlType::Text),
    FieldInfo::new("version", "row_version", SqlType::BigInt).concurrency_token(true),
];

impl Model for Team {
    const TABLE_NAME: &'static str = "teams";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];

    fn fields() -> &'static [FieldInfo] {
        TEAM_FIELDS
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
            .with("version", self.version)
    }

    fn from_snapshot(values: &Snapshot) -> Result<Self> {
        Ok(Self {
            id: values.decode("id")?,
            name: values.decode("name")?,
            version: values.decode("version")?,
        })
    }
}

pub fn team(id: i64, name: &str, version: i64) -> Team {
    Team {
        id,
        name: name.to_string(),
        version,
    }
}

/// A session whose store already holds `heroes` and `teams`, with nothing
/// tracked.
pub fn seeded_session(heroes: &[Hero], teams: &[Team]) -> Session<MemoryStore> {
    let mut session = Session::new(MemoryStore::new());
    for h in heroes {
        session.add(h).unwrap();
    }
    for t in teams {
        session.add(t).unwrap();
    }
    session.save_changes().unwrap();
    session.expunge_all();
    session
}

/// Overwrite a stored row behind the session's back, as another writer would.
pub fn write_behind<M: Model>(session: &mut Session<MemoryStore>, row: &M) {
    let updated = session
        .store_mut()
        .update(M::TABLE_NAME, &row.primary_key_value(), row.to_snapshot())
        .unwrap();
    assert!(updated, "row must exist");
}
