use modelkit::error::OrmError;
use modelkit::models::{GetOrNew, Record, WithId};
use modelkit::orm::{Db, Model, Value};
use sqlx::FromRow;

#[derive(Debug, Default, FromRow)]
struct Contact {
    id: Option<i64>,
    name: String,
    email: Option<String>,
}

impl Model for Contact {
    fn table_name() -> &'static str {
        "contact"
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("name".to_string(), "TEXT NOT NULL".to_string()),
            ("email".to_string(), "TEXT".to_string()),
        ]
    }
}

impl WithId for Contact {
    fn id(&self) -> Option<i64> {
        self.id
    }
}

impl Record for Contact {
    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::from(self.name.clone())),
            ("email", Value::from(self.email.clone())),
        ]
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

impl GetOrNew for Contact {
    fn hydrate(values: &[(&'static str, Value)]) -> Self {
        let mut contact = Self::default();
        for (field, value) in values {
            match (*field, value) {
                ("name", Value::Text(v)) => contact.name = v.clone(),
                ("email", Value::Text(v)) => contact.email = Some(v.clone()),
                _ => {}
            }
        }
        contact
    }
}

async fn contact_db() -> Db {
    let db = Db::connect(":memory:").await.unwrap();
    db.execute(&Contact::create_table_sql()).await.unwrap();
    db
}

async fn count_contacts(db: &Db) -> i64 {
    let rows: Vec<(i64,)> = db.fetch_all("SELECT COUNT(*) FROM contact").await.unwrap();
    rows[0].0
}

#[tokio::test]
async fn test_get_or_new_constructs_without_writing() {
    let db = contact_db().await;

    // 1. Empty store: a transient instance comes back, nothing is written
    let lookup = Contact::get_or_new(&db, &[("name", Value::from("ada"))])
        .await
        .unwrap();
    assert!(lookup.created);
    assert_eq!(lookup.record.name, "ada");
    assert!(lookup.record.id().is_none());
    assert_eq!(count_contacts(&db).await, 0);

    // 2. The caller fills in the rest and saves explicitly
    let mut contact = lookup.record;
    contact.email = Some("ada@example.com".to_string());
    contact.save(&db).await.unwrap();
    let id = contact.id().unwrap();

    // 3. The same lookup now fetches the persisted row
    let lookup = Contact::get_or_new(&db, &[("name", Value::from("ada"))])
        .await
        .unwrap();
    assert!(!lookup.created);
    assert_eq!(lookup.record.id(), Some(id));
    assert_eq!(lookup.record.email.as_deref(), Some("ada@example.com"));
    assert_eq!(count_contacts(&db).await, 1);
}

#[tokio::test]
async fn test_get_or_new_matches_on_every_filter_field() {
    let db = contact_db().await;

    let mut contact = Contact {
        name: "grace".to_string(),
        email: Some("grace@example.com".to_string()),
        ..Default::default()
    };
    contact.save(&db).await.unwrap();

    // Same name, different email: no match, transient instance carries both values
    let lookup = Contact::get_or_new(
        &db,
        &[
            ("name", Value::from("grace")),
            ("email", Value::from("grace@navy.mil")),
        ],
    )
    .await
    .unwrap();
    assert!(lookup.created);
    assert_eq!(lookup.record.email.as_deref(), Some("grace@navy.mil"));
    assert_eq!(count_contacts(&db).await, 1);
}

#[tokio::test]
async fn test_get_or_new_rejects_ambiguous_matches() {
    let db = contact_db().await;

    db.execute("INSERT INTO contact (name, email) VALUES ('kay', 'kay@one.example')")
        .await
        .unwrap();
    db.execute("INSERT INTO contact (name, email) VALUES ('kay', 'kay@two.example')")
        .await
        .unwrap();

    let result = Contact::get_or_new(&db, &[("name", Value::from("kay"))]).await;
    match result {
        Err(OrmError::MultipleRecords { table, matched }) => {
            assert_eq!(table, "contact");
            assert_eq!(matched, 2);
        }
        other => panic!("expected MultipleRecords, got {:?}", other.map(|l| l.created)),
    }
}

#[tokio::test]
async fn test_get_or_new_with_empty_filter_selects_whole_table() {
    let db = contact_db().await;

    // No rows: still a transient instance
    let lookup = Contact::get_or_new(&db, &[]).await.unwrap();
    assert!(lookup.created);

    // One row: fetched
    db.execute("INSERT INTO contact (name) VALUES ('lone')")
        .await
        .unwrap();
    let lookup = Contact::get_or_new(&db, &[]).await.unwrap();
    assert!(!lookup.created);
    assert_eq!(lookup.record.name, "lone");

    // Two rows: ambiguous, like an unfiltered `get`
    db.execute("INSERT INTO contact (name) VALUES ('other')")
        .await
        .unwrap();
    assert!(matches!(
        Contact::get_or_new(&db, &[]).await,
        Err(OrmError::MultipleRecords { matched: 2, .. })
    ));
}
