//! End-to-end store flow: discovery, admission, chat, flagging and the
//! remediation/lifecycle paths that mutate the same rows.

use chrono::{Duration, Utc};
use uuid::Uuid;

use ember_db::Database;
use ember_db::error::StoreError;
use ember_db::moments::NewMoment;
use ember_db::profiles::NewProfile;
use ember_types::api::{FlagTarget, MomentStatus};

fn open_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::open(&dir.path().join("ember.db")).expect("open db");
    (dir, db)
}

fn register(db: &Database, email: &str) -> String {
    let id = Uuid::new_v4().to_string();
    db.create_user(&id, email, "argon2-hash").unwrap();
    let languages = vec!["en".to_string()];
    db.create_profile(
        &id,
        &NewProfile {
            display_name: email.split('@').next().unwrap(),
            home_country: "FR",
            languages: &languages,
            user_type: "local",
            profile_photo_url: None,
        },
        Utc::now(),
    )
    .unwrap();
    id
}

fn create_moment(db: &Database, creator: &str, title: &str, max: u32) -> String {
    let now = Utc::now();
    db.create_moment(
        &NewMoment {
            creator_id: creator,
            title,
            lat: 48.8566,
            lng: 2.3522,
            city_code: Some("PAR"),
            starts_at: now - Duration::minutes(5),
            ends_at: now + Duration::hours(2),
            max_participants: max,
        },
        now,
    )
    .unwrap()
    .id
}

#[test]
fn discovery_admission_chat_and_remediation() {
    let (_dir, db) = open_db();
    let host = register(&db, "host@example.com");
    let guest = register(&db, "guest@example.com");
    let reporter = register(&db, "reporter@example.com");
    let moment = create_moment(&db, &host, "Evening picnic", 3);

    // Discoverable from nearby, with the creator already counted.
    let hits = db
        .nearby_moments(48.8566, 2.3522, 5_000.0, 50, Utc::now())
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].participant_count, 1);

    // Guest joins and chats; a non-participant check stays false.
    db.join_moment(&moment, &guest, Utc::now()).unwrap();
    assert!(db.is_participant(&moment, &guest).unwrap());
    assert!(!db.is_participant(&moment, &reporter).unwrap());

    let message = db
        .send_message(&moment, &guest, "anyone bringing snacks?", Utc::now())
        .unwrap();

    // Reporter flags the message; remediation deletes it and clears flags.
    db.create_flag(&reporter, FlagTarget::Message, &message.id, "spam", Utc::now())
        .unwrap();
    assert_eq!(
        db.target_content(FlagTarget::Message, &message.id)
            .unwrap()
            .as_deref(),
        Some("anyone bringing snacks?")
    );

    assert!(db.delete_message(&message.id).unwrap());
    db.delete_flags_for_target(FlagTarget::Message, &message.id)
        .unwrap();
    assert_eq!(db.target_content(FlagTarget::Message, &message.id).unwrap(), None);
    assert!(db.list_flags(None, None).unwrap().is_empty());
}

#[test]
fn expiry_closes_admission_and_discovery() {
    let (_dir, db) = open_db();
    let host = register(&db, "host@example.com");
    let late = register(&db, "late@example.com");

    let now = Utc::now();
    let moment = db
        .create_moment(
            &NewMoment {
                creator_id: &host,
                title: "Flash gathering",
                lat: 48.8566,
                lng: 2.3522,
                city_code: None,
                starts_at: now - Duration::hours(2),
                ends_at: now - Duration::minutes(1),
                max_participants: 10,
            },
            now - Duration::hours(2),
        )
        .unwrap()
        .id;

    // Even before the sweep runs, discovery and joining are closed.
    assert!(db
        .nearby_moments(48.8566, 2.3522, 5_000.0, 50, Utc::now())
        .unwrap()
        .is_empty());
    assert!(matches!(
        db.join_moment(&moment, &late, Utc::now()),
        Err(StoreError::NotJoinable)
    ));

    // The sweep makes the state authoritative.
    assert_eq!(db.expire_past_moments(Utc::now()).unwrap(), 1);
    assert_eq!(db.get_moment(&moment).unwrap().status, "expired");
}

#[test]
fn hidden_moment_disappears_but_survives_deletion_checks() {
    let (_dir, db) = open_db();
    let host = register(&db, "host@example.com");
    let moment = create_moment(&db, &host, "Borderline", 5);

    db.set_moment_status(&moment, MomentStatus::Hidden).unwrap();
    assert!(db
        .nearby_moments(48.8566, 2.3522, 5_000.0, 50, Utc::now())
        .unwrap()
        .is_empty());

    // Content is still fetchable for the admin review queue.
    assert_eq!(
        db.target_content(FlagTarget::Moment, &moment).unwrap().as_deref(),
        Some("Borderline")
    );
}

#[test]
fn ban_erases_a_user_across_moments() {
    let (_dir, db) = open_db();
    let host = register(&db, "host@example.com");
    let offender = register(&db, "offender@example.com");

    let offender_moment = create_moment(&db, &offender, "Their event", 5);
    let host_moment = create_moment(&db, &host, "Host event", 5);
    db.join_moment(&host_moment, &offender, Utc::now()).unwrap();
    db.send_message(&host_moment, &offender, "junk", Utc::now())
        .unwrap();
    db.create_sos_alert(&offender, &host_moment, None, None, Utc::now())
        .unwrap();

    db.ban_user(&offender).unwrap();

    assert!(matches!(
        db.get_moment(&offender_moment),
        Err(StoreError::NotFound(_))
    ));
    assert!(db.list_messages(&host_moment, 100).unwrap().is_empty());
    assert!(!db.is_participant(&host_moment, &offender).unwrap());
    // The profile cascade also removed their alerts.
    assert!(db.active_sos_alerts().unwrap().is_empty());
    // The host's moment is untouched.
    db.get_moment(&host_moment).unwrap();
}
