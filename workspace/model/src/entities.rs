//! SeaORM entity modules for the outreach program database.
//! One module per table; the `prelude` re-exports every entity under its
//! singular name for convenient imports.

pub mod donation;
pub mod event;
pub mod event_schedule;
pub mod milestone;
pub mod participant;
pub mod registration;
pub mod survey;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::donation::Entity as Donation;
    pub use super::event::Entity as Event;
    pub use super::event_schedule::Entity as EventSchedule;
    pub use super::milestone::Entity as Milestone;
    pub use super::participant::Entity as Participant;
    pub use super::registration::Entity as Registration;
    pub use super::survey::Entity as Survey;
    pub use super::user::Entity as User;
}

#[cfg(test)]
mod test {
    use chrono::{NaiveDate, Utc};
    use migration::{Migrator, MigratorTrait};
    use rust_decimal::Decimal;
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, Set,
    };

    use super::*;
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;

        // Enable foreign keys so cascades are exercised
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    fn noon(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_entity_integration() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let now = Utc::now().naive_utc();

        let parent = user::ActiveModel {
            username: Set("jsmith".to_string()),
            password_hash: Set("$argon2id$placeholder".to_string()),
            first_name: Set("Jane".to_string()),
            last_name: Set("Smith".to_string()),
            level: Set(user::UserLevel::User),
            is_parent: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let child = participant::ActiveModel {
            first_name: Set("Ana".to_string()),
            last_name: Set("Smith".to_string()),
            email: Set(Some("ana@example.com".to_string())),
            username: Set(Some(parent.username.clone())),
            field_of_interest: Set(Some("Engineering".to_string())),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let workshop = event::ActiveModel {
            name: Set("Robotics Workshop".to_string()),
            event_type: Set(Some("Workshop".to_string())),
            description: Set(None),
            default_capacity: Set(Some(20)),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let schedule = event_schedule::ActiveModel {
            event_id: Set(workshop.id),
            location: Set("Library Hall".to_string()),
            start_time: Set(noon(2030, 3, 1)),
            end_time: Set(noon(2030, 3, 1) + chrono::Duration::hours(2)),
            capacity: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        registration::ActiveModel {
            participant_id: Set(child.id),
            event_schedule_id: Set(schedule.id),
            registered_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        // Same (participant, schedule) pair violates the unique index
        let duplicate = registration::ActiveModel {
            participant_id: Set(child.id),
            event_schedule_id: Set(schedule.id),
            registered_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await;
        assert!(duplicate.is_err());

        survey::ActiveModel {
            participant_id: Set(child.id),
            event_schedule_id: Set(schedule.id),
            satisfaction_score: Set(5),
            usefulness_score: Set(4),
            instructor_score: Set(5),
            recommendation_score: Set(9),
            nps_bucket: Set(survey::NpsBucket::Promoter),
            comments: Set(Some("Great".to_string())),
            submitted_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        donation::ActiveModel {
            participant_id: Set(child.id),
            amount: Set(Decimal::new(2500, 2)),
            donation_date: Set(NaiveDate::from_ymd_opt(2030, 1, 15).unwrap()),
            note: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        milestone::ActiveModel {
            participant_id: Set(child.id),
            title: Set("First robot".to_string()),
            milestone_date: Set(NaiveDate::from_ymd_opt(2030, 3, 1).unwrap()),
            notes: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        // Read back and verify
        let owned = Participant::find()
            .filter(participant::Column::Username.eq("jsmith"))
            .all(&db)
            .await?;
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].full_name(), "Ana Smith");

        let schedules = workshop.find_related(EventSchedule).all(&db).await?;
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].location, "Library Hall");

        let surveys = Survey::find().all(&db).await?;
        assert_eq!(surveys[0].nps_bucket, survey::NpsBucket::Promoter);

        let donations = child.find_related(Donation).all(&db).await?;
        assert_eq!(donations[0].amount, Decimal::new(2500, 2));

        // Deleting the participant cascades to every dependent row
        Participant::delete_by_id(child.id).exec(&db).await?;
        assert_eq!(Registration::find().count(&db).await?, 0);
        assert_eq!(Survey::find().count(&db).await?, 0);
        assert_eq!(Donation::find().count(&db).await?, 0);
        assert_eq!(Milestone::find().count(&db).await?, 0);

        // Deleting the event cascades to its schedules
        Event::delete_by_id(workshop.id).exec(&db).await?;
        assert_eq!(EventSchedule::find().count(&db).await?, 0);

        // The account itself is untouched
        assert_eq!(User::find().count(&db).await?, 1);

        Ok(())
    }

    #[test]
    fn user_level_codes_round_trip() {
        assert_eq!(user::UserLevel::Manager.code(), "M");
        assert_eq!(user::UserLevel::from_code("U"), Some(user::UserLevel::User));
        assert_eq!(user::UserLevel::from_code("X"), None);
    }
}
