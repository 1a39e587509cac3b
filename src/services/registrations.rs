use chrono::Utc;
use model::entities::registration;
use policy::{SyncPlan, plan_registration_sync};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info, instrument};

/// Insert a registration unless the pair already exists. Returns whether a
/// row was written.
pub async fn register<C: ConnectionTrait>(
    conn: &C,
    participant_id: i32,
    event_schedule_id: i32,
) -> Result<bool, DbErr> {
    let row = registration::ActiveModel {
        participant_id: Set(participant_id),
        event_schedule_id: Set(event_schedule_id),
        registered_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    let inserted = registration::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([
                registration::Column::ParticipantId,
                registration::Column::EventScheduleId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    debug!(participant_id, event_schedule_id, inserted, "Register");
    Ok(inserted > 0)
}

pub async fn unregister<C: ConnectionTrait>(
    conn: &C,
    participant_id: i32,
    event_schedule_id: i32,
) -> Result<u64, DbErr> {
    let deleted = registration::Entity::delete_many()
        .filter(registration::Column::ParticipantId.eq(participant_id))
        .filter(registration::Column::EventScheduleId.eq(event_schedule_id))
        .exec(conn)
        .await?;
    debug!(participant_id, event_schedule_id, rows = deleted.rows_affected, "Unregister");
    Ok(deleted.rows_affected)
}

/// Which of `participant_ids` are registered for the schedule.
pub async fn registered_among<C: ConnectionTrait>(
    conn: &C,
    event_schedule_id: i32,
    participant_ids: &[i32],
) -> Result<Vec<i32>, DbErr> {
    if participant_ids.is_empty() {
        return Ok(Vec::new());
    }
    registration::Entity::find()
        .select_only()
        .column(registration::Column::ParticipantId)
        .filter(registration::Column::EventScheduleId.eq(event_schedule_id))
        .filter(registration::Column::ParticipantId.is_in(participant_ids.iter().copied()))
        .into_tuple::<i32>()
        .all(conn)
        .await
}

/// Make the parent's registered children for one schedule equal `requested`.
#[instrument(skip(db))]
pub async fn sync_children(
    db: &DatabaseConnection,
    children: &[i32],
    requested: &[i32],
    event_schedule_id: i32,
) -> Result<SyncPlan, DbErr> {
    let txn = db.begin().await?;

    let current = registered_among(&txn, event_schedule_id, children).await?;
    let plan = plan_registration_sync(children, requested, &current);
    for participant_id in &plan.to_add {
        register(&txn, *participant_id, event_schedule_id).await?;
    }
    for participant_id in &plan.to_remove {
        unregister(&txn, *participant_id, event_schedule_id).await?;
    }

    txn.commit().await?;
    info!(
        added = plan.to_add.len(),
        removed = plan.to_remove.len(),
        "Registration sync applied"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::{seed_participant, seed_schedule, setup_test_db};
    use sea_orm::PaginatorTrait;

    async fn rows_for(db: &DatabaseConnection, schedule_id: i32) -> Vec<i32> {
        let mut ids: Vec<i32> = registration::Entity::find()
            .select_only()
            .column(registration::Column::ParticipantId)
            .filter(registration::Column::EventScheduleId.eq(schedule_id))
            .into_tuple()
            .all(db)
            .await
            .unwrap();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let db = setup_test_db().await;
        let schedule = seed_schedule(&db, "Coding Club").await;
        let kid = seed_participant(&db, "Ava", Some("parent")).await;

        assert!(register(&db, kid.id, schedule.id).await.unwrap());
        assert!(!register(&db, kid.id, schedule.id).await.unwrap());
        assert_eq!(registration::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sync_is_idempotent_and_removes_dropped_children() {
        let db = setup_test_db().await;
        let schedule = seed_schedule(&db, "Coding Club").await;
        let a = seed_participant(&db, "Ava", Some("parent")).await;
        let b = seed_participant(&db, "Ben", Some("parent")).await;
        let outsider = seed_participant(&db, "Olu", Some("other")).await;
        register(&db, outsider.id, schedule.id).await.unwrap();

        let children = [a.id, b.id];
        sync_children(&db, &children, &[a.id, b.id, outsider.id], schedule.id)
            .await
            .unwrap();
        let first = rows_for(&db, schedule.id).await;

        let plan = sync_children(&db, &children, &[a.id, b.id], schedule.id)
            .await
            .unwrap();
        assert!(plan.is_noop());
        assert_eq!(rows_for(&db, schedule.id).await, first);

        sync_children(&db, &children, &[b.id], schedule.id).await.unwrap();
        let mut expected = vec![b.id, outsider.id];
        expected.sort();
        assert_eq!(rows_for(&db, schedule.id).await, expected);
    }
}
