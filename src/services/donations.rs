use chrono::NaiveDate;
use model::entities::{donation, participant};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use migration::EMAIL_LOWER_INDEX;
use tracing::{debug, info, instrument, warn};

use crate::schemas::ListQuery;
use crate::services::participants::{self, ParticipantInput};
use crate::services::violates_unique;

/// A donation entered through the public form.
#[derive(Debug, Clone)]
pub struct PublicDonation {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub amount: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DonationReceipt {
    pub donation: donation::Model,
    pub participant_id: i32,
    pub created_participant: bool,
}

/// Record a public donation.
///
/// The donor is the caller's own participant when `linked_participant` is
/// given and no email was typed; otherwise the participant with the same
/// email (ignoring case), created on first use. Both writes share one
/// transaction.
///
/// Two first-time donors racing on the same email meet the unique email
/// index; the loser retries once and then finds the winner's participant.
#[instrument(skip(db, intake), fields(amount = %intake.amount))]
pub async fn record_public_donation(
    db: &DatabaseConnection,
    intake: PublicDonation,
    linked_participant: Option<i32>,
    today: NaiveDate,
) -> Result<DonationReceipt, DbErr> {
    match try_record(db, &intake, linked_participant, today).await {
        Err(e) if violates_unique(&e, EMAIL_LOWER_INDEX) => {
            warn!("Donor email inserted concurrently, retrying");
            try_record(db, &intake, linked_participant, today).await
        }
        result => result,
    }
}

async fn try_record(
    db: &DatabaseConnection,
    intake: &PublicDonation,
    linked_participant: Option<i32>,
    today: NaiveDate,
) -> Result<DonationReceipt, DbErr> {
    let txn = db.begin().await?;

    let (participant_id, created_participant) = match (&intake.email, linked_participant) {
        (None, Some(id)) => (id, false),
        (Some(email), _) => match participants::find_by_email(&txn, email).await? {
            Some(existing) => {
                debug!(participant_id = existing.id, "Donor matched by email");
                (existing.id, false)
            }
            None => {
                let input = ParticipantInput {
                    first_name: intake.first_name.clone(),
                    last_name: intake.last_name.clone(),
                    email: Some(email.trim().to_string()),
                    ..Default::default()
                };
                let created = participants::create(&txn, input, None).await?;
                info!(participant_id = created.id, "Created participant for new donor");
                (created.id, true)
            }
        },
        (None, None) => {
            return Err(DbErr::Custom(
                "donation needs an email or a linked participant".to_string(),
            ));
        }
    };

    let donation = donation::ActiveModel {
        participant_id: Set(participant_id),
        amount: Set(intake.amount),
        donation_date: Set(today),
        note: Set(intake.note.clone()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(donation_id = donation.id, participant_id, "Donation recorded");
    Ok(DonationReceipt {
        donation,
        participant_id,
        created_participant,
    })
}

/// Sum of every donation amount.
pub async fn total(db: &DatabaseConnection) -> Result<Decimal, DbErr> {
    let amounts: Vec<Decimal> = donation::Entity::find()
        .select_only()
        .column(donation::Column::Amount)
        .into_tuple()
        .all(db)
        .await?;
    Ok(amounts.into_iter().sum())
}

/// Newest donations first, with their donor.
pub async fn list(
    db: &DatabaseConnection,
    query: &ListQuery,
) -> Result<(Vec<(donation::Model, Option<participant::Model>)>, u64), DbErr> {
    let paginator = donation::Entity::find()
        .find_also_related(participant::Entity)
        .order_by_desc(donation::Column::DonationDate)
        .order_by_desc(donation::Column::Id)
        .paginate(db, query.limit());
    let pages = paginator.num_pages().await?;
    let rows = paginator.fetch_page(query.page() - 1).await?;
    Ok((rows, pages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::setup_test_db;

    fn intake(email: &str, cents: i64) -> PublicDonation {
        PublicDonation {
            first_name: "Dana".to_string(),
            last_name: "Ruiz".to_string(),
            email: Some(email.to_string()),
            amount: Decimal::new(cents, 2),
            note: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn test_new_email_creates_one_participant() {
        let db = setup_test_db().await;

        let first = record_public_donation(&db, intake("dana@example.com", 2500), None, today())
            .await
            .unwrap();
        assert!(first.created_participant);

        let second = record_public_donation(&db, intake("DANA@Example.com", 1000), None, today())
            .await
            .unwrap();
        assert!(!second.created_participant);
        assert_eq!(first.participant_id, second.participant_id);

        assert_eq!(participant::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(donation::Entity::find().count(&db).await.unwrap(), 2);
        assert_eq!(total(&db).await.unwrap(), Decimal::new(3500, 2));
    }

    #[tokio::test]
    async fn test_linked_participant_without_email() {
        let db = setup_test_db().await;
        let existing = participants::create(
            &db,
            ParticipantInput {
                first_name: "Lee".to_string(),
                last_name: "Park".to_string(),
                ..Default::default()
            },
            Some("lee".to_string()),
        )
        .await
        .unwrap();

        let mut donation = intake("", 500);
        donation.email = None;
        let receipt = record_public_donation(&db, donation, Some(existing.id), today())
            .await
            .unwrap();
        assert_eq!(receipt.participant_id, existing.id);
        assert_eq!(receipt.donation.donation_date, today());
    }
}
