use chrono::{NaiveDate, Utc};
use model::entities::participant;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, instrument};

use crate::schemas::ListQuery;
use crate::services::lower_eq;

/// Profile fields of a participant as entered on a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantInput {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub school_or_employer: Option<String>,
    pub field_of_interest: Option<String>,
}

impl ParticipantInput {
    fn apply(self, model: &mut participant::ActiveModel) {
        model.first_name = Set(self.first_name);
        model.last_name = Set(self.last_name);
        model.email = Set(self.email);
        model.phone = Set(self.phone);
        model.date_of_birth = Set(self.date_of_birth);
        model.city = Set(self.city);
        model.state = Set(self.state);
        model.zip = Set(self.zip);
        model.school_or_employer = Set(self.school_or_employer);
        model.field_of_interest = Set(self.field_of_interest);
    }
}

/// Participant whose email matches, ignoring case.
pub async fn find_by_email<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> Result<Option<participant::Model>, DbErr> {
    participant::Entity::find()
        .filter(lower_eq(participant::Column::Email, email))
        .one(conn)
        .await
}

/// True when another participant already uses `email`, ignoring case.
pub async fn email_taken<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    except_id: Option<i32>,
) -> Result<bool, DbErr> {
    let mut select = participant::Entity::find().filter(lower_eq(participant::Column::Email, email));
    if let Some(id) = except_id {
        select = select.filter(participant::Column::Id.ne(id));
    }
    Ok(select.count(conn).await? > 0)
}

#[instrument(skip(conn, input), fields(first_name = %input.first_name, last_name = %input.last_name))]
pub async fn create<C: ConnectionTrait>(
    conn: &C,
    input: ParticipantInput,
    username: Option<String>,
) -> Result<participant::Model, DbErr> {
    let mut model = participant::ActiveModel {
        username: Set(username),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    input.apply(&mut model);
    let created = model.insert(conn).await?;
    debug!(participant_id = created.id, "Participant created");
    Ok(created)
}

/// Overwrite profile fields; `username` is replaced only when `Some`.
pub async fn update(
    db: &DatabaseConnection,
    existing: participant::Model,
    input: ParticipantInput,
    username: Option<Option<String>>,
) -> Result<participant::Model, DbErr> {
    let mut model: participant::ActiveModel = existing.into();
    input.apply(&mut model);
    if let Some(username) = username {
        model.username = Set(username);
    }
    model.update(db).await
}

/// One page of participants ordered by name, optionally filtered by a
/// substring of the name or email. Returns the rows and the page count.
pub async fn list(
    db: &DatabaseConnection,
    query: &ListQuery,
) -> Result<(Vec<participant::Model>, u64), DbErr> {
    let mut select = participant::Entity::find()
        .order_by_asc(participant::Column::LastName)
        .order_by_asc(participant::Column::FirstName);
    if let Some(q) = query.search() {
        select = select.filter(
            Condition::any()
                .add(participant::Column::FirstName.contains(q))
                .add(participant::Column::LastName.contains(q))
                .add(participant::Column::Email.contains(q)),
        );
    }
    let paginator = select.paginate(db, query.limit());
    let pages = paginator.num_pages().await?;
    let rows = paginator.fetch_page(query.page() - 1).await?;
    Ok((rows, pages))
}

/// Every participant ordered by name, for select boxes.
pub async fn all(db: &DatabaseConnection) -> Result<Vec<participant::Model>, DbErr> {
    participant::Entity::find()
        .order_by_asc(participant::Column::LastName)
        .order_by_asc(participant::Column::FirstName)
        .all(db)
        .await
}

pub async fn by_ids(db: &DatabaseConnection, ids: &[i32]) -> Result<Vec<participant::Model>, DbErr> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    participant::Entity::find()
        .filter(participant::Column::Id.is_in(ids.iter().copied()))
        .order_by_asc(participant::Column::FirstName)
        .all(db)
        .await
}
