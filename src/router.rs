use crate::auth::load_actor;
use crate::handlers::{
    account::{account_form, update_account},
    auth::{login, login_form, logout, signup, signup_form},
    dashboard::dashboard,
    donations::{
        add_donation, add_donation_form, delete_donation, donate, donate_form, edit_donation,
        edit_donation_form, list_donations,
    },
    events::{
        add_event, add_event_form, add_schedule, delete_event, delete_schedule, edit_event,
        edit_event_form, list_events, register, unregister,
    },
    health::health_check,
    milestones::{
        add_milestone, add_milestone_form, delete_milestone, edit_milestone, edit_milestone_form,
        list_milestones, view_milestones,
    },
    participants::{
        add_participant, add_participant_form, delete_participant, edit_participant,
        edit_participant_form, list_participants,
    },
    public::{index, teapot},
    surveys::{
        delete_survey, edit_survey, edit_survey_form, list_surveys, submit_survey,
        submit_survey_form, survey_data,
    },
    users::{add_user, add_user_form, delete_user, edit_user, edit_user_form, list_users},
};
use crate::schemas::AppState;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, cors::CorsLayer,
    services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let assets = ServeDir::new(&state.config.assets_dir);

    Router::new()
        // Public pages
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/teapot", get(teapot))
        .route("/login", get(login_form).post(login))
        .route("/signup", get(signup_form).post(signup))
        .route("/logout", get(logout))
        .route("/donate", get(donate_form).post(donate))
        .route("/account", get(account_form).post(update_account))
        // Participants
        .route("/participants", get(list_participants))
        .route("/participants/add", get(add_participant_form).post(add_participant))
        .route("/participants/edit/:id", get(edit_participant_form).post(edit_participant))
        .route("/participants/delete/:id", post(delete_participant))
        // Events and schedules
        .route("/events", get(list_events))
        .route("/events/add", get(add_event_form).post(add_event))
        .route("/events/edit/:id", get(edit_event_form).post(edit_event))
        .route("/events/delete/:id", post(delete_event))
        .route("/events/:id/schedules", post(add_schedule))
        .route("/events/schedules/delete/:id", post(delete_schedule))
        .route("/events/register", post(register))
        .route("/events/unregister", post(unregister))
        // Surveys
        .route("/survey", get(list_surveys))
        .route("/survey/submit", get(submit_survey_form).post(submit_survey))
        .route("/survey/edit/:id", get(edit_survey_form).post(edit_survey))
        .route("/survey/delete/:id", post(delete_survey))
        // Milestones
        .route("/milestones", get(list_milestones))
        .route("/milestones/view/:id", get(view_milestones))
        .route("/milestones/add/:id", get(add_milestone_form).post(add_milestone))
        .route("/milestones/edit/:id", get(edit_milestone_form).post(edit_milestone))
        .route("/milestones/delete/:id", post(delete_milestone))
        // Manager pages
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/survey-data", get(survey_data))
        .route("/admin/donations", get(list_donations))
        .route("/admin/donations/add", get(add_donation_form).post(add_donation))
        .route("/admin/donations/edit/:id", get(edit_donation_form).post(edit_donation))
        .route("/admin/donations/delete/:id", post(delete_donation))
        .route("/admin/users", get(list_users))
        .route("/admin/users/add", get(add_user_form).post(add_user))
        .route("/admin/users/edit/:username", get(edit_user_form).post(edit_user))
        .route("/admin/users/delete/:username", post(delete_user))
        .nest_service("/assets", assets)
        .layer(middleware::from_fn_with_state(state.clone(), load_actor))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
